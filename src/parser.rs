pub mod ast;

use crate::lexer::{Token, TokenKind};
use ast::{
    BinOp, ConstDecl, Decl, Directive, Expr, ExprKind, Field, FnDecl, Import, MethodSigDecl,
    Param, Path, ResultExpr, SetDecl, SourceFile, Span, Stmt, TypeBody, TypeDecl, TypeExpr,
    TypeExprKind, UnaryOp,
};
use chumsky::input::{Input as _, Stream, ValueInput};
use chumsky::prelude::*;

type Extra<'a> = extra::Err<Rich<'a, TokenKind, Span>>;

fn ident<'a, I>() -> impl Parser<'a, I, String, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    select! { TokenKind::Identifier(s) => s }
}

fn path<'a, I>() -> impl Parser<'a, I, Path, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    ident()
        .then(just(TokenKind::Dot).ignore_then(ident()).or_not())
        .map(|(first, second)| match second {
            Some(name) => Path {
                qualifier: Some(first),
                name,
            },
            None => Path {
                qualifier: None,
                name: first,
            },
        })
}

fn type_expr<'a, I>() -> impl Parser<'a, I, TypeExpr, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    recursive(|te| {
        choice((
            just(TokenKind::Star)
                .ignore_then(te)
                .map(|inner: TypeExpr| TypeExprKind::Pointer(Box::new(inner))),
            path().map(TypeExprKind::Name),
        ))
        .map_with(|kind, e| TypeExpr {
            kind,
            span: e.span(),
        })
    })
}

/// Result entries are parsed as types and reclassified, so `error` and
/// `cleanup` stay ordinary identifiers everywhere else.
fn result_expr<'a, I>() -> impl Parser<'a, I, ResultExpr, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    type_expr().map(|t| match &t.kind {
        TypeExprKind::Name(Path {
            qualifier: None,
            name,
        }) if name == "error" => ResultExpr::Error(t.span),
        TypeExprKind::Name(Path {
            qualifier: None,
            name,
        }) if name == "cleanup" => ResultExpr::Cleanup(t.span),
        _ => ResultExpr::Type(t),
    })
}

fn results<'a, I>() -> impl Parser<'a, I, Vec<ResultExpr>, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    let tuple = result_expr()
        .separated_by(just(TokenKind::Comma))
        .at_least(1)
        .allow_trailing()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen));
    just(TokenKind::Colon).ignore_then(choice((tuple, result_expr().map(|r| vec![r]))))
}

fn expr<'a, I>() -> impl Parser<'a, I, Expr, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    recursive(|expr| {
        let literal = select! {
            TokenKind::Integer(i) => ExprKind::IntLit(i),
            TokenKind::Float(d) => ExprKind::FloatLit(d),
            TokenKind::Boolean(b) => ExprKind::BoolLit(b),
            TokenKind::String(s) => ExprKind::StringLit(s),
        }
        .map_with(|kind, e| Expr::new(kind, e.span()));

        let field_inits = ident()
            .then_ignore(just(TokenKind::Colon))
            .then(expr.clone())
            .separated_by(just(TokenKind::Comma))
            .allow_trailing()
            .collect::<Vec<_>>();

        let composite = path()
            .then(field_inits.delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace)))
            .map_with(|(ty, fields), e| Expr::new(ExprKind::Composite { ty, fields }, e.span()));

        let reference = path().map_with(|p, e| Expr::new(ExprKind::Ref(p), e.span()));

        let paren = expr
            .clone()
            .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen));

        let atom = choice((literal, composite, reference, paren)).boxed();

        let args = expr
            .clone()
            .separated_by(just(TokenKind::Comma))
            .allow_trailing()
            .collect::<Vec<_>>()
            .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen));

        let call = atom.foldl_with(args.repeated(), |callee, args, e| {
            Expr::new(
                ExprKind::Call {
                    callee: Box::new(callee),
                    args,
                },
                e.span(),
            )
        });

        let unary = recursive(|unary| {
            choice((
                just(TokenKind::Amp)
                    .ignore_then(unary.clone())
                    .map_with(|inner, e| {
                        Expr::new(ExprKind::Unary(UnaryOp::Addr, Box::new(inner)), e.span())
                    }),
                just(TokenKind::Star)
                    .ignore_then(unary)
                    .map_with(|inner, e| {
                        Expr::new(ExprKind::Unary(UnaryOp::Star, Box::new(inner)), e.span())
                    }),
                call,
            ))
        });

        let product_op = choice((
            just(TokenKind::Star).to(BinOp::Mul),
            just(TokenKind::Slash).to(BinOp::Div),
        ));
        let product = unary
            .clone()
            .foldl_with(product_op.then(unary).repeated(), |left, (op, right), e| {
                Expr::new(
                    ExprKind::Binary(op, Box::new(left), Box::new(right)),
                    e.span(),
                )
            });

        let sum_op = choice((
            just(TokenKind::Plus).to(BinOp::Add),
            just(TokenKind::Minus).to(BinOp::Sub),
        ));
        product
            .clone()
            .foldl_with(sum_op.then(product).repeated(), |left, (op, right), e| {
                Expr::new(
                    ExprKind::Binary(op, Box::new(left), Box::new(right)),
                    e.span(),
                )
            })
    })
}

fn decl<'a, I>() -> impl Parser<'a, I, Decl, Extra<'a>> + Clone
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    let field = ident()
        .then_ignore(just(TokenKind::Colon))
        .then(type_expr())
        .map_with(|(name, ty), e| Field {
            name,
            ty,
            span: e.span(),
        });

    let method_sig = ident()
        .then(
            type_expr()
                .separated_by(just(TokenKind::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen)),
        )
        .then(results().or_not())
        .map_with(|((name, params), results), e| MethodSigDecl {
            name,
            params,
            results: results.unwrap_or_default(),
            span: e.span(),
        });

    let type_body = choice((
        just(TokenKind::Struct)
            .ignore_then(
                field
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace)),
            )
            .map(|fields| TypeBody::Struct { fields }),
        just(TokenKind::Interface)
            .ignore_then(
                method_sig
                    .repeated()
                    .collect::<Vec<_>>()
                    .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace)),
            )
            .map(|methods| TypeBody::Interface { methods }),
    ));

    let type_decl = just(TokenKind::Type)
        .ignore_then(ident())
        .then(type_body)
        .map_with(|(name, body), e| {
            Decl::Type(TypeDecl {
                name,
                body,
                span: e.span(),
            })
        });

    let param = ident()
        .then_ignore(just(TokenKind::Colon))
        .then(type_expr())
        .map_with(|(name, ty), e| Param {
            name,
            ty,
            span: e.span(),
        });

    let stmt = choice((
        just(TokenKind::Return).map_with(|_, e| Stmt::Return(e.span())),
        expr().map(Stmt::Expr),
    ));

    let body = stmt
        .repeated()
        .collect::<Vec<_>>()
        .delimited_by(just(TokenKind::LeftBrace), just(TokenKind::RightBrace));

    let receiver = type_expr().delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen));

    let fn_decl = just(TokenKind::Fn)
        .ignore_then(receiver.or_not())
        .then(ident())
        .then(
            param
                .separated_by(just(TokenKind::Comma))
                .allow_trailing()
                .collect::<Vec<_>>()
                .delimited_by(just(TokenKind::LeftParen), just(TokenKind::RightParen)),
        )
        .then(results().or_not())
        .then(body.or_not())
        .map_with(|((((receiver, name), params), results), body), e| {
            Decl::Fn(FnDecl {
                receiver,
                name,
                params,
                results: results.unwrap_or_default(),
                body,
                span: e.span(),
            })
        });

    let set_decl = just(TokenKind::Let)
        .ignore_then(ident())
        .then_ignore(just(TokenKind::Equal))
        .then(expr())
        .map_with(|(name, value), e| {
            Decl::Set(SetDecl {
                name,
                value,
                span: e.span(),
            })
        });

    let const_decl = just(TokenKind::Const)
        .ignore_then(ident())
        .then_ignore(just(TokenKind::Colon))
        .then(type_expr())
        .then_ignore(just(TokenKind::Equal))
        .then(expr())
        .map_with(|((name, ty), value), e| {
            Decl::Const(ConstDecl {
                name,
                ty,
                value,
                span: e.span(),
            })
        });

    choice((type_decl, fn_decl, set_decl, const_decl)).boxed()
}

fn file<'a, I>() -> impl Parser<'a, I, SourceFile, Extra<'a>>
where
    I: ValueInput<'a, Token = TokenKind, Span = Span>,
{
    let directive = select! { TokenKind::Directive { when, tag } => (when, tag) }.map_with(
        |(when, tag), e| Directive {
            when,
            tag,
            span: e.span(),
        },
    );

    let import = just(TokenKind::Import)
        .ignore_then(ident().or_not())
        .then(select! { TokenKind::String(s) => s })
        .map_with(|(alias, path), e| Import {
            alias,
            path,
            span: e.span(),
        });

    directive
        .repeated()
        .collect::<Vec<_>>()
        .then(
            just(TokenKind::Package).ignore_then(ident().map_with(|name, e| (name, e.span()))),
        )
        .then(import.repeated().collect::<Vec<_>>())
        .then(decl().repeated().collect::<Vec<_>>())
        .then_ignore(end())
        .map(
            |(((directives, (package, package_span)), imports), decls)| SourceFile {
                directives,
                package,
                package_span,
                imports,
                decls,
            },
        )
}

/// Parses a token stream into a source file.
pub fn parse_file<'a>(
    tokens: &'a [Token],
    eoi: Span,
) -> ParseResult<SourceFile, Rich<'a, TokenKind, Span>> {
    let stream = Stream::from_iter(tokens.iter().map(|t| (t.kind.clone(), t.span)))
        .map(eoi, |(kind, span): (TokenKind, Span)| (kind, span));
    file().parse(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;
    use crate::parser::ast::SourceId;

    fn parse(input: &str) -> SourceFile {
        let (tokens, errors) = Lexer::new(input, SourceId::SYNTHETIC).collect_all();
        assert!(errors.is_empty(), "lex errors: {:?}", errors);
        let eoi = Span::new(SourceId::SYNTHETIC, input.len()..input.len());
        let result = parse_file(&tokens, eoi);
        assert!(
            !result.has_errors(),
            "parse errors: {:?}",
            result.errors().collect::<Vec<_>>()
        );
        result.into_output().unwrap()
    }

    #[test]
    fn test_package_and_imports() {
        let file = parse("#:when inject\npackage app\nimport db \"app/db\"\nimport \"app/util\"");
        assert_eq!(file.package, "app");
        assert_eq!(file.directives.len(), 1);
        assert!(file.directives[0].when);
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].alias.as_deref(), Some("db"));
        assert_eq!(file.imports[1].alias, None);
        assert_eq!(file.imports[1].path, "app/util");
    }

    #[test]
    fn test_struct_and_interface_decls() {
        let file = parse(
            "package app\n\
             type Foo struct { x: int y: *Bar }\n\
             type Fooer interface { foo(): string }",
        );
        assert_eq!(file.decls.len(), 2);
        let Decl::Type(foo) = &file.decls[0] else {
            panic!("expected type decl");
        };
        let TypeBody::Struct { fields } = &foo.body else {
            panic!("expected struct");
        };
        assert_eq!(fields.len(), 2);
        assert!(matches!(fields[1].ty.kind, TypeExprKind::Pointer(_)));
        let Decl::Type(fooer) = &file.decls[1] else {
            panic!("expected type decl");
        };
        let TypeBody::Interface { methods } = &fooer.body else {
            panic!("expected interface");
        };
        assert_eq!(methods.len(), 1);
        assert_eq!(methods[0].name, "foo");
        assert_eq!(methods[0].results.len(), 1);
    }

    #[test]
    fn test_fn_decl_result_shapes() {
        let file = parse(
            "package app\n\
             fn provFoo(): Foo\n\
             fn provBar(foo: Foo): (Bar, error)\n\
             fn provBaz(): (Baz, cleanup, error)",
        );
        let Decl::Fn(bar) = &file.decls[1] else {
            panic!("expected fn");
        };
        assert_eq!(bar.params.len(), 1);
        assert_eq!(bar.results.len(), 2);
        assert!(matches!(bar.results[1], ResultExpr::Error(_)));
        let Decl::Fn(baz) = &file.decls[2] else {
            panic!("expected fn");
        };
        assert!(matches!(baz.results[1], ResultExpr::Cleanup(_)));
        assert!(matches!(baz.results[2], ResultExpr::Error(_)));
    }

    #[test]
    fn test_method_decl() {
        let file = parse("package app\nfn (*Bar) foo(): string");
        let Decl::Fn(m) = &file.decls[0] else {
            panic!("expected fn");
        };
        assert!(matches!(
            m.receiver.as_ref().unwrap().kind,
            TypeExprKind::Pointer(_)
        ));
    }

    #[test]
    fn test_set_decl_items() {
        let file = parse(
            "package app\n\
             let AppSet = make_set(provFoo, Bar, bind(*Fooer, *Bar), value(Foo{x: 41}), db.Set)",
        );
        let Decl::Set(set) = &file.decls[0] else {
            panic!("expected set");
        };
        let ExprKind::Call { callee, args } = &set.value.kind else {
            panic!("expected call");
        };
        let ExprKind::Ref(p) = &callee.kind else {
            panic!("expected ref callee");
        };
        assert_eq!(p.name, "make_set");
        assert_eq!(args.len(), 5);
        assert!(matches!(
            &args[2].kind,
            ExprKind::Call { .. }
        ));
        let ExprKind::Ref(q) = &args[4].kind else {
            panic!("expected qualified ref");
        };
        assert_eq!(q.qualifier.as_deref(), Some("db"));
    }

    #[test]
    fn test_injector_stub_body() {
        let file = parse(
            "package app\n\
             fn initApp(foo: Foo): (App, error) {\n\
                 build(AppSet)\n\
                 return\n\
             }",
        );
        let Decl::Fn(f) = &file.decls[0] else {
            panic!("expected fn");
        };
        let body = f.body.as_ref().unwrap();
        assert_eq!(body.len(), 2);
        assert!(matches!(body[0], Stmt::Expr(_)));
        assert!(matches!(body[1], Stmt::Return(_)));
    }

    #[test]
    fn test_value_expressions() {
        let file = parse("package app\nconst Answer: int = 40 + 2\nlet V = value(&Foo{x: Answer})");
        let Decl::Const(c) = &file.decls[0] else {
            panic!("expected const");
        };
        assert!(matches!(c.value.kind, ExprKind::Binary(BinOp::Add, _, _)));
        let Decl::Set(v) = &file.decls[1] else {
            panic!("expected set decl");
        };
        let ExprKind::Call { args, .. } = &v.value.kind else {
            panic!("expected call");
        };
        assert!(matches!(
            args[0].kind,
            ExprKind::Unary(UnaryOp::Addr, _)
        ));
    }
}
