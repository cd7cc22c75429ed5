use chumsky::prelude::SimpleSpan;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SourceId(pub usize);

impl SourceId {
    pub const SYNTHETIC: SourceId = SourceId(0);
}

pub type Span = SimpleSpan<usize, SourceId>;

/// A single parsed `.sld` file.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFile {
    pub directives: Vec<Directive>,
    pub package: String,
    pub package_span: Span,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
}

/// A build-variant directive (`#:when inject` / `#:unless inject`).
#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub when: bool,
    pub tag: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Import {
    pub alias: Option<String>,
    pub path: String,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Type(TypeDecl),
    Fn(FnDecl),
    Set(SetDecl),
    Const(ConstDecl),
}

impl Decl {
    pub fn name(&self) -> &str {
        match self {
            Decl::Type(d) => &d.name,
            Decl::Fn(d) => &d.name,
            Decl::Set(d) => &d.name,
            Decl::Const(d) => &d.name,
        }
    }

    pub fn span(&self) -> Span {
        match self {
            Decl::Type(d) => d.span,
            Decl::Fn(d) => d.span,
            Decl::Set(d) => d.span,
            Decl::Const(d) => d.span,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub body: TypeBody,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeBody {
    Struct { fields: Vec<Field> },
    Interface { methods: Vec<MethodSigDecl> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// A method signature inside an interface declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSigDecl {
    pub name: String,
    pub params: Vec<TypeExpr>,
    pub results: Vec<ResultExpr>,
    pub span: Span,
}

/// A function or method declaration. Only injector stubs carry bodies;
/// every other function is declaration-only.
#[derive(Debug, Clone, PartialEq)]
pub struct FnDecl {
    pub receiver: Option<TypeExpr>,
    pub name: String,
    pub params: Vec<Param>,
    pub results: Vec<ResultExpr>,
    pub body: Option<Vec<Stmt>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// One entry in a result list: a type, or the `error` / `cleanup` markers.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultExpr {
    Type(TypeExpr),
    Error(Span),
    Cleanup(Span),
}

impl ResultExpr {
    pub fn span(&self) -> Span {
        match self {
            ResultExpr::Type(t) => t.span,
            ResultExpr::Error(s) | ResultExpr::Cleanup(s) => *s,
        }
    }
}

/// `let Name = make_set(…)` — the right-hand side is kept as an
/// expression and interpreted during lowering.
#[derive(Debug, Clone, PartialEq)]
pub struct SetDecl {
    pub name: String,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub ty: TypeExpr,
    pub value: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TypeExpr {
    pub kind: TypeExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TypeExprKind {
    Name(Path),
    Pointer(Box<TypeExpr>),
}

/// A possibly-qualified reference (`x` or `pkg.x`).
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    pub qualifier: Option<String>,
    pub name: String,
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}.{}", q, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Expr(Expr),
    Return(Span),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub(crate) fn new(kind: ExprKind, span: Span) -> Self {
        Expr { kind, span }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    IntLit(i64),
    FloatLit(f64),
    BoolLit(bool),
    StringLit(String),
    Ref(Path),
    /// `T{f: e, …}` or `pkg.T{f: e, …}`
    Composite {
        ty: Path,
        fields: Vec<(String, Expr)>,
    },
    Unary(UnaryOp, Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// `&e`
    Addr,
    /// `*e` — in set items this names a pointer type, not a dereference.
    Star,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}
