//! Lowering from parsed declarations to IR: recognizes the construction
//! primitives (`make_set`, `build`, `bind`, `value`, `interface_value`),
//! validates providers and bindings, and recognizes injector stubs.

use super::ir::{
    IfaceBinding, Injector, Provider, ProviderInput, ProviderSet, SetImport, Value,
};
use super::{sets, AnalysisError};
use crate::loader::{Declared, FuncId, PackageId, Workspace};
use crate::parser::ast::{Expr, ExprKind, Path, SourceId, Span, Stmt, UnaryOp};
use chumsky::span::Span as _;
use crate::types::{ResultAtom, TypeId, TypeKind};
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

/// Validates a provider or injector result list against the allowed
/// shapes: `T`, `(T, error)`, `(T, cleanup)`, `(T, cleanup, error)`.
pub fn func_output(results: &[ResultAtom]) -> Result<(TypeId, bool, bool), String> {
    match results {
        [] => Err("no return values".to_string()),
        [ResultAtom::Type(t)] => Ok((*t, false, false)),
        [ResultAtom::Type(t), ResultAtom::Error] => Ok((*t, false, true)),
        [ResultAtom::Type(t), ResultAtom::Cleanup] => Ok((*t, true, false)),
        [ResultAtom::Type(t), ResultAtom::Cleanup, ResultAtom::Error] => Ok((*t, true, true)),
        [ResultAtom::Type(_), _] => Err("second return value must be error or cleanup".to_string()),
        [ResultAtom::Type(_), ResultAtom::Cleanup, _] => {
            Err("third return value must be error".to_string())
        }
        [ResultAtom::Type(_), _, _] => Err("second return value must be cleanup".to_string()),
        [_, ..] if results.len() > 3 => Err("too many return values".to_string()),
        _ => Err("first return value must be a type".to_string()),
    }
}

enum Item {
    Provider(Rc<Provider>),
    Set(Rc<ProviderSet>),
    Binding(Rc<IfaceBinding>),
    Value(Rc<Value>),
}

/// The lowering cache: named sets are interned by `(package, name)` so a
/// set imported by many others is shared by identity, and providers are
/// lowered once per symbol.
pub struct Lowerer<'w> {
    ws: &'w Workspace,
    named_sets: HashMap<(PackageId, String), Rc<ProviderSet>>,
    func_providers: HashMap<FuncId, Result<Rc<Provider>, AnalysisError>>,
    struct_providers: HashMap<TypeId, Result<Rc<Provider>, AnalysisError>>,
    in_progress: Vec<(PackageId, String)>,
}

impl<'w> Lowerer<'w> {
    pub fn new(ws: &'w Workspace) -> Self {
        Lowerer {
            ws,
            named_sets: HashMap::new(),
            func_providers: HashMap::new(),
            struct_providers: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    /// Lowers (or retrieves) the named set `pkg.name`.
    pub fn named_set(
        &mut self,
        pkg: PackageId,
        name: &str,
    ) -> Result<Rc<ProviderSet>, Vec<AnalysisError>> {
        let key = (pkg, name.to_string());
        if let Some(set) = self.named_sets.get(&key) {
            return Ok(set.clone());
        }
        let Some(Declared::Set { file, decl }) = self.ws.pkg(pkg).scope.get(name).cloned() else {
            return Err(vec![AnalysisError::UnknownPattern {
                span: Span::new(SourceId::SYNTHETIC, 0..0),
            }]);
        };
        if self.in_progress.contains(&key) {
            return Err(vec![AnalysisError::SetImportCycle {
                span: decl.span,
                name: name.to_string(),
            }]);
        }
        self.in_progress.push(key.clone());
        let result = self.lower_named_value(pkg, file, &decl.value, name);
        self.in_progress.pop();
        let set = result?;
        self.named_sets.insert(key, set.clone());
        Ok(set)
    }

    fn lower_named_value(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        expr: &Expr,
        name: &str,
    ) -> Result<Rc<ProviderSet>, Vec<AnalysisError>> {
        match &expr.kind {
            ExprKind::Call { callee, args } if is_primitive(callee, "make_set") => {
                self.lower_set_call(pkg, file, args, expr.span, name)
            }
            // An alias to another set keeps the original's identity.
            ExprKind::Ref(path) => match self.ws.resolve(pkg, file, path) {
                Some((target, Declared::Set { .. })) => {
                    let target_name = path.name.clone();
                    self.named_set(target, &target_name)
                }
                _ => Err(vec![AnalysisError::UnknownPattern { span: expr.span }]),
            },
            _ => Err(vec![AnalysisError::UnknownPattern { span: expr.span }]),
        }
    }

    /// Recognizes and lowers every injector stub declared in a package, in
    /// file and declaration order.
    pub fn injectors(&mut self, pkg: PackageId) -> (Vec<Injector>, Vec<AnalysisError>) {
        let mut injectors = Vec::new();
        let mut errors = Vec::new();

        let func_ids: Vec<FuncId> = {
            let package = self.ws.pkg(pkg);
            let mut ids = Vec::new();
            for f in &package.files {
                for decl in &f.ast.decls {
                    if let crate::parser::ast::Decl::Fn(fd) = decl {
                        if fd.receiver.is_none() && fd.body.is_some() {
                            if let Some(Declared::Func(id)) = package.scope.get(&fd.name) {
                                ids.push(*id);
                            }
                        }
                    }
                }
            }
            ids
        };

        for func_id in func_ids {
            let func = self.ws.func(func_id).clone();
            let body = func.body.as_ref().expect("only functions with bodies are collected");
            let build_call = match recognize_stub(body, func.span) {
                Ok(Some(call)) => call,
                Ok(None) => continue,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };
            let ExprKind::Call { args, .. } = &build_call.kind else {
                continue;
            };
            let set = match self.lower_set_call(pkg, func.file, args, build_call.span, "") {
                Ok(set) => set,
                Err(mut errs) => {
                    errors.append(&mut errs);
                    continue;
                }
            };
            let (out, has_cleanup, has_err) = match func_output(&func.results) {
                Ok(sig) => sig,
                Err(reason) => {
                    errors.push(AnalysisError::InvalidInjector {
                        span: func.span,
                        name: func.symbol.name.clone(),
                        reason,
                    });
                    continue;
                }
            };
            injectors.push(Injector {
                symbol: func.symbol.clone(),
                span: func.span,
                file: func.file,
                params: func.params.clone(),
                out,
                has_cleanup,
                has_err,
                set,
            });
        }

        (injectors, errors)
    }

    fn lower_set_call(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        args: &[Expr],
        span: Span,
        var_name: &str,
    ) -> Result<Rc<ProviderSet>, Vec<AnalysisError>> {
        let mut set = ProviderSet {
            span,
            pkg_path: self.ws.pkg(pkg).path.clone(),
            var_name: var_name.to_string(),
            providers: Vec::new(),
            bindings: Vec::new(),
            values: Vec::new(),
            imports: Vec::new(),
            provider_map: BTreeMap::new(),
            source_map: BTreeMap::new(),
        };
        let mut errors = Vec::new();
        for arg in args {
            match self.lower_item(pkg, file, arg) {
                Ok(Item::Provider(p)) => set.providers.push(p),
                Ok(Item::Set(s)) => set.imports.push(SetImport {
                    set: s,
                    span: arg.span,
                }),
                Ok(Item::Binding(b)) => set.bindings.push(b),
                Ok(Item::Value(v)) => set.values.push(v),
                Err(mut errs) => errors.append(&mut errs),
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        let errors = sets::build_provider_map(&self.ws.types, &mut set);
        if !errors.is_empty() {
            return Err(errors);
        }
        let errors = sets::verify_acyclic(&self.ws.types, &set);
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(Rc::new(set))
    }

    fn lower_item(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        expr: &Expr,
    ) -> Result<Item, Vec<AnalysisError>> {
        match &expr.kind {
            ExprKind::Ref(path) => match self.ws.resolve(pkg, file, path) {
                Some((_, Declared::Func(id))) => self
                    .func_provider(*id)
                    .map(Item::Provider)
                    .map_err(|e| vec![e]),
                Some((_, Declared::Type(_))) => self
                    .struct_provider_for(pkg, file, path, expr.span)
                    .map(Item::Provider)
                    .map_err(|e| vec![e]),
                Some((target, Declared::Set { .. })) => {
                    let name = path.name.clone();
                    self.named_set(target, &name).map(Item::Set)
                }
                _ => Err(vec![AnalysisError::UnknownPattern { span: expr.span }]),
            },
            ExprKind::Composite { ty, fields } if fields.is_empty() => self
                .struct_provider_for(pkg, file, ty, expr.span)
                .map(Item::Provider)
                .map_err(|e| vec![e]),
            ExprKind::Call { callee, args } => {
                if is_primitive(callee, "make_set") {
                    self.lower_set_call(pkg, file, args, expr.span, "").map(Item::Set)
                } else if is_primitive(callee, "bind") {
                    self.lower_bind(pkg, file, args, expr.span)
                        .map(Item::Binding)
                        .map_err(|e| vec![e])
                } else if is_primitive(callee, "value") {
                    self.lower_value(pkg, file, args, expr.span)
                        .map(Item::Value)
                        .map_err(|e| vec![e])
                } else if is_primitive(callee, "interface_value") {
                    self.lower_interface_value(pkg, file, args, expr.span)
                        .map(Item::Value)
                        .map_err(|e| vec![e])
                } else {
                    Err(vec![AnalysisError::UnknownPattern { span: expr.span }])
                }
            }
            _ => Err(vec![AnalysisError::UnknownPattern { span: expr.span }]),
        }
    }

    fn func_provider(&mut self, id: FuncId) -> Result<Rc<Provider>, AnalysisError> {
        if let Some(cached) = self.func_providers.get(&id) {
            return cached.clone();
        }
        let result = self.lower_func_provider(id);
        self.func_providers.insert(id, result.clone());
        result
    }

    fn lower_func_provider(&mut self, id: FuncId) -> Result<Rc<Provider>, AnalysisError> {
        let func = self.ws.func(id);
        let (out, has_cleanup, has_err) =
            func_output(&func.results).map_err(|reason| AnalysisError::InvalidProvider {
                span: func.span,
                name: func.symbol.name.clone(),
                reason,
            })?;
        for (i, (_, ty)) in func.params.iter().enumerate() {
            for (_, earlier) in &func.params[..i] {
                if ty == earlier {
                    return Err(AnalysisError::InvalidProvider {
                        span: func.span,
                        name: func.symbol.name.clone(),
                        reason: format!(
                            "multiple parameters of type {}",
                            self.ws.types.display(*ty)
                        ),
                    });
                }
            }
        }
        Ok(Rc::new(Provider {
            symbol: func.symbol.clone(),
            span: func.span,
            args: func
                .params
                .iter()
                .map(|(name, ty)| ProviderInput {
                    ty: *ty,
                    name: name.clone(),
                })
                .collect(),
            is_struct: false,
            out,
            ptr_out: None,
            has_cleanup,
            has_err,
        }))
    }

    fn struct_provider_for(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        path: &Path,
        span: Span,
    ) -> Result<Rc<Provider>, AnalysisError> {
        let Some(ty) = self.type_ref_path(pkg, file, path) else {
            return Err(AnalysisError::UnknownPattern { span });
        };
        if let Some(cached) = self.struct_providers.get(&ty) {
            return cached.clone();
        }
        let result = self.lower_struct_provider(ty, span);
        self.struct_providers.insert(ty, result.clone());
        result
    }

    fn lower_struct_provider(
        &mut self,
        ty: TypeId,
        span: Span,
    ) -> Result<Rc<Provider>, AnalysisError> {
        let store = &self.ws.types;
        let Some(def) = store.as_named(ty) else {
            return Err(AnalysisError::InvalidProvider {
                span,
                name: store.display(ty),
                reason: "does not name a struct".to_string(),
            });
        };
        let Some(fields) = store.struct_fields(ty) else {
            return Err(AnalysisError::InvalidProvider {
                span,
                name: def.symbol.to_string(),
                reason: "does not name a struct".to_string(),
            });
        };
        for (i, (_, field_ty)) in fields.iter().enumerate() {
            for (_, earlier) in &fields[..i] {
                if field_ty == earlier {
                    return Err(AnalysisError::InvalidProvider {
                        span,
                        name: def.symbol.to_string(),
                        reason: format!(
                            "struct has multiple fields of type {}",
                            store.display(*field_ty)
                        ),
                    });
                }
            }
        }
        let ptr_out = store
            .find(&TypeKind::Pointer(ty))
            .expect("pointer types are pre-interned by the loader");
        Ok(Rc::new(Provider {
            symbol: def.symbol.clone(),
            span: def.span,
            args: fields
                .iter()
                .map(|(name, field_ty)| ProviderInput {
                    ty: *field_ty,
                    name: name.clone(),
                })
                .collect(),
            is_struct: true,
            out: ty,
            ptr_out: Some(ptr_out),
            has_cleanup: false,
            has_err: false,
        }))
    }

    fn lower_bind(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        args: &[Expr],
        span: Span,
    ) -> Result<Rc<IfaceBinding>, AnalysisError> {
        if args.len() != 2 {
            return Err(AnalysisError::PrimitiveArity {
                span,
                name: "bind",
                expected: "two arguments",
            });
        }
        let iface = self.iface_pointer_arg(pkg, file, &args[0], "bind")?;
        let Some(provided) = self.type_ref(pkg, file, &args[1]) else {
            return Err(AnalysisError::InvalidBinding {
                span: args[1].span,
                reason: "second argument to bind must reference a type".to_string(),
            });
        };
        if provided == iface {
            return Err(AnalysisError::InvalidBinding {
                span,
                reason: "cannot bind interface to itself".to_string(),
            });
        }
        let store = &self.ws.types;
        if !store.implements(provided, iface) {
            return Err(AnalysisError::InvalidBinding {
                span,
                reason: format!(
                    "{} does not implement {}",
                    store.display(provided),
                    store.display(iface)
                ),
            });
        }
        Ok(Rc::new(IfaceBinding {
            span,
            iface,
            provided,
        }))
    }

    fn lower_value(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        args: &[Expr],
        span: Span,
    ) -> Result<Rc<Value>, AnalysisError> {
        if args.len() != 1 {
            return Err(AnalysisError::PrimitiveArity {
                span,
                name: "value",
                expected: "one argument",
            });
        }
        self.check_simple(pkg, file, &args[0])?;
        let ty = self.type_of_expr(pkg, file, &args[0])?;
        if self.ws.types.is_interface(ty) {
            return Err(AnalysisError::InvalidValueExpression {
                span: args[0].span,
                reason: "argument to value is an interface value; use interface_value".to_string(),
            });
        }
        Ok(Rc::new(Value {
            span: args[0].span,
            out: ty,
            expr: args[0].clone(),
            file,
        }))
    }

    fn lower_interface_value(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        args: &[Expr],
        span: Span,
    ) -> Result<Rc<Value>, AnalysisError> {
        if args.len() != 2 {
            return Err(AnalysisError::PrimitiveArity {
                span,
                name: "interface_value",
                expected: "two arguments",
            });
        }
        let iface = self.iface_pointer_arg(pkg, file, &args[0], "interface_value")?;
        self.check_simple(pkg, file, &args[1])?;
        let concrete = self.type_of_expr(pkg, file, &args[1])?;
        if concrete == iface {
            return Err(AnalysisError::InvalidBinding {
                span,
                reason: "cannot bind interface to itself".to_string(),
            });
        }
        let store = &self.ws.types;
        if !store.implements(concrete, iface) {
            return Err(AnalysisError::InvalidBinding {
                span,
                reason: format!(
                    "{} does not implement {}",
                    store.display(concrete),
                    store.display(iface)
                ),
            });
        }
        Ok(Rc::new(Value {
            span: args[1].span,
            out: iface,
            expr: args[1].clone(),
            file,
        }))
    }

    /// The first argument of `bind` / `interface_value`: a pointer to an
    /// interface type. Returns the interface itself.
    fn iface_pointer_arg(
        &self,
        pkg: PackageId,
        file: SourceId,
        expr: &Expr,
        primitive: &str,
    ) -> Result<TypeId, AnalysisError> {
        let found = self.type_ref(pkg, file, expr);
        let invalid = |found_desc: String| AnalysisError::InvalidBinding {
            span: expr.span,
            reason: format!(
                "first argument to {} must be a pointer to an interface type; found {}",
                primitive, found_desc
            ),
        };
        let Some(ty) = found else {
            return Err(invalid("a non-type expression".to_string()));
        };
        let store = &self.ws.types;
        match store.kind(ty) {
            TypeKind::Pointer(inner) if store.is_interface(*inner) => Ok(*inner),
            _ => Err(invalid(store.display(ty))),
        }
    }

    /// Interprets an expression as a type reference (`T`, `pkg.T`, `*T`).
    fn type_ref(&self, pkg: PackageId, file: SourceId, expr: &Expr) -> Option<TypeId> {
        match &expr.kind {
            ExprKind::Ref(path) => self.type_ref_path(pkg, file, path),
            ExprKind::Unary(UnaryOp::Star, inner) => {
                let inner = self.type_ref(pkg, file, inner)?;
                self.ws.types.find(&TypeKind::Pointer(inner))
            }
            _ => None,
        }
    }

    fn type_ref_path(&self, pkg: PackageId, file: SourceId, path: &Path) -> Option<TypeId> {
        match self.ws.resolve(pkg, file, path) {
            Some((_, Declared::Type(def))) => {
                let def = *def;
                self.ws.types.find(&TypeKind::Named(def))
            }
            _ => None,
        }
    }

    /// Rejects value expressions that are not simple: anything but
    /// literals, composite literals, references, unary `&`/`*`, binary
    /// arithmetic, and type conversions.
    fn check_simple(
        &self,
        pkg: PackageId,
        file: SourceId,
        expr: &Expr,
    ) -> Result<(), AnalysisError> {
        match &expr.kind {
            ExprKind::IntLit(_)
            | ExprKind::FloatLit(_)
            | ExprKind::BoolLit(_)
            | ExprKind::StringLit(_)
            | ExprKind::Ref(_) => Ok(()),
            ExprKind::Composite { fields, .. } => {
                for (_, field) in fields {
                    self.check_simple(pkg, file, field)?;
                }
                Ok(())
            }
            ExprKind::Unary(_, inner) => self.check_simple(pkg, file, inner),
            ExprKind::Binary(_, left, right) => {
                self.check_simple(pkg, file, left)?;
                self.check_simple(pkg, file, right)
            }
            ExprKind::Call { callee, args } => {
                // Only type conversions are acceptable calls.
                if self.type_ref(pkg, file, callee).is_none() {
                    return Err(AnalysisError::InvalidValueExpression {
                        span: expr.span,
                        reason: "argument to value is too complex".to_string(),
                    });
                }
                for arg in args {
                    self.check_simple(pkg, file, arg)?;
                }
                Ok(())
            }
        }
    }

    /// The type of a simple value expression.
    fn type_of_expr(
        &self,
        pkg: PackageId,
        file: SourceId,
        expr: &Expr,
    ) -> Result<TypeId, AnalysisError> {
        let store = &self.ws.types;
        let too_complex = |span| AnalysisError::InvalidValueExpression {
            span,
            reason: "argument to value is too complex".to_string(),
        };
        match &expr.kind {
            ExprKind::IntLit(_) => Ok(store.basic(crate::types::Basic::Int)),
            ExprKind::FloatLit(_) => Ok(store.basic(crate::types::Basic::Float)),
            ExprKind::BoolLit(_) => Ok(store.basic(crate::types::Basic::Bool)),
            ExprKind::StringLit(_) => Ok(store.basic(crate::types::Basic::String)),
            ExprKind::Ref(path) => match self.ws.resolve(pkg, file, path) {
                Some((_, Declared::Const(id))) => Ok(self.ws.constant(*id).ty),
                _ => Err(AnalysisError::InvalidValueExpression {
                    span: expr.span,
                    reason: format!("`{}` is not a value", path),
                }),
            },
            ExprKind::Composite { ty, .. } => {
                let Some(named) = self.type_ref_path(pkg, file, ty) else {
                    return Err(AnalysisError::InvalidValueExpression {
                        span: expr.span,
                        reason: format!("unknown type `{}`", ty),
                    });
                };
                if store.struct_fields(named).is_none() {
                    return Err(AnalysisError::InvalidValueExpression {
                        span: expr.span,
                        reason: format!("{} is not a struct type", store.display(named)),
                    });
                }
                Ok(named)
            }
            ExprKind::Unary(UnaryOp::Addr, inner) => {
                let inner_ty = self.type_of_expr(pkg, file, inner)?;
                store
                    .find(&TypeKind::Pointer(inner_ty))
                    .ok_or_else(|| too_complex(expr.span))
            }
            ExprKind::Unary(UnaryOp::Star, inner) => {
                let inner_ty = self.type_of_expr(pkg, file, inner)?;
                match store.kind(inner_ty) {
                    TypeKind::Pointer(elem) => Ok(*elem),
                    _ => Err(too_complex(expr.span)),
                }
            }
            ExprKind::Binary(_, left, _) => self.type_of_expr(pkg, file, left),
            ExprKind::Call { callee, args } => {
                let Some(target) = self.type_ref(pkg, file, callee) else {
                    return Err(too_complex(expr.span));
                };
                if args.len() != 1 {
                    return Err(too_complex(expr.span));
                }
                self.type_of_expr(pkg, file, &args[0])?;
                Ok(target)
            }
        }
    }
}

fn is_primitive(callee: &Expr, name: &str) -> bool {
    matches!(
        &callee.kind,
        ExprKind::Ref(Path {
            qualifier: None,
            name: n,
        }) if n == name
    )
}

/// Recognizes an injector stub body: exactly one expression statement
/// that is a `build(…)` call, optionally wrapped in `panic(…)`, with bare
/// returns allowed. A `build` call mixed with other statements is an
/// error; anything else is silently not an injector.
fn recognize_stub(body: &[Stmt], fn_span: Span) -> Result<Option<&Expr>, AnalysisError> {
    let mut exprs = Vec::new();
    for stmt in body {
        match stmt {
            Stmt::Expr(e) => exprs.push(e),
            Stmt::Return(_) => {}
        }
    }
    let build_calls: Vec<&Expr> = exprs.iter().filter_map(|e| unwrap_build(*e)).collect();
    if build_calls.is_empty() {
        return Ok(None);
    }
    if exprs.len() != 1 {
        return Err(AnalysisError::MixedStubStatements { span: fn_span });
    }
    Ok(Some(build_calls[0]))
}

/// Peels an optional `panic(…)` wrapper and returns the `build(…)` call.
fn unwrap_build(expr: &Expr) -> Option<&Expr> {
    if let ExprKind::Call { callee, args } = &expr.kind {
        if is_primitive(callee, "panic") && args.len() == 1 {
            return unwrap_build(&args[0]);
        }
        if is_primitive(callee, "build") {
            return Some(expr);
        }
    }
    None
}
