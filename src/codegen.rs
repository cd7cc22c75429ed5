//! The printer: serializes solved call plans back into a generated
//! source file, with disambiguated identifiers and rewritten package
//! references.

use crate::analysis::ir::{Call, CallKind, Injector, Value};
use crate::loader::{Package, PackageId, Workspace};
use crate::parser::ast::{BinOp, Expr, ExprKind, Path, SourceId, UnaryOp};
use crate::types::{Basic, TypeId, TypeKind};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

/// Emits the generated file for a package, or `None` when it has no
/// injectors. Output is deterministic: re-running generation over
/// unchanged inputs is byte-identical.
pub fn generate_package(
    ws: &Workspace,
    pkg: &Package,
    injectors: &[(Injector, Vec<Call>)],
) -> Option<String> {
    if injectors.is_empty() {
        return None;
    }
    let mut gen = Generator::new(ws, pkg);

    // First pass for side effects only: it fills the import table and the
    // hoisted value bindings so the real pass disambiguates against the
    // complete file scope.
    for (injector, calls) in injectors {
        let _ = gen.inject_fn(injector, calls);
    }
    let mut bodies = String::new();
    for (injector, calls) in injectors {
        bodies.push_str(&gen.inject_fn(injector, calls));
    }

    let mut out = String::new();
    out.push_str("// Code generated by solder. DO NOT EDIT.\n\n");
    out.push_str("#:unless inject\n\n");
    out.push_str(&format!("package {}\n\n", pkg.name));
    if !gen.imports.is_empty() {
        for (path, alias) in &gen.imports {
            out.push_str(&format!("import {} {:?}\n", alias, path));
        }
        out.push('\n');
    }
    if !gen.pending_values.is_empty() {
        for (name, text) in &gen.pending_values {
            out.push_str(&format!("let {} = {}\n", name, text));
        }
        out.push('\n');
    }
    out.push_str(bodies.trim_end());
    out.push('\n');
    Some(out)
}

struct Generator<'w> {
    ws: &'w Workspace,
    pkg: &'w Package,
    /// import path -> local alias, emitted sorted by path.
    imports: BTreeMap<String, String>,
    /// `(file, span)` of a value expression -> hoisted binding name.
    value_names: HashMap<(SourceId, usize, usize), String>,
    pending_values: Vec<(String, String)>,
    file_scope: HashSet<String>,
}

impl<'w> Generator<'w> {
    fn new(ws: &'w Workspace, pkg: &'w Package) -> Self {
        Generator {
            ws,
            pkg,
            imports: BTreeMap::new(),
            value_names: HashMap::new(),
            pending_values: Vec::new(),
            file_scope: pkg.scope.keys().cloned().collect(),
        }
    }

    fn name_in_file_scope(&self, name: &str) -> bool {
        self.file_scope.contains(name)
    }

    fn qualify_import(&mut self, path: &str) -> String {
        if let Some(alias) = self.imports.get(path) {
            return alias.clone();
        }
        let default = path.rsplit('/').next().unwrap_or(path).to_string();
        // Don't let an import take the `err` name.
        let alias = disambiguate(&default, |n| n == "err" || self.name_in_file_scope(n));
        self.imports.insert(path.to_string(), alias.clone());
        self.file_scope.insert(alias.clone());
        alias
    }

    fn type_string(&mut self, t: TypeId) -> String {
        match self.ws.types.kind(t).clone() {
            TypeKind::Basic(b) => b.name().to_string(),
            TypeKind::Pointer(inner) => format!("*{}", self.type_string(inner)),
            TypeKind::Named(def) => {
                let sym = self.ws.types.def(def).symbol.clone();
                if sym.import_path == self.pkg.path {
                    sym.name
                } else {
                    let alias = self.qualify_import(&sym.import_path);
                    format!("{}.{}", alias, sym.name)
                }
            }
        }
    }

    fn symbol_string(&mut self, import_path: &str, name: &str) -> String {
        if import_path == self.pkg.path {
            name.to_string()
        } else {
            let alias = self.qualify_import(import_path);
            format!("{}.{}", alias, name)
        }
    }

    /// The shortest expression evaluating to the zero value of a type.
    fn zero_value(&mut self, t: TypeId) -> String {
        match self.ws.types.kind(t).clone() {
            TypeKind::Basic(Basic::Int) => "0".to_string(),
            TypeKind::Basic(Basic::Float) => "0.0".to_string(),
            TypeKind::Basic(Basic::Bool) => "false".to_string(),
            TypeKind::Basic(Basic::String) => "\"\"".to_string(),
            TypeKind::Pointer(_) => "nil".to_string(),
            TypeKind::Named(_) => {
                if self.ws.types.is_interface(t) {
                    "nil".to_string()
                } else {
                    format!("{}{{}}", self.type_string(t))
                }
            }
        }
    }

    /// The hoisted binding name for a value expression, assigning it (and
    /// rendering the expression) on first use.
    fn value_name(&mut self, value: &Rc<Value>) -> String {
        let key = (value.file, value.span.start, value.span.end);
        if let Some(name) = self.value_names.get(&key) {
            return name.clone();
        }
        let base = format!(
            "_solder{}Value",
            export(&type_variable_name(self.ws, value.out))
        );
        let name = disambiguate(&base, |n| self.name_in_file_scope(n));
        self.value_names.insert(key, name.clone());
        self.file_scope.insert(name.clone());
        let text = match self.ws.package_of_file(value.file) {
            Some(def_pkg) => self.expr_string(def_pkg, value.file, &value.expr),
            None => String::new(),
        };
        self.pending_values.push((name.clone(), text));
        name
    }

    fn ref_string(&mut self, def_pkg: PackageId, file: SourceId, path: &Path) -> String {
        match self.ws.resolve(def_pkg, file, path) {
            Some((target, _)) => {
                let target_path = self.ws.pkg(target).path.clone();
                self.symbol_string(&target_path, &path.name)
            }
            None => path.to_string(),
        }
    }

    /// Renders a value expression, re-qualifying references for the
    /// generated file's import table.
    fn expr_string(&mut self, def_pkg: PackageId, file: SourceId, expr: &Expr) -> String {
        match &expr.kind {
            ExprKind::IntLit(i) => i.to_string(),
            ExprKind::FloatLit(d) => format!("{:?}", d),
            ExprKind::BoolLit(b) => b.to_string(),
            ExprKind::StringLit(s) => quote_string(s),
            ExprKind::Ref(path) => self.ref_string(def_pkg, file, path),
            ExprKind::Composite { ty, fields } => {
                let ty_s = self.ref_string(def_pkg, file, ty);
                if fields.is_empty() {
                    format!("{}{{}}", ty_s)
                } else {
                    let rendered: Vec<String> = fields
                        .iter()
                        .map(|(name, value)| {
                            format!("{}: {}", name, self.expr_string(def_pkg, file, value))
                        })
                        .collect();
                    format!("{}{{{}}}", ty_s, rendered.join(", "))
                }
            }
            ExprKind::Unary(UnaryOp::Addr, inner) => {
                format!("&{}", self.expr_string(def_pkg, file, inner))
            }
            ExprKind::Unary(UnaryOp::Star, inner) => {
                format!("*{}", self.expr_string(def_pkg, file, inner))
            }
            ExprKind::Binary(op, left, right) => {
                let op_s = match op {
                    BinOp::Add => "+",
                    BinOp::Sub => "-",
                    BinOp::Mul => "*",
                    BinOp::Div => "/",
                };
                format!(
                    "{} {} {}",
                    self.operand_string(def_pkg, file, left),
                    op_s,
                    self.operand_string(def_pkg, file, right)
                )
            }
            ExprKind::Call { callee, args } => {
                let callee_s = self.expr_string(def_pkg, file, callee);
                let rendered: Vec<String> = args
                    .iter()
                    .map(|a| self.expr_string(def_pkg, file, a))
                    .collect();
                format!("{}({})", callee_s, rendered.join(", "))
            }
        }
    }

    fn operand_string(&mut self, def_pkg: PackageId, file: SourceId, expr: &Expr) -> String {
        let rendered = self.expr_string(def_pkg, file, expr);
        if matches!(expr.kind, ExprKind::Binary(..)) {
            format!("({})", rendered)
        } else {
            rendered
        }
    }

    /// Emits one injector function.
    fn inject_fn(&mut self, injector: &Injector, calls: &[Call]) -> String {
        let mut out = String::new();
        let param_names: Vec<String> = injector.params.iter().map(|(n, _)| n.clone()).collect();
        let err_var = {
            let params = &param_names;
            disambiguate("err", |n| {
                params.iter().any(|p| p == n) || self.name_in_file_scope(n)
            })
        };

        out.push_str(&format!("fn {}(", injector.symbol.name));
        for (i, (name, ty)) in injector.params.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let ty_s = self.type_string(*ty);
            out.push_str(&format!("{}: {}", name, ty_s));
        }
        let out_s = self.type_string(injector.out);
        let result_s = match (injector.has_cleanup, injector.has_err) {
            (false, false) => out_s.clone(),
            (true, false) => format!("({}, cleanup)", out_s),
            (false, true) => format!("({}, error)", out_s),
            (true, true) => format!("({}, cleanup, error)", out_s),
        };
        out.push_str(&format!("): {} {{\n", result_s));

        let mut locals: Vec<String> = Vec::new();
        let mut cleanups: Vec<String> = Vec::new();
        for call in calls {
            let lname = {
                let base = unexport(&type_variable_name(self.ws, call.out));
                let base = if base.is_empty() { "v".to_string() } else { base };
                let params = &param_names;
                let locals_ref = &locals;
                let cleanups_ref = &cleanups;
                let err_ref = &err_var;
                disambiguate(&base, |n| {
                    n == err_ref
                        || params.iter().any(|p| p == n)
                        || locals_ref.iter().any(|l| l == n)
                        || cleanups_ref.iter().any(|c| c == n)
                        || self.name_in_file_scope(n)
                })
            };
            locals.push(lname.clone());
            match call.kind {
                CallKind::Func => {
                    self.func_call(&mut out, injector, call, &lname, &param_names, &locals,
                        &mut cleanups, &err_var);
                }
                CallKind::StructLit => {
                    self.struct_call(&mut out, call, &lname, &param_names, &locals);
                }
                CallKind::ValueExpr => {
                    let value = call
                        .value
                        .as_ref()
                        .expect("value-expression calls carry their value");
                    let vname = self.value_name(value);
                    out.push_str(&format!("\tlet {} = {}\n", lname, vname));
                }
            }
        }

        if calls.is_empty() {
            for (i, (_, ty)) in injector.params.iter().enumerate() {
                if *ty == injector.out {
                    out.push_str(&format!("\treturn {}", param_names[i]));
                    break;
                }
            }
        } else {
            out.push_str(&format!("\treturn {}", locals[calls.len() - 1]));
        }
        if injector.has_cleanup {
            out.push_str(", fn() {\n");
            for cleanup in cleanups.iter().rev() {
                out.push_str(&format!("\t\t{}()\n", cleanup));
            }
            out.push_str("\t}");
        }
        if injector.has_err {
            out.push_str(", nil");
        }
        out.push_str("\n}\n\n");
        out
    }

    #[allow(clippy::too_many_arguments)]
    fn func_call(
        &mut self,
        out: &mut String,
        injector: &Injector,
        call: &Call,
        lname: &str,
        param_names: &[String],
        locals: &[String],
        cleanups: &mut Vec<String>,
        err_var: &str,
    ) {
        let prev_cleanup = cleanups.len();
        out.push_str(&format!("\tlet {}", lname));
        if call.has_cleanup {
            let cname = {
                let locals_ref = &*locals;
                let cleanups_ref = &*cleanups;
                disambiguate("cleanup", |n| {
                    n == err_var
                        || param_names.iter().any(|p| p == n)
                        || locals_ref.iter().any(|l| l == n)
                        || cleanups_ref.iter().any(|c| c == n)
                        || self.name_in_file_scope(n)
                })
            };
            out.push_str(&format!(", {}", cname));
            cleanups.push(cname);
        }
        if call.has_err {
            out.push_str(&format!(", {}", err_var));
        }
        let symbol = call
            .symbol
            .as_ref()
            .expect("function calls carry their symbol");
        let import_path = symbol.import_path.clone();
        let name = symbol.name.clone();
        out.push_str(&format!(" = {}(", self.symbol_string(&import_path, &name)));
        for (i, &arg) in call.args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(local_or_param(arg, param_names, locals));
        }
        out.push_str(")\n");
        if call.has_err {
            out.push_str(&format!("\tif {} {{\n", err_var));
            for cleanup in cleanups[..prev_cleanup].iter().rev() {
                out.push_str(&format!("\t\t{}()\n", cleanup));
            }
            let zero = self.zero_value(injector.out);
            out.push_str(&format!("\t\treturn {}", zero));
            if injector.has_cleanup {
                out.push_str(", nil");
            }
            out.push_str(&format!(", {}\n", err_var));
            out.push_str("\t}\n");
        }
    }

    fn struct_call(
        &mut self,
        out: &mut String,
        call: &Call,
        lname: &str,
        param_names: &[String],
        locals: &[String],
    ) {
        let symbol = call
            .symbol
            .as_ref()
            .expect("struct literals carry their symbol");
        let import_path = symbol.import_path.clone();
        let name = symbol.name.clone();
        let is_pointer = matches!(self.ws.types.kind(call.out), TypeKind::Pointer(_));
        let amp = if is_pointer { "&" } else { "" };
        out.push_str(&format!(
            "\tlet {} = {}{}{{\n",
            lname,
            amp,
            self.symbol_string(&import_path, &name)
        ));
        for (i, &arg) in call.args.iter().enumerate() {
            out.push_str(&format!(
                "\t\t{}: {},\n",
                call.fields[i],
                local_or_param(arg, param_names, locals)
            ));
        }
        out.push_str("\t}\n");
    }
}

fn local_or_param<'a>(arg: usize, param_names: &'a [String], locals: &'a [String]) -> &'a str {
    if arg < param_names.len() {
        &param_names[arg]
    } else {
        &locals[arg - param_names.len()]
    }
}

/// Invents a variable name from the type name, or an empty string.
fn type_variable_name(ws: &Workspace, t: TypeId) -> String {
    match ws.types.kind(t) {
        TypeKind::Pointer(inner) => type_variable_name(ws, *inner),
        TypeKind::Basic(b) => b.name().to_string(),
        TypeKind::Named(def) => ws.types.def(*def).symbol.name.clone(),
    }
}

fn unexport(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

fn export(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Picks a unique name, preferring `name` if it is already unique.
fn disambiguate(name: &str, collides: impl Fn(&str) -> bool) -> String {
    if !collides(name) {
        return name.to_string();
    }
    let mut base = name.to_string();
    if base.ends_with(|c: char| c.is_ascii_digit()) {
        base.push('_');
    }
    let mut n = 2usize;
    loop {
        let candidate = format!("{}{}", base, n);
        if !collides(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disambiguate() {
        assert_eq!(disambiguate("foo", |_| false), "foo");
        assert_eq!(disambiguate("foo", |n| n == "foo"), "foo2");
        assert_eq!(
            disambiguate("foo", |n| n == "foo" || n == "foo2"),
            "foo3"
        );
        assert_eq!(disambiguate("v2", |n| n == "v2"), "v2_2");
    }

    #[test]
    fn test_unexport_export() {
        assert_eq!(unexport("FooBar"), "fooBar");
        assert_eq!(unexport("foo"), "foo");
        assert_eq!(export("fooBar"), "FooBar");
        assert_eq!(export(""), "");
    }

    #[test]
    fn test_quote_string() {
        assert_eq!(quote_string("hi"), "\"hi\"");
        assert_eq!(quote_string("a\"b\\c\n"), "\"a\\\"b\\\\c\\n\"");
    }
}
