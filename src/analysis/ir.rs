//! Immutable IR records produced by lowering. Provider sets share their
//! imported sets by `Rc`; nothing here is mutated after construction.

use crate::parser::ast::{Expr, SourceId, Span};
use crate::types::{Symbol, TypeId};
use std::collections::BTreeMap;
use std::rc::Rc;

/// An input of a provider: the type plus the parameter or field name.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderInput {
    pub ty: TypeId,
    pub name: String,
}

/// A producer of a type: a function, or a named struct type whose
/// constructor is implicit. Struct providers carry both the value and
/// pointer output; the plan selects whichever is requested.
#[derive(Debug, Clone, PartialEq)]
pub struct Provider {
    pub symbol: Symbol,
    pub span: Span,
    pub args: Vec<ProviderInput>,
    pub is_struct: bool,
    pub out: TypeId,
    /// `Some` only for struct providers: the pointer-to-struct output.
    pub ptr_out: Option<TypeId>,
    pub has_cleanup: bool,
    pub has_err: bool,
}

impl Provider {
    pub fn provides(&self, ty: TypeId) -> bool {
        self.out == ty || self.ptr_out == Some(ty)
    }

    /// One output for function providers, two for struct providers.
    pub fn outputs(&self) -> impl Iterator<Item = TypeId> + '_ {
        std::iter::once(self.out).chain(self.ptr_out)
    }
}

/// A constant-expression provider with no inputs. For interface values,
/// `out` is the interface type and the expression's type is the concrete.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub span: Span,
    pub out: TypeId,
    pub expr: Expr,
    /// The file the expression was written in, for import-alias resolution
    /// when the printer re-qualifies references.
    pub file: SourceId,
}

/// A declaration that an interface is satisfied by a concrete type.
#[derive(Debug, Clone, PartialEq)]
pub struct IfaceBinding {
    pub span: Span,
    pub iface: TypeId,
    pub provided: TypeId,
}

/// An imported set together with the position of the importing item.
#[derive(Debug, Clone)]
pub struct SetImport {
    pub set: Rc<ProviderSet>,
    pub span: Span,
}

/// What a provider-map entry is backed by.
#[derive(Debug, Clone)]
pub enum ProvidedBy {
    Provider(Rc<Provider>),
    Value(Rc<Value>),
}

/// One entry of a built provider map: the backing member plus the
/// concrete type that ultimately satisfies the entry's key.
#[derive(Debug, Clone)]
pub struct ProvidedType {
    pub concrete: TypeId,
    pub by: ProvidedBy,
}

/// The member that introduced a provider-map key, for diagnostics only.
/// Entries introduced through an import chain to the imported set's own
/// source map.
#[derive(Debug, Clone)]
pub enum MemberSource {
    Provider(Rc<Provider>),
    Value(Rc<Value>),
    Binding(Rc<IfaceBinding>),
    Import(SetImport),
}

/// A named or inline collection of providers, values, bindings, and
/// imported sets, with its derived maps.
#[derive(Debug)]
pub struct ProviderSet {
    pub span: Span,
    pub pkg_path: String,
    /// Empty when the set was declared inline at an injector site.
    pub var_name: String,
    pub providers: Vec<Rc<Provider>>,
    pub bindings: Vec<Rc<IfaceBinding>>,
    pub values: Vec<Rc<Value>>,
    pub imports: Vec<SetImport>,
    /// Derived: output type to its producer, including all imported types.
    pub provider_map: BTreeMap<TypeId, ProvidedType>,
    /// Derived: where each key of `provider_map` came from.
    pub source_map: BTreeMap<TypeId, MemberSource>,
}

impl ProviderSet {
    /// The provider or value for the given type, if any.
    pub fn entry(&self, ty: TypeId) -> Option<&ProvidedType> {
        self.provider_map.get(&ty)
    }

    /// `"path".Name` for named sets, the package path otherwise.
    pub fn id_string(&self) -> String {
        if self.var_name.is_empty() {
            format!("{:?}", self.pkg_path)
        } else {
            format!("{:?}.{}", self.pkg_path, self.var_name)
        }
    }
}

/// An injector stub: the declared signature plus the set it builds.
#[derive(Debug)]
pub struct Injector {
    pub symbol: Symbol,
    pub span: Span,
    pub file: SourceId,
    pub params: Vec<(String, TypeId)>,
    pub out: TypeId,
    pub has_cleanup: bool,
    pub has_err: bool,
    pub set: Rc<ProviderSet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Call an ordinary provider function.
    Func,
    /// Construct a struct literal (value or pointer form, per `out`).
    StructLit,
    /// Reference a hoisted value expression.
    ValueExpr,
}

/// One step of an injector plan. `args` index the injector's arguments
/// (`i < N`) or the outputs of earlier calls (`N + j`).
#[derive(Debug, Clone)]
pub struct Call {
    pub kind: CallKind,
    pub out: TypeId,
    pub symbol: Option<Symbol>,
    pub args: Vec<usize>,
    pub ins: Vec<TypeId>,
    /// Field names, 1:1 with `args`; struct literals only.
    pub fields: Vec<String>,
    pub has_cleanup: bool,
    pub has_err: bool,
    pub value: Option<Rc<Value>>,
}
