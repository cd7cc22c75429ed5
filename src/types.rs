//! Interned type handles with definitional identity.
//!
//! Types are compared by `TypeId` handle, never by printed form; the
//! printed form exists only for diagnostics and generated code.

use crate::parser::ast::Span;
use std::collections::HashMap;
use std::fmt;

/// An interned type handle. Two types are identical iff their handles are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub usize);

/// A named-type definition handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DefId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Basic {
    Int,
    Float,
    Bool,
    String,
}

impl Basic {
    pub fn name(self) -> &'static str {
        match self {
            Basic::Int => "int",
            Basic::Float => "float",
            Basic::Bool => "bool",
            Basic::String => "string",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Basic(Basic),
    Named(DefId),
    Pointer(TypeId),
}

/// A `(import_path, name)` pair identifying an exported function or named type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Symbol {
    pub import_path: String,
    pub name: String,
}

impl Symbol {
    pub fn new(import_path: impl Into<String>, name: impl Into<String>) -> Self {
        Symbol {
            import_path: import_path.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.import_path.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}.{}", self.import_path, self.name)
        }
    }
}

/// One entry of a function or method result list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultAtom {
    Type(TypeId),
    Error,
    Cleanup,
}

/// A resolved method signature, used both for interface members and for
/// method declarations on concrete types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<TypeId>,
    pub results: Vec<ResultAtom>,
}

#[derive(Debug, Clone)]
pub enum DefDetail {
    Struct { fields: Vec<(String, TypeId)> },
    Interface { methods: Vec<MethodSig> },
}

#[derive(Debug, Clone)]
pub struct NamedDef {
    pub symbol: Symbol,
    pub span: Span,
    pub detail: Option<DefDetail>,
}

#[derive(Debug, Clone)]
struct Method {
    receiver: TypeId,
    sig: MethodSig,
}

/// The interner for all types seen during a load. Created once per load
/// invocation and discarded with it.
#[derive(Debug)]
pub struct TypeStore {
    kinds: Vec<TypeKind>,
    lookup: HashMap<TypeKind, TypeId>,
    defs: Vec<NamedDef>,
    methods: Vec<Method>,
}

impl TypeStore {
    pub fn new() -> Self {
        let mut store = TypeStore {
            kinds: Vec::new(),
            lookup: HashMap::new(),
            defs: Vec::new(),
            methods: Vec::new(),
        };
        for basic in [Basic::Int, Basic::Float, Basic::Bool, Basic::String] {
            store.intern(TypeKind::Basic(basic));
        }
        store
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let Some(&id) = self.lookup.get(&kind) {
            return id;
        }
        let id = TypeId(self.kinds.len());
        self.kinds.push(kind.clone());
        self.lookup.insert(kind, id);
        id
    }

    /// Looks up an already-interned type without interning it.
    pub fn find(&self, kind: &TypeKind) -> Option<TypeId> {
        self.lookup.get(kind).copied()
    }

    /// Every interned type id, in interning order.
    pub fn all_ids(&self) -> impl Iterator<Item = TypeId> {
        (0..self.kinds.len()).map(TypeId)
    }

    pub fn basic(&self, basic: Basic) -> TypeId {
        self.find(&TypeKind::Basic(basic))
            .expect("basic types are interned at construction")
    }

    pub fn pointer_to(&mut self, inner: TypeId) -> TypeId {
        self.intern(TypeKind::Pointer(inner))
    }

    pub fn kind(&self, id: TypeId) -> &TypeKind {
        &self.kinds[id.0]
    }

    /// Declares a named type; its detail is filled in by a later pass.
    pub fn declare_named(&mut self, symbol: Symbol, span: Span) -> DefId {
        let def = DefId(self.defs.len());
        self.defs.push(NamedDef {
            symbol,
            span,
            detail: None,
        });
        def
    }

    pub fn named_type(&mut self, def: DefId) -> TypeId {
        self.intern(TypeKind::Named(def))
    }

    pub fn set_detail(&mut self, def: DefId, detail: DefDetail) {
        self.defs[def.0].detail = Some(detail);
    }

    pub fn def(&self, def: DefId) -> &NamedDef {
        &self.defs[def.0]
    }

    pub fn add_method(&mut self, receiver: TypeId, sig: MethodSig) {
        self.methods.push(Method { receiver, sig });
    }

    /// The definition behind a named type, if the type is one.
    pub fn as_named(&self, id: TypeId) -> Option<&NamedDef> {
        match self.kind(id) {
            TypeKind::Named(def) => Some(self.def(*def)),
            _ => None,
        }
    }

    pub fn is_interface(&self, id: TypeId) -> bool {
        matches!(
            self.as_named(id).and_then(|d| d.detail.as_ref()),
            Some(DefDetail::Interface { .. })
        )
    }

    pub fn struct_fields(&self, id: TypeId) -> Option<&[(String, TypeId)]> {
        match self.as_named(id).and_then(|d| d.detail.as_ref()) {
            Some(DefDetail::Struct { fields }) => Some(fields),
            _ => None,
        }
    }

    pub fn interface_methods(&self, id: TypeId) -> Option<&[MethodSig]> {
        match self.as_named(id).and_then(|d| d.detail.as_ref()) {
            Some(DefDetail::Interface { methods }) => Some(methods),
            _ => None,
        }
    }

    /// The method set of a type: a named type `T` carries its value-receiver
    /// methods; `*T` carries both value- and pointer-receiver methods.
    fn method_lookup(&self, id: TypeId, name: &str) -> Option<&MethodSig> {
        let candidates: (TypeId, Option<TypeId>) = match self.kind(id) {
            TypeKind::Pointer(inner) => (id, Some(*inner)),
            _ => (id, None),
        };
        self.methods
            .iter()
            .find(|m| {
                m.sig.name == name
                    && (m.receiver == candidates.0 || Some(m.receiver) == candidates.1)
            })
            .map(|m| &m.sig)
    }

    /// Definitional implements-check: every interface method must appear in
    /// the concrete type's method set with an identical signature.
    pub fn implements(&self, concrete: TypeId, iface: TypeId) -> bool {
        let Some(methods) = self.interface_methods(iface) else {
            return false;
        };
        methods.iter().all(|want| {
            self.method_lookup(concrete, &want.name)
                .is_some_and(|have| have.params == want.params && have.results == want.results)
        })
    }

    /// Diagnostic-only textual form.
    pub fn display(&self, id: TypeId) -> String {
        match self.kind(id) {
            TypeKind::Basic(b) => b.name().to_string(),
            TypeKind::Named(def) => self.def(*def).symbol.to_string(),
            TypeKind::Pointer(inner) => format!("*{}", self.display(*inner)),
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}
