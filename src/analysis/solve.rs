//! The call-plan solver: a topological sort of the provider graph rooted
//! at the injector's output type, by iterative depth-first search with
//! argument-order reversal. Acyclicity has already been enforced, so the
//! stack drains.

#[cfg(test)]
mod test;

use super::ir::{Call, CallKind, Injector, MemberSource, ProvidedBy, ProviderSet};
use super::{sets, AnalysisError, TraceHop};
use crate::types::{TypeId, TypeStore};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// A solved plan plus the provider-map keys it visited, for the
/// unused-member pass.
#[derive(Debug)]
pub struct Solution {
    pub calls: Vec<Call>,
    pub used: HashSet<TypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    At(usize),
    Errored,
}

struct Frame {
    ty: TypeId,
    parent: Option<usize>,
}

/// Finds the sequence of calls required to produce the injector's output
/// type from its arguments. All independent errors are collected before
/// returning.
pub fn solve(store: &TypeStore, injector: &Injector) -> Result<Solution, Vec<AnalysisError>> {
    let set = &injector.set;
    let mut errors = Vec::new();

    // Input pre-checks: duplicate argument types, and arguments the set
    // already provides.
    for (i, (_, g)) in injector.params.iter().enumerate() {
        for (_, h) in &injector.params[..i] {
            if g == h {
                errors.push(AnalysisError::DuplicateInjectorInput {
                    span: injector.span,
                    ty: store.display(*g),
                });
            }
        }
    }
    for (_, g) in &injector.params {
        if let Some(entry) = set.entry(*g) {
            let what = match &entry.by {
                ProvidedBy::Provider(p) => format!("provider {}", p.symbol),
                ProvidedBy::Value(_) => "value".to_string(),
            };
            let mut previous = Vec::new();
            sets::trace(store, &set.source_map, *g, &mut previous);
            errors.push(AnalysisError::InputShadowsProvider {
                span: injector.span,
                ty: store.display(*g),
                what,
                previous,
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let n_params = injector.params.len();
    let mut index: HashMap<TypeId, Slot> = HashMap::new();
    for (i, (_, g)) in injector.params.iter().enumerate() {
        index.insert(*g, Slot::At(i));
    }

    let mut calls: Vec<Call> = Vec::new();
    let mut used: HashSet<TypeId> = HashSet::new();
    let mut frames: Vec<Frame> = vec![Frame {
        ty: injector.out,
        parent: None,
    }];
    let mut stk: Vec<usize> = vec![0];

    while let Some(fi) = stk.pop() {
        let (curr, parent) = (frames[fi].ty, frames[fi].parent);
        if index.contains_key(&curr) {
            continue;
        }
        let Some(entry) = set.entry(curr) else {
            let injector_output = parent.is_none();
            let chain = requirement_chain(store, set, &frames, parent);
            let span = match parent {
                None => Some(injector.span),
                Some(p) => member_span(set, frames[p].ty),
            };
            errors.push(AnalysisError::MissingProvider {
                span,
                ty: store.display(curr),
                injector_output,
                chain,
            });
            index.insert(curr, Slot::Errored);
            continue;
        };
        used.insert(curr);
        match &entry.by {
            ProvidedBy::Value(v) => {
                if v.out == curr {
                    index.insert(curr, Slot::At(n_params + calls.len()));
                    calls.push(Call {
                        kind: CallKind::ValueExpr,
                        out: curr,
                        symbol: None,
                        args: Vec::new(),
                        ins: Vec::new(),
                        fields: Vec::new(),
                        has_cleanup: false,
                        has_err: false,
                        value: Some(v.clone()),
                    });
                } else {
                    // Interface binding backed by a value: share its slot.
                    match index.get(&v.out) {
                        Some(slot) => {
                            let slot = *slot;
                            index.insert(curr, slot);
                        }
                        None => {
                            let target = v.out;
                            stk.push(fi);
                            frames.push(Frame {
                                ty: target,
                                parent: Some(fi),
                            });
                            stk.push(frames.len() - 1);
                        }
                    }
                }
            }
            ProvidedBy::Provider(p) => {
                let concrete = entry.concrete;
                if concrete != curr {
                    // Interface binding: no call of our own.
                    match index.get(&concrete) {
                        Some(slot) => {
                            let slot = *slot;
                            index.insert(curr, slot);
                        }
                        None => {
                            stk.push(fi);
                            frames.push(Frame {
                                ty: concrete,
                                parent: Some(fi),
                            });
                            stk.push(frames.len() - 1);
                        }
                    }
                    continue;
                }
                // Ensure all argument types are indexed; if not, revisit
                // after pushing them in reverse so calls are added in
                // argument order.
                let p = p.clone();
                let mut revisit = false;
                for arg in p.args.iter().rev() {
                    if !index.contains_key(&arg.ty) {
                        if !revisit {
                            stk.push(fi);
                            revisit = true;
                        }
                        frames.push(Frame {
                            ty: arg.ty,
                            parent: Some(fi),
                        });
                        stk.push(frames.len() - 1);
                    }
                }
                if revisit {
                    continue;
                }
                let mut args = Vec::with_capacity(p.args.len());
                let mut errored = false;
                for arg in &p.args {
                    match index[&arg.ty] {
                        Slot::At(slot) => args.push(slot),
                        Slot::Errored => errored = true,
                    }
                }
                if errored {
                    index.insert(curr, Slot::Errored);
                    continue;
                }
                index.insert(curr, Slot::At(n_params + calls.len()));
                calls.push(Call {
                    kind: if p.is_struct {
                        CallKind::StructLit
                    } else {
                        CallKind::Func
                    },
                    out: curr,
                    symbol: Some(p.symbol.clone()),
                    args,
                    ins: p.args.iter().map(|a| a.ty).collect(),
                    fields: if p.is_struct {
                        p.args.iter().map(|a| a.name.clone()).collect()
                    } else {
                        Vec::new()
                    },
                    has_cleanup: p.has_cleanup,
                    has_err: p.has_err,
                    value: None,
                });
            }
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    // Signature compatibility: cleanup and error flow from calls to the
    // injector declaration.
    for call in &calls {
        if call.has_cleanup && !injector.has_cleanup {
            errors.push(AnalysisError::UnexpectedCleanup {
                span: injector.span,
                injector: injector.symbol.name.clone(),
                ty: store.display(call.out),
            });
        }
        if call.has_err && !injector.has_err {
            errors.push(AnalysisError::UnexpectedError {
                span: injector.span,
                injector: injector.symbol.name.clone(),
                ty: store.display(call.out),
            });
        }
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    Ok(Solution { calls, used })
}

fn member_span(set: &ProviderSet, ty: TypeId) -> Option<crate::parser::ast::Span> {
    match set.source_map.get(&ty)? {
        MemberSource::Provider(p) => Some(p.span),
        MemberSource::Value(v) => Some(v.span),
        MemberSource::Binding(b) => Some(b.span),
        MemberSource::Import(imp) => Some(imp.span),
    }
}

/// The chain of requirements leading to a missing type, outermost
/// requirement last.
fn requirement_chain(
    store: &TypeStore,
    set: &ProviderSet,
    frames: &[Frame],
    mut parent: Option<usize>,
) -> Vec<TraceHop> {
    let mut chain = Vec::new();
    while let Some(fi) = parent {
        let ty = frames[fi].ty;
        if let Some(span) = member_span(set, ty) {
            chain.push(TraceHop {
                message: format!("required by provider of {}", store.display(ty)),
                span,
            });
        }
        parent = frames[fi].parent;
    }
    chain
}

/// Compares the solver's used-key record against the set's direct
/// members; imported sets' internal members are not inspected.
pub fn check_unused(
    store: &TypeStore,
    set: &ProviderSet,
    used: &HashSet<TypeId>,
) -> Vec<AnalysisError> {
    let mut diags = Vec::new();
    for imp in &set.imports {
        let hit = set.source_map.iter().any(|(key, src)| {
            matches!(src, MemberSource::Import(si) if Rc::ptr_eq(&si.set, &imp.set))
                && used.contains(key)
        });
        if !hit {
            diags.push(AnalysisError::UnusedMember {
                span: imp.span,
                kind: "provider set",
                name: imp.set.id_string(),
            });
        }
    }
    for p in &set.providers {
        if !p.outputs().any(|out| used.contains(&out)) {
            diags.push(AnalysisError::UnusedMember {
                span: p.span,
                kind: "provider",
                name: p.symbol.to_string(),
            });
        }
    }
    for v in &set.values {
        if !used.contains(&v.out) {
            diags.push(AnalysisError::UnusedMember {
                span: v.span,
                kind: "value",
                name: store.display(v.out),
            });
        }
    }
    for b in &set.bindings {
        if !used.contains(&b.iface) {
            diags.push(AnalysisError::UnusedMember {
                span: b.span,
                kind: "binding",
                name: store.display(b.iface),
            });
        }
    }
    diags
}
