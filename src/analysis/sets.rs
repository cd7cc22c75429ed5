//! Provider-map construction and the acyclicity check.

use super::ir::{MemberSource, ProvidedBy, ProvidedType, ProviderSet};
use super::{AnalysisError, TraceHop};
use crate::types::{TypeId, TypeStore};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{BTreeMap, HashMap};

/// Renders the provenance chain for a provider-map key: the member that
/// introduced it, following import hops into the originating set.
pub fn trace(
    store: &TypeStore,
    source_map: &BTreeMap<TypeId, MemberSource>,
    key: TypeId,
    out: &mut Vec<TraceHop>,
) {
    match source_map.get(&key) {
        None => {}
        Some(MemberSource::Provider(p)) => out.push(TraceHop {
            message: format!("provided by {}", p.symbol),
            span: p.span,
        }),
        Some(MemberSource::Value(v)) => out.push(TraceHop {
            message: "provided by value".to_string(),
            span: v.span,
        }),
        Some(MemberSource::Binding(b)) => {
            out.push(TraceHop {
                message: format!("bound to {}", store.display(b.provided)),
                span: b.span,
            });
            if b.provided != key {
                trace(store, source_map, b.provided, out);
            }
        }
        Some(MemberSource::Import(imp)) => {
            out.push(TraceHop {
                message: format!("imported from {}", imp.set.id_string()),
                span: imp.span,
            });
            trace(store, &imp.set.source_map, key, out);
        }
    }
}

fn conflict(
    store: &TypeStore,
    key: TypeId,
    span: crate::parser::ast::Span,
    source_map: &BTreeMap<TypeId, MemberSource>,
) -> AnalysisError {
    let mut previous = Vec::new();
    trace(store, source_map, key, &mut previous);
    AnalysisError::BindingConflict {
        span,
        ty: store.display(key),
        previous,
    }
}

/// Fills the set's `provider_map` and `source_map` from its member lists:
/// imports first, then providers and values, then bindings. All errors
/// are collected before returning.
pub fn build_provider_map(store: &TypeStore, set: &mut ProviderSet) -> Vec<AnalysisError> {
    let mut errors = Vec::new();
    let mut provider_map: BTreeMap<TypeId, ProvidedType> = BTreeMap::new();
    let mut source_map: BTreeMap<TypeId, MemberSource> = BTreeMap::new();

    for imp in &set.imports {
        for (key, entry) in &imp.set.provider_map {
            if provider_map.contains_key(key) {
                errors.push(conflict(store, *key, imp.span, &source_map));
                continue;
            }
            provider_map.insert(*key, entry.clone());
            source_map.insert(*key, MemberSource::Import(imp.clone()));
        }
    }

    for p in &set.providers {
        for out in p.outputs() {
            if provider_map.contains_key(&out) {
                errors.push(conflict(store, out, p.span, &source_map));
                continue;
            }
            provider_map.insert(
                out,
                ProvidedType {
                    concrete: out,
                    by: ProvidedBy::Provider(p.clone()),
                },
            );
            source_map.insert(out, MemberSource::Provider(p.clone()));
        }
    }

    for v in &set.values {
        if provider_map.contains_key(&v.out) {
            errors.push(conflict(store, v.out, v.span, &source_map));
            continue;
        }
        provider_map.insert(
            v.out,
            ProvidedType {
                concrete: v.out,
                by: ProvidedBy::Value(v.clone()),
            },
        );
        source_map.insert(v.out, MemberSource::Value(v.clone()));
    }

    // Bindings run last so the concrete type is already provided.
    for b in &set.bindings {
        if provider_map.contains_key(&b.iface) {
            errors.push(conflict(store, b.iface, b.span, &source_map));
            continue;
        }
        match provider_map.get(&b.provided) {
            None => errors.push(AnalysisError::MissingBindingTarget {
                span: b.span,
                ty: store.display(b.provided),
            }),
            Some(entry) => {
                let entry = entry.clone();
                provider_map.insert(b.iface, entry);
                source_map.insert(b.iface, MemberSource::Binding(b.clone()));
            }
        }
    }

    set.provider_map = provider_map;
    set.source_map = source_map;
    errors
}

/// Verifies the dependency graph derived from the provider map is acyclic.
/// Emits one diagnostic per strongly-connected component, with the trail.
pub fn verify_acyclic(store: &TypeStore, set: &ProviderSet) -> Vec<AnalysisError> {
    // Sort roots by textual representation so cycle diagnostics are stable.
    let mut keys: Vec<TypeId> = set.provider_map.keys().copied().collect();
    keys.sort_by_key(|k| store.display(*k));

    let mut graph: DiGraph<TypeId, ()> = DiGraph::new();
    let mut nodes: HashMap<TypeId, NodeIndex> = HashMap::new();
    for key in &keys {
        nodes.insert(*key, graph.add_node(*key));
    }
    for key in &keys {
        let entry = &set.provider_map[key];
        if let ProvidedBy::Provider(p) = &entry.by {
            for arg in &p.args {
                // Types with no map entry are injector inputs: leaves.
                if let Some(&to) = nodes.get(&arg.ty) {
                    graph.add_edge(nodes[key], to, ());
                }
            }
        }
    }

    let mut errors = Vec::new();
    for scc in tarjan_scc(&graph) {
        let cyclic =
            scc.len() > 1 || (scc.len() == 1 && graph.find_edge(scc[0], scc[0]).is_some());
        if !cyclic {
            continue;
        }
        let mut members = scc.clone();
        members.sort_by_key(|n| store.display(graph[*n]));
        let start = members[0];

        let mut trail = Vec::new();
        let mut current = start;
        loop {
            let ty = graph[current];
            let producer = match &set.provider_map[&ty].by {
                ProvidedBy::Provider(p) => p.symbol.to_string(),
                ProvidedBy::Value(_) => "value".to_string(),
            };
            trail.push((store.display(ty), producer));
            if trail.len() > members.len() {
                break;
            }
            let mut succs: Vec<NodeIndex> = graph
                .neighbors(current)
                .filter(|n| scc.contains(n))
                .collect();
            succs.sort_by_key(|n| store.display(graph[*n]));
            match succs.first() {
                Some(&next) if next != start => current = next,
                _ => break,
            }
        }

        let root = graph[start];
        let span = match &set.provider_map[&root].by {
            ProvidedBy::Provider(p) => p.span,
            ProvidedBy::Value(v) => v.span,
        };
        errors.push(AnalysisError::Cycle {
            span,
            ty: store.display(root),
            trail,
        });
    }
    errors
}
