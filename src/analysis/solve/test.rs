use super::{check_unused, solve};
use crate::analysis::ir::{CallKind, Injector};
use crate::analysis::lower::Lowerer;
use crate::analysis::AnalysisError;
use crate::loader::tests::workspace_from;
use crate::loader::Workspace;

fn ws(files: &[(&str, &str)]) -> Workspace {
    workspace_from(files).expect("workspace should load")
}

/// Lowers the single injector declared in `pkg`.
fn injector_of(ws: &Workspace, pkg: &str) -> Injector {
    let mut lowerer = Lowerer::new(ws);
    let id = ws.lookup_package(pkg).unwrap();
    let (mut injectors, errors) = lowerer.injectors(id);
    assert!(errors.is_empty(), "lowering errors: {:?}", errors);
    assert_eq!(injectors.len(), 1, "expected exactly one injector");
    injectors.remove(0)
}

fn lowering_errors(ws: &Workspace, pkg: &str) -> Vec<AnalysisError> {
    let mut lowerer = Lowerer::new(ws);
    let id = ws.lookup_package(pkg).unwrap();
    let (_, errors) = lowerer.injectors(id);
    errors
}

#[test]
fn test_chain() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct { x: int }\n\
         type FooBar struct { n: int }\n\
         fn provFoo(): Foo\n\
         fn provFooBar(foo: Foo): FooBar\n\
         fn initFooBar(): FooBar {\n\
             build(provFoo, provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 2);
    assert_eq!(solution.calls[0].symbol.as_ref().unwrap().name, "provFoo");
    assert!(solution.calls[0].args.is_empty());
    assert_eq!(solution.calls[1].symbol.as_ref().unwrap().name, "provFooBar");
    assert_eq!(solution.calls[1].args, vec![0]);
    assert_eq!(solution.calls[1].out, injector.out);
}

#[test]
fn test_two_deps() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         type FooBar struct {}\n\
         fn provFoo(): Foo\n\
         fn provBar(): Bar\n\
         fn provFooBar(foo: Foo, bar: Bar): FooBar\n\
         fn initFooBar(): FooBar {\n\
             build(provFoo, provBar, provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 3);
    assert_eq!(solution.calls[2].args, vec![0, 1]);
    assert_eq!(solution.calls[2].out, injector.out);
}

#[test]
fn test_injected_input() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         type FooBar struct {}\n\
         fn provBar(): Bar\n\
         fn provFooBar(foo: Foo, bar: Bar): FooBar\n\
         fn initFooBar(foo: Foo): FooBar {\n\
             build(provBar, provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 2);
    // slot 0 is the injector argument.
    assert_eq!(solution.calls[0].symbol.as_ref().unwrap().name, "provBar");
    assert_eq!(solution.calls[1].args, vec![0, 1]);
}

#[test]
fn test_interface_binding_shares_slot() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         type Bar struct {}\n\
         fn (*Bar) foo(): string\n\
         fn provBar(): *Bar\n\
         fn initFooer(): Fooer {\n\
             build(provBar, bind(*Fooer, *Bar))\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    // The binding re-types the provider's local; no extra call.
    assert_eq!(solution.calls.len(), 1);
    assert_eq!(solution.calls[0].symbol.as_ref().unwrap().name, "provBar");
}

#[test]
fn test_cleanup_and_error_flags() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         type Baz struct {}\n\
         fn provFoo(): (*Foo, cleanup)\n\
         fn provBar(foo: *Foo): (*Bar, cleanup, error)\n\
         fn provBaz(bar: *Bar): (Baz, error)\n\
         fn initBaz(): (Baz, cleanup, error) {\n\
             build(provFoo, provBar, provBaz)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 3);
    assert!(solution.calls[0].has_cleanup && !solution.calls[0].has_err);
    assert!(solution.calls[1].has_cleanup && solution.calls[1].has_err);
    assert!(!solution.calls[2].has_cleanup && solution.calls[2].has_err);
}

#[test]
fn test_cycle_detection() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type A struct {}\n\
         type B struct {}\n\
         fn provA(b: B): A\n\
         fn provB(a: A): B\n\
         fn initA(): A {\n\
             build(provA, provB)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    let cycles: Vec<_> = errors
        .iter()
        .filter(|e| matches!(e, AnalysisError::Cycle { .. }))
        .collect();
    assert_eq!(cycles.len(), 1, "one cycle per component: {:?}", errors);
    let AnalysisError::Cycle { trail, .. } = cycles[0] else {
        unreachable!();
    };
    assert_eq!(trail.len(), 2);
}

#[test]
fn test_self_cycle() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type A struct {}\n\
         fn provA(a: A): A\n\
         fn initA(): A {\n\
             build(provA)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(e, AnalysisError::Cycle { trail, .. } if trail.len() == 1)));
}

#[test]
fn test_injector_returns_argument() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn initFoo(foo: Foo): Foo {\n\
             build()\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert!(solution.calls.is_empty());
}

#[test]
fn test_input_shadows_provider() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type FooBar struct {}\n\
         fn provFoo(): Foo\n\
         fn provFooBar(foo: Foo): FooBar\n\
         fn initFooBar(foo: Foo): FooBar {\n\
             build(provFoo, provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::InputShadowsProvider { .. })));
}

#[test]
fn test_duplicate_injector_inputs() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type FooBar struct {}\n\
         fn provFooBar(foo: Foo): FooBar\n\
         fn initFooBar(a: Foo, b: Foo): FooBar {\n\
             build(provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::DuplicateInjectorInput { .. })));
}

#[test]
fn test_missing_provider_for_output() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn initFoo(): Foo {\n\
             build()\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    assert_eq!(errors.len(), 1);
    assert!(matches!(
        &errors[0],
        AnalysisError::MissingProvider {
            injector_output: true,
            ..
        }
    ));
}

#[test]
fn test_missing_provider_chain_and_error_collection() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         type FooBar struct {}\n\
         fn provFooBar(foo: Foo, bar: Bar): FooBar\n\
         fn initFooBar(): FooBar {\n\
             build(provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    // Both missing inputs are reported; the provider itself is only
    // marked errored, not double-reported.
    assert_eq!(errors.len(), 2);
    for error in &errors {
        let AnalysisError::MissingProvider {
            injector_output,
            chain,
            ..
        } = error
        else {
            panic!("expected missing provider: {:?}", error);
        };
        assert!(!injector_output);
        assert_eq!(chain.len(), 1);
        assert!(chain[0].message.contains("FooBar"));
    }
}

#[test]
fn test_signature_mismatch_cleanup() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn provFoo(): (Foo, cleanup)\n\
         fn initFoo(): Foo {\n\
             build(provFoo)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::UnexpectedCleanup { .. })));
}

#[test]
fn test_signature_mismatch_error() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn provFoo(): (Foo, error)\n\
         fn initFoo(): Foo {\n\
             build(provFoo)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let errors = solve(&ws.types, &injector).unwrap_err();
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::UnexpectedError { .. })));
}

#[test]
fn test_struct_provider_value_and_pointer_forms() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Conf struct { n: int }\n\
         type App struct { c: Conf pc: *Conf }\n\
         fn provN(): int\n\
         fn initApp(): App {\n\
             build(provN, Conf, App)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 4);
    let kinds: Vec<CallKind> = solution.calls.iter().map(|c| c.kind).collect();
    assert_eq!(
        kinds,
        vec![
            CallKind::Func,
            CallKind::StructLit,
            CallKind::StructLit,
            CallKind::StructLit
        ]
    );
    // Same struct record, two distinct outputs.
    assert_ne!(solution.calls[1].out, solution.calls[2].out);
    assert_eq!(solution.calls[1].symbol, solution.calls[2].symbol);
    assert_eq!(solution.calls[3].args, vec![1, 2]);
}

#[test]
fn test_value_expression() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct { x: int }\n\
         type FooBar struct {}\n\
         fn provFooBar(foo: Foo): FooBar\n\
         fn initFooBar(): FooBar {\n\
             build(value(Foo{x: 41}), provFooBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 2);
    assert_eq!(solution.calls[0].kind, CallKind::ValueExpr);
    assert!(solution.calls[0].value.is_some());
}

#[test]
fn test_interface_value() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         type Bar struct {}\n\
         fn (Bar) foo(): string\n\
         fn initFooer(): Fooer {\n\
             build(interface_value(*Fooer, Bar{}))\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 1);
    assert_eq!(solution.calls[0].kind, CallKind::ValueExpr);
    assert_eq!(solution.calls[0].out, injector.out);
}

#[test]
fn test_binding_backed_by_value() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         type Bar struct {}\n\
         fn (Bar) foo(): string\n\
         fn initFooer(): Fooer {\n\
             build(value(Bar{}), bind(*Fooer, Bar))\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    // The value call materializes the concrete; the binding shares it.
    assert_eq!(solution.calls.len(), 1);
    assert_eq!(solution.calls[0].kind, CallKind::ValueExpr);
}

#[test]
fn test_binding_target_in_imported_set() {
    let ws = ws(&[
        (
            "db/db.sld",
            "package db\n\
             type Store struct {}\n\
             fn (*Store) get(): string\n\
             fn provStore(): *Store\n\
             let Set = make_set(provStore)",
        ),
        (
            "app/app.sld",
            "package app\n\
             import \"db\"\n\
             type Getter interface { get(): string }\n\
             fn initGetter(): Getter {\n\
                 build(db.Set, bind(*Getter, *db.Store))\n\
             }",
        ),
    ]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 1);
    assert_eq!(solution.calls[0].symbol.as_ref().unwrap().name, "provStore");
}

#[test]
fn test_binding_conflict_between_import_and_local() {
    let ws = ws(&[
        (
            "db/db.sld",
            "package db\n\
             type Store struct {}\n\
             fn provStore(): *Store\n\
             let Set = make_set(provStore)",
        ),
        (
            "app/app.sld",
            "package app\n\
             import \"db\"\n\
             fn provStore2(): *db.Store\n\
             fn initStore(): *db.Store {\n\
                 build(db.Set, provStore2)\n\
             }",
        ),
    ]);
    let errors = lowering_errors(&ws, "app");
    let conflicts: Vec<_> = errors
        .iter()
        .filter(|e| matches!(e, AnalysisError::BindingConflict { .. }))
        .collect();
    assert_eq!(conflicts.len(), 1);
    let AnalysisError::BindingConflict { previous, .. } = conflicts[0] else {
        unreachable!();
    };
    assert!(!previous.is_empty(), "conflict carries the previous trace");
}

#[test]
fn test_unused_members() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         fn provFoo(): Foo\n\
         fn provBar(): Bar\n\
         fn initFoo(): Foo {\n\
             build(provFoo, provBar)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    let unused = check_unused(&ws.types, &injector.set, &solution.used);
    assert_eq!(unused.len(), 1);
    assert!(matches!(
        &unused[0],
        AnalysisError::UnusedMember { kind: "provider", name, .. } if name.contains("provBar")
    ));
}

#[test]
fn test_unused_import_of_set() {
    let ws = ws(&[
        (
            "db/db.sld",
            "package db\n\
             type Store struct {}\n\
             fn provStore(): *Store\n\
             let Set = make_set(provStore)",
        ),
        (
            "app/app.sld",
            "package app\n\
             import \"db\"\n\
             type Foo struct {}\n\
             fn provFoo(): Foo\n\
             fn initFoo(): Foo {\n\
                 build(provFoo, db.Set)\n\
             }",
        ),
    ]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    let unused = check_unused(&ws.types, &injector.set, &solution.used);
    assert_eq!(unused.len(), 1);
    assert!(matches!(
        &unused[0],
        AnalysisError::UnusedMember {
            kind: "provider set",
            ..
        }
    ));
}

#[test]
fn test_plan_is_deterministic() {
    let source = "package app\n\
                  type A struct {}\n\
                  type B struct {}\n\
                  type C struct {}\n\
                  type D struct {}\n\
                  fn provA(): A\n\
                  fn provB(a: A): B\n\
                  fn provC(a: A): C\n\
                  fn provD(b: B, c: C): D\n\
                  fn initD(): D {\n\
                      build(provA, provB, provC, provD)\n\
                  }";
    let ws1 = ws(&[("app/app.sld", source)]);
    let injector1 = injector_of(&ws1, "app");
    let first = solve(&ws1.types, &injector1).unwrap();
    let second = solve(&ws1.types, &injector1).unwrap();
    let names = |s: &super::Solution| -> Vec<String> {
        s.calls
            .iter()
            .map(|c| c.symbol.as_ref().map(|sym| sym.name.clone()).unwrap_or_default())
            .collect()
    };
    assert_eq!(names(&first), names(&second));
    // Calls appear in argument-declared order.
    assert_eq!(names(&first), vec!["provA", "provB", "provC", "provD"]);
}

#[test]
fn test_plan_references_only_earlier_locals() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type A struct {}\n\
         type B struct {}\n\
         type C struct {}\n\
         fn provB(a: A): B\n\
         fn provC(a: A, b: B): C\n\
         fn initC(a: A): C {\n\
             build(provB, provC)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    let n = injector.params.len();
    for (k, call) in solution.calls.iter().enumerate() {
        for &arg in &call.args {
            assert!(arg < n + k, "call {} references later local {}", k, arg);
        }
    }
    // No output type appears twice.
    let mut outs: Vec<_> = solution.calls.iter().map(|c| c.out).collect();
    outs.sort();
    outs.dedup();
    assert_eq!(outs.len(), solution.calls.len());
}

#[test]
fn test_invalid_provider_signatures() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         fn bad(): (Foo, Bar)\n\
         fn initFoo(): Foo {\n\
             build(bad)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidProvider { reason, .. } if reason.contains("second return value")
    )));
}

#[test]
fn test_duplicate_parameter_types() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         fn bad(a: Foo, b: Foo): Bar\n\
         fn initBar(): Bar {\n\
             build(bad)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidProvider { reason, .. } if reason.contains("multiple parameters")
    )));
}

#[test]
fn test_bind_rejects_non_interface() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         fn provBar(): *Bar\n\
         fn initFoo(): Foo {\n\
             build(provBar, bind(*Foo, *Bar))\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidBinding { reason, .. }
            if reason.contains("pointer to an interface")
    )));
}

#[test]
fn test_bind_rejects_self_binding() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         fn initFooer(): Fooer {\n\
             build(bind(*Fooer, Fooer))\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidBinding { reason, .. } if reason.contains("itself")
    )));
}

#[test]
fn test_bind_rejects_non_implementing_type() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         type Bar struct {}\n\
         fn provBar(): *Bar\n\
         fn initFooer(): Fooer {\n\
             build(provBar, bind(*Fooer, *Bar))\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidBinding { reason, .. } if reason.contains("does not implement")
    )));
}

#[test]
fn test_value_rejects_function_calls() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn makeFoo(): Foo\n\
         fn initFoo(): Foo {\n\
             build(value(makeFoo()))\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidValueExpression { reason, .. } if reason.contains("too complex")
    )));
}

#[test]
fn test_value_rejects_interface_output() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Fooer interface { foo(): string }\n\
         const Default: Fooer = 0\n\
         fn initFooer(): Fooer {\n\
             build(value(Default))\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors.iter().any(|e| matches!(
        e,
        AnalysisError::InvalidValueExpression { reason, .. }
            if reason.contains("interface_value")
    )));
}

#[test]
fn test_unknown_pattern() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn initFoo(): Foo {\n\
             build(42)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::UnknownPattern { .. })));
}

#[test]
fn test_mixed_stub_statements() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn provFoo(): Foo\n\
         fn initFoo(): Foo {\n\
             provFoo()\n\
             build(provFoo)\n\
         }",
    )]);
    let errors = lowering_errors(&ws, "app");
    assert!(errors
        .iter()
        .any(|e| matches!(e, AnalysisError::MixedStubStatements { .. })));
}

#[test]
fn test_panic_wrapped_build() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn provFoo(): Foo\n\
         fn initFoo(): Foo {\n\
             panic(build(provFoo))\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 1);
}

#[test]
fn test_named_set_reference() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         fn provFoo(): Foo\n\
         let AppSet = make_set(provFoo)\n\
         fn initFoo(): Foo {\n\
             build(AppSet)\n\
         }",
    )]);
    let injector = injector_of(&ws, "app");
    assert_eq!(injector.set.imports.len(), 1);
    assert_eq!(injector.set.imports[0].set.var_name, "AppSet");
    let solution = solve(&ws.types, &injector).unwrap();
    assert_eq!(solution.calls.len(), 1);
}

#[test]
fn test_imported_sets_are_shared_by_identity() {
    let ws = ws(&[(
        "app/app.sld",
        "package app\n\
         type Foo struct {}\n\
         type Bar struct {}\n\
         fn provFoo(): Foo\n\
         fn provBar(foo: Foo): Bar\n\
         let Base = make_set(provFoo)\n\
         let More = make_set(Base, provBar)\n\
         fn initBar(): Bar {\n\
             build(More)\n\
         }",
    )]);
    let mut lowerer = Lowerer::new(&ws);
    let id = ws.lookup_package("app").unwrap();
    let base1 = lowerer.named_set(id, "Base").unwrap();
    let base2 = lowerer.named_set(id, "Base").unwrap();
    assert!(std::rc::Rc::ptr_eq(&base1, &base2));
}
