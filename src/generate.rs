//! Front-end integration: the gen, diff, show, and check operations over
//! a loaded workspace.

use crate::analysis::ir::{Call, Injector, MemberSource};
use crate::analysis::lower::Lowerer;
use crate::analysis::{format as analysis_format, solve, AnalysisError};
use crate::codegen;
use crate::loader::{self, load_workspace, PackageId, Workspace, GENERATED_FILE};
use crate::parser::ast::Decl;
use crate::sources::FileSources;
use codespan_reporting::term::termcolor::WriteColor;
use std::io::Write as _;
use vfs::VfsPath;

/// Front-end knobs. `strict_unused` overrides the manifest when set.
#[derive(Debug, Default, Clone)]
pub struct Options {
    pub strict_unused: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOutcome {
    Clean,
    Changed,
    Failed,
}

/// Deduplicates diagnostics so each error renders once even when several
/// passes rediscover it.
struct Reporter {
    seen: Vec<AnalysisError>,
}

impl Reporter {
    fn new() -> Self {
        Reporter { seen: Vec::new() }
    }

    fn errors(
        &mut self,
        writer: &mut impl WriteColor,
        sources: &FileSources,
        errors: &[AnalysisError],
    ) -> Result<(), codespan_reporting::files::Error> {
        let mut fresh = Vec::new();
        for error in errors {
            if !self.seen.contains(error) {
                self.seen.push(error.clone());
                fresh.push(error.clone());
            }
        }
        analysis_format::report_errors(writer, sources, &fresh)
    }
}

type PackagePlans = Vec<(PackageId, Vec<(Injector, Vec<Call>)>)>;

/// Lowers and solves every injector (and, when `include_sets` is set,
/// every named set) in the workspace, reporting diagnostics as it goes.
fn analyze(
    ws: &Workspace,
    lowerer: &mut Lowerer<'_>,
    writer: &mut impl WriteColor,
    strict_unused: bool,
    include_sets: bool,
) -> anyhow::Result<(PackagePlans, bool)> {
    let mut ok = true;
    let mut reporter = Reporter::new();
    let mut plans = Vec::new();

    for id in ws.sorted_ids() {
        if include_sets {
            for name in named_set_names(ws, id) {
                if let Err(errors) = lowerer.named_set(id, &name) {
                    reporter.errors(writer, &ws.sources, &errors)?;
                    ok = false;
                }
            }
        }

        let (injectors, errors) = lowerer.injectors(id);
        if !errors.is_empty() {
            reporter.errors(writer, &ws.sources, &errors)?;
            ok = false;
        }
        let mut pkg_plans = Vec::new();
        for injector in injectors {
            match solve::solve(&ws.types, &injector) {
                Ok(solution) => {
                    let unused = solve::check_unused(&ws.types, &injector.set, &solution.used);
                    if !unused.is_empty() {
                        analysis_format::report_unused(
                            writer,
                            &ws.sources,
                            &unused,
                            strict_unused,
                        )?;
                        if strict_unused {
                            ok = false;
                        }
                    }
                    pkg_plans.push((injector, solution.calls));
                }
                Err(errors) => {
                    reporter.errors(writer, &ws.sources, &errors)?;
                    ok = false;
                }
            }
        }
        plans.push((id, pkg_plans));
    }
    Ok((plans, ok))
}

fn named_set_names(ws: &Workspace, id: PackageId) -> Vec<String> {
    ws.pkg(id)
        .files
        .iter()
        .flat_map(|f| {
            f.ast.decls.iter().filter_map(|d| match d {
                Decl::Set(s) => Some(s.name.clone()),
                _ => None,
            })
        })
        .collect()
}

fn load(
    root: &VfsPath,
    patterns: &[String],
    writer: &mut impl WriteColor,
) -> anyhow::Result<Option<Workspace>> {
    match load_workspace(root, patterns) {
        Ok(ws) => Ok(Some(ws)),
        Err(failure) => {
            loader::format::report_errors(writer, &failure.sources, &failure.errors)?;
            Ok(None)
        }
    }
}

/// Generates `solder_gen.sld` for every package with injectors.
/// Returns false if any diagnostic prevented generation.
pub fn generate(
    root: &VfsPath,
    patterns: &[String],
    opts: &Options,
    writer: &mut impl WriteColor,
) -> anyhow::Result<bool> {
    let Some(ws) = load(root, patterns, writer)? else {
        return Ok(false);
    };
    let strict = opts
        .strict_unused
        .unwrap_or(ws.manifest.analysis.strict_unused);
    let mut lowerer = Lowerer::new(&ws);
    let (plans, ok) = analyze(&ws, &mut lowerer, writer, strict, false)?;
    if !ok {
        return Ok(false);
    }
    for (id, pkg_plans) in &plans {
        if !ws.is_requested(*id) {
            continue;
        }
        let Some(content) = codegen::generate_package(&ws, ws.pkg(*id), pkg_plans) else {
            eprintln!("solder: no injector found for {}", ws.pkg(*id).path);
            continue;
        };
        let dest = ws.pkg(*id).dir.join(GENERATED_FILE)?;
        dest.create_file()?.write_all(content.as_bytes())?;
    }
    Ok(true)
}

/// Compares would-be generated output with the files on disk.
pub fn diff(
    root: &VfsPath,
    patterns: &[String],
    opts: &Options,
    writer: &mut impl WriteColor,
) -> anyhow::Result<DiffOutcome> {
    let Some(ws) = load(root, patterns, writer)? else {
        return Ok(DiffOutcome::Failed);
    };
    let strict = opts
        .strict_unused
        .unwrap_or(ws.manifest.analysis.strict_unused);
    let mut lowerer = Lowerer::new(&ws);
    let (plans, ok) = analyze(&ws, &mut lowerer, writer, strict, false)?;
    if !ok {
        return Ok(DiffOutcome::Failed);
    }
    let mut outcome = DiffOutcome::Clean;
    for (id, pkg_plans) in &plans {
        if !ws.is_requested(*id) {
            continue;
        }
        // Packages without injectors have no generated file to compare.
        let Some(content) = codegen::generate_package(&ws, ws.pkg(*id), pkg_plans) else {
            continue;
        };
        let dest = ws.pkg(*id).dir.join(GENERATED_FILE)?;
        let existing = if dest.exists()? {
            dest.read_to_string()?
        } else {
            String::new()
        };
        if existing != content {
            print_diff(dest.as_str(), &existing, &content);
            outcome = DiffOutcome::Changed;
        }
    }
    Ok(outcome)
}

/// Prints the differing hunk between the on-disk file and regenerated
/// output.
fn print_diff(path: &str, old: &str, new: &str) {
    println!("--- {}", path);
    println!("+++ {} (regenerated)", path);
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    let mut prefix = 0;
    while prefix < old_lines.len()
        && prefix < new_lines.len()
        && old_lines[prefix] == new_lines[prefix]
    {
        prefix += 1;
    }
    let mut suffix = 0;
    while suffix < old_lines.len() - prefix
        && suffix < new_lines.len() - prefix
        && old_lines[old_lines.len() - 1 - suffix] == new_lines[new_lines.len() - 1 - suffix]
    {
        suffix += 1;
    }
    for line in &old_lines[prefix..old_lines.len() - suffix] {
        println!("-{}", line);
    }
    for line in &new_lines[prefix..new_lines.len() - suffix] {
        println!("+{}", line);
    }
}

/// Prints every named provider set (outputs and their producers) and
/// every injector signature.
pub fn show(
    root: &VfsPath,
    patterns: &[String],
    _opts: &Options,
    writer: &mut impl WriteColor,
) -> anyhow::Result<bool> {
    let Some(ws) = load(root, patterns, writer)? else {
        return Ok(false);
    };
    let mut lowerer = Lowerer::new(&ws);
    let mut ok = true;
    let mut reporter = Reporter::new();

    for id in ws.sorted_ids() {
        if !ws.is_requested(id) {
            continue;
        }
        for name in named_set_names(&ws, id) {
            match lowerer.named_set(id, &name) {
                Ok(set) => {
                    println!("{}", set.id_string());
                    if !set.imports.is_empty() {
                        println!("  imports:");
                        for imp in &set.imports {
                            println!("    {}", imp.set.id_string());
                        }
                    }
                    let mut outputs: Vec<(String, String)> = set
                        .provider_map
                        .keys()
                        .map(|key| {
                            let producer = match set.source_map.get(key) {
                                Some(MemberSource::Provider(p)) => p.symbol.to_string(),
                                Some(MemberSource::Value(_)) => "value".to_string(),
                                Some(MemberSource::Binding(b)) => {
                                    format!("bind to {}", ws.types.display(b.provided))
                                }
                                Some(MemberSource::Import(imp)) => {
                                    format!("imported from {}", imp.set.id_string())
                                }
                                None => String::new(),
                            };
                            (ws.types.display(*key), producer)
                        })
                        .collect();
                    outputs.sort();
                    if !outputs.is_empty() {
                        println!("  outputs:");
                        for (ty, producer) in outputs {
                            println!("    {} <- {}", ty, producer);
                        }
                    }
                }
                Err(errors) => {
                    reporter.errors(writer, &ws.sources, &errors)?;
                    ok = false;
                }
            }
        }

        let (injectors, errors) = lowerer.injectors(id);
        if !errors.is_empty() {
            reporter.errors(writer, &ws.sources, &errors)?;
            ok = false;
        }
        for injector in &injectors {
            let params: Vec<String> = injector
                .params
                .iter()
                .map(|(_, ty)| ws.types.display(*ty))
                .collect();
            println!(
                "injector {}({}) -> {}",
                injector.symbol,
                params.join(", "),
                ws.types.display(injector.out)
            );
        }
    }
    Ok(ok)
}

/// Runs the full analysis without writing anything.
pub fn check(
    root: &VfsPath,
    patterns: &[String],
    opts: &Options,
    writer: &mut impl WriteColor,
) -> anyhow::Result<bool> {
    let Some(ws) = load(root, patterns, writer)? else {
        return Ok(false);
    };
    let strict = opts
        .strict_unused
        .unwrap_or(ws.manifest.analysis.strict_unused);
    let mut lowerer = Lowerer::new(&ws);
    let (_, ok) = analyze(&ws, &mut lowerer, writer, strict, true)?;
    Ok(ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use codespan_reporting::term::termcolor::Buffer;
    use vfs::MemoryFS;

    fn root_from(files: &[(&str, &str)]) -> VfsPath {
        let root = VfsPath::new(MemoryFS::new());
        root.join("Solder.toml")
            .unwrap()
            .create_file()
            .unwrap()
            .write_all(b"[project]\nname = \"test\"\n")
            .unwrap();
        for (path, content) in files {
            let file = root.join(format!("src/{}", path)).unwrap();
            file.parent().create_dir_all().unwrap();
            file.create_file()
                .unwrap()
                .write_all(content.as_bytes())
                .unwrap();
        }
        root
    }

    fn generated(root: &VfsPath, pkg: &str) -> String {
        root.join(format!("src/{}/{}", pkg, GENERATED_FILE))
            .unwrap()
            .read_to_string()
            .unwrap()
    }

    #[test]
    fn test_generate_chain() {
        let root = root_from(&[(
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
        let mut writer = Buffer::no_color();
        let ok = generate(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(ok, "diagnostics: {}", String::from_utf8_lossy(writer.as_slice()));
        let content = generated(&root, "app");
        assert_eq!(
            content,
            "// Code generated by solder. DO NOT EDIT.\n\
             \n\
             #:unless inject\n\
             \n\
             package app\n\
             \n\
             fn initFooBar(): FooBar {\n\
             \tlet foo = provFoo()\n\
             \tlet fooBar = provFooBar(foo)\n\
             \treturn fooBar\n\
             }\n"
        );
    }

    #[test]
    fn test_generate_injected_input_and_imports() {
        let root = root_from(&[
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
                 type App struct { s: *db.Store }\n\
                 fn initApp(): App {\n\
                     build(db.Set, App)\n\
                 }",
            ),
        ]);
        let mut writer = Buffer::no_color();
        let ok = generate(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(ok, "diagnostics: {}", String::from_utf8_lossy(writer.as_slice()));
        let content = generated(&root, "app");
        assert!(content.contains("import db \"db\"\n"));
        assert!(content.contains("\tlet store = db.provStore()\n"));
        assert!(content.contains("\tlet app = App{\n\t\ts: store,\n\t}\n"));
    }

    #[test]
    fn test_generate_cleanup_and_error_chaining() {
        let root = root_from(&[(
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
        let mut writer = Buffer::no_color();
        let ok = generate(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(ok, "diagnostics: {}", String::from_utf8_lossy(writer.as_slice()));
        let content = generated(&root, "app");
        assert!(content.contains("fn initBaz(): (Baz, cleanup, error) {\n"));
        assert!(content.contains("\tlet foo, cleanup = provFoo()\n"));
        assert!(content.contains("\tlet bar, cleanup2, err = provBar(foo)\n"));
        // provBar's failure runs provFoo's cleanup only.
        assert!(content.contains(
            "\tif err {\n\t\tcleanup()\n\t\treturn Baz{}, nil, err\n\t}\n"
        ));
        // provBaz's failure runs both cleanups in LIFO order.
        assert!(content.contains(
            "\tif err {\n\t\tcleanup2()\n\t\tcleanup()\n\t\treturn Baz{}, nil, err\n\t}\n"
        ));
        assert!(content
            .contains("\treturn baz, fn() {\n\t\tcleanup2()\n\t\tcleanup()\n\t}, nil\n"));
    }

    #[test]
    fn test_generate_value_is_hoisted() {
        let root = root_from(&[(
            "app/app.sld",
            "package app\n\
             type Foo struct { x: int }\n\
             type FooBar struct {}\n\
             fn provFooBar(foo: Foo): FooBar\n\
             fn initFooBar(): FooBar {\n\
                 build(value(Foo{x: 41}), provFooBar)\n\
             }",
        )]);
        let mut writer = Buffer::no_color();
        let ok = generate(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(ok, "diagnostics: {}", String::from_utf8_lossy(writer.as_slice()));
        let content = generated(&root, "app");
        assert!(content.contains("let _solderFooValue = Foo{x: 41}\n"));
        assert!(content.contains("\tlet foo = _solderFooValue\n"));
    }

    #[test]
    fn test_generate_returns_argument_when_plan_is_empty() {
        let root = root_from(&[(
            "app/app.sld",
            "package app\n\
             type Foo struct {}\n\
             fn initFoo(foo: Foo): Foo {\n\
                 build()\n\
             }",
        )]);
        let mut writer = Buffer::no_color();
        let ok = generate(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(ok);
        let content = generated(&root, "app");
        assert!(content.contains("fn initFoo(foo: Foo): Foo {\n\treturn foo\n}\n"));
    }

    #[test]
    fn test_generate_is_idempotent() {
        let files = [(
            "app/app.sld",
            "package app\n\
             type Foo struct {}\n\
             fn provFoo(): Foo\n\
             fn initFoo(): Foo {\n\
                 build(provFoo)\n\
             }",
        )];
        let root = root_from(&files);
        let mut writer = Buffer::no_color();
        assert!(generate(&root, &[], &Options::default(), &mut writer).unwrap());
        let first = generated(&root, "app");
        // The second run loads the workspace with the generated file
        // already on disk; it must be excluded and reproduced unchanged.
        assert!(generate(&root, &[], &Options::default(), &mut writer).unwrap());
        assert_eq!(first, generated(&root, "app"));
    }

    #[test]
    fn test_diff_outcomes() {
        let root = root_from(&[(
            "app/app.sld",
            "package app\n\
             type Foo struct {}\n\
             fn provFoo(): Foo\n\
             fn initFoo(): Foo {\n\
                 build(provFoo)\n\
             }",
        )]);
        let mut writer = Buffer::no_color();
        // No generated file yet.
        assert_eq!(
            diff(&root, &[], &Options::default(), &mut writer).unwrap(),
            DiffOutcome::Changed
        );
        assert!(generate(&root, &[], &Options::default(), &mut writer).unwrap());
        assert_eq!(
            diff(&root, &[], &Options::default(), &mut writer).unwrap(),
            DiffOutcome::Clean
        );
        let dest = root.join("src/app/solder_gen.sld").unwrap();
        dest.create_file()
            .unwrap()
            .write_all(b"#:unless inject\npackage app\n")
            .unwrap();
        assert_eq!(
            diff(&root, &[], &Options::default(), &mut writer).unwrap(),
            DiffOutcome::Changed
        );
    }

    #[test]
    fn test_diff_failed_on_analysis_error() {
        let root = root_from(&[(
            "app/app.sld",
            "package app\n\
             type Foo struct {}\n\
             fn initFoo(): Foo {\n\
                 build()\n\
             }",
        )]);
        let mut writer = Buffer::no_color();
        assert_eq!(
            diff(&root, &[], &Options::default(), &mut writer).unwrap(),
            DiffOutcome::Failed
        );
    }

    #[test]
    fn test_check_reports_cycles() {
        let root = root_from(&[(
            "app/app.sld",
            "package app\n\
             type A struct {}\n\
             type B struct {}\n\
             fn provA(b: B): A\n\
             fn provB(a: A): B\n\
             let AppSet = make_set(provA, provB)\n\
             fn initA(): A {\n\
                 build(AppSet)\n\
             }",
        )]);
        let mut writer = Buffer::no_color();
        let ok = check(&root, &[], &Options::default(), &mut writer).unwrap();
        assert!(!ok);
        let rendered = String::from_utf8_lossy(writer.as_slice()).to_string();
        // The named-set prepass and the injector both see the cycle, but
        // it renders once.
        assert_eq!(rendered.matches("cycle for").count(), 1);
    }

    #[test]
    fn test_strict_unused_blocks_generation() {
        let files = [(
            "app/app.sld",
            "package app\n\
             type Foo struct {}\n\
             type Bar struct {}\n\
             fn provFoo(): Foo\n\
             fn provBar(): Bar\n\
             fn initFoo(): Foo {\n\
                 build(provFoo, provBar)\n\
             }",
        )];
        let root = root_from(&files);
        let mut writer = Buffer::no_color();
        let opts = Options {
            strict_unused: Some(true),
        };
        assert!(!generate(&root, &[], &opts, &mut writer).unwrap());
        assert!(!root.join("src/app/solder_gen.sld").unwrap().exists().unwrap());
        // Without strict mode the unused member is only a warning.
        let mut writer = Buffer::no_color();
        assert!(generate(&root, &[], &Options::default(), &mut writer).unwrap());
        let rendered = String::from_utf8_lossy(writer.as_slice()).to_string();
        assert!(rendered.contains("unused provider"));
    }

    #[test]
    fn test_generate_reports_load_errors() {
        let root = root_from(&[("app/app.sld", "package app\nfn broken(: int")]);
        let mut writer = Buffer::no_color();
        let patterns = vec!["app".to_string()];
        assert!(!generate(&root, &patterns, &Options::default(), &mut writer).unwrap());
        assert!(!writer.as_slice().is_empty());
    }

    #[test]
    fn test_default_scope_ignores_unrelated_broken_package() {
        let root = root_from(&[
            (
                "app/app.sld",
                "package app\n\
                 type Foo struct {}\n\
                 fn provFoo(): Foo\n\
                 fn initFoo(): Foo {\n\
                     build(provFoo)\n\
                 }",
            ),
            // Declares no sets or injectors, so the default package scope
            // leaves it alone even though it would not load.
            ("junk/junk.sld", "package junk\nfn broken(): Missing"),
        ]);
        let mut writer = Buffer::no_color();
        assert!(generate(&root, &[], &Options::default(), &mut writer).unwrap());
        assert!(root.join("src/app/solder_gen.sld").unwrap().exists().unwrap());
        assert!(!root.join("src/junk/solder_gen.sld").unwrap().exists().unwrap());
    }
}

