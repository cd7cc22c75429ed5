//! Package loading: reads `.sld` files from a workspace, parses them, and
//! builds the symbol and type tables the analyzer consumes.

pub mod format;

use crate::builtin::BUILTIN_TYPES;
use crate::lexer::{Lexer, LexError, TokenKind};
use crate::manifest::{Manifest, ManifestError};
use crate::parser::ast::{
    self, Decl, FnDecl, ResultExpr, SetDecl, SourceFile, SourceId, Span, Stmt, TypeBody, TypeExpr,
    TypeExprKind,
};
use crate::parser::parse_file;
use crate::sources::FileSources;
use chumsky::span::Span as _;
use crate::types::{
    DefDetail, DefId, MethodSig, ResultAtom, Symbol, TypeId, TypeKind, TypeStore,
};
use bimap::BiMap;
use chumsky::error::Rich;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;
use vfs::VfsPath;

pub const FILE_EXTENSION: &str = ".sld";
pub const GENERATED_FILE: &str = "solder_gen.sld";
pub const INJECT_TAG: &str = "inject";
const RECURSION_LIMIT: usize = 256;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("manifest: {0}")]
    Manifest(#[from] ManifestError),

    #[error("filesystem error at {path}: {error}")]
    Fs {
        path: String,
        #[source]
        error: vfs::VfsError,
    },

    #[error("lex errors")]
    LexErrors { errors: Vec<LexError> },

    #[error("parse errors")]
    ParseErrors {
        errors: Vec<Rich<'static, TokenKind, Span>>,
    },

    #[error("package not found: {path}")]
    PackageNotFound { path: String, span: Option<Span> },

    #[error("import cycle: {}", chain.join(" -> "))]
    ImportCycle { chain: Vec<String>, span: Span },

    #[error("package recursion limit reached while loading {path}")]
    RecursionLimit { path: String },

    #[error("file declares package `{found}`, expected `{expected}`")]
    PackageNameMismatch {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("duplicate declaration of `{name}`")]
    DuplicateDecl {
        name: String,
        span: Span,
        previous: Span,
    },

    #[error("unknown type `{name}`")]
    UnknownType { name: String, span: Span },

    #[error("unknown package qualifier `{name}`")]
    UnknownQualifier { name: String, span: Span },

    #[error("`{name}` is not a type")]
    NotAType { name: String, span: Span },

    #[error("method receiver must be a named type or a pointer to one")]
    InvalidReceiver { span: Span },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PackageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConstId(pub usize);

/// A top-level entity in a package scope.
#[derive(Debug, Clone)]
pub enum Declared {
    Type(DefId),
    Func(FuncId),
    Const(ConstId),
    Set { file: SourceId, decl: Rc<SetDecl> },
}

/// A resolved function signature. Bodies are retained only so injector
/// stubs can be recognized during lowering.
#[derive(Debug, Clone)]
pub struct Func {
    pub symbol: Symbol,
    pub span: Span,
    pub file: SourceId,
    pub name_span: Span,
    pub params: Vec<(String, TypeId)>,
    pub results: Vec<ResultAtom>,
    pub body: Option<Vec<Stmt>>,
}

#[derive(Debug, Clone)]
pub struct Const {
    pub symbol: Symbol,
    pub span: Span,
    pub ty: TypeId,
}

#[derive(Debug)]
pub struct LoadedFile {
    pub source: SourceId,
    pub name: String,
    pub ast: SourceFile,
}

#[derive(Debug)]
pub struct Package {
    pub id: PackageId,
    pub path: String,
    pub name: String,
    pub dir: VfsPath,
    pub files: Vec<LoadedFile>,
    pub scope: HashMap<String, Declared>,
}

/// Everything a load produces: parsed packages, resolved symbols, the
/// interned type table, and the sources for diagnostics.
#[derive(Debug)]
pub struct Workspace {
    pub root: VfsPath,
    pub manifest: Manifest,
    pub packages: HashMap<PackageId, Package>,
    /// The packages named by the load's patterns (or picked up by default
    /// discovery), as opposed to ones pulled in through imports.
    pub requested: Vec<PackageId>,
    pub paths: BiMap<String, PackageId>,
    pub funcs: Vec<Func>,
    pub consts: Vec<Const>,
    pub types: TypeStore,
    pub sources: FileSources,
    pub file_imports: HashMap<SourceId, HashMap<String, PackageId>>,
}

impl Workspace {
    pub fn pkg(&self, id: PackageId) -> &Package {
        &self.packages[&id]
    }

    pub fn func(&self, id: FuncId) -> &Func {
        &self.funcs[id.0]
    }

    pub fn constant(&self, id: ConstId) -> &Const {
        &self.consts[id.0]
    }

    pub fn lookup_package(&self, path: &str) -> Option<PackageId> {
        self.paths.get_by_left(path).copied()
    }

    pub fn is_requested(&self, id: PackageId) -> bool {
        self.requested.contains(&id)
    }

    /// All loaded package ids, ordered by import path.
    pub fn sorted_ids(&self) -> Vec<PackageId> {
        let mut paths: Vec<&String> = self.paths.left_values().collect();
        paths.sort();
        paths
            .into_iter()
            .map(|p| *self.paths.get_by_left(p).unwrap())
            .collect()
    }

    /// The package a source file belongs to.
    pub fn package_of_file(&self, file: SourceId) -> Option<PackageId> {
        self.packages.iter().find_map(|(id, p)| {
            p.files.iter().any(|f| f.source == file).then_some(*id)
        })
    }

    /// Resolves a possibly-qualified reference from the given file.
    pub fn resolve(
        &self,
        pkg: PackageId,
        file: SourceId,
        path: &ast::Path,
    ) -> Option<(PackageId, &Declared)> {
        match &path.qualifier {
            Some(q) => {
                let target = *self.file_imports.get(&file)?.get(q)?;
                let declared = self.packages.get(&target)?.scope.get(&path.name)?;
                Some((target, declared))
            }
            None => {
                let declared = self.packages.get(&pkg)?.scope.get(&path.name)?;
                Some((pkg, declared))
            }
        }
    }
}

/// A failed load: every collected error plus the sources needed to
/// render them.
#[derive(Debug)]
pub struct LoadFailure {
    pub sources: FileSources,
    pub errors: Vec<LoadError>,
}

/// Loads a workspace rooted at `root`. `patterns` lists package import
/// paths; an empty list loads every package under the source root.
/// All independent errors are collected before returning.
pub fn load_workspace(root: &VfsPath, patterns: &[String]) -> Result<Workspace, LoadFailure> {
    let manifest = match Manifest::load(root) {
        Ok(m) => m,
        Err(e) => {
            return Err(LoadFailure {
                sources: FileSources::new(),
                errors: vec![e.into()],
            })
        }
    };
    let src = match root.join(manifest.src_dir()) {
        Ok(p) => p,
        Err(e) => {
            return Err(LoadFailure {
                sources: FileSources::new(),
                errors: vec![LoadError::Fs {
                    path: manifest.src_dir().to_string(),
                    error: e,
                }],
            })
        }
    };

    let mut state = LoadState {
        src: src.clone(),
        packages: HashMap::new(),
        paths: BiMap::new(),
        funcs: Vec::new(),
        consts: Vec::new(),
        types: TypeStore::new(),
        sources: FileSources::new(),
        file_imports: HashMap::new(),
        errors: Vec::new(),
        loading: Vec::new(),
    };

    let requested = if patterns.is_empty() {
        let mut discovered = Vec::new();
        discover_packages(&src, String::new(), &mut discovered, &mut state.errors);
        // The default scope is packages that take part in injection;
        // everything else is only loaded if an in-scope package imports it.
        discovered.retain(|path| {
            src.join(path)
                .map(|dir| package_declares_di(&dir))
                .unwrap_or(false)
        });
        discovered.sort();
        discovered
    } else {
        patterns.to_vec()
    };

    for path in &requested {
        if let Err(e) = state.load_package(path, None, 0) {
            state.errors.push(e);
        }
    }
    let requested_ids: Vec<PackageId> = requested
        .iter()
        .filter_map(|path| state.paths.get_by_left(path).copied())
        .collect();

    if !state.errors.is_empty() {
        return Err(LoadFailure {
            sources: state.sources,
            errors: state.errors,
        });
    }

    state.declare_types();
    state.resolve_details();
    state.resolve_signatures();

    // One pointer level beyond anything written in a signature, so the
    // analyzer can look up `&x` and `*T` forms without mutating the store.
    let ids: Vec<_> = state.types.all_ids().collect();
    for id in ids {
        state.types.pointer_to(id);
    }

    if !state.errors.is_empty() {
        return Err(LoadFailure {
            sources: state.sources,
            errors: state.errors,
        });
    }

    Ok(Workspace {
        root: root.clone(),
        manifest,
        packages: state.packages,
        requested: requested_ids,
        paths: state.paths,
        funcs: state.funcs,
        consts: state.consts,
        types: state.types,
        sources: state.sources,
        file_imports: state.file_imports,
    })
}

fn discover_packages(
    dir: &VfsPath,
    prefix: String,
    out: &mut Vec<String>,
    errors: &mut Vec<LoadError>,
) {
    let entries = match dir.read_dir() {
        Ok(entries) => entries,
        Err(e) => {
            errors.push(LoadError::Fs {
                path: dir.as_str().to_string(),
                error: e,
            });
            return;
        }
    };
    let mut entries: Vec<VfsPath> = entries.collect();
    entries.sort_by_key(|p| p.as_str().to_string());
    for entry in entries {
        if entry.is_dir().unwrap_or(false) {
            let name = entry.filename();
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{}/{}", prefix, name)
            };
            if package_has_sources(&entry) {
                out.push(path.clone());
            }
            discover_packages(&entry, path, out, errors);
        }
    }
}

fn package_has_sources(dir: &VfsPath) -> bool {
    dir.read_dir().map_or(false, |entries| {
        entries.into_iter().any(|e| {
            e.filename().ends_with(FILE_EXTENSION) && e.is_file().unwrap_or(false)
        })
    })
}

/// Token-level probe deciding whether a package takes part in injection:
/// any loadable file mentioning `make_set` or `build` counts, even when
/// the file has errors elsewhere.
fn package_declares_di(dir: &VfsPath) -> bool {
    let Ok(entries) = dir.read_dir() else {
        return false;
    };
    for entry in entries {
        if !entry.filename().ends_with(FILE_EXTENSION) || !entry.is_file().unwrap_or(false) {
            continue;
        }
        let Ok(content) = entry.read_to_string() else {
            continue;
        };
        if !included(&scan_directives(&content), &[INJECT_TAG]) {
            continue;
        }
        let (tokens, _) = Lexer::new(&content, SourceId::SYNTHETIC).collect_all();
        let mentions_primitive = tokens.iter().any(|t| {
            matches!(&t.kind, TokenKind::Identifier(name) if name == "make_set" || name == "build")
        });
        if mentions_primitive {
            return true;
        }
    }
    false
}

/// Scans leading `#:when` / `#:unless` directives without parsing, so
/// excluded files (the generated output among them) are never parsed.
fn scan_directives(content: &str) -> Vec<(bool, String)> {
    let mut out = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let Some(rest) = line.strip_prefix("#:") else {
            break;
        };
        let mut parts = rest.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some("when"), Some(tag)) => out.push((true, tag.to_string())),
            (Some("unless"), Some(tag)) => out.push((false, tag.to_string())),
            _ => break,
        }
    }
    out
}

fn included(directives: &[(bool, String)], tags: &[&str]) -> bool {
    directives.iter().all(|(when, tag)| {
        let has = tags.contains(&tag.as_str());
        if *when {
            has
        } else {
            !has
        }
    })
}

struct LoadState {
    src: VfsPath,
    packages: HashMap<PackageId, Package>,
    paths: BiMap<String, PackageId>,
    funcs: Vec<Func>,
    consts: Vec<Const>,
    types: TypeStore,
    sources: FileSources,
    file_imports: HashMap<SourceId, HashMap<String, PackageId>>,
    errors: Vec<LoadError>,
    loading: Vec<String>,
}

impl LoadState {
    fn load_package(
        &mut self,
        path: &str,
        origin: Option<Span>,
        depth: usize,
    ) -> Result<PackageId, LoadError> {
        if let Some(&id) = self.paths.get_by_left(path) {
            return Ok(id);
        }
        if depth >= RECURSION_LIMIT {
            return Err(LoadError::RecursionLimit {
                path: path.to_string(),
            });
        }
        if self.loading.iter().any(|p| p == path) {
            let mut chain = self.loading.clone();
            chain.push(path.to_string());
            return Err(LoadError::ImportCycle {
                chain,
                span: origin.unwrap_or(Span::new(SourceId::SYNTHETIC, 0..0)),
            });
        }

        let dir = self.src.join(path).map_err(|e| LoadError::Fs {
            path: path.to_string(),
            error: e,
        })?;
        if !dir.exists().unwrap_or(false) || !package_has_sources(&dir) {
            return Err(LoadError::PackageNotFound {
                path: path.to_string(),
                span: origin,
            });
        }

        let expected_name = path.rsplit('/').next().unwrap_or(path).to_string();
        let id = PackageId(self.packages.len());
        self.paths.insert(path.to_string(), id);
        self.loading.push(path.to_string());
        let result = self.load_package_files(id, path, &dir, expected_name, depth);
        self.loading.pop();
        result?;
        Ok(id)
    }

    fn load_package_files(
        &mut self,
        id: PackageId,
        path: &str,
        dir: &VfsPath,
        expected_name: String,
        depth: usize,
    ) -> Result<(), LoadError> {
        let mut file_names: Vec<String> = dir
            .read_dir()
            .map_err(|e| LoadError::Fs {
                path: path.to_string(),
                error: e,
            })?
            .filter(|e| e.filename().ends_with(FILE_EXTENSION) && e.is_file().unwrap_or(false))
            .map(|e| e.filename())
            .collect();
        file_names.sort();

        let mut files: Vec<LoadedFile> = Vec::new();
        let mut pending_imports: Vec<(SourceId, ast::Import)> = Vec::new();
        for file_name in file_names {
            let file_path = dir.join(&file_name).map_err(|e| LoadError::Fs {
                path: file_name.clone(),
                error: e,
            })?;
            let content = file_path.read_to_string().map_err(|e| LoadError::Fs {
                path: file_path.as_str().to_string(),
                error: e,
            })?;

            if !included(&scan_directives(&content), &[INJECT_TAG]) {
                continue;
            }

            let source = self.sources.add(file_path.as_str().to_string(), content.as_str());
            let mut lexer = Lexer::new(&content, source);
            let (tokens, lex_errors) = lexer.collect_all();
            if !lex_errors.is_empty() {
                self.errors.push(LoadError::LexErrors { errors: lex_errors });
                continue;
            }

            let eoi = Span::new(source, content.len()..content.len());
            let parsed = parse_file(&tokens, eoi);
            if parsed.has_errors() {
                let owned = parsed
                    .errors()
                    .map(|e| e.clone().into_owned())
                    .collect::<Vec<_>>();
                self.errors.push(LoadError::ParseErrors { errors: owned });
                continue;
            }
            let ast = parsed
                .into_output()
                .expect("parse result should have output if no errors");

            if ast.package != expected_name {
                self.errors.push(LoadError::PackageNameMismatch {
                    expected: expected_name.clone(),
                    found: ast.package.clone(),
                    span: ast.package_span,
                });
            }

            for import in &ast.imports {
                pending_imports.push((source, import.clone()));
            }
            files.push(LoadedFile {
                source,
                name: file_name,
                ast,
            });
        }

        self.packages.insert(
            id,
            Package {
                id,
                path: path.to_string(),
                name: expected_name,
                dir: dir.clone(),
                files,
                scope: HashMap::new(),
            },
        );

        for (source, import) in pending_imports {
            match self.load_package(&import.path, Some(import.span), depth + 1) {
                Ok(target) => {
                    let alias = import
                        .alias
                        .clone()
                        .unwrap_or_else(|| {
                            import.path.rsplit('/').next().unwrap_or(&import.path).to_string()
                        });
                    let aliases = self.file_imports.entry(source).or_default();
                    if aliases.insert(alias.clone(), target).is_some() {
                        self.errors.push(LoadError::DuplicateDecl {
                            name: alias,
                            span: import.span,
                            previous: import.span,
                        });
                    }
                }
                Err(e) => self.errors.push(e),
            }
        }

        Ok(())
    }

    /// First declaration pass: every named type gets a DefId before any
    /// signature mentions it.
    fn declare_types(&mut self) {
        let ids: Vec<PackageId> = {
            let mut v: Vec<_> = self.packages.keys().copied().collect();
            v.sort();
            v
        };
        for id in ids {
            let decls: Vec<(String, Span, String)> = self.packages[&id]
                .files
                .iter()
                .flat_map(|f| {
                    f.ast.decls.iter().filter_map(|d| match d {
                        Decl::Type(t) => {
                            Some((t.name.clone(), t.span, self.packages[&id].path.clone()))
                        }
                        _ => None,
                    })
                })
                .collect();
            for (name, span, pkg_path) in decls {
                if let Some(previous) = self.existing_span(id, &name) {
                    self.errors.push(LoadError::DuplicateDecl {
                        name,
                        span,
                        previous,
                    });
                    continue;
                }
                let def = self.types.declare_named(Symbol::new(pkg_path, name.clone()), span);
                self.types.named_type(def);
                self.packages
                    .get_mut(&id)
                    .unwrap()
                    .scope
                    .insert(name, Declared::Type(def));
            }
        }
    }

    fn existing_span(&self, id: PackageId, name: &str) -> Option<Span> {
        match self.packages[&id].scope.get(name)? {
            Declared::Type(def) => Some(self.types.def(*def).span),
            Declared::Func(f) => Some(self.funcs[f.0].span),
            Declared::Const(c) => Some(self.consts[c.0].span),
            Declared::Set { decl, .. } => Some(decl.span),
        }
    }

    /// Second pass: struct fields and interface method sets.
    fn resolve_details(&mut self) {
        let ids: Vec<PackageId> = {
            let mut v: Vec<_> = self.packages.keys().copied().collect();
            v.sort();
            v
        };
        for id in ids {
            let type_decls: Vec<(SourceId, ast::TypeDecl)> = self.packages[&id]
                .files
                .iter()
                .flat_map(|f| {
                    f.ast.decls.iter().filter_map(move |d| match d {
                        Decl::Type(t) => Some((f.source, t.clone())),
                        _ => None,
                    })
                })
                .collect();
            for (source, decl) in type_decls {
                let Some(Declared::Type(def)) = self.packages[&id].scope.get(&decl.name).cloned()
                else {
                    continue;
                };
                match &decl.body {
                    TypeBody::Struct { fields } => {
                        let mut resolved = Vec::new();
                        for field in fields {
                            match self.resolve_type_expr(id, source, &field.ty) {
                                Ok(ty) => resolved.push((field.name.clone(), ty)),
                                Err(e) => self.errors.push(e),
                            }
                        }
                        self.types.set_detail(def, DefDetail::Struct { fields: resolved });
                    }
                    TypeBody::Interface { methods } => {
                        let mut resolved = Vec::new();
                        for m in methods {
                            match self.resolve_method_sig(id, source, &m.name, &m.params, &m.results)
                            {
                                Ok(sig) => resolved.push(sig),
                                Err(e) => self.errors.push(e),
                            }
                        }
                        self.types
                            .set_detail(def, DefDetail::Interface { methods: resolved });
                    }
                }
            }
        }
    }

    /// Third pass: function, method, constant, and set declarations.
    fn resolve_signatures(&mut self) {
        let ids: Vec<PackageId> = {
            let mut v: Vec<_> = self.packages.keys().copied().collect();
            v.sort();
            v
        };
        for id in ids {
            let pkg_path = self.packages[&id].path.clone();
            let decls: Vec<(SourceId, Decl)> = self.packages[&id]
                .files
                .iter()
                .flat_map(|f| f.ast.decls.iter().map(move |d| (f.source, d.clone())))
                .collect();
            for (source, decl) in decls {
                match decl {
                    Decl::Type(_) => {}
                    Decl::Fn(f) => self.resolve_fn(id, source, &pkg_path, f),
                    Decl::Const(c) => {
                        if let Some(previous) = self.existing_span(id, &c.name) {
                            self.errors.push(LoadError::DuplicateDecl {
                                name: c.name.clone(),
                                span: c.span,
                                previous,
                            });
                            continue;
                        }
                        match self.resolve_type_expr(id, source, &c.ty) {
                            Ok(ty) => {
                                let const_id = ConstId(self.consts.len());
                                self.consts.push(Const {
                                    symbol: Symbol::new(pkg_path.clone(), c.name.clone()),
                                    span: c.span,
                                    ty,
                                });
                                self.packages
                                    .get_mut(&id)
                                    .unwrap()
                                    .scope
                                    .insert(c.name, Declared::Const(const_id));
                            }
                            Err(e) => self.errors.push(e),
                        }
                    }
                    Decl::Set(s) => {
                        if let Some(previous) = self.existing_span(id, &s.name) {
                            self.errors.push(LoadError::DuplicateDecl {
                                name: s.name.clone(),
                                span: s.span,
                                previous,
                            });
                            continue;
                        }
                        let name = s.name.clone();
                        self.packages.get_mut(&id).unwrap().scope.insert(
                            name,
                            Declared::Set {
                                file: source,
                                decl: Rc::new(s),
                            },
                        );
                    }
                }
            }
        }
    }

    fn resolve_fn(&mut self, id: PackageId, source: SourceId, pkg_path: &str, f: FnDecl) {
        let mut results = Vec::new();
        let mut failed = false;
        for r in &f.results {
            match r {
                ResultExpr::Type(te) => match self.resolve_type_expr(id, source, te) {
                    Ok(ty) => results.push(ResultAtom::Type(ty)),
                    Err(e) => {
                        self.errors.push(e);
                        failed = true;
                    }
                },
                ResultExpr::Error(_) => results.push(ResultAtom::Error),
                ResultExpr::Cleanup(_) => results.push(ResultAtom::Cleanup),
            }
        }
        let mut params = Vec::new();
        for p in &f.params {
            match self.resolve_type_expr(id, source, &p.ty) {
                Ok(ty) => params.push((p.name.clone(), ty)),
                Err(e) => {
                    self.errors.push(e);
                    failed = true;
                }
            }
        }
        if failed {
            return;
        }

        if let Some(receiver) = &f.receiver {
            let recv = match self.resolve_type_expr(id, source, receiver) {
                Ok(t) => t,
                Err(e) => {
                    self.errors.push(e);
                    return;
                }
            };
            let named_ok = match self.types.kind(recv) {
                TypeKind::Named(_) => true,
                TypeKind::Pointer(inner) => {
                    matches!(self.types.kind(*inner), TypeKind::Named(_))
                }
                _ => false,
            };
            if !named_ok {
                self.errors.push(LoadError::InvalidReceiver { span: receiver.span });
                return;
            }
            self.types.add_method(
                recv,
                MethodSig {
                    name: f.name.clone(),
                    params: params.into_iter().map(|(_, t)| t).collect(),
                    results,
                },
            );
            return;
        }

        if let Some(previous) = self.existing_span(id, &f.name) {
            self.errors.push(LoadError::DuplicateDecl {
                name: f.name.clone(),
                span: f.span,
                previous,
            });
            return;
        }
        let func_id = FuncId(self.funcs.len());
        self.funcs.push(Func {
            symbol: Symbol::new(pkg_path.to_string(), f.name.clone()),
            span: f.span,
            file: source,
            name_span: f.span,
            params,
            results,
            body: f.body,
        });
        self.packages
            .get_mut(&id)
            .unwrap()
            .scope
            .insert(f.name, Declared::Func(func_id));
    }

    fn resolve_method_sig(
        &mut self,
        id: PackageId,
        source: SourceId,
        name: &str,
        params: &[TypeExpr],
        results: &[ResultExpr],
    ) -> Result<MethodSig, LoadError> {
        let mut resolved_params = Vec::new();
        for p in params {
            resolved_params.push(self.resolve_type_expr(id, source, p)?);
        }
        let mut resolved_results = Vec::new();
        for r in results {
            match r {
                ResultExpr::Type(te) => {
                    resolved_results.push(ResultAtom::Type(self.resolve_type_expr(id, source, te)?))
                }
                ResultExpr::Error(_) => resolved_results.push(ResultAtom::Error),
                ResultExpr::Cleanup(_) => resolved_results.push(ResultAtom::Cleanup),
            }
        }
        Ok(MethodSig {
            name: name.to_string(),
            params: resolved_params,
            results: resolved_results,
        })
    }

    fn resolve_type_expr(
        &mut self,
        pkg: PackageId,
        file: SourceId,
        te: &TypeExpr,
    ) -> Result<TypeId, LoadError> {
        match &te.kind {
            TypeExprKind::Pointer(inner) => {
                let inner = self.resolve_type_expr(pkg, file, inner)?;
                Ok(self.types.pointer_to(inner))
            }
            TypeExprKind::Name(path) => match &path.qualifier {
                Some(q) => {
                    let target = self
                        .file_imports
                        .get(&file)
                        .and_then(|m| m.get(q))
                        .copied()
                        .ok_or(LoadError::UnknownQualifier {
                            name: q.clone(),
                            span: te.span,
                        })?;
                    match self.packages[&target].scope.get(&path.name) {
                        Some(Declared::Type(def)) => {
                            let def = *def;
                            Ok(self.types.named_type(def))
                        }
                        Some(_) => Err(LoadError::NotAType {
                            name: path.to_string(),
                            span: te.span,
                        }),
                        None => Err(LoadError::UnknownType {
                            name: path.to_string(),
                            span: te.span,
                        }),
                    }
                }
                None => match self.packages[&pkg].scope.get(&path.name) {
                    Some(Declared::Type(def)) => {
                        let def = *def;
                        Ok(self.types.named_type(def))
                    }
                    Some(_) => Err(LoadError::NotAType {
                        name: path.name.clone(),
                        span: te.span,
                    }),
                    None => match BUILTIN_TYPES.get(path.name.as_str()) {
                        Some(basic) => Ok(self.types.basic(*basic)),
                        None => Err(LoadError::UnknownType {
                            name: path.name.clone(),
                            span: te.span,
                        }),
                    },
                },
            },
        }
    }
}
