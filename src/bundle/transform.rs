//! Action bundling: ESM source in, self-registering script out.
//!
//! The target runtime evaluates each bundle as a plain script inside an
//! IIFE and then reads `globalThis["<name>"]`, so module syntax has to go.
//! The rewrite is span splicing over the oxc AST: import and export
//! statements are replaced in place, the rest of the source passes through
//! byte for byte. Relative imports are inlined into a small module map,
//! builtin imports become shim bindings, and the entry's default export is
//! captured and registered under the action name.
//!
//! TypeScript sources are type-stripped with the oxc transformer first,
//! then rewritten like any other script.

use std::path::{Path, PathBuf};

use oxc::allocator::Allocator;
use oxc::ast::ast::{
    BindingPattern, Declaration, ImportDeclarationSpecifier, ModuleExportName, Statement,
};
use oxc::codegen::Codegen;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::{GetSpan, SourceType};
use oxc::transformer::{TransformOptions, Transformer};
use rustc_hash::FxHashMap;

use crate::diagnostics::{CodeFrame, DiagnosticRecord};

use super::discover::ActionUnit;
use super::shims;

/// Bundle one action script with everything it imports.
///
/// `root` anchors module identities and diagnostic paths. On failure every
/// diagnostic found across the import graph is returned, not just the first.
pub fn bundle_action(unit: &ActionUnit, root: &Path) -> Result<String, Vec<DiagnosticRecord>> {
    let root = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    let mut bundler = Bundler {
        root,
        visited: FxHashMap::default(),
        stack: Vec::new(),
        modules: Vec::new(),
        shims: Vec::new(),
        diagnostics: Vec::new(),
    };

    let entry = bundler.rewrite_file(&unit.source_path, Mode::Entry);

    if !bundler.diagnostics.is_empty() {
        return Err(bundler.diagnostics);
    }

    let entry = entry.unwrap_or_default();
    if !entry.saw_default {
        return Err(vec![
            DiagnosticRecord::new(
                "Action has no default export",
                bundler.display_path(&unit.source_path),
                format!("action '{}' must export its handler as the default export", unit.name),
            )
            .with_suggestion("add `export default defineAction({ ... })`"),
        ]);
    }

    Ok(bundler.assemble(&unit.name, &entry.body))
}

#[derive(Clone, Copy, PartialEq)]
enum Mode {
    /// The action script itself; its default export becomes the handler.
    Entry,
    /// An imported module; exports become `exports.*` assignments.
    Dep,
}

struct ModuleOutput {
    id: String,
    body: String,
}

enum Inlined {
    Module(String),
    /// No file matched the import path; the caller reports it with span info.
    NotFound,
    /// The module failed to bundle; diagnostics are already recorded.
    Failed,
}

#[derive(Default)]
struct Rewritten {
    body: String,
    saw_default: bool,
}

struct Bundler {
    root: PathBuf,
    /// canonical path -> module id, for modules already inlined
    visited: FxHashMap<PathBuf, String>,
    /// canonical paths currently being rewritten (cycle detection)
    stack: Vec<PathBuf>,
    /// inlined modules in dependency-first order
    modules: Vec<ModuleOutput>,
    /// shim bindings required anywhere in the graph, first-use order
    shims: Vec<&'static str>,
    diagnostics: Vec<DiagnosticRecord>,
}

impl Bundler {
    fn display_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    fn note_shim(&mut self, binding: &'static str) {
        if !self.shims.contains(&binding) {
            self.shims.push(binding);
        }
    }

    /// Read, strip and rewrite one file. Diagnostics are accumulated; a
    /// None return means they already explain the failure.
    fn rewrite_file(&mut self, path: &Path, mode: Mode) -> Option<Rewritten> {
        let display = self.display_path(path);
        let source = match std::fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                self.diagnostics.push(DiagnosticRecord::new(
                    "Unreadable source file",
                    display,
                    e.to_string(),
                ));
                return None;
            }
        };

        let is_ts = path.extension().and_then(|e| e.to_str()) == Some("ts");
        let source = if is_ts {
            match strip_types(&source, path) {
                Ok(js) => js,
                Err(errs) => {
                    self.diagnostics
                        .extend(parse_diagnostics(&errs, &display, &source));
                    return None;
                }
            }
        } else {
            source
        };

        self.rewrite(&source, path, &display, mode)
    }

    fn rewrite(
        &mut self,
        source: &str,
        path: &Path,
        display: &str,
        mode: Mode,
    ) -> Option<Rewritten> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, SourceType::mjs()).parse();
        if !ret.errors.is_empty() {
            self.diagnostics
                .extend(parse_diagnostics(&ret.errors, display, source));
            return None;
        }

        let dir = path.parent().unwrap_or(&self.root).to_path_buf();
        let mut edits: Vec<(u32, u32, String)> = Vec::new();
        let mut saw_default = false;

        for stmt in &ret.program.body {
            match stmt {
                Statement::ImportDeclaration(decl) => {
                    let spec = decl.source.value.as_str();
                    let imports = decl
                        .specifiers
                        .as_ref()
                        .map(|specs| collect_imports(specs))
                        .unwrap_or_default();
                    let replacement = if let Some(binding) = shims::lookup(spec) {
                        self.note_shim(binding);
                        binding_stmt(&imports, binding, false)
                    } else if is_relative(spec) {
                        match self.inline_module(&dir, spec) {
                            Inlined::Module(id) => {
                                let expr = format!("__titan_require(\"{id}\")");
                                if imports.is_empty() {
                                    format!("{expr};")
                                } else {
                                    binding_stmt(&imports, &expr, true)
                                }
                            }
                            Inlined::NotFound => {
                                self.push_span_diagnostic(
                                    "Unresolved import",
                                    display,
                                    source,
                                    decl.source.span,
                                    format!("cannot resolve '{spec}' relative to '{display}'"),
                                    Some("check the path; extensions .js, .mjs and .ts are tried"),
                                );
                                String::new()
                            }
                            Inlined::Failed => String::new(),
                        }
                    } else {
                        self.push_span_diagnostic(
                            "Unresolved import",
                            display,
                            source,
                            decl.source.span,
                            format!("'{spec}' is not a builtin and cannot be fetched at build time"),
                            Some("vendor the module next to the action and import it by relative path"),
                        );
                        String::new()
                    };
                    edits.push((decl.span.start, decl.span.end, replacement));
                }
                Statement::ExportDefaultDeclaration(decl) => {
                    saw_default = true;
                    let target = match mode {
                        Mode::Entry => "const __titan_default = ",
                        Mode::Dep => "exports.default = ",
                    };
                    let kind_start = decl.declaration.span().start;
                    edits.push((decl.span.start, kind_start, target.to_string()));
                    edits.push((decl.span.end, decl.span.end, ";".to_string()));
                }
                Statement::ExportNamedDeclaration(decl) => {
                    if let Some(declaration) = &decl.declaration {
                        // `export const a = ...` / `export function f() {}`
                        edits.push((decl.span.start, declaration.span().start, String::new()));
                        if mode == Mode::Dep {
                            let suffix = declared_names(declaration)
                                .iter()
                                .map(|n| format!("\nexports.{n} = {n};"))
                                .collect::<String>();
                            edits.push((decl.span.end, decl.span.end, suffix));
                        }
                    } else if let Some(from) = &decl.source {
                        // `export { a as b } from './x'`
                        let spec = from.value.as_str();
                        let replacement = match self.inline_module(&dir, spec) {
                            Inlined::Module(id) if mode == Mode::Dep => {
                                let pairs: String = decl
                                    .specifiers
                                    .iter()
                                    .map(|s| {
                                        format!(
                                            " exports.{} = __m.{};",
                                            export_name(&s.exported),
                                            export_name(&s.local)
                                        )
                                    })
                                    .collect();
                                format!("{{ const __m = __titan_require(\"{id}\");{pairs} }}")
                            }
                            Inlined::Module(id) => format!("__titan_require(\"{id}\");"),
                            Inlined::NotFound => {
                                self.push_span_diagnostic(
                                    "Unresolved import",
                                    display,
                                    source,
                                    from.span,
                                    format!("cannot resolve '{spec}' relative to '{display}'"),
                                    None,
                                );
                                String::new()
                            }
                            Inlined::Failed => String::new(),
                        };
                        edits.push((decl.span.start, decl.span.end, replacement));
                    } else {
                        // `export { a, b as c }`
                        let replacement = if mode == Mode::Dep {
                            decl.specifiers
                                .iter()
                                .map(|s| {
                                    format!(
                                        "exports.{} = {};",
                                        export_name(&s.exported),
                                        export_name(&s.local)
                                    )
                                })
                                .collect::<Vec<_>>()
                                .join(" ")
                        } else {
                            String::new()
                        };
                        edits.push((decl.span.start, decl.span.end, replacement));
                    }
                }
                Statement::ExportAllDeclaration(decl) => {
                    let spec = decl.source.value.as_str();
                    let replacement = match self.inline_module(&dir, spec) {
                        Inlined::Module(id) if mode == Mode::Dep => {
                            format!("Object.assign(exports, __titan_require(\"{id}\"));")
                        }
                        Inlined::Module(id) => format!("__titan_require(\"{id}\");"),
                        Inlined::NotFound => {
                            self.push_span_diagnostic(
                                "Unresolved import",
                                display,
                                source,
                                decl.source.span,
                                format!("cannot resolve '{spec}' relative to '{display}'"),
                                None,
                            );
                            String::new()
                        }
                        Inlined::Failed => String::new(),
                    };
                    edits.push((decl.span.start, decl.span.end, replacement));
                }
                _ => {}
            }
        }

        Some(Rewritten {
            body: splice(source, edits),
            saw_default,
        })
    }

    /// Resolve and inline a relative import, returning its module id.
    fn inline_module(&mut self, from_dir: &Path, spec: &str) -> Inlined {
        if !is_relative(spec) {
            return Inlined::NotFound;
        }
        let Some(target) = resolve(from_dir, spec) else {
            return Inlined::NotFound;
        };

        if let Some(id) = self.visited.get(&target) {
            return Inlined::Module(id.clone());
        }
        if self.stack.contains(&target) {
            self.diagnostics.push(
                DiagnosticRecord::new(
                    "Circular import",
                    self.display_path(&target),
                    format!(
                        "'{}' is imported again while it is still being bundled",
                        self.display_path(&target)
                    ),
                )
                .with_suggestion("break the cycle by moving shared code into a third module"),
            );
            return Inlined::Failed;
        }

        let id = self.display_path(&target);
        self.stack.push(target.clone());
        let rewritten = self.rewrite_file(&target, Mode::Dep);
        self.stack.pop();

        let Some(rewritten) = rewritten else {
            return Inlined::Failed;
        };
        self.visited.insert(target, id.clone());
        self.modules.push(ModuleOutput {
            id: id.clone(),
            body: rewritten.body,
        });
        Inlined::Module(id)
    }

    fn push_span_diagnostic(
        &mut self,
        title: &str,
        display: &str,
        source: &str,
        span: oxc::span::Span,
        message: String,
        suggestion: Option<&str>,
    ) {
        let (line, column, text) = locate(source, span.start as usize);
        let mut record = DiagnosticRecord::new(title, display, message)
            .at(line, column)
            .with_frame(CodeFrame { line, column, text });
        if let Some(s) = suggestion {
            record = record.with_suggestion(s);
        }
        self.diagnostics.push(record);
    }

    /// Final assembly: shim preludes, module map, entry body, registration.
    fn assemble(&self, name: &str, entry_body: &str) -> String {
        let mut out = String::new();
        out.push_str("// generated by titan dev\n");
        out.push_str("\"use strict\";\n");
        out.push_str("(function () {\n");

        for binding in &self.shims {
            out.push_str(shims::prelude(binding));
            out.push('\n');
        }

        if !self.modules.is_empty() {
            out.push_str(concat!(
                "const __titan_modules = Object.create(null);\n",
                "const __titan_cache = Object.create(null);\n",
                "const __titan_require = function (id) {\n",
                "  let module = __titan_cache[id];\n",
                "  if (!module) {\n",
                "    module = __titan_cache[id] = { exports: {} };\n",
                "    __titan_modules[id](module.exports);\n",
                "  }\n",
                "  return module.exports;\n",
                "};\n",
            ));
            for module in &self.modules {
                out.push_str(&format!(
                    "__titan_modules[\"{}\"] = function (exports) {{\n{}\n}};\n",
                    module.id,
                    module.body.trim_end()
                ));
            }
        }

        out.push_str(
            "const __titan_define = globalThis.defineAction || function (handler) { return handler; };\n",
        );
        out.push_str(entry_body.trim_end());
        out.push('\n');
        out.push_str(&format!(
            "globalThis[\"{name}\"] = __titan_define(__titan_default);\n"
        ));
        out.push_str("})();\n");
        out
    }
}

/// Strip TypeScript syntax, leaving ESM JavaScript.
fn strip_types(source: &str, path: &Path) -> Result<String, Vec<oxc::diagnostics::OxcDiagnostic>> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, SourceType::ts()).parse();
    if !ret.errors.is_empty() {
        return Err(ret.errors);
    }
    let mut program = ret.program;
    let scoping = SemanticBuilder::new().build(&program).semantic.into_scoping();
    let result = Transformer::new(&allocator, path, &TransformOptions::default())
        .build_with_scoping(scoping, &mut program);
    if !result.errors.is_empty() {
        return Err(result.errors);
    }
    Ok(Codegen::new().build(&program).code)
}

#[derive(Default)]
struct Imports {
    default: Option<String>,
    namespace: Option<String>,
    /// (imported, local)
    named: Vec<(String, String)>,
}

impl Imports {
    fn is_empty(&self) -> bool {
        self.default.is_none() && self.namespace.is_none() && self.named.is_empty()
    }
}

fn collect_imports(specifiers: &[ImportDeclarationSpecifier]) -> Imports {
    let mut imports = Imports::default();
    for spec in specifiers {
        match spec {
            ImportDeclarationSpecifier::ImportDefaultSpecifier(s) => {
                imports.default = Some(s.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportNamespaceSpecifier(s) => {
                imports.namespace = Some(s.local.name.to_string());
            }
            ImportDeclarationSpecifier::ImportSpecifier(s) => {
                imports
                    .named
                    .push((export_name(&s.imported), s.local.name.to_string()));
            }
        }
    }
    imports
}

/// Emit `const` bindings for an import against a value expression.
///
/// `default_is_member` distinguishes inlined modules (default export lives
/// at `.default`) from shim objects (the object itself is the default).
fn binding_stmt(imports: &Imports, expr: &str, default_is_member: bool) -> String {
    let mut parts = Vec::new();
    if let Some(local) = &imports.namespace {
        parts.push(format!("const {local} = {expr};"));
    }
    if let Some(local) = &imports.default {
        if default_is_member {
            parts.push(format!("const {local} = {expr}.default;"));
        } else {
            parts.push(format!("const {local} = {expr};"));
        }
    }
    if !imports.named.is_empty() {
        let fields: Vec<String> = imports
            .named
            .iter()
            .map(|(imported, local)| {
                if imported == local {
                    imported.clone()
                } else {
                    format!("{imported}: {local}")
                }
            })
            .collect();
        parts.push(format!("const {{ {} }} = {expr};", fields.join(", ")));
    }
    parts.join(" ")
}

fn export_name(name: &ModuleExportName) -> String {
    match name {
        ModuleExportName::IdentifierName(id) => id.name.to_string(),
        ModuleExportName::IdentifierReference(id) => id.name.to_string(),
        ModuleExportName::StringLiteral(s) => s.value.to_string(),
    }
}

/// Names bound by an exported declaration, for `exports.*` re-assignment.
fn declared_names(declaration: &Declaration) -> Vec<String> {
    match declaration {
        Declaration::VariableDeclaration(v) => v
            .declarations
            .iter()
            .filter_map(|d| match &d.id {
                BindingPattern::BindingIdentifier(ident) => Some(ident.name.to_string()),
                _ => None,
            })
            .collect(),
        Declaration::FunctionDeclaration(f) => {
            f.id.iter().map(|id| id.name.to_string()).collect()
        }
        Declaration::ClassDeclaration(c) => c.id.iter().map(|id| id.name.to_string()).collect(),
        _ => Vec::new(),
    }
}

fn is_relative(spec: &str) -> bool {
    spec.starts_with("./") || spec.starts_with("../")
}

/// Resolve a relative import the way the original loader did: the literal
/// path first, then with script extensions appended, then as a directory
/// with an index.js.
fn resolve(from_dir: &Path, spec: &str) -> Option<PathBuf> {
    let base = from_dir.join(spec);
    let mut candidates = vec![base.clone()];
    for ext in ["js", "mjs", "ts"] {
        let mut with_ext = base.clone().into_os_string();
        with_ext.push(format!(".{ext}"));
        candidates.push(PathBuf::from(with_ext));
    }
    candidates.push(base.join("index.js"));

    candidates
        .into_iter()
        .find(|c| c.is_file())
        .and_then(|c| c.canonicalize().ok())
}

/// 1-based line/column and the line's text for a byte offset.
fn locate(source: &str, offset: usize) -> (usize, usize, String) {
    let offset = offset.min(source.len());
    let prefix = &source[..offset];
    let line_start = prefix.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let line = prefix.matches('\n').count() + 1;
    let column = source[line_start..offset].chars().count() + 1;
    let text = source[line_start..]
        .lines()
        .next()
        .unwrap_or_default()
        .to_string();
    (line, column, text)
}

fn parse_diagnostics(
    errors: &[oxc::diagnostics::OxcDiagnostic],
    display: &str,
    source: &str,
) -> Vec<DiagnosticRecord> {
    errors
        .iter()
        .map(|error| {
            let mut record = DiagnosticRecord::new(
                "Syntax error",
                display.to_string(),
                error.message.to_string(),
            );
            if let Some(label) = error.labels.as_ref().and_then(|l| l.first()) {
                let (line, column, text) = locate(source, label.offset());
                record = record.at(line, column).with_frame(CodeFrame { line, column, text });
            }
            if let Some(help) = &error.help {
                record = record.with_suggestion(help.to_string());
            }
            record
        })
        .collect()
}

/// Apply non-overlapping span edits to the source.
fn splice(source: &str, mut edits: Vec<(u32, u32, String)>) -> String {
    edits.sort_by_key(|e| (e.0, e.1));
    let mut out = String::with_capacity(source.len());
    let mut cursor = 0usize;
    for (start, end, replacement) in edits {
        out.push_str(&source[cursor..start as usize]);
        out.push_str(&replacement);
        cursor = end as usize;
    }
    out.push_str(&source[cursor..]);
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn unit(dir: &Path, name: &str) -> ActionUnit {
        ActionUnit {
            name: name.to_string(),
            source_path: dir.join(format!("actions/{name}.js")),
            output_path: dir.join(format!("out/{name}.js")),
        }
    }

    fn write_action(dir: &Path, name: &str, source: &str) {
        let actions = dir.join("actions");
        std::fs::create_dir_all(&actions).unwrap();
        std::fs::write(actions.join(name), source).unwrap();
    }

    fn bundle(dir: &Path, name: &str) -> Result<String, Vec<DiagnosticRecord>> {
        bundle_action(&unit(dir, name), dir)
    }

    #[test]
    fn test_simple_action_registers_global() {
        let temp = TempDir::new().unwrap();
        write_action(
            temp.path(),
            "login.js",
            "export default defineAction({ handler: () => ({ ok: true }) });",
        );
        let out = bundle(temp.path(), "login").unwrap();
        assert!(out.contains("const __titan_default = defineAction("));
        assert!(out.contains("globalThis[\"login\"] = __titan_define(__titan_default);"));
        assert!(out.starts_with("// generated by titan dev"));
    }

    #[test]
    fn test_missing_default_export_is_a_diagnostic() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "login.js", "export const x = 1;");
        let errs = bundle(temp.path(), "login").unwrap_err();
        assert_eq!(errs[0].title, "Action has no default export");
    }

    #[test]
    fn test_syntax_error_carries_position() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "login.js", "export default {\n  ,\n};");
        let errs = bundle(temp.path(), "login").unwrap_err();
        assert_eq!(errs[0].title, "Syntax error");
        assert!(errs[0].line.is_some());
        assert!(errs[0].code_frame.is_some());
    }

    #[test]
    fn test_builtin_import_becomes_shim_binding() {
        let temp = TempDir::new().unwrap();
        write_action(
            temp.path(),
            "read.js",
            "import { readFileSync } from 'node:fs';\nexport default () => readFileSync('x');",
        );
        let out = bundle(temp.path(), "read").unwrap();
        assert!(out.contains("const __titan_fs = {"));
        assert!(out.contains("const { readFileSync } = __titan_fs;"));
        assert!(!out.contains("import"));
    }

    #[test]
    fn test_relative_import_is_inlined() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "db.js", "export default { q: () => 1 };\nexport const ping = () => 'pong';");
        write_action(
            temp.path(),
            "login.js",
            "import db, { ping } from './db';\nexport default () => db.q() + ping();",
        );
        let out = bundle(temp.path(), "login").unwrap();
        assert!(out.contains("__titan_modules[\"actions/db.js\"] = function (exports) {"));
        assert!(out.contains("exports.default = { q: () => 1 };"));
        assert!(out.contains("exports.ping = ping;"));
        assert!(out.contains("const db = __titan_require(\"actions/db.js\").default;"));
        assert!(out.contains("const { ping } = __titan_require(\"actions/db.js\");"));
    }

    #[test]
    fn test_shared_module_is_inlined_once() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "util.js", "export const u = 1;");
        write_action(temp.path(), "a.js", "import { u } from './util';\nexport const a = u;");
        write_action(
            temp.path(),
            "entry.js",
            "import { a } from './a';\nimport { u } from './util';\nexport default () => a + u;",
        );
        let out = bundle(temp.path(), "entry").unwrap();
        assert_eq!(out.matches("__titan_modules[\"actions/util.js\"]").count(), 1);
    }

    #[test]
    fn test_circular_import_is_a_diagnostic() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "a.js", "import './b';\nexport const a = 1;");
        write_action(temp.path(), "b.js", "import './a';\nexport const b = 1;");
        write_action(temp.path(), "entry.js", "import './a';\nexport default () => 1;");
        let errs = bundle(temp.path(), "entry").unwrap_err();
        assert!(errs.iter().any(|d| d.title == "Circular import"));
    }

    #[test]
    fn test_bare_import_is_unresolved() {
        let temp = TempDir::new().unwrap();
        write_action(
            temp.path(),
            "login.js",
            "import express from 'express';\nexport default () => express();",
        );
        let errs = bundle(temp.path(), "login").unwrap_err();
        assert_eq!(errs[0].title, "Unresolved import");
        assert!(errs[0].message.contains("express"));
        assert!(errs[0].suggestion.as_deref().unwrap_or("").contains("vendor"));
    }

    #[test]
    fn test_missing_relative_import_is_unresolved() {
        let temp = TempDir::new().unwrap();
        write_action(
            temp.path(),
            "login.js",
            "import db from './nope';\nexport default () => db;",
        );
        let errs = bundle(temp.path(), "login").unwrap_err();
        assert_eq!(errs[0].title, "Unresolved import");
        assert_eq!(errs[0].file, "actions/login.js");
    }

    #[test]
    fn test_sibling_errors_are_collected() {
        let temp = TempDir::new().unwrap();
        write_action(
            temp.path(),
            "login.js",
            "import a from './gone';\nimport b from 'leftpad';\nexport default () => a + b;",
        );
        let errs = bundle(temp.path(), "login").unwrap_err();
        assert_eq!(errs.len(), 2);
    }

    #[test]
    fn test_bundle_is_deterministic() {
        let temp = TempDir::new().unwrap();
        write_action(temp.path(), "util.js", "export const u = 1;");
        write_action(
            temp.path(),
            "entry.js",
            "import { u } from './util';\nexport default () => u;",
        );
        let a = bundle(temp.path(), "entry").unwrap();
        let b = bundle(temp.path(), "entry").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_locate_positions() {
        let source = "line one\nline two\nline three";
        let (line, column, text) = locate(source, source.find("two").unwrap());
        assert_eq!((line, column), (2, 6));
        assert_eq!(text, "line two");
    }

    #[test]
    fn test_splice_replaces_spans() {
        let out = splice("abcdef", vec![(1, 3, "X".into()), (4, 4, "-".into())]);
        assert_eq!(out, "aXd-ef");
    }
}
