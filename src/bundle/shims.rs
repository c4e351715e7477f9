//! Runtime shims for Node-style builtin imports.
//!
//! Action scripts may import a small set of builtins (`fs`, `path`, ...).
//! The target runtime has no module loader, so each builtin is rewritten to
//! a binding against a shim object emitted once into the bundle prelude.
//! Shims delegate to the host-injected `t` runtime object where the host has
//! a counterpart, and fall back to pure JS where it does not.

/// Builtin module names the bundler can satisfy, without the `node:` prefix.
const BUILTINS: &[&str] = &["fs", "path", "os", "crypto", "process", "util"];

/// Map an import source to the shim binding name it resolves to.
///
/// Accepts both bare (`fs`) and prefixed (`node:fs`) forms. Returns None
/// for anything that is not a supported builtin.
pub fn lookup(source: &str) -> Option<&'static str> {
    let bare = source.strip_prefix("node:").unwrap_or(source);
    BUILTINS
        .iter()
        .find(|&&b| b == bare)
        .map(|&b| binding_name(b))
}

/// Shim binding identifier for a builtin (`fs` -> `__titan_fs`).
fn binding_name(builtin: &str) -> &'static str {
    match builtin {
        "fs" => "__titan_fs",
        "path" => "__titan_path",
        "os" => "__titan_os",
        "crypto" => "__titan_crypto",
        "process" => "__titan_process",
        "util" => "__titan_util",
        _ => unreachable!("unknown builtin"),
    }
}

/// JS prelude defining one shim object. Emitted at most once per bundle.
pub fn prelude(binding: &str) -> &'static str {
    match binding {
        "__titan_fs" => concat!(
            "const __titan_fs = {\n",
            "  readFile: (p) => t.fs.read(p),\n",
            "  readFileSync: (p) => t.fs.readSync(p),\n",
            "  existsSync: (p) => { try { t.fs.readSync(p); return true; } catch { return false; } },\n",
            "  promises: { readFile: (p) => Promise.resolve(t.fs.read(p)) },\n",
            "};"
        ),
        "__titan_path" => concat!(
            "const __titan_path = {\n",
            "  join: (...parts) => parts.filter(Boolean).join(\"/\").replace(/\\/+/g, \"/\"),\n",
            "  resolve: (...parts) => parts.filter(Boolean).join(\"/\").replace(/\\/+/g, \"/\"),\n",
            "  dirname: (p) => p.replace(/\\/[^/]*$/, \"\") || \"/\",\n",
            "  basename: (p) => p.split(\"/\").pop(),\n",
            "  extname: (p) => { const b = p.split(\"/\").pop(); const i = b.lastIndexOf(\".\"); return i > 0 ? b.slice(i) : \"\"; },\n",
            "  sep: \"/\",\n",
            "};"
        ),
        "__titan_os" => concat!(
            "const __titan_os = {\n",
            "  platform: () => \"titan\",\n",
            "  hostname: () => \"titan\",\n",
            "  tmpdir: () => \"/tmp\",\n",
            "  cpus: () => [],\n",
            "  EOL: \"\\n\",\n",
            "};"
        ),
        "__titan_crypto" => concat!(
            "const __titan_crypto = {\n",
            "  randomUUID: () => \"xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx\".replace(/[xy]/g, (c) => {\n",
            "    const r = (Math.random() * 16) | 0;\n",
            "    return (c === \"x\" ? r : (r & 0x3) | 0x8).toString(16);\n",
            "  }),\n",
            "};"
        ),
        "__titan_process" => concat!(
            "const __titan_process = {\n",
            "  env: typeof t !== \"undefined\" && t.loadEnv ? t.loadEnv() : {},\n",
            "  platform: \"titan\",\n",
            "  cwd: () => \"/\",\n",
            "};"
        ),
        "__titan_util" => concat!(
            "const __titan_util = {\n",
            "  format: (...args) => args.map((a) => (typeof a === \"string\" ? a : JSON.stringify(a))).join(\" \"),\n",
            "  inspect: (v) => JSON.stringify(v, null, 2),\n",
            "};"
        ),
        _ => unreachable!("unknown shim binding"),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_bare_and_prefixed() {
        assert_eq!(lookup("fs"), Some("__titan_fs"));
        assert_eq!(lookup("node:fs"), Some("__titan_fs"));
        assert_eq!(lookup("node:path"), Some("__titan_path"));
        assert_eq!(lookup("express"), None);
        assert_eq!(lookup("./db"), None);
    }

    #[test]
    fn test_every_builtin_has_a_prelude() {
        for builtin in BUILTINS {
            let binding = lookup(builtin).unwrap();
            let js = prelude(binding);
            assert!(js.starts_with(&format!("const {binding} = ")));
        }
    }
}
