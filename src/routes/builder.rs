//! Explicit route table builder.
//!
//! Declarations are added in file order; `finish` validates the whole set
//! against the discovered actions and returns either an immutable table or
//! the full list of diagnostics (never a partial table).

use rustc_hash::FxHashMap;

use crate::diagnostics::DiagnosticRecord;
use crate::log;

use super::{
    DynamicRoute, RouteEntry, RouteKind, RouteTable, ServerSettings, is_dynamic, parse_param,
    segments,
};

const KNOWN_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

pub struct RouteTableBuilder {
    config: ServerSettings,
    config_file: String,
    routes: Vec<RouteEntry>,
    dynamic_routes: Vec<DynamicRoute>,
    diagnostics: Vec<DiagnosticRecord>,
    /// static key -> index of first declaration (duplicate detection)
    seen: FxHashMap<String, usize>,
}

impl RouteTableBuilder {
    pub fn new(config: ServerSettings, config_file: impl Into<String>) -> Self {
        Self {
            config,
            config_file: config_file.into(),
            routes: Vec::new(),
            dynamic_routes: Vec::new(),
            diagnostics: Vec::new(),
            seen: FxHashMap::default(),
        }
    }

    /// Register a static reply route.
    pub fn reply(&mut self, method: &str, path: &str, kind: RouteKind) -> &mut Self {
        debug_assert!(!matches!(kind, RouteKind::Action(_)));
        self.push_static(method, path, kind);
        self
    }

    /// Register an action route; dynamic paths go to the ordered dynamic list.
    pub fn action(&mut self, method: &str, path: &str, action: &str) -> &mut Self {
        if is_dynamic(path) {
            self.check_pattern(method, path);
            self.dynamic_routes.push(DynamicRoute {
                method: method.to_string(),
                pattern: path.to_string(),
                action: action.to_string(),
            });
        } else {
            self.push_static(method, path, RouteKind::Action(action.to_string()));
        }
        self
    }

    fn push_static(&mut self, method: &str, path: &str, kind: RouteKind) {
        if !KNOWN_METHODS.contains(&method) {
            self.diagnostics.push(
                DiagnosticRecord::new(
                    "Invalid route method",
                    self.config_file.clone(),
                    format!("'{method}' is not a valid HTTP method for route '{path}'"),
                )
                .with_suggestion(format!("use one of: {}", KNOWN_METHODS.join(", "))),
            );
            return;
        }

        if is_dynamic(path) {
            self.diagnostics.push(
                DiagnosticRecord::new(
                    "Invalid reply route",
                    self.config_file.clone(),
                    format!("route '{path}' has parameter segments but no action"),
                )
                .with_suggestion("parameterized routes must dispatch to an action"),
            );
            return;
        }

        let entry = RouteEntry {
            method: method.to_string(),
            path: path.to_string(),
            kind,
        };
        let key = entry.key();

        if let Some(&first) = self.seen.get(&key) {
            self.diagnostics.push(
                DiagnosticRecord::new(
                    "Duplicate route",
                    self.config_file.clone(),
                    format!(
                        "route '{key}' is declared twice (first as a {} route)",
                        self.routes[first].kind.type_name()
                    ),
                )
                .with_suggestion("remove or rename one of the declarations"),
            );
            return;
        }

        self.seen.insert(key, self.routes.len());
        self.routes.push(entry);
    }

    /// Validate a dynamic pattern's typed segments and warn about patterns
    /// shadowed by an earlier registration (first structural match wins).
    fn check_pattern(&mut self, method: &str, pattern: &str) {
        for segment in segments(pattern) {
            if let Some((name, ty)) = parse_param(segment) {
                if !matches!(ty, "string" | "number") {
                    self.diagnostics.push(
                        DiagnosticRecord::new(
                            "Invalid route pattern",
                            self.config_file.clone(),
                            format!("parameter ':{name}' has unknown type '{ty}' in '{pattern}'"),
                        )
                        .with_suggestion("supported parameter types: string, number"),
                    );
                }
            }
        }

        if let Some(earlier) = self
            .dynamic_routes
            .iter()
            .find(|r| r.method == method && shadows(&r.pattern, pattern))
        {
            // Matching is first-registered-wins; a shadowed pattern is legal
            // but unreachable, so surface it without failing the build.
            log!(
                "warning";
                "dynamic route '{} {}' is shadowed by earlier '{}'",
                method, pattern, earlier.pattern
            );
        }
    }

    /// Validate action references and produce the immutable table.
    pub fn finish(mut self, action_names: &[String]) -> Result<RouteTable, Vec<DiagnosticRecord>> {
        let referenced: Vec<(String, String)> = self
            .routes
            .iter()
            .filter_map(|r| match &r.kind {
                RouteKind::Action(name) => Some((r.key(), name.clone())),
                _ => None,
            })
            .chain(
                self.dynamic_routes
                    .iter()
                    .map(|r| (format!("{}:{}", r.method, r.pattern), r.action.clone())),
            )
            .collect();

        for (key, action) in referenced {
            if !action_names.iter().any(|n| n == &action) {
                self.diagnostics.push(
                    DiagnosticRecord::new(
                        "Unknown action",
                        self.config_file.clone(),
                        format!("route '{key}' references action '{action}', which was not found"),
                    )
                    .with_suggestion(format!("create actions/{action}.js with a default export")),
                );
            }
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }

        Ok(RouteTable {
            config: self.config,
            routes: self.routes,
            dynamic_routes: self.dynamic_routes,
        })
    }
}

/// Whether `earlier` structurally matches every path `later` matches,
/// making `later` unreachable under first-match ordering.
fn shadows(earlier: &str, later: &str) -> bool {
    let a: Vec<&str> = segments(earlier).collect();
    let b: Vec<&str> = segments(later).collect();
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b.iter()).all(|(ea, lb)| {
        match (parse_param(ea), parse_param(lb)) {
            // untyped/string param swallows anything; number only swallows number
            (Some((_, ta)), Some((_, tb))) => ta == "string" || ta == tb,
            (Some((_, ta)), None) => ta == "string" || lb.parse::<i64>().is_ok(),
            (None, Some(_)) => false,
            (None, None) => ea == lb,
        }
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ServerSettings {
        ServerSettings {
            port: 3000,
            threads: None,
            stack_mb: 8,
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_static_and_dynamic_partition() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.action("POST", "/lg", "login");
        builder.action("GET", "/users/:id", "user");
        let table = builder.finish(&names(&["login", "user"])).unwrap();

        assert_eq!(table.routes.len(), 1);
        assert_eq!(table.dynamic_routes.len(), 1);
        assert_eq!(table.dynamic_routes[0].pattern, "/users/:id");
    }

    #[test]
    fn test_duplicate_static_key_fails() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.reply("GET", "/health", RouteKind::Text("ok".into()));
        builder.reply("GET", "/health", RouteKind::Text("still ok".into()));
        let errs = builder.finish(&[]).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(errs[0].message.contains("GET:/health"));
    }

    #[test]
    fn test_same_path_different_method_allowed() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.reply("GET", "/thing", RouteKind::Text("get".into()));
        builder.reply("POST", "/thing", RouteKind::Text("post".into()));
        assert!(builder.finish(&[]).is_ok());
    }

    #[test]
    fn test_unknown_action_reference_fails() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.action("POST", "/lg", "login");
        let errs = builder.finish(&[]).unwrap_err();
        assert!(errs[0].message.contains("login"));
    }

    #[test]
    fn test_invalid_method_fails() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.reply("FETCH", "/x", RouteKind::Text("x".into()));
        assert!(builder.finish(&[]).is_err());
    }

    #[test]
    fn test_parameterized_reply_fails() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.reply("GET", "/users/:id", RouteKind::Text("nope".into()));
        assert!(builder.finish(&[]).is_err());
    }

    #[test]
    fn test_unknown_param_type_fails() {
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.action("GET", "/users/:id<uuid>", "user");
        assert!(builder.finish(&names(&["user"])).is_err());
    }

    #[test]
    fn test_dynamic_registration_order_preserved() {
        // First structural match wins: registration order must survive into
        // the table untouched, with no specificity sorting.
        let mut builder = RouteTableBuilder::new(settings(), "titan.toml");
        builder.action("GET", "/a/:x", "generic");
        builder.action("GET", "/a/specific", "specific"); // static, separate list
        builder.action("GET", "/a/:x<number>", "numeric");
        let table = builder
            .finish(&names(&["generic", "specific", "numeric"]))
            .unwrap();

        let patterns: Vec<&str> = table
            .dynamic_routes
            .iter()
            .map(|r| r.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["/a/:x", "/a/:x<number>"]);
    }

    #[test]
    fn test_shadow_detection() {
        assert!(shadows("/a/:x", "/a/:y<number>"));
        assert!(shadows("/a/:x", "/a/literal"));
        assert!(!shadows("/a/:x<number>", "/a/:y"));
        assert!(!shadows("/a/:x", "/a/:y/z"));
        assert!(shadows("/a/:x<number>", "/a/42"));
        assert!(!shadows("/a/:x<number>", "/a/word"));
    }
}
