//! Route table model: immutable table built by an explicit builder.
//!
//! Route declarations come from `titan.toml`; the builder validates them
//! against the discovered action set and produces an immutable [`RouteTable`]
//! value. Nothing here mutates process-wide state - the table is rebuilt
//! wholesale on every pass, so stale entries cannot survive a rebuild.

mod artifact;
mod builder;

pub use builder::RouteTableBuilder;

use serde_json::Value;

/// What a static route replies with.
#[derive(Debug, Clone, PartialEq)]
pub enum RouteKind {
    /// Pre-serialized JSON reply
    Json(Value),
    /// Plain text reply
    Text(String),
    /// Dispatch to a named action
    Action(String),
}

impl RouteKind {
    /// Wire name used in the routes.json artifact.
    pub const fn type_name(&self) -> &'static str {
        match self {
            RouteKind::Json(_) => "json",
            RouteKind::Text(_) => "text",
            RouteKind::Action(_) => "action",
        }
    }
}

/// One static route, keyed by `METHOD:path`.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    pub kind: RouteKind,
}

impl RouteEntry {
    /// Artifact key (`"POST:/lg"`).
    pub fn key(&self) -> String {
        format!("{}:{}", self.method, self.path)
    }
}

/// One dynamic route (`/users/:id<number>`), matched by the server in
/// registration order - first structural match wins, no specificity sorting.
#[derive(Debug, Clone)]
pub struct DynamicRoute {
    pub method: String,
    pub pattern: String,
    pub action: String,
}

/// Server configuration echoed into the `__config` artifact section.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub port: u16,
    pub threads: Option<u64>,
    pub stack_mb: u64,
}

/// Immutable aggregate regenerated wholesale on every build pass.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub config: ServerSettings,
    /// Static routes in registration order
    pub routes: Vec<RouteEntry>,
    /// Dynamic routes in registration order
    pub dynamic_routes: Vec<DynamicRoute>,
}

/// Split a route path or pattern into its segments.
fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.trim_matches('/').split('/')
}

/// Parse a `:name` / `:name<type>` segment into (name, type).
///
/// Returns None for literal segments. Mirrors the server's matcher, which
/// understands `string` (default) and `number`.
pub fn parse_param(segment: &str) -> Option<(&str, &str)> {
    let inner = segment.strip_prefix(':')?;
    let (name, ty) = inner
        .split_once('<')
        .map(|(n, t)| (n, t.trim_end_matches('>')))
        .unwrap_or((inner, "string"));
    Some((name, ty))
}

/// Whether a path contains any parameter segments.
pub fn is_dynamic(path: &str) -> bool {
    segments(path).any(|s| s.starts_with(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(parse_param(":id"), Some(("id", "string")));
        assert_eq!(parse_param(":id<number>"), Some(("id", "number")));
        assert_eq!(parse_param("users"), None);
    }

    #[test]
    fn test_is_dynamic() {
        assert!(is_dynamic("/users/:id"));
        assert!(is_dynamic("/a/:b<number>/c"));
        assert!(!is_dynamic("/users/all"));
    }

    #[test]
    fn test_route_key() {
        let entry = RouteEntry {
            method: "POST".into(),
            path: "/lg".into(),
            kind: RouteKind::Action("login".into()),
        };
        assert_eq!(entry.key(), "POST:/lg");
    }
}
