//! Artifact serialization: routes.json and actions.json.
//!
//! Shapes match what the server's loader expects:
//!
//! ```json
//! {
//!   "__config": { "port": 3000, "threads": 8, "stack_mb": 8 },
//!   "routes": { "POST:/lg": { "type": "action", "value": "login" } },
//!   "__dynamic_routes": [ { "method": "GET", "pattern": "/u/:id", "action": "user" } ]
//! }
//! ```
//!
//! Maps are emitted in registration order (serde_json preserve_order), so two
//! builds over unchanged sources produce byte-identical artifacts.

use serde_json::{Map, Value, json};

use super::{RouteKind, RouteTable};

impl RouteTable {
    /// Full route table artifact value.
    pub fn routes_json(&self) -> Value {
        let mut config = Map::new();
        config.insert("port".into(), json!(self.config.port));
        if let Some(threads) = self.config.threads {
            config.insert("threads".into(), json!(threads));
        }
        config.insert("stack_mb".into(), json!(self.config.stack_mb));

        let mut routes = Map::new();
        for entry in &self.routes {
            let value = match &entry.kind {
                RouteKind::Json(v) => v.clone(),
                RouteKind::Text(s) => Value::String(s.clone()),
                RouteKind::Action(name) => Value::String(name.clone()),
            };
            routes.insert(
                entry.key(),
                json!({ "type": entry.kind.type_name(), "value": value }),
            );
        }

        let dynamic: Vec<Value> = self
            .dynamic_routes
            .iter()
            .map(|r| json!({ "method": r.method, "pattern": r.pattern, "action": r.action }))
            .collect();

        json!({
            "__config": Value::Object(config),
            "routes": Value::Object(routes),
            "__dynamic_routes": dynamic,
        })
    }

    /// Dispatch map artifact: static action routes only, `key -> action`.
    pub fn dispatch_json(&self) -> Value {
        let mut map = Map::new();
        for entry in &self.routes {
            if let RouteKind::Action(name) = &entry.kind {
                map.insert(entry.key(), Value::String(name.clone()));
            }
        }
        Value::Object(map)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{DynamicRoute, RouteEntry, ServerSettings};

    fn table() -> RouteTable {
        RouteTable {
            config: ServerSettings {
                port: 8080,
                threads: Some(4),
                stack_mb: 8,
            },
            routes: vec![
                RouteEntry {
                    method: "POST".into(),
                    path: "/lg".into(),
                    kind: RouteKind::Action("login".into()),
                },
                RouteEntry {
                    method: "GET".into(),
                    path: "/health".into(),
                    kind: RouteKind::Text("ok".into()),
                },
                RouteEntry {
                    method: "GET".into(),
                    path: "/version".into(),
                    kind: RouteKind::Json(json!({"v": 1})),
                },
            ],
            dynamic_routes: vec![DynamicRoute {
                method: "GET".into(),
                pattern: "/users/:id<number>".into(),
                action: "user".into(),
            }],
        }
    }

    #[test]
    fn test_routes_json_shape() {
        let value = table().routes_json();
        assert_eq!(value["__config"]["port"], 8080);
        assert_eq!(value["__config"]["threads"], 4);
        assert_eq!(value["routes"]["POST:/lg"]["type"], "action");
        assert_eq!(value["routes"]["POST:/lg"]["value"], "login");
        assert_eq!(value["routes"]["GET:/health"]["type"], "text");
        assert_eq!(value["routes"]["GET:/version"]["value"]["v"], 1);
        assert_eq!(value["__dynamic_routes"][0]["pattern"], "/users/:id<number>");
    }

    #[test]
    fn test_threads_omitted_when_unset() {
        let mut t = table();
        t.config.threads = None;
        let value = t.routes_json();
        assert!(value["__config"].get("threads").is_none());
    }

    #[test]
    fn test_dispatch_json_static_actions_only() {
        let value = table().dispatch_json();
        let map = value.as_object().unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["POST:/lg"], "login");
    }

    #[test]
    fn test_serialization_is_stable() {
        let a = serde_json::to_string_pretty(&table().routes_json()).unwrap();
        let b = serde_json::to_string_pretty(&table().routes_json()).unwrap();
        assert_eq!(a, b);
    }
}
