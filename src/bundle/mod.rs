//! Build pipeline: discover actions, bundle them, regenerate the route
//! table, and publish everything atomically.
//!
//! A pass either succeeds completely or changes nothing on disk: all output
//! is written into a staging directory first and swapped into place with a
//! single rename, so the supervised server never observes half-written
//! metadata. Failed passes report every diagnostic found, not just the
//! first, and leave the previous artifacts untouched.

mod discover;
mod minify;
mod shims;
mod transform;

pub use discover::{ActionUnit, discover};

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};

use crate::config::TitanConfig;
use crate::diagnostics::DiagnosticRecord;
use crate::routes::{RouteKind, RouteTableBuilder, ServerSettings};

/// Knobs that differ between `titan build` and the dev loop.
#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// Minify bundles (one-shot production builds only).
    pub minify: bool,
}

/// Counters from a successful pass.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub actions: usize,
    pub routes: usize,
    pub dynamic_routes: usize,
    pub duration: Duration,
}

/// Outcome of one build pass. Internal faults (I/O on the output directory,
/// etc.) surface as `Err`; anything wrong with the project itself is a
/// `Failure` carrying user-facing diagnostics.
#[derive(Debug)]
pub enum BuildResult {
    Success(BuildSummary),
    Failure(Vec<DiagnosticRecord>),
}

/// Run one full build pass.
pub fn build(config: &TitanConfig, options: &BuildOptions) -> Result<BuildResult> {
    let started = Instant::now();

    let units = match discover(&config.actions_dir(), &config.bundles_dir()) {
        Ok(units) => units,
        Err(diagnostics) => return Ok(BuildResult::Failure(diagnostics)),
    };

    let mut diagnostics = Vec::new();
    let mut bundles: Vec<(&ActionUnit, String)> = Vec::new();
    for unit in &units {
        match transform::bundle_action(unit, config.get_root()) {
            Ok(code) => {
                let code = if options.minify {
                    minify::minify_js(&code).unwrap_or(code)
                } else {
                    code
                };
                bundles.push((unit, code));
            }
            // A broken action must not mask errors in its siblings.
            Err(errs) => diagnostics.extend(errs),
        }
    }

    let settings = ServerSettings {
        port: config.server.port,
        threads: config.server.threads,
        stack_mb: config.server.stack_mb,
    };
    let config_file = config
        .root_relative(&config.config_path)
        .display()
        .to_string();
    let mut builder = RouteTableBuilder::new(settings, config_file);
    for decl in &config.route {
        let method = decl.method.to_uppercase();
        if let Some(action) = &decl.action {
            builder.action(&method, &decl.path, action);
        } else if let Some(json) = &decl.json {
            builder.reply(&method, &decl.path, RouteKind::Json(json.clone()));
        } else if let Some(text) = &decl.text {
            builder.reply(&method, &decl.path, RouteKind::Text(text.clone()));
        }
    }

    let names: Vec<String> = units.iter().map(|u| u.name.clone()).collect();
    let table = match builder.finish(&names) {
        Ok(table) if diagnostics.is_empty() => table,
        Ok(_) => return Ok(BuildResult::Failure(diagnostics)),
        Err(errs) => {
            diagnostics.extend(errs);
            return Ok(BuildResult::Failure(diagnostics));
        }
    };

    publish(config, &table.routes_json(), &table.dispatch_json(), &bundles)?;

    Ok(BuildResult::Success(BuildSummary {
        actions: bundles.len(),
        routes: table.routes.len(),
        dynamic_routes: table.dynamic_routes.len(),
        duration: started.elapsed(),
    }))
}

/// Staging directory for in-flight output, always dot-prefixed so the
/// watcher's dotted-component filter skips it.
fn staging_dir(config: &TitanConfig) -> PathBuf {
    let output = config.output_dir();
    let parent = output
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(|| config.get_root().to_path_buf());
    parent.join(format!(".titan-staging-{}", std::process::id()))
}

/// Write all artifacts into staging, then swap staging into place.
fn publish(
    config: &TitanConfig,
    routes_json: &serde_json::Value,
    dispatch_json: &serde_json::Value,
    bundles: &[(&ActionUnit, String)],
) -> Result<()> {
    let output = config.output_dir();
    let staging = staging_dir(config);

    if staging.exists() {
        fs::remove_dir_all(&staging)
            .with_context(|| format!("clearing stale staging dir {}", staging.display()))?;
    }
    let staged_actions = staging.join("actions");
    fs::create_dir_all(&staged_actions)
        .with_context(|| format!("creating staging dir {}", staging.display()))?;

    for (unit, code) in bundles {
        let file_name = unit
            .output_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(format!("{}.js", unit.name)));
        fs::write(staged_actions.join(&file_name), code)
            .with_context(|| format!("writing bundle for action '{}'", unit.name))?;
    }

    let routes = serde_json::to_string_pretty(routes_json)? + "\n";
    fs::write(staging.join("routes.json"), routes).context("writing routes.json")?;
    let dispatch = serde_json::to_string_pretty(dispatch_json)? + "\n";
    fs::write(staging.join("actions.json"), dispatch).context("writing actions.json")?;

    if output.exists() {
        fs::remove_dir_all(&output)
            .with_context(|| format!("clearing previous output {}", output.display()))?;
    }
    fs::rename(&staging, &output)
        .with_context(|| format!("publishing output to {}", output.display()))?;

    Ok(())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn project(toml: &str) -> (TempDir, TitanConfig) {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("titan.toml"), toml).unwrap();
        let mut config = TitanConfig::from_str(toml).unwrap();
        config.root = temp.path().to_path_buf();
        config.config_path = temp.path().join("titan.toml");
        (temp, config)
    }

    fn write_action(root: &Path, name: &str, source: &str) {
        let actions = root.join("actions");
        std::fs::create_dir_all(&actions).unwrap();
        std::fs::write(actions.join(name), source).unwrap();
    }

    const TWO_ACTIONS: &str = r#"
        [[route]]
        method = "POST"
        path = "/lg"
        action = "login"

        [[route]]
        method = "POST"
        path = "/me"
        action = "me"
    "#;

    fn read_json(path: &Path) -> serde_json::Value {
        serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_full_pass_publishes_artifacts() {
        let (temp, config) = project(TWO_ACTIONS);
        write_action(temp.path(), "login.js", "export default () => ({ user: 'u' });");
        write_action(temp.path(), "me.js", "export default () => ({ id: 1 });");

        let result = build(&config, &BuildOptions::default()).unwrap();
        let summary = match result {
            BuildResult::Success(s) => s,
            BuildResult::Failure(d) => panic!("unexpected failure: {d:?}"),
        };
        assert_eq!(summary.actions, 2);
        assert_eq!(summary.routes, 2);

        let routes = read_json(&config.routes_artifact());
        assert_eq!(routes["__config"]["port"], 3000);
        assert_eq!(routes["routes"]["POST:/lg"]["value"], "login");

        let dispatch = read_json(&config.dispatch_artifact());
        assert_eq!(
            dispatch,
            serde_json::json!({ "POST:/lg": "login", "POST:/me": "me" })
        );

        assert!(config.bundles_dir().join("login.js").is_file());
        assert!(config.bundles_dir().join("me.js").is_file());
        assert!(!staging_dir(&config).exists());
    }

    #[test]
    fn test_rebuild_is_byte_identical() {
        let (temp, config) = project(TWO_ACTIONS);
        write_action(temp.path(), "login.js", "export default () => 1;");
        write_action(temp.path(), "me.js", "export default () => 2;");

        build(&config, &BuildOptions::default()).unwrap();
        let first = std::fs::read(config.routes_artifact()).unwrap();
        let first_bundle = std::fs::read(config.bundles_dir().join("login.js")).unwrap();

        build(&config, &BuildOptions::default()).unwrap();
        assert_eq!(std::fs::read(config.routes_artifact()).unwrap(), first);
        assert_eq!(
            std::fs::read(config.bundles_dir().join("login.js")).unwrap(),
            first_bundle
        );
    }

    #[test]
    fn test_failed_pass_keeps_previous_artifacts() {
        let (temp, config) = project(TWO_ACTIONS);
        write_action(temp.path(), "login.js", "export default () => 1;");
        write_action(temp.path(), "me.js", "export default () => 2;");
        build(&config, &BuildOptions::default()).unwrap();
        let before = std::fs::read(config.routes_artifact()).unwrap();

        // Break one action; the pass must fail without touching the output.
        write_action(temp.path(), "me.js", "export default {{{");
        let result = build(&config, &BuildOptions::default()).unwrap();
        assert!(matches!(result, BuildResult::Failure(_)));
        assert_eq!(std::fs::read(config.routes_artifact()).unwrap(), before);
    }

    #[test]
    fn test_sibling_action_errors_are_all_reported() {
        let (temp, config) = project(TWO_ACTIONS);
        write_action(temp.path(), "login.js", "export const nope = 1;");
        write_action(temp.path(), "me.js", "import x from 'leftpad';\nexport default () => x;");

        let BuildResult::Failure(diags) = build(&config, &BuildOptions::default()).unwrap() else {
            panic!("expected failure");
        };
        assert!(diags.iter().any(|d| d.title == "Action has no default export"));
        assert!(diags.iter().any(|d| d.title == "Unresolved import"));
    }

    #[test]
    fn test_route_referencing_missing_action_fails() {
        let (_temp, config) = project(
            r#"
            [[route]]
            path = "/x"
            action = "ghost"
            "#,
        );
        let BuildResult::Failure(diags) = build(&config, &BuildOptions::default()).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(diags[0].title, "Unknown action");
    }

    #[test]
    fn test_empty_project_builds() {
        let (_temp, config) = project("");
        let result = build(&config, &BuildOptions::default()).unwrap();
        assert!(matches!(result, BuildResult::Success(_)));
        assert!(config.routes_artifact().is_file());
    }

    #[test]
    fn test_lowercase_method_is_normalized() {
        let (_temp, config) = project(
            r#"
            [[route]]
            method = "post"
            path = "/x"
            text = "ok"
            "#,
        );
        build(&config, &BuildOptions::default()).unwrap();
        let routes = read_json(&config.routes_artifact());
        assert_eq!(routes["routes"]["POST:/x"]["value"], "ok");
    }
}
