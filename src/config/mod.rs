//! Project configuration management for `titan.toml`.
//!
//! # Sections
//!
//! | Section    | Purpose                                         |
//! |------------|-------------------------------------------------|
//! | `[server]` | Supervised server (port, threads, stack, binary)|
//! | `[build]`  | Actions and output directories                  |
//! | `[[route]]`| Route declarations (reply / action / dynamic)   |

mod error;

pub use error::ConfigError;

use crate::{
    cli::{Cli, Commands},
    log,
};
use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};

/// Fallback port when no configuration is readable (matches the server's own
/// default in its routes.json loader).
pub const DEFAULT_PORT: u16 = 3000;

// ============================================================================
// root configuration
// ============================================================================

/// Root configuration structure representing titan.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct TitanConfig {
    /// Absolute path to the config file (internal use only)
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Project root directory - parent of config file (internal use only)
    #[serde(skip)]
    pub root: PathBuf,

    /// Supervised server settings
    pub server: ServerConfig,

    /// Build settings
    pub build: BuildConfig,

    /// Route declarations
    pub route: Vec<RouteDecl>,
}

/// `[server]` section: the supervised server process.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Port the server listens on.
    pub port: u16,

    /// Worker thread count passed through to the server (None = server default).
    pub threads: Option<u64>,

    /// Worker stack size in megabytes.
    pub stack_mb: u64,

    /// Path to the titan-server binary. When unset, `TITAN_SERVER_BIN`,
    /// then `titan-server` on PATH, then `<root>/bin/titan-server` are tried.
    pub binary: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            threads: None,
            stack_mb: 8,
            binary: None,
        }
    }
}

/// `[build]` section: source and output layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Directory containing action scripts (relative to project root).
    pub actions: PathBuf,

    /// Output directory for bundles and metadata artifacts.
    pub output: PathBuf,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            actions: PathBuf::from("actions"),
            output: PathBuf::from(".titan"),
        }
    }
}

/// One `[[route]]` declaration.
///
/// Exactly one of `action`, `json`, `text` must be set; paths containing
/// `:param` segments must use `action` (dynamic routes cannot be replies).
#[derive(Debug, Clone, Deserialize)]
pub struct RouteDecl {
    /// HTTP method (default GET, stored uppercase).
    #[serde(default = "default_method")]
    pub method: String,

    /// Route path, may contain `:name` / `:name<number>` segments.
    pub path: String,

    /// Action name this route dispatches to.
    #[serde(default)]
    pub action: Option<String>,

    /// Static JSON reply.
    #[serde(default)]
    pub json: Option<serde_json::Value>,

    /// Static text reply.
    #[serde(default)]
    pub text: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

impl TitanConfig {
    /// Load configuration from CLI arguments.
    ///
    /// Searches upward from cwd to find the config file; the project root is
    /// the config file's parent directory.
    pub fn load(cli: &'static Cli) -> Result<Self> {
        let Some(config_path) = find_config_file(&cli.config) else {
            log!(
                "error";
                "Config file '{}' not found in this directory or any parent.",
                cli.config.display()
            );
            std::process::exit(1);
        };

        let mut config = Self::from_path(&config_path)?;

        config.root = config_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        config.config_path = config_path;
        config.apply_command_options(cli);
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration from TOML string.
    pub fn from_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Load configuration from file path with unknown field detection.
    fn from_path(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;

        let (config, ignored) = Self::parse_with_ignored(&content)
            .map_err(|err| ConfigError::Parse(path.to_path_buf(), err.to_string()))?;

        if !ignored.is_empty() {
            let display_path = path
                .file_name()
                .map(|n| n.to_string_lossy())
                .unwrap_or_else(|| path.to_string_lossy());
            log!("warning"; "unknown fields in {}, ignoring:", display_path);
            for field in &ignored {
                eprintln!("- {field}");
            }
        }

        Ok(config)
    }

    /// Parse TOML content, collecting any unknown fields.
    fn parse_with_ignored(content: &str) -> Result<(Self, Vec<String>)> {
        let mut ignored = Vec::new();
        let deserializer = toml::Deserializer::new(content);
        let config = serde_ignored::deserialize(deserializer, |path: serde_ignored::Path| {
            ignored.push(path.to_string());
        })?;
        Ok((config, ignored))
    }

    /// Apply CLI overrides on top of the file configuration.
    fn apply_command_options(&mut self, cli: &Cli) {
        let build_args = cli.build_args();
        if let Some(actions) = &build_args.actions {
            self.build.actions = actions.clone();
        }
        if let Some(output) = &build_args.output {
            self.build.output = output.clone();
        }

        if let Commands::Dev {
            port, server_bin, ..
        } = &cli.command
        {
            if let Some(port) = port {
                self.server.port = *port;
            }
            if let Some(bin) = server_bin {
                self.server.binary = Some(bin.clone());
            }
        }
    }

    /// Structural validation of route declarations.
    fn validate(&self) -> Result<()> {
        for decl in &self.route {
            let set = [
                decl.action.is_some(),
                decl.json.is_some(),
                decl.text.is_some(),
            ]
            .iter()
            .filter(|v| **v)
            .count();
            if set != 1 {
                bail!(ConfigError::Invalid(format!(
                    "route '{} {}' must set exactly one of action/json/text",
                    decl.method, decl.path
                )));
            }
            if !decl.path.starts_with('/') {
                bail!(ConfigError::Invalid(format!(
                    "route path '{}' must start with '/'",
                    decl.path
                )));
            }
        }
        Ok(())
    }

    /// Get the root directory path
    pub fn get_root(&self) -> &Path {
        &self.root
    }

    /// Join a path with the root directory.
    pub fn root_join(&self, path: impl AsRef<Path>) -> PathBuf {
        self.root.join(path)
    }

    /// Get path relative to the project root
    pub fn root_relative(&self, path: impl AsRef<Path>) -> PathBuf {
        path.as_ref()
            .strip_prefix(&self.root)
            .map(Path::to_path_buf)
            .unwrap_or_else(|_| path.as_ref().to_path_buf())
    }

    /// Absolute actions directory.
    pub fn actions_dir(&self) -> PathBuf {
        self.root_join(&self.build.actions)
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.root_join(&self.build.output)
    }

    /// Directory holding compiled action bundles.
    pub fn bundles_dir(&self) -> PathBuf {
        self.output_dir().join("actions")
    }

    /// Persisted route table artifact.
    pub fn routes_artifact(&self) -> PathBuf {
        self.output_dir().join("routes.json")
    }

    /// Persisted action dispatch map artifact.
    pub fn dispatch_artifact(&self) -> PathBuf {
        self.output_dir().join("actions.json")
    }

    /// Resolve the server binary to supervise.
    ///
    /// Order: `[server] binary` / `--server-bin`, `TITAN_SERVER_BIN` env,
    /// `titan-server` on PATH, `<root>/bin/titan-server`.
    pub fn server_binary(&self) -> Result<PathBuf> {
        if let Some(bin) = &self.server.binary {
            let path = if bin.is_absolute() {
                bin.clone()
            } else {
                self.root_join(bin)
            };
            return Ok(path);
        }

        if let Ok(env_bin) = std::env::var("TITAN_SERVER_BIN") {
            return Ok(PathBuf::from(env_bin));
        }

        if let Ok(found) = which::which("titan-server") {
            return Ok(found);
        }

        let local = self.root_join("bin/titan-server");
        if local.exists() {
            return Ok(local);
        }

        bail!(
            "titan-server binary not found: set [server] binary in titan.toml, \
             TITAN_SERVER_BIN, or put titan-server on PATH"
        )
    }
}

/// Find config file by searching upward from current directory
///
/// Starts from cwd and walks up parent directories until finding `config_name`
/// Returns the absolute path to the config file if found
pub fn find_config_file(config_name: &Path) -> Option<PathBuf> {
    let cwd = std::env::current_dir().ok()?;

    if config_name.is_absolute() && config_name.exists() {
        return Some(config_name.to_path_buf());
    }

    let mut current = cwd.as_path();
    loop {
        let candidate = current.join(config_name);
        if candidate.exists() {
            return Some(candidate);
        }

        match current.parent() {
            Some(parent) => current = parent,
            None => return None, // Reached filesystem root
        }
    }
}

// ============================================================================
// tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TitanConfig::from_str("").unwrap();
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert_eq!(config.server.stack_mb, 8);
        assert_eq!(config.build.actions, PathBuf::from("actions"));
        assert_eq!(config.build.output, PathBuf::from(".titan"));
        assert!(config.route.is_empty());
    }

    #[test]
    fn test_full_config() {
        let config = TitanConfig::from_str(
            r#"
            [server]
            port = 8080
            threads = 4
            stack_mb = 16

            [build]
            actions = "src/actions"

            [[route]]
            method = "POST"
            path = "/lg"
            action = "login"

            [[route]]
            path = "/health"
            text = "ok"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.threads, Some(4));
        assert_eq!(config.server.stack_mb, 16);
        assert_eq!(config.route.len(), 2);
        assert_eq!(config.route[0].method, "POST");
        assert_eq!(config.route[1].method, "GET"); // default
        assert_eq!(config.route[1].text.as_deref(), Some("ok"));
    }

    #[test]
    fn test_route_requires_exactly_one_target() {
        let mut config = TitanConfig::from_str(
            r#"
            [[route]]
            path = "/x"
            action = "a"
            text = "also"
            "#,
        )
        .unwrap();
        config.root = PathBuf::from("/tmp");
        assert!(config.validate().is_err());

        let config = TitanConfig::from_str(
            r#"
            [[route]]
            path = "/x"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_route_path_must_be_absolute() {
        let config = TitanConfig::from_str(
            r#"
            [[route]]
            path = "relative"
            text = "ok"
            "#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_collected() {
        let (_, ignored) = TitanConfig::parse_with_ignored(
            r#"
            [server]
            port = 3000
            unknown_field = true
            "#,
        )
        .unwrap();
        assert_eq!(ignored, vec!["server.unknown_field".to_string()]);
    }
}
