//! Action script discovery.
//!
//! One [`ActionUnit`] per script file in the actions directory. Identity is
//! the file stem; two scripts resolving to the same stem (login.js and
//! login.ts) are a build error naming both files.

use std::path::{Path, PathBuf};

use crate::diagnostics::DiagnosticRecord;

/// Script extensions accepted as action sources.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "ts"];

/// One discovered action script, immutable within a build pass.
#[derive(Debug, Clone)]
pub struct ActionUnit {
    /// Unique action identifier (file stem)
    pub name: String,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

/// Enumerate action scripts in `actions_dir`.
///
/// A missing directory is a trivially successful empty set, not an error.
/// Non-script files, declaration-only files (`.d.ts`) and dotfiles are
/// ignored. Entries are ordered by file name for deterministic output.
pub fn discover(
    actions_dir: &Path,
    bundles_dir: &Path,
) -> Result<Vec<ActionUnit>, Vec<DiagnosticRecord>> {
    if !actions_dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(actions_dir)
        .map_err(|e| {
            vec![DiagnosticRecord::new(
                "Actions directory unreadable",
                actions_dir.display().to_string(),
                e.to_string(),
            )]
        })?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| is_action_script(path))
        .collect();
    paths.sort();

    let mut units: Vec<ActionUnit> = Vec::with_capacity(paths.len());
    let mut diagnostics = Vec::new();

    for path in paths {
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        if let Some(existing) = units.iter().find(|u| u.name == name) {
            diagnostics.push(
                DiagnosticRecord::new(
                    "Duplicate action name",
                    path.display().to_string(),
                    format!(
                        "action '{name}' is defined by both '{}' and '{}'",
                        existing.source_path.display(),
                        path.display()
                    ),
                )
                .with_suggestion("rename one of the files; the file stem is the action identity"),
            );
            continue;
        }

        units.push(ActionUnit {
            name: name.to_string(),
            source_path: path.clone(),
            output_path: bundles_dir.join(format!("{name}.js")),
        });
    }

    if diagnostics.is_empty() {
        Ok(units)
    } else {
        Err(diagnostics)
    }
}

fn is_action_script(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    if name.starts_with('.') || name.ends_with(".d.ts") {
        return false;
    }
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| SCRIPT_EXTENSIONS.contains(&ext))
}

// ============================================================================
// Tests
// ============================================================================
