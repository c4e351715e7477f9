//! One-shot build command.
//!
//! Runs a single build pass and exits: 0 on success, 1 when the project has
//! diagnostics. Used by CI and by deploy scripts that want artifacts without
//! a supervised server.

use anyhow::Result;

use crate::bundle::{self, BuildOptions, BuildResult};
use crate::config::TitanConfig;
use crate::diagnostics;
use crate::log;

pub fn run_build(config: &TitanConfig) -> Result<()> {
    let options = BuildOptions { minify: true };

    match bundle::build(config, &options)? {
        BuildResult::Success(summary) => {
            log!(
                "build";
                "bundled {} actions, {} routes ({} dynamic) in {}ms",
                summary.actions,
                summary.routes,
                summary.dynamic_routes,
                summary.duration.as_millis()
            );
            log!(
                "build";
                "artifacts written to {}",
                config.root_relative(config.output_dir()).display()
            );
            Ok(())
        }
        BuildResult::Failure(diags) => {
            eprintln!("{}", diagnostics::render_all(&diags));
            log!("error"; "build failed with {} error(s)", diags.len());
            std::process::exit(1);
        }
    }
}
