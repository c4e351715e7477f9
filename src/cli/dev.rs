//! Dev command: build, watch and supervise.
//!
//! Owns the runtime setup; all actual behavior lives in the orchestration
//! loop. The Ctrl+C handler signals through a sync channel, bridged here
//! into the async world.

use anyhow::{Context, Result};
use tokio::sync::mpsc;

use crate::config::TitanConfig;
use crate::orchestrate;
use crate::shutdown;

pub fn run_dev(config: TitanConfig) -> Result<()> {
    // Sync side: registered with the Ctrl+C handler.
    let (shutdown_tx, shutdown_sync_rx) = crossbeam::channel::bounded::<()>(1);
    shutdown::register_orchestrator(shutdown_tx);

    // Async side: what the orchestration loop selects on.
    let (bridge_tx, shutdown_rx) = mpsc::unbounded_channel::<()>();
    std::thread::spawn(move || {
        while shutdown_sync_rx.recv().is_ok() {
            if bridge_tx.send(()).is_err() {
                break;
            }
        }
    });

    let runtime = tokio::runtime::Runtime::new().context("starting async runtime")?;
    runtime.block_on(orchestrate::run(config, shutdown_rx))
}
