//! Dev-mode orchestration loop.
//!
//! Single control flow owning all state transitions: build passes, server
//! lifecycle, crash retries and shutdown. The watcher and the process I/O
//! tasks only feed events in; every decision happens here, so there is no
//! state shared across tasks to go stale.
//!
//! Event sources, in select priority order: shutdown signal, watcher change
//! signals, server exit, readiness marker, slow-boot timer.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};

use crate::bundle::{self, BuildOptions, BuildResult};
use crate::config::{DEFAULT_PORT, TitanConfig};
use crate::diagnostics::{self, DiagnosticRecord};
use crate::log;
use crate::logger::{Spinner, status_clear, status_error, status_pending, status_success, status_warning};
use crate::shutdown;
use crate::supervisor::{
    CrashKind, Decision, RetryContext, SLOW_BOOT_TIMEOUT, ServerHandle, classify_output,
    next_decision, settle_delay,
};
use crate::supervisor::decision::MAX_ATTEMPTS;
use crate::watch::{SourceWatcher, WatchScope};

/// Boot-in-progress state held next to the server handle.
struct Boot {
    ready_rx: oneshot::Receiver<()>,
    deadline: tokio::time::Instant,
    notified: bool,
}

enum Event {
    Shutdown,
    Changed,
    Exited(std::io::Result<std::process::ExitStatus>),
    Ready,
    /// Readiness channel closed without a marker; the exit event follows.
    ReadyLost,
    SlowBoot,
}

/// Run the dev loop until shutdown.
pub async fn run(config: TitanConfig, mut shutdown_rx: mpsc::UnboundedReceiver<()>) -> Result<()> {
    let binary = config.server_binary()?;

    // Watcher-first: events buffer from here on, nothing is lost during the
    // initial build.
    let (changes_tx, mut changes_rx) = mpsc::channel::<()>(8);
    let scope = WatchScope {
        root: config.get_root().to_path_buf(),
        actions_dir: config.actions_dir(),
        config_path: config.config_path.clone(),
        output_dir: config.output_dir(),
    };
    let watcher = SourceWatcher::new(scope, changes_tx).context("starting file watcher")?;
    tokio::spawn(watcher.run());

    log!(
        "dev";
        "titan dev v{} · watching {}",
        env!("CARGO_PKG_VERSION"),
        config.root_relative(config.actions_dir()).display()
    );

    let mut spinner = Spinner::new();
    let mut retry = RetryContext::new();
    let mut server: Option<ServerHandle> = None;
    let mut boot: Option<Boot> = None;
    let mut had_ready = false;
    let mut needs_build = true;
    let mut needs_respawn = false;
    let mut retried_start = false;

    loop {
        if shutdown::is_shutdown() {
            break;
        }

        if needs_build {
            needs_build = false;
            status_pending(spinner.tick(), "building...");
            match bundle::build(&config, &BuildOptions::default())? {
                BuildResult::Success(summary) => {
                    status_success(&format!(
                        "bundled {} action{}, {} route{} ({} dynamic) in {}ms",
                        summary.actions,
                        plural(summary.actions),
                        summary.routes,
                        plural(summary.routes),
                        summary.dynamic_routes,
                        summary.duration.as_millis()
                    ));
                    // New metadata only takes effect on a fresh boot.
                    if let Some(old) = server.take() {
                        boot = None;
                        old.stop().await?;
                        tokio::time::sleep(settle_delay(retried_start)).await;
                    }
                    needs_respawn = true;
                }
                BuildResult::Failure(diags) => {
                    // Previous artifacts are untouched; a running server
                    // keeps serving the last good build.
                    status_error(
                        &format!("build failed with {} error{}", diags.len(), plural(diags.len())),
                        diagnostics::render_all(&diags).trim_end(),
                    );
                }
            }
        }

        if needs_respawn {
            needs_respawn = false;
            let mut handle = ServerHandle::spawn(&binary, config.get_root(), had_ready)?;
            if let Some(pid) = handle.pid() {
                crate::debug!("server"; "spawned titan-server (pid {})", pid);
            }
            if let Some(ready_rx) = handle.take_ready() {
                boot = Some(Boot {
                    ready_rx,
                    deadline: tokio::time::Instant::now() + SLOW_BOOT_TIMEOUT,
                    notified: false,
                });
            }
            server = Some(handle);
            if had_ready {
                status_pending(spinner.tick(), "restarting server...");
            } else {
                status_pending(spinner.tick(), "starting server...");
            }
        }

        let slow_deadline = boot
            .as_ref()
            .filter(|b| !b.notified)
            .map(|b| b.deadline);

        let event = tokio::select! {
            biased;
            _ = shutdown_rx.recv() => Event::Shutdown,
            changed = changes_rx.recv() => match changed {
                Some(()) => Event::Changed,
                None => Event::Shutdown, // watcher gone, nothing left to do
            },
            status = async { server.as_mut().expect("guarded").wait().await },
                if server.is_some() => Event::Exited(status),
            res = async { (&mut boot.as_mut().expect("guarded").ready_rx).await },
                if boot.is_some() => match res {
                    Ok(()) => Event::Ready,
                    Err(_) => Event::ReadyLost,
                },
            _ = async { tokio::time::sleep_until(slow_deadline.expect("guarded")).await },
                if slow_deadline.is_some() => Event::SlowBoot,
        };

        match event {
            Event::Shutdown => break,

            Event::Changed => {
                // Coalesce everything already queued into one pass.
                while changes_rx.try_recv().is_ok() {}
                retry.reset();
                retried_start = false;
                needs_build = true;
            }

            Event::Ready => {
                boot = None;
                retried_start = false;
                if let Some(handle) = server.as_mut() {
                    handle.mark_ready();
                }
                if had_ready {
                    status_success("server restarted");
                } else {
                    had_ready = true;
                    status_success(&format!(
                        "server ready at http://localhost:{}",
                        published_port(&config)
                    ));
                }
            }

            Event::ReadyLost => {
                // The stdout scanner dropped its sender; the exit event is
                // about to fire and carries the real story.
                boot = None;
            }

            Event::SlowBoot => {
                if let Some(b) = &mut boot {
                    b.notified = true;
                }
                status_warning(&format!(
                    "server has not reported ready after {}s, still waiting",
                    SLOW_BOOT_TIMEOUT.as_secs()
                ));
            }

            Event::Exited(status) => {
                boot = None;
                let handle = server.take();
                if shutdown::is_shutdown() {
                    break;
                }

                let (output, stderr, runtime) = match &handle {
                    Some(h) => (h.output_snapshot(), h.stderr_snapshot(), h.started_at().elapsed()),
                    None => (String::new(), String::new(), Duration::ZERO),
                };
                let status_label = match &status {
                    Ok(s) => s.to_string(),
                    Err(e) => format!("wait failed: {e}"),
                };
                let kind = classify_output(&output);
                let attempts = retry.record_crash(runtime);

                match next_decision(&retry, kind) {
                    Decision::Retry { delay } => {
                        status_warning(&format!(
                            "server exited ({status_label}); restarting in {}ms (attempt {attempts}/{MAX_ATTEMPTS})",
                            delay.as_millis()
                        ));
                        // The backoff yields to edits and Ctrl+C.
                        tokio::select! {
                            biased;
                            _ = shutdown_rx.recv() => break,
                            changed = changes_rx.recv() => match changed {
                                Some(()) => {
                                    retry.reset();
                                    retried_start = false;
                                    needs_build = true;
                                }
                                None => break,
                            },
                            _ = tokio::time::sleep(delay) => {
                                tokio::time::sleep(settle_delay(true)).await;
                                retried_start = true;
                                needs_respawn = true;
                            }
                        }
                    }
                    Decision::GiveUp { kind: CrashKind::PortConflict } => {
                        let port = published_port(&config);
                        let record = port_conflict_record(&config, port);
                        status_error(
                            &format!("port {port} is already in use"),
                            diagnostics::render(&record).trim_end(),
                        );
                        // Halted: the next edit starts a fresh series.
                    }
                    Decision::GiveUp { kind: CrashKind::Other } => {
                        let summary = if attempts == 1 {
                            // Long-lived process died: no automatic respawn.
                            format!(
                                "server crashed after {}s of uptime ({status_label}); waiting for changes",
                                runtime.as_secs()
                            )
                        } else {
                            format!(
                                "server crashed {attempts} times in a row ({status_label}); waiting for changes"
                            )
                        };
                        status_error(&summary, &stderr_tail(&stderr, 8));
                    }
                }
            }
        }
    }

    if let Some(handle) = server.take() {
        status_pending(spinner.tick(), "shutting down server...");
        handle.stop().await.ok();
    }
    status_clear();
    log!("dev"; "shutdown complete");
    Ok(())
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Port the server will actually bind: whatever the published routes.json
/// says, since that is what it reads at boot.
fn published_port(config: &TitanConfig) -> u16 {
    read_published_port(&config.routes_artifact()).unwrap_or(DEFAULT_PORT)
}

fn read_published_port(artifact: &Path) -> Option<u16> {
    let content = std::fs::read_to_string(artifact).ok()?;
    let value: serde_json::Value = serde_json::from_str(&content).ok()?;
    value["__config"]["port"].as_u64().and_then(|p| u16::try_from(p).ok())
}

fn port_conflict_record(config: &TitanConfig, port: u16) -> DiagnosticRecord {
    DiagnosticRecord::new(
        "Port already in use",
        config
            .root_relative(&config.config_path)
            .display()
            .to_string(),
        format!(
            "the server could not bind port {port}; another process is \
             listening on it (possibly an older titan-server)"
        ),
    )
    .with_suggestion(format!(
        "stop the other process, change [server] port in titan.toml, or \
         run the server with PORT={} to override",
        port.saturating_add(1)
    ))
}

/// Last `lines` lines of captured stderr, for the crash panel.
fn stderr_tail(output: &str, lines: usize) -> String {
    let all: Vec<&str> = output.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}

// ============================================================================
// Tests
// ============================================================================
