//! Server process supervision.
//!
//! [`ServerHandle`] owns one spawned server process: piped stdio, a stdout
//! scanner that watches for the readiness marker while echoing output, and
//! background tasks draining both streams into bounded buffers for crash
//! classification. Termination goes through the process group so worker
//! children die with the server.

pub mod classify;
pub mod decision;

pub use classify::{CrashKind, classify_output};
pub use decision::{Decision, RetryContext, next_decision};

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;

use crate::log;

/// Line prefix the server prints once its listener is accepting.
pub const READY_MARKER: &str = "Titan server running at:";

/// How long a boot may take before the slow-boot notice is shown.
pub const SLOW_BOOT_TIMEOUT: Duration = Duration::from_secs(15);

/// Grace period between SIGTERM and SIGKILL on shutdown.
const TERM_GRACE: Duration = Duration::from_secs(3);

/// Pause after a kill before the next spawn, so the old listener's socket is
/// actually released. Retried starts wait longer.
pub fn settle_delay(retried: bool) -> Duration {
    if retried {
        Duration::from_millis(500)
    } else {
        Duration::from_millis(200)
    }
}

/// Keep at most this much of each output stream; older output is dropped
/// from the front.
const STDERR_CAP: usize = 64 * 1024;

/// Lifecycle of one supervised process. A handle only exists once spawning
/// has begun; `Idle` is the state of having no handle at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Idle,
    Spawning,
    Booting,
    Ready,
}

impl ServerState {
    /// Legal forward transitions. There is no path back from `Ready` to an
    /// earlier state: a ready server is never respawned automatically, only
    /// replaced through a fresh handle after it exits or is stopped.
    pub fn can_advance_to(self, next: ServerState) -> bool {
        matches!(
            (self, next),
            (ServerState::Idle, ServerState::Spawning)
                | (ServerState::Spawning, ServerState::Booting)
                | (ServerState::Booting, ServerState::Ready)
        )
    }
}

/// One supervised server process.
pub struct ServerHandle {
    child: Child,
    state: ServerState,
    started_at: std::time::Instant,
    /// Resolves once the readiness marker appears on stdout.
    ready_rx: Option<oneshot::Receiver<()>>,
    stdout_buf: Arc<Mutex<String>>,
    stderr_buf: Arc<Mutex<String>>,
}

impl ServerHandle {
    /// Spawn the server binary in the project root.
    ///
    /// `quiet_boot` suppresses stdout echo up to and including the readiness
    /// marker; restarts use it so the banner only prints on the first boot.
    pub fn spawn(binary: &Path, root: &Path, quiet_boot: bool) -> Result<Self> {
        let mut cmd = Command::new(binary);
        cmd.current_dir(root).env("TITAN_DEV", "1");
        Self::spawn_command(cmd, quiet_boot)
            .with_context(|| format!("spawning server binary {}", binary.display()))
    }

    /// Spawn an arbitrary command under supervision. Tests use this to
    /// substitute a shell one-liner for the real server.
    pub fn spawn_command(mut cmd: Command, quiet_boot: bool) -> Result<Self> {
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        // Idle -> Spawning -> Booting happens inside this call: a handle
        // only exists once the child is up and its scanners are attached.
        let mut child = cmd.spawn()?;

        let stdout_buf = Arc::new(Mutex::new(String::new()));
        let (ready_tx, ready_rx) = oneshot::channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(scan_stdout(
                stdout,
                Arc::clone(&stdout_buf),
                ready_tx,
                quiet_boot,
            ));
        }

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    crate::debug!("server"; "stderr: {}", line);
                    push_capped(&buf, &line);
                }
            });
        }

        Ok(Self {
            child,
            state: ServerState::Booting,
            started_at: std::time::Instant::now(),
            ready_rx: Some(ready_rx),
            stdout_buf,
            stderr_buf,
        })
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// When the process was spawned, for runtime classification on exit.
    pub fn started_at(&self) -> std::time::Instant {
        self.started_at
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Record the readiness marker sighting.
    pub fn mark_ready(&mut self) {
        debug_assert!(self.state.can_advance_to(ServerState::Ready));
        self.state = ServerState::Ready;
    }

    /// Take the readiness receiver. The orchestration loop holds it next to
    /// the handle so both can be polled from one select.
    pub fn take_ready(&mut self) -> Option<oneshot::Receiver<()>> {
        self.ready_rx.take()
    }

    /// Wait for the process to exit.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Stderr captured so far, for the crash panel.
    pub fn stderr_snapshot(&self) -> String {
        self.stderr_buf.lock().clone()
    }

    /// Everything captured so far, stderr first. Crash classification scans
    /// this: some runtimes report bind failures on stdout.
    pub fn output_snapshot(&self) -> String {
        let stderr = self.stderr_buf.lock();
        let stdout = self.stdout_buf.lock();
        if stderr.is_empty() {
            stdout.clone()
        } else if stdout.is_empty() {
            stderr.clone()
        } else {
            format!("{stderr}\n{stdout}")
        }
    }

    /// Terminate the whole process group: polite signal first, hard kill
    /// after the grace period.
    pub async fn stop(mut self) -> Result<()> {
        let pid = self.child.id();

        #[cfg(unix)]
        if let Some(pid) = pid {
            // SAFETY: signalling a process group we created with setpgid(0).
            unsafe {
                libc::killpg(pid as i32, libc::SIGTERM);
            }
        }
        #[cfg(windows)]
        if let Some(pid) = pid {
            let _ = Command::new("taskkill")
                .args(["/T", "/F", "/PID", &pid.to_string()])
                .output()
                .await;
        }

        if tokio::time::timeout(TERM_GRACE, self.child.wait())
            .await
            .is_err()
        {
            log!("server"; "did not exit after SIGTERM, killing");
            #[cfg(unix)]
            if let Some(pid) = pid {
                // SAFETY: same process group as above.
                unsafe {
                    libc::killpg(pid as i32, libc::SIGKILL);
                }
            }
            self.child.start_kill().ok();
            let _ = self.child.wait().await;
        }

        Ok(())
    }
}

/// Echo server stdout and fire the readiness signal on the marker line.
///
/// `quiet_boot` strips decorative banner lines (and the marker line itself,
/// which the status block already reports) during boot, so restarts do not
/// replay the startup banner. Informative boot output still comes through.
async fn scan_stdout(
    stdout: tokio::process::ChildStdout,
    buf: Arc<Mutex<String>>,
    ready_tx: oneshot::Sender<()>,
    quiet_boot: bool,
) {
    let mut lines = BufReader::new(stdout).lines();
    let mut ready_tx = Some(ready_tx);
    let mut ready = false;

    while let Ok(Some(line)) = lines.next_line().await {
        push_capped(&buf, &line);

        let is_marker = line.contains(READY_MARKER);
        if is_marker {
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(());
            }
        }

        if quiet_boot && !ready && (is_marker || is_banner_line(&line)) {
            crate::debug!("server"; "{}", line);
        } else {
            log!("server"; "{}", line);
        }
        if is_marker {
            ready = true;
        }
    }
}

/// Decorative output: blank lines and lines with no letters or digits
/// (logo art, separators).
fn is_banner_line(line: &str) -> bool {
    !line.chars().any(char::is_alphanumeric)
}

/// Append a line to a capped stream buffer, trimming oldest output first.
fn push_capped(buf: &Mutex<String>, line: &str) {
    let mut b = buf.lock();
    if !b.is_empty() {
        b.push('\n');
    }
    b.push_str(line);
    if b.len() > STDERR_CAP {
        // The byte cut may land inside a multi-byte character.
        let mut cut = b.len() - STDERR_CAP;
        while !b.is_char_boundary(cut) {
            cut += 1;
        }
        b.drain(..cut);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn sh(script: &str) -> Command {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }

    #[tokio::test]
    async fn test_readiness_marker_fires_signal() {
        let mut handle = ServerHandle::spawn_command(
            sh("echo 'Titan server running at: http://localhost:3000'; sleep 5"),
            false,
        )
        .unwrap();
        let ready_rx = handle.take_ready().unwrap();
        tokio::time::timeout(Duration::from_secs(2), ready_rx)
            .await
            .expect("ready signal in time")
            .expect("sender not dropped");
    }

    #[tokio::test]
    async fn test_exit_without_marker() {
        let mut handle = ServerHandle::spawn_command(sh("echo nope; exit 3"), false).unwrap();
        let ready_rx = handle.take_ready().unwrap();
        let status = handle.wait().await.unwrap();
        assert_eq!(status.code(), Some(3));
        // ready channel reports the drop instead of resolving
        assert!(ready_rx.await.is_err());
    }

    #[tokio::test]
    async fn test_stderr_is_captured() {
        let mut handle =
            ServerHandle::spawn_command(sh("echo 'EADDRINUSE :::3000' >&2; exit 1"), false)
                .unwrap();
        handle.wait().await.unwrap();
        // stderr drain runs on its own task; give it a moment
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if handle.stderr_snapshot().contains("EADDRINUSE") {
                break;
            }
            assert!(Instant::now() < deadline, "stderr never captured");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            classify_output(&handle.stderr_snapshot()),
            CrashKind::PortConflict
        );
    }

    #[tokio::test]
    async fn test_stderr_cap_trims_on_char_boundary() {
        // One oversized line of multi-byte characters forces a trim whose
        // byte offset falls inside a character.
        let mut handle = ServerHandle::spawn_command(
            sh("i=0; while [ $i -lt 9000 ]; do printf '€€€€€€€€€€' >&2; i=$((i+1)); done; echo >&2; echo DONE >&2; exit 1"),
            false,
        )
        .unwrap();
        handle.wait().await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            if handle.stderr_snapshot().contains("DONE") {
                break;
            }
            assert!(Instant::now() < deadline, "stderr drain lost the tail");
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(handle.stderr_snapshot().len() <= STDERR_CAP);
    }

    #[test]
    fn test_state_transitions_are_ordered() {
        assert!(ServerState::Idle.can_advance_to(ServerState::Spawning));
        assert!(ServerState::Spawning.can_advance_to(ServerState::Booting));
        assert!(ServerState::Booting.can_advance_to(ServerState::Ready));
        // no shortcuts forward
        assert!(!ServerState::Idle.can_advance_to(ServerState::Ready));
        assert!(!ServerState::Spawning.can_advance_to(ServerState::Ready));
        // no path back out of Ready: a ready server is never respawned
        assert!(!ServerState::Ready.can_advance_to(ServerState::Spawning));
        assert!(!ServerState::Ready.can_advance_to(ServerState::Booting));
    }

    #[tokio::test]
    async fn test_handle_reaches_ready_state() {
        let mut handle = ServerHandle::spawn_command(
            sh("echo 'Titan server running at: http://localhost:3000'; sleep 5"),
            false,
        )
        .unwrap();
        assert_eq!(handle.state(), ServerState::Booting);
        let ready_rx = handle.take_ready().unwrap();
        tokio::time::timeout(Duration::from_secs(2), ready_rx)
            .await
            .expect("ready signal in time")
            .expect("sender not dropped");
        handle.mark_ready();
        assert_eq!(handle.state(), ServerState::Ready);
        handle.stop().await.unwrap();
    }

    #[tokio::test]
    async fn test_stdout_bind_error_classifies_as_port_conflict() {
        let mut handle =
            ServerHandle::spawn_command(sh("echo 'Error: listen EADDRINUSE :::3000'; exit 1"), false)
                .unwrap();
        handle.wait().await.unwrap();
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            if handle.output_snapshot().contains("EADDRINUSE") {
                break;
            }
            assert!(Instant::now() < deadline, "stdout never captured");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            classify_output(&handle.output_snapshot()),
            CrashKind::PortConflict
        );
    }

    #[test]
    fn test_banner_line_detection() {
        assert!(is_banner_line(""));
        assert!(is_banner_line("   "));
        assert!(is_banner_line("════════════════"));
        assert!(is_banner_line("  ---  ***  "));
        assert!(!is_banner_line("warning: low memory"));
        assert!(!is_banner_line("Titan server running at: http://localhost:3000"));
    }

    #[tokio::test]
    async fn test_stop_terminates_quickly() {
        let handle = ServerHandle::spawn_command(sh("sleep 30"), false).unwrap();
        let started = Instant::now();
        handle.stop().await.unwrap();
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_settle_delay_grows_on_retry() {
        assert!(settle_delay(true) > settle_delay(false));
    }
}
