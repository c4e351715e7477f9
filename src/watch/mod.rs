//! Source watcher: notify events in, one debounced "changed" signal out.
//!
//! Watcher-first pattern: the watcher attaches before the initial build
//! runs, buffering raw events in a sync channel so nothing is lost during
//! the first pass. Raw events flow through the pure [`debouncer`], then a
//! relevance filter scoped to the project layout. Per-file detail never
//! leaves this module: changed paths are logged here, and the orchestrator
//! only learns that something changed and a rebuild is due.

mod debouncer;

use std::path::{Path, PathBuf};

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use rustc_hash::FxHashMap;
use tokio::sync::mpsc;

use crate::log;

use debouncer::Debouncer;

/// Coalesced outcome for one path within a debounce window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChangeKind {
    Created,
    Modified,
    Removed,
}

impl ChangeKind {
    fn label(&self) -> &'static str {
        match self {
            ChangeKind::Created => "created",
            ChangeKind::Modified => "modified",
            ChangeKind::Removed => "removed",
        }
    }
}

/// One released debounce window: path -> final coalesced change.
type ChangeSet = FxHashMap<PathBuf, ChangeKind>;

/// What the watcher considers part of the project.
#[derive(Debug, Clone)]
pub struct WatchScope {
    pub root: PathBuf,
    pub actions_dir: PathBuf,
    pub config_path: PathBuf,
    pub output_dir: PathBuf,
}

impl WatchScope {
    /// Whether a changed path can affect build output.
    ///
    /// Only action sources and the config file trigger rebuilds. Anything
    /// under the output directory is our own writing; any dotted component
    /// (including the staging directory) is infrastructure.
    fn is_relevant(&self, path: &Path) -> bool {
        if path.starts_with(&self.output_dir) {
            return false;
        }
        let Ok(relative) = path.strip_prefix(&self.root) else {
            return false;
        };
        let dotted = relative.components().any(|c| {
            c.as_os_str()
                .to_str()
                .is_some_and(|s| s.starts_with('.'))
        });
        if dotted {
            return false;
        }

        path == self.config_path || path.starts_with(&self.actions_dir)
    }
}

/// File watcher feeding the orchestration loop.
pub struct SourceWatcher {
    /// sync -> async bridge for notify (it has no async API)
    notify_rx: std::sync::mpsc::Receiver<notify::Result<notify::Event>>,
    /// must stay alive for events to keep flowing
    _watcher: RecommendedWatcher,
    scope: WatchScope,
    /// one unit signal per released window: "something changed, rebuild"
    changes_tx: mpsc::Sender<()>,
}

impl SourceWatcher {
    /// Attach the watcher to the project root. Events start buffering
    /// immediately; call [`run`](Self::run) once the initial build is done.
    pub fn new(scope: WatchScope, changes_tx: mpsc::Sender<()>) -> notify::Result<Self> {
        let (notify_tx, notify_rx) = std::sync::mpsc::channel();

        let mut watcher = notify::recommended_watcher(move |res| {
            let _ = notify_tx.send(res);
        })?;
        watcher.watch(&scope.root, RecursiveMode::Recursive)?;

        Ok(Self {
            notify_rx,
            _watcher: watcher,
            scope,
            changes_tx,
        })
    }

    /// Run the watch loop until the orchestrator drops its receiver.
    pub async fn run(self) {
        let Self {
            notify_rx,
            _watcher,
            scope,
            changes_tx,
        } = self;

        let (async_tx, mut async_rx) = mpsc::channel::<notify::Event>(64);

        // Blocking bridge thread: notify's channel is sync.
        std::thread::spawn(move || {
            while let Ok(result) = notify_rx.recv() {
                match result {
                    Ok(event) => {
                        if async_tx.blocking_send(event).is_err() {
                            break; // receiver dropped
                        }
                    }
                    Err(e) => log!("watch"; "notify error: {}", e),
                }
            }
        });

        let mut debouncer = Debouncer::new();
        loop {
            tokio::select! {
                biased;
                event = async_rx.recv() => {
                    match event {
                        Some(event) => debouncer.add_event(&event),
                        None => break, // bridge thread gone
                    }
                }
                _ = tokio::time::sleep(debouncer.sleep_duration()) => {
                    let Some(raw) = debouncer.take_if_ready() else {
                        continue;
                    };
                    let relevant: ChangeSet = raw
                        .into_iter()
                        .filter(|(path, _)| scope.is_relevant(path))
                        .collect();
                    if relevant.is_empty() {
                        continue;
                    }
                    for (path, kind) in &relevant {
                        let display = path.strip_prefix(&scope.root).unwrap_or(path);
                        log!("watch"; "{} {}", kind.label(), display.display());
                    }
                    if changes_tx.send(()).await.is_err() {
                        break; // orchestrator shut down
                    }
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
