//! Pure debounce state: timing and per-path event coalescing only. The
//! relevance filtering lives with the watcher, which knows the project
//! layout.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use rustc_hash::FxHashMap;

use super::ChangeKind;

/// Quiet period after the last raw event before a change set is released.
pub(super) const DEBOUNCE_MS: u64 = 300;
/// Minimum spacing between released change sets; events arriving inside the
/// cooldown are held, never dropped.
pub(super) const REBUILD_COOLDOWN_MS: u64 = 800;

pub(super) struct Debouncer {
    /// path -> coalesced change (dedup is free via key uniqueness)
    pub(super) changes: FxHashMap<PathBuf, ChangeKind>,
    pub(super) last_event: Option<Instant>,
    pub(super) last_release: Option<Instant>,
}

/// How an incoming event combines with one already held for the same path.
enum Merge {
    /// First event wins
    Keep,
    Replace(ChangeKind),
    /// The pair cancels out (created then removed within the window)
    Cancel,
}

fn merge(existing: ChangeKind, incoming: ChangeKind) -> Merge {
    match (existing, incoming) {
        // deleted then restored: the restore is what matters
        (ChangeKind::Removed, ChangeKind::Created | ChangeKind::Modified) => {
            Merge::Replace(incoming)
        }
        // modified then deleted: upgrade to removal
        (ChangeKind::Modified, ChangeKind::Removed) => Merge::Replace(ChangeKind::Removed),
        // appeared then vanished inside the window: nothing happened
        (ChangeKind::Created, ChangeKind::Removed) => Merge::Cancel,
        _ => Merge::Keep,
    }
}

impl Debouncer {
    pub(super) fn new() -> Self {
        Self {
            changes: FxHashMap::default(),
            last_event: None,
            last_release: None,
        }
    }

    /// Fold one raw notify event into the held change set.
    pub(super) fn add_event(&mut self, event: &notify::Event) {
        use notify::EventKind;

        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Modify(modify) => {
                // mtime/chmod noise would cause endless rebuild loops
                if matches!(modify, notify::event::ModifyKind::Metadata(_)) {
                    return;
                }
                ChangeKind::Modified
            }
            _ => return,
        };

        for path in &event.paths {
            if is_temp_file(path) {
                continue;
            }

            if let Some(&existing) = self.changes.get(path) {
                match merge(existing, kind) {
                    Merge::Keep => continue,
                    Merge::Replace(kind) => {
                        crate::debug!("watch"; "coalesce {}->{}: {}", existing.label(), kind.label(), path.display());
                        self.changes.insert(path.clone(), kind);
                    }
                    Merge::Cancel => {
                        crate::debug!("watch"; "discard created+removed: {}", path.display());
                        self.changes.remove(path);
                    }
                }
            } else {
                crate::debug!("watch"; "event {}: {}", kind.label(), path.display());
                self.changes.insert(path.clone(), kind);
            }
            self.last_event = Some(Instant::now());
        }
    }

    /// Take the held changes if debounce and cooldown have both elapsed.
    pub(super) fn take_if_ready(&mut self) -> Option<FxHashMap<PathBuf, ChangeKind>> {
        if !self.is_ready() {
            return None;
        }

        let changes = std::mem::take(&mut self.changes);
        self.last_event = None;

        if changes.is_empty() {
            return None;
        }

        self.last_release = Some(Instant::now());
        Some(changes)
    }

    pub(super) fn is_ready(&self) -> bool {
        let Some(last_event) = self.last_event else {
            return false;
        };

        if last_event.elapsed() < Duration::from_millis(DEBOUNCE_MS) {
            return false;
        }

        if let Some(last_release) = self.last_release
            && last_release.elapsed() < Duration::from_millis(REBUILD_COOLDOWN_MS)
        {
            return false;
        }

        !self.changes.is_empty()
    }

    /// Precise sleep until the next possible ready time.
    pub(super) fn sleep_duration(&self) -> Duration {
        let Some(last_event) = self.last_event else {
            return Duration::from_secs(86400);
        };

        let debounce_remaining =
            Duration::from_millis(DEBOUNCE_MS).saturating_sub(last_event.elapsed());

        let cooldown_remaining = self
            .last_release
            .map(|t| Duration::from_millis(REBUILD_COOLDOWN_MS).saturating_sub(t.elapsed()))
            .unwrap_or(Duration::ZERO);

        debounce_remaining
            .max(cooldown_remaining)
            .max(Duration::from_millis(1))
    }
}

/// Editor artifacts (backup/swap files) never trigger rebuilds.
fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    matches!(ext, "bck" | "bak" | "backup" | "swp" | "swo" | "tmp")
        || name.ends_with('~')
        || name.starts_with('.')
}

// ============================================================================
// Tests
// ============================================================================
