//! Retry policy as a pure decision function.
//!
//! The orchestrator records each crash into a [`RetryContext`] and asks for
//! the next step; the policy itself never touches processes, clocks or I/O,
//! so every branch is testable directly.

use std::time::Duration;

use super::classify::CrashKind;

/// Consecutive fast crashes tolerated before giving up.
pub const MAX_ATTEMPTS: u32 = 3;
/// Backoff before retrying after a port conflict (the holder often exits).
pub const PORT_CONFLICT_DELAY: Duration = Duration::from_millis(1000);
/// Backoff before retrying any other crash.
pub const CRASH_DELAY: Duration = Duration::from_millis(2000);
/// A process that survived this long was genuinely up; its crash means
/// developer intervention, not backoff.
pub const MIN_VIABLE_RUNTIME: Duration = Duration::from_secs(15);

/// Crash history for the current attempt series.
#[derive(Debug, Clone, Default)]
pub struct RetryContext {
    attempts: u32,
    long_lived: bool,
}

impl RetryContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a crash, returning the attempt count it lands on.
    ///
    /// A crash after [`MIN_VIABLE_RUNTIME`] does not extend the series: the
    /// counter restarts at 1 so a later fast-crash streak gets a full set of
    /// retries, but the crash itself is flagged as long-lived.
    pub fn record_crash(&mut self, runtime: Duration) -> u32 {
        if runtime >= MIN_VIABLE_RUNTIME {
            self.attempts = 1;
            self.long_lived = true;
        } else {
            self.attempts += 1;
            self.long_lived = false;
        }
        self.attempts
    }

    /// An external trigger (rebuild, manual restart) wipes the series.
    pub fn reset(&mut self) {
        self.attempts = 0;
        self.long_lived = false;
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }
}

/// What to do after a crash has been recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry { delay: Duration },
    GiveUp { kind: CrashKind },
}

/// Decide the next step for the crash most recently recorded in `ctx`.
///
/// Fast crashes retry up to [`MAX_ATTEMPTS`] times; the counter holds the
/// crash count, so retrying while `attempts <= MAX_ATTEMPTS` yields exactly
/// that many respawns before giving up. A long-lived process that dies is
/// not respawned at all: it was serving traffic, so whatever killed it needs
/// a developer, and the loop waits for the next change instead.
pub fn next_decision(ctx: &RetryContext, kind: CrashKind) -> Decision {
    if kind == CrashKind::Other && ctx.long_lived {
        return Decision::GiveUp { kind };
    }
    if ctx.attempts > MAX_ATTEMPTS {
        return Decision::GiveUp { kind };
    }
    let delay = match kind {
        CrashKind::PortConflict => PORT_CONFLICT_DELAY,
        CrashKind::Other => CRASH_DELAY,
    };
    Decision::Retry { delay }
}

// ============================================================================
// Tests
// ============================================================================
