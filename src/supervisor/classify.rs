//! Crash classification from captured server output.

/// Why a server process died, as far as its output tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrashKind {
    /// The listen socket could not be bound.
    PortConflict,
    /// Anything else.
    Other,
}

/// Substrings that mean the listen port was taken, across the platforms and
/// runtimes the server can be built on. Matched case-insensitively.
const PORT_CONFLICT_MARKERS: &[&str] = &[
    "eaddrinuse",
    "address already in use",
    "address in use",
    "os error 98",
    "os error 48",
    "only one usage of each socket address",
];

/// Classify a crash from the process's combined captured output.
pub fn classify_output(output: &str) -> CrashKind {
    let haystack = output.to_lowercase();
    if PORT_CONFLICT_MARKERS.iter().any(|m| haystack.contains(m)) {
        CrashKind::PortConflict
    } else {
        CrashKind::Other
    }
}
