use std::fmt;

/// Where the watch loop currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Initializing,
    Watching,
    /// Transient: back to `Watching` once the command succeeded.
    Deploying,
}

impl fmt::Display for WatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WatchState::Initializing => "initializing",
            WatchState::Watching => "watching",
            WatchState::Deploying => "deploying",
        };
        f.write_str(s)
    }
}

/// Result of one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    Unchanged,
    Deployed,
}
