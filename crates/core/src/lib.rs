mod config;
mod error;

pub use config::TrackerConfig;
pub use error::TrackerError;

use serde::{Deserialize, Serialize};

/// Where the tracker is in its settlement-detection cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Nothing registered since the last reset.
    Idle,
    /// Loads are still arriving, or the known ones have not all settled.
    Accumulating,
    /// Every known load has settled; waiting for the settled count to hold.
    Draining,
    /// The page has finished loading.
    Ready,
}

impl Phase {
    /// Whether the readiness signal reports `loading` while in this phase.
    ///
    /// `Idle` reports loading too: right after a reset the overlay stays up
    /// for the grace window in case a producer is about to register.
    pub fn is_loading(self) -> bool {
        !matches!(self, Phase::Ready)
    }
}

/// Final state of one registered load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Fulfilled,
    Rejected,
}

/// Conversion from whatever a producer's future yields into a settlement.
///
/// The tracker only cares that a load finished, not what it produced.
pub trait IntoOutcome {
    fn outcome(&self) -> LoadOutcome;
}

impl<T, E> IntoOutcome for Result<T, E> {
    fn outcome(&self) -> LoadOutcome {
        match self {
            Ok(_) => LoadOutcome::Fulfilled,
            Err(_) => LoadOutcome::Rejected,
        }
    }
}

impl IntoOutcome for LoadOutcome {
    fn outcome(&self) -> LoadOutcome {
        *self
    }
}

impl IntoOutcome for () {
    fn outcome(&self) -> LoadOutcome {
        LoadOutcome::Fulfilled
    }
}

/// Point-in-time view of the tracker, published after every transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerStatus {
    pub phase: Phase,
    /// Bumped on every reset.
    pub generation: u64,
    /// Size of the pending set (registrations since the last reset).
    pub registered: usize,
    pub fulfilled: usize,
    pub rejected: usize,
    /// Set when the last `Ready` was forced by the hard timeout.
    pub timed_out: bool,
}

impl TrackerStatus {
    pub fn settled(&self) -> usize {
        self.fulfilled + self.rejected
    }

    pub fn outstanding(&self) -> usize {
        self.registered.saturating_sub(self.settled())
    }

    pub fn all_settled(&self) -> bool {
        self.settled() >= self.registered
    }
}

impl Default for TrackerStatus {
    fn default() -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            registered: 0,
            fulfilled: 0,
            rejected: 0,
            timed_out: false,
        }
    }
}

/// Router lifecycle events fed to the navigation listener.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NavigationEvent {
    Start { url: String },
    End { url: String },
    Cancel { url: String },
    Error { url: String, reason: String },
}

impl NavigationEvent {
    pub fn url(&self) -> &str {
        match self {
            NavigationEvent::Start { url }
            | NavigationEvent::End { url }
            | NavigationEvent::Cancel { url }
            | NavigationEvent::Error { url, .. } => url,
        }
    }
}
