use serde::Deserialize;
use std::time::Duration;

use crate::TrackerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    /// Delay before the first poll of a detection run, so a burst of
    /// registrations from the same tick lands first.
    pub initial_delay: Duration,
    pub poll_interval: Duration,
    /// Consecutive polls the pending-set size must hold before settlement is checked.
    pub size_stable_polls: u32,
    /// Consecutive polls with everything settled and the size unchanged.
    pub settled_stable_rounds: u32,
    /// Last wait before `Ready`, after which the size is checked once more.
    pub confirm_delay: Duration,
    /// How long a reset tracker waits for a first registration.
    pub idle_grace: Duration,
    /// Ceiling on a detection run, measured from its start.
    pub hard_timeout: Duration,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            poll_interval: Duration::from_millis(300),
            size_stable_polls: 5,
            settled_stable_rounds: 3,
            confirm_delay: Duration::from_millis(500),
            idle_grace: Duration::from_millis(2000),
            hard_timeout: Duration::from_millis(15000),
        }
    }
}

/// On-disk shape: every field optional, in milliseconds.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTrackerConfig {
    initial_delay_ms: Option<u64>,
    poll_interval_ms: Option<u64>,
    size_stable_polls: Option<u32>,
    settled_stable_rounds: Option<u32>,
    confirm_delay_ms: Option<u64>,
    idle_grace_ms: Option<u64>,
    hard_timeout_ms: Option<u64>,
}

impl TrackerConfig {
    pub fn with_poll_interval(mut self, ms: u64) -> Self {
        self.poll_interval = Duration::from_millis(ms);
        self
    }

    pub fn with_hard_timeout(mut self, ms: u64) -> Self {
        self.hard_timeout = Duration::from_millis(ms);
        self
    }

    pub fn with_idle_grace(mut self, ms: u64) -> Self {
        self.idle_grace = Duration::from_millis(ms);
        self
    }

    pub fn with_stability(mut self, size_stable_polls: u32, settled_stable_rounds: u32) -> Self {
        self.size_stable_polls = size_stable_polls;
        self.settled_stable_rounds = settled_stable_rounds;
        self
    }

    pub fn fast() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            poll_interval: Duration::from_millis(100),
            size_stable_polls: 3,
            settled_stable_rounds: 2,
            confirm_delay: Duration::from_millis(200),
            idle_grace: Duration::from_millis(1000),
            hard_timeout: Duration::from_millis(8000),
        }
    }

    pub fn patient() -> Self {
        Self {
            initial_delay: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(500),
            size_stable_polls: 6,
            settled_stable_rounds: 4,
            confirm_delay: Duration::from_millis(1000),
            idle_grace: Duration::from_millis(4000),
            hard_timeout: Duration::from_millis(30000),
        }
    }

    /// Parse a JSON object of overrides on top of the defaults.
    pub fn from_json(json: &str) -> Result<Self, TrackerError> {
        let raw: RawTrackerConfig = serde_json::from_str(json)?;
        let defaults = Self::default();
        let ms = |value: Option<u64>, fallback: Duration| {
            value.map(Duration::from_millis).unwrap_or(fallback)
        };

        let config = Self {
            initial_delay: ms(raw.initial_delay_ms, defaults.initial_delay),
            poll_interval: ms(raw.poll_interval_ms, defaults.poll_interval),
            size_stable_polls: raw.size_stable_polls.unwrap_or(defaults.size_stable_polls),
            settled_stable_rounds: raw
                .settled_stable_rounds
                .unwrap_or(defaults.settled_stable_rounds),
            confirm_delay: ms(raw.confirm_delay_ms, defaults.confirm_delay),
            idle_grace: ms(raw.idle_grace_ms, defaults.idle_grace),
            hard_timeout: ms(raw.hard_timeout_ms, defaults.hard_timeout),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.poll_interval.is_zero() {
            return Err(TrackerError::InvalidConfig {
                field: "poll_interval",
                reason: "must be greater than zero",
            });
        }
        if self.size_stable_polls == 0 {
            return Err(TrackerError::InvalidConfig {
                field: "size_stable_polls",
                reason: "must be at least 1",
            });
        }
        if self.settled_stable_rounds == 0 {
            return Err(TrackerError::InvalidConfig {
                field: "settled_stable_rounds",
                reason: "must be at least 1",
            });
        }
        if self.hard_timeout <= self.initial_delay {
            return Err(TrackerError::InvalidConfig {
                field: "hard_timeout",
                reason: "must be longer than initial_delay",
            });
        }
        Ok(())
    }
}
