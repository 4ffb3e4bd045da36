use pageload_core::TrackerConfig;
use tokio::time::Instant;

/// What one poll of a detection run concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Observation {
    /// The pending set grew since the last poll; counters start over.
    SizeChanged { from: usize, to: usize },
    /// Size unchanged, but not yet for enough polls.
    SizeSettling { polls: u32 },
    /// Size is stable and some loads are still pending.
    Unsettled,
    /// Everything settled; counting consecutive settled rounds.
    Draining { rounds: u32 },
    /// Enough settled rounds; one last check after the confirmation delay.
    Confirming,
    /// The final check held.
    Confirmed,
}

/// State of a single settlement-detection run.
///
/// Only one exists at a time; the driver holds it in an `Option` and a
/// registration only starts a new run when that slot is empty.
#[derive(Debug)]
pub(crate) struct DetectionRun {
    pub started: Instant,
    pub deadline: Instant,
    pub next_poll: Instant,
    last_size: usize,
    size_stable: u32,
    settled_rounds: u32,
    confirming: Option<usize>,
}

impl DetectionRun {
    pub fn start(config: &TrackerConfig, now: Instant, size: usize) -> Self {
        Self {
            started: now,
            deadline: now + config.hard_timeout,
            next_poll: now + config.initial_delay,
            last_size: size,
            size_stable: 0,
            settled_rounds: 0,
            confirming: None,
        }
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn poll_due(&self, now: Instant) -> bool {
        now >= self.next_poll
    }

    pub fn next_wake(&self) -> Instant {
        self.next_poll.min(self.deadline)
    }

    fn restart(&mut self, size: usize) {
        self.last_size = size;
        self.size_stable = 0;
        self.settled_rounds = 0;
        self.confirming = None;
    }

    /// Feed one poll. Schedules the next poll unless the run is over.
    pub fn observe(
        &mut self,
        config: &TrackerConfig,
        now: Instant,
        size: usize,
        all_settled: bool,
    ) -> Observation {
        if let Some(expected) = self.confirming.take() {
            if size == expected && all_settled {
                return Observation::Confirmed;
            }
            let from = self.last_size;
            self.restart(size);
            self.next_poll = now + config.poll_interval;
            return Observation::SizeChanged { from, to: size };
        }

        self.next_poll = now + config.poll_interval;

        if size != self.last_size {
            let from = self.last_size;
            self.restart(size);
            return Observation::SizeChanged { from, to: size };
        }

        self.size_stable = self.size_stable.saturating_add(1);
        if self.size_stable < config.size_stable_polls {
            return Observation::SizeSettling {
                polls: self.size_stable,
            };
        }

        if !all_settled {
            self.settled_rounds = 0;
            return Observation::Unsettled;
        }

        self.settled_rounds = self.settled_rounds.saturating_add(1);
        if self.settled_rounds < config.settled_stable_rounds {
            return Observation::Draining {
                rounds: self.settled_rounds,
            };
        }

        self.confirming = Some(size);
        self.next_poll = now + config.confirm_delay;
        Observation::Confirming
    }
}
