use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use pageload_core::{LoadOutcome, Phase, TrackerConfig, TrackerStatus};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info, warn};

use crate::run::{DetectionRun, Observation};

pub(crate) type LoadFuture = BoxFuture<'static, LoadOutcome>;

pub(crate) enum Command {
    Register(LoadFuture),
    Reset,
    Shutdown,
}

impl std::fmt::Debug for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Command::Register(_) => f.write_str("Register"),
            Command::Reset => f.write_str("Reset"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// Owns the pending set and runs settlement detection.
///
/// Obtained from [`crate::Tracker::new`]; spawn [`TrackerDriver::run`] on a
/// tokio runtime. Exactly one driver serves a tracker, so at most one
/// detection loop is ever active.
pub struct TrackerDriver {
    config: TrackerConfig,
    commands: mpsc::UnboundedReceiver<Command>,
    loading: Arc<watch::Sender<bool>>,
    status: watch::Sender<TrackerStatus>,
    pending: FuturesUnordered<JoinHandle<LoadOutcome>>,
    current: TrackerStatus,
    grace_deadline: Option<Instant>,
    run: Option<DetectionRun>,
}

impl TrackerDriver {
    pub(crate) fn new(
        config: TrackerConfig,
        commands: mpsc::UnboundedReceiver<Command>,
        loading: Arc<watch::Sender<bool>>,
        status: watch::Sender<TrackerStatus>,
    ) -> Self {
        Self {
            config,
            commands,
            loading,
            status,
            pending: FuturesUnordered::new(),
            current: TrackerStatus::default(),
            grace_deadline: None,
            run: None,
        }
    }

    pub async fn run(mut self) {
        // A fresh tracker starts out exactly like a reset one.
        self.arm_grace();
        self.publish();

        loop {
            let wake = self.next_wake();

            tokio::select! {
                biased;

                command = self.commands.recv() => match command {
                    Some(Command::Register(load)) => self.on_register(load),
                    Some(Command::Reset) => self.on_reset(),
                    Some(Command::Shutdown) | None => break,
                },
                Some(joined) = self.pending.next(), if !self.pending.is_empty() => {
                    self.on_settled(joined);
                }
                _ = sleep_until(wake.unwrap_or_else(Instant::now)), if wake.is_some() => {
                    self.on_wake(Instant::now());
                }
            }
        }

        debug!(generation = self.current.generation, "tracker driver stopped");
    }

    fn next_wake(&self) -> Option<Instant> {
        match &self.run {
            Some(run) => Some(run.next_wake()),
            None => self.grace_deadline,
        }
    }

    fn arm_grace(&mut self) {
        self.grace_deadline = Some(Instant::now() + self.config.idle_grace);
        self.loading.send_replace(true);
    }

    fn on_register(&mut self, load: LoadFuture) {
        self.pending.push(tokio::spawn(load));
        self.current.registered += 1;
        self.grace_deadline = None;

        if self.run.is_none() {
            let now = Instant::now();
            self.run = Some(DetectionRun::start(
                &self.config,
                now,
                self.current.registered,
            ));
            self.current.timed_out = false;
            self.loading.send_replace(true);
            self.set_phase(Phase::Accumulating);
            info!(
                generation = self.current.generation,
                pending = self.current.registered,
                "detection run started"
            );
        } else {
            debug!(
                generation = self.current.generation,
                pending = self.current.registered,
                "load registered"
            );
        }
        self.publish();
    }

    fn on_reset(&mut self) {
        // Dropping the join handles detaches the tasks; stale settlements
        // can no longer reach the new generation.
        self.pending = FuturesUnordered::new();
        self.run = None;
        self.current = TrackerStatus {
            generation: self.current.generation + 1,
            ..TrackerStatus::default()
        };
        self.arm_grace();
        info!(generation = self.current.generation, "tracker reset");
        self.publish();
    }

    fn on_settled(&mut self, joined: Result<LoadOutcome, JoinError>) {
        let outcome = joined.unwrap_or_else(|err| {
            debug!(error = %err, "load task did not complete");
            LoadOutcome::Rejected
        });
        match outcome {
            LoadOutcome::Fulfilled => self.current.fulfilled += 1,
            LoadOutcome::Rejected => self.current.rejected += 1,
        }
        debug!(
            generation = self.current.generation,
            settled = self.current.settled(),
            pending = self.current.registered,
            ?outcome,
            "load settled"
        );
        self.publish();
    }

    fn on_wake(&mut self, now: Instant) {
        let Some(run) = self.run.as_mut() else {
            if self.grace_deadline.is_some_and(|deadline| now >= deadline) {
                info!(
                    generation = self.current.generation,
                    "nothing registered during grace window"
                );
                self.finish(false);
            }
            return;
        };

        if run.timed_out(now) {
            warn!(
                generation = self.current.generation,
                outstanding = self.current.outstanding(),
                elapsed_ms = now.duration_since(run.started).as_millis() as u64,
                "hard timeout reached, forcing ready"
            );
            self.finish(true);
            return;
        }

        if !run.poll_due(now) {
            return;
        }

        let observation = run.observe(
            &self.config,
            now,
            self.current.registered,
            self.current.all_settled(),
        );
        let elapsed_ms = now.duration_since(run.started).as_millis() as u64;
        let generation = self.current.generation;
        let pending = self.current.registered;
        let settled = self.current.settled();

        match observation {
            Observation::SizeChanged { from, to } => {
                debug!(generation, from, to, elapsed_ms, "pending set changed, stability restarted");
                self.set_phase(Phase::Accumulating);
            }
            Observation::SizeSettling { polls } => {
                debug!(generation, pending, polls, elapsed_ms, "waiting for pending set to hold");
                self.set_phase(Phase::Accumulating);
            }
            Observation::Unsettled => {
                debug!(generation, pending, settled, elapsed_ms, "loads still in flight");
                self.set_phase(Phase::Accumulating);
            }
            Observation::Draining { rounds } => {
                debug!(generation, pending, rounds, elapsed_ms, "all loads settled");
                self.set_phase(Phase::Draining);
            }
            Observation::Confirming => {
                debug!(generation, pending, elapsed_ms, "confirming before ready");
                self.set_phase(Phase::Draining);
            }
            Observation::Confirmed => {
                info!(
                    generation = self.current.generation,
                    fulfilled = self.current.fulfilled,
                    rejected = self.current.rejected,
                    elapsed_ms,
                    "page ready"
                );
                self.finish(false);
            }
        }
    }

    fn finish(&mut self, timed_out: bool) {
        self.run = None;
        self.grace_deadline = None;
        self.current.timed_out = timed_out;
        self.set_phase(Phase::Ready);
        self.publish();
        self.loading.send_replace(false);
    }

    fn set_phase(&mut self, phase: Phase) {
        if self.current.phase != phase {
            debug!(from = ?self.current.phase, to = ?phase, "phase change");
            self.current.phase = phase;
            self.publish();
        }
    }

    fn publish(&self) {
        self.status.send_replace(self.current.clone());
    }
}
