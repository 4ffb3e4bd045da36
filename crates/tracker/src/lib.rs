//! Page-load quiescence tracking.
//!
//! Producers hand their in-flight loads to a [`Tracker`]; the tracker decides
//! when nothing is left to wait for and flips a [`LoadingSignal`] to ready.
//! The number of loads is never known up front, so readiness is declared only
//! after the pending set has stopped growing, every member has settled, and
//! both have held for a few consecutive polls. A hard timeout caps the wait.

mod driver;
mod run;
mod signal;

pub use driver::TrackerDriver;
pub use pageload_core::{LoadOutcome, Phase, TrackerConfig, TrackerError, TrackerStatus};
pub use signal::LoadingSignal;

use driver::Command;
use futures::FutureExt;
use pageload_core::IntoOutcome;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::warn;

/// Cloneable handle to a page-load tracker.
#[derive(Debug, Clone)]
pub struct Tracker {
    commands: mpsc::UnboundedSender<Command>,
    loading: Arc<watch::Sender<bool>>,
    status: watch::Receiver<TrackerStatus>,
}

impl Tracker {
    pub fn new(config: TrackerConfig) -> Result<(Self, TrackerDriver), TrackerError> {
        config.validate()?;

        let (commands, receiver) = mpsc::unbounded_channel();
        let (loading, _) = watch::channel(true);
        let loading = Arc::new(loading);
        let (status_tx, status) = watch::channel(TrackerStatus::default());

        let driver = TrackerDriver::new(config, receiver, Arc::clone(&loading), status_tx);
        let tracker = Self {
            commands,
            loading,
            status,
        };
        Ok((tracker, driver))
    }

    /// Build a tracker and spawn its driver on the current runtime.
    pub fn spawn(config: TrackerConfig) -> Result<Self, TrackerError> {
        let (tracker, driver) = Self::new(config)?;
        tokio::spawn(driver.run());
        Ok(tracker)
    }

    /// Add a load to the pending set.
    ///
    /// Never blocks and never fails. The load is driven on its own task; an
    /// error or a panic counts as settled.
    pub fn register<F>(&self, load: F)
    where
        F: Future + Send + 'static,
        F::Output: IntoOutcome,
    {
        // Flip the signal here so a caller that registers and immediately
        // waits cannot observe a previous page's ready state.
        self.loading.send_replace(true);
        self.send(Command::Register(
            async move { load.await.outcome() }.boxed(),
        ));
    }

    /// Register a load and get its output back.
    pub fn track<F>(&self, load: F) -> TrackedLoad<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: IntoOutcome + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        self.register(async move {
            let output = load.await;
            let outcome = output.outcome();
            let _ = tx.send(output);
            outcome
        });
        TrackedLoad { rx }
    }

    /// Clear the pending set and report loading until the new page settles.
    pub fn reset(&self) {
        self.loading.send_replace(true);
        self.send(Command::Reset);
    }

    pub fn signal(&self) -> LoadingSignal {
        LoadingSignal::new(self.loading.subscribe())
    }

    pub fn status(&self) -> TrackerStatus {
        self.status.borrow().clone()
    }

    pub fn watch_status(&self) -> watch::Receiver<TrackerStatus> {
        self.status.clone()
    }

    /// Stop the driver. Registrations after this are dropped.
    pub fn shutdown(&self) {
        self.send(Command::Shutdown);
    }

    fn send(&self, command: Command) {
        if let Err(err) = self.commands.send(command) {
            warn!(command = ?err.0, "tracker driver is gone, command dropped");
        }
    }
}

/// Output of a load registered through [`Tracker::track`].
#[derive(Debug)]
pub struct TrackedLoad<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Future for TrackedLoad<T> {
    type Output = Result<T, TrackerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.map_err(|_| TrackerError::Abandoned))
    }
}
