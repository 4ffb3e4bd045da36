use pageload_core::TrackerError;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

/// Broadcast readiness signal. `true` means the page is still loading.
///
/// Last value wins; a subscriber that falls behind only sees the latest state.
#[derive(Debug, Clone)]
pub struct LoadingSignal {
    rx: watch::Receiver<bool>,
}

impl LoadingSignal {
    pub(crate) fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx }
    }

    pub fn is_loading(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait for the next published value.
    pub async fn changed(&mut self) -> Result<bool, TrackerError> {
        self.rx.changed().await.map_err(|_| TrackerError::Closed)?;
        Ok(*self.rx.borrow_and_update())
    }

    /// Resolve once the signal reports ready, immediately if it already does.
    pub async fn wait_ready(&mut self) -> Result<(), TrackerError> {
        self.rx
            .wait_for(|loading| !*loading)
            .await
            .map(|_| ())
            .map_err(|_| TrackerError::Closed)
    }

    /// Stream of values, starting with the current one.
    pub fn into_stream(self) -> WatchStream<bool> {
        WatchStream::new(self.rx)
    }
}
