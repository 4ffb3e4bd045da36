use pageload_core::NavigationEvent;
use pageload_tracker::Tracker;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Router-side collaborator: every navigation start begins a new page.
pub struct NavigationListener {
    tracker: Tracker,
}

impl NavigationListener {
    pub fn new(tracker: Tracker) -> Self {
        Self { tracker }
    }

    pub fn handle(&self, event: &NavigationEvent) {
        match event {
            NavigationEvent::Start { url } => {
                info!(%url, "navigation started, resetting page loader");
                self.tracker.reset();
            }
            // The tracker decides when the new page is done.
            NavigationEvent::End { url } | NavigationEvent::Cancel { url } => {
                debug!(%url, ?event, "navigation finished");
            }
            NavigationEvent::Error { url, reason } => {
                warn!(%url, %reason, "navigation failed");
            }
        }
    }

    pub async fn run(self, mut events: mpsc::Receiver<NavigationEvent>) {
        while let Some(event) = events.recv().await {
            self.handle(&event);
        }
        debug!("navigation event stream closed");
    }
}
