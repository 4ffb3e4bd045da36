use pageload_tracker::LoadingSignal;
use tracing::debug;

use crate::OverlayView;

/// Mirrors the loading signal onto a view: visible while loading.
pub struct Overlay<V: OverlayView> {
    view: V,
}

impl<V: OverlayView> Overlay<V> {
    pub fn new(view: V) -> Self {
        Self { view }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    /// Follow the signal until every tracker handle is gone.
    pub async fn run(&self, mut signal: LoadingSignal) {
        let mut visible = None;
        self.apply(signal.is_loading(), &mut visible).await;

        while let Ok(loading) = signal.changed().await {
            self.apply(loading, &mut visible).await;
        }
        debug!("loading signal closed, overlay stopped");
    }

    async fn apply(&self, loading: bool, visible: &mut Option<bool>) {
        if *visible == Some(loading) {
            return;
        }
        if loading {
            self.view.show().await;
        } else {
            self.view.hide().await;
        }
        debug!(visible = loading, "overlay toggled");
        *visible = Some(loading);
    }
}
