use async_trait::async_trait;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;
use tokio::sync::Mutex;

/// Something that can display and hide the loading overlay.
#[async_trait]
pub trait OverlayView: Send + Sync {
    async fn show(&self);
    async fn hide(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Shown,
    Hidden,
}

/// Keeps every show/hide in memory.
#[derive(Debug, Default)]
pub struct RecordingView {
    transitions: Mutex<Vec<Transition>>,
}

impl RecordingView {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn transitions(&self) -> Vec<Transition> {
        self.transitions.lock().await.clone()
    }
}

#[async_trait]
impl OverlayView for RecordingView {
    async fn show(&self) {
        self.transitions.lock().await.push(Transition::Shown);
    }

    async fn hide(&self) {
        self.transitions.lock().await.push(Transition::Hidden);
    }
}

/// Terminal spinner standing in for the overlay.
pub struct SpinnerView {
    message: String,
    bar: Mutex<Option<ProgressBar>>,
}

impl SpinnerView {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            bar: Mutex::new(None),
        }
    }
}

#[async_trait]
impl OverlayView for SpinnerView {
    async fn show(&self) {
        let mut bar = self.bar.lock().await;
        if bar.is_some() {
            return;
        }

        let style = ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .expect("spinner template is a valid static string");
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message(self.message.clone());
        spinner.enable_steady_tick(Duration::from_millis(100));
        *bar = Some(spinner);
    }

    async fn hide(&self) {
        if let Some(spinner) = self.bar.lock().await.take() {
            spinner.finish_and_clear();
        }
    }
}
