//! Consumers of the page-load signal: the overlay that hides once the page
//! is ready, and the router-side listener that resets the tracker on every
//! navigation.

mod navigation;
mod overlay;
mod view;

pub use navigation::NavigationListener;
pub use overlay::Overlay;
pub use pageload_core::NavigationEvent;
pub use view::{OverlayView, RecordingView, SpinnerView, Transition};
