use anyhow::Result;
use pageload_overlay::{NavigationEvent, NavigationListener, Overlay, SpinnerView};
use pageload_tracker::{Tracker, TrackerConfig};
use tokio::sync::mpsc;
use tokio::time::{Duration, sleep};
use tracing_subscriber::EnvFilter;

/// Stand-in for a REST call issued by a page component.
async fn fetch(resource: &'static str, ms: u64, fail: bool) -> Result<usize, String> {
    sleep(Duration::from_millis(ms)).await;
    if fail {
        Err(format!("GET /api/{resource}: 503"))
    } else {
        Ok(resource.len())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => TrackerConfig::from_json(&std::fs::read_to_string(path)?)?,
        None => TrackerConfig::default(),
    };
    let tracker = Tracker::spawn(config)?;

    let overlay = Overlay::new(SpinnerView::new("Loading page..."));
    let signal = tracker.signal();
    let overlay_task = tokio::spawn(async move { overlay.run(signal).await });

    let (nav_tx, nav_rx) = mpsc::channel(16);
    tokio::spawn(NavigationListener::new(tracker.clone()).run(nav_rx));

    // First page: a list fetch, a slow image, and a failing widget.
    nav_tx.send(NavigationEvent::Start { url: "/news".into() }).await?;
    sleep(Duration::from_millis(10)).await;
    tracker.register(fetch("news", 400, false));
    tracker.register(fetch("news/illustration", 900, false));
    tracker.register(fetch("statistics", 300, true));
    nav_tx.send(NavigationEvent::End { url: "/news".into() }).await?;

    // A component that only finds out it needs more data later.
    let late = tracker.clone();
    tokio::spawn(async move {
        sleep(Duration::from_millis(1200)).await;
        late.register(fetch("news/comments", 500, false));
    });

    tracker.signal().wait_ready().await?;
    println!("/news ready: {}", serde_json::to_string(&tracker.status())?);

    // Second page: the producer also wants its data back.
    nav_tx.send(NavigationEvent::Start { url: "/partners".into() }).await?;
    sleep(Duration::from_millis(10)).await;
    let partners = tracker.track(fetch("partners", 600, false));
    nav_tx.send(NavigationEvent::End { url: "/partners".into() }).await?;

    println!("partners payload: {:?}", partners.await?);
    tracker.signal().wait_ready().await?;
    println!("/partners ready: {}", serde_json::to_string(&tracker.status())?);

    tracker.shutdown();
    drop(tracker);
    drop(nav_tx);
    overlay_task.abort();
    Ok(())
}
