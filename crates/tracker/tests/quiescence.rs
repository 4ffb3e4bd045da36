use futures::StreamExt;
use pageload_tracker::{Phase, Tracker, TrackerConfig, TrackerError};
use std::future::Future;
use tokio::time::{Duration, Instant, sleep};

fn load_after(ms: u64) -> impl Future<Output = Result<(), String>> + Send + 'static {
    async move {
        sleep(Duration::from_millis(ms)).await;
        Ok(())
    }
}

fn failing_after(ms: u64) -> impl Future<Output = Result<(), String>> + Send + 'static {
    async move {
        sleep(Duration::from_millis(ms)).await;
        Err("HTTP 500".to_string())
    }
}

async fn sleep_until_offset(start: Instant, ms: u64) {
    tokio::time::sleep_until(start + Duration::from_millis(ms)).await;
}

#[tokio::test(start_paused = true)]
async fn nothing_registered_is_ready_after_grace() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    assert!(signal.is_loading());
    signal.wait_ready().await.unwrap();

    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(2000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(2500), "ready too late: {elapsed:?}");
    assert_eq!(tracker.status().phase, Phase::Ready);
    assert!(!tracker.status().timed_out);
}

#[tokio::test(start_paused = true)]
async fn two_fetches_are_ready_only_after_stability_windows() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    tracker.reset();
    tracker.register(load_after(100));
    sleep_until_offset(start, 50).await;
    tracker.register(load_after(70));

    // Both fetches are done by 120ms, but the stability windows still run.
    sleep_until_offset(start, 2900).await;
    assert!(signal.is_loading());
    assert_eq!(tracker.status().registered, 2);
    assert_eq!(tracker.status().fulfilled, 2);

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "ready too late: {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn hung_load_is_cut_off_by_hard_timeout() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    tracker.register(load_after(50));
    tracker.register(futures::future::pending::<()>());

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(15000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(15500), "ready too late: {elapsed:?}");

    let status = tracker.status();
    assert!(status.timed_out);
    assert_eq!(status.outstanding(), 1);
}

#[tokio::test(start_paused = true)]
async fn late_registration_during_drain_postpones_ready() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    tracker.register(load_after(100));

    sleep_until_offset(start, 2100).await;
    assert_eq!(tracker.status().phase, Phase::Draining);

    tracker.register(load_after(1000));

    // Without the late load this run would have been ready at 2800ms.
    sleep_until_offset(start, 2900).await;
    assert!(signal.is_loading());
    sleep_until_offset(start, 3150).await;
    assert!(signal.is_loading());

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3100), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(5500), "ready too late: {elapsed:?}");
    assert_eq!(tracker.status().fulfilled, 2);
}

#[tokio::test(start_paused = true)]
async fn reset_while_ready_flips_signal_and_forgets_old_loads() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();

    tracker.register(load_after(100));
    signal.wait_ready().await.unwrap();

    tracker.reset();
    assert!(signal.is_loading());

    // A slow load from the previous page finishes after the next reset.
    tracker.register(load_after(5000));
    sleep(Duration::from_millis(100)).await;
    tracker.reset();
    tracker.register(futures::future::pending::<()>());

    sleep(Duration::from_millis(6000)).await;
    let status = tracker.status();
    assert_eq!(status.generation, 2);
    assert_eq!(status.registered, 1);
    assert_eq!(status.settled(), 0);
    assert!(signal.is_loading());
}

#[tokio::test(start_paused = true)]
async fn concurrent_loads_all_settle_before_ready() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    for offset in 0..5 {
        tracker.register(load_after(1000 + offset * 10));
    }

    signal.wait_ready().await.unwrap();
    assert!(start.elapsed() > Duration::from_millis(1040));

    let status = tracker.status();
    assert_eq!(status.registered, 5);
    assert_eq!(status.fulfilled, 5);
    assert!(!status.timed_out);
}

#[tokio::test(start_paused = true)]
async fn failures_and_panics_count_as_settled() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();

    tracker.register(load_after(100));
    tracker.register(failing_after(200));
    tracker.register(async {
        if true {
            panic!("image decode exploded");
        }
        Ok::<(), ()>(())
    });

    signal.wait_ready().await.unwrap();

    let status = tracker.status();
    assert!(!status.timed_out);
    assert_eq!(status.fulfilled, 1);
    assert_eq!(status.rejected, 2);
}

#[tokio::test(start_paused = true)]
async fn producers_that_never_stop_cannot_livelock() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    let producer = tracker.clone();
    tokio::spawn(async move {
        for _ in 0..100 {
            producer.register(load_after(200));
            sleep(Duration::from_millis(400)).await;
        }
    });

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(15000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(15500), "ready too late: {elapsed:?}");
    assert!(tracker.status().timed_out);
}

#[tokio::test(start_paused = true)]
async fn tracked_load_returns_output_to_producer() {
    let tracker = Tracker::spawn(TrackerConfig::fast()).unwrap();

    let news = tracker.track(async {
        sleep(Duration::from_millis(30)).await;
        Ok::<_, String>(vec!["headline"])
    });

    assert_eq!(news.await.unwrap(), Ok(vec!["headline"]));
    assert_eq!(tracker.status().registered, 1);
}

#[tokio::test(start_paused = true)]
async fn tracked_load_after_shutdown_is_abandoned() {
    let tracker = Tracker::spawn(TrackerConfig::fast()).unwrap();
    let mut status = tracker.watch_status();

    tracker.shutdown();
    while status.changed().await.is_ok() {}

    let result = tracker.track(load_after(10)).await;
    assert!(matches!(result, Err(TrackerError::Abandoned)));
}

#[tokio::test(start_paused = true)]
async fn signal_stream_reports_loading_then_ready() {
    let tracker = Tracker::spawn(TrackerConfig::fast()).unwrap();
    tracker.register(load_after(20));

    let values: Vec<bool> = tracker
        .signal()
        .into_stream()
        .take_while(|loading| futures::future::ready(*loading))
        .collect()
        .await;

    assert!(!values.is_empty());
    assert!(values.iter().all(|loading| *loading));
    assert!(!tracker.signal().is_loading());
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let err = Tracker::new(TrackerConfig::default().with_stability(0, 3))
        .err()
        .expect("zero stability polls should be rejected");
    assert!(matches!(
        err,
        TrackerError::InvalidConfig {
            field: "size_stable_polls",
            ..
        }
    ));
}

#[tokio::test(start_paused = true)]
async fn reset_mid_run_restarts_hard_timeout_from_new_run() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    tracker.register(futures::future::pending::<()>());

    sleep_until_offset(start, 10_000).await;
    tracker.reset();
    tracker.register(futures::future::pending::<()>());

    // The abandoned run's deadline was 15s; it must not end the new page.
    sleep_until_offset(start, 15_500).await;
    assert!(signal.is_loading());
    assert_eq!(tracker.status().phase, Phase::Accumulating);

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(25_000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(25_500), "ready too late: {elapsed:?}");

    let status = tracker.status();
    assert!(status.timed_out);
    assert_eq!(status.generation, 1);
    assert_eq!(status.registered, 1);
}

#[tokio::test(start_paused = true)]
async fn reset_mid_run_with_nothing_new_is_ready_after_grace() {
    let tracker = Tracker::spawn(TrackerConfig::default()).unwrap();
    let mut signal = tracker.signal();
    let start = Instant::now();

    tracker.register(futures::future::pending::<()>());

    sleep_until_offset(start, 1000).await;
    assert_eq!(tracker.status().phase, Phase::Accumulating);
    tracker.reset();

    sleep_until_offset(start, 2900).await;
    assert!(signal.is_loading());
    assert_eq!(tracker.status().phase, Phase::Idle);

    signal.wait_ready().await.unwrap();
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(3000), "ready too early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(3500), "ready too late: {elapsed:?}");

    let status = tracker.status();
    assert!(!status.timed_out);
    assert_eq!(status.registered, 0);
}
