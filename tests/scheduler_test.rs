//! Detection loop cadence and cancellation under paused tokio time

use livecheck::scheduler::{Cadence, DetectionScheduler};
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

fn counting(scheduler: &DetectionScheduler) -> Arc<AtomicU32> {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    assert!(scheduler.start(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        ControlFlow::Continue(())
    }));
    calls
}

#[tokio::test(start_paused = true)]
async fn test_presence_cadence() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    let calls = counting(&scheduler);

    sleep(Duration::from_millis(1050)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 10);
    assert_eq!(scheduler.tick_count(), 10);
}

#[tokio::test(start_paused = true)]
async fn test_quality_poll_cadence() {
    let scheduler = DetectionScheduler::new(Cadence::QualityPoll);
    let calls = counting(&scheduler);

    sleep(Duration::from_millis(450)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_no_callbacks_after_stop() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    let calls = counting(&scheduler);

    sleep(Duration::from_millis(350)).await;
    assert!(scheduler.stop());
    let at_stop = calls.load(Ordering::SeqCst);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), at_stop);
    assert!(!scheduler.is_running());
    assert!(!scheduler.stop());
}

#[tokio::test(start_paused = true)]
async fn test_double_start_is_ignored() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    let calls = counting(&scheduler);
    assert!(!scheduler.start(|| ControlFlow::Continue(())));

    sleep(Duration::from_millis(250)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_stop() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    let first = counting(&scheduler);
    sleep(Duration::from_millis(150)).await;
    scheduler.stop();

    let second = counting(&scheduler);
    sleep(Duration::from_millis(250)).await;
    assert_eq!(first.load(Ordering::SeqCst), 1);
    assert_eq!(second.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_callback_break_stops_loop() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    scheduler.start(move || {
        if counter.fetch_add(1, Ordering::SeqCst) == 2 {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    });

    sleep(Duration::from_millis(1000)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert!(!scheduler.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_drop_cancels_loop() {
    let calls = {
        let scheduler = DetectionScheduler::new(Cadence::Presence);
        let calls = counting(&scheduler);
        sleep(Duration::from_millis(150)).await;
        calls
    };

    sleep(Duration::from_millis(500)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_start_without_runtime_fails() {
    let scheduler = DetectionScheduler::new(Cadence::Presence);
    assert!(!scheduler.start(|| ControlFlow::Continue(())));
    assert!(!scheduler.is_running());
}
