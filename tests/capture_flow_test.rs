//! Capture session behaviour against the synthetic camera

use livecheck::capture::{
    decode_dimensions, CaptureSession, CaptureState, FrameEncoder, JpegFrameEncoder,
};
use livecheck::testing::SyntheticCamera;
use livecheck::types::{CapturedImage, Frame, QualityMetrics};
use livecheck::{CameraManager, CaptureError, DetectorEngine, LivecheckConfig};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;

fn config(auto_capture: bool) -> LivecheckConfig {
    let mut config = LivecheckConfig::default();
    config.capture.auto_capture = auto_capture;
    config
}

fn session(
    camera: SyntheticCamera,
    config: &LivecheckConfig,
) -> (
    CameraManager,
    CaptureSession,
    mpsc::UnboundedReceiver<CapturedImage>,
) {
    let manager = CameraManager::new(Arc::new(camera));
    let (tx, rx) = mpsc::unbounded_channel();
    let session = CaptureSession::start(
        &manager,
        config,
        Arc::new(DetectorEngine::heuristic()),
        Box::new(tx),
    )
    .unwrap();
    (manager, session, rx)
}

#[tokio::test(start_paused = true)]
async fn test_auto_capture_fires_after_grace_delay() {
    let (_manager, session, _rx) = session(SyntheticCamera::new(320, 240), &config(true));

    // armed at 500ms, still waiting at 1000ms
    sleep(Duration::from_millis(1100)).await;
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.latest_quality().unwrap().overall() > 85.0);

    sleep(Duration::from_millis(500)).await;
    assert_eq!(session.state(), CaptureState::Captured);
    assert_eq!(session.attempts(), 1);
    assert!(!session.is_polling());

    // the poll that fired was the last one
    let polls = session.poll_count();
    sleep(Duration::from_millis(2000)).await;
    assert_eq!(session.poll_count(), polls);
}

#[tokio::test(start_paused = true)]
async fn test_auto_capture_never_fires_without_face() {
    let (_manager, session, _rx) = session(SyntheticCamera::empty(320, 240), &config(true));

    sleep(Duration::from_millis(5000)).await;
    assert_eq!(session.state(), CaptureState::Idle);
    assert_eq!(session.attempts(), 0);
    assert_eq!(session.latest_quality().unwrap().overall(), 0.0);
}

#[tokio::test(start_paused = true)]
async fn test_manual_trigger_after_auto_capture_is_rejected() {
    let (_manager, session, _rx) = session(SyntheticCamera::new(320, 240), &config(true));
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(session.state(), CaptureState::Captured);

    assert!(matches!(
        session.capture_manual().await,
        Err(CaptureError::InvalidState(_))
    ));
    assert_eq!(session.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_second_manual_trigger_is_busy() {
    let (_manager, session, _rx) = session(SyntheticCamera::new(320, 240), &config(false));

    let (first, second) = tokio::join!(session.capture_manual(), session.capture_manual());
    assert!(first.is_ok());
    assert!(matches!(second, Err(CaptureError::Busy)));
    assert_eq!(session.attempts(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_countdown_takes_three_seconds() {
    let (_manager, session, _rx) = session(SyntheticCamera::new(320, 240), &config(false));

    let started = tokio::time::Instant::now();
    session.capture_manual().await.unwrap();
    assert_eq!(started.elapsed(), Duration::from_secs(3));
    assert_eq!(session.state(), CaptureState::Captured);
    // manual mode keeps scoring the live view
    assert!(session.is_polling());
}

#[tokio::test(start_paused = true)]
async fn test_confirm_delivers_jpeg_once() {
    let (_manager, session, mut rx) = session(SyntheticCamera::new(320, 240), &config(false));

    let image = session.capture_manual().await.unwrap();
    assert!(rx.try_recv().is_err(), "capturing alone must not deliver");

    let confirmed = session.confirm().unwrap();
    assert_eq!(confirmed.id(), image.id());
    let delivered = rx.recv().await.unwrap();
    assert_eq!(delivered.mime_type(), "image/jpeg");
    assert_eq!(decode_dimensions(delivered.encoded_bytes()).unwrap(), (320, 240));

    assert!(matches!(session.confirm(), Err(CaptureError::NothingToConfirm)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_retake_releases_previous_image() {
    let (_manager, session, mut rx) = session(SyntheticCamera::new(320, 240), &config(true));
    sleep(Duration::from_millis(1600)).await;
    let first = session.captured().unwrap();

    session.retake().unwrap();
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.captured().is_none());
    assert!(matches!(session.confirm(), Err(CaptureError::NothingToConfirm)));
    assert!(session.is_polling());

    sleep(Duration::from_millis(1600)).await;
    let second = session.captured().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(session.attempts(), 2);
    assert!(session.best_quality().is_some());

    session.confirm().unwrap();
    assert_eq!(rx.recv().await.unwrap().id(), second.id());
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_camera() {
    let camera = SyntheticCamera::new(320, 240);
    let stops = camera.stop_counter();
    let (manager, session, _rx) = session(camera, &config(true));

    sleep(Duration::from_millis(600)).await;
    session.stop();
    session.stop();
    assert!(!manager.is_streaming());
    assert!(!session.is_polling());
    assert_eq!(stops.load(std::sync::atomic::Ordering::SeqCst), 1);
}

/// Fails the first `failures` encodes, then behaves like the JPEG encoder.
struct FlakyEncoder {
    failures: AtomicU32,
    inner: JpegFrameEncoder,
}

impl FrameEncoder for FlakyEncoder {
    fn encode(&self, frame: &Frame, quality: QualityMetrics) -> Result<CapturedImage, CaptureError> {
        let left = self.failures.load(Ordering::SeqCst);
        if left > 0 {
            self.failures.store(left - 1, Ordering::SeqCst);
            return Err(CaptureError::Encoding("encoder unavailable".to_string()));
        }
        self.inner.encode(frame, quality)
    }
}

#[tokio::test(start_paused = true)]
async fn test_auto_capture_failure_is_reported_and_recovers() {
    let manager = CameraManager::new(Arc::new(SyntheticCamera::new(320, 240)));
    let (tx, _rx) = mpsc::unbounded_channel::<CapturedImage>();
    let encoder = FlakyEncoder {
        failures: AtomicU32::new(1),
        inner: JpegFrameEncoder::default(),
    };
    let session = CaptureSession::start_with_encoder(
        &manager,
        &config(true),
        Arc::new(DetectorEngine::heuristic()),
        Box::new(encoder),
        Box::new(tx),
    )
    .unwrap();

    // fires at 1500ms and fails
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(!session.is_capturing());
    assert_eq!(session.attempts(), 0);
    assert!(matches!(session.last_error(), Some(CaptureError::Encoding(_))));
    assert!(session.is_polling());

    // re-armed at 2000ms, fires again at 3000ms
    sleep(Duration::from_millis(1500)).await;
    assert_eq!(session.state(), CaptureState::Captured);
    assert_eq!(session.attempts(), 1);
    assert!(session.last_error().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_countdown_emits_nothing() {
    let (_manager, session, mut rx) = session(SyntheticCamera::new(320, 240), &config(false));

    let capture = session.capture_manual();
    tokio::pin!(capture);
    tokio::select! {
        _ = &mut capture => panic!("countdown finished early"),
        _ = sleep(Duration::from_millis(1500)) => {}
    }

    let stopped_at = tokio::time::Instant::now();
    session.stop();
    assert!(matches!(capture.await, Err(CaptureError::Stopped)));
    assert_eq!(stopped_at.elapsed(), Duration::ZERO);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(session.state(), CaptureState::Idle);
    assert!(session.captured().is_none());
    assert_eq!(session.attempts(), 0);
    assert!(matches!(session.capture_manual().await, Err(CaptureError::Stopped)));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_stop_after_capture_blocks_delivery() {
    let (_manager, session, mut rx) = session(SyntheticCamera::new(320, 240), &config(true));
    sleep(Duration::from_millis(1600)).await;
    assert_eq!(session.state(), CaptureState::Captured);

    session.stop();
    assert!(session.is_stopped());
    assert!(matches!(session.confirm(), Err(CaptureError::Stopped)));
    assert!(matches!(session.retake(), Err(CaptureError::Stopped)));
    assert!(!session.is_polling());
    assert!(rx.try_recv().is_err());
}
