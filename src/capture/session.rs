use super::controller::{AutoCaptureDecision, CaptureController, CaptureState, CountdownStep};
use super::encode::{FrameEncoder, JpegFrameEncoder};
use crate::camera::{CameraManager, FrameReader, PreviewSink, StreamHandle};
use crate::config::LivecheckConfig;
use crate::detection::DetectorEngine;
use crate::errors::CaptureError;
use crate::monitor::{FrameMonitor, ProcessingStats, SpoofingObservation};
use crate::quality::QualityScorer;
use crate::scheduler::{Cadence, DetectionScheduler, StopSignal};
use crate::types::{CapturedImage, QualityMetrics};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::time::{interval_at, Instant};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// Receives confirmed images on behalf of the exam flow.
pub trait CaptureSink: Send + Sync {
    fn deliver(&self, image: CapturedImage);
}

impl CaptureSink for UnboundedSender<CapturedImage> {
    fn deliver(&self, image: CapturedImage) {
        if self.send(image).is_err() {
            log::warn!("Capture sink closed, confirmed image dropped");
        }
    }
}

struct Shared {
    controller: Mutex<CaptureController>,
    reader: FrameReader,
    engine: Arc<DetectorEngine>,
    scorer: QualityScorer,
    encoder: Box<dyn FrameEncoder>,
    latest: Mutex<Option<QualityMetrics>>,
    last_error: Mutex<Option<CaptureError>>,
    monitor: Mutex<FrameMonitor>,
}

impl Shared {
    fn controller(&self) -> MutexGuard<'_, CaptureController> {
        self.controller.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn last_error(&self) -> MutexGuard<'_, Option<CaptureError>> {
        self.last_error.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember how the latest snapshot ended
    fn record_outcome(
        &self,
        outcome: Result<CapturedImage, CaptureError>,
    ) -> Result<CapturedImage, CaptureError> {
        *self.last_error() = outcome.as_ref().err().cloned();
        outcome
    }

    /// One quality-polling tick
    fn poll(&self) -> ControlFlow<()> {
        let started = std::time::Instant::now();
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Quality poll skipped: {}", e);
                return ControlFlow::Continue(());
            }
        };

        let detection = self.engine.detect_best(&frame);
        let quality = self.scorer.score(&frame, detection.as_ref());
        let now = Instant::now();

        self.monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(started.elapsed(), &quality, now);
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(quality);

        let mut controller = self.controller();
        if controller.evaluate_auto(&quality, now) != AutoCaptureDecision::Fire {
            return ControlFlow::Continue(());
        }
        let outcome = controller.complete_capture(&frame, quality, self.encoder.as_ref());
        drop(controller);

        match self.record_outcome(outcome) {
            Ok(_) => ControlFlow::Break(()),
            Err(e) => {
                // the controller is back to Idle; quality must hold another grace delay
                log::warn!("Auto-capture failed: {}", e);
                ControlFlow::Continue(())
            }
        }
    }

    /// Snapshot the current frame while the controller is `Capturing`
    fn snapshot(&self) -> Result<CapturedImage, CaptureError> {
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::error!("No frame to capture: {}", e);
                self.controller().abort();
                return self.record_outcome(Err(CaptureError::NoFrame));
            }
        };

        let detection = self.engine.detect_best(&frame);
        let quality = self.scorer.score(&frame, detection.as_ref());
        let outcome = self
            .controller()
            .complete_capture(&frame, quality, self.encoder.as_ref());
        self.record_outcome(outcome)
    }
}

/// Rolls an unfinished manual capture back to `Idle` if its future is dropped.
struct CountdownGuard<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl CountdownGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for CountdownGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            log::debug!("Manual capture cancelled");
            self.shared.controller().abort();
        }
    }
}

/// A live photo-capture view: owns the camera stream, polls quality and runs
/// manual and automatic captures.
pub struct CaptureSession {
    shared: Arc<Shared>,
    scheduler: DetectionScheduler,
    sink: Box<dyn CaptureSink>,
    stream: StreamHandle,
    stop_signal: StopSignal,
}

impl CaptureSession {
    /// Acquire the camera and start quality polling.
    pub fn start(
        manager: &CameraManager,
        config: &LivecheckConfig,
        engine: Arc<DetectorEngine>,
        sink: Box<dyn CaptureSink>,
    ) -> Result<Self, CaptureError> {
        let encoder = JpegFrameEncoder::new(config.capture.jpeg_quality);
        Self::start_with_encoder(manager, config, engine, Box::new(encoder), sink)
    }

    pub fn start_with_encoder(
        manager: &CameraManager,
        config: &LivecheckConfig,
        engine: Arc<DetectorEngine>,
        encoder: Box<dyn FrameEncoder>,
        sink: Box<dyn CaptureSink>,
    ) -> Result<Self, CaptureError> {
        let stream = manager.acquire(&config.camera.constraints())?;

        let session = Self {
            shared: Arc::new(Shared {
                controller: Mutex::new(CaptureController::new(config.capture.clone())),
                reader: stream.reader(),
                engine,
                scorer: QualityScorer::new(config.quality.clone()),
                encoder,
                latest: Mutex::new(None),
                last_error: Mutex::new(None),
                monitor: Mutex::new(FrameMonitor::new()),
            }),
            scheduler: DetectionScheduler::new(Cadence::Custom(
                config.scheduler.quality_interval(),
            )),
            sink,
            stream,
            stop_signal: StopSignal::new(),
        };

        session.start_polling();
        log::info!(
            "Capture session started on {} (auto-capture {})",
            session.stream.device_id(),
            if config.capture.auto_capture { "on" } else { "off" }
        );
        Ok(session)
    }

    fn start_polling(&self) -> bool {
        let shared = self.shared.clone();
        self.scheduler.start(move || shared.poll())
    }

    pub fn attach_preview(&self, sink: PreviewSink) {
        self.stream.attach_sink(sink);
    }

    fn ensure_running(&self) -> Result<(), CaptureError> {
        if self.stop_signal.is_stopped() {
            return Err(CaptureError::Stopped);
        }
        Ok(())
    }

    /// Run the manual countdown and capture. Dropping the future before it
    /// resolves cancels the capture, and [`stop`](Self::stop) ends it at once
    /// with [`CaptureError::Stopped`].
    pub async fn capture_manual(&self) -> Result<CapturedImage, CaptureError> {
        self.ensure_running()?;
        self.shared.controller().begin_countdown()?;
        let guard = CountdownGuard {
            shared: &self.shared,
            armed: true,
        };

        let mut ticker = interval_at(Instant::now() + COUNTDOWN_STEP, COUNTDOWN_STEP);
        loop {
            self.stop_signal
                .unless_stopped(ticker.tick())
                .await
                .ok_or(CaptureError::Stopped)?;
            let step = self.shared.controller().countdown_tick()?;
            match step {
                CountdownStep::Remaining(n) => log::debug!("Capturing in {}", n),
                CountdownStep::Fire => break,
            }
        }

        let result = self.shared.snapshot();
        guard.disarm();
        let image = result?;

        if self.shared.controller().auto_capture_enabled() {
            self.scheduler.stop();
        }
        Ok(image)
    }

    /// Deliver the captured image to the sink. Capturing alone never does.
    pub fn confirm(&self) -> Result<CapturedImage, CaptureError> {
        self.ensure_running()?;
        let image = self.shared.controller().confirm()?;
        log::info!("Capture {} confirmed", image.id());
        self.sink.deliver(image.clone());
        Ok(image)
    }

    /// Discard the captured image and go back to the live view.
    pub fn retake(&self) -> Result<(), CaptureError> {
        self.ensure_running()?;
        let restart = self.shared.controller().retake()?;
        if restart && !self.stream.is_released() {
            self.start_polling();
        }
        Ok(())
    }

    /// Cancel any countdown, stop polling, then release the camera. Idempotent.
    pub fn stop(&self) {
        if self.stop_signal.stop() {
            log::info!("Capture session on {} stopped", self.stream.device_id());
        }
        self.scheduler.stop();
        self.stream.release();
        self.shared.controller().abort();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_signal.is_stopped()
    }

    /// The most recent capture failure, manual or automatic. Cleared by the
    /// next successful capture.
    pub fn last_error(&self) -> Option<CaptureError> {
        self.shared.last_error().clone()
    }

    pub fn state(&self) -> CaptureState {
        self.shared.controller().state()
    }

    pub fn is_capturing(&self) -> bool {
        self.shared.controller().is_capturing()
    }

    pub fn is_polling(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn poll_count(&self) -> u64 {
        self.scheduler.tick_count()
    }

    pub fn captured(&self) -> Option<CapturedImage> {
        self.shared.controller().captured().cloned()
    }

    pub fn attempts(&self) -> u32 {
        self.shared.controller().attempts()
    }

    pub fn best_quality(&self) -> Option<QualityMetrics> {
        self.shared.controller().best_quality()
    }

    pub fn latest_quality(&self) -> Option<QualityMetrics> {
        *self.shared.latest.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> ProcessingStats {
        self.shared
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .stats()
    }

    pub fn spoofing_observations(&self) -> Vec<SpoofingObservation> {
        self.shared
            .monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .observations()
            .to_vec()
    }

    pub fn device_id(&self) -> &str {
        self.stream.device_id()
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
