//! Continuous face presence
//!
//! Samples the stream at the presence cadence and publishes the latest
//! [`PresenceStatus`], along with processing statistics and spoofing
//! observations for every scored frame.

use crate::camera::{CameraManager, FrameReader, PreviewSink, StreamHandle};
use crate::config::LivecheckConfig;
use crate::detection::DetectorEngine;
use crate::errors::CameraError;
use crate::monitor::{FrameMonitor, ProcessingStats, SpoofingObservation};
use crate::quality::QualityScorer;
use crate::scheduler::{Cadence, DetectionScheduler};
use crate::types::{DetectionResult, QualityMetrics};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::Instant;

/// Detector confidence above which a face counts as good quality
pub const GOOD_QUALITY_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceStatus {
    pub has_face: bool,
    pub face_count: usize,
    /// Confidence of the best face, 0 without one
    pub confidence: f32,
    pub is_good_quality: bool,
    pub detections: Vec<DetectionResult>,
    pub quality: QualityMetrics,
    pub frame_sequence: u64,
    pub updated_at: DateTime<Utc>,
}

impl PresenceStatus {
    fn from_detections(
        detections: Vec<DetectionResult>,
        quality: QualityMetrics,
        frame_sequence: u64,
    ) -> Self {
        let confidence = detections
            .iter()
            .map(|d| d.confidence_score)
            .fold(0.0, f32::max);
        Self {
            has_face: !detections.is_empty(),
            face_count: detections.len(),
            confidence,
            is_good_quality: confidence > GOOD_QUALITY_CONFIDENCE,
            detections,
            quality,
            frame_sequence,
            updated_at: Utc::now(),
        }
    }
}

impl Default for PresenceStatus {
    fn default() -> Self {
        Self::from_detections(Vec::new(), QualityMetrics::empty(), 0)
    }
}

struct Shared {
    reader: FrameReader,
    engine: Arc<DetectorEngine>,
    scorer: QualityScorer,
    status: Mutex<PresenceStatus>,
    monitor: Mutex<FrameMonitor>,
}

impl Shared {
    fn status(&self) -> MutexGuard<'_, PresenceStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn monitor(&self) -> MutexGuard<'_, FrameMonitor> {
        self.monitor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn tick(&self) -> ControlFlow<()> {
        let started = std::time::Instant::now();
        let frame = match self.reader.read_frame() {
            Ok(frame) => frame,
            Err(e) => {
                log::warn!("Presence tick without frame: {}", e);
                return ControlFlow::Continue(());
            }
        };

        let mut detections = self.engine.detect(&frame);
        detections.sort_by(|a, b| b.confidence_score.total_cmp(&a.confidence_score));
        let quality = self.scorer.score(&frame, detections.first());
        self.monitor()
            .record(started.elapsed(), &quality, Instant::now());

        *self.status() = PresenceStatus::from_detections(detections, quality, frame.sequence);
        ControlFlow::Continue(())
    }
}

/// Live face presence over its own camera stream.
pub struct PresenceTracker {
    shared: Arc<Shared>,
    scheduler: DetectionScheduler,
    stream: StreamHandle,
}

impl PresenceTracker {
    pub fn start(
        manager: &CameraManager,
        config: &LivecheckConfig,
        engine: Arc<DetectorEngine>,
    ) -> Result<Self, CameraError> {
        let stream = manager.acquire(&config.camera.constraints())?;
        let tracker = Self {
            shared: Arc::new(Shared {
                reader: stream.reader(),
                engine,
                scorer: QualityScorer::new(config.quality.clone()),
                status: Mutex::new(PresenceStatus::default()),
                monitor: Mutex::new(FrameMonitor::new()),
            }),
            scheduler: DetectionScheduler::new(Cadence::Custom(
                config.scheduler.presence_interval(),
            )),
            stream,
        };

        let shared = tracker.shared.clone();
        tracker.scheduler.start(move || shared.tick());
        log::info!("Presence detection started on {}", tracker.stream.device_id());
        Ok(tracker)
    }

    pub fn attach_preview(&self, sink: PreviewSink) {
        self.stream.attach_sink(sink);
    }

    pub fn status(&self) -> PresenceStatus {
        self.shared.status().clone()
    }

    pub fn stats(&self) -> ProcessingStats {
        self.shared.monitor().stats()
    }

    pub fn spoofing_observations(&self) -> Vec<SpoofingObservation> {
        self.shared.monitor().observations().to_vec()
    }

    pub fn spoofing_total(&self) -> u64 {
        self.shared.monitor().spoofing_total()
    }

    pub fn device_id(&self) -> &str {
        self.stream.device_id()
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    /// Stop detection, then release the camera. Idempotent.
    pub fn stop(&self) {
        self.scheduler.stop();
        self.stream.release();
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        self.stop();
    }
}
