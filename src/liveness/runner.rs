use super::check::{CheckStatus, LivenessCheckId, LivenessCheckState, Verdict};
use super::evaluator::{ChallengeEvaluator, ChallengeSample};
use super::session::{LivenessResult, LivenessSession};
use crate::camera::{CameraManager, FrameReader, PreviewSink, StreamHandle};
use crate::config::{LivecheckConfig, LivenessConfig};
use crate::detection::DetectorEngine;
use crate::errors::LivenessError;
use crate::scheduler::{Cadence, DetectionScheduler, StopSignal};
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::{interval_at, sleep, Instant};

const COUNTDOWN_STEP: Duration = Duration::from_secs(1);

/// What happened on one run, retry or skip of a check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckReport {
    pub check: LivenessCheckId,
    pub verdict: Verdict,
    pub attempts: u32,
    pub skipped: bool,
    /// Check to run next; the same check after a failure, `None` once complete
    pub next: Option<LivenessCheckId>,
    /// Set on the report that completed the session
    pub result: Option<LivenessResult>,
}

/// Serializable view of a running session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessSnapshot {
    pub checks: Vec<LivenessCheckState>,
    pub current: Option<LivenessCheckId>,
    pub progress_percent: u8,
    pub total_attempts: u32,
    pub complete: bool,
}

struct Shared {
    session: Mutex<LivenessSession>,
    samples: Mutex<Vec<ChallengeSample>>,
    reader: FrameReader,
    engine: Arc<DetectorEngine>,
}

impl Shared {
    fn session(&self) -> MutexGuard<'_, LivenessSession> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn samples(&self) -> MutexGuard<'_, Vec<ChallengeSample>> {
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sample(&self) {
        let sample = match self.reader.read_frame() {
            Ok(frame) => {
                let detection = self.engine.detect_best(&frame);
                ChallengeSample::measure(&frame, detection.as_ref())
            }
            Err(e) => {
                log::debug!("Liveness sample without frame: {}", e);
                ChallengeSample::absent()
            }
        };
        self.samples().push(sample);
    }
}

/// Stops sampling and rolls the check back if an attempt is abandoned midway.
struct AttemptGuard<'a> {
    shared: &'a Shared,
    sampler: &'a DetectionScheduler,
    armed: bool,
}

impl AttemptGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.sampler.stop();
            self.shared.session().abort_attempt();
            log::debug!("Liveness attempt abandoned");
        }
    }
}

/// Drives a [`LivenessSession`] in real time against the camera stream.
pub struct LivenessRunner {
    shared: Arc<Shared>,
    sampler: DetectionScheduler,
    evaluator: Arc<dyn ChallengeEvaluator>,
    config: LivenessConfig,
    stream: StreamHandle,
    stop_signal: StopSignal,
}

impl LivenessRunner {
    /// Acquire the camera for the liveness view.
    pub fn start(
        manager: &CameraManager,
        config: &LivecheckConfig,
        engine: Arc<DetectorEngine>,
        evaluator: Arc<dyn ChallengeEvaluator>,
    ) -> Result<Self, LivenessError> {
        let stream = manager.acquire(&config.camera.constraints())?;
        log::info!(
            "Liveness session started on {} with {} checks",
            stream.device_id(),
            config.liveness.checks.len()
        );

        Ok(Self {
            shared: Arc::new(Shared {
                session: Mutex::new(LivenessSession::new(&config.liveness)),
                samples: Mutex::new(Vec::new()),
                reader: stream.reader(),
                engine,
            }),
            sampler: DetectionScheduler::new(Cadence::Custom(
                config.scheduler.presence_interval(),
            )),
            evaluator,
            config: config.liveness.clone(),
            stream,
            stop_signal: StopSignal::new(),
        })
    }

    fn ensure_running(&self) -> Result<(), LivenessError> {
        if self.stop_signal.is_stopped() {
            return Err(LivenessError::Stopped);
        }
        Ok(())
    }

    pub fn attach_preview(&self, sink: PreviewSink) {
        self.stream.attach_sink(sink);
    }

    /// Countdown, detect and judge the current check.
    pub async fn run_current_check(&self) -> Result<CheckReport, LivenessError> {
        self.ensure_running()?;
        let (check, countdown) = {
            let mut session = self.shared.session();
            // A success whose display delay was interrupted has not advanced yet
            if session.current().map(|c| c.status) == Some(CheckStatus::Success)
                && session.advance()?.is_none()
            {
                return Err(LivenessError::SessionComplete);
            }
            session.begin_check()?
        };
        self.run_attempt(check, countdown).await
    }

    /// Run a failed check again.
    pub async fn retry(&self) -> Result<CheckReport, LivenessError> {
        self.ensure_running()?;
        let (check, countdown) = self.shared.session().retry()?;
        self.run_attempt(check, countdown).await
    }

    /// Give up on a failed check, when the configuration allows it.
    pub fn skip(&self) -> Result<CheckReport, LivenessError> {
        self.ensure_running()?;
        let mut session = self.shared.session();
        let check = session
            .current_id()
            .ok_or(LivenessError::SessionComplete)?;
        let next = session.skip()?;
        let attempts = session.checks().iter().find(|c| c.id == check).map_or(0, |c| c.attempts);

        Ok(CheckReport {
            check,
            verdict: Verdict::Failed,
            attempts,
            skipped: true,
            next,
            result: session.take_result(),
        })
    }

    async fn run_attempt(
        &self,
        check: LivenessCheckId,
        countdown: u8,
    ) -> Result<CheckReport, LivenessError> {
        let guard = AttemptGuard {
            shared: &self.shared,
            sampler: &self.sampler,
            armed: true,
        };
        log::info!("{}: {} (starting in {})", check.title(), check.instruction(), countdown);

        let mut ticker = interval_at(Instant::now() + COUNTDOWN_STEP, COUNTDOWN_STEP);
        loop {
            self.stop_signal
                .unless_stopped(ticker.tick())
                .await
                .ok_or(LivenessError::Stopped)?;
            if self.shared.session().countdown_tick()? == CheckStatus::Detecting {
                break;
            }
        }

        self.shared.samples().clear();
        let shared = self.shared.clone();
        self.sampler.start(move || {
            shared.sample();
            ControlFlow::Continue(())
        });
        self.stop_signal
            .unless_stopped(sleep(self.config.detection_duration(check)))
            .await
            .ok_or(LivenessError::Stopped)?;
        self.sampler.stop();
        self.ensure_running()?;

        let samples = std::mem::take(&mut *self.shared.samples());
        let verdict = self.evaluator.evaluate(check, &samples);
        log::debug!("{} judged {:?} from {} samples", check, verdict, samples.len());

        let (status, attempts) = {
            let mut session = self.shared.session();
            let status = session.finish_detection(verdict)?;
            let attempts = session.current().map_or(0, |c| c.attempts);
            (status, attempts)
        };
        guard.disarm();

        let mut report = CheckReport {
            check,
            verdict,
            attempts,
            skipped: false,
            next: Some(check),
            result: None,
        };

        if status == CheckStatus::Success {
            self.stop_signal
                .unless_stopped(sleep(self.config.success_display()))
                .await
                .ok_or(LivenessError::Stopped)?;
            let mut session = self.shared.session();
            if session.current_id() == Some(check) {
                report.next = session.advance()?;
                report.result = session.take_result();
            }
        }
        Ok(report)
    }

    /// Drive every check to completion, retrying each failed check up to
    /// `max_retries` times and skipping it afterwards when allowed.
    pub async fn run_session(&self, max_retries: u32) -> Result<LivenessResult, LivenessError> {
        loop {
            let mut report = self.run_current_check().await?;
            let mut retries = 0;
            while report.verdict == Verdict::Failed && !report.skipped {
                if retries < max_retries {
                    retries += 1;
                    report = self.retry().await?;
                } else if self.config.allow_skip {
                    report = self.skip()?;
                } else {
                    return Err(LivenessError::CheckFailed(report.check.to_string()));
                }
            }

            if let Some(result) = report.result {
                return Ok(result);
            }
            if report.next.is_none() {
                return self.take_result().ok_or(LivenessError::SessionComplete);
            }
        }
    }

    /// The aggregate result, if complete and not yet handed out. Always `None`
    /// once the runner is stopped.
    pub fn take_result(&self) -> Option<LivenessResult> {
        if self.ensure_running().is_err() {
            return None;
        }
        let mut session = self.shared.session();
        if session.current().map(|c| c.status) == Some(CheckStatus::Success) {
            if let Err(e) = session.advance() {
                log::debug!("Could not advance past displayed success: {}", e);
            }
        }
        session.take_result()
    }

    pub fn snapshot(&self) -> LivenessSnapshot {
        let session = self.shared.session();
        LivenessSnapshot {
            checks: session.checks().to_vec(),
            current: session.current_id(),
            progress_percent: session.progress_percent(),
            total_attempts: session.total_attempts(),
            complete: session.is_complete(),
        }
    }

    pub fn progress_percent(&self) -> u8 {
        self.shared.session().progress_percent()
    }

    pub fn is_sampling(&self) -> bool {
        self.sampler.is_running()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_signal.is_stopped()
    }

    /// Cancel any running attempt, stop sampling and release the camera.
    /// Idempotent.
    ///
    /// A check future still awaiting a timer resolves to
    /// [`LivenessError::Stopped`] without judging or advancing.
    pub fn stop(&self) {
        if self.stop_signal.stop() {
            log::info!("Liveness session stopped");
        }
        self.sampler.stop();
        self.stream.release();
        self.shared.session().abort_attempt();
    }
}

impl Drop for LivenessRunner {
    fn drop(&mut self) {
        self.stop();
    }
}
