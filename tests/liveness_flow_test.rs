//! Liveness runner scenarios under paused tokio time

use livecheck::liveness::{
    ChallengeEvaluator, ChallengeSample, CheckStatus, LivenessCheckId, LivenessRunner,
    SignalEvaluator, Verdict,
};
use livecheck::testing::{FaceParams, SyntheticCamera};
use livecheck::{CameraManager, DetectorEngine, LivecheckConfig, LivenessError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use Verdict::{Failed, Success};

/// Hands out pre-recorded verdicts and remembers which checks asked for one.
#[derive(Default)]
struct ScriptedEvaluator {
    verdicts: Mutex<VecDeque<Verdict>>,
    asked: Mutex<Vec<(LivenessCheckId, usize)>>,
}

impl ScriptedEvaluator {
    fn new(verdicts: &[Verdict]) -> Arc<Self> {
        Arc::new(Self {
            verdicts: Mutex::new(verdicts.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        })
    }

    fn asked(&self) -> Vec<(LivenessCheckId, usize)> {
        self.asked.lock().unwrap().clone()
    }
}

impl ChallengeEvaluator for ScriptedEvaluator {
    fn evaluate(&self, check: LivenessCheckId, samples: &[ChallengeSample]) -> Verdict {
        self.asked.lock().unwrap().push((check, samples.len()));
        self.verdicts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Verdict::Failed)
    }
}

fn runner(
    config: &LivecheckConfig,
    camera: SyntheticCamera,
    evaluator: Arc<dyn ChallengeEvaluator>,
) -> (CameraManager, LivenessRunner) {
    let manager = CameraManager::new(Arc::new(camera));
    let runner = LivenessRunner::start(
        &manager,
        config,
        Arc::new(DetectorEngine::heuristic()),
        evaluator,
    )
    .unwrap();
    (manager, runner)
}

#[tokio::test(start_paused = true)]
async fn test_failed_check_retried_in_order() {
    let evaluator = ScriptedEvaluator::new(&[Success, Success, Failed, Success]);
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let result = runner.run_session(1).await.unwrap();
    assert!(result.all_passed());
    assert_eq!(result.total_attempts, 4);

    let order: Vec<_> = result.checks.iter().map(|c| c.id).collect();
    assert_eq!(order, LivenessCheckId::ALL.to_vec());
    let attempts: Vec<_> = result.checks.iter().map(|c| c.attempts).collect();
    assert_eq!(attempts, vec![1, 1, 2]);

    let asked: Vec<_> = evaluator.asked().into_iter().map(|(id, _)| id).collect();
    assert_eq!(
        asked,
        vec![
            LivenessCheckId::Blink,
            LivenessCheckId::Smile,
            LivenessCheckId::HeadTurn,
            LivenessCheckId::HeadTurn
        ]
    );

    // handed out exactly once
    assert!(runner.take_result().is_none());
    assert_eq!(runner.progress_percent(), 100);
}

#[tokio::test(start_paused = true)]
async fn test_detection_windows_follow_check_durations() {
    let evaluator = ScriptedEvaluator::new(&[Success, Success, Success]);
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let started = tokio::time::Instant::now();
    runner.run_session(0).await.unwrap();

    // three 3s countdowns, 5s + 3s + 6s of detection, three 1.5s success displays
    assert_eq!(started.elapsed(), Duration::from_millis(9_000 + 14_000 + 4_500));

    for (check, samples) in evaluator.asked() {
        let expected = match check {
            LivenessCheckId::Blink => 50,
            LivenessCheckId::Smile => 30,
            LivenessCheckId::HeadTurn => 60,
        };
        assert!(
            samples.abs_diff(expected) <= 1,
            "{} collected {} samples",
            check,
            samples
        );
    }
}

#[tokio::test(start_paused = true)]
async fn test_single_check_report_flow() {
    let evaluator = ScriptedEvaluator::new(&[Failed, Success]);
    let mut config = LivecheckConfig::default();
    config.liveness.checks = vec![LivenessCheckId::Smile];
    let (_manager, runner) = runner(&config, SyntheticCamera::new(160, 120), evaluator);

    let report = runner.run_current_check().await.unwrap();
    assert_eq!(report.verdict, Failed);
    assert_eq!(report.next, Some(LivenessCheckId::Smile));
    assert!(report.result.is_none());
    assert_eq!(runner.snapshot().checks[0].status, CheckStatus::Failed);

    // a failed check can only be retried
    assert!(matches!(
        runner.run_current_check().await,
        Err(LivenessError::InvalidState(_))
    ));

    let report = runner.retry().await.unwrap();
    assert_eq!(report.verdict, Success);
    assert_eq!(report.attempts, 2);
    assert_eq!(report.next, None);
    let result = report.result.unwrap();
    assert_eq!(result.total_attempts, 2);
    assert!(runner.snapshot().complete);
}

#[tokio::test(start_paused = true)]
async fn test_skip_disabled_by_default() {
    let evaluator = ScriptedEvaluator::new(&[Failed, Failed]);
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator,
    );

    runner.run_current_check().await.unwrap();
    assert!(matches!(runner.skip(), Err(LivenessError::SkipDisabled)));
    assert!(matches!(
        runner.run_session(0).await,
        Err(LivenessError::InvalidState(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn test_session_gives_up_without_skip() {
    let evaluator = ScriptedEvaluator::new(&[Failed, Failed]);
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator,
    );

    match runner.run_session(1).await {
        Err(LivenessError::CheckFailed(check)) => assert_eq!(check, "blink"),
        other => panic!("expected CheckFailed, got {:?}", other),
    }
    assert_eq!(runner.snapshot().total_attempts, 2);
}

#[tokio::test(start_paused = true)]
async fn test_skip_completes_check_as_failed() {
    let evaluator = ScriptedEvaluator::new(&[Success, Failed, Success]);
    let mut config = LivecheckConfig::default();
    config.liveness.allow_skip = true;
    let (_manager, runner) = runner(&config, SyntheticCamera::new(160, 120), evaluator);

    let result = runner.run_session(0).await.unwrap();
    assert!(!result.all_passed());

    let smile = &result.checks[1];
    assert_eq!(smile.id, LivenessCheckId::Smile);
    assert!(smile.skipped);
    assert!(!smile.passed);
    assert_eq!(smile.attempts, 2);
    assert_eq!(result.total_attempts, 4);
    assert!(runner.take_result().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_attempt_rolls_back() {
    let evaluator = ScriptedEvaluator::new(&[Success]);
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let cancelled =
        tokio::time::timeout(Duration::from_millis(4_000), runner.run_current_check()).await;
    assert!(cancelled.is_err());
    assert!(!runner.is_sampling());
    assert_eq!(runner.snapshot().checks[0].status, CheckStatus::Idle);
    assert_eq!(runner.snapshot().total_attempts, 0);
    assert!(evaluator.asked().is_empty());

    let report = runner.run_current_check().await.unwrap();
    assert_eq!(report.verdict, Success);
    assert_eq!(report.next, Some(LivenessCheckId::Smile));
}

#[tokio::test(start_paused = true)]
async fn test_stop_releases_camera() {
    let evaluator = ScriptedEvaluator::new(&[]);
    let (manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(160, 120),
        evaluator,
    );
    assert!(manager.is_streaming());
    runner.stop();
    assert!(!manager.is_streaming());
}

fn single_blink_config() -> LivecheckConfig {
    let mut config = LivecheckConfig::default();
    config.liveness.checks = vec![LivenessCheckId::Blink];
    config
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_countdown_ends_attempt_at_once() {
    let evaluator = ScriptedEvaluator::new(&[Success]);
    let (manager, runner) = runner(
        &single_blink_config(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let run = runner.run_current_check();
    tokio::pin!(run);
    tokio::select! {
        _ = &mut run => panic!("check finished during the countdown"),
        _ = tokio::time::sleep(Duration::from_millis(1500)) => {}
    }

    let stopped_at = tokio::time::Instant::now();
    runner.stop();
    assert!(matches!(run.await, Err(LivenessError::Stopped)));
    assert_eq!(stopped_at.elapsed(), Duration::ZERO);
    assert!(!manager.is_streaming());
    assert_eq!(runner.snapshot().checks[0].status, CheckStatus::Idle);
    assert!(evaluator.asked().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_detection_skips_verdict() {
    let evaluator = ScriptedEvaluator::new(&[Success]);
    let (_manager, runner) = runner(
        &single_blink_config(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let run = runner.run_current_check();
    tokio::pin!(run);
    // countdown ends at 3s, the blink window runs until 8s
    tokio::select! {
        _ = &mut run => panic!("check finished during detection"),
        _ = tokio::time::sleep(Duration::from_millis(5_000)) => {}
    }
    assert!(runner.is_sampling());

    runner.stop();
    assert!(matches!(run.await, Err(LivenessError::Stopped)));
    assert!(!runner.is_sampling());
    assert!(evaluator.asked().is_empty());

    let snapshot = runner.snapshot();
    assert_eq!(snapshot.checks[0].status, CheckStatus::Idle);
    assert_eq!(snapshot.total_attempts, 0);
    assert!(matches!(
        runner.run_current_check().await,
        Err(LivenessError::Stopped)
    ));
}

#[tokio::test(start_paused = true)]
async fn test_stop_during_success_display_emits_no_result() {
    let evaluator = ScriptedEvaluator::new(&[Success]);
    let (_manager, runner) = runner(
        &single_blink_config(),
        SyntheticCamera::new(160, 120),
        evaluator.clone(),
    );

    let run = runner.run_current_check();
    tokio::pin!(run);
    // verdict at 8s, success shown until 9.5s
    tokio::select! {
        _ = &mut run => panic!("check finished during the success display"),
        _ = tokio::time::sleep(Duration::from_millis(8_500)) => {}
    }
    assert_eq!(evaluator.asked().len(), 1);

    runner.stop();
    assert!(matches!(run.await, Err(LivenessError::Stopped)));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(runner.is_stopped());
    assert!(runner.take_result().is_none());
    assert!(matches!(runner.skip(), Err(LivenessError::Stopped)));
    assert_eq!(evaluator.asked().len(), 1);
}

/// A subject that blinks during the first window, smiles during the second
/// and turns the head back and forth during the third.
fn cooperative_subject() -> SyntheticCamera {
    SyntheticCamera::new(320, 240).with_script(Arc::new(|index| {
        Some(match index {
            20..=22 => FaceParams::blinking(),
            60..=70 => FaceParams::smiling(),
            i if i >= 85 => FaceParams::turned(if i % 2 == 0 { -0.08 } else { 0.08 }),
            _ => FaceParams::default(),
        })
    }))
}

#[tokio::test(start_paused = true)]
async fn test_signal_evaluator_passes_cooperative_subject() {
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        cooperative_subject(),
        Arc::new(SignalEvaluator::default()),
    );

    let result = runner.run_session(0).await.unwrap();
    assert!(result.all_passed());
    assert_eq!(result.total_attempts, 3);
}

#[tokio::test(start_paused = true)]
async fn test_signal_evaluator_fails_still_subject() {
    let (_manager, runner) = runner(
        &LivecheckConfig::default(),
        SyntheticCamera::new(320, 240),
        Arc::new(SignalEvaluator::default()),
    );

    let report = runner.run_current_check().await.unwrap();
    assert_eq!(report.check, LivenessCheckId::Blink);
    assert_eq!(report.verdict, Failed);
}
