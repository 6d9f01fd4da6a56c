//! Liveness challenges
//!
//! A fixed sequence of blink, smile and head-turn checks, each preceded by a
//! countdown and judged over a timed detection window.

pub mod check;
pub mod evaluator;
pub mod runner;
pub mod session;

pub use check::{CheckStatus, LivenessCheckId, LivenessCheckState, Verdict};
pub use evaluator::{ChallengeEvaluator, ChallengeSample, EvaluatorThresholds, SignalEvaluator};
pub use runner::{CheckReport, LivenessRunner, LivenessSnapshot};
pub use session::{CheckOutcome, LivenessResult, LivenessSession};
