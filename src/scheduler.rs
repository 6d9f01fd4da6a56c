//! Detection loop scheduling
//!
//! A [`DetectionScheduler`] runs one synchronous callback at a fixed cadence on
//! the current tokio runtime. Every invocation happens under the scheduler's
//! gate lock, and `stop()` takes the same lock, so once `stop()` returns no
//! callback is running and none will run again.
//!
//! Callbacks must not call back into their own scheduler; to end the loop
//! from inside, return `ControlFlow::Break(())`.

use std::future::Future;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Sampling cadence of a detection loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    /// Continuous face presence, 100ms
    Presence,
    /// Quality polling while capturing, 500ms
    QualityPoll,
    Custom(Duration),
}

impl Cadence {
    pub fn period(&self) -> Duration {
        match self {
            Cadence::Presence => Duration::from_millis(100),
            Cadence::QualityPoll => Duration::from_millis(500),
            Cadence::Custom(period) => *period,
        }
    }
}

#[derive(Default)]
struct Gate {
    running: bool,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

pub struct DetectionScheduler {
    period: Duration,
    gate: Arc<Mutex<Gate>>,
    ticks: Arc<AtomicU64>,
}

impl DetectionScheduler {
    pub fn new(cadence: Cadence) -> Self {
        Self {
            period: cadence.period().max(Duration::from_millis(1)),
            gate: Arc::new(Mutex::new(Gate::default())),
            ticks: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    fn lock(&self) -> MutexGuard<'_, Gate> {
        self.gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Start the loop. Returns `false` when already running (the call is a
    /// no-op) or when there is no tokio runtime to run on.
    ///
    /// The first invocation happens one period after start.
    pub fn start<F>(&self, mut callback: F) -> bool
    where
        F: FnMut() -> ControlFlow<()> + Send + 'static,
    {
        let mut gate = self.lock();
        if gate.running {
            log::debug!("Detection loop already running, start ignored");
            return false;
        }

        let runtime = match Handle::try_current() {
            Ok(runtime) => runtime,
            Err(e) => {
                log::error!("Cannot start detection loop outside a tokio runtime: {}", e);
                return false;
            }
        };

        gate.generation += 1;
        gate.running = true;
        let generation = gate.generation;
        let period = self.period;
        let shared = self.gate.clone();
        let ticks = self.ticks.clone();

        gate.task = Some(runtime.spawn(async move {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let mut gate = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if !gate.running || gate.generation != generation {
                    return;
                }

                ticks.fetch_add(1, Ordering::SeqCst);
                if callback().is_break() {
                    log::debug!("Detection loop requested its own stop");
                    gate.running = false;
                    gate.task = None;
                    return;
                }
            }
        }));

        log::debug!("Detection loop started at {:?}", period);
        true
    }

    /// Cancel the loop. Blocks until an in-flight callback finishes; no
    /// callback fires after this returns. Returns `false` if it was not running.
    pub fn stop(&self) -> bool {
        let mut gate = self.lock();
        if !gate.running {
            return false;
        }
        gate.running = false;
        gate.generation += 1;
        if let Some(task) = gate.task.take() {
            task.abort();
        }
        log::debug!("Detection loop stopped");
        true
    }

    pub fn is_running(&self) -> bool {
        self.lock().running
    }

    /// Total callback invocations since creation
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

/// One-way teardown flag that in-flight timer waits can race against.
#[derive(Debug)]
pub struct StopSignal {
    tx: watch::Sender<bool>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            tx: watch::channel(false).0,
        }
    }

    /// Raise the flag. Returns `true` only for the call that raised it.
    pub fn stop(&self) -> bool {
        !self.tx.send_replace(true)
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolve `fut`, or `None` as soon as the flag is raised. A flag raised
    /// before the call wins even if `fut` is already ready.
    pub async fn unless_stopped<F: Future>(&self, fut: F) -> Option<F::Output> {
        let mut rx = self.tx.subscribe();
        let stopped = async move {
            // errs only when the sender is gone, and `self` holds it
            let _ = rx.wait_for(|stopped| *stopped).await;
        };
        tokio::select! {
            biased;
            _ = stopped => None,
            output = fut => Some(output),
        }
    }
}
