use crate::session_log::{LogSink, Severity};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Fire-and-forget decorative effect. Must tolerate being called repeatedly.
pub trait Decor: Send + Sync {
    fn strike(&self);
}

/// Timed repeating effect started by the sentinel query.
///
/// Only one run exists at a time; triggering while a run is active is ignored.
/// A run ends only when its duration expires.
pub struct Diversion {
    decor: Arc<dyn Decor>,
    log: Arc<dyn LogSink>,
    duration: Duration,
    period: Duration,
    task: Option<JoinHandle<()>>,
}

impl Diversion {
    pub fn new(
        decor: Arc<dyn Decor>,
        log: Arc<dyn LogSink>,
        duration: Duration,
        period: Duration,
    ) -> Self {
        Self {
            decor,
            log,
            duration,
            period,
            task: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Returns `false` when a run is already active.
    pub fn trigger(&mut self) -> bool {
        if self.is_active() {
            tracing::debug!("diversion already running, trigger ignored");
            return false;
        }

        let decor = Arc::clone(&self.decor);
        let log = Arc::clone(&self.log);
        let period = self.period.max(Duration::from_millis(1));
        let start = Instant::now();
        let deadline = start + self.duration;

        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(start + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut strikes = 0u64;
            loop {
                ticker.tick().await;
                if Instant::now() > deadline {
                    break;
                }
                decor.strike();
                strikes += 1;
            }
            tracing::debug!(strikes, "diversion expired");
            log.append("diversion finished", Severity::Info);
        }));
        true
    }
}

impl Drop for Diversion {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
