use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};

const TICK: Duration = Duration::from_secs(1);

/// Whole-second stopwatch for challenges, driven by a tokio interval task.
///
/// `stop` freezes the reading and aborts the task, `discard` aborts it and
/// zeroes the reading. Dropping the timer aborts the task as well.
#[derive(Debug)]
pub struct SessionTimer {
    elapsed: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
    frozen: Option<u64>,
}

impl SessionTimer {
    /// Starts ticking one second from now. Must be called inside a tokio runtime.
    #[must_use]
    pub fn start() -> Self {
        let elapsed = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&elapsed);
        let task = tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + TICK, TICK);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticks.tick().await;
                counter.fetch_add(1, Ordering::Relaxed);
            }
        });
        Self {
            elapsed,
            task: Some(task),
            frozen: None,
        }
    }

    /// A timer that never ticks, for untimed topic sessions.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            elapsed: Arc::new(AtomicU64::new(0)),
            task: None,
            frozen: None,
        }
    }

    #[must_use]
    pub fn elapsed_seconds(&self) -> u64 {
        self.frozen
            .unwrap_or_else(|| self.elapsed.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.is_some() && self.frozen.is_none()
    }

    /// Stops the timer and returns the frozen reading. Repeated calls return
    /// the same value.
    pub fn stop(&mut self) -> u64 {
        if let Some(frozen) = self.frozen {
            return frozen;
        }
        if let Some(task) = self.task.take() {
            task.abort();
        }
        let value = self.elapsed.load(Ordering::Relaxed);
        self.frozen = Some(value);
        value
    }

    /// Stops the timer and drops its count; later reads return zero.
    pub fn discard(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.frozen = Some(0);
    }
}

impl Drop for SessionTimer {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn counts_whole_seconds_and_freezes_on_stop() {
        let mut timer = SessionTimer::start();
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert_eq!(timer.elapsed_seconds(), 3);
        assert!(timer.is_running());

        assert_eq!(timer.stop(), 3);
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(timer.elapsed_seconds(), 3);
        assert_eq!(timer.stop(), 3);
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn discarded_timer_reads_zero() {
        let mut timer = SessionTimer::start();
        tokio::time::sleep(Duration::from_millis(4_200)).await;
        timer.discard();
        assert!(!timer.is_running());
        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(timer.elapsed_seconds(), 0);
        assert_eq!(timer.stop(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_timer_stays_at_zero() {
        let mut timer = SessionTimer::disabled();
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(timer.elapsed_seconds(), 0);
        assert!(!timer.is_running());
        assert_eq!(timer.stop(), 0);
    }
}
