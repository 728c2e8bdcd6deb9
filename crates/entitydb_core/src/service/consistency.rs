//! Bounded visibility polling over an eventually-consistent store.
//!
//! # Invariants
//! - Disabled waits perform no probe and no sleep.
//! - Elapsed time grows by one interval only after a post-sleep probe that
//!   still reports "not converged". The ordering fixes the number of sleeps
//!   at the budget boundary to `ceil(max_wait / poll_interval)`.
//! - Probe errors end the wait and propagate.

use crate::config::PersistenceConfig;
use crate::store::StoreResult;
use std::time::Duration;

/// Blocking pause between probes.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

impl<T: Sleeper + ?Sized> Sleeper for &T {
    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration);
    }
}

/// Blocks the calling thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Waiting is disabled by configuration.
    Skipped,
    Converged { sleeps: u32 },
    /// Budget spent without convergence; the caller logs the anomaly.
    TimedOut { sleeps: u32, waited: Duration },
}

/// Polling loop parameters plus the injected sleeper.
#[derive(Debug, Clone)]
pub struct ConsistencyWait<P = ThreadSleeper> {
    max_wait: Duration,
    poll_interval: Duration,
    sleeper: P,
}

impl ConsistencyWait {
    pub fn from_config(config: &PersistenceConfig) -> Self {
        Self::with_sleeper(config, ThreadSleeper)
    }
}

impl<P: Sleeper> ConsistencyWait<P> {
    pub fn with_sleeper(config: &PersistenceConfig, sleeper: P) -> Self {
        Self {
            max_wait: config.max_consistency_wait(),
            poll_interval: config.poll_interval(),
            sleeper,
        }
    }

    /// A zero interval would never exhaust the budget, so it disables waiting.
    pub fn is_enabled(&self) -> bool {
        !self.max_wait.is_zero() && !self.poll_interval.is_zero()
    }

    /// Polls `converged` until it reports `true` or the budget is spent.
    pub fn wait_until(
        &self,
        mut converged: impl FnMut() -> StoreResult<bool>,
    ) -> StoreResult<WaitOutcome> {
        if !self.is_enabled() {
            return Ok(WaitOutcome::Skipped);
        }

        let mut elapsed = Duration::ZERO;
        let mut sleeps = 0u32;
        let mut done = converged()?;

        while !done && elapsed < self.max_wait {
            self.sleeper.sleep(self.poll_interval);
            sleeps = sleeps.saturating_add(1);

            done = converged()?;
            if !done {
                elapsed += self.poll_interval;
            }
        }

        if elapsed >= self.max_wait {
            return Ok(WaitOutcome::TimedOut {
                sleeps,
                waited: elapsed,
            });
        }
        Ok(WaitOutcome::Converged { sleeps })
    }
}
