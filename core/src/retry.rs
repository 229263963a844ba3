//! Bounded retry with a fixed sleep between attempts.
//!
//! Every retry loop on the orchestrator side goes through `RetryPolicy`
//! instead of re-deriving the pattern per call site. Retries are always
//! local to one node's single step; exhausting the budget is that step's
//! terminal failure.

use std::time::Duration;

use log::warn;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    max_attempts: u32,
    sleep: Duration,
}

impl RetryPolicy {
    /// A policy with `max_attempts` tries and `sleep` between them.
    /// `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, sleep: Duration) -> Self {
        RetryPolicy {
            max_attempts: max_attempts.max(1),
            sleep,
        }
    }

    /// Single attempt, no sleep.
    pub fn once() -> Self {
        RetryPolicy::new(1, Duration::ZERO)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` until it succeeds or the attempt budget is exhausted.
    /// The first failure is logged as a warning; only the last is returned.
    pub fn run<T, E, F>(&self, what: &str, op: F) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
    {
        self.run_if(what, op, |_| true)
    }

    /// Like `run`, but `retryable` classifies which errors are worth another
    /// attempt; a non-retryable error is returned immediately.
    pub fn run_if<T, E, F, C>(&self, what: &str, mut op: F, retryable: C) -> Result<T, E>
    where
        E: std::fmt::Display,
        F: FnMut(u32) -> Result<T, E>,
        C: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        loop {
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !retryable(&e) {
                        return Err(e);
                    }
                    if attempt == 1 {
                        warn!("{} failed, retrying: {}", what, e);
                    }
                    if !self.sleep.is_zero() {
                        std::thread::sleep(self.sleep);
                    }
                }
            }
        }
    }
}
