//! Bounded retry helper shared by every bootloader exchange.

use crate::error::{Error, Result};
use log::{debug, warn};

/// Attempt ceiling for connection-level exchanges.
pub const CONNECTION_RETRIES: u32 = 10;

/// Line ceiling for best-effort status drains.
pub const DRAIN_LINES: u32 = 5;

/// Result of one attempt of a retried step.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The step succeeded.
    Done(T),
    /// The step failed in a retryable way (negative or missing reply).
    Retry(String),
}

/// Bounded attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    ceiling: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(CONNECTION_RETRIES)
    }
}

impl RetryPolicy {
    /// Create a policy allowing `ceiling` attempts (at least one).
    pub fn new(ceiling: u32) -> Self {
        Self {
            ceiling: ceiling.max(1),
        }
    }

    /// Maximum number of attempts.
    pub fn ceiling(&self) -> u32 {
        self.ceiling
    }

    /// Run `step` until it returns [`Attempt::Done`] or the ceiling is reached.
    ///
    /// `step` receives the 1-based attempt number. Errors returned by `step`
    /// abort immediately without further attempts.
    pub fn run<T, F>(&self, what: &str, mut step: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<Attempt<T>>,
    {
        for attempt in 1..=self.ceiling {
            match step(attempt)? {
                Attempt::Done(value) => {
                    if attempt > 1 {
                        debug!("{what} succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                },
                Attempt::Retry(reason) => {
                    warn!("{what}: {reason} (attempt {attempt}/{})", self.ceiling);
                },
            }
        }

        Err(Error::RetriesExhausted {
            what: what.to_string(),
            attempts: self.ceiling,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_succeeds_first_attempt() {
        let mut calls = 0;
        let value = RetryPolicy::new(10)
            .run("step", |_| {
                calls += 1;
                Ok(Attempt::Done(7))
            })
            .unwrap();
        assert_eq!(value, 7);
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_succeeds_after_retries() {
        let value = RetryPolicy::new(10)
            .run("step", |attempt| {
                Ok(if attempt < 4 {
                    Attempt::Retry("nack".into())
                } else {
                    Attempt::Done(attempt)
                })
            })
            .unwrap();
        assert_eq!(value, 4);
    }

    #[test]
    fn test_exhaustion_after_exactly_ceiling() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::new(10).run("header", |_| {
            calls += 1;
            Ok(Attempt::Retry("nack".into()))
        });
        assert_eq!(calls, 10);
        match result {
            Err(Error::RetriesExhausted { what, attempts }) => {
                assert_eq!(what, "header");
                assert_eq!(attempts, 10);
            },
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_error_aborts_immediately() {
        let mut calls = 0;
        let result: Result<()> = RetryPolicy::new(10).run("step", |_| {
            calls += 1;
            Err(Error::Timeout("port closed".into()))
        });
        assert_eq!(calls, 1);
        assert!(matches!(result, Err(Error::Timeout(_))));
    }

    #[test]
    fn test_zero_ceiling_still_attempts_once() {
        assert_eq!(RetryPolicy::new(0).ceiling(), 1);
    }
}
