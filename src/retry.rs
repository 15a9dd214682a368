//! Bounded retry for operations whose failure text matches a pattern.

use std::fmt::Display;
use std::thread;
use std::time::Duration;

use log::warn;
use regex_lite::Regex;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_SLEEP: Duration = Duration::from_secs(5);

/// Retries an operation while its rendered error matches a regular
/// expression.
///
/// Non-matching errors propagate immediately; matching errors are retried
/// with a fixed delay until the budget is exhausted. The sleep blocks the
/// calling thread and there is no backoff growth. Classification is textual,
/// so the wrapped operation's error messages must stay stable and
/// descriptive.
pub struct RetryPolicy {
    pattern: Regex,
    max_retries: u32,
    sleep: Duration,
}

impl RetryPolicy {
    pub fn new(pattern: &str) -> Result<Self, regex_lite::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            max_retries: DEFAULT_MAX_RETRIES,
            sleep: DEFAULT_SLEEP,
        })
    }

    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn sleep(mut self, sleep: Duration) -> Self {
        self.sleep = sleep;
        self
    }

    /// Invoke `op` until it succeeds, it fails with a non-matching error,
    /// or the budget runs out. At most `max_retries + 1` invocations.
    pub fn run<T, E, F>(&self, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        E: Display,
    {
        let mut retries = 0;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(error) => {
                    let text = error.to_string();
                    if !self.pattern.is_match(&text) || retries >= self.max_retries {
                        return Err(error);
                    }
                    retries += 1;
                    warn!(
                        "transient failure, retrying ({retries}/{}): {text}",
                        self.max_retries
                    );
                    thread::sleep(self.sleep);
                }
            }
        }
    }
}
