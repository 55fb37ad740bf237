#![forbid(unsafe_code)]

//! Bounded retry for page fetches that fail transiently.
//!
//! Comment pages of large videos fail often and for no stable reason; most of
//! them succeed if asked again. The policy retries every error up to a fixed
//! bound, except the ones that halt the run (auth, quota), samples its log
//! output, and after a long run of failures asks for
//! smaller pages on the assumption that the page size itself is the problem.
//! That last step is a heuristic, not a known fix.

use std::thread;
use std::time::Duration;

use serde::Deserialize;
use tracing::{info, warn};

use crate::error::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 1000;
pub const DEFAULT_DEGRADE_AFTER: u32 = 200;
pub const DEFAULT_DEGRADED_PAGE_SIZE: u32 = 20;
pub const DEFAULT_LOG_FIRST: u32 = 3;
pub const DEFAULT_LOG_EVERY: u32 = 10;

/// Tunables of the retry loop. Deserialized from the `[retry]` table of the
/// tuning file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Consecutive failures after which every further attempt asks for the
    /// degraded page size.
    pub degrade_after: u32,
    pub degraded_page_size: u32,
    /// Attempts logged unconditionally before sampling kicks in.
    pub log_first: u32,
    pub log_every: u32,
    /// Pause between attempts. Zero retries immediately.
    pub delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            degrade_after: DEFAULT_DEGRADE_AFTER,
            degraded_page_size: DEFAULT_DEGRADED_PAGE_SIZE,
            log_first: DEFAULT_LOG_FIRST,
            log_every: DEFAULT_LOG_EVERY,
            delay_ms: 0,
        }
    }
}

/// Result of a retry sequence. Exhaustion is a value, not an error: the
/// caller decides whether partial data is good enough.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Fetched { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: FetchError },
    /// An error no retry can fix; returned on the attempt that saw it.
    Halted { attempts: u32, error: FetchError },
}

impl RetryPolicy {
    /// Page size to request on the given zero-based attempt.
    pub fn page_size_for(&self, attempt: u32, requested: u32) -> u32 {
        if attempt >= self.degrade_after {
            requested.min(self.degraded_page_size).max(1)
        } else {
            requested
        }
    }

    fn should_log(&self, attempt: u32) -> bool {
        attempt < self.log_first || (self.log_every > 0 && attempt % self.log_every == 0)
    }

    /// Runs `fetch` until it succeeds, `max_attempts` calls have failed, or
    /// a failure halts the run.
    /// `fetch` receives the page size to ask for. `context` only feeds log
    /// lines.
    pub fn run<T>(
        &self,
        context: &str,
        page_size: u32,
        mut fetch: impl FnMut(u32) -> Result<T, FetchError>,
    ) -> RetryOutcome<T> {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let size = self.page_size_for(attempt, page_size);
            match fetch(size) {
                Ok(value) => {
                    if attempt > 0 {
                        info!(%context, attempts = attempt + 1, "page collected after failure");
                    }
                    return RetryOutcome::Fetched {
                        value,
                        attempts: attempt + 1,
                    };
                }
                Err(err) if err.halts_run() => {
                    warn!(%context, attempt = attempt + 1, error = %err, "page fetch cannot be retried");
                    return RetryOutcome::Halted {
                        attempts: attempt + 1,
                        error: err,
                    };
                }
                Err(err) => {
                    if self.should_log(attempt) {
                        warn!(
                            %context,
                            attempt = attempt + 1,
                            max_attempts,
                            page_size = size,
                            error = %err,
                            "page fetch failed, retrying"
                        );
                    }
                    last_error = Some(err);
                }
            }
            if self.delay_ms > 0 && attempt + 1 < max_attempts {
                thread::sleep(Duration::from_millis(self.delay_ms));
            }
        }

        RetryOutcome::Exhausted {
            attempts: max_attempts,
            last_error: last_error.unwrap_or(FetchError::Missing("a response")),
        }
    }
}
