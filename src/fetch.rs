// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Retrying download helper.
//!
//! Installer scripts come off the network, and the network flakes. This
//! module wraps a single-shot [`Fetcher`] in a fixed retry loop: at most
//! `max_attempts` tries, with a fixed sleep between consecutive tries, and
//! nothing fancier. No backoff curves, no jitter, no timeouts. Bootstrap
//! runs interactively and the user is watching.
//!
//! The actual transfer is delegated to curl rather than an HTTP client
//! crate. The original bootstrap flow is glue over external tools, and curl
//! is the one tool guaranteed to be present on the machines rigup targets.

use crate::proc::{self, ProcError};

use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};
use tracing::{debug, warn};

/// Fixed retry policy for downloads.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct RetryPolicy {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,

    /// Seconds to sleep between consecutive attempts.
    pub sleep_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            sleep_secs: 2,
        }
    }
}

/// Download a URL to a destination path in one attempt.
///
/// Layer of indirection over the transfer tool so retry behavior can be
/// exercised without a network.
pub trait Fetcher {
    /// Fetch target URL into destination file.
    ///
    /// # Errors
    ///
    /// - Return [`FetchError`] if the transfer fails for any reason.
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Fetcher backed by the curl binary.
#[derive(Debug, Default)]
pub struct CurlFetcher;

impl CurlFetcher {
    /// Construct new curl-backed fetcher.
    pub fn new() -> Self {
        Self
    }
}

impl Fetcher for CurlFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        if !proc::command_on_path("curl") {
            return Err(FetchError::MissingCurl);
        }

        debug!("curl {url} -> {:?}", dest.display());
        proc::run_captured(
            "curl",
            [
                "-fsSL",
                "--output",
                dest.to_string_lossy().as_ref(),
                url,
            ],
        )?;

        Ok(())
    }
}

/// Fetch target URL into destination file, retrying on failure.
///
/// Attempts the fetch up to `policy.max_attempts` times, sleeping
/// `policy.sleep_secs` between consecutive attempts. Returns after the first
/// success, so a fetch succeeding on attempt `k` makes exactly `k` attempts.
/// A spinner keeps the user informed during the wait.
///
/// # Errors
///
/// - Return [`FetchError::RetriesExhausted`] once every attempt has failed.
pub async fn fetch_with_retry(
    fetcher: &dyn Fetcher,
    url: impl AsRef<str>,
    dest: impl AsRef<Path>,
    policy: RetryPolicy,
) -> Result<()> {
    let url = url.as_ref();
    let dest = dest.as_ref();
    let max_attempts = policy.max_attempts.max(1);

    let bar = ProgressBar::new_spinner();
    bar.set_message(url.to_string());
    bar.enable_steady_tick(Duration::from_millis(100));

    for attempt in 1..=max_attempts {
        match fetcher.fetch(url, dest) {
            Ok(()) => {
                bar.finish_and_clear();
                debug!("fetched {url} on attempt {attempt}/{max_attempts}");
                return Ok(());
            }
            Err(error) => {
                warn!("attempt {attempt}/{max_attempts} failed for {url}: {error}");
                if attempt < max_attempts {
                    tokio::time::sleep(Duration::from_secs(policy.sleep_secs)).await;
                }
            }
        }
    }

    bar.finish_and_clear();
    Err(FetchError::RetriesExhausted {
        url: url.to_string(),
        attempts: max_attempts,
    })
}

/// Download error types.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The curl binary is absent from PATH.
    #[error("curl is required for downloads, but was not found on PATH")]
    MissingCurl,

    /// Transfer process failed.
    #[error(transparent)]
    Proc(#[from] ProcError),

    /// Every configured attempt failed.
    #[error("gave up fetching {url} after {attempts} attempts")]
    RetriesExhausted { url: String, attempts: u32 },
}

/// Friendly result alias :3
pub type Result<T, E = FetchError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;
    use std::cell::Cell;

    /// Fetcher that fails until a chosen attempt, counting calls.
    struct FlakyFetcher {
        calls: Cell<u32>,
        succeed_on: Option<u32>,
    }

    impl FlakyFetcher {
        fn never_succeeds() -> Self {
            Self {
                calls: Cell::new(0),
                succeed_on: None,
            }
        }

        fn succeeds_on(attempt: u32) -> Self {
            Self {
                calls: Cell::new(0),
                succeed_on: Some(attempt),
            }
        }
    }

    impl Fetcher for FlakyFetcher {
        fn fetch(&self, url: &str, _dest: &Path) -> Result<()> {
            let call = self.calls.get() + 1;
            self.calls.set(call);

            match self.succeed_on {
                Some(attempt) if call >= attempt => Ok(()),
                _ => Err(FetchError::RetriesExhausted {
                    url: url.to_string(),
                    attempts: call,
                }),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_fetch_attempts_exactly_max() {
        let fetcher = FlakyFetcher::never_succeeds();
        let policy = RetryPolicy {
            max_attempts: 4,
            sleep_secs: 2,
        };

        let result = fetch_with_retry(&fetcher, "https://blah.org/x", "blah", policy).await;

        assert!(matches!(
            result,
            Err(FetchError::RetriesExhausted { attempts: 4, .. })
        ));
        assert_eq!(fetcher.calls.get(), 4);
    }

    #[test_case(1; "first attempt")]
    #[test_case(2; "second attempt")]
    #[test_case(3; "final attempt")]
    #[tokio::test(start_paused = true)]
    async fn fetch_succeeding_on_attempt_k_makes_k_attempts(k: u32) {
        let fetcher = FlakyFetcher::succeeds_on(k);
        let policy = RetryPolicy {
            max_attempts: 3,
            sleep_secs: 1,
        };

        let result = fetch_with_retry(&fetcher, "https://blah.org/x", "blah", policy).await;

        assert!(result.is_ok());
        assert_eq!(fetcher.calls.get(), k);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_attempt_policy_still_tries_once() {
        let fetcher = FlakyFetcher::succeeds_on(1);
        let policy = RetryPolicy {
            max_attempts: 0,
            sleep_secs: 0,
        };

        let result = fetch_with_retry(&fetcher, "https://blah.org/x", "blah", policy).await;

        assert!(result.is_ok());
        assert_eq!(fetcher.calls.get(), 1);
    }
}
