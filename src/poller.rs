//! Generic repeating status-check primitive used by the job pipelines.

use anyhow::{Result, anyhow};
use std::{fmt, future::Future, time::Duration};
use tokio::task::JoinHandle;

/// Decision returned by the judge closure after each fetch.
#[derive(Debug)]
pub enum Verdict<T> {
    /// Keep polling.
    Continue,
    /// Terminal condition reached; resolve with this value.
    Done(T),
    /// Terminal failure reported by the backend; reject.
    Fail(String),
}

/// Attempt cap exhausted without reaching a terminal condition.
///
/// Kept as its own error type so callers can tell a verification timeout
/// apart from a backend-reported failure via `anyhow::Error::is`.
#[derive(Debug)]
pub struct PollTimeout {
    /// Number of attempts that were made.
    pub attempts: u32,
}

impl fmt::Display for PollTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "poll gave up after {} attempts", self.attempts)
    }
}

impl std::error::Error for PollTimeout {}

/// Repeating check with a fixed interval and an optional attempt cap.
///
/// The three lifecycle phases use different intervals because their
/// expected latencies differ: seconds for an integrity-scan check,
/// tens of seconds for multi-page OCR and translation.
pub struct Poller {
    interval: Duration,
    max_attempts: Option<u32>,
}

impl Poller {
    /// Waiting for the backend to finish integrity/MIME verification.
    /// Uncapped: server-side scanning has no fixed upper bound.
    pub fn payability() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: None,
        }
    }

    /// Waiting for the payment provider's webhook to be confirmed.
    /// Capped at exactly 10 attempts (~30s).
    pub fn webhook_verification() -> Self {
        Self {
            interval: Duration::from_secs(3),
            max_attempts: Some(10),
        }
    }

    /// Tracking translation progress until the job completes.
    pub fn translation_progress() -> Self {
        Self {
            interval: Duration::from_secs(40),
            max_attempts: None,
        }
    }

    /// Custom interval/cap, used by tests.
    #[cfg(test)]
    pub fn with(interval: Duration, max_attempts: Option<u32>) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Run the poll loop until the judge reaches a verdict.
    ///
    /// The first fetch happens immediately; later attempts are separated
    /// by the configured interval. A fetch error terminates the loop and
    /// propagates unchanged; transient-error recovery is the caller's job.
    pub async fn run<T, U, F, Fut, J>(&self, mut fetch: F, mut judge: J) -> Result<U>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        J: FnMut(&T) -> Verdict<U>,
    {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let payload = fetch().await?;
            match judge(&payload) {
                Verdict::Done(out) => {
                    tracing::info!("poll done after {attempts} attempts");
                    return Ok(out);
                }
                Verdict::Fail(reason) => {
                    tracing::warn!("poll failed after {attempts} attempts: {reason}");
                    return Err(anyhow!(reason));
                }
                Verdict::Continue => {}
            }
            if let Some(cap) = self.max_attempts
                && attempts >= cap
            {
                tracing::warn!("poll attempt cap reached ({cap})");
                return Err(PollTimeout { attempts }.into());
            }
            tokio::time::sleep(self.interval).await;
        }
    }
}

/// Handle for a spawned pipeline task; aborts the task when dropped so
/// stale poll timers never outlive the job they belong to.
pub struct PollTask {
    handle: JoinHandle<()>,
}

impl PollTask {
    /// Wrap a spawned pipeline task.
    pub fn new(handle: JoinHandle<()>) -> Self {
        Self { handle }
    }
}

impl Drop for PollTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        Arc,
        atomic::{AtomicU32, Ordering},
    };

    /// Times the poll out after exactly the configured attempt count.
    #[tokio::test(start_paused = true)]
    async fn rejects_with_timeout_after_exact_cap() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let poller = Poller::webhook_verification();
        let res: Result<()> = poller
            .run(
                move || {
                    let calls = calls2.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok("WEBHOOK_VERIFICATION_PENDING".to_string())
                    }
                },
                |_s| Verdict::Continue,
            )
            .await;

        let err = res.unwrap_err();
        assert!(err.is::<PollTimeout>());
        // No more, no fewer.
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    /// Stops at the first payload the judge accepts.
    #[tokio::test(start_paused = true)]
    async fn resolves_on_done() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let poller = Poller::with(Duration::from_secs(1), None);
        let out: u32 = poller
            .run(
                move || {
                    let calls = calls2.clone();
                    async move { Ok(calls.fetch_add(1, Ordering::SeqCst)) }
                },
                |n| {
                    if *n >= 2 {
                        Verdict::Done(*n)
                    } else {
                        Verdict::Continue
                    }
                },
            )
            .await
            .unwrap();

        assert_eq!(out, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    /// A judged failure rejects with its reason, not a timeout.
    #[tokio::test(start_paused = true)]
    async fn rejects_on_judged_failure() {
        let poller = Poller::with(Duration::from_secs(1), Some(5));
        let res: Result<()> = poller
            .run(
                || async { Ok("FAILED".to_string()) },
                |s| {
                    if s == "FAILED" {
                        Verdict::Fail("backend reported failure".into())
                    } else {
                        Verdict::Continue
                    }
                },
            )
            .await;

        let err = res.unwrap_err();
        assert!(!err.is::<PollTimeout>());
        assert_eq!(err.to_string(), "backend reported failure");
    }

    /// A fetch error terminates the loop immediately and propagates.
    #[tokio::test(start_paused = true)]
    async fn propagates_fetch_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();

        let poller = Poller::with(Duration::from_secs(1), None);
        let res: Result<()> = poller
            .run(
                move || {
                    let calls = calls2.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Err::<String, _>(anyhow!("connection reset"))
                    }
                },
                |_s| Verdict::Continue,
            )
            .await;

        assert!(res.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
