//! Payment coordination: checkout hand-off, webhook verification,
//! translation tracking.

use anyhow::{Result, anyhow, bail};
use reqwest::Client;
use std::{
    path::{Path, PathBuf},
    sync::OnceLock,
    time::Duration,
};
use tokio::sync::mpsc;

use crate::{
    api,
    api::{jobs::JobStatusResp, payments::PaymentOrder},
    jobs::{DownloadUrls, JobState, SharedJob},
    poller::{PollTimeout, Poller, Verdict},
    worker::WorkerEvent,
};

/// Hosted checkout page of the payment provider.
const CHECKOUT_PAGE: &str = "https://checkout.razorpay.com/v1/checkout.html";

/// Pause between the client-side success callback and the first webhook
/// check; the provider's server-to-server notification needs a moment.
const VERIFY_KICKOFF_DELAY: Duration = Duration::from_secs(2);

static PROVIDER: OnceLock<CheckoutProvider> = OnceLock::new();

/// Hand-off to the provider's hosted checkout page.
pub struct CheckoutProvider {
    page: String,
}

impl CheckoutProvider {
    /// Process-wide provider handle, initialized exactly once.
    pub fn get() -> &'static Self {
        PROVIDER.get_or_init(|| {
            tracing::info!("checkout provider ready");
            Self {
                page: CHECKOUT_PAGE.into(),
            }
        })
    }

    /// Hosted checkout URL carrying the order parameters.
    fn checkout_url(&self, order: &PaymentOrder) -> String {
        format!(
            "{}?key={}&order_id={}&amount={}&currency={}",
            self.page,
            urlencoding::encode(&order.key),
            urlencoding::encode(&order.order_id),
            order.amount,
            urlencoding::encode(&order.currency),
        )
    }

    /// Open the checkout in the user's browser.
    pub fn open(&self, order: &PaymentOrder) -> Result<()> {
        let url = self.checkout_url(order);
        tracing::info!("opening checkout for order {}", order.order_id);
        webbrowser::open(&url)?;
        Ok(())
    }
}

/// Create a payment order for the current job and open the checkout.
///
/// The job must already be payable; the UI must not offer payment before
/// the backend confirmed integrity and MIME checks.
pub async fn start(http: &Client, base: &str, job: &SharedJob) -> Result<PaymentOrder> {
    let job_id = {
        let j = job.lock().await;
        if !j.is_payable() {
            bail!("job is not payable yet");
        }
        j.job_id()
            .ok_or_else(|| anyhow!("no active job"))?
            .to_string()
    };

    let order = api::payments::create_payment_order(http, base, &job_id).await?;
    CheckoutProvider::get().open(&order)?;
    Ok(order)
}

/// Record a provider failure callback. No verification poll is started.
pub async fn record_failure(job: &SharedJob, tx: &mpsc::Sender<WorkerEvent>, description: String) {
    let mut j = job.lock().await;
    if let Err(e) = j.payment_failed(description) {
        tracing::warn!("payment_failed rejected: {e}");
        return;
    }
    let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
}

/// Record a dismissed checkout. No verification poll is started.
pub async fn record_dismissal(job: &SharedJob, tx: &mpsc::Sender<WorkerEvent>) {
    let mut j = job.lock().await;
    if let Err(e) = j.payment_cancelled() {
        tracing::warn!("payment_cancelled rejected: {e}");
        return;
    }
    let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
}

/// Handle the client-side success callback through webhook confirmation.
///
/// Marks the job as verifying immediately (optimistic; the webhook is the
/// source of truth), drops a recovery file with the tracking URL, submits
/// the signature for verification and polls until the backend reports the
/// job queued.
pub async fn settle(
    http: &Client,
    base: &str,
    site_url: &str,
    job: &SharedJob,
    tx: &mpsc::Sender<WorkerEvent>,
    order: &PaymentOrder,
    payment_id: &str,
    signature: &str,
) -> Result<()> {
    let job_id = {
        let mut j = job.lock().await;
        j.payment_verifying()?;
        let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
        j.job_id()
            .ok_or_else(|| anyhow!("no active job"))?
            .to_string()
    };

    // Safety net in case the user loses the terminal before the job
    // finishes. Not a source of truth; failures are only logged.
    match write_recovery_file(Path::new("."), site_url, &job_id).await {
        Ok(p) => {
            let _ = tx
                .send(WorkerEvent::Log(format!(
                    "tracking link saved to {}",
                    p.display()
                )))
                .await;
        }
        Err(e) => tracing::warn!("recovery file write failed: {e}"),
    }

    tokio::time::sleep(VERIFY_KICKOFF_DELAY).await;

    // A verify error and a failed poll take the same failure path below.
    let poll = async {
        api::payments::verify_payment(http, base, &job_id, &order.order_id, payment_id, signature)
            .await?;
        Poller::webhook_verification()
            .run(
                || api::jobs::fetch_status(http, base, &job_id),
                webhook_verdict,
            )
            .await
    }
    .await;

    match poll {
        Ok(()) => {
            let mut j = job.lock().await;
            j.queued()?;
            let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            tracing::info!("payment confirmed, job queued: {job_id}");
            Ok(())
        }
        Err(e) if e.is::<PollTimeout>() => {
            // Distinct from failure: the payment likely went through but
            // the confirmation is delayed, needing manual follow-up.
            let mut j = job.lock().await;
            j.payment_timed_out()?;
            let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            Err(e)
        }
        Err(e) => {
            // The payment itself may be fine (e.g. a transport error on
            // the verify call), so the phase returns to awaiting-payment
            // and the user can retry instead of losing the job.
            let mut j = job.lock().await;
            j.payment_failed(e.to_string())?;
            let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            Err(e)
        }
    }
}

/// Poll translation progress until the job reaches a terminal state.
///
/// Progress updates are applied on every tick; on completion the download
/// URLs come from the status payload, or from the separate download
/// endpoint when the payload omitted them.
pub async fn track_translation(
    http: &Client,
    base: &str,
    job: &SharedJob,
    tx: &mpsc::Sender<WorkerEvent>,
) -> Result<()> {
    let job_id = {
        let j = job.lock().await;
        j.job_id()
            .ok_or_else(|| anyhow!("no active job"))?
            .to_string()
    };

    let poll = Poller::translation_progress()
        .run(
            || async {
                let s = api::jobs::fetch_status(http, base, &job_id).await?;
                // Apply the per-tick progress update here; the judge only
                // decides terminality.
                let updated = {
                    let mut j = job.lock().await;
                    apply_progress_tick(&mut j, &s).then(|| j.snapshot())
                };
                if let Some(snapshot) = updated {
                    let _ = tx.send(WorkerEvent::JobUpdated(snapshot)).await;
                }
                Ok(s)
            },
            translation_verdict,
        )
        .await;

    match poll {
        Ok(urls) => {
            // Fall back to the dedicated endpoint only when the status
            // payload omitted the URLs.
            let urls = match urls {
                Some(u) => u,
                None => api::jobs::fetch_download_urls(http, base, &job_id)
                    .await
                    .ok_or_else(|| anyhow!("completed but download URLs unavailable"))?,
            };
            let mut j = job.lock().await;
            j.complete(urls)?;
            let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            tracing::info!("translation completed: {job_id}");
            Ok(())
        }
        Err(e) => {
            let mut j = job.lock().await;
            j.fail(e.to_string())?;
            let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            Err(e)
        }
    }
}

/// Move the store along for one translation-poll tick.
///
/// Runs for every QUEUED/TRANSLATING payload; a payload without a
/// progress value still marks the phase as translating (progress 0 is
/// safe, the store keeps progress monotonic).
pub(crate) fn apply_progress_tick(j: &mut JobState, s: &JobStatusResp) -> bool {
    if matches!(s.status.as_str(), "QUEUED" | "TRANSLATING") {
        return j.translating(s.progress.unwrap_or(0)).is_ok();
    }
    false
}

/// Terminal conditions for the webhook-verification poll.
pub(crate) fn webhook_verdict(s: &JobStatusResp) -> Verdict<()> {
    if let Some(err) = &s.error {
        return Verdict::Fail(err.clone());
    }
    match s.status.as_str() {
        "QUEUED" => Verdict::Done(()),
        "FAILED" => Verdict::Fail("payment verification failed".into()),
        _ => Verdict::Continue,
    }
}

/// Terminal conditions for the translation-progress poll.
pub(crate) fn translation_verdict(s: &JobStatusResp) -> Verdict<Option<DownloadUrls>> {
    if let Some(err) = &s.error {
        return Verdict::Fail(err.clone());
    }
    match s.status.as_str() {
        "COMPLETED" | "DOWNLOAD" => {
            Verdict::Done(s.result_download_urls.clone().map(Into::into))
        }
        "FAILED" => Verdict::Fail("translation failed".into()),
        _ => Verdict::Continue,
    }
}

/// Write the tracking URL to a small recovery file next to the binary.
async fn write_recovery_file(dir: &Path, site_url: &str, job_id: &str) -> Result<PathBuf> {
    let path = dir.join(format!("polyglot_job_{job_id}.txt"));
    let tracking = tracking_url(site_url, job_id);
    let body = format!("Translation job {job_id}\nTrack it here: {tracking}\n");
    tokio::fs::write(&path, body).await?;
    Ok(path)
}

/// Dashboard URL that can recover the job after a reload.
fn tracking_url(site_url: &str, job_id: &str) -> String {
    format!(
        "{}/dashboard?job_id={}",
        site_url.trim_end_matches('/'),
        urlencoding::encode(job_id)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_named(name: &str) -> JobStatusResp {
        serde_json::from_value(serde_json::json!({ "status": name })).unwrap()
    }

    #[test]
    fn checkout_url_carries_order_parameters() {
        let provider = CheckoutProvider {
            page: CHECKOUT_PAGE.into(),
        };
        let order = PaymentOrder {
            key: "rzp_live_x1".into(),
            amount: 49900,
            currency: "INR".into(),
            order_id: "order_9A 33".into(),
        };
        let url = provider.checkout_url(&order);
        assert!(url.starts_with(CHECKOUT_PAGE));
        assert!(url.contains("key=rzp_live_x1"));
        // Query values are percent-encoded.
        assert!(url.contains("order_id=order_9A%2033"));
        assert!(url.contains("amount=49900"));
        assert!(url.contains("currency=INR"));
    }

    #[test]
    fn webhook_verdict_terminals() {
        assert!(matches!(
            webhook_verdict(&status_named("QUEUED")),
            Verdict::Done(())
        ));
        assert!(matches!(
            webhook_verdict(&status_named("FAILED")),
            Verdict::Fail(_)
        ));
        assert!(matches!(
            webhook_verdict(&status_named("WEBHOOK_VERIFICATION_PENDING")),
            Verdict::Continue
        ));
    }

    #[test]
    fn translation_verdict_resolves_urls_from_payload() {
        let s: JobStatusResp = serde_json::from_value(serde_json::json!({
            "status": "COMPLETED",
            "result_download_urls": {"pdf_url": "p", "docx_url": "d"}
        }))
        .unwrap();
        match translation_verdict(&s) {
            Verdict::Done(Some(urls)) => assert_eq!(urls.pdf_url, "p"),
            other => panic!("expected Done(Some), got {other:?}"),
        }
        // DOWNLOAD without URLs defers to the fallback fetch.
        assert!(matches!(
            translation_verdict(&status_named("DOWNLOAD")),
            Verdict::Done(None)
        ));
        assert!(matches!(
            translation_verdict(&status_named("TRANSLATING")),
            Verdict::Continue
        ));
    }

    /// Ten pending responses exhaust the cap; the store records Timeout.
    #[tokio::test(start_paused = true)]
    async fn webhook_exhaustion_maps_to_timeout_state() {
        let job = JobState::shared();
        {
            let mut j = job.lock().await;
            j.begin("abc123".into(), None);
            j.mark_payable(Some(100.0), Some(2)).unwrap();
            j.payment_verifying().unwrap();
        }

        let res: Result<()> = Poller::webhook_verification()
            .run(
                || async { Ok(status_named("WEBHOOK_VERIFICATION_PENDING")) },
                webhook_verdict,
            )
            .await;
        let err = res.unwrap_err();
        assert!(err.is::<PollTimeout>());

        // The same mapping settle() applies.
        let mut j = job.lock().await;
        j.payment_timed_out().unwrap();
        assert_eq!(
            j.snapshot().payment,
            crate::jobs::PaymentStatus::Timeout
        );
    }

    /// A TRANSLATING payload without a progress value still advances the
    /// phase; the recorded progress never regresses.
    #[test]
    fn progress_tick_applies_without_progress_value() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        j.mark_payable(Some(100.0), Some(2)).unwrap();
        j.payment_verifying().unwrap();
        j.queued().unwrap();

        assert!(apply_progress_tick(&mut j, &status_named("TRANSLATING")));
        assert_eq!(j.snapshot().phase, crate::jobs::JobPhase::Translating);
        assert_eq!(j.snapshot().progress, 0);

        let with_pct: JobStatusResp = serde_json::from_value(serde_json::json!({
            "status": "TRANSLATING",
            "progress": 30
        }))
        .unwrap();
        assert!(apply_progress_tick(&mut j, &with_pct));
        assert_eq!(j.snapshot().progress, 30);

        // A later payload that omits progress again must not reset it.
        assert!(apply_progress_tick(&mut j, &status_named("TRANSLATING")));
        assert_eq!(j.snapshot().progress, 30);

        // Terminal payloads are the judge's business, not the tick update's.
        assert!(!apply_progress_tick(&mut j, &status_named("COMPLETED")));
    }

    /// A verify error records a retryable payment failure, not a dead job.
    #[test]
    fn verify_error_leaves_retry_open() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        j.mark_payable(Some(100.0), Some(2)).unwrap();
        j.payment_verifying().unwrap();

        // The same mapping settle() applies for non-timeout errors.
        j.payment_failed("connection reset".into()).unwrap();

        let s = j.snapshot();
        assert_eq!(s.phase, crate::jobs::JobPhase::AwaitingPayment);
        assert_eq!(s.payment, crate::jobs::PaymentStatus::Failed);
        assert_eq!(s.payment_error.as_deref(), Some("connection reset"));
        // Retrying the checkout is still possible.
        assert!(j.payment_verifying().is_ok());
    }

    #[tokio::test]
    async fn recovery_file_contains_tracking_url() {
        let dir = std::env::temp_dir();
        let path = write_recovery_file(&dir, "https://www.polyglotpdf.com/", "abc123")
            .await
            .unwrap();
        let body = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(body.contains("https://www.polyglotpdf.com/dashboard?job_id=abc123"));
        let _ = tokio::fs::remove_file(&path).await;
    }
}
