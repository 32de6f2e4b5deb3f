//! Upload orchestration: job initiation, byte transfer, payability poll.

use anyhow::{Result, anyhow};
use reqwest::Client;
use std::{
    path::Path,
    sync::atomic::{AtomicU8, Ordering},
    time::Duration,
};
use tokio::sync::mpsc;

use crate::{
    api,
    api::jobs::JobStatusResp,
    jobs::SharedJob,
    poller::{Poller, Verdict},
    worker::WorkerEvent,
};

/// Settle time between transfer end and the first payability check; the
/// backend's virus/integrity scan has usually not finished at transfer end.
const SCAN_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Run the full upload flow for one document.
///
/// The caller must have validated the file is a well-formed PDF already;
/// format rejection is not this component's job. Failures are fatal to the
/// attempt and propagate unmodified; no retry happens at this layer.
pub async fn run(
    http: &Client,
    base: &str,
    job: &SharedJob,
    tx: &mpsc::Sender<WorkerEvent>,
    path: &Path,
    target_lang: &str,
) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("invalid file path: {}", path.display()))?
        .to_string();
    let size = tokio::fs::metadata(path).await?.len();

    tracing::info!("init job: {filename} ({size} bytes, lang {target_lang})");
    let init = api::jobs::init_job(http, base, &filename, size, target_lang).await?;
    let job_id = init.job_id.clone();

    // Record the identity before any byte moves, so a crash mid-transfer
    // still leaves a referencable job.
    {
        let mut j = job.lock().await;
        j.begin(init.job_id, init.expires_at);
        let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
    }

    // Transfer the bytes with monotonic progress ticks.
    let bytes = tokio::fs::read(path).await?;
    let progress_tx = tx.clone();
    let last = AtomicU8::new(0);
    api::jobs::put_document(http, &init.upload_url, bytes, move |pct| {
        // The transport contract already promises monotonic ticks; the
        // fetch_max keeps the UI safe against any out-of-order delivery.
        let prev = last.fetch_max(pct, Ordering::SeqCst);
        if pct >= prev {
            let _ = progress_tx.try_send(WorkerEvent::UploadProgress(pct));
        }
    })
    .await?;
    tracing::info!("transfer complete: {job_id}");
    let _ = tx
        .send(WorkerEvent::Log("upload complete, waiting for file checks".into()))
        .await;

    // Give the backend scan a head start before polling.
    tokio::time::sleep(SCAN_SETTLE_DELAY).await;

    let (amount, pages) = Poller::payability()
        .run(
            || api::jobs::fetch_status(http, base, &job_id),
            payability_verdict,
        )
        .await?;

    {
        let mut j = job.lock().await;
        j.mark_payable(amount, pages)?;
        let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
    }
    tracing::info!("job payable: {job_id} (amount {amount:?}, pages {pages:?})");
    Ok(())
}

/// Terminal conditions for the payability poll.
///
/// Payability requires the awaiting-payment status *and* both server-side
/// checks; the status string alone is never sufficient.
pub(crate) fn payability_verdict(s: &JobStatusResp) -> Verdict<(Option<f64>, Option<u32>)> {
    if let Some(err) = &s.error {
        return Verdict::Fail(err.clone());
    }
    if s.status == "FAILED" {
        return Verdict::Fail("file verification failed".into());
    }
    if s.status == "AWAITING_PAYMENT" && s.mime_type_verified && s.file_integrity_checked {
        return Verdict::Done((s.calculated_total, s.pages_detected));
    }
    Verdict::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn status(status: &str, mime: bool, integrity: bool) -> JobStatusResp {
        serde_json::from_value(serde_json::json!({
            "status": status,
            "mime_type_verified": mime,
            "file_integrity_checked": integrity,
            "calculated_total": if mime && integrity { Some(499.0) } else { None },
            "pages_detected": if mime && integrity { Some(12) } else { None },
        }))
        .unwrap()
    }

    #[test]
    fn payable_requires_both_flags_regardless_of_status() {
        // The status string alone must never flip payability.
        assert!(matches!(
            payability_verdict(&status("AWAITING_PAYMENT", false, false)),
            Verdict::Continue
        ));
        assert!(matches!(
            payability_verdict(&status("AWAITING_PAYMENT", true, false)),
            Verdict::Continue
        ));
        assert!(matches!(
            payability_verdict(&status("AWAITING_PAYMENT", false, true)),
            Verdict::Continue
        ));
        assert!(matches!(
            payability_verdict(&status("AWAITING_PAYMENT", true, true)),
            Verdict::Done((Some(_), Some(_)))
        ));
        // Flags without the awaiting-payment status are not enough either.
        assert!(matches!(
            payability_verdict(&status("UPLOADED", true, true)),
            Verdict::Continue
        ));
    }

    #[test]
    fn backend_failure_rejects() {
        assert!(matches!(
            payability_verdict(&status("FAILED", false, false)),
            Verdict::Fail(_)
        ));
        let mut s = status("AWAITING_PAYMENT", true, true);
        s.error = Some("corrupt upload".into());
        match payability_verdict(&s) {
            Verdict::Fail(reason) => assert_eq!(reason, "corrupt upload"),
            other => panic!("expected Fail, got {other:?}"),
        }
    }

    /// Unverified then verified: the poll stops exactly at the second tick.
    #[tokio::test(start_paused = true)]
    async fn payability_poll_stops_at_verified_response() {
        let responses = Arc::new(Mutex::new(vec![
            status("AWAITING_PAYMENT", false, false),
            status("AWAITING_PAYMENT", true, true),
        ]));
        let calls = Arc::new(Mutex::new(0u32));
        let (r2, c2) = (responses.clone(), calls.clone());

        let (amount, pages) = Poller::payability()
            .run(
                move || {
                    let (r, c) = (r2.clone(), c2.clone());
                    async move {
                        *c.lock().unwrap() += 1;
                        Ok(r.lock().unwrap().remove(0))
                    }
                },
                payability_verdict,
            )
            .await
            .unwrap();

        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(amount, Some(499.0));
        assert_eq!(pages, Some(12));
    }
}
