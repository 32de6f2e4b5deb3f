//! Jobs API helpers: initiation, byte upload, status, download URLs.

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures_util::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{endpoint, ensure_success};
use crate::jobs::DownloadUrls;

/// Upload chunk size for the raw byte transfer.
const CHUNK_SIZE: usize = 64 * 1024;

/// Request body for job initiation.
#[derive(Debug, Serialize)]
struct InitJobReq<'a> {
    filename: &'a str,
    size: u64,
    target_language: &'a str,
}

/// Response from `POST jobs/init`.
#[derive(Debug, Deserialize)]
pub struct InitJobResp {
    /// Presigned destination for the raw file bytes.
    pub upload_url: String,
    /// Opaque job identifier, immutable once assigned.
    pub job_id: String,
    /// End of the upload/payment window.
    pub expires_at: Option<DateTime<Utc>>,
}

/// Status payload from `GET jobs/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatusResp {
    /// Backend lifecycle status string.
    pub status: String,
    #[serde(default)]
    pub mime_type_verified: bool,
    #[serde(default)]
    pub file_integrity_checked: bool,
    /// Computed cost, present once file analysis finished.
    #[serde(default)]
    pub calculated_total: Option<f64>,
    /// Page count, present once file analysis finished.
    #[serde(default)]
    pub pages_detected: Option<u32>,
    /// Translation progress percentage.
    #[serde(default)]
    pub progress: Option<u8>,
    /// Backend-reported error detail, if any.
    #[serde(default)]
    pub error: Option<String>,
    /// Download targets; may be absent even on completion.
    #[serde(default)]
    pub result_download_urls: Option<DownloadUrlsResp>,
}

/// Download URL pair as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
pub struct DownloadUrlsResp {
    pub pdf_url: String,
    pub docx_url: String,
}

impl From<DownloadUrlsResp> for DownloadUrls {
    fn from(r: DownloadUrlsResp) -> Self {
        DownloadUrls {
            pdf_url: r.pdf_url,
            docx_url: r.docx_url,
        }
    }
}

/// Request job initiation with file metadata and the target language.
pub async fn init_job(
    http: &Client,
    base: &str,
    filename: &str,
    size: u64,
    target_language: &str,
) -> Result<InitJobResp> {
    let url = endpoint(base, "jobs/init");
    let body = InitJobReq {
        filename,
        size,
        target_language,
    };
    let resp = http.post(url).json(&body).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<InitJobResp>().await?)
}

/// Transfer the file bytes to the presigned destination.
///
/// The progress callback receives a percentage in 0..=100 as each chunk
/// is handed to the transport; values are monotonically non-decreasing.
pub async fn put_document(
    http: &Client,
    upload_url: &str,
    bytes: Vec<u8>,
    progress: impl Fn(u8) + Send + Sync + 'static,
) -> Result<()> {
    let total = bytes.len();
    // An empty file still reports a single 100% tick.
    if total == 0 {
        progress(100);
        let resp = http
            .put(upload_url)
            .header(reqwest::header::CONTENT_TYPE, "application/pdf")
            .body(Vec::<u8>::new())
            .send()
            .await?;
        ensure_success(resp).await?;
        return Ok(());
    }

    // Stream fixed-size chunks and report progress as each one is pulled.
    let chunks: Vec<Vec<u8>> = bytes.chunks(CHUNK_SIZE).map(|c| c.to_vec()).collect();
    let mut sent = 0usize;
    let stream = futures_util::stream::iter(chunks).map(move |chunk| {
        sent += chunk.len();
        progress(percent(sent, total));
        Ok::<Vec<u8>, std::io::Error>(chunk)
    });

    let resp = http
        .put(upload_url)
        .header(reqwest::header::CONTENT_TYPE, "application/pdf")
        .header(reqwest::header::CONTENT_LENGTH, total as u64)
        .body(reqwest::Body::wrap_stream(stream))
        .send()
        .await?;
    ensure_success(resp).await?;
    Ok(())
}

/// Percentage of `sent` over `total`, bounded to 0..=100.
pub(crate) fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) as u64 * 100) / total as u64) as u8
}

/// Fetch the current status payload for a job.
pub async fn fetch_status(http: &Client, base: &str, job_id: &str) -> Result<JobStatusResp> {
    let url = endpoint(base, &format!("jobs/{job_id}/status"));
    let resp = http.get(url).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<JobStatusResp>().await?)
}

/// Best-effort fetch of the download URL pair.
///
/// Returns `Ok(None)` instead of an error so a flaky download endpoint
/// never masks an otherwise completed job.
pub async fn fetch_download_urls(http: &Client, base: &str, job_id: &str) -> Option<DownloadUrls> {
    let url = endpoint(base, &format!("jobs/{job_id}/download"));
    let resp = match http.get(url).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("download-url fetch failed: {e}");
            return None;
        }
    };
    if !resp.status().is_success() {
        tracing::warn!("download-url fetch returned {}", resp.status());
        return None;
    }
    match resp.json::<DownloadUrlsResp>().await {
        Ok(r) => Some(r.into()),
        Err(e) => {
            tracing::warn!("download-url payload malformed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_is_bounded_and_monotonic() {
        let total = 1000;
        let mut last = 0u8;
        for sent in (0..=total).step_by(37) {
            let p = percent(sent, total);
            assert!(p <= 100);
            assert!(p >= last);
            last = p;
        }
        assert_eq!(percent(total, total), 100);
        // Over-counting never exceeds the bound.
        assert_eq!(percent(total + 500, total), 100);
        assert_eq!(percent(0, 0), 100);
    }

    #[test]
    fn status_payload_parses_with_optional_fields_missing() {
        // Early-phase payloads omit cost, pages, progress and URLs.
        let s: JobStatusResp = serde_json::from_str(
            r#"{"status":"AWAITING_PAYMENT","mime_type_verified":false,"file_integrity_checked":false}"#,
        )
        .unwrap();
        assert_eq!(s.status, "AWAITING_PAYMENT");
        assert!(!s.mime_type_verified);
        assert!(s.calculated_total.is_none());
        assert!(s.result_download_urls.is_none());
    }

    #[test]
    fn status_payload_parses_terminal_with_urls() {
        let s: JobStatusResp = serde_json::from_str(
            r#"{
                "status": "COMPLETED",
                "mime_type_verified": true,
                "file_integrity_checked": true,
                "calculated_total": 499.0,
                "pages_detected": 12,
                "progress": 100,
                "result_download_urls": {
                    "pdf_url": "https://cdn.example/out.pdf",
                    "docx_url": "https://cdn.example/out.docx"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(s.status, "COMPLETED");
        let urls = s.result_download_urls.unwrap();
        assert_eq!(urls.pdf_url, "https://cdn.example/out.pdf");
    }
}
