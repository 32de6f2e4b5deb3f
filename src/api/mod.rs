//! Translation service API clients.

/// Identity provider sign-in (OAuth installed flow).
pub mod auth;
/// Jobs API wrappers (init, upload, status, download URLs).
pub mod jobs;
/// Payment order creation and verification.
pub mod payments;
/// Token persistence for the identity provider.
pub mod token_store;
/// Wallet API wrappers (bearer-token authenticated).
pub mod wallet;

use anyhow::{Result, anyhow};

/// Convert non-2xx responses into a structured error with the body text.
pub(crate) async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_else(|_| "".into());
    Err(anyhow!("HTTP status {status} error: {body}"))
}

/// Join the API base URL and a path without doubling slashes.
pub(crate) fn endpoint(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path)
}
