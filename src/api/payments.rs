//! Payment API helpers: order creation and post-checkout verification.

use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{endpoint, ensure_success};

/// Checkout order parameters from `POST payments/{id}/create-payment-order`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentOrder {
    /// Provider key the hosted checkout is opened with.
    pub key: String,
    /// Amount in the currency's minor unit.
    pub amount: u64,
    pub currency: String,
    pub order_id: String,
}

/// Request body for `verify-payment`.
#[derive(Debug, Serialize)]
struct VerifyPaymentReq<'a> {
    order_id: &'a str,
    payment_id: &'a str,
    signature: &'a str,
    job_id: &'a str,
}

/// Create a payment order for the given job.
pub async fn create_payment_order(http: &Client, base: &str, job_id: &str) -> Result<PaymentOrder> {
    let url = endpoint(base, &format!("payments/{job_id}/create-payment-order"));
    let resp = http.post(url).send().await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<PaymentOrder>().await?)
}

/// Submit the checkout result for server-side signature verification.
///
/// The authoritative confirmation is still webhook-driven; this call only
/// hands the provider's callback parameters to the backend.
pub async fn verify_payment(
    http: &Client,
    base: &str,
    job_id: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<()> {
    let url = endpoint(base, &format!("payments/{job_id}/verify-payment"));
    let body = VerifyPaymentReq {
        order_id,
        payment_id,
        signature,
        job_id,
    };
    let resp = http.post(url).json(&body).send().await?;
    ensure_success(resp).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_order_parses() {
        let o: PaymentOrder = serde_json::from_str(
            r#"{"key":"rzp_live_x1","amount":49900,"currency":"INR","order_id":"order_9A33XWu170gUtm"}"#,
        )
        .unwrap();
        assert_eq!(o.key, "rzp_live_x1");
        assert_eq!(o.amount, 49900);
        assert_eq!(o.order_id, "order_9A33XWu170gUtm");
    }
}
