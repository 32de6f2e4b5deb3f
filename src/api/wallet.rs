//! Wallet API helpers. All calls carry the identity provider's bearer token.

use anyhow::Result;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{endpoint, ensure_success};
use crate::api::payments::PaymentOrder;

/// Request body for a top-up initiation.
#[derive(Debug, Serialize)]
struct TopUpInitiateReq<'a> {
    package_id: &'a str,
}

/// Request body for a top-up verification.
#[derive(Debug, Serialize)]
struct TopUpVerifyReq<'a> {
    order_id: &'a str,
    payment_id: &'a str,
    signature: &'a str,
}

/// One wallet ledger entry.
#[derive(Debug, Clone, Deserialize)]
pub struct WalletTransaction {
    pub id: String,
    /// "TOP_UP" or "DEBIT".
    #[serde(rename = "type")]
    pub kind: String,
    /// Signed amount in the wallet currency's minor unit.
    pub amount: i64,
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
}

/// Transaction list wrapper.
#[derive(Debug, Deserialize)]
struct TransactionsResp {
    transactions: Vec<WalletTransaction>,
}

/// Start a wallet top-up for a prepaid package; returns a checkout order.
pub async fn top_up_initiate(
    http: &Client,
    base: &str,
    token: &str,
    package_id: &str,
) -> Result<PaymentOrder> {
    let url = endpoint(base, "wallets/top-up/initiate");
    let resp = http
        .post(url)
        .bearer_auth(token)
        .json(&TopUpInitiateReq { package_id })
        .send()
        .await?;
    let resp = ensure_success(resp).await?;
    Ok(resp.json::<PaymentOrder>().await?)
}

/// Submit the checkout result for a wallet top-up.
pub async fn top_up_verify(
    http: &Client,
    base: &str,
    token: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> Result<()> {
    let url = endpoint(base, "wallets/top-up/verify");
    let resp = http
        .post(url)
        .bearer_auth(token)
        .json(&TopUpVerifyReq {
            order_id,
            payment_id,
            signature,
        })
        .send()
        .await?;
    ensure_success(resp).await?;
    Ok(())
}

/// Fetch the most recent wallet transactions.
pub async fn transactions(
    http: &Client,
    base: &str,
    token: &str,
    limit: u32,
) -> Result<Vec<WalletTransaction>> {
    let url = format!("{}?limit={limit}", endpoint(base, "wallets/transactions"));
    let resp = http.get(url).bearer_auth(token).send().await?;
    let resp = ensure_success(resp).await?;
    let resp = resp.json::<TransactionsResp>().await?;
    Ok(resp.transactions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_list_parses() {
        let list: TransactionsResp = serde_json::from_str(
            r#"{"transactions":[
                {"id":"txn_1","type":"TOP_UP","amount":50000,"created_at":"2026-08-01T10:00:00Z"},
                {"id":"txn_2","type":"DEBIT","amount":-49900,"created_at":"2026-08-02T09:30:00Z","note":"contract.pdf"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(list.transactions.len(), 2);
        assert_eq!(list.transactions[0].kind, "TOP_UP");
        assert_eq!(list.transactions[1].amount, -49900);
        assert_eq!(list.transactions[1].note.as_deref(), Some("contract.pdf"));
    }
}
