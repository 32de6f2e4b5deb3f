//! Background worker driving the translation service APIs.

use crate::{
    api::{self, auth, payments::PaymentOrder, wallet::WalletTransaction},
    config::Config,
    jobs::{JobSnapshot, JobState},
    payment,
    poller::PollTask,
    upload,
};
use anyhow::{Result, anyhow};
use reqwest::Client;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// How many wallet ledger entries the dashboard shows.
const WALLET_TX_LIMIT: u32 = 20;

/// Commands sent from the UI to the worker.
#[derive(Debug)]
pub enum WorkerCmd {
    /// Persist and apply updated settings.
    SaveSettings(Config),
    /// Begin the upload flow for a document.
    StartUpload { path: PathBuf, target_lang: String },
    /// Create a payment order and open the checkout for the current job.
    StartPayment,
    /// The hosted checkout reported success.
    CheckoutCompleted {
        payment_id: String,
        signature: String,
    },
    /// The hosted checkout reported a failure.
    CheckoutFailed { description: String },
    /// The user closed the checkout without paying.
    CheckoutDismissed,
    /// Reload recent wallet transactions.
    RefreshWallet,
    /// Start a wallet top-up for a prepaid package.
    TopUp { package_id: String },
    /// The top-up checkout reported success.
    TopUpCompleted {
        payment_id: String,
        signature: String,
    },
    /// The user closed the top-up checkout without paying.
    TopUpDismissed,
    /// Abandon the current job and stop its polling.
    DiscardJob,
}

/// Events emitted by the worker for UI updates.
#[derive(Clone, Debug)]
pub enum WorkerEvent {
    /// Current job snapshot after a state transition.
    JobUpdated(JobSnapshot),
    /// Byte-transfer progress percentage (0..=100).
    UploadProgress(u8),
    /// Checkout opened in the browser for the current job.
    CheckoutOpened { order_id: String },
    /// Checkout opened in the browser for a wallet top-up.
    TopUpOpened { order_id: String },
    /// Recent wallet transactions loaded.
    WalletLoaded(Vec<WalletTransaction>),
    /// Informational log message.
    Log(String),
    /// User-visible error message.
    Error(String),
}

/// Main worker loop: sign in, then handle commands sequentially.
///
/// Long-running phases (upload, verification, translation polling) run in
/// a spawned pipeline task so wallet and settings commands stay
/// responsive; the pipeline handle aborts its timers when replaced.
pub async fn run(
    mut rx: mpsc::Receiver<WorkerCmd>,
    tx: mpsc::Sender<WorkerEvent>,
    mut cfg: Config,
) {
    // Shared HTTP client for all API calls.
    let http = Client::new();
    let job = JobState::shared();
    tracing::info!("worker started");

    // Sign-in failures disable the wallet but not the job flow, which is
    // unauthenticated.
    let authn = match auth::authenticator(&cfg.auth.credentials_path, &cfg.auth.token_cache_path)
        .await
    {
        Ok(a) => {
            tracing::info!("identity provider ready");
            Some(a)
        }
        Err(e) => {
            tracing::error!("sign-in init failed: {e}");
            let _ = tx
                .send(WorkerEvent::Error(format!(
                    "sign-in unavailable (wallet disabled): {e}"
                )))
                .await;
            None
        }
    };

    // Active upload/payment pipeline; dropping it aborts stale timers.
    let mut pipeline: Option<PollTask> = None;
    // Orders awaiting a checkout outcome.
    let mut pending_order: Option<PaymentOrder> = None;
    let mut pending_topup: Option<PaymentOrder> = None;

    while let Some(cmd) = rx.recv().await {
        match cmd {
            WorkerCmd::SaveSettings(new_cfg) => {
                tracing::info!("settings updated");
                cfg = new_cfg;
                let _ = tx.send(WorkerEvent::Log("settings updated".into())).await;
            }

            WorkerCmd::StartUpload { path, target_lang } => {
                tracing::info!("upload requested: {}", path.display());
                // A new upload discards the previous job and its timers.
                drop(pipeline.take());
                pending_order = None;
                {
                    let mut j = job.lock().await;
                    j.reset();
                    let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
                }

                let (http, base, job, tx2) = (
                    http.clone(),
                    cfg.api.base_url.clone(),
                    job.clone(),
                    tx.clone(),
                );
                let handle = tokio::spawn(async move {
                    if let Err(e) = upload::run(&http, &base, &job, &tx2, &path, &target_lang).await
                    {
                        tracing::error!("upload flow failed: {e}");
                        let _ = tx2
                            .send(WorkerEvent::Error(format!("upload failed: {e}")))
                            .await;
                    }
                });
                pipeline = Some(PollTask::new(handle));
            }

            WorkerCmd::StartPayment => {
                match payment::start(&http, &cfg.api.base_url, &job).await {
                    Ok(order) => {
                        tracing::info!("checkout opened: {}", order.order_id);
                        let _ = tx
                            .send(WorkerEvent::CheckoutOpened {
                                order_id: order.order_id.clone(),
                            })
                            .await;
                        pending_order = Some(order);
                    }
                    Err(e) => {
                        tracing::error!("payment start failed: {e}");
                        let _ = tx
                            .send(WorkerEvent::Error(format!("payment failed: {e}")))
                            .await;
                    }
                }
            }

            WorkerCmd::CheckoutCompleted {
                payment_id,
                signature,
            } => {
                let Some(order) = pending_order.take() else {
                    let _ = tx
                        .send(WorkerEvent::Error("no checkout in progress".into()))
                        .await;
                    continue;
                };
                tracing::info!("checkout success reported for {}", order.order_id);
                let (http, base, site, job, tx2) = (
                    http.clone(),
                    cfg.api.base_url.clone(),
                    cfg.api.site_url.clone(),
                    job.clone(),
                    tx.clone(),
                );
                let handle = tokio::spawn(async move {
                    let settled = payment::settle(
                        &http,
                        &base,
                        &site,
                        &job,
                        &tx2,
                        &order,
                        &payment_id,
                        &signature,
                    )
                    .await;
                    match settled {
                        Ok(()) => {
                            if let Err(e) =
                                payment::track_translation(&http, &base, &job, &tx2).await
                            {
                                tracing::error!("translation tracking failed: {e}");
                                let _ = tx2
                                    .send(WorkerEvent::Error(format!("translation failed: {e}")))
                                    .await;
                            }
                        }
                        Err(e) => {
                            tracing::error!("payment verification failed: {e}");
                            let _ = tx2
                                .send(WorkerEvent::Error(format!("verification failed: {e}")))
                                .await;
                        }
                    }
                });
                pipeline = Some(PollTask::new(handle));
            }

            WorkerCmd::CheckoutFailed { description } => {
                tracing::warn!("checkout failed: {description}");
                pending_order = None;
                payment::record_failure(&job, &tx, description).await;
            }

            WorkerCmd::CheckoutDismissed => {
                tracing::info!("checkout dismissed");
                pending_order = None;
                payment::record_dismissal(&job, &tx).await;
            }

            WorkerCmd::RefreshWallet => match wallet_token(&authn).await {
                Ok(token) => {
                    match api::wallet::transactions(
                        &http,
                        &cfg.api.base_url,
                        &token,
                        WALLET_TX_LIMIT,
                    )
                    .await
                    {
                        Ok(txns) => {
                            tracing::info!("wallet loaded: {} transactions", txns.len());
                            let _ = tx.send(WorkerEvent::WalletLoaded(txns)).await;
                        }
                        Err(e) => {
                            tracing::error!("wallet load failed: {e}");
                            let _ = tx
                                .send(WorkerEvent::Error(format!("wallet load failed: {e}")))
                                .await;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            },

            WorkerCmd::TopUp { package_id } => match wallet_token(&authn).await {
                Ok(token) => {
                    match api::wallet::top_up_initiate(
                        &http,
                        &cfg.api.base_url,
                        &token,
                        &package_id,
                    )
                    .await
                    {
                        Ok(order) => {
                            if let Err(e) = payment::CheckoutProvider::get().open(&order) {
                                tracing::error!("checkout open failed: {e}");
                            }
                            tracing::info!("top-up checkout opened: {}", order.order_id);
                            let _ = tx
                                .send(WorkerEvent::TopUpOpened {
                                    order_id: order.order_id.clone(),
                                })
                                .await;
                            pending_topup = Some(order);
                        }
                        Err(e) => {
                            tracing::error!("top-up initiate failed: {e}");
                            let _ = tx
                                .send(WorkerEvent::Error(format!("top-up failed: {e}")))
                                .await;
                        }
                    }
                }
                Err(e) => {
                    let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                }
            },

            WorkerCmd::TopUpCompleted {
                payment_id,
                signature,
            } => {
                let Some(order) = pending_topup.take() else {
                    let _ = tx
                        .send(WorkerEvent::Error("no top-up in progress".into()))
                        .await;
                    continue;
                };
                match wallet_token(&authn).await {
                    Ok(token) => {
                        let verified = api::wallet::top_up_verify(
                            &http,
                            &cfg.api.base_url,
                            &token,
                            &order.order_id,
                            &payment_id,
                            &signature,
                        )
                        .await;
                        match verified {
                            Ok(()) => {
                                tracing::info!("top-up verified: {}", order.order_id);
                                let _ = tx
                                    .send(WorkerEvent::Log("wallet top-up verified".into()))
                                    .await;
                                // Show the fresh balance right away.
                                if let Ok(txns) = api::wallet::transactions(
                                    &http,
                                    &cfg.api.base_url,
                                    &token,
                                    WALLET_TX_LIMIT,
                                )
                                .await
                                {
                                    let _ = tx.send(WorkerEvent::WalletLoaded(txns)).await;
                                }
                            }
                            Err(e) => {
                                tracing::error!("top-up verify failed: {e}");
                                let _ = tx
                                    .send(WorkerEvent::Error(format!(
                                        "top-up verification failed: {e}"
                                    )))
                                    .await;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(WorkerEvent::Error(e.to_string())).await;
                    }
                }
            }

            WorkerCmd::TopUpDismissed => {
                tracing::info!("top-up dismissed");
                pending_topup = None;
                let _ = tx.send(WorkerEvent::Log("top-up cancelled".into())).await;
            }

            WorkerCmd::DiscardJob => {
                tracing::info!("job discarded");
                pipeline = None;
                pending_order = None;
                let mut j = job.lock().await;
                j.reset();
                let _ = tx.send(WorkerEvent::JobUpdated(j.snapshot())).await;
            }
        }
    }

    // Receiver closed: tear down any remaining pipeline timers.
    drop(pipeline);
    tracing::info!("worker stopped");
}

/// Fetch a fresh bearer token for the wallet API.
async fn wallet_token(authn: &Option<auth::InstalledAuth>) -> Result<String> {
    let authn = authn
        .as_ref()
        .ok_or_else(|| anyhow!("sign-in unavailable; wallet is disabled"))?;
    let token = authn.token(&auth::scopes()).await?;
    let token = token.token().ok_or_else(|| anyhow!("no access token"))?;
    Ok(token.to_string())
}
