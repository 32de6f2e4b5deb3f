//! TUIのイベントループ、入力処理、状態管理。

mod handlers;
mod render;

use anyhow::Result;
use crossterm::event::{self, Event};
use std::{path::PathBuf, time::Duration};
use tokio::sync::mpsc;

use crate::{
    api::wallet::WalletTransaction,
    config::Config,
    events::{Screen, UiState},
    input::InputBoxState,
    jobs::{JobPhase, JobSnapshot},
    shortcuts::Shortcuts,
    ui::Tui,
    wizard,
    worker::{self, WorkerCmd, WorkerEvent},
};

use handlers::{handle_key, is_ctrl_c};
use render::draw;

/// Checkout画面がどの決済の結果を待っているか。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckoutKind {
    /// 翻訳ジョブの支払い。
    Job,
    /// ウォレットのチャージ。
    TopUp,
}

/// 入力処理と描画で共有するアプリ状態。
pub struct App {
    /// 永続化された設定ファイルのパス。
    pub cfg_path: PathBuf,
    /// メモリ上の現在設定。
    pub cfg: Config,
    /// 選択位置やステータスなどUI固有の状態。
    pub ui: UiState,
    /// Workerから受け取った最新のジョブスナップショット。
    pub job: Option<JobSnapshot>,
    /// アップロード進捗（転送中のみSome）。
    pub upload_pct: Option<u8>,
    /// ウォレットの取引履歴。
    pub wallet: Vec<WalletTransaction>,
    /// Workerへのコマンド送信チャネル。
    pub worker_tx: mpsc::Sender<WorkerCmd>,
    /// Workerからのイベント受信チャネル。
    pub worker_rx: mpsc::Receiver<WorkerEvent>,

    /// 設定画面で編集するAPIベースURL。
    pub base_url: String,
    /// 設定画面で編集する既定の翻訳先言語。
    pub target_lang: String,
    /// 設定画面で編集する氏名。
    pub full_name: String,

    /// 入力ボックスの状態（入力中はSome）。
    pub input_box: Option<InputBoxState>,

    /// 進行中のチェックアウト種別。
    pub checkout_kind: Option<CheckoutKind>,

    /// 初期設定ウィザードの状態。
    pub wizard_state: wizard::WizardState,

    /// ショートカットキー設定。
    pub shortcuts: Shortcuts,
}

/// ユーザーが終了するまでメインTUIループを回す。
pub async fn run_app(terminal: &mut Tui) -> Result<()> {
    // 設定ファイルを読み込む（初回はデフォルトを生成）。
    let cfg_path = PathBuf::from("config.toml");
    let cfg = Config::load_or_default(&cfg_path)?;

    // ショートカット設定を読み込む（無ければデフォルト）。
    let shortcuts_path = PathBuf::from("shortcut.toml");
    let shortcuts = Shortcuts::load_or_default(&shortcuts_path)?;

    // Worker通信用のコマンド/イベントチャネルを作る。
    let (tx_cmd, rx_cmd) = mpsc::channel::<WorkerCmd>(64);
    let (tx_ev, rx_ev) = mpsc::channel::<WorkerEvent>(256);

    // 初期設定スナップショットでWorkerを起動する。
    tokio::spawn(worker::run(rx_cmd, tx_ev, cfg.clone()));

    // 設定の充足度に応じて初期画面を決める。
    let initial_screen = if needs_initial_setup(&cfg) {
        Screen::InitialSetup
    } else {
        Screen::Main
    };

    // アプリ状態を初期化する。
    let mut app = App {
        cfg_path,
        cfg: cfg.clone(),
        ui: UiState {
            screen: initial_screen,
            selected: 0,
            log: vec![],
            status: "Ready".into(),
            error: None,
        },
        job: None,
        upload_pct: None,
        wallet: vec![],
        worker_tx: tx_cmd,
        worker_rx: rx_ev,
        base_url: cfg.api.base_url.clone(),
        target_lang: cfg.translation.default_target_lang.clone(),
        full_name: cfg.user.full_name.clone(),
        input_box: None,
        checkout_kind: None,
        wizard_state: wizard::WizardState::new(),
        shortcuts,
    };

    loop {
        // 現在の状態を描画する。
        terminal.draw(|f| draw(f, &app))?;

        // 入力処理の前にWorkerイベントを消化する。
        while let Ok(ev) = app.worker_rx.try_recv() {
            handle_worker_event(&mut app, ev)?;
        }

        // UIの応答性確保のため短いタイムアウトで入力をポーリングする。
        if event::poll(Duration::from_millis(50))?
            && let Event::Key(k) = event::read()?
        {
            // どのフェーズでもCtrl+Cで終了できるようにする。
            if is_ctrl_c(&k) {
                break;
            }
            if handle_key(&mut app, k).await? {
                break;
            }
        }
    }
    Ok(())
}

/// WorkerイベントをUI状態へ反映する。
fn handle_worker_event(app: &mut App, ev: WorkerEvent) -> Result<()> {
    match ev {
        WorkerEvent::JobUpdated(snapshot) => {
            // フェーズに応じたステータス文言を用意する。
            app.ui.status = phase_status(&snapshot);
            // 転送後はアップロード進捗表示を消す。
            if snapshot.phase != JobPhase::Idle {
                app.upload_pct = None;
            }
            app.job = Some(snapshot);
        }
        WorkerEvent::UploadProgress(pct) => {
            // 転送中の進捗を表示する。
            app.upload_pct = Some(pct);
            app.ui.status = format!("Uploading... {pct}%");
        }
        WorkerEvent::CheckoutOpened { order_id } => {
            // ブラウザ決済の結果入力画面へ遷移する。
            app.checkout_kind = Some(CheckoutKind::Job);
            app.ui.screen = Screen::Checkout;
            app.ui.status = format!("Checkout opened in browser (order {order_id})");
        }
        WorkerEvent::TopUpOpened { order_id } => {
            // チャージ用のチェックアウトも同じ画面で扱う。
            app.checkout_kind = Some(CheckoutKind::TopUp);
            app.ui.screen = Screen::Checkout;
            app.ui.status = format!("Top-up checkout opened in browser (order {order_id})");
        }
        WorkerEvent::WalletLoaded(txns) => {
            // 履歴を更新し選択を先頭に戻す。
            app.ui.status = format!("Wallet: {} transactions", txns.len());
            app.wallet = txns;
            app.ui.selected = 0;
        }
        WorkerEvent::Log(s) => {
            // ログを追加する。
            app.ui.log.push(s);
        }
        WorkerEvent::Error(s) => {
            // ステータスにエラーを表示する。
            app.ui.status = format!("Error: {s}");
            app.ui.log.push(format!("ERROR: {s}"));
        }
    }
    Ok(())
}

/// ジョブフェーズをステータスバー用の文言へ変換する。
fn phase_status(s: &JobSnapshot) -> String {
    match s.phase {
        JobPhase::Idle => "Ready".into(),
        JobPhase::AwaitingPayment => {
            if s.is_payable {
                format!(
                    "Ready for payment: {} pages, total {} (press p)",
                    s.pages.map_or("?".into(), |p| p.to_string()),
                    s.amount.map_or("?".into(), |a| format!("{a:.2}")),
                )
            } else {
                "Awaiting payment".into()
            }
        }
        JobPhase::Verifying => "Verifying payment...".into(),
        JobPhase::Queued => "Payment confirmed, queued for translation".into(),
        JobPhase::Translating => format!("Translating... {}%", s.progress),
        JobPhase::Completed => "Translation completed".into(),
        JobPhase::Failed => format!(
            "Job failed: {}",
            s.failure.as_deref().unwrap_or("unknown error")
        ),
        JobPhase::VerificationTimeout => {
            "Payment verification timed out; check the tracking link".into()
        }
    }
}

/// 初期設定ウィザードが必要か判定する。
fn needs_initial_setup(cfg: &Config) -> bool {
    // 必須項目が未入力ならウィザード対象。
    cfg.api.base_url.is_empty()
        || cfg.translation.default_target_lang.is_empty()
        || cfg.user.full_name == "Your Name"
}
