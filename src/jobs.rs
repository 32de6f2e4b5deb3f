//! 翻訳ジョブの状態機械と決済ステータスのモデル。

use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;

/// クライアントから見たジョブのライフサイクル段階。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobPhase {
    /// ジョブ未作成（初期状態）。
    Idle,
    /// ファイル検証済みで支払い待ち。
    AwaitingPayment,
    /// 決済完了のwebhook確認中。
    Verifying,
    /// 支払い確定済みで翻訳キュー投入済み。
    Queued,
    /// 翻訳処理の実行中。
    Translating,
    /// 翻訳完了（ダウンロード可能）。
    Completed,
    /// バックエンド報告の失敗（終端）。
    Failed,
    /// webhook確認の試行回数を使い切った状態。
    VerificationTimeout,
}

/// 決済試行のステータス（リロードを跨いで保持しない）。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PaymentStatus {
    /// チェックアウト未完了。
    Pending,
    /// クライアント側成功、webhook確認待ち。
    Verifying,
    /// バックエンドが決済を確定済み。
    Success,
    /// 決済プロバイダが失敗を報告。
    Failed,
    /// ユーザーがチェックアウトを閉じた。
    Cancelled,
    /// 確認ポーリングがタイムアウト。
    Timeout,
}

/// 完了時に公開されるダウンロード先URLの組。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadUrls {
    /// 翻訳済みPDFのURL。
    pub pdf_url: String,
    /// 翻訳済みDOCXのURL。
    pub docx_url: String,
}

/// 1件の翻訳ジョブを表す状態機械。
///
/// フィールドは非公開とし、遷移メソッド経由でのみ書き換える。
/// `download_urls` は `complete` でのみ設定され、`is_payable` は
/// `mark_payable` でのみ真になる。
#[derive(Debug)]
pub struct JobState {
    /// バックエンドが払い出すジョブID。
    job_id: Option<String>,
    /// アップロード/支払いウィンドウの有効期限。
    expires_at: Option<DateTime<Utc>>,
    /// 算出済みの料金（解析完了まで None）。
    amount: Option<f64>,
    /// 検出されたページ数（解析完了まで None）。
    pages: Option<u32>,
    /// 整合性・MIME検証の両方を通過したか。
    is_payable: bool,
    /// 現在のライフサイクル段階。
    phase: JobPhase,
    /// 決済試行のステータス。
    payment: PaymentStatus,
    /// 決済失敗時の詳細メッセージ。
    payment_error: Option<String>,
    /// 翻訳進捗（0..=100、単調非減少）。
    progress: u8,
    /// 完了時のダウンロードURL。
    download_urls: Option<DownloadUrls>,
    /// ジョブ失敗時の理由。
    failure: Option<String>,
}

/// Worker内のパイプライン間で共有するジョブ状態。
pub type SharedJob = Arc<Mutex<JobState>>;

/// UI描画用のスナップショット（読み取り専用コピー）。
#[derive(Clone, Debug)]
pub struct JobSnapshot {
    pub job_id: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub amount: Option<f64>,
    pub pages: Option<u32>,
    pub is_payable: bool,
    pub phase: JobPhase,
    pub payment: PaymentStatus,
    pub payment_error: Option<String>,
    pub progress: u8,
    pub download_urls: Option<DownloadUrls>,
    pub failure: Option<String>,
}

impl Default for JobState {
    fn default() -> Self {
        Self::new()
    }
}

impl JobState {
    /// 空の初期状態を作成する。
    pub fn new() -> Self {
        Self {
            job_id: None,
            expires_at: None,
            amount: None,
            pages: None,
            is_payable: false,
            phase: JobPhase::Idle,
            payment: PaymentStatus::Pending,
            payment_error: None,
            progress: 0,
            download_urls: None,
            failure: None,
        }
    }

    /// 共有ハンドル付きで初期状態を作成する。
    pub fn shared() -> SharedJob {
        Arc::new(Mutex::new(Self::new()))
    }

    /// 現在値のスナップショットを返す。
    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.job_id.clone(),
            expires_at: self.expires_at,
            amount: self.amount,
            pages: self.pages,
            is_payable: self.is_payable,
            phase: self.phase.clone(),
            payment: self.payment.clone(),
            payment_error: self.payment_error.clone(),
            progress: self.progress,
            download_urls: self.download_urls.clone(),
            failure: self.failure.clone(),
        }
    }

    /// 現在のジョブIDを返す。
    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// 支払い可能かどうかを返す。
    pub fn is_payable(&self) -> bool {
        self.is_payable
    }

    /// 新しいアップロードの開始。以前のジョブを破棄して識別子を記録する。
    ///
    /// init応答を受け取った直後、バイト転送より前に呼ぶこと。
    pub fn begin(&mut self, job_id: String, expires_at: Option<DateTime<Utc>>) {
        // 前のジョブの値が残らないよう全体を初期化する。
        *self = Self::new();
        self.job_id = Some(job_id);
        self.expires_at = expires_at;
    }

    /// バックエンドの検証完了を反映し、支払い可能にする。
    pub fn mark_payable(&mut self, amount: Option<f64>, pages: Option<u32>) -> Result<()> {
        if self.phase != JobPhase::Idle {
            bail!("mark_payable: invalid from {:?}", self.phase);
        }
        if self.job_id.is_none() {
            bail!("mark_payable: no job");
        }
        self.is_payable = true;
        self.amount = amount;
        self.pages = pages;
        self.phase = JobPhase::AwaitingPayment;
        Ok(())
    }

    /// チェックアウト成功コールバック直後の楽観的遷移。
    ///
    /// 最終確定はwebhook確認で行うため、Successではなく
    /// Verifyingに留める（二段階シグナルを維持する）。
    pub fn payment_verifying(&mut self) -> Result<()> {
        if self.phase != JobPhase::AwaitingPayment {
            bail!("payment_verifying: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::Verifying;
        self.payment = PaymentStatus::Verifying;
        Ok(())
    }

    /// 決済プロバイダの失敗コールバックを記録する。
    pub fn payment_failed(&mut self, description: String) -> Result<()> {
        if !matches!(self.phase, JobPhase::AwaitingPayment | JobPhase::Verifying) {
            bail!("payment_failed: invalid from {:?}", self.phase);
        }
        // やり直しはユーザー操作に委ねるため段階はAwaitingPaymentへ戻す。
        self.phase = JobPhase::AwaitingPayment;
        self.payment = PaymentStatus::Failed;
        self.payment_error = Some(description);
        Ok(())
    }

    /// チェックアウトを完了せず閉じた場合を記録する。
    pub fn payment_cancelled(&mut self) -> Result<()> {
        if self.phase != JobPhase::AwaitingPayment {
            bail!("payment_cancelled: invalid from {:?}", self.phase);
        }
        self.payment = PaymentStatus::Cancelled;
        self.payment_error = None;
        Ok(())
    }

    /// webhook確認の試行回数を使い切った場合の遷移。
    ///
    /// 決済失敗とは別扱い（決済自体は成功している可能性が高い）。
    pub fn payment_timed_out(&mut self) -> Result<()> {
        if self.phase != JobPhase::Verifying {
            bail!("payment_timed_out: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::VerificationTimeout;
        self.payment = PaymentStatus::Timeout;
        Ok(())
    }

    /// webhook確認に成功し、翻訳キューへ投入されたことを反映する。
    pub fn queued(&mut self) -> Result<()> {
        if self.phase != JobPhase::Verifying {
            bail!("queued: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::Queued;
        self.payment = PaymentStatus::Success;
        self.payment_error = None;
        Ok(())
    }

    /// 翻訳進捗を更新する。進捗は単調非減少かつ0..=100に収める。
    pub fn translating(&mut self, pct: u8) -> Result<()> {
        if !matches!(self.phase, JobPhase::Queued | JobPhase::Translating) {
            bail!("translating: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::Translating;
        self.progress = self.progress.max(pct.min(100));
        Ok(())
    }

    /// 完了状態へ遷移する。ダウンロードURLはここでのみ設定できる。
    pub fn complete(&mut self, urls: DownloadUrls) -> Result<()> {
        if !matches!(self.phase, JobPhase::Queued | JobPhase::Translating) {
            bail!("complete: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::Completed;
        self.progress = 100;
        self.download_urls = Some(urls);
        Ok(())
    }

    /// バックエンド報告の失敗を記録する（終端）。
    pub fn fail(&mut self, reason: String) -> Result<()> {
        if !matches!(
            self.phase,
            JobPhase::AwaitingPayment
                | JobPhase::Verifying
                | JobPhase::Queued
                | JobPhase::Translating
        ) {
            bail!("fail: invalid from {:?}", self.phase);
        }
        self.phase = JobPhase::Failed;
        self.failure = Some(reason);
        Ok(())
    }

    /// 全フィールドを初期状態へ戻す。
    pub fn reset(&mut self) {
        *self = Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 正常系の一連の遷移を検証する。
    #[test]
    fn full_lifecycle_transitions() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        assert_eq!(j.job_id(), Some("abc123"));
        assert!(!j.is_payable());

        j.mark_payable(Some(499.0), Some(12)).unwrap();
        assert!(j.is_payable());
        assert_eq!(j.snapshot().phase, JobPhase::AwaitingPayment);

        j.payment_verifying().unwrap();
        assert_eq!(j.snapshot().payment, PaymentStatus::Verifying);

        j.queued().unwrap();
        assert_eq!(j.snapshot().payment, PaymentStatus::Success);

        j.translating(40).unwrap();
        j.translating(70).unwrap();
        j.complete(DownloadUrls {
            pdf_url: "https://cdn.example/p.pdf".into(),
            docx_url: "https://cdn.example/p.docx".into(),
        })
        .unwrap();

        let s = j.snapshot();
        assert_eq!(s.phase, JobPhase::Completed);
        assert_eq!(s.progress, 100);
        assert!(s.download_urls.is_some());
    }

    /// 完了前にダウンロードURLを設定できないことを検証する。
    #[test]
    fn complete_rejected_before_queued() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        let urls = DownloadUrls {
            pdf_url: "x".into(),
            docx_url: "y".into(),
        };
        // Idleからの完了は不正。
        assert!(j.complete(urls.clone()).is_err());
        j.mark_payable(None, None).unwrap();
        // 支払い待ちからの完了も不正。
        assert!(j.complete(urls).is_err());
        assert!(j.snapshot().download_urls.is_none());
    }

    /// 進捗の単調性とクランプを検証する。
    #[test]
    fn progress_is_monotonic_and_clamped() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        j.mark_payable(None, None).unwrap();
        j.payment_verifying().unwrap();
        j.queued().unwrap();

        j.translating(30).unwrap();
        // 後退する値は無視される。
        j.translating(10).unwrap();
        assert_eq!(j.snapshot().progress, 30);
        // 100を超える値は100に丸める。
        j.translating(200).unwrap();
        assert_eq!(j.snapshot().progress, 100);
    }

    /// 閉じただけのチェックアウトはCancelledになり、段階は動かない。
    #[test]
    fn dismiss_records_cancelled_only() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        j.mark_payable(Some(100.0), Some(3)).unwrap();
        j.payment_cancelled().unwrap();

        let s = j.snapshot();
        assert_eq!(s.payment, PaymentStatus::Cancelled);
        assert_eq!(s.phase, JobPhase::AwaitingPayment);
        // キャンセル後もverifyingへの遷移は可能（再試行）。
        assert!(j.payment_verifying().is_ok());
    }

    /// タイムアウトはVerifyingからのみ到達できる専用状態。
    #[test]
    fn timeout_only_from_verifying() {
        let mut j = JobState::new();
        j.begin("abc123".into(), None);
        j.mark_payable(None, None).unwrap();
        assert!(j.payment_timed_out().is_err());
        j.payment_verifying().unwrap();
        j.payment_timed_out().unwrap();
        let s = j.snapshot();
        assert_eq!(s.phase, JobPhase::VerificationTimeout);
        assert_eq!(s.payment, PaymentStatus::Timeout);
    }

    /// beginで前ジョブの値が完全に消えることを検証する。
    #[test]
    fn begin_discards_previous_job() {
        let mut j = JobState::new();
        j.begin("first".into(), None);
        j.mark_payable(Some(10.0), Some(1)).unwrap();
        j.begin("second".into(), None);

        let s = j.snapshot();
        assert_eq!(s.job_id.as_deref(), Some("second"));
        assert!(!s.is_payable);
        assert_eq!(s.progress, 0);
        assert!(s.amount.is_none());
    }
}
