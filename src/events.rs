//! 画面遷移用のUI状態と画面種別。

/// TUIで現在表示中の画面。
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Screen {
    /// ジョブ状況を表示するメイン画面。
    Main,
    /// 設定編集画面。
    Settings,
    /// ウォレット（残高履歴とチャージ）画面。
    Wallet,
    /// ブラウザ決済の結果入力画面。
    Checkout,
    /// 初期設定ウィザード画面。
    InitialSetup,
}

/// 描画側と共有するUI状態。
#[derive(Clone, Debug)]
pub struct UiState {
    /// 現在の画面。
    pub screen: Screen,
    /// ウォレット履歴の選択行。
    pub selected: usize,
    /// 右側パネルに表示するログ。
    pub log: Vec<String>,
    /// 画面下部のステータス文言。
    pub status: String,
    /// エラーメッセージ（強調表示用）。
    pub error: Option<String>,
}
