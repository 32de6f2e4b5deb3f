//! 初期設定ウィザードのステート管理。

/// ウィザードの各ステップ
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WizardStep {
    /// ウェルカムメッセージ
    Welcome,
    /// サインイン設定の確認
    CheckAuth,
    /// APIベースURL
    ApiBaseUrl,
    /// 既定の翻訳先言語
    TargetLang,
    /// ユーザー名
    UserName,
    /// 完了
    Complete,
}

/// ウィザードの状態管理
#[derive(Clone, Debug)]
pub struct WizardState {
    /// 現在のステップ
    pub current_step: WizardStep,
    /// 全ステップ数
    pub total_steps: usize,
}

impl WizardState {
    /// 新しいウィザード状態を作成
    pub fn new() -> Self {
        // 最初はWelcomeステップから開始する。
        Self {
            current_step: WizardStep::Welcome,
            total_steps: 6,
        }
    }

    /// 次のステップへ進む
    pub fn next_step(&mut self) {
        // 現在のステップに応じて次のステップを決定する。
        self.current_step = match self.current_step {
            WizardStep::Welcome => WizardStep::CheckAuth,
            WizardStep::CheckAuth => WizardStep::ApiBaseUrl,
            WizardStep::ApiBaseUrl => WizardStep::TargetLang,
            WizardStep::TargetLang => WizardStep::UserName,
            WizardStep::UserName => WizardStep::Complete,
            WizardStep::Complete => WizardStep::Complete,
        };
    }

    /// 現在のステップのプロンプトメッセージを取得
    pub fn get_prompt(&self) -> String {
        // ステップごとの説明文を返す。
        match self.current_step {
            WizardStep::Welcome => {
                "polyglot_tuiへようこそ！\n\nこのウィザードでは、PDF翻訳サービスの初期設定を行います。\nEnterキーを押して開始してください。".to_string()
            }
            WizardStep::CheckAuth => {
                "サインイン設定の確認中...\n\ncredentials.json（IDプロバイダのクライアント情報）が必要です。\nウォレット機能の利用に使われます。Enterキーで次へ進みます。".to_string()
            }
            WizardStep::ApiBaseUrl => {
                "APIベースURLの設定\n\n翻訳サービスAPIのベースURLを入力してください。\n通常は既定値のままで構いません。Enterキーで入力画面を開きます。".to_string()
            }
            WizardStep::TargetLang => {
                "既定の翻訳先言語の設定\n\nアップロード時に選択される言語コード（例: en, ja, fr）を入力してください。\nEnterキーで入力画面を開きます。".to_string()
            }
            WizardStep::UserName => {
                "ユーザー名の設定\n\nダッシュボードに表示する氏名を入力してください。\nEnterキーで入力画面を開きます。".to_string()
            }
            WizardStep::Complete => {
                "設定完了！\n\nすべての設定が完了しました。\nEnterキーを押してメイン画面に移動します。".to_string()
            }
        }
    }

    /// 現在のステップ番号を取得（1始まり）
    pub fn get_step_number(&self) -> usize {
        // ステップを番号へ対応付ける。
        match self.current_step {
            WizardStep::Welcome => 1,
            WizardStep::CheckAuth => 2,
            WizardStep::ApiBaseUrl => 3,
            WizardStep::TargetLang => 4,
            WizardStep::UserName => 5,
            WizardStep::Complete => 6,
        }
    }
}

impl Default for WizardState {
    fn default() -> Self {
        Self::new()
    }
}
