//! キー入力ハンドラー関数。

use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::path::PathBuf;

use crate::{
    events::Screen,
    input::{InputBoxState, InputCallbackId},
    shortcuts,
    wizard::WizardStep,
    worker::WorkerCmd,
};

use super::{App, CheckoutKind};

/// キー入力を1件処理し、終了すべきならtrueを返す。
pub async fn handle_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが開いていれば最優先で処理する。
    if app.input_box.is_some() {
        return handle_input_box_key(app, k).await;
    }

    // 画面ごとのハンドラへ委譲する。
    match app.ui.screen {
        Screen::Main => handle_main_key(app, k).await,
        Screen::Settings => handle_settings_key(app, k).await,
        Screen::Wallet => handle_wallet_key(app, k).await,
        Screen::Checkout => handle_checkout_key(app, k).await,
        Screen::InitialSetup => handle_wizard_key(app, k).await,
    }
}

/// Ctrl+Cかどうかを判定する。
pub fn is_ctrl_c(k: &KeyEvent) -> bool {
    k.modifiers.contains(KeyModifiers::CONTROL) && k.code == KeyCode::Char('c')
}

/// メイン画面のキー処理。
async fn handle_main_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // メイン画面のショートカットを参照する。
    let sc = &app.shortcuts.main;

    if shortcuts::matches_shortcut(&k, &sc.quit) {
        return Ok(true);
    } else if shortcuts::matches_shortcut(&k, &sc.upload) {
        // アップロードするPDFのパス入力を促す。
        app.input_box = Some(InputBoxState::new(
            "PDF file path:",
            "",
            InputCallbackId::UploadFilePath,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.pay) {
        // 支払い可能になるまで決済は開始しない。
        if app.job.as_ref().is_some_and(|j| j.is_payable) {
            app.worker_tx.send(WorkerCmd::StartPayment).await?;
            app.ui.status = "Creating payment order...".into();
        } else {
            app.ui.status = "Job is not ready for payment yet".into();
        }
    } else if shortcuts::matches_shortcut(&k, &sc.wallet) {
        // ウォレット画面へ遷移し履歴を取得する。
        app.ui.screen = Screen::Wallet;
        app.worker_tx.send(WorkerCmd::RefreshWallet).await?;
        app.ui.status = "Loading wallet...".into();
    } else if shortcuts::matches_shortcut(&k, &sc.settings) {
        // 設定画面へ遷移し、編集バッファを更新する。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Settings;
        app.ui.status = "Settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.discard) {
        // 現在のジョブを破棄してポーリングを止める。
        app.worker_tx.send(WorkerCmd::DiscardJob).await?;
        app.upload_pct = None;
        app.ui.status = "Job discarded".into();
    }

    Ok(false)
}

/// 設定画面のキー処理。
async fn handle_settings_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 設定画面のショートカットを参照する。
    let sc = &app.shortcuts.settings;

    if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 変更を破棄してメイン画面へ戻る。
        reload_settings_buffers(app);
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.save) {
        // 編集バッファを設定へ反映する。
        app.cfg.api.base_url = app.base_url.clone();
        app.cfg.translation.default_target_lang = app.target_lang.clone();
        app.cfg.user.full_name = app.full_name.clone();
        // 設定ファイルを保存する。
        app.cfg.save(&app.cfg_path)?;

        // Workerにも設定更新を通知する。
        app.worker_tx
            .send(WorkerCmd::SaveSettings(app.cfg.clone()))
            .await?;
        // 画面状態を更新してメインへ戻る。
        app.ui.screen = Screen::Main;
        app.ui.status = "Saved settings".into();
    } else if shortcuts::matches_shortcut(&k, &sc.base_url) {
        // APIベースURLの入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "API base URL:",
            &app.base_url,
            InputCallbackId::SettingsBaseUrl,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.target_lang) {
        // 既定言語の入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Default target language:",
            &app.target_lang,
            InputCallbackId::SettingsTargetLang,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.name) {
        // 氏名の入力ボックスを開く。
        app.input_box = Some(InputBoxState::new(
            "Full name:",
            &app.full_name,
            InputCallbackId::SettingsFullName,
        ));
    }

    Ok(false)
}

/// ウォレット画面のキー処理。
async fn handle_wallet_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ウォレット画面のショートカットを参照する。
    let sc = &app.shortcuts.wallet;

    if shortcuts::matches_shortcut(&k, &sc.back) {
        // メイン画面へ戻る。
        app.ui.screen = Screen::Main;
    } else if shortcuts::matches_shortcut(&k, &sc.refresh) {
        // 履歴の再取得を依頼する。
        app.worker_tx.send(WorkerCmd::RefreshWallet).await?;
        app.ui.status = "Refreshing wallet...".into();
    } else if shortcuts::matches_shortcut(&k, &sc.top_up) {
        // チャージするパッケージIDの入力を促す。
        app.input_box = Some(InputBoxState::new(
            "Top-up package ID:",
            "",
            InputCallbackId::TopUpPackage,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.down) {
        // 次の行へ移動する。
        if app.ui.selected + 1 < app.wallet.len() {
            app.ui.selected += 1;
        }
    } else if shortcuts::matches_shortcut(&k, &sc.up) {
        // 前の行へ移動する。
        if app.ui.selected > 0 {
            app.ui.selected -= 1;
        }
    }

    Ok(false)
}

/// 決済結果入力画面のキー処理。
async fn handle_checkout_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 決済画面のショートカットを参照する。
    let sc = &app.shortcuts.checkout;

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 決済完了の参照コード入力を促す。
        let callback_id = match app.checkout_kind {
            Some(CheckoutKind::TopUp) => InputCallbackId::TopUpReference,
            _ => InputCallbackId::CheckoutReference,
        };
        app.input_box = Some(InputBoxState::new(
            "Payment reference (payment_id:signature):",
            "",
            callback_id,
        ));
    } else if shortcuts::matches_shortcut(&k, &sc.failed) {
        match app.checkout_kind {
            Some(CheckoutKind::TopUp) => {
                // チャージの失敗は破棄と同じ扱いにする。
                app.worker_tx.send(WorkerCmd::TopUpDismissed).await?;
                app.checkout_kind = None;
                app.ui.screen = Screen::Wallet;
            }
            _ => {
                // プロバイダが表示した失敗理由の入力を促す。
                app.input_box = Some(InputBoxState::new(
                    "Failure reason shown by checkout:",
                    "",
                    InputCallbackId::CheckoutFailure,
                ));
            }
        }
    } else if shortcuts::matches_shortcut(&k, &sc.dismiss) {
        // 支払わずに閉じた場合はキャンセルとして記録する。
        match app.checkout_kind {
            Some(CheckoutKind::TopUp) => {
                app.worker_tx.send(WorkerCmd::TopUpDismissed).await?;
                app.ui.screen = Screen::Wallet;
            }
            _ => {
                app.worker_tx.send(WorkerCmd::CheckoutDismissed).await?;
                app.ui.screen = Screen::Main;
            }
        }
        app.checkout_kind = None;
    }

    Ok(false)
}

/// 初期設定ウィザード画面のキー処理。
async fn handle_wizard_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // ウィザード画面のショートカットを参照する。
    let sc = &app.shortcuts.wizard;

    if shortcuts::matches_shortcut(&k, &sc.proceed) {
        match &app.wizard_state.current_step {
            WizardStep::Welcome => {
                // 次のステップへ進む。
                app.wizard_state.next_step();
            }
            WizardStep::CheckAuth => {
                // credentials.json の存在チェックを行う。
                if !std::path::Path::new(&app.cfg.auth.credentials_path).exists() {
                    app.ui.error = Some(format!(
                        "{} not found. Wallet features need it.",
                        app.cfg.auth.credentials_path
                    ));
                } else {
                    // エラーを解除して次へ進む。
                    app.ui.error = None;
                }
                // ウォレットを使わない利用もあるため存在しなくても進める。
                app.wizard_state.next_step();
            }
            WizardStep::ApiBaseUrl => {
                // APIベースURLの入力を促す。
                app.input_box = Some(InputBoxState::new(
                    "API base URL:",
                    &app.base_url,
                    InputCallbackId::WizardBaseUrl,
                ));
            }
            WizardStep::TargetLang => {
                // 既定言語の入力を促す。
                app.input_box = Some(InputBoxState::new(
                    "Default target language:",
                    &app.target_lang,
                    InputCallbackId::WizardTargetLang,
                ));
            }
            WizardStep::UserName => {
                // 氏名入力を促す。
                app.input_box = Some(InputBoxState::new(
                    "Your full name:",
                    &app.full_name,
                    InputCallbackId::WizardFullName,
                ));
            }
            WizardStep::Complete => {
                // 必須項目が揃っているか検証する。
                if app.base_url.is_empty() || app.target_lang.is_empty() {
                    app.ui.error = Some("Required fields are missing.".into());
                    app.wizard_state.current_step = WizardStep::ApiBaseUrl;
                    return Ok(false);
                }

                // 設定を保存する。
                app.cfg.api.base_url = app.base_url.clone();
                app.cfg.translation.default_target_lang = app.target_lang.clone();
                app.cfg.user.full_name = app.full_name.clone();
                app.cfg.save(&app.cfg_path)?;

                // Workerへ設定更新を通知する。
                app.worker_tx
                    .send(WorkerCmd::SaveSettings(app.cfg.clone()))
                    .await?;

                // メイン画面へ移動する。
                app.ui.screen = Screen::Main;
                app.ui.status = "Setup complete! Press u to upload a PDF.".into();
            }
        }
    } else if shortcuts::matches_shortcut(&k, &sc.skip) {
        // 現在のステップをスキップする。
        app.wizard_state.next_step();
    }

    Ok(false)
}

/// 入力ボックスのキー処理。
async fn handle_input_box_key(app: &mut App, k: KeyEvent) -> Result<bool> {
    // 入力ボックスが無ければ何もしない。
    let Some(input_state) = &mut app.input_box else {
        return Ok(false);
    };

    // 入力ボックス用ショートカットを参照する。
    let sc = &app.shortcuts.input_box;

    // 入力ボックス中でもCtrl+Cで終了できるようにする。
    if is_ctrl_c(&k) {
        return Ok(true);
    }

    if shortcuts::matches_shortcut(&k, &sc.confirm) {
        // 入力ボックスを閉じる前に値とコールバック種別を保存する。
        let value = input_state.value.clone();
        let callback_id = input_state.callback_id.clone();
        app.input_box = None;

        // コールバック種別に応じて値を反映する。
        apply_input_callback(app, callback_id, value).await?;
    } else if shortcuts::matches_shortcut(&k, &sc.cancel) {
        // 入力を破棄して入力ボックスを閉じる。
        app.input_box = None;
    } else if shortcuts::matches_shortcut(&k, &sc.backspace) {
        input_state.backspace();
    } else if shortcuts::matches_shortcut(&k, &sc.delete) {
        input_state.delete();
    } else if shortcuts::matches_shortcut(&k, &sc.left) {
        input_state.move_left();
    } else if shortcuts::matches_shortcut(&k, &sc.right) {
        input_state.move_right();
    } else if shortcuts::matches_shortcut(&k, &sc.home) {
        input_state.move_home();
    } else if shortcuts::matches_shortcut(&k, &sc.end) {
        input_state.move_end();
    } else if shortcuts::matches_shortcut(&k, &sc.clear_line) {
        input_state.clear_line();
    } else if let KeyCode::Char(c) = k.code {
        // コントロールキーでない通常の文字入力を処理する。
        if !k.modifiers.contains(KeyModifiers::CONTROL) {
            input_state.insert_char(c);
        }
    }

    Ok(false)
}

/// 入力ボックスのコールバックを適用する。
async fn apply_input_callback(
    app: &mut App,
    callback_id: InputCallbackId,
    value: String,
) -> Result<()> {
    match callback_id {
        InputCallbackId::SettingsBaseUrl => app.base_url = value,
        InputCallbackId::SettingsTargetLang => app.target_lang = value,
        InputCallbackId::SettingsFullName => app.full_name = value,

        InputCallbackId::UploadFilePath => {
            // 形式チェックはアップロード前にここで済ませる。
            let path = PathBuf::from(value.trim());
            if !path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) {
                app.ui.error = Some("Only PDF files can be uploaded.".into());
                return Ok(());
            }
            if !path.exists() {
                app.ui.error = Some(format!("File not found: {}", path.display()));
                return Ok(());
            }
            app.ui.error = None;
            // 続けて翻訳先言語の入力を促す。
            app.input_box = Some(InputBoxState::new(
                "Target language:",
                &app.cfg.translation.default_target_lang,
                InputCallbackId::UploadTargetLang {
                    path: path.to_string_lossy().into_owned(),
                },
            ));
        }
        InputCallbackId::UploadTargetLang { path } => {
            let lang = value.trim().to_string();
            if lang.is_empty() {
                app.ui.error = Some("Target language is required.".into());
                return Ok(());
            }
            app.ui.error = None;
            app.upload_pct = Some(0);
            // Workerへアップロード開始を依頼する。
            app.worker_tx
                .send(WorkerCmd::StartUpload {
                    path: PathBuf::from(path),
                    target_lang: lang,
                })
                .await?;
            app.ui.status = "Starting upload...".into();
        }

        InputCallbackId::CheckoutReference => match parse_payment_reference(&value) {
            Some((payment_id, signature)) => {
                app.worker_tx
                    .send(WorkerCmd::CheckoutCompleted {
                        payment_id,
                        signature,
                    })
                    .await?;
                app.checkout_kind = None;
                app.ui.screen = Screen::Main;
                app.ui.status = "Verifying payment...".into();
            }
            None => {
                app.ui.error = Some("Expected payment_id:signature".into());
            }
        },
        InputCallbackId::CheckoutFailure => {
            app.worker_tx
                .send(WorkerCmd::CheckoutFailed { description: value })
                .await?;
            app.checkout_kind = None;
            app.ui.screen = Screen::Main;
        }

        InputCallbackId::TopUpPackage => {
            let package_id = value.trim().to_string();
            if package_id.is_empty() {
                app.ui.error = Some("Package ID is required.".into());
                return Ok(());
            }
            app.ui.error = None;
            app.worker_tx.send(WorkerCmd::TopUp { package_id }).await?;
            app.ui.status = "Starting top-up...".into();
        }
        InputCallbackId::TopUpReference => match parse_payment_reference(&value) {
            Some((payment_id, signature)) => {
                app.worker_tx
                    .send(WorkerCmd::TopUpCompleted {
                        payment_id,
                        signature,
                    })
                    .await?;
                app.checkout_kind = None;
                app.ui.screen = Screen::Wallet;
                app.ui.status = "Verifying top-up...".into();
            }
            None => {
                app.ui.error = Some("Expected payment_id:signature".into());
            }
        },

        InputCallbackId::WizardBaseUrl => {
            // ウィザードのベースURLを更新し次へ進む。
            app.base_url = value;
            app.wizard_state.next_step();
        }
        InputCallbackId::WizardTargetLang => {
            // ウィザードの既定言語を更新し次へ進む。
            app.target_lang = value;
            app.wizard_state.next_step();
        }
        InputCallbackId::WizardFullName => {
            // ウィザードの氏名を更新し次へ進む。
            app.full_name = value;
            app.wizard_state.next_step();
        }
    }
    Ok(())
}

/// チェックアウトが表示する参照コードを分解する。
fn parse_payment_reference(value: &str) -> Option<(String, String)> {
    let (payment_id, signature) = value.trim().split_once(':')?;
    if payment_id.is_empty() || signature.is_empty() {
        return None;
    }
    Some((payment_id.to_string(), signature.to_string()))
}

/// 設定画面用の編集バッファを設定値から再読み込みする。
fn reload_settings_buffers(app: &mut App) {
    app.base_url = app.cfg.api.base_url.clone();
    app.target_lang = app.cfg.translation.default_target_lang.clone();
    app.full_name = app.cfg.user.full_name.clone();
}

#[cfg(test)]
mod tests {
    use super::parse_payment_reference;

    /// 参照コードの分解を検証する。
    #[test]
    fn payment_reference_parsing() {
        assert_eq!(
            parse_payment_reference("pay_abc:sig_xyz"),
            Some(("pay_abc".into(), "sig_xyz".into()))
        );
        assert_eq!(
            parse_payment_reference("  pay_abc:sig_xyz  "),
            Some(("pay_abc".into(), "sig_xyz".into()))
        );
        assert!(parse_payment_reference("pay_abc").is_none());
        assert!(parse_payment_reference(":sig").is_none());
        assert!(parse_payment_reference("pay:").is_none());
    }
}
