//! TUI描画関連の関数。

use ratatui::{
    Frame,
    prelude::*,
    widgets::{Block, Borders, Paragraph, Row, Table, Wrap},
};

use crate::{
    events::Screen,
    input,
    jobs::{JobPhase, JobSnapshot, PaymentStatus},
    layout,
    shortcuts::Shortcuts,
};

use super::{App, CheckoutKind};

/// 画面全体のレイアウトを描画する。
pub fn draw(f: &mut Frame, app: &App) {
    // ウィザード画面は専用描画で処理する。
    if app.ui.screen == Screen::InitialSetup {
        draw_wizard_screen(f, app);
        // 入力ボックスが開いていれば重ねて描画する。
        if let Some(input_state) = &app.input_box {
            input::render_input_box(f, input_state);
        }
        return;
    }

    // メインレイアウト（Body + HELP + STATUS）を作る。
    let main_layout = layout::create_main_layout(f.area());
    let body_layout = layout::create_body_layout(main_layout.body);

    // 左パネルは画面ごとに内容を切り替える。
    match app.ui.screen {
        Screen::Wallet => draw_wallet_panel(f, app, body_layout.job_panel),
        Screen::Checkout => draw_checkout_panel(f, app, body_layout.job_panel),
        _ => draw_job_panel(f, app, body_layout.job_panel),
    }

    // 右パネル：設定値と直近ログを表示する。
    let side_text = build_side_text(app);
    let side_panel = Paragraph::new(side_text)
        .block(Block::default().borders(Borders::ALL).title("INFO"))
        .wrap(Wrap { trim: true });
    f.render_widget(side_panel, body_layout.side_panel);

    // HELPバー（画面ごとのショートカット）を描画する。
    let help_text = get_help_text(&app.ui.screen, &app.shortcuts);
    let help_bar = Paragraph::new(help_text)
        .block(Block::default().borders(Borders::ALL).title("HELP"))
        .wrap(Wrap { trim: true });
    f.render_widget(help_bar, main_layout.help_bar);

    // STATUSバー（画面名・フェーズ・エラー）を描画する。
    let status_bar = build_status_bar(app);
    f.render_widget(status_bar, main_layout.status_bar);

    // 入力ボックスが開いていれば重ねて描画する。
    if let Some(input_state) = &app.input_box {
        input::render_input_box(f, input_state);
    }
}

/// ジョブパネルを描画する。
fn draw_job_panel(f: &mut Frame, app: &App, area: Rect) {
    let text = match &app.job {
        Some(j) => build_job_text(app, j),
        None => "No active job.\n\nPress u to upload a PDF for translation.".to_string(),
    };

    let panel = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("JOB"))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

/// 現在のジョブの詳細テキストを構築する。
fn build_job_text(app: &App, j: &JobSnapshot) -> String {
    let mut lines = vec![
        format!("Job ID: {}", j.job_id.as_deref().unwrap_or("-")),
        format!("Phase: {}", phase_label(&j.phase)),
    ];

    // アップロード中はプログレスバーを表示する。
    if let Some(pct) = app.upload_pct {
        lines.push(format!("Upload: {} {}%", progress_bar(pct), pct));
    }

    // 解析結果（料金・ページ数）が出ていれば表示する。
    if let Some(amount) = j.amount {
        lines.push(format!("Price: {:.2}", amount));
    }
    if let Some(pages) = j.pages {
        lines.push(format!("Pages: {}", pages));
    }
    if let Some(expires) = &j.expires_at {
        lines.push(format!("Expires: {}", expires.format("%Y-%m-%d %H:%M UTC")));
    }

    // 決済の進行状況を表示する。
    match &j.payment {
        PaymentStatus::Pending => {
            if j.is_payable {
                lines.push(String::new());
                lines.push("Ready for payment. Press p to pay.".into());
            }
        }
        PaymentStatus::Verifying => lines.push("Payment: verifying...".into()),
        PaymentStatus::Success => lines.push("Payment: confirmed".into()),
        PaymentStatus::Failed => {
            let reason = j.payment_error.as_deref().unwrap_or("unknown");
            lines.push(format!("Payment failed: {}", reason));
            lines.push("Press p to retry.".into());
        }
        PaymentStatus::Cancelled => {
            lines.push("Payment cancelled. Press p to retry.".into());
        }
        PaymentStatus::Timeout => {
            lines.push("Payment confirmation timed out.".into());
            lines.push("Check the recovery file for the tracking URL.".into());
        }
    }

    // 翻訳中は進捗バーを表示する。
    if matches!(j.phase, JobPhase::Queued | JobPhase::Translating) {
        lines.push(format!(
            "Translation: {} {}%",
            progress_bar(j.progress),
            j.progress
        ));
    }

    // 完了時はダウンロードURLを表示する。
    if let Some(urls) = &j.download_urls {
        lines.push(String::new());
        lines.push("Translated documents:".into());
        lines.push(format!("  PDF:  {}", urls.pdf_url));
        lines.push(format!("  DOCX: {}", urls.docx_url));
    }

    // 失敗理由があれば表示する。
    if let Some(reason) = &j.failure {
        lines.push(String::new());
        lines.push(format!("Failed: {}", reason));
    }

    lines.join("\n")
}

/// ウォレット履歴のテーブルを描画する。
fn draw_wallet_panel(f: &mut Frame, app: &App, area: Rect) {
    // 取引一覧からテーブル行を組み立てる。
    let rows = app.wallet.iter().map(|t| {
        Row::new(vec![
            t.created_at
                .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".into()),
            t.kind.clone(),
            format!("{:+}", t.amount),
            t.note.clone().unwrap_or_default(),
        ])
    });

    // ウォレットテーブルのウィジェットを構築する。
    let table = Table::new(
        rows,
        [
            Constraint::Length(17),
            Constraint::Length(8),
            Constraint::Length(10),
            Constraint::Min(10),
        ],
    )
    .block(Block::default().borders(Borders::ALL).title("WALLET"))
    .header(Row::new(vec!["date", "type", "amount", "note"]).bold())
    .row_highlight_style(
        Style::default()
            .bg(Color::Rgb(255, 140, 0)) // オレンジ色の背景
            .fg(Color::Black) // 黒文字
            .add_modifier(Modifier::BOLD),
    );

    // 選択中の行をハイライトする。
    let mut table_state = ratatui::widgets::TableState::default();
    if !app.wallet.is_empty() {
        table_state.select(Some(app.ui.selected));
    }
    f.render_stateful_widget(table, area, &mut table_state);
}

/// 決済結果入力の案内パネルを描画する。
fn draw_checkout_panel(f: &mut Frame, app: &App, area: Rect) {
    let what = match app.checkout_kind {
        Some(CheckoutKind::TopUp) => "wallet top-up",
        _ => "translation job",
    };

    // ブラウザ側で完了した結果をこの画面で報告してもらう。
    let text = format!(
        "A checkout page for the {} was opened in your browser.\n\n\
         Complete the payment there, then report the result here:\n\n\
         - Enter: paste the payment reference (payment_id:signature)\n\
         - f: the checkout showed a failure\n\
         - Esc: you closed the checkout without paying",
        what
    );

    let panel = Paragraph::new(text)
        .block(Block::default().borders(Borders::ALL).title("CHECKOUT"))
        .wrap(Wrap { trim: true });
    f.render_widget(panel, area);
}

/// 右パネル用のテキストを構築する。
fn build_side_text(app: &App) -> String {
    format!(
        "API: {}\nLang: {}\nName: {}\n\nLog:\n{}",
        app.cfg.api.base_url,
        app.cfg.translation.default_target_lang,
        app.cfg.user.full_name,
        app.ui
            .log
            .iter()
            .rev()
            .take(8)
            .rev()
            .cloned()
            .collect::<Vec<_>>()
            .join("\n"),
    )
}

/// ステータスバーを構築する。
fn build_status_bar(app: &App) -> Paragraph<'static> {
    let screen_name = match app.ui.screen {
        Screen::Main => "Main",
        Screen::Settings => "Settings",
        Screen::Wallet => "Wallet",
        Screen::Checkout => "Checkout",
        Screen::InitialSetup => "Setup",
    };

    // 現在フェーズの短いラベルを組み立てる。
    let phase_info = match &app.job {
        Some(j) => format!("Phase: {}", phase_label(&j.phase)),
        None => "Phase: -".to_string(),
    };

    // エラーの有無でステータス文字列を切り替える。
    let status_text = if let Some(err) = &app.ui.error {
        format!("[{}] {} | ERROR: {}", screen_name, phase_info, err)
    } else {
        format!("[{}] {} | {}", screen_name, phase_info, app.ui.status)
    };

    // ステータスバーのウィジェットを生成する。
    let mut status_bar = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("STATUS"))
        .wrap(Wrap { trim: true });

    // エラー時は赤色で強調表示する。
    if app.ui.error.is_some() {
        status_bar = status_bar.style(Style::default().fg(Color::Red));
    }

    status_bar
}

/// ウィザード画面を描画する。
fn draw_wizard_screen(f: &mut Frame, app: &App) {
    // 余白込みで縦方向に3分割する。
    let outer_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(20), // 上部マージン
            Constraint::Min(10),        // 本文領域
            Constraint::Percentage(20), // 下部マージン
        ])
        .split(f.area());

    // ステップ番号と総数、プロンプトを取得する。
    let step_num = app.wizard_state.get_step_number();
    let total_steps = app.wizard_state.total_steps;
    let prompt = app.wizard_state.get_prompt();

    // 表示するテキストを組み立てる。
    let content_text = format!(
        "=== Initial Setup Wizard ===\n\nStep {}/{}\n\n{}\n\nPress Enter to proceed, ESC to skip step.",
        step_num, total_steps, prompt
    );

    // メインの本文を描画する。
    let content = Paragraph::new(content_text)
        .block(Block::default().borders(Borders::ALL).title("Setup"))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(content, outer_layout[1]);

    // エラーがあれば下部に表示する。
    if let Some(err) = &app.ui.error {
        // エラー表示用のレイアウトを作成する。
        let error_layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(3)])
            .split(f.area());

        // エラー用のパネルを構成する。
        let error_text = Paragraph::new(format!("ERROR: {}", err))
            .block(Block::default().borders(Borders::ALL).title("Error"))
            .style(Style::default().fg(Color::Red))
            .wrap(Wrap { trim: true });

        // エラー表示を描画する。
        f.render_widget(error_text, error_layout[1]);
    }
}

/// 現在画面に応じたヘルプ文字列を返す。
fn get_help_text(screen: &Screen, shortcuts: &Shortcuts) -> String {
    match screen {
        Screen::Main => format!(
            "{}: quit | {}: upload | {}: pay | {}: wallet | {}: settings | {}: discard",
            format_keys(&shortcuts.main.quit),
            format_keys(&shortcuts.main.upload),
            format_keys(&shortcuts.main.pay),
            format_keys(&shortcuts.main.wallet),
            format_keys(&shortcuts.main.settings),
            format_keys(&shortcuts.main.discard)
        ),
        Screen::Settings => format!(
            "{}: base URL | {}: language | {}: name | {}: save | {}: cancel",
            format_keys(&shortcuts.settings.base_url),
            format_keys(&shortcuts.settings.target_lang),
            format_keys(&shortcuts.settings.name),
            format_keys(&shortcuts.settings.save),
            format_keys(&shortcuts.settings.cancel)
        ),
        Screen::Wallet => format!(
            "{}: back | {}: refresh | {}: top up | {}/{}: navigate",
            format_keys(&shortcuts.wallet.back),
            format_keys(&shortcuts.wallet.refresh),
            format_keys(&shortcuts.wallet.top_up),
            format_keys(&shortcuts.wallet.up),
            format_keys(&shortcuts.wallet.down)
        ),
        Screen::Checkout => format!(
            "{}: report success | {}: report failure | {}: dismissed",
            format_keys(&shortcuts.checkout.confirm),
            format_keys(&shortcuts.checkout.failed),
            format_keys(&shortcuts.checkout.dismiss)
        ),
        Screen::InitialSetup => format!(
            "Follow wizard steps | {}: proceed | {}: skip step",
            format_keys(&shortcuts.wizard.proceed),
            format_keys(&shortcuts.wizard.skip)
        ),
    }
}

/// ショートカットキーの配列を表示用文字列に変換する。
fn format_keys(keys: &[String]) -> String {
    keys.join("/")
}

/// ジョブのフェーズを表示用の短いラベルへ変換する。
fn phase_label(p: &JobPhase) -> &'static str {
    match p {
        JobPhase::Idle => "Idle",
        JobPhase::AwaitingPayment => "AwaitingPayment",
        JobPhase::Verifying => "Verifying",
        JobPhase::Queued => "Queued",
        JobPhase::Translating => "Translating",
        JobPhase::Completed => "Completed",
        JobPhase::Failed => "Failed",
        JobPhase::VerificationTimeout => "VerifyTimeout",
    }
}

/// テキストのプログレスバーを組み立てる。
fn progress_bar(pct: u8) -> String {
    let filled = (pct as usize).min(100) / 10;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(10 - filled))
}

#[cfg(test)]
mod tests {
    use super::progress_bar;

    /// プログレスバーの目盛りを検証する。
    #[test]
    fn progress_bar_ticks() {
        assert_eq!(progress_bar(0), "[----------]");
        assert_eq!(progress_bar(55), "[#####-----]");
        assert_eq!(progress_bar(100), "[##########]");
    }
}
