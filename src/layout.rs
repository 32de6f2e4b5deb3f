//! レイアウト計算のヘルパー関数

use ratatui::prelude::*;

/// メインレイアウトの領域
pub struct MainLayout {
    /// Job Panel + サイドパネルの領域
    pub body: Rect,
    /// HELPバーの領域
    pub help_bar: Rect,
    /// STATUSバーの領域
    pub status_bar: Rect,
}

/// ボディ部の2つの領域（Job Panel + サイドパネル）
pub struct BodyLayout {
    /// ジョブ状況パネルの領域
    pub job_panel: Rect,
    /// ログやウォレットを表示するサイドパネルの領域
    pub side_panel: Rect,
}

/// メイン画面を3つの領域に分割（Body + HELP + STATUS）
pub fn create_main_layout(area: Rect) -> MainLayout {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Body（Job Panel + サイドパネル）
            Constraint::Length(3), // HELPバー
            Constraint::Length(3), // STATUSバー
        ])
        .split(area);

    MainLayout {
        body: chunks[0],
        help_bar: chunks[1],
        status_bar: chunks[2],
    }
}

/// Body領域を2つに分割（Job Panel 60% + サイドパネル 40%）
pub fn create_body_layout(area: Rect) -> BodyLayout {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(60), // Job Panel
            Constraint::Percentage(40), // サイドパネル
        ])
        .split(area);

    BodyLayout {
        job_panel: chunks[0],
        side_panel: chunks[1],
    }
}
