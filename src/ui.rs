//! 端末のセットアップと後始末。

use anyhow::Result;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};

/// このアプリで使う端末ハンドルの型。
pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// rawモードを有効にして代替画面のTerminalを返す。
pub fn init_terminal() -> Result<Tui> {
    // 行バッファリングを無効化し、キーを1打ずつ受け取る。
    enable_raw_mode()?;
    // 元のシェル画面を壊さないよう代替画面へ切り替える。
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    Ok(Terminal::new(backend)?)
}

/// 端末をrawモード前の状態へ戻す。終了経路では必ず呼ぶこと。
pub fn restore_terminal() -> Result<()> {
    disable_raw_mode()?;
    // 代替画面から抜けて元の表示へ戻る。
    execute!(io::stdout(), LeaveAlternateScreen)?;
    Ok(())
}
