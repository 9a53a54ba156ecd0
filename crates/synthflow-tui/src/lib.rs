mod app;
mod event;
mod input;
mod theme;
mod ui;
mod view;

use std::sync::Arc;

use synthflow_core::config::AppConfig;
use synthflow_core::event::EventBus;
use synthflow_flow::SharedFlow;

/// Launch the terminal UI over `flow` until the user quits.
pub async fn run_tui(
    config: &AppConfig,
    flow: SharedFlow,
    event_bus: Arc<EventBus>,
) -> anyhow::Result<()> {
    // Enter raw mode
    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    crossterm::execute!(
        stdout,
        crossterm::terminal::EnterAlternateScreen,
        crossterm::event::EnableMouseCapture
    )?;

    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let result = app::run_app(&mut terminal, config, flow, event_bus).await;

    // Restore terminal
    crossterm::terminal::disable_raw_mode()?;
    crossterm::execute!(
        terminal.backend_mut(),
        crossterm::terminal::LeaveAlternateScreen,
        crossterm::event::DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}
