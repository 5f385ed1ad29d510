use anyhow::Context;
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tiggy_auth::build_auth_gate;
use tiggy_client::{HttpGateway, SessionController};
use tiggy_config::{ConfigManager, LocalState};
use tiggy_observability::{LogManager, LogSink};

mod app;
mod ui;

use app::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tiggy_config::init_tiggy_dirs().await?;
    let tiggy_dir = tiggy_config::tiggy_dir().context("Could not determine home directory")?;

    let manager = ConfigManager::load_default().await?;
    let config = manager.snapshot().await;

    // stdout belongs to the terminal UI, so logs always go to a file
    let log_path = config
        .logging
        .file
        .as_deref()
        .and_then(tiggy_config::expand_tilde)
        .or_else(tiggy_config::default_log_path)
        .context("Could not determine log file path")?;
    let _log_manager = LogManager::init(&config.logging, LogSink::File(log_path))?;
    tracing::info!("tiggy-tui starting");

    let auth = build_auth_gate(&config.auth, &tiggy_dir)?;
    let gateway = HttpGateway::new(&config.backend)?;
    let controller = SessionController::new(Arc::new(gateway))
        .with_reply_delay(Duration::from_millis(config.ui.reply_delay_ms));

    let mut app = App::new(
        controller,
        auth,
        LocalState::path_in(&tiggy_dir),
        std::env::current_dir()?,
        &config.ui,
    );
    app.start().await;

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    app.shutdown().await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        tracing::error!("TUI exited with error: {:?}", err);
        eprintln!("Error: {:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if crossterm::event::poll(tick_rate)? {
            if let Event::Key(key) = crossterm::event::read()? {
                if key.kind == KeyEventKind::Press && app.handle_key(key).await {
                    return Ok(());
                }
            }
        }

        // Send outcomes and login completion
        app.process_events().await;
    }
}
