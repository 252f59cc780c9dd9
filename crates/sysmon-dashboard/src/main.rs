mod config;
mod state;
#[cfg(test)]
mod testing;
mod theme;
mod ui;

use anyhow::{Context, Result};
use config::Config;
use crossterm::{
    event::{
        DisableFocusChange, DisableMouseCapture, EnableFocusChange, EnableMouseCapture, Event,
        EventStream, KeyEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs::OpenOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use sysmon_client::HttpBackend;
use sysmon_sync::{FetchDriver, FileStore, ResolveOutcome, SystemClock};
use tokio::sync::mpsc;
use tracing::{debug, info};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::load_config();
    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("creating state dir {}", config.state_dir.display()))?;
    init_logging(&config);

    let store = FileStore::open(config.view_state_path())
        .with_context(|| format!("opening {}", config.view_state_path().display()))?;
    let backend = HttpBackend::new(&config.api_url, config.token.clone())
        .with_context(|| format!("configuring backend {}", config.api_url))?;
    info!(
        event = "dashboard_start",
        api_url = %backend.base_url(),
        authenticated = config.token.is_some()
    );

    let (driver, completions) = FetchDriver::channel();
    let (action_tx, actions) = mpsc::unbounded_channel();
    let app = state::App::new(
        config,
        Arc::new(backend),
        Arc::new(store),
        Arc::new(SystemClock::new()),
        driver,
        action_tx,
    );

    let mut terminal = setup_terminal()?;
    let result = run_app(&mut terminal, app, completions, actions).await;
    restore_terminal(&mut terminal)?;

    if let Err(err) = result {
        eprintln!("sysmon-dashboard: {err}");
    }
    Ok(())
}

fn init_logging(config: &Config) {
    let level = if config.debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("SYSMON_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // The terminal belongs to the UI, so logs only ever go to the file.
    let file = match OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_path())
    {
        Ok(file) => file,
        Err(err) => {
            eprintln!("log_file_error: {err}");
            return;
        }
    };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(BoxMakeWriter::new(Arc::new(file)))
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableFocusChange
    )?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableFocusChange
    )?;
    terminal.show_cursor()?;
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut app: state::App,
    mut completions: mpsc::UnboundedReceiver<sysmon_sync::FetchCompletion<state::Payload>>,
    mut actions: mpsc::UnboundedReceiver<state::ActionOutcome>,
) -> Result<()> {
    let mut events = EventStream::new();
    let mut ticker = tokio::time::interval(TICK);

    loop {
        terminal.draw(|f| ui::render(f, &mut app))?;

        tokio::select! {
            _ = ticker.tick() => {
                app.on_tick();
            }
            Some(completion) = completions.recv() => {
                let key = completion.key.clone();
                let outcome = completion.apply(&mut app.cache);
                if outcome != ResolveOutcome::Applied {
                    debug!(event = "fetch_discarded", key = %key, outcome = ?outcome);
                }
            }
            Some(outcome) = actions.recv() => {
                app.finish_action(outcome);
            }
            maybe_event = events.next() => {
                match maybe_event {
                    Some(Ok(event)) => handle_event(&mut app, event),
                    Some(Err(err)) => return Err(err.into()),
                    None => break,
                }
            }
        }

        if app.should_quit {
            break;
        }
    }

    info!(event = "dashboard_exit");
    Ok(())
}

fn handle_event(app: &mut state::App, event: Event) {
    match event {
        Event::Key(key) => {
            if matches!(key.kind, KeyEventKind::Press | KeyEventKind::Repeat) {
                app.handle_key(key);
            }
        }
        Event::Mouse(mouse) => app.handle_mouse(mouse),
        Event::FocusGained => app.on_focus_gained(),
        _ => {}
    }
}
