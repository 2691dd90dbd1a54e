//! Terminal management and main run loop

use std::io::{self, Stdout};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::Event,
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{debug, info, warn};

use super::app::App;
use super::event::{handle_key, poll_event, HandleResult};
use super::ui;

/// Initialize the terminal for TUI mode
fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restore the terminal to normal mode
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)
        .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Run the TUI application
pub async fn run(mut app: App) -> Result<()> {
    let mut terminal = init_terminal()?;
    info!("TUI started");

    let result = run_loop(&mut terminal, &mut app).await;

    // Close the adapter before leaving, even if the loop failed
    if app.is_connected() {
        if let Err(e) = app.db.close_connection().await {
            warn!(error = %e, "failed to close connection on exit");
        }
    }

    // Restore terminal (even if loop failed)
    restore_terminal(&mut terminal)?;
    info!("TUI stopped");

    result
}

/// Main event loop
async fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        // Poll for events (with 100ms timeout for responsive UI)
        if let Some(Event::Key(key)) = poll_event(Duration::from_millis(100))? {
            let result = handle_key(app, key);
            if result == HandleResult::Quit {
                break;
            }
            dispatch(app, result).await;
        }

        app.expire_notification(Instant::now());

        if app.should_quit {
            break;
        }
    }

    Ok(())
}

/// Await the workflow behind a key result and surface its outcome
pub async fn dispatch(app: &mut App, result: HandleResult) {
    if result != HandleResult::Continue {
        debug!(?result, route = app.route.path(), "dispatching");
    }

    let outcome = match result {
        HandleResult::Continue => None,
        HandleResult::Quit => {
            app.should_quit = true;
            None
        }
        HandleResult::Navigate(route) => {
            app.navigate(route).await;
            None
        }
        HandleResult::Connect => Some(app.connect().await),
        HandleResult::Refresh => Some(app.load_documents().await),
        HandleResult::NextPage => Some(app.next_page().await),
        HandleResult::PrevPage => Some(app.prev_page().await),
        HandleResult::OpenDetail(id) => app.open_detail(id).await,
        HandleResult::SaveNew => Some(app.save_new_document().await),
        HandleResult::UpdateDocument => Some(app.update_document().await),
        HandleResult::DeleteDocument => Some(app.confirm_delete().await),
        HandleResult::RunQuery => Some(app.run_query().await),
    };

    if let Some(outcome) = outcome {
        if !outcome.is_success() {
            warn!(reason = outcome.message(), "workflow failed");
        }
        app.notify(outcome);
    }
}
