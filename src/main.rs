//! Main entry point for remote-pilot.
//!
//! Loads configuration, resolves the SSH password, then runs the TUI until
//! the user quits. The terminal is restored on every exit path.

use remote_pilot::utils;
use remote_pilot::utils::guard::ExitGuard;
use remote_pilot::{App, load_config};

use anyhow::{Context, Result};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered diagnostics are flushed on exit.
    let _log_guard = utils::logger::init_logging();

    let cwd = std::env::current_dir().context("Failed to read current directory")?;
    let config = load_config(&cwd)?;

    let label = format!("Password for {}@{}: ", config.session.user, config.session.host);
    let Some(password) = config.session.credential.resolve(&label)? else {
        info!("Password prompt cancelled");
        return Ok(());
    };

    let mut terminal = ratatui::init();
    let _restore = ExitGuard::new(ratatui::restore);

    let mut app = App::new(&config, password)?;
    // draw 1st frame
    app.draw(&mut terminal)?;
    // run event-driven main loop of app
    app.run(&mut terminal).await
}
