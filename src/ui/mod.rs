//! Terminal dashboard: sensor panel, transcript, and compose input.

pub mod app;
pub mod event;
pub mod view;

pub use app::App;

use crate::error::Result;
use event::{AppEvent, EventHandler};
use std::time::Duration;

/// UI tick driving spinner animation and background-task polling.
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Run the dashboard until the user quits.
///
/// # Errors
///
/// Returns an error if the terminal cannot be set up or drawn to.
pub async fn run(app: &mut App) -> Result<()> {
    event::install_panic_hook();
    let mut terminal = event::init()?;
    let mut events = EventHandler::new(TICK_INTERVAL);

    while !app.should_quit {
        terminal.draw(|f| view::render(f, app))?;

        match events.next().await {
            Some(AppEvent::Key(key)) => app.handle_key(key).await,
            Some(AppEvent::Resize(..)) => {}
            Some(AppEvent::Tick) => app.on_tick().await,
            None => break,
        }
    }

    app.shutdown().await;
    event::restore()?;
    Ok(())
}
