use std::io;
use std::sync::Arc;
use std::time::Duration;
use ratatui::{
    backend::CrosstermBackend,
    Terminal,
};
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use anyhow::Result;
use log::{error, info};
use tokio::sync::mpsc;
use tracing_subscriber::layer::SubscriberExt;

use fishwiki_rs::config::Config;
use fishwiki_rs::engine::catalog::ChangeHook;
use fishwiki_rs::engine::database::Database;
use fishwiki_rs::engine::wiki::Wiki;
use fishwiki_rs::remote::events::{self as weekly, WeeklyEvent};
use fishwiki_rs::remote::settings::SharedSettings;
use fishwiki_rs::remote::DocumentStore;
use fishwiki_rs::tui::app::{Action, App};
use fishwiki_rs::tui::events;
use fishwiki_rs::tui::ui;

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_create(CONFIG_PATH)?;

    // log and tracing both end up in the Logs tab
    tui_logger::init_logger(config.log_level())?;
    tui_logger::set_default_level(config.log_level());
    tracing::subscriber::set_global_default(tracing_subscriber::registry().with(tui_logger::tracing_subscriber_layer()))?;

    // Local store and its writer task
    let db = Arc::new(Database::new(&config.storage.db_path).await?);
    let (snapshot_tx, snapshot_rx) = mpsc::unbounded_channel();
    let writer = db.clone().spawn_writer(snapshot_rx);
    let wiki = Wiki::load(&db, Some(ChangeHook::new(snapshot_tx))).await?;
    info!("Catalog ready: {:?}", wiki.kind_counts());

    // Remote store (optional)
    let store = if config.remote.enabled {
        Some(Arc::new(DocumentStore::new(&config.remote)?))
    } else {
        None
    };
    let (event_tx, mut event_rx) = mpsc::channel::<Vec<WeeklyEvent>>(8);
    if let Some(store) = &store {
        let every = Duration::from_secs(config.remote.poll_interval_secs.max(1));
        weekly::spawn_subscription(store.clone(), every, event_tx);
    }

    let mut app = App::new(config, wiki);

    // Setup TUI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app, &db, store.as_deref(), &mut event_rx).await;

    // Cleanup
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    // Dropping the catalogs closes the writer's channel once pending snapshots are written
    drop(app);
    writer.await?;

    if let Err(err) = res {
        println!("{:?}", err);
    }

    Ok(())
}

async fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    db: &Database,
    store: Option<&DocumentStore>,
    event_rx: &mut mpsc::Receiver<Vec<WeeklyEvent>>,
) -> Result<()> {
    let mut pending = store.map(|_| Action::ReloadRemote);

    loop {
        if let Some(action) = pending.take() {
            run_action(app, store, action).await;
        }

        app.on_tick(db.last_error());
        while let Ok(events) = event_rx.try_recv() {
            app.events = events;
        }

        terminal.draw(|f| ui::draw(f, app))?;
        if app.should_quit {
            return Ok(());
        }

        let timeout = Duration::from_secs_f64(app.config.menu.refresh_rate.max(0.05));
        pending = events::handle_events(app, timeout)?;
    }
}

/// Remote failures block the UI with an alert until dismissed.
async fn run_action(app: &mut App, store: Option<&DocumentStore>, action: Action) {
    let Some(store) = store else { return };
    match action {
        Action::ReloadRemote => {
            match SharedSettings::load_all(store).await {
                Ok(settings) => {
                    app.settings = Some(settings);
                    app.status = "Shared settings loaded".to_string();
                }
                Err(e) => {
                    error!("Loading shared settings failed: {}", e);
                    app.show_alert(format!("Could not load shared settings:\n{}", e));
                    return;
                }
            }
            match weekly::list_events(store).await {
                Ok(events) => app.events = events,
                Err(e) => {
                    error!("Loading events failed: {}", e);
                    app.show_alert(format!("Could not load weekly events:\n{}", e));
                }
            }
        }
        Action::DeleteEvent(id) => match weekly::delete_event(store, &id).await {
            Ok(()) => {
                app.events.retain(|e| e.id != id);
                app.selected = app.selected.min(app.events.len().saturating_sub(1));
                app.status = format!("Deleted event {}", id);
            }
            Err(e) => {
                error!("Deleting event {} failed: {}", id, e);
                app.show_alert(format!("Could not delete event {}:\n{}", id, e));
            }
        },
    }
}
