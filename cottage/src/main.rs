use anyhow::Result;
use chrono::Utc;
use cottage::app::App;
use cottage::config::load_config;
use cottage::ipc::server::{Request, Server};
use cottage::profile::ProfileStore;
use cottage::room::BroadcastRoom;
use cottage::session::SessionController;
use cottage::storage::{self, JsonFileStore};
use cottage::{logging, ui};
use cottage_ipc::SOCKET_PATH;
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    Terminal,
};
use std::io;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let config = load_config()?;
    let data_dir = storage::data_dir(config.storage.data_dir.as_deref())?;
    logging::init(&data_dir)?;
    info!(data_dir = ?data_dir, "cottage starting");

    let room = BroadcastRoom::new(64);
    let session = SessionController::restore(
        config.session_options(),
        Box::new(JsonFileStore::in_dir(&data_dir)),
        config.notifier(),
        Box::new(room.clone()),
    );
    let profile_store = ProfileStore::in_dir(&data_dir);
    let profile = profile_store.load();
    let app = App::new(config, session, profile, Some(profile_store));

    let (tx, rx) = mpsc::channel(32);
    match Server::bind(SOCKET_PATH, tx, room) {
        Ok(server) => {
            tokio::spawn(server.run());
        }
        Err(e) => warn!("IPC disabled: {:#}", e),
    }

    let res = tokio::task::spawn_blocking(move || run_tui(app, rx)).await?;
    if let Err(err) = res {
        eprintln!("Error: {:?}", err);
    }
    info!("cottage stopped");
    Ok(())
}

fn run_tui(app: App, requests: mpsc::Receiver<Request>) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app, requests);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    res
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    mut app: App,
    mut requests: mpsc::Receiver<Request>,
) -> Result<()> {
    let tick_rate = Duration::from_millis(app.config.session.tick_millis);
    let mut last_tick = Instant::now();
    // A restored session may have run out while we were away.
    app.on_tick(Utc::now());

    loop {
        terminal.draw(|f| ui::draw(f, &app, Utc::now(), Instant::now()))?;

        while let Ok(request) = requests.try_recv() {
            let response = app.handle_command(request.command, Utc::now());
            let _ = request.reply.send(response);
        }

        let timeout = tick_rate
            .saturating_sub(last_tick.elapsed())
            .min(Duration::from_millis(100));
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.handle_key(key, Utc::now());
                }
            }
        }
        if app.should_quit {
            return Ok(());
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick(Utc::now());
            last_tick = Instant::now();
        }
    }
}
