use anyhow::Result;
use clap::{value_parser, Arg, ArgAction, Command};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::{
    io,
    path::PathBuf,
    sync::{Arc, RwLock},
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{error, info};

use flowstrands::{
    app::App,
    config::{Config, SessionFile},
    context::AppContext,
    feed::MemoryStore,
    logging, nostr,
    session::{LocalIdentityProvider, SignInRequest},
    ui,
};

const FLOWSTRANDS_LOGO: &str = r#"
  ___ _               ___ _                  _
 | __| |_____ __ __  / __| |_ _ _ __ _ _ _  __| |___
 | _|| / _ \ V  V /  \__ \  _| '_/ _` | ' \/ _` (_-<
 |_| |_\___/\_/\_/   |___/\__|_| \__,_|_||_\__,_/__/
"#;

fn show_startup_logo() {
    // Clear screen
    print!("\x1B[2J\x1B[1;1H");

    let colors = [
        "\x1B[38;5;39m",
        "\x1B[38;5;38m",
        "\x1B[38;5;37m",
        "\x1B[38;5;36m",
    ];

    for (i, line) in FLOWSTRANDS_LOGO.lines().filter(|l| !l.trim().is_empty()).enumerate() {
        println!("{}{}\x1B[0m", colors[i % colors.len()], line);
    }

    println!(
        "\n\x1B[38;5;37m=== FlowStrands v{} - live room chat over Nostr ===\x1B[0m",
        env!("CARGO_PKG_VERSION")
    );
    println!("\x1B[38;5;36mPress Enter to continue...\x1B[0m\n");

    let _ = std::io::Read::read(&mut std::io::stdin(), &mut [0u8; 1]);
}

fn cli() -> Command {
    Command::new("flowstrands")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Terminal chat client with a live, room-tagged message feed")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Config file (default: <config dir>/flowstrands/config.toml)"),
        )
        .arg(
            Arg::new("local")
                .long("local")
                .action(ArgAction::SetTrue)
                .help("Use an in-process backend instead of Nostr relays"),
        )
        .arg(
            Arg::new("relay")
                .long("relay")
                .value_name("URL")
                .action(ArgAction::Append)
                .help("Relay to use; repeat for several (replaces configured relays)"),
        )
        .arg(
            Arg::new("room")
                .short('r')
                .long("room")
                .value_name("NUMBER")
                .help("Initial room for outgoing messages"),
        )
        .arg(
            Arg::new("nsec")
                .long("nsec")
                .value_name("NSEC_KEY")
                .help("Sign in with your Nostr private key (nsec format)"),
        )
        .arg(
            Arg::new("log-file")
                .long("log-file")
                .value_name("PATH")
                .value_parser(value_parser!(PathBuf))
                .help("Write logs here instead of the cache directory"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Debug-level logging"),
        )
        .arg(
            Arg::new("no-logo")
                .long("no-logo")
                .action(ArgAction::SetTrue)
                .help("Skip startup logo"),
        )
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();

    let mut config = Config::load(matches.get_one::<PathBuf>("config").map(PathBuf::as_path))?;
    if let Some(relays) = matches.get_many::<String>("relay") {
        config.relays = relays.cloned().collect();
    }
    if let Some(room) = matches.get_one::<String>("room") {
        config.default_room = room.clone();
    }
    if let Some(path) = matches.get_one::<PathBuf>("log-file") {
        config.log_file = Some(path.clone());
    }

    logging::init(&config.log_path(), matches.get_flag("verbose"))?;
    info!(version = env!("CARGO_PKG_VERSION"), "starting");

    if !matches.get_flag("no-logo") {
        show_startup_logo();
    }

    let (status_tx, status_rx) = mpsc::unbounded_channel();
    let (ctx, backend_label) = if matches.get_flag("local") {
        let ctx = AppContext::new(
            config,
            Arc::new(LocalIdentityProvider::new()),
            Arc::new(MemoryStore::new()),
            status_tx,
        );
        (ctx, "local".to_string())
    } else {
        let client = nostr::connect_relays(&config.relays, &status_tx).await?;
        let identity: nostr::SharedIdentity = Arc::new(RwLock::new(None));
        let auth = nostr::NostrAuth::new(
            client.clone(),
            identity.clone(),
            SessionFile::default_location(),
        );
        let store = nostr::NostrStore::new(client, identity, config.history_limit);
        let label = format!("{} relays", config.relays.len());
        (
            AppContext::new(config, Arc::new(auth), Arc::new(store), status_tx),
            label,
        )
    };

    let mut app = App::new(ctx, status_rx, backend_label);
    if let Some(nsec) = matches.get_one::<String>("nsec") {
        app.sign_in(SignInRequest::Secret(nsec.clone()));
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("ui loop failed: {:?}", err);
        println!("Error: {:?}", err);
    }

    info!("exiting");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut last_tick = Instant::now();
    let tick_rate = Duration::from_millis(100);

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout_duration = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or_else(|| Duration::from_secs(0));

        if event::poll(timeout_duration)? {
            let event = event::read()?;
            app.handle_input(event);
        }

        if last_tick.elapsed() >= tick_rate {
            app.on_tick();
            last_tick = Instant::now();
            // let spawned backend work make progress between frames
            tokio::task::yield_now().await;
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
