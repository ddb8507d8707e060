mod app;
mod handler;
mod oneshot;
mod tui;
mod ui;

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chatdesk_core::{completion_channel, Config, HttpTransport, Transport, UploadKind};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use app::App;
use oneshot::OneShot;
use tui::EventHandler;

#[derive(Parser)]
#[command(name = "chatdesk")]
#[command(version, about = "Terminal chat client for the chatdesk backend")]
struct Cli {
    /// Backend base URL (overrides CHATDESK_URL and the config file)
    #[arg(short, long, global = true)]
    url: Option<String>,

    /// Enable debug logging (equivalent to RUST_LOG=debug)
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive chat (default)
    Tui,
    /// Send one message and print the reply
    Send {
        /// Message text
        message: String,
    },
    /// Upload an image for analysis
    Image {
        path: PathBuf,
    },
    /// Upload a CSV file
    Csv {
        path: PathBuf,
    },
    /// Reset the conversation on the server
    Reset,
    /// Show or change saved settings
    Config {
        /// Save this backend URL as the default
        #[arg(long = "set-url")]
        set_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Could not read config, using defaults: {}", e);
        Config::new()
    });
    let base_url = config.resolve_base_url(cli.url.as_deref());

    let oneshot = match cli.command.unwrap_or(Commands::Tui) {
        Commands::Tui => {
            init_file_logging(cli.debug)?;
            return run_tui(&config, base_url).await;
        }
        Commands::Send { message } => OneShot::Send(message),
        Commands::Image { path } => OneShot::Upload(UploadKind::Image, path),
        Commands::Csv { path } => OneShot::Upload(UploadKind::Csv, path),
        Commands::Reset => OneShot::Reset,
        Commands::Config { set_url } => {
            if let Some(url) = set_url {
                Config::save_base_url(&url)?;
                println!("Saved backend URL: {}", url);
            } else {
                println!("Backend URL: {}", base_url);
                println!("Config dir:  {}", Config::get_config_dir()?.display());
            }
            return Ok(());
        }
    };

    init_stderr_logging(cli.debug);
    let transport = build_transport(&config, &base_url)?;
    oneshot::run(transport, config.welcome(), oneshot, std::io::stdout()).await?;
    Ok(())
}

fn build_transport(config: &Config, base_url: &str) -> Result<Arc<dyn Transport>> {
    let transport = match config.request_timeout() {
        Some(timeout) => HttpTransport::with_timeout(base_url, timeout)?,
        None => HttpTransport::new(base_url),
    };
    Ok(Arc::new(transport))
}

fn filter(debug: bool) -> EnvFilter {
    let default_filter = if debug {
        "debug"
    } else {
        "info,chatdesk_core=info,hyper=warn,reqwest=warn"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

fn init_stderr_logging(debug: bool) {
    tracing_subscriber::registry()
        .with(filter(debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// The terminal owns stdout and stderr while the TUI runs
fn init_file_logging(debug: bool) -> Result<()> {
    let dir = Config::get_config_dir()?;
    std::fs::create_dir_all(&dir)?;
    let log_file = File::create(dir.join("chatdesk.log"))?;

    tracing_subscriber::registry()
        .with(filter(debug))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(log_file)),
        )
        .init();
    Ok(())
}

async fn run_tui(config: &Config, base_url: String) -> Result<()> {
    let transport = build_transport(config, &base_url)?;
    let (tx, rx) = completion_channel();
    let mut app = App::new(transport, base_url.clone(), config.welcome(), tx);
    tracing::info!(%base_url, "starting chat session");

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = EventHandler::new(rx);

    let result = run_loop(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run_loop(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        match events.next().await {
            Some(event) => handler::handle_event(app, event).await?,
            None => break,
        }
    }
    Ok(())
}
