pub mod api;
pub mod chat;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod workspace;

use api::ApiClient;
use clap::Parser;
use commands::{AppState, Command, Console, Flow, Line};
use config::{AppConfig, Cli};
use db::models::Theme;
use db::{Database, Settings};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

pub use error::{AppError, Result};

const DEFAULT_LOG_FILTER: &str = "compliance_analyzer_lib=info";

fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

fn paint(theme: Theme, line: &Line) -> String {
    let (notice, error) = match theme {
        Theme::Light => ("\x1b[34m", "\x1b[31m"),
        Theme::Dark => ("\x1b[96m", "\x1b[91m"),
    };
    match line {
        Line::Output(text) => text.clone(),
        Line::Notice(text) => format!("{}* {}\x1b[0m", notice, text),
        Line::Error(text) => format!("{}! {}\x1b[0m", error, text),
    }
}

async fn print_lines(mut rx: mpsc::UnboundedReceiver<Line>, settings: Arc<Settings>) {
    while let Some(line) = rx.recv().await {
        println!("{}", paint(settings.theme(), &line));
    }
}

async fn repl(config: AppConfig) -> Result<()> {
    let settings = Arc::new(Settings::load(Database::open(&config.data_dir)?)?);
    if let Some(key) = &config.api_key {
        settings.set_api_key(key)?;
    }
    tracing::info!(api_url = %config.api_url, data_dir = %config.data_dir.display(), "starting");

    let state = AppState::new(ApiClient::new(config.api_url.clone()), settings.clone());
    let (console, rx) = Console::channel();
    let printer = tokio::spawn(print_lines(rx, settings.clone()));

    console.print(format!(
        "Compliance Analyzer ({}). Type /help for commands.",
        config.api_url
    ));
    if settings.has_api_key() {
        commands::knowledge::list_documents(&state, &console).await;
    } else {
        console.notice("Set your API key with /key <value>");
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(msg) => {
                console.error(msg);
                continue;
            }
        };
        if commands::dispatch(&state, command, &console).await == Flow::Quit {
            break;
        }
    }

    state.chat.cancel();
    drop(state);
    drop(console);
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "output task ended abnormally");
    }
    Ok(())
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    let config = AppConfig::from_cli(cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(repl(config))
}
