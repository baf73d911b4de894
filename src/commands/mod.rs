pub mod chat;
pub mod knowledge;
pub mod settings;

use crate::api::ApiClient;
use crate::chat::ChatSession;
use crate::db::Settings;
use crate::workspace::WorkspaceOrchestrator;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Shared handles every command works against.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub chat: Arc<ChatSession>,
    pub workspace: Arc<WorkspaceOrchestrator>,
}

impl AppState {
    pub fn new(api: ApiClient, settings: Arc<Settings>) -> Self {
        let chat = Arc::new(ChatSession::new(api.clone()));
        let workspace = Arc::new(WorkspaceOrchestrator::new(api, chat.clone()));
        Self {
            settings,
            chat,
            workspace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Line {
    Output(String),
    /// Transient progress notice (uploading, configuring).
    Notice(String),
    /// Error banner; the next action dismisses it.
    Error(String),
}

/// Output sink. Commands and background tasks write here; the REPL drains it.
#[derive(Clone)]
pub struct Console {
    tx: mpsc::UnboundedSender<Line>,
}

impl Console {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Line>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, line: Line) {
        // receiver gone means the REPL is shutting down
        let _ = self.tx.send(line);
    }

    pub fn print(&self, text: impl Into<String>) {
        self.send(Line::Output(text.into()));
    }

    pub fn notice(&self, text: impl Into<String>) {
        self.send(Line::Notice(text.into()));
    }

    pub fn error(&self, err: impl std::fmt::Display) {
        self.send(Line::Error(err.to_string()));
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Key(Option<String>),
    Theme(Option<String>),
    Docs,
    Upload(PathBuf),
    Select(String),
    Scope,
    Clear,
    Cancel,
    Quit,
    Ask(String),
    Empty,
}

pub const HELP_TEXT: &str = "\
Commands:
  /key [value]        show or set the API key (`-` clears it)
  /theme [light|dark|toggle]
                      show or set the theme
  /docs               reload and list documents
  /upload <path>      upload a PDF
  /select <n|id>      toggle a document in the active scope
  /scope              show the active scope
  /clear              clear the conversation
  /cancel             cancel the pending question
  /quit               exit
Anything else is sent as a question.";

impl Command {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Command::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Ask(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, Some(arg.trim().to_string())),
            None => (rest, None),
        };
        let arg = arg.filter(|a| !a.is_empty());

        match name {
            "help" | "?" => Ok(Command::Help),
            "key" => Ok(Command::Key(arg)),
            "theme" => Ok(Command::Theme(arg)),
            "docs" => Ok(Command::Docs),
            "upload" => arg
                .map(|p| Command::Upload(PathBuf::from(p)))
                .ok_or_else(|| "Usage: /upload <path>".to_string()),
            "select" => arg
                .map(Command::Select)
                .ok_or_else(|| "Usage: /select <n|id>".to_string()),
            "scope" => Ok(Command::Scope),
            "clear" => Ok(Command::Clear),
            "cancel" => Ok(Command::Cancel),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("Unknown command: /{} (try /help)", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub async fn dispatch(state: &AppState, command: Command, console: &Console) -> Flow {
    if command != Command::Empty {
        state.workspace.dismiss_error();
    }
    match command {
        Command::Empty => {}
        Command::Help => console.print(HELP_TEXT),
        Command::Key(value) => settings::api_key(state, value, console),
        Command::Theme(value) => settings::theme(state, value, console),
        Command::Docs => knowledge::list_documents(state, console).await,
        Command::Upload(path) => knowledge::upload_document(state, &path, console).await,
        Command::Select(target) => knowledge::toggle_document(state, &target, console).await,
        Command::Scope => knowledge::show_scope(state, console),
        Command::Clear => chat::clear(state, console),
        Command::Cancel => chat::cancel(state, console),
        Command::Ask(question) => {
            chat::ask(state, question, console);
        }
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
