use super::{AppState, Console};
use crate::chat::{Message, Role, SendOutcome};
use crate::workspace::ChatGate;
use tokio::task::JoinHandle;

pub fn render_message(msg: &Message) -> String {
    let speaker = match msg.role {
        Role::User => "you",
        Role::Assistant => "assistant",
    };
    let mut out = format!("{}> {}", speaker, msg.text);
    for (i, citation) in msg.citations.iter().enumerate() {
        out.push_str(&format!(
            "\n  [{}] {} p.{}: {}",
            i + 1,
            citation.doc_name,
            citation.page_number,
            citation.snippet.trim()
        ));
        if let Some(score) = citation.score {
            out.push_str(&format!(" ({:.2})", score));
        }
    }
    out
}

/// Starts a question in the background so a follow-up can supersede it.
/// Returns `None` when the scope gate refuses the question.
pub fn ask(state: &AppState, question: String, console: &Console) -> Option<JoinHandle<()>> {
    match state.workspace.chat_gate() {
        ChatGate::Ready(_) => {}
        ChatGate::NoSelection => {
            console.notice("Select at least one available document first (/docs, /select)");
            return None;
        }
        ChatGate::Configuring => {
            console.notice("Configuring workspace, please wait...");
            return None;
        }
        ChatGate::Unavailable => {
            console.error("Workspace is not available. Toggle a document to retry.");
            return None;
        }
    }

    let chat = state.chat.clone();
    let credential = state.settings.api_key();
    let console = console.clone();
    Some(tokio::spawn(async move {
        match chat.send_message(&question, &credential).await {
            Ok(SendOutcome::Answered) => {
                if let Some(answer) = chat.messages().last() {
                    console.print(render_message(answer));
                }
            }
            Ok(SendOutcome::Superseded) => {}
            Err(e) => console.error(e),
        }
    }))
}

pub fn clear(state: &AppState, console: &Console) {
    state.chat.clear_chat();
    console.notice("Conversation cleared");
}

pub fn cancel(state: &AppState, console: &Console) {
    if state.chat.cancel() {
        console.notice("Question cancelled");
    } else {
        console.print("Nothing to cancel");
    }
}
