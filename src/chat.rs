use crate::api::{self, ApiClient, ChatRequest, Citation};
use crate::error::{AppError, Result};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;

pub const NO_ANSWER_TEXT: &str = "No answer returned.";
pub const ERROR_ANSWER_TEXT: &str = "Error: Could not retrieve answer.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub text: String,
    pub citations: Vec<Citation>,
    /// Set on the assistant placeholder until its request settles.
    pub pending: bool,
}

impl Message {
    fn user(text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            text: text.to_string(),
            citations: Vec::new(),
            pending: false,
        }
    }

    fn placeholder() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            text: String::new(),
            citations: Vec::new(),
            pending: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Answered,
    /// A newer question (or an explicit cancel) took over before this one
    /// resolved. Nothing was changed on its behalf.
    Superseded,
}

#[derive(Default)]
struct ChatState {
    messages: Vec<Message>,
    busy: bool,
    error: Option<String>,
    scope_id: Option<String>,
    in_flight: Option<CancellationToken>,
}

impl ChatState {
    fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == id)
    }
}

/// Message log and request lifecycle for the active workspace scope.
///
/// At most one `/chat` request is outstanding per session. Starting a new one
/// cancels the previous request's token; the cancelled call returns
/// [`SendOutcome::Superseded`] and leaves its placeholder exactly as it was.
pub struct ChatSession {
    api: ApiClient,
    state: Mutex<ChatState>,
}

impl ChatSession {
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Mutex::new(ChatState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub async fn send_message(&self, text: &str, credential: &str) -> Result<SendOutcome> {
        if text.trim().is_empty() {
            return Err(AppError::EmptyQuestion);
        }
        if credential.trim().is_empty() {
            return Err(AppError::MissingCredential);
        }

        let placeholder = Message::placeholder();
        let placeholder_id = placeholder.id.clone();
        let token = CancellationToken::new();
        {
            let mut state = self.lock();
            state.error = None;
            state.busy = true;
            state.messages.push(Message::user(text));
            state.messages.push(placeholder);
            if let Some(previous) = state.in_flight.replace(token.clone()) {
                tracing::debug!("superseding in-flight chat request");
                previous.cancel();
            }
        }

        let request = ChatRequest {
            question: text.to_string(),
        };
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Ok(SendOutcome::Superseded),
            res = api::chat::chat(&self.api, &request, credential) => res,
        };

        let mut state = self.lock();
        // cancel() only ever runs under this lock, so this check is final
        if token.is_cancelled() {
            return Ok(SendOutcome::Superseded);
        }
        state.in_flight = None;
        state.busy = false;

        match result {
            Ok(resp) => {
                if let Some(msg) = state.message_mut(&placeholder_id) {
                    msg.text = if resp.answer.is_empty() {
                        NO_ANSWER_TEXT.to_string()
                    } else {
                        resp.answer
                    };
                    msg.citations = resp.citations;
                    msg.pending = false;
                }
                Ok(SendOutcome::Answered)
            }
            Err(e) => {
                let err = AppError::from_chat_failure(e);
                tracing::warn!(error = %err, "chat request failed");
                state.error = Some(err.to_string());
                if let Some(msg) = state.message_mut(&placeholder_id) {
                    if msg.text.is_empty() {
                        msg.text = ERROR_ANSWER_TEXT.to_string();
                    }
                    msg.pending = false;
                }
                Err(err)
            }
        }
    }

    /// Cancels the outstanding request, if any. Returns whether one existed.
    pub fn cancel(&self) -> bool {
        let mut state = self.lock();
        match state.in_flight.take() {
            Some(token) => {
                token.cancel();
                state.busy = false;
                true
            }
            None => false,
        }
    }

    /// Drops the whole log and any error. An in-flight request keeps running;
    /// call [`ChatSession::cancel`] first to stop it.
    pub fn clear_chat(&self) {
        let mut state = self.lock();
        state.messages.clear();
        state.error = None;
    }

    /// Binds the session to a new scope (or none). History from the previous
    /// scope is discarded and its outstanding request is cancelled.
    pub fn reset_scope(&self, scope_id: Option<String>) {
        let mut state = self.lock();
        if let Some(token) = state.in_flight.take() {
            token.cancel();
        }
        state.busy = false;
        state.messages.clear();
        state.error = None;
        state.scope_id = scope_id;
    }

    pub fn messages(&self) -> Vec<Message> {
        self.lock().messages.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.lock().busy
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn scope_id(&self) -> Option<String> {
        self.lock().scope_id.clone()
    }
}
