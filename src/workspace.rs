use crate::api::{self, ApiClient, CreateWorkspaceRequest, DocumentMetadata, Workspace};
use crate::chat::ChatSession;
use crate::error::{AppError, Result};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const UPLOAD_FAILED_TEXT: &str = "Upload failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScopeStatus {
    #[default]
    Idle,
    Configuring,
    Ready,
    Failed,
}

/// Whether a question can be asked right now, and against which scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatGate {
    NoSelection,
    Configuring,
    Unavailable,
    Ready(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScopeOutcome {
    /// Selection became empty; no scope is active.
    Cleared,
    Created(Workspace),
    /// A newer selection change was issued while this request was in flight.
    Stale,
}

#[derive(Default)]
struct WorkspaceState {
    documents: Vec<DocumentMetadata>,
    selection: Vec<String>,
    scope: Option<Workspace>,
    status: ScopeStatus,
    scope_seq: u64,
    error: Option<String>,
}

pub struct WorkspaceOrchestrator {
    api: ApiClient,
    chat: Arc<ChatSession>,
    state: Mutex<WorkspaceState>,
}

fn scope_name() -> String {
    format!(
        "Scope {}",
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S")
    )
}

impl WorkspaceOrchestrator {
    pub fn new(api: ApiClient, chat: Arc<ChatSession>) -> Self {
        Self {
            api,
            chat,
            state: Mutex::new(WorkspaceState::default()),
        }
    }

    // Lock order is always workspace -> chat.
    fn lock(&self) -> MutexGuard<'_, WorkspaceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn chat(&self) -> &Arc<ChatSession> {
        &self.chat
    }

    /// Replaces the document list wholesale. On failure the previous list stays.
    pub async fn load_documents(&self, credential: &str) -> Result<usize> {
        let result = api::documents::list_documents(&self.api, credential).await;
        let mut state = self.lock();
        match result {
            Ok(documents) => {
                tracing::debug!(count = documents.len(), "document list refreshed");
                state.documents = documents;
                Ok(state.documents.len())
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch documents");
                let err = AppError::FetchFailed(e.to_string());
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub async fn upload_document(
        &self,
        file_path: &Path,
        credential: &str,
    ) -> Result<DocumentMetadata> {
        if credential.trim().is_empty() {
            return Err(AppError::MissingCredential);
        }
        let filename = file_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();
        let result = match tokio::fs::read(file_path).await {
            Ok(bytes) => api::documents::upload_document(&self.api, &filename, bytes, credential)
                .await
                .map_err(|e| {
                    tracing::warn!(error = %e, filename = %filename, "upload failed");
                    e.detail().unwrap_or_else(|| UPLOAD_FAILED_TEXT.to_string())
                }),
            Err(e) => {
                tracing::warn!(error = %e, path = %file_path.display(), "cannot read upload");
                Err(format!("Cannot read {}: {}", file_path.display(), e))
            }
        };

        let mut state = self.lock();
        match result {
            Ok(doc) => {
                tracing::info!(id = %doc.id, filename = %doc.filename, "document uploaded");
                state.documents.push(doc.clone());
                Ok(doc)
            }
            Err(message) => {
                let err = AppError::UploadFailed(message);
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// Flips `document_id` in the selection, resets the chat log and
    /// provisions a scope for the new selection.
    ///
    /// Callers only pass documents that are `available`. Only the most
    /// recently issued scope request may change the active scope; older ones
    /// resolve to [`ScopeOutcome::Stale`].
    pub async fn toggle_selection(
        &self,
        document_id: &str,
        credential: &str,
    ) -> Result<ScopeOutcome> {
        let (selection, seq) = {
            let mut state = self.lock();
            match state.selection.iter().position(|id| id == document_id) {
                Some(pos) => {
                    state.selection.remove(pos);
                }
                None => state.selection.push(document_id.to_string()),
            }
            state.scope_seq += 1;
            state.scope = None;
            state.error = None;
            state.status = if state.selection.is_empty() {
                ScopeStatus::Idle
            } else {
                ScopeStatus::Configuring
            };
            self.chat.reset_scope(None);
            (state.selection.clone(), state.scope_seq)
        };

        if selection.is_empty() {
            tracing::info!("selection cleared, no active scope");
            return Ok(ScopeOutcome::Cleared);
        }

        if credential.trim().is_empty() {
            let mut state = self.lock();
            if state.scope_seq == seq {
                state.status = ScopeStatus::Failed;
                state.error = Some(AppError::MissingCredential.to_string());
            }
            return Err(AppError::MissingCredential);
        }

        let request = CreateWorkspaceRequest {
            name: scope_name(),
            document_ids: selection,
        };
        let result = api::workspaces::create_workspace(&self.api, &request, credential).await;

        let mut state = self.lock();
        if state.scope_seq != seq {
            tracing::debug!(seq, current = state.scope_seq, "discarding stale scope response");
            return Ok(ScopeOutcome::Stale);
        }
        match result {
            Ok(workspace) => {
                tracing::info!(id = %workspace.id, documents = workspace.document_ids.len(), "scope active");
                state.scope = Some(workspace.clone());
                state.status = ScopeStatus::Ready;
                self.chat.reset_scope(Some(workspace.id.clone()));
                Ok(ScopeOutcome::Created(workspace))
            }
            Err(e) => {
                tracing::warn!(error = %e, "scope creation failed");
                let err = AppError::ScopeCreationFailed(e.to_string());
                state.status = ScopeStatus::Failed;
                state.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    pub fn chat_gate(&self) -> ChatGate {
        let state = self.lock();
        if state.selection.is_empty() {
            return ChatGate::NoSelection;
        }
        match (state.status, &state.scope) {
            (ScopeStatus::Configuring, _) => ChatGate::Configuring,
            (ScopeStatus::Ready, Some(scope)) => ChatGate::Ready(scope.id.clone()),
            _ => ChatGate::Unavailable,
        }
    }

    pub fn documents(&self) -> Vec<DocumentMetadata> {
        self.lock().documents.clone()
    }

    pub fn selection(&self) -> Vec<String> {
        self.lock().selection.clone()
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.lock().selection.iter().any(|s| s == id)
    }

    pub fn selected_documents(&self) -> Vec<DocumentMetadata> {
        let state = self.lock();
        state
            .documents
            .iter()
            .filter(|d| state.selection.contains(&d.id))
            .cloned()
            .collect()
    }

    pub fn scope(&self) -> Option<Workspace> {
        self.lock().scope.clone()
    }

    pub fn scope_status(&self) -> ScopeStatus {
        self.lock().status
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn dismiss_error(&self) {
        self.lock().error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestFailureKind;
    use serde_json::{json, Value};
    use std::time::Duration;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    fn document_ids(expected: &'static [&'static str]) -> impl Fn(&Request) -> bool + Send + Sync {
        move |req: &Request| {
            serde_json::from_slice::<Value>(&req.body)
                .map(|body| body["document_ids"] == json!(expected))
                .unwrap_or(false)
        }
    }

    fn doc(id: &str, filename: &str, status: &str) -> Value {
        json!({
            "id": id,
            "filename": filename,
            "status": status,
            "page_count": 10,
            "upload_timestamp": "2024-01-20T10:00:00"
        })
    }

    fn workspace(id: &str, ids: &[&str]) -> Value {
        json!({
            "id": id,
            "name": "Scope",
            "document_ids": ids,
            "created_at": "2024-01-20T10:00:00"
        })
    }

    fn orchestrator(server: &MockServer) -> WorkspaceOrchestrator {
        let api = ApiClient::new(server.uri());
        WorkspaceOrchestrator::new(api.clone(), Arc::new(ChatSession::new(api)))
    }

    async fn scope_requests(server: &MockServer) -> Vec<Value> {
        server
            .received_requests()
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.url.path() == "/workspaces/")
            .map(|r| serde_json::from_slice(&r.body).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_load_failure_keeps_previous_list() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                doc("doc1", "GDPR.pdf", "available"),
                doc("doc2", "ISO_27001.pdf", "processing"),
            ])))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        assert_eq!(ws.load_documents("k").await.unwrap(), 2);
        let err = ws.load_documents("k").await.unwrap_err();
        assert!(matches!(err, AppError::FetchFailed(_)));

        let docs = ws.documents();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].filename, "GDPR.pdf");
        assert!(!docs[1].is_available());
        assert!(ws.last_error().is_some());
    }

    #[tokio::test]
    async fn test_upload_then_list_contains_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents/upload"))
            .and(header("x-api-key", "k"))
            .respond_with(ResponseTemplate::new(200).set_body_json(doc("doc9", "DPDP.pdf", "processing")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/documents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                doc("doc1", "GDPR.pdf", "available"),
                doc("doc9", "DPDP.pdf", "available"),
            ])))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("DPDP.pdf");
        std::fs::write(&file, b"%PDF-1.4 test").unwrap();

        let ws = orchestrator(&server);
        let uploaded = ws.upload_document(&file, "k").await.unwrap();
        assert_eq!(uploaded.id, "doc9");
        assert_eq!(ws.documents().len(), 1);

        ws.load_documents("k").await.unwrap();
        assert!(ws.documents().iter().any(|d| d.id == "doc9"));

        let requests = server.received_requests().await.unwrap();
        let upload = requests
            .iter()
            .find(|r| r.url.path() == "/documents/upload")
            .unwrap();
        let content_type = upload.headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
        assert!(String::from_utf8_lossy(&upload.body).contains("filename=\"DPDP.pdf\""));
    }

    #[tokio::test]
    async fn test_upload_failure_surfaces_backend_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/documents/upload"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "detail": "Only PDF files are allowed" })))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/documents/upload"))
            .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("notes.txt");
        std::fs::write(&file, b"plain text").unwrap();

        let ws = orchestrator(&server);
        let err = ws.upload_document(&file, "k").await.unwrap_err();
        assert_eq!(err.to_string(), "Only PDF files are allowed");
        let err = ws.upload_document(&file, "k").await.unwrap_err();
        assert_eq!(err.to_string(), UPLOAD_FAILED_TEXT);
        assert!(ws.documents().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_upload_records_error() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");

        let ws = orchestrator(&server);
        let err = ws.upload_document(&missing, "k").await.unwrap_err();
        assert!(matches!(err, AppError::UploadFailed(ref m) if m.contains("missing.pdf")));
        assert_eq!(ws.last_error(), Some(err.to_string()));
        assert!(ws.documents().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upload_without_credential_skips_network() {
        let server = MockServer::start().await;
        let ws = orchestrator(&server);
        let err = ws
            .upload_document(Path::new("/does/not/matter.pdf"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MissingCredential));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_first_selection_creates_scope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .and(header("x-api-key", "k"))
            .and(document_ids(&["doc1"]))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace("ws1", &["doc1"])))
            .expect(1)
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        assert_eq!(ws.chat_gate(), ChatGate::NoSelection);

        let outcome = ws.toggle_selection("doc1", "k").await.unwrap();
        assert!(matches!(outcome, ScopeOutcome::Created(ref w) if w.id == "ws1"));
        assert_eq!(ws.selection(), vec!["doc1".to_string()]);
        assert_eq!(ws.scope_status(), ScopeStatus::Ready);
        assert_eq!(ws.chat_gate(), ChatGate::Ready("ws1".into()));
        assert_eq!(ws.chat().scope_id().as_deref(), Some("ws1"));

        let bodies = scope_requests(&server).await;
        assert_eq!(bodies.len(), 1);
        assert_eq!(bodies[0]["document_ids"], json!(["doc1"]));
        assert!(bodies[0]["name"].as_str().unwrap().starts_with("Scope "));
    }

    #[tokio::test]
    async fn test_deselecting_last_document_clears_scope_without_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace("ws1", &["doc1"])))
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        ws.toggle_selection("doc1", "k").await.unwrap();
        let outcome = ws.toggle_selection("doc1", "k").await.unwrap();

        assert_eq!(outcome, ScopeOutcome::Cleared);
        assert!(ws.selection().is_empty());
        assert!(ws.scope().is_none());
        assert_eq!(ws.scope_status(), ScopeStatus::Idle);
        assert_eq!(ws.chat().scope_id(), None);
        assert_eq!(scope_requests(&server).await.len(), 1);
    }

    #[tokio::test]
    async fn test_toggle_discards_chat_history() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace("ws1", &["doc1"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "answer": "yes", "citations": [] })))
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        ws.toggle_selection("doc1", "k").await.unwrap();
        ws.chat().send_message("Does Article 17 apply?", "k").await.unwrap();
        assert_eq!(ws.chat().messages().len(), 2);

        ws.toggle_selection("doc2", "k").await.unwrap();
        assert!(ws.chat().messages().is_empty());
    }

    #[tokio::test]
    async fn test_scope_failure_keeps_selection() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        let err = ws.toggle_selection("doc1", "k").await.unwrap_err();
        assert!(matches!(err, AppError::ScopeCreationFailed(_)));
        assert_eq!(ws.selection(), vec!["doc1".to_string()]);
        assert!(ws.scope().is_none());
        assert_eq!(ws.scope_status(), ScopeStatus::Failed);
        assert_eq!(ws.chat_gate(), ChatGate::Unavailable);
        assert!(ws.last_error().is_some());

        ws.dismiss_error();
        assert!(ws.last_error().is_none());
    }

    #[tokio::test]
    async fn test_toggle_without_credential() {
        let server = MockServer::start().await;
        let ws = orchestrator(&server);
        let err = ws.toggle_selection("doc1", " ").await.unwrap_err();
        assert!(matches!(err, AppError::MissingCredential));
        assert_eq!(ws.selection(), vec!["doc1".to_string()]);
        assert_eq!(ws.chat_gate(), ChatGate::Unavailable);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stale_scope_response_is_discarded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .and(document_ids(&["doc1"]))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(workspace("ws-old", &["doc1"]))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .and(document_ids(&["doc1", "doc2"]))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace("ws-new", &["doc1", "doc2"])))
            .mount(&server)
            .await;

        let ws = Arc::new(orchestrator(&server));
        let first = {
            let ws = ws.clone();
            tokio::spawn(async move { ws.toggle_selection("doc1", "k").await })
        };
        for _ in 0..400 {
            if !scope_requests(&server).await.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(ws.chat_gate(), ChatGate::Configuring);

        let outcome = ws.toggle_selection("doc2", "k").await.unwrap();
        assert!(matches!(outcome, ScopeOutcome::Created(ref w) if w.id == "ws-new"));
        assert_eq!(first.await.unwrap().unwrap(), ScopeOutcome::Stale);

        assert_eq!(ws.scope().unwrap().id, "ws-new");
        assert_eq!(ws.chat().scope_id().as_deref(), Some("ws-new"));
        assert_eq!(ws.scope_status(), ScopeStatus::Ready);
    }

    #[tokio::test]
    async fn test_unauthorized_chat_leaves_workspace_untouched() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/documents/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([doc("doc1", "GDPR.pdf", "available")])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/workspaces/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(workspace("ws1", &["doc1"])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let ws = orchestrator(&server);
        ws.load_documents("k").await.unwrap();
        ws.toggle_selection("doc1", "k").await.unwrap();
        let before_docs = ws.documents();

        let err = ws.chat().send_message("What is Article 15?", "k").await.unwrap_err();
        assert_eq!(err.request_kind(), Some(RequestFailureKind::Unauthorized));
        assert_eq!(ws.documents(), before_docs);
        assert_eq!(ws.selection(), vec!["doc1".to_string()]);
        assert_eq!(ws.selected_documents().len(), 1);
        assert_eq!(ws.chat_gate(), ChatGate::Ready("ws1".into()));
    }
}
