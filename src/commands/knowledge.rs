use super::{AppState, Console};
use crate::api::{DocumentMetadata, DocumentStatus};
use crate::error::AppError;
use crate::workspace::{ScopeOutcome, ScopeStatus};
use std::path::Path;

fn status_label(status: DocumentStatus) -> &'static str {
    match status {
        DocumentStatus::Available => "available",
        DocumentStatus::Processing => "processing",
        DocumentStatus::Error => "error",
    }
}

pub fn format_document_list(docs: &[DocumentMetadata], is_selected: impl Fn(&str) -> bool) -> String {
    if docs.is_empty() {
        return "No documents uploaded yet. Use /upload <path>.".to_string();
    }
    docs.iter()
        .enumerate()
        .map(|(i, doc)| {
            let marker = if is_selected(&doc.id) { "[x]" } else { "[ ]" };
            format!(
                "{:>3}. {} {} ({} pages, {}) id={}",
                i + 1,
                marker,
                doc.filename,
                doc.page_count,
                status_label(doc.status),
                doc.id
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub async fn list_documents(state: &AppState, console: &Console) {
    let credential = state.settings.api_key();
    match state.workspace.load_documents(&credential).await {
        Ok(_) => {
            let docs = state.workspace.documents();
            console.print(format_document_list(&docs, |id| state.workspace.is_selected(id)));
        }
        Err(e) => console.error(e),
    }
}

pub async fn upload_document(state: &AppState, path: &Path, console: &Console) {
    let credential = state.settings.api_key();
    console.notice(format!("Uploading {}...", path.display()));
    match state.workspace.upload_document(path, &credential).await {
        Ok(doc) => console.notice(format!(
            "Uploaded {} ({}), id={}",
            doc.filename,
            status_label(doc.status),
            doc.id
        )),
        Err(e) => console.error(e),
    }
}

/// Resolves a 1-based list index or a document id.
fn resolve_document(state: &AppState, target: &str) -> Option<DocumentMetadata> {
    let docs = state.workspace.documents();
    if let Ok(index) = target.parse::<usize>() {
        if let Some(doc) = index.checked_sub(1).and_then(|i| docs.get(i)) {
            return Some(doc.clone());
        }
    }
    docs.into_iter().find(|d| d.id == target)
}

pub async fn toggle_document(state: &AppState, target: &str, console: &Console) {
    let Some(doc) = resolve_document(state, target) else {
        console.error(AppError::UnknownDocument(target.to_string()));
        return;
    };
    if !doc.is_available() {
        console.error(format!(
            "{} is {} and cannot be selected yet",
            doc.filename,
            status_label(doc.status)
        ));
        return;
    }

    let credential = state.settings.api_key();
    let selecting = !state.workspace.is_selected(&doc.id);
    if selecting || state.workspace.selection().len() > 1 {
        console.notice("Configuring workspace...");
    }
    match state.workspace.toggle_selection(&doc.id, &credential).await {
        Ok(ScopeOutcome::Created(ws)) => console.notice(format!(
            "Workspace ready: {} document(s), conversation reset",
            ws.document_ids.len()
        )),
        Ok(ScopeOutcome::Cleared) => console.notice("No documents selected, conversation reset"),
        Ok(ScopeOutcome::Stale) => {}
        Err(e) => console.error(e),
    }
}

pub fn show_scope(state: &AppState, console: &Console) {
    let selected = state.workspace.selected_documents();
    if selected.is_empty() {
        console.print("Active scope: none (select documents with /select)");
        return;
    }
    let names = selected
        .iter()
        .map(|d| d.filename.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let status = match (state.workspace.scope_status(), state.workspace.scope()) {
        (ScopeStatus::Ready, Some(ws)) => format!("{} ({})", ws.name, ws.id),
        (ScopeStatus::Configuring, _) => "configuring...".to_string(),
        _ => "unavailable, toggle a document to retry".to_string(),
    };
    console.print(format!("Active scope: {}\nDocuments: {}", status, names));
}
