use super::{check_status, parse_json, ApiClient, ApiError, CreateWorkspaceRequest, Workspace};
use reqwest::Method;

pub async fn create_workspace(
    client: &ApiClient,
    request: &CreateWorkspaceRequest,
    credential: &str,
) -> Result<Workspace, ApiError> {
    tracing::debug!(
        name = %request.name,
        documents = request.document_ids.len(),
        "POST /workspaces/"
    );
    let resp = client
        .json_request(Method::POST, "/workspaces/", credential)
        .json(request)
        .send()
        .await?;
    let resp = check_status(resp).await?;
    parse_json(resp).await
}
