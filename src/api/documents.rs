use super::{check_status, parse_json, ApiClient, ApiError, DocumentMetadata};
use reqwest::multipart::{Form, Part};
use reqwest::Method;

pub async fn list_documents(
    client: &ApiClient,
    credential: &str,
) -> Result<Vec<DocumentMetadata>, ApiError> {
    tracing::debug!("GET /documents/");
    let resp = client
        .json_request(Method::GET, "/documents/", credential)
        .send()
        .await?;
    let resp = check_status(resp).await?;
    parse_json(resp).await
}

pub async fn upload_document(
    client: &ApiClient,
    filename: &str,
    bytes: Vec<u8>,
    credential: &str,
) -> Result<DocumentMetadata, ApiError> {
    tracing::debug!(filename, size = bytes.len(), "POST /documents/upload");
    let part = Part::bytes(bytes).file_name(filename.to_string());
    let form = Form::new().part("file", part);

    let resp = client
        .multipart_request("/documents/upload", credential)
        .multipart(form)
        .send()
        .await?;
    let resp = check_status(resp).await?;
    parse_json(resp).await
}
