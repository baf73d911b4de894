use super::{check_status, parse_json, ApiClient, ApiError, ChatRequest, ChatResponse};
use reqwest::Method;

/// Single non-streaming question/answer round trip. Dropping the returned
/// future aborts the underlying HTTP request.
pub async fn chat(
    client: &ApiClient,
    request: &ChatRequest,
    credential: &str,
) -> Result<ChatResponse, ApiError> {
    tracing::debug!(chars = request.question.len(), "POST /chat");
    let resp = client
        .json_request(Method::POST, "/chat", credential)
        .json(request)
        .send()
        .await?;
    let resp = check_status(resp).await?;
    parse_json(resp).await
}
