use crate::constants::download::STREAM_CONTENT_TYPES;
use crate::constants::network::TIMEOUT_API_REQUEST_MS;
use crate::errors::ToolError;
use crate::services::credentials::CredentialCache;
use crate::services::logger::Logger;
use crate::utils::paths::env_string;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub type ByteStream = BoxStream<'static, Result<Bytes, ToolError>>;

/// What an operation produced: a structured payload, or a byte stream that
/// must be materialized on disk instead of being inlined.
pub enum CallOutcome {
    Json(Value),
    Stream(ByteStream),
}

/// An opaque capability executing `resource/verb` operations against a
/// remote service.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn execute(
        &self,
        resource: &str,
        verb: &str,
        params: &Value,
    ) -> Result<CallOutcome, ToolError>;
}

/// Default binding: `resource/verb` maps onto `POST {base}/{resource}/{verb}`
/// with the parameter mapping as JSON body. Every call is fronted by a
/// bearer token from the credential cache. Binary content types surface as
/// a byte stream; everything else parses as JSON.
pub struct HttpConnector {
    logger: Logger,
    client: reqwest::Client,
    base_url: Option<String>,
    credentials: Arc<CredentialCache>,
}

impl HttpConnector {
    pub fn new(
        logger: Logger,
        base_url: Option<String>,
        credentials: Arc<CredentialCache>,
    ) -> Result<Self, ToolError> {
        let base_url = match base_url {
            Some(raw) => Some(normalize_base_url(&raw)?),
            None => None,
        };
        let client = reqwest::Client::builder()
            .user_agent("relay/0.4")
            .build()
            .expect("reqwest client");
        Ok(Self {
            logger: logger.child("connector"),
            client,
            base_url,
            credentials,
        })
    }

    pub fn from_env(logger: Logger, credentials: Arc<CredentialCache>) -> Result<Self, ToolError> {
        Self::new(logger, env_string("RELAY_API_BASE_URL"), credentials)
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn execute(
        &self,
        resource: &str,
        verb: &str,
        params: &Value,
    ) -> Result<CallOutcome, ToolError> {
        let base_url = self.base_url.as_deref().ok_or_else(|| {
            ToolError::invalid_params("API base URL is not configured")
                .with_hint("Set RELAY_API_BASE_URL, e.g. \"https://api.example.com/v1\".")
        })?;
        let token = self.credentials.get_token().await?;
        let url = format!("{}/{}/{}", base_url, resource, verb);
        self.logger.debug(
            "execute",
            Some(&serde_json::json!({ "resource": resource, "verb": verb })),
        );

        let request = self.client.post(&url).bearer_auth(token).json(params);
        let response = tokio::time::timeout(
            Duration::from_millis(TIMEOUT_API_REQUEST_MS),
            request.send(),
        )
        .await
        .map_err(|_| ToolError::timeout("API request timed out"))?
        .map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            let preview: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(2048)
                .collect();
            return Err(ToolError::transport(format!(
                "API call {}/{} failed ({})",
                resource,
                verb,
                status.as_u16()
            ))
            .with_details(serde_json::json!({
                "status": status.as_u16(),
                "body": preview,
            })));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();
        if is_stream_content_type(&content_type) {
            let stream = response
                .bytes_stream()
                .map(|chunk| chunk.map_err(map_reqwest_error))
                .boxed();
            return Ok(CallOutcome::Stream(stream));
        }

        let text = response.text().await.map_err(map_reqwest_error)?;
        if text.trim().is_empty() {
            return Ok(CallOutcome::Json(Value::Null));
        }
        let payload: Value = serde_json::from_str(&text)
            .map_err(|_| ToolError::transport("API response is not valid JSON"))?;
        Ok(CallOutcome::Json(payload))
    }
}

pub(crate) fn is_stream_content_type(content_type: &str) -> bool {
    STREAM_CONTENT_TYPES
        .iter()
        .any(|prefix| content_type.starts_with(prefix))
}

pub fn map_reqwest_error(err: reqwest::Error) -> ToolError {
    if err.is_timeout() {
        return ToolError::timeout("HTTP request timed out");
    }
    ToolError::transport(err.to_string())
}

fn normalize_base_url(raw: &str) -> Result<String, ToolError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ToolError::invalid_params("API base URL is required"));
    }
    let mut url = Url::parse(raw).map_err(|_| {
        ToolError::invalid_params("Invalid API base URL")
            .with_hint("Expected a valid URL, e.g. \"https://api.example.com/v1\".")
            .with_details(serde_json::json!({ "base_url": raw }))
    })?;
    url.set_fragment(None);
    url.set_query(None);
    let normalized = format!("{}{}", url.origin().ascii_serialization(), url.path());
    Ok(normalized.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use super::{is_stream_content_type, normalize_base_url};

    #[test]
    fn base_url_drops_query_fragment_and_trailing_slash() {
        let normalized = normalize_base_url("https://api.example.com/v1/?x=1#frag").expect("url");
        assert_eq!(normalized, "https://api.example.com/v1");
    }

    #[test]
    fn base_url_rejects_garbage() {
        assert!(normalize_base_url("not a url").is_err());
        assert!(normalize_base_url("   ").is_err());
    }

    #[test]
    fn binary_content_types_route_to_the_stream_path() {
        assert!(is_stream_content_type("audio/mpeg"));
        assert!(is_stream_content_type("video/mp4"));
        assert!(is_stream_content_type("image/png"));
        assert!(is_stream_content_type("application/octet-stream"));
        assert!(!is_stream_content_type("application/json; charset=utf-8"));
        assert!(!is_stream_content_type("text/plain"));
    }
}
