use crate::constants::auth::TOKEN_EXPIRY_BUFFER_SECS;
use crate::constants::network::TIMEOUT_TOKEN_REQUEST_MS;
use crate::errors::ToolError;
use crate::services::connector::map_reqwest_error;
use crate::services::logger::Logger;
use crate::utils::paths::env_string;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Injected time source so expiry behavior is testable without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[derive(Debug, Clone)]
pub struct TokenGrant {
    pub access_token: String,
    pub expires_in: u64,
}

#[async_trait]
pub trait TokenFetcher: Send + Sync {
    async fn fetch(&self) -> Result<TokenGrant, ToolError>;
}

/// Client-credentials fetcher for the remote authorization service.
/// Credentials come from `RELAY_AUTH_URL`, `RELAY_CLIENT_ID`, and
/// `RELAY_CLIENT_SECRET`; missing values surface as an auth error at fetch
/// time so the server still starts without configuration.
pub struct HttpTokenFetcher {
    client: reqwest::Client,
    auth_url: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl HttpTokenFetcher {
    pub fn new(
        auth_url: Option<String>,
        client_id: Option<String>,
        client_secret: Option<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("relay/0.4")
            .timeout(Duration::from_millis(TIMEOUT_TOKEN_REQUEST_MS))
            .build()
            .expect("reqwest client");
        Self {
            client,
            auth_url,
            client_id,
            client_secret,
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            env_string("RELAY_AUTH_URL"),
            env_string("RELAY_CLIENT_ID"),
            env_string("RELAY_CLIENT_SECRET"),
        )
    }
}

#[async_trait]
impl TokenFetcher for HttpTokenFetcher {
    async fn fetch(&self) -> Result<TokenGrant, ToolError> {
        let (auth_url, client_id, client_secret) = match (
            self.auth_url.as_deref(),
            self.client_id.as_deref(),
            self.client_secret.as_deref(),
        ) {
            (Some(url), Some(id), Some(secret)) => (url, id, secret),
            _ => {
                return Err(ToolError::auth("API credentials are not configured").with_hint(
                    "Set RELAY_AUTH_URL, RELAY_CLIENT_ID, and RELAY_CLIENT_SECRET.",
                ));
            }
        };

        let body = serde_json::json!({
            "client_id": client_id,
            "client_secret": client_secret,
        });
        let response = self
            .client
            .post(auth_url)
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let text = response.text().await.map_err(map_reqwest_error)?;
        grant_from_response(status, &text)
    }
}

/// Maps a token-endpoint response to a grant or a typed failure. 401/403
/// and server errors are authentication failures carrying the status; any
/// other non-2xx is a plain transport failure.
fn grant_from_response(status: u16, body: &str) -> Result<TokenGrant, ToolError> {
    if status == 401 || status == 403 || status >= 500 {
        return Err(
            ToolError::auth(format!("Token request failed ({})", status))
                .with_details(serde_json::json!({ "status": status })),
        );
    }
    if !(200..300).contains(&status) {
        return Err(
            ToolError::transport(format!("Token request failed ({})", status))
                .with_details(serde_json::json!({ "status": status })),
        );
    }
    let payload: Value = serde_json::from_str(body)
        .map_err(|_| ToolError::internal("Token response is not valid JSON"))?;
    let access_token = payload
        .get("access_token")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();
    if access_token.is_empty() {
        return Err(ToolError::auth("Token response did not include access_token"));
    }
    let expires_in = payload
        .get("expires_in")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    Ok(TokenGrant {
        access_token,
        expires_in,
    })
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// One cached bearer token per client instance. The slot lock is held
/// across the remote fetch, so concurrent callers that both observe an
/// expired token serialize on a single request and the second caller sees
/// the fresh token on lock acquisition. Fetch failures leave the slot
/// untouched; the next call re-attempts.
pub struct CredentialCache {
    logger: Logger,
    fetcher: Arc<dyn TokenFetcher>,
    clock: Arc<dyn Clock>,
    slot: Mutex<Option<CachedToken>>,
}

impl CredentialCache {
    pub fn new(logger: Logger, fetcher: Arc<dyn TokenFetcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            logger: logger.child("credentials"),
            fetcher,
            clock,
            slot: Mutex::new(None),
        }
    }

    pub async fn get_token(&self) -> Result<String, ToolError> {
        let mut slot = self.slot.lock().await;
        if let Some(cached) = slot.as_ref() {
            if self.clock.now() < cached.expires_at {
                return Ok(cached.value.clone());
            }
        }

        let fetched_at = self.clock.now();
        let grant = self.fetcher.fetch().await?;
        let lifetime = grant.expires_in.saturating_sub(TOKEN_EXPIRY_BUFFER_SECS);
        let expires_at = fetched_at + Duration::from_secs(lifetime);
        self.logger.debug(
            "token refreshed",
            Some(&serde_json::json!({ "expires_in": grant.expires_in })),
        );
        let value = grant.access_token;
        *slot = Some(CachedToken {
            value: value.clone(),
            expires_at,
        });
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::grant_from_response;
    use crate::errors::ToolErrorKind;

    #[test]
    fn unauthorized_status_is_an_auth_error_carrying_the_code() {
        for status in [401, 403, 500, 503] {
            let err = grant_from_response(status, "").expect_err("must fail");
            assert_eq!(err.kind, ToolErrorKind::Auth);
            assert!(err.message.contains(&status.to_string()));
        }
    }

    #[test]
    fn other_failures_stay_transport_errors() {
        let err = grant_from_response(404, "").expect_err("must fail");
        assert_eq!(err.kind, ToolErrorKind::Transport);
    }

    #[test]
    fn successful_response_yields_the_grant() {
        let grant = grant_from_response(
            200,
            r#"{"access_token": "abc", "token_type": "Bearer", "expires_in": 3600}"#,
        )
        .expect("grant");
        assert_eq!(grant.access_token, "abc");
        assert_eq!(grant.expires_in, 3600);
    }

    #[test]
    fn missing_token_in_payload_is_an_auth_error() {
        let err = grant_from_response(200, r#"{"expires_in": 10}"#).expect_err("must fail");
        assert_eq!(err.kind, ToolErrorKind::Auth);
    }
}
