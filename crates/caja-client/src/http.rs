//! HTTP client for the back-office REST backend.
//!
//! Returns raw JSON bodies with any `{ "data": ... }` envelope removed.
//! Turning a body into a domain record is the job of [`crate::wire`].

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::BackendConfig;
use crate::error::{ClientError, ClientResult};
use crate::wire::unwrap_envelope;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    timeout_secs: u64,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &BackendConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ClientError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.backend.base_url.trim_end_matches('/').to_string(),
            token: config.backend.api_token.clone(),
            timeout_secs: config.backend.request_timeout_secs,
        })
    }

    /// Set the authentication token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut request = self.client.request(method, self.url(path));
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        self.send(path, self.request(Method::GET, path)).await
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> ClientResult<Value> {
        self.send(path, self.request(Method::GET, path).query(query))
            .await
    }

    /// Make a POST request with JSON body
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Value> {
        self.send(path, self.request(Method::POST, path).json(body))
            .await
    }

    /// Make a PATCH request with JSON body
    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Value> {
        self.send(path, self.request(Method::PATCH, path).json(body))
            .await
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> ClientResult<Value> {
        debug!(path, "Backend request");
        let response = request
            .send()
            .await
            .map_err(|e| ClientError::from_transport(e, self.timeout_secs))?;
        self.handle_response(path, response).await
    }

    /// Handle the HTTP response
    async fn handle_response(&self, path: &str, response: Response) -> ClientResult<Value> {
        let status = response.status();

        if !status.is_success() {
            let text = response
                .text()
                .await
                .map_err(|e| ClientError::from_transport(e, self.timeout_secs))?;
            let message = error_message(&text);
            warn!(path, status = status.as_u16(), message = %message, "Backend refused request");
            return Err(status_error(status, message));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClientError::from_transport(e, self.timeout_secs))?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(unwrap_envelope(body))
    }
}

/// Maps a non-success status onto a client error.
fn status_error(status: StatusCode, message: String) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::CONFLICT => ClientError::Conflict(message),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ClientError::Validation {
            status: status.as_u16(),
            message,
        },
        s if s.is_client_error() => ClientError::Validation {
            status: s.as_u16(),
            message,
        },
        s => ClientError::Server {
            status: s.as_u16(),
            message,
        },
    }
}

/// Pulls `message` or `error` out of a JSON error body; falls back to the
/// raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining() {
        let mut config = BackendConfig::default();
        config.backend.base_url = "https://api.tienda.gt/".to_string();
        let client = HttpClient::new(&config).unwrap();
        assert_eq!(client.url("/api/sales"), "https://api.tienda.gt/api/sales");
        assert_eq!(client.url("api/sales"), "https://api.tienda.gt/api/sales");
    }

    #[test]
    fn test_status_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, String::new()),
            ClientError::Unauthorized
        ));
        assert!(matches!(
            status_error(StatusCode::UNPROCESSABLE_ENTITY, "bad".into()),
            ClientError::Validation { status: 422, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, "slow".into()),
            ClientError::Validation { status: 429, .. }
        ));
        assert!(matches!(
            status_error(StatusCode::BAD_GATEWAY, "gw".into()),
            ClientError::Server { status: 502, .. }
        ));
    }

    #[test]
    fn test_error_message_extraction() {
        assert_eq!(error_message(r#"{"message":"Stock insuficiente"}"#), "Stock insuficiente");
        assert_eq!(error_message(r#"{"error":"nope"}"#), "nope");
        assert_eq!(error_message("  plain text "), "plain text");
    }
}
