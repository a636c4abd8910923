//! HTTP client utilities.

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HttpConfig;
use crate::sources::SourceError;

/// Shared HTTP client with sensible defaults
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Arc<Client>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &HttpConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| SourceError::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
        })
    }

    /// Get the underlying client
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Map a non-success response onto the error taxonomy.
///
/// 429 becomes [`SourceError::RateLimited`] carrying any `Retry-After` seconds,
/// 404 becomes [`SourceError::NotFound`], every other non-2xx status becomes
/// [`SourceError::Http`].
pub fn ensure_success(response: Response, context: &str) -> Result<Response, SourceError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => Err(SourceError::RateLimited {
            retry_after: retry_after(&response),
        }),
        StatusCode::NOT_FOUND => Err(SourceError::NotFound(format!(
            "{} returned 404 for {}",
            context,
            response.url()
        ))),
        _ => Err(SourceError::Http {
            status: status.as_u16(),
            message: format!("{} returned status {}", context, status),
        }),
    }
}

/// Send a request and decode its JSON body.
///
/// Transport failures become [`SourceError::Network`], bad statuses go through
/// [`ensure_success`] and undecodable bodies become [`SourceError::Parse`].
pub async fn send_json<T: DeserializeOwned>(
    request: RequestBuilder,
    context: &str,
) -> Result<T, SourceError> {
    let response = request
        .send()
        .await
        .map_err(|e| SourceError::Network(format!("{} request failed: {}", context, e)))?;

    let response = ensure_success(response, context)?;
    tracing::debug!("{} responded {} for {}", context, response.status(), response.url());

    let bytes = response
        .bytes()
        .await
        .map_err(|e| SourceError::Network(format!("{} body read failed: {}", context, e)))?;

    serde_json::from_slice(&bytes)
        .map_err(|e| SourceError::Parse(format!("Failed to parse {} response: {}", context, e)))
}

/// Parse a `Retry-After` header given in whole seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_from_default_config() {
        let client = HttpClient::new(&HttpConfig::default());
        assert!(client.is_ok());
    }

    #[tokio::test]
    async fn test_ensure_success_classifies_statuses() {
        let mut server = mockito::Server::new_async().await;
        let _limited = server
            .mock("GET", "/limited")
            .with_status(429)
            .with_header("retry-after", "7")
            .create_async()
            .await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/broken")
            .with_status(503)
            .create_async()
            .await;

        let client = reqwest::Client::new();

        let response = client
            .get(format!("{}/limited", server.url()))
            .send()
            .await
            .unwrap();
        match ensure_success(response, "test") {
            Err(SourceError::RateLimited { retry_after }) => {
                assert_eq!(retry_after, Some(Duration::from_secs(7)))
            }
            other => panic!("Expected RateLimited, got {:?}", other),
        }

        let response = client
            .get(format!("{}/missing", server.url()))
            .send()
            .await
            .unwrap();
        assert!(matches!(
            ensure_success(response, "test"),
            Err(SourceError::NotFound(_))
        ));

        let response = client
            .get(format!("{}/broken", server.url()))
            .send()
            .await
            .unwrap();
        assert!(matches!(
            ensure_success(response, "test"),
            Err(SourceError::Http { status: 503, .. })
        ));
    }

    #[tokio::test]
    async fn test_send_json() {
        let mut server = mockito::Server::new_async().await;
        let _ok = server
            .mock("GET", "/ok")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"value": 42}"#)
            .create_async()
            .await;
        let _garbage = server
            .mock("GET", "/garbage")
            .with_status(200)
            .with_body("<html>")
            .create_async()
            .await;

        #[derive(serde::Deserialize)]
        struct Body {
            value: u32,
        }

        let client = reqwest::Client::new();

        let body: Body = send_json(client.get(format!("{}/ok", server.url())), "test")
            .await
            .unwrap();
        assert_eq!(body.value, 42);

        let result: Result<Body, _> =
            send_json(client.get(format!("{}/garbage", server.url())), "test").await;
        assert!(matches!(result, Err(SourceError::Parse(_))));

        let result: Result<Body, _> =
            send_json(client.get("http://127.0.0.1:1/unreachable"), "test").await;
        assert!(matches!(result, Err(SourceError::Network(_))));
    }
}
