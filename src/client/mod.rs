mod auth;
mod director;
mod generation;
mod vibe;

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, Response, StatusCode};

use crate::config::ClientConfig;
use crate::constant::Endpoint;
use crate::error::{Error, Result};

pub use auth::{AccessTokenProvider, StaticToken};

/// Async client for the image-generation service.
///
/// One instance may serve many concurrent calls; each streaming call owns its
/// own parser state.
pub struct NaiClient {
    http: reqwest::Client,
    config: ClientConfig,
    token_provider: Arc<dyn AccessTokenProvider>,
    vibe_cache: Mutex<HashMap<String, String>>,
}

impl NaiClient {
    /// Builds a client using the token from `config`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| Error::Config("no access token configured".to_string()))?;
        Self::with_token_provider(config, Arc::new(StaticToken::new(token)))
    }

    pub fn with_token_provider(
        config: ClientConfig,
        token_provider: Arc<dyn AccessTokenProvider>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(default_headers())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Config(format!("failed to build http client: {}", e)))?;

        log::info!("client initialized for {}", config.host);
        Ok(NaiClient {
            http,
            config,
            token_provider,
            vibe_cache: Mutex::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn endpoint_url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.config.host, endpoint.path())
    }

    /// POST builder with auth and the per-request correlation headers.
    pub(crate) async fn post(&self, endpoint: Endpoint) -> Result<RequestBuilder> {
        let token = self.token_provider.access_token().await?;
        Ok(self
            .http
            .post(self.endpoint_url(endpoint))
            .bearer_auth(token)
            .header("x-correlation-id", correlation_id())
            .header("x-initiated-at", initiated_at()))
    }

    /// Maps error statuses onto the error taxonomy and returns the body bytes
    /// of successful responses. Empty success bodies are decode failures.
    pub(crate) async fn check_response(&self, response: Response) -> Result<Vec<u8>> {
        let status = response.status();
        let bytes = response.bytes().await.map_err(transport_err)?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes).to_string();
            return Err(match status {
                StatusCode::BAD_REQUEST => Error::Api {
                    status: status.as_u16(),
                    message: format!("a validation error occurred: {}", body),
                },
                StatusCode::UNAUTHORIZED => {
                    Error::Auth(format!("access token is incorrect: {}", body))
                }
                StatusCode::PAYMENT_REQUIRED => {
                    Error::Auth(format!("an active subscription is required: {}", body))
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    Error::RateLimited(format!("rate limit exceeded: {}", body))
                }
                _ => Error::Api {
                    status: status.as_u16(),
                    message: body,
                },
            });
        }

        if bytes.is_empty() {
            return Err(Error::Decode("empty response from the server".to_string()));
        }
        Ok(bytes.to_vec())
    }

    pub(crate) fn vibe_cache_get(&self, key: &str) -> Option<String> {
        self.vibe_cache.lock().unwrap().get(key).cloned()
    }

    pub(crate) fn vibe_cache_put(&self, key: String, token: String) {
        self.vibe_cache.lock().unwrap().insert(key, token);
    }
}

pub(crate) fn transport_err(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!(
            "request timed out, consider a higher timeout value: {}",
            e
        ))
    } else {
        Error::Transport(e.to_string())
    }
}

// The service rejects requests that don't look like they come from the
// web frontend.
fn default_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Accept", HeaderValue::from_static("*/*"));
    headers.insert(
        "Accept-Language",
        HeaderValue::from_static("en-US,en;q=0.5"),
    );
    headers.insert("Origin", HeaderValue::from_static("https://novelai.net"));
    headers.insert("Referer", HeaderValue::from_static("https://novelai.net"));
    headers.insert("DHT", HeaderValue::from_static("1"));
    headers.insert("Sec-GPC", HeaderValue::from_static("1"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("empty"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("cors"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("same-site"));
    headers.insert("Priority", HeaderValue::from_static("u=0"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert(
        "User-Agent",
        HeaderValue::from_static(
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:138.0) Gecko/20100101 Firefox/138.0",
        ),
    );
    headers
}

fn correlation_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect()
}

fn initiated_at() -> String {
    Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_ids_are_six_alphanumerics() {
        for _ in 0..32 {
            let id = correlation_id();
            assert_eq!(id.len(), 6);
            assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn initiated_at_is_millisecond_utc() {
        let ts = initiated_at();
        assert!(ts.ends_with('Z'));
        // 2026-08-26T12:00:00.000Z
        assert_eq!(ts.len(), 24);
    }

    #[test]
    fn client_requires_a_token() {
        let result = NaiClient::new(ClientConfig::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn endpoint_urls_join_host_and_path() {
        let client = NaiClient::new(ClientConfig::default().with_token("pst-abc")).unwrap();
        assert_eq!(
            client.endpoint_url(Endpoint::ImageStream),
            "https://image.novelai.net/ai/generate-image-stream"
        );
    }
}
