use std::time::Duration;

use async_trait::async_trait;
use esios_types::EsiosError;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::transport::Transport;

/// Retry policy for transient failures (timeouts, 5xx, connection resets).
/// `401`/`403` never retry: a bad API key won't fix itself on attempt two.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

pub struct ReqwestTransport {
    base_url: Url,
    api_key: String,
    client: reqwest::Client,
    download_client: reqwest::Client,
    retry: RetryConfig,
}

impl ReqwestTransport {
    pub fn new(base_url: Url, api_key: String) -> Result<Self, EsiosError> {
        Self::with_retry(base_url, api_key, RetryConfig::default())
    }

    pub fn with_retry(base_url: Url, api_key: String, retry: RetryConfig) -> Result<Self, EsiosError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|err| EsiosError::Config(format!("failed to build HTTP client: {err}")))?;
        // Downloads must not carry the API key past the first hop: ESIOS
        // redirects to a pre-signed storage URL that rejects the header.
        let download_client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| EsiosError::Config(format!("failed to build download client: {err}")))?;

        Ok(Self {
            base_url,
            api_key,
            client,
            download_client,
            retry,
        })
    }

    async fn send_with_retry(&self, build: impl Fn() -> reqwest::RequestBuilder) -> Result<reqwest::Response, EsiosError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = build().send().await;

            match result {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if resp.status() == StatusCode::UNAUTHORIZED || resp.status() == StatusCode::FORBIDDEN => {
                    return Err(EsiosError::Auth(format!(
                        "ESIOS rejected the request: {}",
                        resp.status()
                    )));
                }
                Ok(resp) => {
                    // Any non-success, non-auth status is retried, matching
                    // the original's `_should_retry` (true for every
                    // `APIResponseError`, i.e. any status >= 400 other than
                    // 401/403), not just 5xx.
                    let status = resp.status();
                    let body = truncated_body(resp).await;
                    if attempt >= self.retry.max_attempts {
                        return Err(EsiosError::transport(
                            format!("ESIOS returned {status}: {body}"),
                            false,
                        ));
                    }
                    warn!(attempt, %status, "non-success ESIOS response, retrying");
                }
                Err(err) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(EsiosError::transport(err.to_string(), true));
                    }
                    warn!(attempt, error = %err, "request failed, retrying");
                }
            }

            let delay = self.retry.base_delay * 2u32.saturating_pow(attempt - 1);
            tokio::time::sleep(delay).await;
        }
    }
}

async fn truncated_body(resp: reqwest::Response) -> String {
    match resp.text().await {
        Ok(text) => text.chars().take(200).collect(),
        Err(_) => "<unreadable body>".to_string(),
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, EsiosError> {
        let mut url = self.base_url.join(path).map_err(|err| EsiosError::Config(err.to_string()))?;
        url.query_pairs_mut().extend_pairs(query);
        debug!(url = %url, "GET");

        let api_key = self.api_key.clone();
        let client = self.client.clone();
        let resp = self
            .send_with_retry(move || {
                client
                    .get(url.clone())
                    .header("x-api-key", &api_key)
                    .header("Accept", "application/json")
            })
            .await?;

        resp.json::<serde_json::Value>()
            .await
            .map_err(|err| EsiosError::transport(format!("invalid JSON response: {err}"), false))
    }

    async fn download(&self, url: &str) -> Result<bytes::Bytes, EsiosError> {
        let first = self
            .download_client
            .get(url)
            .header("x-api-key", &self.api_key)
            .send()
            .await
            .map_err(|err| EsiosError::transport(err.to_string(), true))?;

        let resp = if first.status().is_redirection() {
            let location = first
                .headers()
                .get(reqwest::header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| EsiosError::transport("redirect with no Location header", false))?
                .to_string();

            debug!(location = %location, "following archive redirect without api key");
            self.download_client
                .get(&location)
                .send()
                .await
                .map_err(|err| EsiosError::transport(err.to_string(), true))?
        } else {
            first
        };

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(EsiosError::transport(format!("download failed: {status}"), status.is_server_error()));
        }

        resp.bytes()
            .await
            .map_err(|err| EsiosError::transport(err.to_string(), true))
    }
}
