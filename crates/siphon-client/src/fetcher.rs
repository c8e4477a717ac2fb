use std::time::Duration;

use reqwest::Client;
use siphon_core::error::AppError;
use siphon_core::traits::Fetcher;
use url::Url;

/// HTTP document fetcher using reqwest.
///
/// Issues a plain GET and returns the body as text. Transport errors,
/// timeouts and non-success statuses all surface as
/// [`AppError::FetchFailed`].
#[derive(Clone)]
pub struct ReqwestFetcher {
    client: Client,
    timeout: Duration,
}

impl ReqwestFetcher {
    pub fn new() -> Result<Self, AppError> {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder()
            .user_agent(concat!("siphon/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::FetchFailed(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self { client, timeout })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        validate_url(url)?;

        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::FetchFailed(format!(
                    "Request to {url} timed out after {}s",
                    self.timeout.as_secs()
                ))
            } else if e.is_connect() {
                AppError::FetchFailed(format!("Connection to {url} failed: {e}"))
            } else {
                AppError::FetchFailed(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::FetchFailed(format!(
                "HTTP {} for {}",
                status.as_u16(),
                url
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| AppError::FetchFailed(format!("Failed to read response body: {e}")))?;
        tracing::debug!(%url, bytes = body.len(), "Fetched document");
        Ok(body)
    }
}

/// Only absolute `http`/`https` URLs are fetched.
fn validate_url(url: &str) -> Result<(), AppError> {
    let parsed =
        Url::parse(url).map_err(|e| AppError::FetchFailed(format!("Invalid URL '{url}': {e}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            return Err(AppError::FetchFailed(format!(
                "URL scheme '{scheme}' is not allowed (only http/https)"
            )));
        }
    }

    if parsed.host_str().is_none() {
        return Err(AppError::FetchFailed(format!("URL '{url}' has no host")));
    }

    Ok(())
}
