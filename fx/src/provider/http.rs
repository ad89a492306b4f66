//! Shared HTTP plumbing for upstream rate APIs.

use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::error::{ProviderError, ProviderErrorKind};

/// Some upstreams reject non-browser clients.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Endpoint and client settings for an HTTP-backed provider.
#[derive(Debug, Clone)]
pub struct HttpProviderConfig {
    /// Base URL, without trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl HttpProviderConfig {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            user_agent: BROWSER_USER_AGENT.to_string(),
        }
    }

    pub(crate) fn build_client(&self, provider: &str) -> Result<Client, ProviderError> {
        Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent.clone())
            .build()
            .map_err(|e| ProviderError::new(provider, ProviderErrorKind::Transport(e.to_string())))
    }
}

/// GET `url` and decode the JSON body, classifying every failure.
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    provider: &str,
    url: &str,
    timeout: Duration,
) -> Result<T, ProviderError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| classify(provider, e, timeout))?;

    let status = response.status();
    if !status.is_success() {
        return Err(ProviderError::new(
            provider,
            ProviderErrorKind::Http {
                status: status.as_u16(),
            },
        ));
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| classify(provider, e, timeout))?;

    serde_json::from_slice(&body).map_err(|e| ProviderError::schema(provider, e.to_string()))
}

fn classify(provider: &str, err: reqwest::Error, timeout: Duration) -> ProviderError {
    let kind = if err.is_timeout() {
        ProviderErrorKind::Timeout(timeout)
    } else {
        ProviderErrorKind::Transport(err.to_string())
    };
    ProviderError::new(provider, kind)
}
