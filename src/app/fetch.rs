use std::time::Duration;

use async_trait::async_trait;
use url::Url;

use super::error::{ConfigError, FetchError};

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_MS: u64 = 2000;

/// Anything that can turn a URL into an HTML body.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError>;
}

/// `PageSource` backed by a shared `reqwest::Client`.
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
    timeout_ms: u64,
}

impl HttpSource {
    pub fn new(user_agent: &str, timeout_ms: u64) -> Result<Self, ConfigError> {
        let timeout_ms = timeout_ms.max(1);
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(Duration::from_millis(timeout_ms))
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|err| ConfigError::Client(err.to_string()))?;
        Ok(Self { client, timeout_ms })
    }
}

#[async_trait]
impl PageSource for HttpSource {
    async fn fetch(&self, url: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|err| self.request_error(url, err))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|err| {
            if err.is_timeout() {
                self.request_error(url, err)
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    reason: err.to_string(),
                }
            }
        })
    }
}

impl HttpSource {
    fn request_error(&self, url: &Url, err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: self.timeout_ms,
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                reason: err.to_string(),
            }
        }
    }
}
