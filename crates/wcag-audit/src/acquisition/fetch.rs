//! Static fetch of a document over HTTP.
//!
//! Not a browser: a single GET, following at most five redirects. The audit
//! is a one-shot operation, so nothing here retries; callers decide based on
//! [`crate::AuditError::is_transient`].

use std::time::Duration;

use tracing::debug;
use url::Url;

use crate::config::AuditConfig;
use crate::error::{AcquisitionError, ConfigError};

/// A successfully fetched document.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Original requested URL.
    pub url: Url,
    /// Final URL after redirects.
    pub final_url: Url,
    pub status: u16,
    pub content_type: Option<String>,
    /// Response body as text.
    pub body: String,
}

/// HTTP client for the static-fetch backend.
#[derive(Clone)]
pub struct Fetcher {
    client: reqwest::Client,
    max_bytes: usize,
}

impl Fetcher {
    pub fn new(config: &AuditConfig) -> Result<Self, ConfigError> {
        Self::with_limits(
            config.fetch_timeout,
            config.max_document_bytes,
            &config.user_agent,
        )
    }

    /// Fails if the client cannot be built; a client without the timeout
    /// and redirect limit is never substituted.
    pub fn with_limits(
        timeout: Duration,
        max_bytes: usize,
        user_agent: &str,
    ) -> Result<Self, ConfigError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(user_agent)
            .build()
            .map_err(ConfigError::HttpClient)?;

        Ok(Self { client, max_bytes })
    }

    /// GET `url` and return its body.
    ///
    /// Non-2xx responses and bodies larger than the configured limit are
    /// acquisition failures.
    pub async fn fetch(&self, url: &Url) -> Result<FetchedPage, AcquisitionError> {
        let fetch_err = |source| AcquisitionError::Fetch {
            url: url.to_string(),
            source,
        };

        let mut resp = self
            .client
            .get(url.clone())
            .header("Accept", "text/html,application/xhtml+xml;q=0.9,*/*;q=0.8")
            .send()
            .await
            .map_err(fetch_err)?;

        let status = resp.status();
        let final_url = resp.url().clone();
        if !status.is_success() {
            return Err(AcquisitionError::Status {
                url: final_url.to_string(),
                status: status.as_u16(),
            });
        }

        let too_large = || AcquisitionError::TooLarge {
            url: final_url.to_string(),
            limit: self.max_bytes,
        };
        if resp
            .content_length()
            .is_some_and(|len| len > self.max_bytes as u64)
        {
            return Err(too_large());
        }

        let content_type = resp
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut bytes = Vec::new();
        while let Some(chunk) = resp.chunk().await.map_err(fetch_err)? {
            if bytes.len() + chunk.len() > self.max_bytes {
                return Err(too_large());
            }
            bytes.extend_from_slice(&chunk);
        }

        debug!(
            %final_url,
            status = status.as_u16(),
            bytes = bytes.len(),
            "fetched document"
        );

        Ok(FetchedPage {
            url: url.clone(),
            final_url,
            status: status.as_u16(),
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}
