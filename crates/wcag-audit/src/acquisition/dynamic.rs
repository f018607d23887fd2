//! Dynamic acquisition: render the page in a browser and wait for it to
//! settle.

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::browser::{BrowserSession, NetworkIdle, PageContext};
use crate::config::AuditConfig;
use crate::error::AcquisitionError;

/// A page rendered in a live browser, scripts executed, network settled.
///
/// Borrows nothing from the session, but is only usable while the session
/// that produced it is alive.
pub struct LiveDocument {
    page: Box<dyn PageContext>,
    requested: Url,
    final_url: String,
    load_time_ms: u64,
}

impl LiveDocument {
    pub fn page(&self) -> &dyn PageContext {
        self.page.as_ref()
    }

    pub fn requested_url(&self) -> &Url {
        &self.requested
    }

    /// URL of the document after redirects.
    pub fn url(&self) -> &str {
        &self.final_url
    }

    pub fn load_time_ms(&self) -> u64 {
        self.load_time_ms
    }
}

/// Budgets for the dynamic backend.
#[derive(Debug, Clone)]
pub struct DynamicAcquisition {
    page_timeout: Duration,
    navigation_timeout: Duration,
    idle: NetworkIdle,
}

impl DynamicAcquisition {
    pub fn new(config: &AuditConfig) -> Self {
        Self {
            page_timeout: config.page_timeout,
            navigation_timeout: config.navigation_timeout,
            idle: NetworkIdle {
                max_inflight: config.idle_connections,
                quiet_period: config.network_idle,
            },
        }
    }

    /// Open a page in `session` and navigate it to `url`.
    ///
    /// The navigation budget covers both the load and the network-idle wait.
    pub async fn acquire(
        &self,
        session: &BrowserSession,
        url: &Url,
    ) -> Result<LiveDocument, AcquisitionError> {
        let process = session.process()?;

        let mut page = tokio::time::timeout(self.page_timeout, process.new_page())
            .await
            .map_err(|_| AcquisitionError::Timeout {
                stage: "page context",
                after: self.page_timeout,
            })?
            .map_err(|e| AcquisitionError::Browser(format!("{e:#}")))?;

        debug!(%url, "navigating");
        let nav = match tokio::time::timeout(
            self.navigation_timeout,
            page.navigate(url.as_str(), self.idle),
        )
        .await
        {
            Ok(Ok(nav)) => nav,
            Ok(Err(e)) => {
                return Err(AcquisitionError::Navigation {
                    url: url.to_string(),
                    reason: format!("{e:#}"),
                })
            }
            Err(_) => {
                return Err(AcquisitionError::Timeout {
                    stage: "navigation",
                    after: self.navigation_timeout,
                })
            }
        };

        info!(
            final_url = %nav.final_url,
            load_ms = nav.load_time_ms,
            "page rendered"
        );

        Ok(LiveDocument {
            page,
            requested: url.clone(),
            final_url: nav.final_url,
            load_time_ms: nav.load_time_ms,
        })
    }
}
