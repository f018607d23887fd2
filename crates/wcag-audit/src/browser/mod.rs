//! Browser abstraction for the dynamic acquisition backend.
//!
//! Defines the `BrowserLauncher`, `BrowserProcess` and `PageContext` traits
//! that abstract over the rendering engine (currently Chromium via
//! chromiumoxide). Process ownership lives in [`lifecycle::BrowserSession`].

pub mod chromium;
pub mod lifecycle;

pub use chromium::{find_chromium, ChromiumLauncher};
pub use lifecycle::BrowserSession;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::error::AcquisitionError;

/// Result of navigating to a URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NavigationResult {
    /// The final URL after any redirects.
    pub final_url: String,
    /// Time from navigation start until the network settled, in milliseconds.
    pub load_time_ms: u64,
}

/// When a page counts as settled after its load event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkIdle {
    /// In-flight requests tolerated while idle.
    pub max_inflight: usize,
    /// How long the request count must stay at or below `max_inflight`.
    pub quiet_period: Duration,
}

impl Default for NetworkIdle {
    fn default() -> Self {
        Self {
            max_inflight: 0,
            quiet_period: Duration::from_millis(500),
        }
    }
}

/// Starts isolated rendering processes.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch a new browser process owned by the caller.
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, AcquisitionError>;
}

/// A running browser process.
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// Open a new page context.
    async fn new_page(&self) -> Result<Box<dyn PageContext>>;
    /// Terminate the process. Consumes the handle so it can only happen once.
    async fn terminate(self: Box<Self>) -> Result<()>;
}

/// A single page of a running browser.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Navigate and wait until the network is idle.
    async fn navigate(&mut self, url: &str, idle: NetworkIdle) -> Result<NavigationResult>;
    /// Append a `<script>` element with the given source to the document.
    async fn add_script(&self, source: &str) -> Result<()>;
    /// Evaluate an expression in the page, awaiting promises.
    async fn evaluate(&self, expression: &str) -> Result<Value>;
    /// Serialize the current DOM.
    async fn content(&self) -> Result<String>;
}

/// A launcher that never starts a browser.
///
/// Used when dynamic rendering is switched off. Static audits keep working;
/// dynamic ones fail at acquisition time with the given reason.
pub struct DisabledLauncher {
    reason: String,
}

impl DisabledLauncher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for DisabledLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, AcquisitionError> {
        Err(AcquisitionError::BrowserUnavailable(self.reason.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_launcher_reports_reason() {
        let launcher = DisabledLauncher::new("dynamic rendering disabled");
        let err = launcher.launch().await.err().unwrap();
        assert_eq!(
            err.to_string(),
            "rendering browser unavailable: dynamic rendering disabled"
        );
    }
}
