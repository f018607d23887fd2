//! Configuration loading and resolution.
//!
//! Navigation defaults to a 30 s budget and waits for network idle (zero
//! in-flight connections for 500 ms). Every value can be
//! overridden through a `WCAG_AUDIT_*` environment variable.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::error::ConfigError;
use crate::types::DEFAULT_BASE_URL;

/// Default maximum document size (10 MB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: usize = 10 * 1024 * 1024;

/// Browser-like user agent sent with static fetches.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) \
                                      AppleWebKit/537.36 (KHTML, like Gecko) \
                                      Chrome/131.0.0.0 Safari/537.36 wcag-audit";

/// Global name the default script payload (axe-core) installs on `window`.
pub const DEFAULT_ENGINE_GLOBAL: &str = "axe";

/// Runtime configuration for the audit engine.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Base URL for markup audits without an explicit `baseUrl`.
    pub default_base_url: Url,
    /// Overall budget for a static fetch, body included.
    pub fetch_timeout: Duration,
    /// Largest document accepted from a static fetch.
    pub max_document_bytes: usize,
    pub user_agent: String,
    /// Budget for starting the browser process.
    pub launch_timeout: Duration,
    /// Budget for opening a page context in a running browser.
    pub page_timeout: Duration,
    /// Budget for navigation including the network-idle wait.
    pub navigation_timeout: Duration,
    /// How long the network must stay idle before the page counts as settled.
    pub network_idle: Duration,
    /// In-flight requests tolerated while still considered idle.
    pub idle_connections: usize,
    /// Budget for injecting and running the rule engine.
    pub evaluation_timeout: Duration,
    /// Explicit Chromium executable; discovered at launch time when unset.
    pub chromium_path: Option<PathBuf>,
    /// Viewport of rendered pages.
    pub viewport: (u32, u32),
    /// Script payload injected into live pages (e.g. `axe.min.js`).
    pub engine_script: Option<PathBuf>,
    /// Global the script payload installs.
    pub engine_global: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            default_base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            fetch_timeout: Duration::from_secs(30),
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            launch_timeout: Duration::from_secs(20),
            page_timeout: Duration::from_secs(10),
            navigation_timeout: Duration::from_secs(30),
            network_idle: Duration::from_millis(500),
            idle_connections: 0,
            evaluation_timeout: Duration::from_secs(60),
            chromium_path: None,
            viewport: (1920, 1080),
            engine_script: None,
            engine_global: DEFAULT_ENGINE_GLOBAL.to_string(),
        }
    }
}

impl AuditConfig {
    /// Defaults overridden by `WCAG_AUDIT_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`AuditConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("WCAG_AUDIT_BASE_URL") {
            cfg.default_base_url = Url::parse(v.trim()).map_err(|e| ConfigError::Invalid {
                key: "WCAG_AUDIT_BASE_URL".into(),
                value: v.clone(),
                reason: e.to_string(),
            })?;
        }
        if let Some(v) = get("WCAG_AUDIT_FETCH_TIMEOUT_MS") {
            cfg.fetch_timeout = millis("WCAG_AUDIT_FETCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_MAX_DOCUMENT_BYTES") {
            cfg.max_document_bytes = number("WCAG_AUDIT_MAX_DOCUMENT_BYTES", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_LAUNCH_TIMEOUT_MS") {
            cfg.launch_timeout = millis("WCAG_AUDIT_LAUNCH_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_PAGE_TIMEOUT_MS") {
            cfg.page_timeout = millis("WCAG_AUDIT_PAGE_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_NAVIGATION_TIMEOUT_MS") {
            cfg.navigation_timeout = millis("WCAG_AUDIT_NAVIGATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_NETWORK_IDLE_MS") {
            cfg.network_idle = millis("WCAG_AUDIT_NETWORK_IDLE_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_IDLE_CONNECTIONS") {
            cfg.idle_connections = number("WCAG_AUDIT_IDLE_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_EVALUATION_TIMEOUT_MS") {
            cfg.evaluation_timeout = millis("WCAG_AUDIT_EVALUATION_TIMEOUT_MS", &v)?;
        }
        if let Some(v) = get("WCAG_AUDIT_CHROMIUM_PATH") {
            cfg.chromium_path = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("WCAG_AUDIT_ENGINE_SCRIPT") {
            cfg.engine_script = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("WCAG_AUDIT_ENGINE_GLOBAL") {
            cfg.engine_global = v.trim().to_string();
        }

        Ok(cfg)
    }
}

fn number<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn millis(key: &str, value: &str) -> Result<Duration, ConfigError> {
    let ms: u64 = number(key, value)?;
    if ms == 0 {
        return Err(ConfigError::Invalid {
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AuditConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.navigation_timeout, Duration::from_secs(30));
        assert_eq!(cfg.idle_connections, 0);
        assert_eq!(cfg.default_base_url.as_str(), "https://example.com/");
        assert_eq!(cfg.engine_global, "axe");
        assert!(cfg.engine_script.is_none());
    }

    #[test]
    fn test_overrides() {
        let cfg = AuditConfig::from_lookup(lookup(&[
            ("WCAG_AUDIT_NAVIGATION_TIMEOUT_MS", "1500"),
            ("WCAG_AUDIT_IDLE_CONNECTIONS", "2"),
            ("WCAG_AUDIT_ENGINE_SCRIPT", "/opt/axe/axe.min.js"),
            ("WCAG_AUDIT_CHROMIUM_PATH", "  "),
        ]))
        .unwrap();
        assert_eq!(cfg.navigation_timeout, Duration::from_millis(1500));
        assert_eq!(cfg.idle_connections, 2);
        assert_eq!(
            cfg.engine_script.as_deref(),
            Some(std::path::Path::new("/opt/axe/axe.min.js"))
        );
        assert!(cfg.chromium_path.is_none());
    }

    #[test]
    fn test_invalid_values_are_reported() {
        let err = AuditConfig::from_lookup(lookup(&[("WCAG_AUDIT_FETCH_TIMEOUT_MS", "soon")]))
            .unwrap_err();
        assert!(err.to_string().contains("WCAG_AUDIT_FETCH_TIMEOUT_MS"));

        let err = AuditConfig::from_lookup(lookup(&[("WCAG_AUDIT_NETWORK_IDLE_MS", "0")]))
            .unwrap_err();
        assert!(err.to_string().contains("greater than zero"));
    }
}
