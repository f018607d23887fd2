//! WCAG Audit Server: HTTP routes and terminal presentation for the
//! audit engine.

pub mod error;
pub mod routes;
pub mod summary;

use std::path::PathBuf;
use std::sync::Arc;

use wcag_audit::browser::{find_chromium, DisabledLauncher};
use wcag_audit::{AuditConfig, Auditor, ConfigError, RuleEngine, ScriptEngine};
use wcag_rules::NativeEngine;

pub use error::ApiError;
pub use routes::{router, serve};

/// Shared state behind the HTTP routes.
#[derive(Clone)]
pub struct AppState {
    pub auditor: Auditor,
    /// Chromium executable found at startup, if any.
    pub chromium: Option<PathBuf>,
}

impl AppState {
    pub fn new(auditor: Auditor) -> Self {
        let chromium = find_chromium(auditor.config().chromium_path.as_deref());
        Self { auditor, chromium }
    }
}

/// The native rule engine, plus the configured script payload if any.
pub fn rule_engine(config: &AuditConfig) -> Result<RuleEngine, ConfigError> {
    let mut engine = RuleEngine::new().with_document_engine(Arc::new(NativeEngine::new()));
    if let Some(path) = &config.engine_script {
        engine = engine.with_script(ScriptEngine::from_file(path, config.engine_global.clone())?);
    }
    Ok(engine)
}

/// Build an auditor from configuration.
///
/// With `browser` off, dynamic audits fail fast instead of launching
/// Chromium.
pub fn build_auditor(config: AuditConfig, browser: bool) -> Result<Auditor, ConfigError> {
    let engine = rule_engine(&config)?;
    tracing::info!(engine = %engine.describe(), browser, "audit engine ready");
    let auditor = Auditor::new(config, engine)?;
    Ok(if browser {
        auditor
    } else {
        auditor.with_launcher(Arc::new(DisabledLauncher::new(
            "dynamic rendering is disabled on this server",
        )))
    })
}
