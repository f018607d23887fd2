//! Script payloads injected into live pages.

use std::path::Path;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::browser::PageContext;
use crate::error::{ConfigError, EvaluationError};
use crate::types::{RawEvaluationPayload, RuleOptions};

/// A rule engine shipped as JavaScript, e.g. `axe.min.js`.
///
/// The payload must install a global exposing `run(document, options)` that
/// returns (a promise of) the native result object.
#[derive(Clone)]
pub struct ScriptEngine {
    source: Arc<str>,
    global: String,
}

impl ScriptEngine {
    pub fn new(source: impl Into<Arc<str>>, global: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            global: global.into(),
        }
    }

    pub fn from_file(path: &Path, global: impl Into<String>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Script {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self::new(source, global))
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn global(&self) -> &str {
        &self.global
    }

    fn global_literal(&self) -> String {
        Value::String(self.global.clone()).to_string()
    }

    fn readiness_probe(&self) -> String {
        let g = self.global_literal();
        format!("(typeof window[{g}] === 'object' || typeof window[{g}] === 'function') && typeof window[{g}].run === 'function'")
    }

    fn invocation(&self, options: &RuleOptions) -> Result<String, EvaluationError> {
        let options = serde_json::to_string(options)
            .map_err(|e| EvaluationError::Invocation(format!("unserializable options: {e}")))?;
        Ok(format!(
            "window[{}].run(document, {options})",
            self.global_literal()
        ))
    }

    async fn is_ready(&self, page: &dyn PageContext) -> Result<bool, EvaluationError> {
        page.evaluate(&self.readiness_probe())
            .await
            .map(|v| v == Value::Bool(true))
            .map_err(|e| EvaluationError::Injection(format!("{e:#}")))
    }

    /// Inject the payload into `page` and run it.
    pub(crate) async fn evaluate(
        &self,
        page: &dyn PageContext,
        options: &RuleOptions,
    ) -> Result<RawEvaluationPayload, EvaluationError> {
        page.add_script(&self.source)
            .await
            .map_err(|e| EvaluationError::Injection(format!("{e:#}")))?;

        if !self.is_ready(page).await? {
            // Inline scripts can be blocked by a content security policy.
            debug!(global = %self.global, "script tag did not install engine; evaluating directly");
            page.evaluate(&self.source)
                .await
                .map_err(|e| EvaluationError::Injection(format!("{e:#}")))?;
            if !self.is_ready(page).await? {
                return Err(EvaluationError::Injection(format!(
                    "global '{}' missing after injection",
                    self.global
                )));
            }
        }

        let raw = page
            .evaluate(&self.invocation(options)?)
            .await
            .map_err(|e| EvaluationError::Invocation(format!("{e:#}")))?;
        RawEvaluationPayload::from_value(raw)
    }
}
