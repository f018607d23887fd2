//! Rule-evaluation engines and the evaluator that drives them.
//!
//! Two kinds of engine can be configured:
//!
//! - a [`ScriptEngine`]: a script payload (axe-core or compatible) injected
//!   into a live page and invoked through its global's `run(document, options)`
//! - a [`DocumentEngine`]: an in-process engine evaluated against a parsed
//!   [`StaticDocument`]
//!
//! Static documents need a document engine. Live documents prefer the script
//! engine and fall back to the document engine over a snapshot of the
//! rendered DOM.
//!
//! Document engines run on a blocking thread. When the caller stops waiting
//! (timeout or a dropped request) the engine's [`CancelFlag`] is raised and
//! the thread is freed at the engine's next check.

mod script;

pub use script::ScriptEngine;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::acquisition::{LiveDocument, StaticDocument};
use crate::error::EvaluationError;
use crate::types::{RawEvaluationPayload, RuleOptions};

/// An engine that evaluates rules against a parsed document.
///
/// Implementations return the engine's native payload: an object carrying
/// `violations`, `passes`, `incomplete` and `inapplicable` arrays.
///
/// Long-running engines should poll `cancel` and give up once it is raised;
/// nobody is waiting for the result any more.
pub trait DocumentEngine: Send + Sync {
    fn name(&self) -> &str;
    fn run(
        &self,
        document: &StaticDocument,
        options: &RuleOptions,
        cancel: &CancelFlag,
    ) -> anyhow::Result<Value>;
}

/// Set once the result of an evaluation is no longer wanted.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Raises the flag when the waiting future goes away.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// The configured engines.
#[derive(Clone, Default)]
pub struct RuleEngine {
    script: Option<ScriptEngine>,
    document: Option<Arc<dyn DocumentEngine>>,
}

impl RuleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(mut self, script: ScriptEngine) -> Self {
        self.script = Some(script);
        self
    }

    pub fn with_document_engine(mut self, engine: Arc<dyn DocumentEngine>) -> Self {
        self.document = Some(engine);
        self
    }

    pub fn script(&self) -> Option<&ScriptEngine> {
        self.script.as_ref()
    }

    pub fn document_engine(&self) -> Option<&dyn DocumentEngine> {
        self.document.as_deref()
    }

    /// Human-readable summary for logs and diagnostics.
    pub fn describe(&self) -> String {
        match (&self.script, &self.document) {
            (Some(s), Some(d)) => format!("script '{}' + {}", s.global(), d.name()),
            (Some(s), None) => format!("script '{}'", s.global()),
            (None, Some(d)) => d.name().to_string(),
            (None, None) => "none".to_string(),
        }
    }
}

/// Runs the configured engine against acquired documents.
pub struct Evaluator {
    engine: RuleEngine,
    timeout: Duration,
}

impl Evaluator {
    pub fn new(engine: RuleEngine, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub fn engine(&self) -> &RuleEngine {
        &self.engine
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluate a parsed document on the calling thread, without a budget.
    pub fn evaluate_static(
        &self,
        document: &StaticDocument,
        options: &RuleOptions,
    ) -> Result<RawEvaluationPayload, EvaluationError> {
        let engine = self
            .engine
            .document_engine()
            .ok_or(EvaluationError::MissingEngine("static"))?;
        run_document_engine(engine, document, options, &CancelFlag::new())
    }

    /// Parse `markup` and evaluate it with the document engine, bounded by
    /// the evaluation timeout.
    pub async fn evaluate_markup(
        &self,
        markup: String,
        base_url: Url,
        options: &RuleOptions,
    ) -> Result<RawEvaluationPayload, EvaluationError> {
        tokio::time::timeout(
            self.timeout,
            self.evaluate_blocking(markup, base_url, options, "static"),
        )
        .await
        .map_err(|_| EvaluationError::Timeout(self.timeout))?
    }

    /// Evaluate a rendered page, bounded by the evaluation timeout.
    pub async fn evaluate_live(
        &self,
        document: &LiveDocument,
        options: &RuleOptions,
    ) -> Result<RawEvaluationPayload, EvaluationError> {
        let run = async {
            match (self.engine.script(), self.engine.document_engine()) {
                (Some(script), _) => script.evaluate(document.page(), options).await,
                (None, Some(_)) => {
                    let markup = document.page().content().await.map_err(|e| {
                        EvaluationError::Invocation(format!(
                            "failed to snapshot rendered DOM: {e:#}"
                        ))
                    })?;
                    let base = Url::parse(document.url())
                        .unwrap_or_else(|_| document.requested_url().clone());
                    debug!(bytes = markup.len(), "evaluating rendered DOM snapshot");
                    self.evaluate_blocking(markup, base, options, "live").await
                }
                (None, None) => Err(EvaluationError::MissingEngine("live")),
            }
        };

        tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| EvaluationError::Timeout(self.timeout))?
    }

    /// Parse and evaluate on a blocking thread so the tree never lives
    /// across an await point. Dropping the returned future cancels the run.
    async fn evaluate_blocking(
        &self,
        markup: String,
        base_url: Url,
        options: &RuleOptions,
        stage: &'static str,
    ) -> Result<RawEvaluationPayload, EvaluationError> {
        let engine = self
            .engine
            .document
            .clone()
            .ok_or(EvaluationError::MissingEngine(stage))?;
        let cancel = CancelFlag::new();
        let _guard = CancelOnDrop(cancel.clone());
        let options = options.clone();

        tokio::task::spawn_blocking(move || {
            let document = StaticDocument::parse(&markup, base_url);
            run_document_engine(engine.as_ref(), &document, &options, &cancel)
        })
        .await
        .map_err(|join| EvaluationError::Invocation(format!("rule engine task failed: {join}")))?
    }
}

fn run_document_engine(
    engine: &dyn DocumentEngine,
    document: &StaticDocument,
    options: &RuleOptions,
    cancel: &CancelFlag,
) -> Result<RawEvaluationPayload, EvaluationError> {
    let raw = engine
        .run(document, options, cancel)
        .map_err(|e| EvaluationError::Invocation(format!("{}: {e:#}", engine.name())))?;
    RawEvaluationPayload::from_value(raw)
}
