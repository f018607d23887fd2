//! Audit dispatch: validate, pick a backend, acquire, evaluate, normalize.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, info_span, warn, Instrument};
use url::Url;
use uuid::Uuid;

use crate::acquisition::{DynamicAcquisition, Fetcher};
use crate::browser::{BrowserLauncher, BrowserSession, ChromiumLauncher};
use crate::config::AuditConfig;
use crate::engine::{Evaluator, RuleEngine};
use crate::error::{AuditResult, ConfigError};
use crate::normalize::normalize;
use crate::types::{
    AuditReport, AuditRequest, AuditRequestBody, AuditSource, RawEvaluationPayload, RenderMode,
    RuleOptions,
};

/// The acquisition backend serving a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Parse caller-supplied markup.
    StaticMarkup,
    /// Fetch the URL and parse the response body.
    StaticFetch,
    /// Render the URL in a headless browser.
    Dynamic,
}

impl Backend {
    /// Markup is always static; URLs follow the render mode.
    pub fn select(request: &AuditRequest) -> Self {
        match (request.source(), request.render_mode()) {
            (AuditSource::Html(_), _) => Backend::StaticMarkup,
            (AuditSource::Url(_), RenderMode::Static) => Backend::StaticFetch,
            (AuditSource::Url(_), RenderMode::Dynamic) => Backend::Dynamic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Backend::StaticMarkup => "static-markup",
            Backend::StaticFetch => "static-fetch",
            Backend::Dynamic => "dynamic",
        }
    }
}

/// Executes audit requests. Cheap to clone; clones share configuration,
/// the HTTP client, the launcher and the rule engine.
///
/// Audits are independent: each dynamic audit launches its own browser and
/// nothing is cached between requests.
#[derive(Clone)]
pub struct Auditor {
    config: Arc<AuditConfig>,
    fetcher: Fetcher,
    dynamic: DynamicAcquisition,
    launcher: Arc<dyn BrowserLauncher>,
    evaluator: Arc<Evaluator>,
}

impl Auditor {
    /// Fails only if the HTTP client for static fetches cannot be built.
    pub fn new(config: AuditConfig, engine: RuleEngine) -> Result<Self, ConfigError> {
        let launcher: Arc<dyn BrowserLauncher> = Arc::new(ChromiumLauncher::new(&config));
        Ok(Self {
            fetcher: Fetcher::new(&config)?,
            dynamic: DynamicAcquisition::new(&config),
            evaluator: Arc::new(Evaluator::new(engine, config.evaluation_timeout)),
            launcher,
            config: Arc::new(config),
        })
    }

    /// Replace the browser launcher.
    pub fn with_launcher(mut self, launcher: Arc<dyn BrowserLauncher>) -> Self {
        self.launcher = launcher;
        self
    }

    pub fn config(&self) -> &AuditConfig {
        &self.config
    }

    pub fn evaluator(&self) -> &Evaluator {
        &self.evaluator
    }

    /// Validate a wire body, then execute it.
    ///
    /// Validation failures return before any fetch or browser launch.
    pub async fn execute_body(&self, body: AuditRequestBody) -> AuditResult<AuditReport> {
        let request = body.validate()?;
        self.execute(request).await
    }

    /// Execute a validated request.
    pub async fn execute(&self, request: AuditRequest) -> AuditResult<AuditReport> {
        let backend = Backend::select(&request);
        let span = info_span!("audit", id = %Uuid::new_v4(), backend = backend.as_str());
        self.run(request, backend).instrument(span).await
    }

    async fn run(&self, request: AuditRequest, backend: Backend) -> AuditResult<AuditReport> {
        let started = Instant::now();
        let (source, target, base_url, options) = request.into_parts();
        info!(
            source = target.as_deref().unwrap_or("<markup>"),
            run_only = ?options.run_only,
            "audit started"
        );

        let outcome = match source {
            AuditSource::Html(markup) => {
                let base = base_url.unwrap_or_else(|| self.config.default_base_url.clone());
                self.audit_markup(markup, base, options).await
            }
            AuditSource::Url(url) => match backend {
                Backend::Dynamic => self.audit_live(&url, &options).await,
                _ => self.audit_fetched(&url, options).await,
            },
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        let payload = match outcome {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    kind = e.kind().as_str(),
                    transient = e.is_transient(),
                    elapsed_ms,
                    "audit failed: {e}"
                );
                return Err(e);
            }
        };

        let report = normalize(payload, target);
        let counts = report.counts();
        info!(
            violations = counts.violations,
            violation_nodes = counts.violation_nodes,
            passes = counts.passes,
            incomplete = counts.incomplete,
            inapplicable = counts.inapplicable,
            elapsed_ms,
            "audit completed"
        );
        Ok(report)
    }

    async fn audit_markup(
        &self,
        markup: String,
        base_url: Url,
        options: RuleOptions,
    ) -> AuditResult<RawEvaluationPayload> {
        let payload = self
            .evaluator
            .evaluate_markup(markup, base_url, &options)
            .await?;
        Ok(payload)
    }

    async fn audit_fetched(
        &self,
        url: &Url,
        options: RuleOptions,
    ) -> AuditResult<RawEvaluationPayload> {
        let page = self.fetcher.fetch(url).await?;
        self.audit_markup(page.body, page.final_url, options).await
    }

    /// Launch a browser for this audit alone and release it whatever the
    /// outcome.
    async fn audit_live(
        &self,
        url: &Url,
        options: &RuleOptions,
    ) -> AuditResult<RawEvaluationPayload> {
        let session =
            BrowserSession::launch(self.launcher.as_ref(), self.config.launch_timeout).await?;
        let outcome = self.evaluate_in_session(&session, url, options).await;
        session.release().await;
        outcome
    }

    async fn evaluate_in_session(
        &self,
        session: &BrowserSession,
        url: &Url,
        options: &RuleOptions,
    ) -> AuditResult<RawEvaluationPayload> {
        let document = self.dynamic.acquire(session, url).await?;
        let payload = self.evaluator.evaluate_live(&document, options).await?;
        Ok(payload)
    }
}
