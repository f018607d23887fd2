//! Request and report types for accessibility audits.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{EvaluationError, ValidationError};

/// Resolution base used for markup audits when the caller supplies none.
pub const DEFAULT_BASE_URL: &str = "https://example.com";

/// Rule tags selected when a request carries no options.
pub const DEFAULT_RUN_ONLY: &[&str] = &["wcag2a", "wcag2aa"];

/// What the caller handed us to audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Url,
    Html,
}

/// How a URL source is turned into a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    /// Fetch the markup and parse it without running page scripts.
    #[default]
    Static,
    /// Render the page in a headless browser and audit the live DOM.
    Dynamic,
}

/// Rule-selection configuration passed to the rule engine.
///
/// Unknown keys are rejected rather than forwarded to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleOptions {
    #[serde(rename = "runOnly", default = "default_run_only")]
    pub run_only: Vec<String>,
}

fn default_run_only() -> Vec<String> {
    DEFAULT_RUN_ONLY.iter().map(|t| t.to_string()).collect()
}

impl Default for RuleOptions {
    fn default() -> Self {
        Self {
            run_only: default_run_only(),
        }
    }
}

impl RuleOptions {
    /// Build options from explicit tags.
    pub fn with_tags<I, S>(tags: I) -> Result<Self, ValidationError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let options = Self {
            run_only: tags.into_iter().map(Into::into).collect(),
        };
        options.validate()?;
        Ok(options)
    }

    /// Parse the loosely-typed `options` member of a request body.
    ///
    /// `None` and `null` select the defaults.
    pub fn from_value(value: Option<Value>) -> Result<Self, ValidationError> {
        let options = match value {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(v) => serde_json::from_value::<RuleOptions>(v)
                .map_err(|e| ValidationError::InvalidOptions(e.to_string()))?,
        };
        options.validate()?;
        Ok(options)
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.run_only.is_empty() {
            return Err(ValidationError::EmptyRunOnly);
        }
        if self.run_only.iter().any(|t| t.trim().is_empty()) {
            return Err(ValidationError::InvalidOptions(
                "runOnly entries must be non-empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a rule with the given id and tags is selected.
    pub fn selects(&self, rule_id: &str, tags: &[&str]) -> bool {
        self.run_only
            .iter()
            .any(|sel| sel == rule_id || tags.iter().any(|t| t == sel))
    }
}

/// The document source of a validated request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditSource {
    Url(Url),
    Html(String),
}

/// A validated audit request. Only constructible through validation.
#[derive(Debug, Clone)]
pub struct AuditRequest {
    source: AuditSource,
    target: Option<String>,
    base_url: Option<Url>,
    render_mode: RenderMode,
    options: RuleOptions,
}

impl AuditRequest {
    /// Audit a URL with the given render mode.
    pub fn for_url(
        url: &str,
        render_mode: RenderMode,
        options: RuleOptions,
    ) -> Result<Self, ValidationError> {
        let raw = url.trim();
        if raw.is_empty() {
            return Err(ValidationError::MissingField("url"));
        }
        options.validate()?;
        let parsed = parse_http_url("url", raw)?;
        Ok(Self {
            source: AuditSource::Url(parsed),
            base_url: None,
            target: Some(raw.to_string()),
            render_mode,
            options,
        })
    }

    /// Audit supplied markup, resolving relative references against `base_url`.
    pub fn for_html(
        markup: impl Into<String>,
        base_url: Option<&str>,
        options: RuleOptions,
    ) -> Result<Self, ValidationError> {
        let markup = markup.into();
        if markup.trim().is_empty() {
            return Err(ValidationError::MissingField("html"));
        }
        options.validate()?;
        let base_url = match base_url.map(str::trim).filter(|b| !b.is_empty()) {
            Some(b) => Some(parse_http_url("baseUrl", b)?),
            None => None,
        };
        Ok(Self {
            source: AuditSource::Html(markup),
            target: None,
            base_url,
            render_mode: RenderMode::Static,
            options,
        })
    }

    pub fn source(&self) -> &AuditSource {
        &self.source
    }

    pub fn source_kind(&self) -> SourceKind {
        match self.source {
            AuditSource::Url(_) => SourceKind::Url,
            AuditSource::Html(_) => SourceKind::Html,
        }
    }

    /// The original URL as supplied, `None` for markup.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// The caller-supplied resolution base for markup.
    ///
    /// `None` means the configured default applies (markup) or the final
    /// fetched URL does (URL sources).
    pub fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    pub fn options(&self) -> &RuleOptions {
        &self.options
    }

    pub(crate) fn into_parts(self) -> (AuditSource, Option<String>, Option<Url>, RuleOptions) {
        (self.source, self.target, self.base_url, self.options)
    }
}

fn parse_http_url(field: &'static str, raw: &str) -> Result<Url, ValidationError> {
    let url = Url::parse(raw).map_err(|e| ValidationError::InvalidUrl {
        field,
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(ValidationError::UnsupportedScheme(other.to_string())),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The wire form of an audit request, before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub render_mode: Option<RenderMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Value>,
}

impl AuditRequestBody {
    /// Validate a generic body: exactly one of url/html must be present.
    pub fn validate(self) -> Result<AuditRequest, ValidationError> {
        let url = non_blank(self.url);
        let html = non_blank(self.html);
        match (url, html) {
            (Some(_), Some(_)) => Err(ValidationError::ConflictingSources),
            (None, None) => Err(ValidationError::MissingSource),
            (Some(url), None) => {
                let options = RuleOptions::from_value(self.options)?;
                AuditRequest::for_url(&url, self.render_mode.unwrap_or_default(), options)
            }
            (None, Some(html)) => {
                let options = RuleOptions::from_value(self.options)?;
                AuditRequest::for_html(html, self.base_url.as_deref(), options)
            }
        }
    }

    /// Validate a body for an endpoint pinned to one source kind.
    ///
    /// The other source field is ignored.
    pub fn validate_as(
        self,
        kind: SourceKind,
        render_mode: RenderMode,
    ) -> Result<AuditRequest, ValidationError> {
        match kind {
            SourceKind::Url => {
                let url = non_blank(self.url).ok_or(ValidationError::MissingField("url"))?;
                let options = RuleOptions::from_value(self.options)?;
                AuditRequest::for_url(&url, render_mode, options)
            }
            SourceKind::Html => {
                let html = non_blank(self.html).ok_or(ValidationError::MissingField("html"))?;
                let options = RuleOptions::from_value(self.options)?;
                AuditRequest::for_html(html, self.base_url.as_deref(), options)
            }
        }
    }
}

/// Severity of a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Minor,
    Moderate,
    Serious,
    Critical,
}

/// An element a rule result applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AffectedNode {
    #[serde(default)]
    pub html: String,
    #[serde(default, deserialize_with = "deserialize_targets")]
    pub target: Vec<String>,
}

/// Separator used when flattening frame or shadow-root selector paths.
pub const TARGET_PATH_SEPARATOR: &str = " >>> ";

#[derive(Deserialize)]
#[serde(untagged)]
enum TargetSegment {
    Selector(String),
    Path(Vec<String>),
}

fn deserialize_targets<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let segments: Vec<TargetSegment> = Vec::deserialize(deserializer)?;
    Ok(segments
        .into_iter()
        .map(|s| match s {
            TargetSegment::Selector(sel) => sel,
            TargetSegment::Path(path) => path.join(TARGET_PATH_SEPARATOR),
        })
        .collect())
}

/// The outcome of one rule in one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impact: Option<Impact>,
    #[serde(default)]
    pub help: String,
    #[serde(rename = "helpUrl", default)]
    pub help_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub nodes: Vec<AffectedNode>,
}

/// The engine's native output, after structural validation.
///
/// A category is `None` when the engine did not emit it at all.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvaluationPayload {
    pub violations: Option<Vec<RuleResult>>,
    pub passes: Option<Vec<RuleResult>>,
    pub incomplete: Option<Vec<RuleResult>>,
    pub inapplicable: Option<Vec<RuleResult>>,
}

/// Names of the four result categories, in report order.
pub const CATEGORIES: [&str; 4] = ["violations", "passes", "incomplete", "inapplicable"];

impl RawEvaluationPayload {
    /// Validate a raw engine result.
    ///
    /// Fails when the value is not an object, when a category is present but
    /// not an array of rule results, or when none of the categories appear.
    pub fn from_value(value: Value) -> Result<Self, EvaluationError> {
        let mut map = match value {
            Value::Object(map) => map,
            other => {
                return Err(EvaluationError::Malformed(format!(
                    "expected an object, got {}",
                    json_type(&other)
                )))
            }
        };

        let payload = Self {
            violations: take_category(&mut map, "violations")?,
            passes: take_category(&mut map, "passes")?,
            incomplete: take_category(&mut map, "incomplete")?,
            inapplicable: take_category(&mut map, "inapplicable")?,
        };

        if payload.violations.is_none()
            && payload.passes.is_none()
            && payload.incomplete.is_none()
            && payload.inapplicable.is_none()
        {
            return Err(EvaluationError::Malformed(format!(
                "payload contains none of {}",
                CATEGORIES.join(", ")
            )));
        }
        Ok(payload)
    }
}

fn take_category(
    map: &mut serde_json::Map<String, Value>,
    name: &str,
) -> Result<Option<Vec<RuleResult>>, EvaluationError> {
    match map.remove(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Array(_)) => serde_json::from_value(v)
            .map(Some)
            .map_err(|e| EvaluationError::Malformed(format!("{name}: {e}"))),
        Some(other) => Err(EvaluationError::Malformed(format!(
            "{name} is {}, expected an array",
            json_type(&other)
        ))),
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// The four result categories of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditResults {
    pub violations: Vec<RuleResult>,
    pub passes: Vec<RuleResult>,
    pub incomplete: Vec<RuleResult>,
    pub inapplicable: Vec<RuleResult>,
}

/// The normalized audit report returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditReport {
    /// The audited URL; absent for markup audits.
    #[serde(rename = "url", default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    pub results: AuditResults,
}

/// Per-category rule counts of a report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReportCounts {
    pub violations: usize,
    pub passes: usize,
    pub incomplete: usize,
    pub inapplicable: usize,
    /// Total affected nodes across all violations.
    pub violation_nodes: usize,
}

impl AuditReport {
    pub fn counts(&self) -> ReportCounts {
        let r = &self.results;
        ReportCounts {
            violations: r.violations.len(),
            passes: r.passes.len(),
            incomplete: r.incomplete.len(),
            inapplicable: r.inapplicable.len(),
            violation_nodes: r.violations.iter().map(|v| v.nodes.len()).sum(),
        }
    }
}
