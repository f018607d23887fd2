//! Error taxonomy for audit execution.
//!
//! Every failure belongs to exactly one of three kinds: the request was
//! invalid, the document could not be acquired, or the rule engine could not
//! evaluate it. All of them are terminal for the request.

use std::time::Duration;

/// Broad classification of an [`AuditError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Acquisition,
    Evaluation,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Acquisition => "acquisition",
            ErrorKind::Evaluation => "evaluation",
        }
    }
}

/// The request was rejected before any acquisition attempt.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Neither url nor html was supplied.
    #[error("Missing url or html")]
    MissingSource,

    /// An endpoint pinned to one source kind did not receive it.
    #[error("Missing {0}")]
    MissingField(&'static str),

    #[error("Provide either url or html, not both")]
    ConflictingSources,

    #[error("Invalid {field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("Unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Invalid options: runOnly must list at least one rule tag")]
    EmptyRunOnly,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

/// The document could not be fetched, rendered, or parsed.
#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("fetching {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("document at {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: usize },

    #[error("rendering browser unavailable: {0}")]
    BrowserUnavailable(String),

    #[error("failed to launch rendering browser: {0}")]
    Launch(String),

    #[error("{stage} timed out after {}ms", .after.as_millis())]
    Timeout { stage: &'static str, after: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(String),
}

/// The rule engine could not be injected, invoked, or returned garbage.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("no rule engine available for {0} documents")]
    MissingEngine(&'static str),

    #[error("rule engine injection failed: {0}")]
    Injection(String),

    #[error("rule engine invocation failed: {0}")]
    Invocation(String),

    #[error("rule engine timed out after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("malformed evaluation payload: {0}")]
    Malformed(String),
}

/// Errors raised while loading configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid value '{value}' for {key}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("failed to read engine script {path}: {source}")]
    Script {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Top-level error returned by the dispatcher.
#[derive(thiserror::Error, Debug)]
pub enum AuditError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Acquisition(#[from] AcquisitionError),

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),
}

impl AuditError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuditError::Validation(_) => ErrorKind::Validation,
            AuditError::Acquisition(_) => ErrorKind::Acquisition,
            AuditError::Evaluation(_) => ErrorKind::Evaluation,
        }
    }

    /// HTTP status the routing layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::Validation => 400,
            ErrorKind::Acquisition | ErrorKind::Evaluation => 500,
        }
    }

    /// Whether a caller could reasonably retry the same request later.
    ///
    /// Timeouts, connection failures and upstream 5xx/429 responses are
    /// transient. Bad requests, missing browsers, and engine failures are not.
    pub fn is_transient(&self) -> bool {
        match self {
            AuditError::Validation(_) => false,
            AuditError::Acquisition(e) => match e {
                AcquisitionError::Fetch { source, .. } => {
                    source.is_timeout() || source.is_connect() || source.is_request()
                }
                AcquisitionError::Status { status, .. } => *status >= 500 || *status == 429,
                AcquisitionError::Timeout { .. } | AcquisitionError::Navigation { .. } => true,
                AcquisitionError::TooLarge { .. }
                | AcquisitionError::BrowserUnavailable(_)
                | AcquisitionError::Launch(_)
                | AcquisitionError::Browser(_) => false,
            },
            AuditError::Evaluation(e) => matches!(e, EvaluationError::Timeout(_)),
        }
    }
}

/// Convenience result type.
pub type AuditResult<T> = Result<T, AuditError>;
