//! WCAG Audit: execution engine for accessibility audits.
//!
//! Acquires a document (fetched markup, supplied markup, or a page rendered
//! in headless Chromium), runs a rule-evaluation engine against it, and
//! normalizes the engine output into a stable [`AuditReport`].

pub mod acquisition;
pub mod browser;
pub mod config;
pub mod dispatcher;
pub mod engine;
pub mod error;
pub mod normalize;
pub mod types;

pub use acquisition::{FetchedPage, Fetcher, LiveDocument, StaticDocument};
pub use browser::{BrowserLauncher, BrowserProcess, BrowserSession, DisabledLauncher, PageContext};
pub use config::AuditConfig;
pub use dispatcher::{Auditor, Backend};
pub use engine::{CancelFlag, DocumentEngine, Evaluator, RuleEngine, ScriptEngine};
pub use error::{
    AcquisitionError, AuditError, AuditResult, ConfigError, ErrorKind, EvaluationError,
    ValidationError,
};
pub use normalize::normalize;
pub use types::*;
