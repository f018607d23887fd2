//! WCAG Rules: an in-process accessibility rule engine.
//!
//! Evaluates a set of axe-compatible rules against a parsed
//! [`wcag_audit::StaticDocument`] and produces a payload with the same
//! `violations`/`passes`/`incomplete`/`inapplicable` shape a script engine
//! would return. Plug it into an auditor with
//! [`wcag_audit::RuleEngine::with_document_engine`].

pub mod dom;
pub mod engine;
pub mod page;
pub mod rules;

pub use engine::NativeEngine;
pub use page::Page;
pub use rules::{Findings, Rule, RuleMeta};
