//! The in-process rule engine.

use serde_json::{json, Value};
use tracing::debug;
use wcag_audit::{
    AffectedNode, CancelFlag, DocumentEngine, Impact, RuleOptions, RuleResult, StaticDocument,
};

use crate::dom::snippet;
use crate::page::Page;
use crate::rules::{self, Findings, Rule, RuleMeta};

/// Evaluates the built-in rules against a parsed document and emits the
/// same payload shape as axe-core.
pub struct NativeEngine {
    rules: Vec<Box<dyn Rule>>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeEngine {
    pub fn new() -> Self {
        Self::with_rules(rules::all())
    }

    pub fn with_rules(rules: Vec<Box<dyn Rule>>) -> Self {
        Self { rules }
    }

    /// Ids of the rules this engine knows, in evaluation order.
    pub fn rule_ids(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.meta().id).collect()
    }
}

fn rule_result<'a>(
    meta: &RuleMeta,
    impact: Option<Impact>,
    page: &Page<'a>,
    nodes: &[scraper::ElementRef<'a>],
) -> RuleResult {
    RuleResult {
        id: meta.id.to_string(),
        impact,
        help: meta.help.to_string(),
        help_url: meta.help_url(),
        description: meta.description.to_string(),
        tags: meta.tags.iter().map(|t| t.to_string()).collect(),
        nodes: nodes
            .iter()
            .map(|el| AffectedNode {
                html: snippet(*el),
                target: vec![page.selector(*el)],
            })
            .collect(),
    }
}

#[derive(Default)]
struct Categories {
    violations: Vec<RuleResult>,
    passes: Vec<RuleResult>,
    incomplete: Vec<RuleResult>,
    inapplicable: Vec<RuleResult>,
}

impl Categories {
    fn record<'a>(&mut self, meta: &RuleMeta, page: &Page<'a>, findings: &Findings<'a>) {
        if findings.is_empty() {
            self.inapplicable.push(rule_result(meta, None, page, &[]));
            return;
        }
        if !findings.failed.is_empty() {
            self.violations
                .push(rule_result(meta, Some(meta.impact), page, &findings.failed));
        }
        if !findings.passed.is_empty() {
            self.passes
                .push(rule_result(meta, None, page, &findings.passed));
        }
        if !findings.review.is_empty() {
            self.incomplete
                .push(rule_result(meta, Some(meta.impact), page, &findings.review));
        }
    }
}

impl DocumentEngine for NativeEngine {
    fn name(&self) -> &str {
        "wcag-rules"
    }

    fn run(
        &self,
        document: &StaticDocument,
        options: &RuleOptions,
        cancel: &CancelFlag,
    ) -> anyhow::Result<Value> {
        let page = Page::new(document);
        let mut categories = Categories::default();
        let mut evaluated = 0usize;

        for rule in &self.rules {
            let meta = rule.meta();
            if !options.selects(meta.id, meta.tags) {
                continue;
            }
            if cancel.is_cancelled() {
                anyhow::bail!("evaluation cancelled before rule {}", meta.id);
            }
            evaluated += 1;
            let findings = rule.evaluate(&page);
            categories.record(meta, &page, &findings);
        }

        debug!(
            rules = evaluated,
            violations = categories.violations.len(),
            "native rules evaluated"
        );

        Ok(json!({
            "testEngine": { "name": self.name(), "version": env!("CARGO_PKG_VERSION") },
            "url": document.base_url().as_str(),
            "toolOptions": options,
            "violations": categories.violations,
            "passes": categories.passes,
            "incomplete": categories.incomplete,
            "inapplicable": categories.inapplicable,
        }))
    }
}
