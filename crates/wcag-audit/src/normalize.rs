//! Normalization of engine payloads into reports.

use std::collections::HashSet;

use tracing::warn;

use crate::types::{AuditReport, AuditResults, RawEvaluationPayload, RuleResult};

/// Turn a validated engine payload into an [`AuditReport`].
///
/// Categories the engine did not emit become empty. Rule order within each
/// category is preserved, so the same payload always yields the same report.
pub fn normalize(payload: RawEvaluationPayload, target: Option<String>) -> AuditReport {
    let results = AuditResults {
        violations: payload.violations.unwrap_or_default(),
        passes: payload.passes.unwrap_or_default(),
        incomplete: payload.incomplete.unwrap_or_default(),
        inapplicable: payload.inapplicable.unwrap_or_default(),
    };

    check_integrity(&results);

    AuditReport { target, results }
}

/// Log payload anomalies. They are reported as-is, never repaired.
fn check_integrity(results: &AuditResults) {
    for v in &results.violations {
        if v.nodes.is_empty() {
            warn!(rule = %v.id, "violation reported without affected nodes");
        }
    }

    for (name, rules) in [
        ("violations", &results.violations),
        ("passes", &results.passes),
        ("incomplete", &results.incomplete),
        ("inapplicable", &results.inapplicable),
    ] {
        if let Some(dup) = first_duplicate(rules) {
            warn!(category = name, rule = %dup, "rule reported more than once");
        }
    }
}

fn first_duplicate(rules: &[RuleResult]) -> Option<&str> {
    let mut seen = HashSet::new();
    rules
        .iter()
        .map(|r| r.id.as_str())
        .find(|id| !seen.insert(*id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> RawEvaluationPayload {
        RawEvaluationPayload::from_value(value).unwrap()
    }

    #[test]
    fn test_absent_categories_become_empty() {
        let report = normalize(
            payload(json!({ "violations": [{ "id": "image-alt", "nodes": [] }] })),
            Some("https://example.com/".into()),
        );
        assert_eq!(report.target.as_deref(), Some("https://example.com/"));
        assert_eq!(report.results.violations.len(), 1);
        assert!(report.results.passes.is_empty());
        assert!(report.results.incomplete.is_empty());
        assert!(report.results.inapplicable.is_empty());
    }

    #[test]
    fn test_order_is_preserved() {
        let report = normalize(
            payload(json!({ "passes": [{ "id": "b" }, { "id": "a" }, { "id": "c" }] })),
            None,
        );
        let ids: Vec<_> = report.results.passes.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn test_markup_report_omits_url() {
        let report = normalize(payload(json!({ "violations": [] })), None);
        let value = serde_json::to_value(&report).unwrap();
        assert!(value.get("url").is_none());
        assert_eq!(
            value["results"],
            json!({ "violations": [], "passes": [], "incomplete": [], "inapplicable": [] })
        );
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let raw = json!({
            "violations": [{
                "id": "image-alt",
                "impact": "critical",
                "nodes": [{ "html": "<img>", "target": ["img"] }]
            }],
            "passes": [{ "id": "document-title" }]
        });
        let a = normalize(payload(raw.clone()), None);
        let b = normalize(payload(raw), None);
        assert_eq!(a, b);
    }

    #[test]
    fn test_first_duplicate() {
        let rules = payload(json!({ "passes": [{ "id": "a" }, { "id": "b" }, { "id": "a" }] }))
            .passes
            .unwrap();
        assert_eq!(first_duplicate(&rules), Some("a"));
        assert_eq!(first_duplicate(&rules[..2]), None);
    }
}
