//! Form field labels (WCAG 4.1.2, 3.3.2).

use super::{Findings, Rule, RuleMeta};
use crate::dom::{self, attr, is_hidden, selector, visible_text};
use crate::page::Page;
use scraper::ElementRef;
use wcag_audit::Impact;

/// Input types that are labelled by other means or not at all.
const EXEMPT_INPUT_TYPES: &[&str] = &["hidden", "submit", "reset", "button", "image"];

/// Form fields need a label.
pub struct Label;

static LABEL: RuleMeta = RuleMeta {
    id: "label",
    impact: Impact::Critical,
    help: "Form elements must have labels",
    description: "Ensure every form element has a label",
    tags: &[
        "cat.forms",
        "wcag2a",
        "wcag412",
        "section508",
        "section508.22.n",
        "EN-301-549",
        "EN-9.4.1.2",
        "ACT",
    ],
};

fn has_label(page: &Page<'_>, field: ElementRef<'_>) -> bool {
    if dom::aria_name(page, field).is_some() {
        return true;
    }
    if let Some(id) = field.value().id() {
        let explicit = page
            .labels_for(id)
            .iter()
            .any(|label| !visible_text(*label).is_empty());
        if explicit {
            return true;
        }
    }
    let wrapped = field
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| a.value().name() == "label" && !visible_text(a).is_empty());
    wrapped || attr(field, "title").is_some() || attr(field, "placeholder").is_some()
}

impl Rule for Label {
    fn meta(&self) -> &RuleMeta {
        &LABEL
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for field in tree.select(&selector("input, select, textarea")) {
            if field.value().name() == "input" {
                let kind = field
                    .value()
                    .attr("type")
                    .map(|t| t.trim().to_ascii_lowercase())
                    .unwrap_or_default();
                if EXEMPT_INPUT_TYPES.contains(&kind.as_str()) {
                    continue;
                }
            }
            if is_hidden(field) {
                continue;
            }
            findings.check(field, has_label(page, field));
        }
        findings
    }
}
