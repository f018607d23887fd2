//! Discernible names for interactive elements (WCAG 2.4.4, 4.1.2).

use super::{Findings, Rule, RuleMeta};
use crate::dom::{self, attr, content_name, is_hidden, is_presentational, selector, squash};
use crate::page::Page;
use wcag_audit::Impact;

/// Links need discernible text.
pub struct LinkName;

static LINK_NAME: RuleMeta = RuleMeta {
    id: "link-name",
    impact: Impact::Serious,
    help: "Links must have discernible text",
    description: "Ensure links have discernible text",
    tags: &[
        "cat.name-role-value",
        "wcag2a",
        "wcag244",
        "wcag412",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.2.4.4",
        "EN-9.4.1.2",
        "ACT",
    ],
};

impl Rule for LinkName {
    fn meta(&self) -> &RuleMeta {
        &LINK_NAME
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for link in tree.select(&selector("a[href]")) {
            if is_hidden(link) || is_presentational(link) {
                continue;
            }
            findings.check(link, !content_name(page, link).is_empty());
        }
        findings
    }
}

/// Buttons need discernible text.
pub struct ButtonName;

static BUTTON_NAME: RuleMeta = RuleMeta {
    id: "button-name",
    impact: Impact::Critical,
    help: "Buttons must have discernible text",
    description: "Ensure buttons have discernible text",
    tags: &[
        "cat.name-role-value",
        "wcag2a",
        "wcag412",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.4.1.2",
        "ACT",
    ],
};

impl Rule for ButtonName {
    fn meta(&self) -> &RuleMeta {
        &BUTTON_NAME
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for button in tree.select(&selector("button")) {
            if is_hidden(button) {
                continue;
            }
            findings.check(button, !content_name(page, button).is_empty());
        }
        findings
    }
}

/// `<input>` buttons need a value or label.
pub struct InputButtonName;

static INPUT_BUTTON_NAME: RuleMeta = RuleMeta {
    id: "input-button-name",
    impact: Impact::Critical,
    help: "Input buttons must have discernible text",
    description: "Ensure input buttons have discernible text",
    tags: &[
        "cat.name-role-value",
        "wcag2a",
        "wcag412",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.4.1.2",
        "ACT",
    ],
};

impl Rule for InputButtonName {
    fn meta(&self) -> &RuleMeta {
        &INPUT_BUTTON_NAME
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for input in tree.select(&selector("input[type]")) {
            let kind = input
                .value()
                .attr("type")
                .map(|t| t.trim().to_ascii_lowercase())
                .unwrap_or_default();
            if !matches!(kind.as_str(), "button" | "submit" | "reset") || is_hidden(input) {
                continue;
            }
            let named = match input.value().attr("value") {
                Some(value) => !squash(value).is_empty(),
                // Submit and reset carry a default label.
                None => kind != "button",
            };
            let ok = named
                || dom::aria_name(page, input).is_some()
                || attr(input, "title").is_some();
            findings.check(input, ok);
        }
        findings
    }
}

/// Frames need an accessible name.
pub struct FrameTitle;

static FRAME_TITLE: RuleMeta = RuleMeta {
    id: "frame-title",
    impact: Impact::Serious,
    help: "Frames must have an accessible name",
    description: "Ensure <iframe> and <frame> elements have an accessible name",
    tags: &[
        "cat.text-alternatives",
        "wcag2a",
        "wcag412",
        "section508",
        "section508.22.i",
        "EN-301-549",
        "EN-9.4.1.2",
    ],
};

impl Rule for FrameTitle {
    fn meta(&self) -> &RuleMeta {
        &FRAME_TITLE
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for frame in tree.select(&selector("iframe, frame")) {
            if is_hidden(frame) || is_presentational(frame) {
                continue;
            }
            let ok = attr(frame, "title").is_some() || dom::aria_name(page, frame).is_some();
            findings.check(frame, ok);
        }
        findings
    }
}
