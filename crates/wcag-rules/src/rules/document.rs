//! Document-level rules: language, title, zoom, hidden body.

use std::sync::OnceLock;

use regex::Regex;

use super::{Findings, Rule, RuleMeta};
use crate::dom::{attr, selector, squash};
use crate::page::Page;
use wcag_audit::Impact;

/// The root element's `lang` (or `xml:lang`), if non-blank.
fn root_lang<'a>(page: &Page<'a>) -> Option<&'a str> {
    let root = page.tree().root_element();
    attr(root, "lang").or_else(|| attr(root, "xml:lang"))
}

/// `<html>` must declare a language.
pub struct HtmlHasLang;

static HTML_HAS_LANG: RuleMeta = RuleMeta {
    id: "html-has-lang",
    impact: Impact::Serious,
    help: "<html> element must have a lang attribute",
    description: "Ensure every HTML document has a lang attribute",
    tags: &["cat.language", "wcag2a", "wcag311", "EN-301-549", "EN-9.3.1.1", "ACT"],
};

impl Rule for HtmlHasLang {
    fn meta(&self) -> &RuleMeta {
        &HTML_HAS_LANG
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let mut findings = Findings::default();
        findings.check(page.tree().root_element(), root_lang(page).is_some());
        findings
    }
}

fn language_tag() -> &'static Regex {
    static TAG: OnceLock<Regex> = OnceLock::new();
    TAG.get_or_init(|| Regex::new(r"^[a-zA-Z]{2,3}(-[a-zA-Z0-9]{1,8})*$").expect("valid regex"))
}

/// A declared language must be a well-formed language tag.
pub struct HtmlLangValid;

static HTML_LANG_VALID: RuleMeta = RuleMeta {
    id: "html-lang-valid",
    impact: Impact::Serious,
    help: "<html> element must have a valid value for the lang attribute",
    description: "Ensure the lang attribute of the <html> element has a valid value",
    tags: &["cat.language", "wcag2a", "wcag311", "EN-301-549", "EN-9.3.1.1", "ACT"],
};

impl Rule for HtmlLangValid {
    fn meta(&self) -> &RuleMeta {
        &HTML_LANG_VALID
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let mut findings = Findings::default();
        if let Some(lang) = root_lang(page) {
            findings.check(
                page.tree().root_element(),
                language_tag().is_match(lang.trim()),
            );
        }
        findings
    }
}

/// The document needs a non-empty `<title>`.
pub struct DocumentTitle;

static DOCUMENT_TITLE: RuleMeta = RuleMeta {
    id: "document-title",
    impact: Impact::Serious,
    help: "Documents must have <title> element to aid in navigation",
    description: "Ensure each HTML document contains a non-empty <title> element",
    tags: &["cat.text-alternatives", "wcag2a", "wcag242", "EN-301-549", "EN-9.2.4.2", "ACT"],
};

impl Rule for DocumentTitle {
    fn meta(&self) -> &RuleMeta {
        &DOCUMENT_TITLE
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let titled = tree
            .select(&selector("head > title"))
            .next()
            .is_some_and(|t| !squash(&t.text().collect::<String>()).is_empty());
        let mut findings = Findings::default();
        findings.check(tree.root_element(), titled);
        findings
    }
}

/// Viewport settings must not block zooming.
pub struct MetaViewport;

static META_VIEWPORT: RuleMeta = RuleMeta {
    id: "meta-viewport",
    impact: Impact::Critical,
    help: "Zooming and scaling must not be disabled",
    description: "Ensure <meta name=\"viewport\"> does not disable text scaling and zooming",
    tags: &[
        "cat.sensory-and-visual-cues",
        "wcag2aa",
        "wcag144",
        "EN-301-549",
        "EN-9.1.4.4",
        "ACT",
    ],
};

/// Whether a viewport `content` value still lets users zoom to 200%.
fn allows_zoom(content: &str) -> bool {
    for property in content.split([',', ';']) {
        let Some((key, value)) = property.split_once('=') else {
            continue;
        };
        let value = value.trim().to_ascii_lowercase();
        match key.trim().to_ascii_lowercase().as_str() {
            "user-scalable" => {
                if value == "no" || value == "0" {
                    return false;
                }
            }
            "maximum-scale" => {
                if value.parse::<f64>().is_ok_and(|scale| scale < 2.0) {
                    return false;
                }
            }
            _ => {}
        }
    }
    true
}

impl Rule for MetaViewport {
    fn meta(&self) -> &RuleMeta {
        &META_VIEWPORT
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let mut findings = Findings::default();
        for meta in page.tree().select(&selector("meta[name][content]")) {
            let is_viewport = meta
                .value()
                .attr("name")
                .is_some_and(|n| n.trim().eq_ignore_ascii_case("viewport"));
            if !is_viewport {
                continue;
            }
            let content = meta.value().attr("content").unwrap_or_default();
            findings.check(meta, allows_zoom(content));
        }
        findings
    }
}

/// `<body>` must not be hidden from assistive technology.
pub struct AriaHiddenBody;

static ARIA_HIDDEN_BODY: RuleMeta = RuleMeta {
    id: "aria-hidden-body",
    impact: Impact::Critical,
    help: "aria-hidden=\"true\" must not be present on the document body",
    description: "Ensure aria-hidden=\"true\" is not present on the document body.",
    tags: &["cat.aria", "wcag2a", "wcag131", "wcag412", "EN-301-549", "EN-9.1.3.1", "EN-9.4.1.2"],
};

impl Rule for AriaHiddenBody {
    fn meta(&self) -> &RuleMeta {
        &ARIA_HIDDEN_BODY
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let mut findings = Findings::default();
        if let Some(body) = page.tree().select(&selector("body")).next() {
            let hidden = body
                .value()
                .attr("aria-hidden")
                .is_some_and(|h| h.trim() == "true");
            findings.check(body, !hidden);
        }
        findings
    }
}
