//! Tree helpers shared by rules: node snippets, selectors, accessible names.

use std::sync::OnceLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{ElementRef, Selector};

use crate::page::Page;

/// Snippets longer than this are cut down to the opening tag.
const MAX_SNIPPET_LEN: usize = 300;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Parse a selector known at compile time.
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// The element's markup with attributes in sorted order.
///
/// The document root, and anything over 300 characters, is reduced to its
/// opening tag.
pub fn snippet(el: ElementRef<'_>) -> String {
    let open = opening_tag(el);
    if el.parent().and_then(ElementRef::wrap).is_none() {
        return open;
    }
    let mut out = String::new();
    write_element(el, &mut out);
    if out.chars().count() > MAX_SNIPPET_LEN {
        open
    } else {
        out
    }
}

fn opening_tag(el: ElementRef<'_>) -> String {
    let mut attrs: Vec<(&str, &str)> = el.value().attrs().collect();
    attrs.sort_unstable();

    let mut out = format!("<{}", el.value().name());
    for (name, value) in attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape(value, true));
        out.push('"');
    }
    out.push('>');
    out
}

fn write_element(el: ElementRef<'_>, out: &mut String) {
    out.push_str(&opening_tag(el));
    let name = el.value().name();
    if VOID_ELEMENTS.contains(&name) {
        return;
    }
    for child in el.children() {
        match child.value() {
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    write_element(child, out);
                }
            }
            Node::Text(text) => out.push_str(&escape(text, false)),
            _ => {}
        }
    }
    out.push_str("</");
    out.push_str(name);
    out.push('>');
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' if attribute => out.push_str("&quot;"),
            '<' if !attribute => out.push_str("&lt;"),
            '>' if !attribute => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
    out
}

pub(crate) fn css_ident() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| Regex::new(r"^-?[_a-zA-Z][_a-zA-Z0-9-]*$").expect("valid regex"))
}

/// Collapse runs of whitespace and trim.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A non-blank attribute value.
pub fn attr<'a>(el: ElementRef<'a>, name: &str) -> Option<&'a str> {
    el.value().attr(name).filter(|v| !v.trim().is_empty())
}

fn hidden_by_style(style: &str) -> bool {
    static HIDDEN: OnceLock<Regex> = OnceLock::new();
    HIDDEN
        .get_or_init(|| {
            Regex::new(r"(?i)(display\s*:\s*none|visibility\s*:\s*hidden)").expect("valid regex")
        })
        .is_match(style)
}

fn hides_itself(el: ElementRef<'_>) -> bool {
    let v = el.value();
    v.attr("hidden").is_some()
        || v.attr("aria-hidden").is_some_and(|h| h.trim() == "true")
        || v.attr("style").is_some_and(hidden_by_style)
}

/// Whether the element or an ancestor is hidden from assistive technology.
pub fn is_hidden(el: ElementRef<'_>) -> bool {
    hides_itself(el)
        || el
            .ancestors()
            .filter_map(ElementRef::wrap)
            .any(hides_itself)
}

/// Text of the subtree as exposed to assistive technology: hidden subtrees
/// are skipped and images contribute their alt text.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    collect_text(el, &mut out);
    squash(&out)
}

fn collect_text(el: ElementRef<'_>, out: &mut String) {
    for child in el.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(e) => {
                let Some(child) = ElementRef::wrap(child) else {
                    continue;
                };
                if hides_itself(child) || matches!(e.name(), "script" | "style" | "template") {
                    continue;
                }
                if let Some(label) = attr(child, "aria-label") {
                    out.push(' ');
                    out.push_str(label);
                    out.push(' ');
                    continue;
                }
                if e.name() == "img" {
                    if let Some(alt) = e.attr("alt") {
                        out.push(' ');
                        out.push_str(alt);
                        out.push(' ');
                    }
                    continue;
                }
                out.push(' ');
                collect_text(child, out);
                out.push(' ');
            }
            _ => {}
        }
    }
}

/// Text referenced by `aria-labelledby`, if any of the ids resolve.
pub fn labelledby_text(page: &Page<'_>, el: ElementRef<'_>) -> Option<String> {
    let ids = attr(el, "aria-labelledby")?;
    let text = ids
        .split_whitespace()
        .filter_map(|id| page.by_id(id))
        .map(|target| attr(target, "aria-label").map_or_else(|| visible_text(target), squash))
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (!text.is_empty()).then_some(text)
}

/// Name from `aria-labelledby` or `aria-label`.
pub fn aria_name(page: &Page<'_>, el: ElementRef<'_>) -> Option<String> {
    labelledby_text(page, el).or_else(|| attr(el, "aria-label").map(squash))
}

/// Accessible name of an element named from its content: ARIA labelling,
/// then contents, then `title`.
pub fn content_name(page: &Page<'_>, el: ElementRef<'_>) -> String {
    if let Some(name) = aria_name(page, el) {
        return name;
    }
    let text = visible_text(el);
    if !text.is_empty() {
        return text;
    }
    attr(el, "title").map(squash).unwrap_or_default()
}

/// Whether the element's role removes it from the accessibility tree.
pub fn is_presentational(el: ElementRef<'_>) -> bool {
    el.value()
        .attr("role")
        .and_then(|r| r.split_whitespace().next())
        .is_some_and(|r| r == "none" || r == "presentation")
}
