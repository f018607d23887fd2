//! Rule definitions.
//!
//! Each rule selects the elements it applies to and sorts them into passed,
//! failed, and needs-review. The engine turns those buckets into result
//! categories.

pub mod document;
pub mod forms;
pub mod images;
pub mod media;
pub mod names;
pub mod structure;

use scraper::ElementRef;
use wcag_audit::Impact;

use crate::page::Page;

/// Version of the rule documentation `helpUrl` points at.
pub const HELP_VERSION: &str = "4.10";

/// Static description of a rule.
#[derive(Debug, Clone, Copy)]
pub struct RuleMeta {
    pub id: &'static str,
    pub impact: Impact,
    pub help: &'static str,
    pub description: &'static str,
    pub tags: &'static [&'static str],
}

impl RuleMeta {
    pub fn help_url(&self) -> String {
        format!(
            "https://dequeuniversity.com/rules/axe/{HELP_VERSION}/{}?application=wcag-audit",
            self.id
        )
    }
}

/// Elements a rule looked at, by outcome.
#[derive(Default)]
pub struct Findings<'a> {
    pub passed: Vec<ElementRef<'a>>,
    pub failed: Vec<ElementRef<'a>>,
    pub review: Vec<ElementRef<'a>>,
}

impl<'a> Findings<'a> {
    pub fn check(&mut self, el: ElementRef<'a>, ok: bool) {
        if ok {
            self.passed.push(el);
        } else {
            self.failed.push(el);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.passed.is_empty() && self.failed.is_empty() && self.review.is_empty()
    }
}

/// A single accessibility rule.
pub trait Rule: Send + Sync {
    fn meta(&self) -> &RuleMeta;

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a>;
}

/// All rules, in evaluation order.
pub fn all() -> Vec<Box<dyn Rule>> {
    vec![
        Box::new(images::ImageAlt),
        Box::new(images::InputImageAlt),
        Box::new(images::AreaAlt),
        Box::new(document::HtmlHasLang),
        Box::new(document::HtmlLangValid),
        Box::new(document::DocumentTitle),
        Box::new(document::MetaViewport),
        Box::new(document::AriaHiddenBody),
        Box::new(names::LinkName),
        Box::new(names::ButtonName),
        Box::new(names::InputButtonName),
        Box::new(names::FrameTitle),
        Box::new(forms::Label),
        Box::new(media::VideoCaption),
        Box::new(structure::EmptyHeading),
    ]
}
