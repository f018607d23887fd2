//! Time-based media (WCAG 1.2.2).

use super::{Findings, Rule, RuleMeta};
use crate::dom::{is_hidden, selector};
use crate::page::Page;
use wcag_audit::Impact;

/// Videos need captions.
///
/// A captions track passes. Without one the video goes to review: the
/// captions may be burned into the video itself.
pub struct VideoCaption;

static VIDEO_CAPTION: RuleMeta = RuleMeta {
    id: "video-caption",
    impact: Impact::Critical,
    help: "<video> elements must have captions",
    description: "Ensure <video> elements have captions",
    tags: &[
        "cat.text-alternatives",
        "wcag2a",
        "wcag122",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.1.2.2",
    ],
};

impl Rule for VideoCaption {
    fn meta(&self) -> &RuleMeta {
        &VIDEO_CAPTION
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let track = selector("track[kind]");
        let mut findings = Findings::default();
        for video in page.tree().select(&selector("video")) {
            if is_hidden(video) {
                continue;
            }
            let captioned = video.select(&track).any(|t| {
                t.value()
                    .attr("kind")
                    .is_some_and(|k| k.trim().eq_ignore_ascii_case("captions"))
            });
            if captioned {
                findings.passed.push(video);
            } else {
                findings.review.push(video);
            }
        }
        findings
    }
}
