//! Text alternatives for images (WCAG 1.1.1).

use super::{Findings, Rule, RuleMeta};
use crate::dom::{self, attr, is_hidden, is_presentational, selector};
use crate::page::Page;
use wcag_audit::Impact;

/// `<img>` elements need alternative text or a presentational role.
pub struct ImageAlt;

static IMAGE_ALT: RuleMeta = RuleMeta {
    id: "image-alt",
    impact: Impact::Critical,
    help: "Images must have alternative text",
    description: "Ensure <img> elements have alternative text or a role of none or presentation",
    tags: &[
        "cat.text-alternatives",
        "wcag2a",
        "wcag111",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.1.1.1",
        "ACT",
    ],
};

impl Rule for ImageAlt {
    fn meta(&self) -> &RuleMeta {
        &IMAGE_ALT
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for img in tree.select(&selector("img")) {
            if is_hidden(img) {
                continue;
            }
            // An empty alt marks the image decorative.
            let ok = img.value().attr("alt").is_some()
                || is_presentational(img)
                || dom::aria_name(page, img).is_some()
                || attr(img, "title").is_some();
            findings.check(img, ok);
        }
        findings
    }
}

/// `<input type="image">` needs alternative text.
pub struct InputImageAlt;

static INPUT_IMAGE_ALT: RuleMeta = RuleMeta {
    id: "input-image-alt",
    impact: Impact::Critical,
    help: "Image buttons must have alternative text",
    description: "Ensure <input type=\"image\"> elements have alternative text",
    tags: &[
        "cat.text-alternatives",
        "wcag2a",
        "wcag111",
        "wcag412",
        "section508",
        "section508.22.a",
        "EN-301-549",
        "EN-9.1.1.1",
        "EN-9.4.1.2",
        "ACT",
    ],
};

impl Rule for InputImageAlt {
    fn meta(&self) -> &RuleMeta {
        &INPUT_IMAGE_ALT
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for input in tree.select(&selector("input[type]")) {
            let is_image = input
                .value()
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("image"));
            if !is_image || is_hidden(input) {
                continue;
            }
            let ok = attr(input, "alt").is_some()
                || dom::aria_name(page, input).is_some()
                || attr(input, "title").is_some();
            findings.check(input, ok);
        }
        findings
    }
}

/// Image-map `<area href>` elements need alternative text.
pub struct AreaAlt;

static AREA_ALT: RuleMeta = RuleMeta {
    id: "area-alt",
    impact: Impact::Critical,
    help: "Active <area> elements must have alternative text",
    description: "Ensure <area> elements of image maps have alternative text",
    tags: &[
        "cat.text-alternatives",
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

impl Rule for AreaAlt {
    fn meta(&self) -> &RuleMeta {
        &AREA_ALT
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for area in tree.select(&selector("map area[href]")) {
            if is_hidden(area) {
                continue;
            }
            let ok = attr(area, "alt").is_some() || dom::aria_name(page, area).is_some();
            findings.check(area, ok);
        }
        findings
    }
}
