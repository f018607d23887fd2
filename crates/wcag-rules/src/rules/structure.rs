//! Document structure best practices.

use super::{Findings, Rule, RuleMeta};
use crate::dom::{content_name, is_hidden, selector};
use crate::page::Page;
use wcag_audit::Impact;

/// Headings need text.
pub struct EmptyHeading;

static EMPTY_HEADING: RuleMeta = RuleMeta {
    id: "empty-heading",
    impact: Impact::Minor,
    help: "Headings should not be empty",
    description: "Ensure headings have discernible text",
    tags: &["cat.name-role-value", "best-practice"],
};

impl Rule for EmptyHeading {
    fn meta(&self) -> &RuleMeta {
        &EMPTY_HEADING
    }

    fn evaluate<'a>(&self, page: &Page<'a>) -> Findings<'a> {
        let tree = page.tree();
        let mut findings = Findings::default();
        for heading in tree.select(&selector("h1, h2, h3, h4, h5, h6, [role=heading]")) {
            if is_hidden(heading) {
                continue;
            }
            findings.check(heading, !content_name(page, heading).is_empty());
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::testing::counts;

    #[test]
    fn test_empty_heading() {
        assert_eq!(
            counts(
                &EmptyHeading,
                r#"<h1>Title</h1><h2></h2><div role="heading"> </div><h3 hidden></h3>"#
            ),
            (1, 2, 0)
        );
    }
}
