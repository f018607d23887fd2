//! Parsed markup documents.

use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

/// A parsed, script-free document tree.
///
/// Embedded scripts are never executed; the tree reflects the markup as
/// delivered. Relative references resolve against `<base href>` when the
/// document has one, and against the supplied base URL otherwise.
pub struct StaticDocument {
    tree: Html,
    base_url: Url,
    source_len: usize,
}

impl StaticDocument {
    pub fn parse(markup: &str, base_url: Url) -> Self {
        let tree = Html::parse_document(markup);
        let base_url = declared_base(&tree, &base_url).unwrap_or(base_url);
        debug!(
            bytes = markup.len(),
            parse_errors = tree.errors.len(),
            base = %base_url,
            "parsed static document"
        );
        Self {
            tree,
            base_url,
            source_len: markup.len(),
        }
    }

    pub fn tree(&self) -> &Html {
        &self.tree
    }

    /// Effective base URL for relative references.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Size of the markup this document was parsed from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Resolve a reference found in the document.
    pub fn resolve(&self, reference: &str) -> Option<Url> {
        self.base_url.join(reference.trim()).ok()
    }
}

/// The first `<base href>`, resolved against the supplied base.
fn declared_base(tree: &Html, supplied: &Url) -> Option<Url> {
    let selector = Selector::parse("base[href]").ok()?;
    let href = tree.select(&selector).next()?.value().attr("href")?;
    supplied.join(href.trim()).ok()
}
