//! Lookup tables for one document, built once per run.
//!
//! Rules ask for elements by id, labels by target and selectors for the nodes
//! they report. Answering those from a walk of the whole tree each time makes
//! a run quadratic in document size, so [`Page`] indexes the tree in a single
//! pass up front.

use std::collections::HashMap;

use ego_tree::NodeId;
use scraper::{ElementRef, Html};
use wcag_audit::StaticDocument;

use crate::dom::css_ident;

/// A parsed document plus the indexes the rules query.
pub struct Page<'a> {
    document: &'a StaticDocument,
    /// First element carrying each id, and how many carry it.
    ids: HashMap<&'a str, (ElementRef<'a>, usize)>,
    /// Elements per tag name.
    tags: HashMap<&'a str, usize>,
    /// 1-based position of each element among its element siblings.
    positions: HashMap<NodeId, usize>,
    /// `<label for>` elements by the id they point at.
    labels: HashMap<&'a str, Vec<ElementRef<'a>>>,
}

impl<'a> Page<'a> {
    pub fn new(document: &'a StaticDocument) -> Self {
        let mut ids: HashMap<&'a str, (ElementRef<'a>, usize)> = HashMap::new();
        let mut tags = HashMap::new();
        let mut positions = HashMap::new();
        let mut labels: HashMap<&'a str, Vec<ElementRef<'a>>> = HashMap::new();

        let root = document.tree().root_element();
        for el in root.descendants().filter_map(ElementRef::wrap) {
            let value = el.value();
            if let Some(id) = value.id() {
                ids.entry(id)
                    .and_modify(|(_, uses)| *uses += 1)
                    .or_insert((el, 1));
            }
            *tags.entry(value.name()).or_insert(0usize) += 1;
            if value.name() == "label" {
                if let Some(target) = value.attr("for") {
                    labels.entry(target).or_default().push(el);
                }
            }
            for (i, child) in el.children().filter_map(ElementRef::wrap).enumerate() {
                positions.insert(child.id(), i + 1);
            }
        }

        Self {
            document,
            ids,
            tags,
            positions,
            labels,
        }
    }

    pub fn document(&self) -> &'a StaticDocument {
        self.document
    }

    pub fn tree(&self) -> &'a Html {
        self.document.tree()
    }

    /// The first element with this id, in document order.
    pub fn by_id(&self, id: &str) -> Option<ElementRef<'a>> {
        self.ids.get(id).map(|(el, _)| *el)
    }

    /// Labels whose `for` attribute names `id`.
    pub fn labels_for(&self, id: &str) -> &[ElementRef<'a>] {
        self.labels.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The element's id, if it is a plain identifier used nowhere else.
    fn unique_id(&self, el: ElementRef<'a>) -> Option<&'a str> {
        let id = el.value().id()?;
        if !css_ident().is_match(id) {
            return None;
        }
        let uses = self.ids.get(id).map_or(0, |(_, uses)| *uses);
        (uses == 1).then_some(id)
    }

    /// A selector matching exactly this element.
    ///
    /// Prefers a unique id, then a tag name used only once, and otherwise an
    /// `nth-child` path anchored at the nearest uniquely identified ancestor
    /// or the root.
    pub fn selector(&self, el: ElementRef<'a>) -> String {
        if let Some(id) = self.unique_id(el) {
            return format!("#{id}");
        }
        let name = el.value().name();
        if self.tags.get(name) == Some(&1) {
            return name.to_string();
        }

        let mut parts = Vec::new();
        let mut current = el;
        loop {
            if let Some(id) = self.unique_id(current) {
                parts.push(format!("#{id}"));
                break;
            }
            let name = current.value().name();
            let Some(parent) = current.parent().and_then(ElementRef::wrap) else {
                parts.push(name.to_string());
                break;
            };
            let position = self.positions.get(&current.id()).copied().unwrap_or(1);
            parts.push(format!("{name}:nth-child({position})"));
            current = parent;
        }
        parts.reverse();
        parts.join(" > ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::selector;
    use crate::rules::testing::doc;

    fn first<'a>(page: &Page<'a>, css: &str) -> ElementRef<'a> {
        page.tree().select(&selector(css)).next().unwrap()
    }

    #[test]
    fn test_selector_preferences() {
        let document = doc(
            r#"<html><body>
                <div id="main"><img><img></div>
                <div><img class="x"></div>
                <span id="dup"></span><span id="dup"></span>
                <footer></footer>
            </body></html>"#,
        );
        let page = Page::new(&document);
        assert_eq!(page.selector(first(&page, "#main")), "#main");
        assert_eq!(page.selector(first(&page, "footer")), "footer");
        assert_eq!(
            page.selector(first(&page, "#main > img")),
            "#main > img:nth-child(1)"
        );
        assert_eq!(
            page.selector(first(&page, "img.x")),
            "html > body:nth-child(2) > div:nth-child(2) > img:nth-child(1)"
        );
        assert_eq!(
            page.selector(first(&page, "span")),
            "html > body:nth-child(2) > span:nth-child(3)"
        );
    }

    #[test]
    fn test_generated_selectors_match_their_element() {
        let document =
            doc("<ul><li>a</li><li><a href='#'>b</a></li></ul><ul><li><a href='#'>c</a></li></ul>");
        let page = Page::new(&document);
        for a in page.tree().select(&selector("a")) {
            let css = page.selector(a);
            let matched: Vec<_> = page.tree().select(&selector(&css)).collect();
            assert_eq!(matched.len(), 1, "{css}");
            assert_eq!(matched[0].id(), a.id());
        }
    }

    #[test]
    fn test_flat_siblings_get_distinct_positions() {
        let links: String = (0..500).map(|i| format!("<a href='/{i}'></a>")).collect();
        let document = doc(&format!("<html><body>{links}</body></html>"));
        let page = Page::new(&document);
        let last = page.tree().select(&selector("a")).last().unwrap();
        assert_eq!(
            page.selector(last),
            "html > body:nth-child(2) > a:nth-child(500)"
        );
    }

    #[test]
    fn test_ids_and_labels() {
        let document = doc(
            r#"<p id="a">one</p><p id="a">two</p>
               <label for="f">F</label><label for="f">again</label><input id="f">"#,
        );
        let page = Page::new(&document);
        assert_eq!(page.by_id("a").map(|p| p.inner_html()), Some("one".into()));
        assert!(page.by_id("missing").is_none());
        assert_eq!(page.labels_for("f").len(), 2);
        assert!(page.labels_for("g").is_empty());
        assert_eq!(page.selector(first(&page, "p")), "html > body:nth-child(2) > p:nth-child(1)");
    }
}
