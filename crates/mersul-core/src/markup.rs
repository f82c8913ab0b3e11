//! Narrow navigation interface the extractor walks.
//!
//! The extractor never touches a concrete HTML tree; it only asks for a node's
//! element children by tag, the first descendant with a tag, and its text.
//! [`scraper::ElementRef`] implements it for real pages and
//! [`crate::testutil::FixtureNode`] for synthetic ones.

use scraper::{ElementRef, Html};

use crate::normalize::collapse_whitespace;

pub trait MarkupNode: Sized + Clone {
    /// Direct element children with tag name `tag`, in document order.
    fn children_named(&self, tag: &str) -> Vec<Self>;

    /// First descendant (depth-first, excluding `self`) with tag name `tag`.
    fn find(&self, tag: &str) -> Option<Self>;

    /// Concatenated raw text of the node and all its descendants.
    fn text_content(&self) -> String;

    fn normalized_text(&self) -> String {
        collapse_whitespace(&self.text_content())
    }

    /// `index`-th direct child with tag `tag`.
    fn nth_child(&self, tag: &str, index: usize) -> Option<Self> {
        self.children_named(tag).into_iter().nth(index)
    }

    /// Follow a chain of first-descendant lookups, e.g. `["div", "div"]`.
    fn find_path(&self, tags: &[&str]) -> Option<Self> {
        let mut node = self.clone();
        for tag in tags {
            node = node.find(tag)?;
        }
        Some(node)
    }
}

impl<'a> MarkupNode for ElementRef<'a> {
    fn children_named(&self, tag: &str) -> Vec<Self> {
        self.children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == tag)
            .collect()
    }

    fn find(&self, tag: &str) -> Option<Self> {
        self.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .find(|el| el.value().name() == tag)
    }

    fn text_content(&self) -> String {
        ElementRef::text(self).collect()
    }
}

/// Parse a result fragment as returned by the origin's search endpoints.
///
/// The fragment's top-level elements become the children of the returned
/// document's root element.
pub fn parse_fragment(html: &str) -> Html {
    Html::parse_fragment(html)
}
