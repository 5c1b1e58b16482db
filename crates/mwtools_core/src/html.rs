//! Read-only view over a fetched wiki page.
//!
//! Wraps `scraper` so the rest of the crate only deals with owned anchors and
//! strings. `scraper::Html` is not `Send`, so documents are parsed, queried and
//! dropped within one call.

use scraper::{ElementRef, Html, Selector};

/// An `<a>` element reduced to what link classification needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor {
    pub href: Option<String>,
    pub text: String,
    /// Direct child nodes, text nodes included.
    pub child_count: usize,
    pub has_class: bool,
}

impl Anchor {
    /// A link with a single child and no styling class, i.e. an ordinary
    /// article link inside running text or a bullet list.
    pub fn is_plain(&self) -> bool {
        self.child_count == 1 && !self.has_class
    }

    fn from_element(element: ElementRef<'_>) -> Self {
        Self {
            href: element.value().attr("href").map(ToString::to_string),
            text: element_text(element),
            child_count: element.children().count(),
            has_class: element.value().attr("class").is_some(),
        }
    }
}

pub struct WikiDocument {
    document: Html,
}

impl WikiDocument {
    pub fn parse(body: &str) -> Self {
        Self {
            document: Html::parse_document(body),
        }
    }

    /// Text of `#firstHeading`, e.g. "Category:Countries in Asia".
    pub fn title(&self) -> Option<String> {
        let selector = Selector::parse("#firstHeading").ok()?;
        self.document
            .select(&selector)
            .next()
            .map(element_text)
            .filter(|text| !text.is_empty())
    }

    pub fn anchors(&self) -> Vec<Anchor> {
        match Selector::parse("a") {
            Ok(selector) => self
                .document
                .select(&selector)
                .map(Anchor::from_element)
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Anchors below the element with `id`, or `None` when there is no such element.
    pub fn anchors_in(&self, id: &str) -> Option<Vec<Anchor>> {
        let container = Selector::parse(&format!("#{id}")).ok()?;
        let anchor = Selector::parse("a").ok()?;
        let root = self.document.select(&container).next()?;
        Some(root.select(&anchor).map(Anchor::from_element).collect())
    }

    /// Text of the first `.inner` element inside the first `.outer` element.
    pub fn nested_class_text(&self, outer: &str, inner: &str) -> Option<String> {
        let outer = Selector::parse(&format!(".{outer}")).ok()?;
        let inner = Selector::parse(&format!(".{inner}")).ok()?;
        let container = self.document.select(&outer).next()?;
        container.select(&inner).next().map(element_text)
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}
