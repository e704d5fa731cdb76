//! Read-only query wrapper around a parsed HTML email document.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};

static BODY_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());

/// A parsed HTML document plus the small, fixed query vocabulary the
/// extractors need. Parsing never fails: malformed markup degrades to
/// whatever tree html5ever recovers, which is the desired behavior for
/// arbitrary hand-authored email HTML.
///
/// The wrapper is deliberately read-only. All extraction happens against
/// borrowed element handles, and the document itself is dropped before the
/// pipeline reaches any await point.
pub(crate) struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub(crate) fn parse(raw_html: &str) -> Self {
        Self {
            html: Html::parse_document(raw_html),
        }
    }

    /// The `<body>` element, falling back to the document root when the
    /// parser recovered a tree without one.
    pub(crate) fn body(&self) -> ElementRef<'_> {
        self.html
            .select(&BODY_SELECTOR)
            .next()
            .unwrap_or_else(|| self.html.root_element())
    }

    /// All elements with the given tag name, in document order.
    pub(crate) fn find_by_tag(&self, tag: &str) -> Vec<ElementRef<'_>> {
        self.query(tag)
    }

    /// All elements matching any of the given tag names, in document order
    /// across the whole list.
    pub(crate) fn find_by_tags(&self, tags: &[&str]) -> Vec<ElementRef<'_>> {
        self.query(&tags.join(", "))
    }

    /// All elements carrying the given attribute, regardless of its value.
    pub(crate) fn find_by_attribute(&self, attr: &str) -> Vec<ElementRef<'_>> {
        self.query(&format!("[{}]", attr))
    }

    /// All `tag` elements whose `attr` value contains `needle`.
    pub(crate) fn find_by_attribute_substring(
        &self,
        tag: &str,
        attr: &str,
        needle: &str,
    ) -> Vec<ElementRef<'_>> {
        self.query(&format!("{}[{}*=\"{}\"]", tag, attr, needle))
    }

    /// All `tag` elements (any tag for `"*"`) carrying the given class.
    pub(crate) fn find_by_class(&self, tag: &str, class: &str) -> Vec<ElementRef<'_>> {
        if tag == "*" {
            self.query(&format!(".{}", class))
        } else {
            self.query(&format!("{}.{}", tag, class))
        }
    }

    /// All `tag` elements whose collected text contains any of the given
    /// needles, in document order. The comparison is case-sensitive;
    /// callers supply case variants when they want both.
    pub(crate) fn find_by_text_substrings(
        &self,
        tag: &str,
        needles: &[&str],
    ) -> Vec<ElementRef<'_>> {
        self.query(tag)
            .into_iter()
            .filter(|el| {
                let text = element_text(el);
                needles.iter().any(|needle| text.contains(needle))
            })
            .collect()
    }

    fn query(&self, selector_str: &str) -> Vec<ElementRef<'_>> {
        match Selector::parse(selector_str) {
            Ok(selector) => self.html.select(&selector).collect(),
            Err(_) => {
                tracing::warn!("Ignoring unparseable selector: {}", selector_str);
                Vec::new()
            }
        }
    }
}

/// Concatenated text of an element and all its descendants, untrimmed.
pub(crate) fn element_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>()
}
