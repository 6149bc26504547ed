//! HTML snapshot parsing and DOM queries.
//!
//! This module provides the [`Document`] and [`Element`] types used to query
//! a snapshot of the host page with CSS selectors. A `Document` is a frozen
//! copy of the page at one instant; it is never kept across an `.await`.
//!
//! # Example
//!
//! ```rust
//! use ovex_core::parse::Document;
//!
//! let html = r#"
//!     <html>
//!         <body>
//!             <div id="m-x-content"><p class="content">Answer</p></div>
//!         </body>
//!     </html>
//! "#;
//!
//! let doc = Document::parse(html);
//! let answer = doc.select_first("#m-x-content p").unwrap().unwrap();
//! assert_eq!(answer.text(), "Answer");
//! ```

use scraper::{ElementRef, Html, Selector};

use crate::page::ElementLocator;
use crate::{OvexError, Result};

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector).map_err(|e| OvexError::HtmlParseError(format!("Invalid selector: {}", e)))
}

/// A parsed HTML snapshot.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses a complete HTML document.
    pub fn parse(html: &str) -> Self {
        Self { html: Html::parse_document(html) }
    }

    /// Parses an HTML fragment, such as the outer HTML of a single container.
    pub fn parse_fragment(html: &str) -> Self {
        Self { html: Html::parse_fragment(html) }
    }

    /// Selects elements using a CSS selector.
    ///
    /// # Errors
    ///
    /// Returns [`OvexError::HtmlParseError`] if the selector is invalid.
    ///
    /// # Example
    ///
    /// ```rust
    /// use ovex_core::parse::Document;
    ///
    /// let html = r#"<p class="content">First</p><p class="content">Second</p>"#;
    /// let doc = Document::parse(html);
    /// let elements = doc.select("p.content").unwrap();
    /// assert_eq!(elements.len(), 2);
    /// ```
    pub fn select(&'_ self, selector: &str) -> Result<Vec<Element<'_>>> {
        let sel = compile(selector)?;
        Ok(self.html.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Selects the first element matching a CSS selector, like `querySelector`.
    pub fn select_first(&'_ self, selector: &str) -> Result<Option<Element<'_>>> {
        let sel = compile(selector)?;
        Ok(self.html.select(&sel).next().map(|el| Element { element: el }))
    }

    /// Whether any element matches the selector.
    pub fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.select_first(selector)?.is_some())
    }

    /// Resolves a locator produced by [`Element::locator`] on an equivalent snapshot.
    pub fn element_at(&'_ self, locator: ElementLocator) -> Option<Element<'_>> {
        self.html
            .tree
            .root()
            .descendants()
            .filter_map(ElementRef::wrap)
            .nth(locator.ordinal)
            .map(|el| Element { element: el })
    }

    /// Gets all text content from the document.
    pub fn text_content(&self) -> String {
        self.html.root_element().text().collect()
    }
}

/// A wrapper around scraper's ElementRef.
///
/// # Example
///
/// ```rust
/// use ovex_core::parse::Document;
///
/// let html = r#"<a href="https://example.com" aria-label="Example">Link text</a>"#;
/// let doc = Document::parse(html);
/// let link = &doc.select("a").unwrap()[0];
///
/// assert_eq!(link.text(), "Link text");
/// assert_eq!(link.attr("href"), Some("https://example.com"));
/// ```
#[derive(Clone, Debug)]
pub struct Element<'a> {
    element: ElementRef<'a>,
}

impl<'a> Element<'a> {
    /// Gets the inner HTML of this element.
    pub fn inner_html(&self) -> String {
        self.element.inner_html()
    }

    /// Gets the outer HTML of this element.
    pub fn outer_html(&self) -> String {
        self.element.html()
    }

    /// Gets the text content of this element.
    pub fn text(&self) -> String {
        self.element.text().collect()
    }

    /// Gets the value of an attribute.
    pub fn attr(&self, name: &str) -> Option<&'a str> {
        self.element.value().attr(name)
    }

    /// Gets the lowercase tag name of this element.
    pub fn tag_name(&self) -> String {
        self.element.value().name().to_lowercase()
    }

    /// Selects descendant elements using a CSS selector.
    pub fn select(&self, selector: &str) -> Result<Vec<Element<'a>>> {
        let sel = compile(selector)?;
        Ok(self.element.select(&sel).map(|el| Element { element: el }).collect())
    }

    /// Selects the first descendant matching a CSS selector.
    pub fn select_first(&self, selector: &str) -> Result<Option<Element<'a>>> {
        let sel = compile(selector)?;
        Ok(self.element.select(&sel).next().map(|el| Element { element: el }))
    }

    /// All descendant elements in document order, excluding this one.
    pub fn descendants(&self) -> Vec<Element<'a>> {
        self.element
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .map(|el| Element { element: el })
            .collect()
    }

    /// The last child that is an element, like `lastElementChild`.
    pub fn last_element_child(&self) -> Option<Element<'a>> {
        self.element
            .children()
            .filter_map(ElementRef::wrap)
            .last()
            .map(|el| Element { element: el })
    }

    /// Position of this element in document order.
    pub fn locator(&self) -> ElementLocator {
        let id = self.element.id();
        let ordinal = self
            .element
            .tree()
            .root()
            .descendants()
            .filter(|node| node.value().is_element())
            .position(|node| node.id() == id)
            .unwrap_or_default();
        ElementLocator { ordinal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_HTML: &str = r#"
        <!DOCTYPE html>
        <html lang="en">
        <head><title>Results</title></head>
        <body>
            <div id="m-x-content">
                <p class="content">Paragraph 1</p>
                <p class="content">Paragraph 2</p>
                <ul><li>one</li><li>two</li></ul>
                <a href="https://example.com">Link</a>
            </div>
        </body>
        </html>
    "#;

    #[test]
    fn test_select_elements() {
        let doc = Document::parse(SAMPLE_HTML);
        let elements = doc.select("p.content").unwrap();

        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].text(), "Paragraph 1");
        assert_eq!(elements[1].text(), "Paragraph 2");
    }

    #[test]
    fn test_invalid_selector() {
        let doc = Document::parse(SAMPLE_HTML);
        let result = doc.select("[[invalid");

        assert!(matches!(result, Err(OvexError::HtmlParseError(_))));
    }

    #[test]
    fn test_last_element_child() {
        let doc = Document::parse(SAMPLE_HTML);
        let ul = doc.select_first("ul").unwrap().unwrap();
        let last = ul.last_element_child().unwrap();
        assert_eq!(last.tag_name(), "li");
        assert_eq!(last.text(), "two");
    }

    #[test]
    fn test_locator_round_trips_within_snapshot() {
        let doc = Document::parse(SAMPLE_HTML);
        let link = doc.select_first("a").unwrap().unwrap();
        let locator = link.locator();

        let again = Document::parse(SAMPLE_HTML);
        let resolved = again.element_at(locator).unwrap();
        assert_eq!(resolved.attr("href"), Some("https://example.com"));
    }

    #[test]
    fn test_locator_counts_html_element_first() {
        let doc = Document::parse(SAMPLE_HTML);
        let html = doc.select_first("html").unwrap().unwrap();
        assert_eq!(html.locator().ordinal, 0);
    }

    #[test]
    fn test_exists() {
        let doc = Document::parse(SAMPLE_HTML);
        assert!(doc.exists("#m-x-content").unwrap());
        assert!(!doc.exists("#missing").unwrap());
    }
}
