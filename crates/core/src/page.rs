//! The host results page, seen from the automation side.
//!
//! [`Page`] is the only way the crate touches the page: it reads serialized
//! snapshots, delivers synthetic activations and listens for structural or
//! scroll changes. [`HtmlPage`] is an in-memory implementation over an HTML
//! string, used by the CLI for saved snapshots and by the tests to script a
//! page that reacts to clicks.

use std::fmt;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tracing::debug;
use url::Url;

use crate::parse::Document;
use crate::{OvexError, Result};

/// Position of an element in document order, as in `querySelectorAll('*')`.
///
/// A locator is only meaningful against the snapshot it was taken from, or
/// one with identical structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ElementLocator {
    pub ordinal: usize,
}

/// Synthetic activation styles, tried in this order by the sources expander.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClickMethod {
    /// `element.click()`
    Direct,
    /// A bubbling, cancelable `click` MouseEvent.
    MouseEvent,
    /// A `mousedown` followed by a `mouseup`.
    MouseDownUp,
    /// The page framework's custom `trigger` event.
    Trigger,
}

impl ClickMethod {
    pub const ALL: [ClickMethod; 4] =
        [ClickMethod::Direct, ClickMethod::MouseEvent, ClickMethod::MouseDownUp, ClickMethod::Trigger];
}

impl fmt::Display for ClickMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ClickMethod::Direct => "direct click",
            ClickMethod::MouseEvent => "mouse event",
            ClickMethod::MouseDownUp => "mousedown/mouseup",
            ClickMethod::Trigger => "trigger event",
        };
        f.write_str(name)
    }
}

/// Changes observed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageEvent {
    /// Child nodes were added or removed somewhere under `<body>`.
    Mutation,
    /// The window scrolled.
    Scroll,
}

/// Access to the host page.
pub trait Page: Send + Sync {
    /// Serialized DOM at this instant.
    fn document(&self) -> Result<String>;

    /// Delivers one synthetic activation to the element at `target`.
    fn dispatch(&self, target: ElementLocator, method: ClickMethod) -> Result<()>;

    /// Address of the results page, when known.
    fn url(&self) -> Option<Url>;

    /// Subscribes to mutation and scroll notifications.
    fn events(&self) -> broadcast::Receiver<PageEvent>;
}

/// Parses the current document and runs `f` over it.
///
/// The parsed snapshot is dropped before this returns, so callers may await
/// afterwards without holding it.
pub fn with_snapshot<T>(page: &dyn Page, f: impl FnOnce(&Document) -> Result<T>) -> Result<T> {
    let html = page.document()?;
    let doc = Document::parse(&html);
    f(&doc)
}

/// Whether `selector` matches anything on the page right now.
pub fn page_has(page: &dyn Page, selector: &str) -> Result<bool> {
    with_snapshot(page, |doc| doc.exists(selector))
}

/// A dispatched activation, as recorded by [`HtmlPage`].
#[derive(Debug, Clone)]
pub struct ClickRecord {
    pub locator: ElementLocator,
    pub method: ClickMethod,
    pub tag_name: String,
    pub text: String,
}

/// Reaction of a scripted page to a click: `Ok(Some(html))` replaces the
/// document, `Ok(None)` leaves it untouched, `Err` makes the dispatch fail.
pub type ClickHandler = Box<dyn Fn(&ClickRecord, &str) -> Result<Option<String>> + Send + Sync>;

/// An in-memory page backed by an HTML string.
pub struct HtmlPage {
    html: Mutex<String>,
    url: Option<Url>,
    events: broadcast::Sender<PageEvent>,
    clicks: Mutex<Vec<ClickRecord>>,
    on_click: Option<ClickHandler>,
}

impl HtmlPage {
    pub fn new(html: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self { html: Mutex::new(html.into()), url: None, events, clicks: Mutex::new(Vec::new()), on_click: None }
    }

    /// Sets the results-page address the search query is read from.
    pub fn with_url(mut self, url: Url) -> Self {
        self.url = Some(url);
        self
    }

    /// Installs a reaction to dispatched clicks.
    pub fn with_click_handler(
        mut self,
        handler: impl Fn(&ClickRecord, &str) -> Result<Option<String>> + Send + Sync + 'static,
    ) -> Self {
        self.on_click = Some(Box::new(handler));
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Replaces the document and notifies observers of the mutation.
    pub fn set_html(&self, html: impl Into<String>) {
        *self.html.lock().unwrap_or_else(|e| e.into_inner()) = html.into();
        let _ = self.events.send(PageEvent::Mutation);
    }

    /// Notifies observers that the window scrolled.
    pub fn scroll(&self) {
        let _ = self.events.send(PageEvent::Scroll);
    }

    /// Every activation dispatched so far.
    pub fn clicks(&self) -> Vec<ClickRecord> {
        self.clicks.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Page for HtmlPage {
    fn document(&self) -> Result<String> {
        Ok(self.html.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn dispatch(&self, target: ElementLocator, method: ClickMethod) -> Result<()> {
        let current = self.document()?;
        let record = {
            let doc = Document::parse(&current);
            let element = doc
                .element_at(target)
                .ok_or(OvexError::StaleElement { ordinal: target.ordinal })?;
            ClickRecord { locator: target, method, tag_name: element.tag_name(), text: element.text() }
        };

        debug!(ordinal = target.ordinal, %method, tag = %record.tag_name, "dispatching activation");

        let replacement = match &self.on_click {
            Some(handler) => handler(&record, &current)?,
            None => None,
        };

        self.clicks.lock().unwrap_or_else(|e| e.into_inner()).push(record);

        if let Some(html) = replacement {
            self.set_html(html);
        }

        Ok(())
    }

    fn url(&self) -> Option<Url> {
        self.url.clone()
    }

    fn events(&self) -> broadcast::Receiver<PageEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body><div id="m-x-content"><div role="button">More</div></div></body></html>"#;

    #[test]
    fn test_dispatch_records_click() {
        let page = HtmlPage::new(PAGE);
        let locator = with_snapshot(&page, |doc| {
            Ok(doc.select_first(r#"[role="button"]"#)?.map(|el| el.locator()))
        })
        .unwrap()
        .unwrap();

        page.dispatch(locator, ClickMethod::Direct).unwrap();

        let clicks = page.clicks();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].text, "More");
        assert_eq!(clicks[0].method, ClickMethod::Direct);
    }

    #[test]
    fn test_dispatch_stale_locator() {
        let page = HtmlPage::new(PAGE);
        let result = page.dispatch(ElementLocator { ordinal: 999 }, ClickMethod::Direct);
        assert!(matches!(result, Err(OvexError::StaleElement { ordinal: 999 })));
    }

    #[test]
    fn test_click_handler_rewrites_document() {
        let page = HtmlPage::new(PAGE).with_click_handler(|_, html| Ok(Some(html.replace("More", "Less"))));
        let mut events = page.events();

        let locator = with_snapshot(&page, |doc| Ok(doc.select_first(r#"[role="button"]"#)?.map(|e| e.locator())))
            .unwrap()
            .unwrap();
        page.dispatch(locator, ClickMethod::MouseEvent).unwrap();

        assert!(page.document().unwrap().contains("Less"));
        assert_eq!(events.try_recv().unwrap(), PageEvent::Mutation);
    }

    #[test]
    fn test_failing_handler_propagates() {
        let page = HtmlPage::new(PAGE).with_click_handler(|record, _| {
            Err(OvexError::DispatchFailed { method: record.method.to_string(), reason: "blocked".to_string() })
        });
        let result = page.dispatch(ElementLocator { ordinal: 3 }, ClickMethod::Direct);
        assert!(matches!(result, Err(OvexError::DispatchFailed { .. })));
        assert!(page.clicks().is_empty());
    }
}
