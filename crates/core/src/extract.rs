//! Content and source extraction from the overview container.
//!
//! Cleanup runs as a series of lol_html passes over the container markup,
//! one per kind of noise, followed by regex passes over the serialized
//! result for inline script residue.
//!
//! # Example
//!
//! ```rust
//! use ovex_core::extract::{Container, extract_content, extract_sources};
//! use ovex_core::parse::Document;
//!
//! let html = r#"<div id="m-x-content">
//!     <p class="x" jsaction="a">Rust is a language.</p>
//!     <div style="height: 100%;"><ul class="s">
//!         <li><a href="https://www.rust-lang.org/">The Rust Programming Language</a></li>
//!     </ul></div>
//! </div>"#;
//!
//! let doc = Document::parse(html);
//! let container = Container::find(&doc).unwrap().unwrap();
//!
//! assert_eq!(extract_content(&container), "<p>Rust is a language.</p>");
//! let sources = extract_sources(&container).unwrap();
//! assert_eq!(sources[0].url, "https://www.rust-lang.org/");
//! ```

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use crate::Result;
use crate::page::{ElementLocator, Page, with_snapshot};
use crate::parse::{Document, Element};
use crate::selectors::{CONTAINER, FRAMEWORK_ATTRIBUTES, HIDDEN, INTERNAL_LINK_PATTERNS, MOST_SHARED_CONTENT, SOURCES_WRAPPER};

/// Titles are cut to this many characters, plus an ellipsis.
const MAX_TITLE_CHARS: usize = 100;

/// Titles shorter than this are replaced by the host name.
const MIN_TITLE_CHARS: usize = 4;

/// Inline script residue, removed in this order.
static SCRIPT_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"\(function\(\)[^}]*\{[^}]*\}\)\(\);?",
        r#"javascript:[^"']*"#,
        r#"on\w+\s*=\s*["'][^"']*["']"#,
        r"\(function\(\)\{[^}]*\}\)\(\);",
        r"var\s+\w+\s*=\s*[^;]*;",
        r"function\s*\([^)]*\)\s*\{[^}]*\}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("script pattern is valid"))
    .collect()
});

static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?m)^\s*[\r\n]").expect("valid pattern"));

static WHITESPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s{2,}").expect("valid pattern"));

/// The overview container as captured from one snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container {
    /// Where the container was in the snapshot.
    pub locator: ElementLocator,
    /// Inner HTML of the container.
    pub html: String,
}

impl Container {
    /// Finds the container in a parsed snapshot.
    pub fn find(doc: &Document) -> Result<Option<Self>> {
        Ok(doc
            .select_first(CONTAINER)?
            .map(|el| Container { locator: el.locator(), html: el.inner_html() }))
    }

    /// Finds the container on the live page.
    pub fn capture(page: &dyn Page) -> Result<Option<Self>> {
        with_snapshot(page, Container::find)
    }
}

/// One cited source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
}

/// Returns the cleaned inner HTML of the container.
pub fn extract_content(container: &Container) -> String {
    let mut html = remove_most_shared_content(&container.html);
    html = remove_first_sources_wrapper(&html);
    html = remove_hidden_elements(&html);
    html = remove_styles_and_scripts(&html);
    html = strip_attributes(&html);
    html = strip_script_residue(&html);

    let cleaned = collapse_whitespace(&html);
    debug!(chars = cleaned.len(), "content extracted");
    cleaned
}

fn rewrite(html: &str, settings: lol_html::Settings<'_, '_>) -> String {
    let mut output = String::new();
    let mut rewriter = lol_html::HtmlRewriter::new(settings, |c: &[u8]| {
        output.push_str(&String::from_utf8_lossy(c));
    });

    if rewriter.write(html.as_bytes()).is_err() {
        return html.to_string();
    }
    if rewriter.end().is_err() {
        return html.to_string();
    }

    output
}

fn remove_most_shared_content(html: &str) -> String {
    rewrite(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!(MOST_SHARED_CONTENT, |el| {
                el.remove();
                Ok(())
            })],
            ..Default::default()
        },
    )
}

/// Only the first wrapper holds the sources list; later ones are content.
fn remove_first_sources_wrapper(html: &str) -> String {
    let mut removed = false;
    rewrite(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!(SOURCES_WRAPPER, |el| {
                if !removed {
                    el.remove();
                    removed = true;
                }
                Ok(())
            })],
            ..Default::default()
        },
    )
}

fn remove_hidden_elements(html: &str) -> String {
    let handlers = HIDDEN
        .split(',')
        .map(str::trim)
        .map(|selector| {
            lol_html::element!(selector, |el| {
                el.remove();
                Ok(())
            })
        })
        .collect();

    rewrite(html, lol_html::Settings { element_content_handlers: handlers, ..Default::default() })
}

fn remove_styles_and_scripts(html: &str) -> String {
    rewrite(
        html,
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("style", |el| {
                    el.remove();
                    Ok(())
                }),
                lol_html::element!("script", |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..Default::default()
        },
    )
}

/// Strips presentation and framework attributes from every element.
fn strip_attributes(html: &str) -> String {
    rewrite(
        html,
        lol_html::Settings {
            element_content_handlers: vec![lol_html::element!("*", |el| {
                el.remove_attribute("style");
                el.remove_attribute("class");
                for attribute in FRAMEWORK_ATTRIBUTES {
                    el.remove_attribute(attribute);
                }
                Ok(())
            })],
            ..Default::default()
        },
    )
}

fn strip_script_residue(html: &str) -> String {
    SCRIPT_PATTERNS
        .iter()
        .fold(html.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

fn collapse_whitespace(html: &str) -> String {
    let html = BLANK_LINES.replace_all(html, "");
    WHITESPACE_RUNS.replace_all(&html, " ").trim().to_string()
}

/// Reads the cited sources from the first classed list of the sources wrapper.
///
/// Internal and in-page links are skipped, redirect links are unwrapped and
/// duplicates by final URL keep their first occurrence.
pub fn extract_sources(container: &Container) -> Result<Vec<Source>> {
    let doc = Document::parse_fragment(&container.html);

    let Some(wrapper) = doc.select_first(SOURCES_WRAPPER)? else {
        debug!("no sources wrapper in container");
        return Ok(Vec::new());
    };
    let Some(list) = wrapper.select_first("ul[class]")? else {
        debug!("no source list in wrapper");
        return Ok(Vec::new());
    };

    let links = list.select("a[href]")?;
    let mut seen = HashSet::new();
    let mut sources = Vec::new();

    for link in &links {
        let Some(href) = link.attr("href") else { continue };
        if href.starts_with('#') || INTERNAL_LINK_PATTERNS.iter().any(|p| href.contains(p)) {
            continue;
        }

        let url = clean_redirect_url(href);
        let Some(title) = source_title(link, &url) else {
            debug!(url = %url, "dropping source without a usable title");
            continue;
        };

        if seen.insert(url.clone()) {
            sources.push(Source { title, url });
        }
    }

    debug!(links = links.len(), sources = sources.len(), "sources extracted");
    Ok(sources)
}

/// Text of the link, then its `aria-label`, then its longest descendant text.
fn link_text(link: &Element<'_>) -> String {
    let text = link.text();
    if !text.trim().is_empty() {
        return text.trim().to_string();
    }

    if let Some(label) = link.attr("aria-label").map(str::trim).filter(|l| !l.is_empty()) {
        return label.to_string();
    }

    link.descendants().iter().fold(String::new(), |longest, el| {
        let text = el.text();
        let text = text.trim();
        if text.chars().count() > longest.chars().count() { text.to_string() } else { longest }
    })
}

fn source_title(link: &Element<'_>, url: &str) -> Option<String> {
    let text = link_text(link);
    let first_line = text.lines().next().unwrap_or_default().trim();

    let title = if first_line.chars().count() >= MIN_TITLE_CHARS {
        first_line.to_string()
    } else {
        host_name(url)?
    };

    if title.chars().count() < MIN_TITLE_CHARS {
        return None;
    }

    Some(truncate_title(title))
}

fn host_name(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?;
    Some(host.strip_prefix("www.").unwrap_or(host).to_string())
}

fn truncate_title(title: String) -> String {
    if title.chars().count() > MAX_TITLE_CHARS {
        let cut: String = title.chars().take(MAX_TITLE_CHARS).collect();
        format!("{}...", cut)
    } else {
        title
    }
}

/// Unwraps one level of `/url?url=...` (or `q=`) redirect indirection.
pub fn clean_redirect_url(href: &str) -> String {
    if !href.contains("/url?") {
        return href.to_string();
    }

    let Some((_, query)) = href.split_once('?') else {
        return href.to_string();
    };
    let query = query.split('?').next().unwrap_or_default();

    let params: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes()).into_owned().collect();
    let target = ["url", "q"]
        .iter()
        .find_map(|key| params.iter().find(|(k, v)| k == key && !v.is_empty()).map(|(_, v)| v.clone()));

    target.unwrap_or_else(|| href.to_string())
}

/// The `q` parameter of a results-page URL, decoded.
pub fn extract_search_query(page_url: &Url) -> Option<String> {
    page_url
        .query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.trim().to_string())
        .filter(|query| !query.is_empty())
}

/// Everything manual extraction produces for one container.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Extraction {
    pub html_content: String,
    pub sources: Vec<Source>,
    pub search_query: Option<String>,
    pub markdown: String,
}

impl Extraction {
    pub fn from_container(container: &Container, page_url: Option<&Url>) -> Result<Self> {
        let html_content = extract_content(container);
        let sources = extract_sources(container)?;
        let search_query = page_url.and_then(extract_search_query);
        let markdown = crate::formatters::create_markdown(&html_content, &sources, search_query.as_deref())?;

        Ok(Self { html_content, sources, search_query, markdown })
    }
}
