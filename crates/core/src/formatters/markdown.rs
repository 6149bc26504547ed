//! Markdown rendering of an extracted overview.

use std::fs;
use std::path::{Path, PathBuf};

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::extract::Source;
use crate::selectors::SOURCE_LIST_CLASS;
use crate::{OvexError, Result};

/// Heading every document starts with.
pub const TITLE_HEADING: &str = "# AI Overview";

/// Renders cleaned overview HTML and its sources as a Markdown document.
///
/// Images are dropped, as are links inside the inline source chips; the
/// sources are listed once, numbered, at the end instead.
pub fn create_markdown(html: &str, sources: &[Source], search_query: Option<&str>) -> Result<String> {
    let body = html_to_markdown(&drop_images_and_chip_links(html)?)?;

    let mut header = TITLE_HEADING.to_string();
    if let Some(query) = search_query {
        header.push_str(&format!("\n\n**Search Query:** {}", query));
    }

    let mut markdown = format!("{}\n\n{}\n", header, body.trim());

    if !sources.is_empty() {
        debug!(count = sources.len(), "appending sources");
        markdown.push_str("\n## Sources\n\n");
        for (i, source) in sources.iter().enumerate() {
            markdown.push_str(&format!("{}. [**{}**]({})\n", i + 1, source.title, source.url));
        }
    }

    Ok(markdown)
}

/// Writes `markdown` to `ai-overview-<unix millis>.md` inside `dir`.
pub fn download_markdown(markdown: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;

    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let path = dir.join(format!("ai-overview-{}.md", millis));
    fs::write(&path, markdown)?;

    info!(path = %path.display(), "markdown saved");
    Ok(path)
}

#[cfg(feature = "markdown")]
fn html_to_markdown(html: &str) -> Result<String> {
    htmd::convert(html).map_err(|e| OvexError::HtmlParseError(e.to_string()))
}

/// Plain text when Markdown conversion is compiled out.
#[cfg(not(feature = "markdown"))]
fn html_to_markdown(html: &str) -> Result<String> {
    Ok(crate::parse::Document::parse_fragment(html).text_content())
}

fn drop_images_and_chip_links(html: &str) -> Result<String> {
    let chip_links = format!(".{} a", SOURCE_LIST_CLASS);
    let mut output = Vec::new();
    let mut rewriter = lol_html::HtmlRewriter::new(
        lol_html::Settings {
            element_content_handlers: vec![
                lol_html::element!("img", |el| {
                    el.remove();
                    Ok(())
                }),
                lol_html::element!(chip_links, |el| {
                    el.remove();
                    Ok(())
                }),
            ],
            ..Default::default()
        },
        |c: &[u8]| output.extend_from_slice(c),
    );

    rewriter
        .write(html.as_bytes())
        .map_err(|e| OvexError::HtmlParseError(e.to_string()))?;
    rewriter.end().map_err(|e| OvexError::HtmlParseError(e.to_string()))?;

    String::from_utf8(output).map_err(|e| OvexError::HtmlParseError(e.to_string()))
}
