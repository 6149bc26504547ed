use serde::Serialize;

use crate::Result;
use crate::extract::{Extraction, Source};

/// Configuration for JSON output
#[derive(Debug, Clone)]
pub struct JsonConfig {
    /// Include the cleaned HTML
    pub include_html: bool,
    /// Include the Markdown document
    pub include_markdown: bool,
    /// Pretty print JSON output
    pub pretty: bool,
}

impl Default for JsonConfig {
    fn default() -> Self {
        Self { include_html: true, include_markdown: true, pretty: true }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonOutput<'a> {
    search_query: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    html_content: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    markdown: Option<&'a str>,
    sources: &'a [Source],
}

/// Serializes an extraction for the CLI's JSON output.
pub fn extraction_to_json(extraction: &Extraction, config: &JsonConfig) -> Result<String> {
    let output = JsonOutput {
        search_query: extraction.search_query.as_deref(),
        html_content: config.include_html.then_some(extraction.html_content.as_str()),
        markdown: config.include_markdown.then_some(extraction.markdown.as_str()),
        sources: &extraction.sources,
    };

    let json = if config.pretty { serde_json::to_string_pretty(&output)? } else { serde_json::to_string(&output)? };
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn extraction() -> Extraction {
        Extraction {
            html_content: "<p>Body</p>".to_string(),
            sources: vec![Source { title: "Rust".to_string(), url: "https://www.rust-lang.org/".to_string() }],
            search_query: Some("rust".to_string()),
            markdown: "# AI Overview\n\nBody\n".to_string(),
        }
    }

    #[test]
    fn test_full_output() {
        let json = extraction_to_json(&extraction(), &JsonConfig::default()).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["searchQuery"], "rust");
        assert_eq!(value["htmlContent"], "<p>Body</p>");
        assert_eq!(value["sources"][0]["url"], "https://www.rust-lang.org/");
    }

    #[test]
    fn test_omits_excluded_fields() {
        let config = JsonConfig { include_html: false, include_markdown: false, pretty: false };
        let json = extraction_to_json(&extraction(), &config).unwrap();
        assert!(!json.contains("htmlContent"));
        assert!(!json.contains("markdown"));
        assert!(!json.contains('\n'));
    }
}
