pub mod json;
pub mod markdown;

pub use json::{JsonConfig, extraction_to_json};
pub use markdown::{create_markdown, download_markdown};
