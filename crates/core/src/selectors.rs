//! Fixed attribute and style signatures of the host results page.
//!
//! The markup is an unversioned external interface: when it changes,
//! detection and extraction degrade quietly rather than failing.

/// The AI overview container.
pub const CONTAINER: &str = "#m-x-content";

/// Toggle of a collapsed overview panel.
pub const COLLAPSED_TOGGLE: &str = r#"[aria-expanded="false"][aria-controls="m-x-content"]"#;

/// Toggle of an expanded overview panel.
pub const EXPANDED_TOGGLE: &str = r#"[aria-expanded="true"][aria-controls="m-x-content"]"#;

/// "Most shared content" block holding the collapsed sources list.
pub const MOST_SHARED_CONTENT: &str = r#"div[data-subtree="msc"]"#;

/// Fixed-height wrapper around the expanded sources list (exact match).
pub const SOURCES_WRAPPER: &str = r#"div[style="height: 100%;"]"#;

/// Marker present once the sources sub-panel is expanded.
pub const SOURCES_EXPANDED_MARKER: &str = r#"#m-x-content div[style*="height: 100%"]"#;

/// Pointer-styled controls inside the container.
pub const POINTER_BUTTONS: &str = r#"#m-x-content [role="button"][style*="cursor:pointer"]"#;

/// Hidden elements removed from extracted content.
pub const HIDDEN: &str = r#"[style*="display:none"], [style*="display: none"]"#;

/// Class of the inline source chips whose links are dropped from Markdown.
pub const SOURCE_LIST_CLASS: &str = "LLtSOc";

/// Framework-internal attributes stripped from extracted content.
pub const FRAMEWORK_ATTRIBUTES: &[&str] = &[
    "data-ved",
    "data-async-token",
    "data-async-context",
    "data-subtree",
    "role",
    "aria-level",
    "jscontroller",
    "jsaction",
    "jsmodel",
    "jsname",
];

/// Hosts whose links are never reported as sources.
pub const INTERNAL_LINK_PATTERNS: &[&str] = &["google.com/search", "support.google.com"];

/// Labels of the "show all" control in the languages the page is served in.
pub const SHOW_ALL_LABELS: &[&str] = &["Show all", "Show more", "Pokaż wszystko", "Zobacz więcej"];
