//! Ways of locating the "show all sources" control.
//!
//! Each strategy is a pure function over a snapshot. They are tried in the
//! order of [`EXPAND_CONTROL_STRATEGIES`] and the first hit wins.

use crate::parse::{Document, Element};
use crate::selectors::{MOST_SHARED_CONTENT, POINTER_BUTTONS, SHOW_ALL_LABELS};

const BUTTON: &str = r#"[role="button"]"#;

pub type Strategy = for<'a> fn(&'a Document) -> Option<Element<'a>>;

/// Strategies in the order they are tried.
pub const EXPAND_CONTROL_STRATEGIES: &[(&str, Strategy)] = &[
    ("button_in_last_list_item", button_in_last_list_item),
    ("labelled_show_all_button", labelled_show_all_button),
    ("pointer_button", pointer_button),
];

/// Runs the strategies in order, returning the first match and its name.
pub fn find_expand_control(doc: &Document) -> Option<(&'static str, Element<'_>)> {
    EXPAND_CONTROL_STRATEGIES
        .iter()
        .find_map(|(name, strategy)| strategy(doc).map(|element| (*name, element)))
}

/// The button inside the last `<li>` of the first list of the msc block.
pub fn button_in_last_list_item(doc: &Document) -> Option<Element<'_>> {
    let msc = doc.select_first(MOST_SHARED_CONTENT).ok()??;
    let list = msc.select_first("ul").ok()??;
    let last = list.last_element_child()?;
    if last.tag_name() != "li" {
        return None;
    }
    last.select_first(BUTTON).ok()?
}

/// A button of the msc block labelled "Show all" or one of its translations.
pub fn labelled_show_all_button(doc: &Document) -> Option<Element<'_>> {
    let msc = doc.select_first(MOST_SHARED_CONTENT).ok()??;
    msc.select(BUTTON).ok()?.into_iter().find(|button| {
        let text = button.text();
        let text = text.trim();
        SHOW_ALL_LABELS.iter().any(|label| text.contains(label))
    })
}

/// A pointer-styled control holding an image or a count such as "+5".
///
/// Falls back to the last pointer-styled control in the container.
pub fn pointer_button(doc: &Document) -> Option<Element<'_>> {
    let buttons = doc.select(POINTER_BUTTONS).ok()?;

    let hinted = buttons.iter().find(|button| {
        let has_image = button.select_first("img").ok().flatten().is_some();
        let has_count = button.text().trim().chars().any(|c| c.is_ascii_digit() || c == '+');
        has_image || has_count
    });

    hinted.or(buttons.last()).cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(body: &str) -> Document {
        Document::parse(&format!(r#"<html><body><div id="m-x-content">{}</div></body></html>"#, body))
    }

    #[test]
    fn test_button_in_last_list_item() {
        let doc = doc(
            r#"<div data-subtree="msc"><ul>
                <li><div role="button">First</div></li>
                <li><div role="button">Expand</div></li>
            </ul></div>"#,
        );
        let button = button_in_last_list_item(&doc).unwrap();
        assert_eq!(button.text(), "Expand");
    }

    #[test]
    fn test_button_in_last_list_item_requires_li() {
        let doc = doc(r#"<div data-subtree="msc"><ul><li>a</li><div role="button">x</div></ul></div>"#);
        assert!(button_in_last_list_item(&doc).is_none());
    }

    #[test]
    fn test_labelled_show_all_button() {
        let doc = doc(
            r#"<div data-subtree="msc">
                <span role="button">Share</span>
                <span role="button"> Pokaż wszystko </span>
            </div>"#,
        );
        let button = labelled_show_all_button(&doc).unwrap();
        assert!(button.text().contains("Pokaż wszystko"));
    }

    #[test]
    fn test_pointer_button_prefers_count_or_image() {
        let doc = doc(
            r#"<div role="button" style="cursor:pointer">Feedback</div>
               <div role="button" style="cursor:pointer">+7</div>
               <div role="button" style="cursor:pointer">Last</div>"#,
        );
        assert_eq!(pointer_button(&doc).unwrap().text(), "+7");
    }

    #[test]
    fn test_pointer_button_with_image() {
        let doc = doc(
            r#"<div role="button" style="cursor:pointer">Feedback</div>
               <div role="button" style="cursor:pointer"><img src="fav.png"></div>"#,
        );
        assert!(pointer_button(&doc).unwrap().select_first("img").unwrap().is_some());
    }

    #[test]
    fn test_pointer_button_falls_back_to_last() {
        let doc = doc(
            r#"<div role="button" style="cursor:pointer">One</div>
               <div role="button" style="cursor:pointer">Two</div>"#,
        );
        assert_eq!(pointer_button(&doc).unwrap().text(), "Two");
    }

    #[test]
    fn test_order_prefers_last_list_item() {
        let doc = doc(
            r#"<div data-subtree="msc"><ul><li><div role="button">Show all</div></li></ul></div>
               <div role="button" style="cursor:pointer">+3</div>"#,
        );
        let (name, element) = find_expand_control(&doc).unwrap();
        assert_eq!(name, "button_in_last_list_item");
        assert_eq!(element.text(), "Show all");
    }

    #[test]
    fn test_nothing_found() {
        let doc = doc("<p>No controls here</p>");
        assert!(find_expand_control(&doc).is_none());
    }
}
