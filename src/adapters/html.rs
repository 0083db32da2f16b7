//! HTML helpers shared by the adapters
//!
//! All extraction runs on `scraper` parses of page snapshots or item
//! fragments. Parsed documents are not `Send`, so these helpers are plain
//! synchronous functions that never outlive one call.

use scraper::{ElementRef, Html, Selector};

/// Parses a CSS selector; invalid selectors match nothing
fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// All matches of `css` under `root`, in document order
pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => root.select(&sel).collect(),
        None => Vec::new(),
    }
}

pub fn first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    let found = root.select(&sel).next();
    found
}

/// Visible-ish text of an element: text nodes joined, lines trimmed, blank lines dropped
pub fn text_of(element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Text of the first match, if it is non-empty
pub fn first_text(root: ElementRef<'_>, css: &str) -> Option<String> {
    first(root, css).map(text_of).filter(|t| !t.is_empty())
}

/// Attribute of the first match that carries it
pub fn first_attr(root: ElementRef<'_>, css: &str, attr: &str) -> Option<String> {
    select_all(root, css)
        .into_iter()
        .find_map(|el| el.value().attr(attr).map(str::to_string))
        .filter(|v| !v.is_empty())
}

/// Outer HTML of every element matching `css` in a full document
pub fn fragments(document_html: &str, css: &str) -> Vec<String> {
    let document = Html::parse_document(document_html);
    select_all(document.root_element(), css)
        .into_iter()
        .map(|el| el.html())
        .collect()
}

/// Runs `f` against the root of a parsed item fragment
pub fn with_fragment<T>(fragment: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> T {
    let document = Html::parse_fragment(fragment);
    f(document.root_element())
}

/// Runs `f` against the root of a parsed document
pub fn with_document<T>(document_html: &str, f: impl FnOnce(ElementRef<'_>) -> T) -> T {
    let document = Html::parse_document(document_html);
    f(document.root_element())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CARD: &str = r#"
        <div class="card">
            <span class="name">  alice </span>
            <p class="body">
                line one
                <b>bold</b> end
            </p>
            <a class="link" href="/t/1">t</a>
            <a class="link" href="/t/2">u</a>
        </div>"#;

    #[test]
    fn test_first_text_trims_and_joins_lines() {
        with_fragment(CARD, |root| {
            assert_eq!(first_text(root, ".name").as_deref(), Some("alice"));
            assert_eq!(
                first_text(root, ".body").as_deref(),
                Some("line one\nbold end")
            );
            assert_eq!(first_text(root, ".missing"), None);
        });
    }

    #[test]
    fn test_first_attr_and_select_all() {
        with_fragment(CARD, |root| {
            assert_eq!(first_attr(root, "a.link", "href").as_deref(), Some("/t/1"));
            assert_eq!(select_all(root, "a.link").len(), 2);
            assert_eq!(first_attr(root, "a.link", "data-x"), None);
        });
    }

    #[test]
    fn test_invalid_selector_matches_nothing() {
        with_fragment(CARD, |root| {
            assert!(select_all(root, "[[[").is_empty());
            assert_eq!(first_text(root, "[[["), None);
        });
    }

    #[test]
    fn test_fragments_keep_outer_html() {
        let page = format!("<html><body>{}{}</body></html>", CARD, CARD);
        let items = fragments(&page, ".card");
        assert_eq!(items.len(), 2);
        assert!(items[0].starts_with("<div class=\"card\">"));
    }
}
