//! Plain text extraction from (X)HTML content documents.
//!
//! Uses scraper for HTML parsing. Text is collected per block element so
//! paragraphs stay on their own lines while inline markup disappears.

use lazy_static::lazy_static;
use scraper::{ElementRef, Html, Selector};

/// Elements whose text forms one paragraph of output
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "h1", "h2", "h3", "h4", "h5", "h6", "li", "blockquote", "pre", "dt", "dd",
    "figcaption", "td",
];

lazy_static! {
    static ref BODY: Selector = Selector::parse("body").unwrap();
    static ref BLOCKS: Selector = Selector::parse(&BLOCK_ELEMENTS.join(", ")).unwrap();
}

/// Strip markup from an HTML document, one line per paragraph.
pub fn html_to_text(html: &str) -> String {
    let document = Html::parse_document(html);

    // Without a <body> the whole document is searched
    let root = document
        .select(&BODY)
        .next()
        .unwrap_or_else(|| document.root_element());

    let paragraphs: Vec<String> = root
        .select(&BLOCKS)
        .filter(|element| !inside_block(element))
        .map(|element| collapse_whitespace(element.text()))
        .filter(|text| !text.is_empty())
        .collect();

    if paragraphs.is_empty() {
        // Fall back to all text under the root, e.g. for div-only documents
        return collapse_whitespace(root.text());
    }

    paragraphs.join("\n")
}

/// Nested blocks (a <p> inside an <li>) are already covered by their ancestor
fn inside_block(element: &ElementRef) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|ancestor| BLOCK_ELEMENTS.contains(&ancestor.value().name()))
}

fn collapse_whitespace<'a>(pieces: impl Iterator<Item = &'a str>) -> String {
    pieces
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
