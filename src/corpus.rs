//! The book as seen by the pipeline: documents in reading order, the raw
//! navigation markup, and plain text per document.

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;

/// A content document from the book's spine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Manifest href relative to the package document; unique within a book
    pub id: String,
    /// Position in reading order
    pub position: usize,
    /// Raw (X)HTML markup
    pub content: String,
}

/// Read access to a book's content documents.
pub trait Corpus {
    /// Document ids in reading order
    fn reading_order(&self) -> Vec<&str>;

    /// Raw navigation (table of contents) markup, passed through uninterpreted
    fn navigation(&self) -> &str;

    /// Plain text of a document, or `None` if the book has no such document
    fn text(&self, id: &str) -> Option<String>;
}

/// Characters escaped when an id is tried in percent-encoded form
const HREF_ESCAPES: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b']')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

/// Alternative spellings of a document id, most specific first.
///
/// Models echo hrefs from the navigation document, which may carry a
/// `#fragment`, or be percent-encoded differently from the manifest.
pub fn id_candidates(id: &str) -> Vec<Cow<'_, str>> {
    let mut candidates = vec![Cow::Borrowed(id)];
    let without_fragment = id.split('#').next().unwrap_or(id);
    if without_fragment != id {
        candidates.push(Cow::Borrowed(without_fragment));
    }

    let decoded = percent_decode_str(without_fragment).decode_utf8().ok();
    let plain = decoded.as_deref().unwrap_or(without_fragment);
    let encoded = utf8_percent_encode(plain, HREF_ESCAPES).to_string();
    if plain != without_fragment {
        candidates.push(Cow::Owned(plain.to_string()));
    }
    if encoded != without_fragment && encoded != plain {
        candidates.push(Cow::Owned(encoded));
    }
    candidates
}
