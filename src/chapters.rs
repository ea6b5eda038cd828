//! Chapter boundary resolution.
//!
//! The book's navigation markup and its spine are handed to the model, which
//! groups spine documents into chapters. The reply is untrusted: it is parsed
//! strictly here, and document ids are checked later when content is
//! assembled.

use crate::error::{Error, Result};
use crate::model::TextModel;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// A chapter as inferred by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Chapter {
    /// Human-readable chapter title
    pub name: String,
    /// Names of the documents that make up the chapter, in reading order
    pub documents: Vec<String>,
}

/// Asks a model where the chapters of a book begin and end.
pub struct ChapterResolver<M> {
    model: Arc<M>,
}

impl<M: TextModel> ChapterResolver<M> {
    pub fn new(model: Arc<M>) -> Self {
        Self { model }
    }

    /// Group the ordered documents into chapters with a single model call
    pub async fn resolve(&self, navigation: &str, documents: &[&str]) -> Result<Vec<Chapter>> {
        info!(documents = documents.len(), "Extracting chapters");
        let prompt = chapters_prompt(navigation, documents);

        let reply = self
            .model
            .generate(&prompt)
            .await
            .map_err(|source| Error::ModelCallFailure {
                context: "chapter boundaries".to_string(),
                source,
            })?;

        let chapters = parse_chapters(&reply)?;
        debug!(?chapters, "Extracted chapters");
        Ok(chapters)
    }
}

/// Build the boundary-inference prompt
pub fn chapters_prompt(navigation: &str, documents: &[&str]) -> String {
    let schema = schemars::schema_for!(Chapter);

    format!(
        r#"Given an ebook about a story.

This is the navigation of the ebook:
```xml
{navigation}
```

These are documents in the ebook, in reading order:
```text
{documents}
```

Extract document names corresponding to each chapter, ignore non-content sections such as cover, insert, foreword, afterword,...
Note that each chapter likely has multiple documents, and the navigation usually only points at the first one.
For example, if chapter 1 starts at document 1 and chapter 2 starts at document 4 then chapter 1 includes document 1, 2, and 3.
The result must be in json format: [{{"name": "chapter_1_name", "documents": ["document_1", "document_2", ...]}}, {{"name": "chapter_2_name", "documents": ["document_1", "document_2", ...]}}, ...].
Each element of the array must match this JSON schema:
{schema}
EXTRA COMMENTARY IS PROHIBITED."#,
        documents = documents.join("\n"),
        schema = schema.as_value(),
    )
}

/// Parse the model's reply into chapters.
///
/// Fails with [`Error::MalformedModelOutput`] unless the reply, once any code
/// fence is removed, is a JSON array of `{name, documents}` records with at
/// least one document each.
pub fn parse_chapters(reply: &str) -> Result<Vec<Chapter>> {
    let malformed = |reason: String| Error::MalformedModelOutput {
        reason,
        raw: reply.to_string(),
    };

    let chapters: Vec<Chapter> =
        serde_json::from_str(strip_code_fence(reply)).map_err(|e| malformed(e.to_string()))?;

    if let Some(empty) = chapters.iter().find(|c| c.documents.is_empty()) {
        return Err(malformed(format!("chapter '{}' has no documents", empty.name)));
    }

    Ok(chapters)
}

/// Strip markdown code fence wrappers (```json ... ``` or ``` ... ```)
fn strip_code_fence(text: &str) -> &str {
    let mut trimmed = text.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Drop the info string, e.g. "json"
        trimmed = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
    }
    if let Some(rest) = trimmed.strip_suffix("```") {
        trimmed = rest;
    }

    trimmed.trim()
}

/// Names of chapters whose documents do not follow the book's reading order.
///
/// Each document must come after every document before it, across chapter
/// boundaries too, so overlapping or repeated documents are flagged. Unknown ids
/// are ignored here; assembly reports them.
pub fn check_reading_order<'a>(chapters: &'a [Chapter], reading_order: &[&str]) -> Vec<&'a str> {
    let positions: HashMap<&str, usize> = reading_order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, position))
        .collect();

    let mut last: Option<usize> = None;
    let mut offenders = Vec::new();
    for chapter in chapters {
        let mut in_order = true;
        for position in chapter
            .documents
            .iter()
            .filter_map(|id| positions.get(id.as_str()).copied())
        {
            if last.is_some_and(|last| position <= last) {
                in_order = false;
            }
            last = Some(last.map_or(position, |last| last.max(position)));
        }
        if !in_order {
            offenders.push(chapter.name.as_str());
        }
    }
    offenders
}
