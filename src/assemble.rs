//! Chapter content assembly: the plain text of a chapter's documents, in order.

use crate::chapters::Chapter;
use crate::config::MissingDocumentPolicy;
use crate::corpus::Corpus;
use crate::error::{Error, Result};
use tracing::{debug, warn};

/// A chapter's name together with its full plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterText {
    pub name: String,
    pub text: String,
}

/// Concatenate the text of every document in the chapter.
///
/// No separator is inserted between documents, so a paragraph ending one
/// document runs into the first paragraph of the next.
pub fn assemble<C: Corpus + ?Sized>(chapter: &Chapter, corpus: &C) -> Result<String> {
    let mut content = String::new();
    for id in &chapter.documents {
        let text = corpus.text(id).ok_or_else(|| Error::DocumentNotFound {
            chapter: chapter.name.clone(),
            document: id.clone(),
        })?;
        content.push_str(&text);
    }
    Ok(content)
}

/// Assemble every chapter before any of them is summarised.
pub fn assemble_all<C: Corpus + ?Sized>(
    chapters: &[Chapter],
    corpus: &C,
    policy: MissingDocumentPolicy,
) -> Result<Vec<ChapterText>> {
    let mut assembled = Vec::with_capacity(chapters.len());

    for chapter in chapters {
        match assemble(chapter, corpus) {
            Ok(text) => {
                debug!(chapter = %chapter.name, chars = text.len(), "Assembled chapter");
                assembled.push(ChapterText {
                    name: chapter.name.clone(),
                    text,
                });
            }
            Err(err @ Error::DocumentNotFound { .. })
                if policy == MissingDocumentPolicy::Skip =>
            {
                warn!(chapter = %chapter.name, "Skipping chapter: {err}");
            }
            Err(err) => return Err(err),
        }
    }

    Ok(assembled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::tests::MemoryCorpus;

    fn chapter(name: &str, documents: &[&str]) -> Chapter {
        Chapter {
            name: name.to_string(),
            documents: documents.iter().map(|d| d.to_string()).collect(),
        }
    }

    fn corpus() -> MemoryCorpus {
        MemoryCorpus::new(vec![("d1", "Alpha. "), ("d2", "Beta"), ("d3", "Gamma\n")])
    }

    #[test]
    fn concatenates_without_separator() {
        let text = assemble(&chapter("Ch", &["d1", "d2", "d3"]), &corpus()).unwrap();
        assert_eq!(text, "Alpha. BetaGamma\n");
    }

    #[test]
    fn assembly_is_associative_over_documents() {
        let corpus = corpus();
        let whole = assemble(&chapter("Ch", &["d1", "d2", "d3"]), &corpus).unwrap();
        let pieces: String = ["d1", "d2", "d3"]
            .iter()
            .map(|d| assemble(&chapter("Ch", &[*d]), &corpus).unwrap())
            .collect();
        assert_eq!(whole, pieces);
    }

    #[test]
    fn keeps_chapter_order_not_reading_order() {
        let text = assemble(&chapter("Ch", &["d3", "d1"]), &corpus()).unwrap();
        assert_eq!(text, "Gamma\nAlpha. ");
    }

    #[test]
    fn missing_document_names_chapter_and_id() {
        let err = assemble(&chapter("Ch2", &["d1", "d9"]), &corpus()).unwrap_err();
        match err {
            Error::DocumentNotFound { chapter, document } => {
                assert_eq!(chapter, "Ch2");
                assert_eq!(document, "d9");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn abort_policy_fails_the_run() {
        let chapters = [chapter("Ch1", &["d1"]), chapter("Ch2", &["d9"])];
        let err = assemble_all(&chapters, &corpus(), MissingDocumentPolicy::Abort).unwrap_err();
        assert!(matches!(err, Error::DocumentNotFound { .. }));
    }

    #[test]
    fn skip_policy_drops_only_the_broken_chapter() {
        let chapters = [
            chapter("Ch1", &["d1"]),
            chapter("Ch2", &["d9"]),
            chapter("Ch3", &["d2", "d3"]),
        ];
        let assembled = assemble_all(&chapters, &corpus(), MissingDocumentPolicy::Skip).unwrap();

        let names: Vec<&str> = assembled.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ch1", "Ch3"]);
        assert_eq!(assembled[1].text, "BetaGamma\n");
    }
}
