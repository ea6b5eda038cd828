//! End-to-end run: resolve chapters, assemble their text, summarise, report.

use crate::assemble::assemble_all;
use crate::chapters::{check_reading_order, Chapter, ChapterResolver};
use crate::config::{Config, MissingDocumentPolicy};
use crate::corpus::Corpus;
use crate::epub::CorpusError;
use crate::error::Result;
use crate::model::TextModel;
use crate::report::Report;
use crate::summarize::Summarizer;
use std::sync::Arc;
use tracing::{info, warn};

/// The summarisation pipeline over one shared model.
pub struct Pipeline<M> {
    resolver: ChapterResolver<M>,
    summarizer: Summarizer<M>,
    missing_document: MissingDocumentPolicy,
}

impl<M> Pipeline<M>
where
    M: TextModel + Send + Sync + 'static,
{
    /// Pipeline with default policies: sequential, abort on any failure
    pub fn new(model: Arc<M>, word_limit: u32) -> Self {
        Self {
            resolver: ChapterResolver::new(Arc::clone(&model)),
            summarizer: Summarizer::new(model, word_limit),
            missing_document: MissingDocumentPolicy::Abort,
        }
    }

    pub fn from_config(model: Arc<M>, config: &Config) -> Self {
        let summarizer = Summarizer::new(Arc::clone(&model), config.summary.word_limit)
            .with_concurrency(config.agent.concurrency)
            .with_failure_policy(config.summary.failed_summary);

        Self {
            resolver: ChapterResolver::new(model),
            summarizer,
            missing_document: config.summary.missing_document,
        }
    }

    pub fn with_missing_document_policy(mut self, policy: MissingDocumentPolicy) -> Self {
        self.missing_document = policy;
        self
    }

    /// Resolve the book's chapters without summarising them
    pub async fn chapters<C: Corpus + ?Sized>(&self, corpus: &C) -> Result<Vec<Chapter>> {
        let reading_order = corpus.reading_order();
        if reading_order.is_empty() {
            return Err(CorpusError::InvalidEpub("no documents in reading order".into()).into());
        }

        let chapters = self
            .resolver
            .resolve(corpus.navigation(), &reading_order)
            .await?;
        for name in check_reading_order(&chapters, &reading_order) {
            warn!(chapter = %name, "Chapter documents are out of reading order");
        }

        info!(chapters = chapters.len(), "Resolved chapter boundaries");
        Ok(chapters)
    }

    /// Summarise the whole book. Nothing is returned unless every step succeeds
    /// (or is allowed to fail by policy).
    pub async fn run<C: Corpus + ?Sized>(&self, corpus: &C) -> Result<Report> {
        let chapters = self.chapters(corpus).await?;
        if chapters.is_empty() {
            info!("Model found no chapters, report will be empty");
            return Ok(Report::default());
        }

        let texts = assemble_all(&chapters, corpus, self.missing_document)?;
        let summaries = self.summarizer.summarize_all(texts).await?;

        info!(chapters = summaries.len(), "Summarized all chapters");
        Ok(Report::new(summaries))
    }
}
