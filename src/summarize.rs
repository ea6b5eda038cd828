//! Per-chapter summarisation.
//!
//! Each chapter is one model call. Calls run on a bounded pool and results
//! are put back in chapter order, whatever order they finish in.

use crate::assemble::ChapterText;
use crate::config::FailedSummaryPolicy;
use crate::error::{Error, Result};
use crate::model::{ModelError, TextModel};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

/// A chapter name with its generated summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterSummary {
    pub name: String,
    pub summary: String,
}

/// Build the summarisation prompt for one chapter.
///
/// The note about harmful-looking content keeps the model from refusing
/// fiction with violence or similar themes.
pub fn summary_prompt(text: &str, word_limit: u32) -> String {
    format!(
        "Below is a chapter from a story, summarize it in up to {word_limit} words. \
         Since this is a story, the content may look harmful but it is OK to proceed.\n\n{text}"
    )
}

pub struct Summarizer<M> {
    model: Arc<M>,
    word_limit: u32,
    concurrency: usize,
    on_failure: FailedSummaryPolicy,
}

impl<M> Summarizer<M>
where
    M: TextModel + Send + Sync + 'static,
{
    /// Sequential summariser that aborts on the first failure
    pub fn new(model: Arc<M>, word_limit: u32) -> Self {
        Self {
            model,
            word_limit,
            concurrency: 1,
            on_failure: FailedSummaryPolicy::Abort,
        }
    }

    /// Allow up to `concurrency` chapters in flight (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_failure_policy(mut self, on_failure: FailedSummaryPolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    /// Summarise a single chapter's text
    pub async fn summarize(&self, text: &str) -> std::result::Result<String, ModelError> {
        request_summary(self.model.as_ref(), &summary_prompt(text, self.word_limit)).await
    }

    /// Summarise every chapter, returning summaries in input order.
    ///
    /// With a concurrency of one, chapters run strictly one after another.
    /// Under the abort policy no new chapter is started once one has failed,
    /// and the error reported is the earliest failing chapter.
    pub async fn summarize_all(&self, chapters: Vec<ChapterText>) -> Result<Vec<ChapterSummary>> {
        let names: Vec<String> = chapters.iter().map(|c| c.name.clone()).collect();
        let mut outcomes: Vec<Option<Outcome>> = (0..chapters.len()).map(|_| None).collect();

        if self.concurrency == 1 {
            for (index, chapter) in chapters.iter().enumerate() {
                info!(chapter = %chapter.name, "Summarizing chapter");
                let outcome = self.summarize(&chapter.text).await;
                let stop = outcome.is_err() && self.on_failure == FailedSummaryPolicy::Abort;
                outcomes[index] = Some(outcome);
                if stop {
                    break;
                }
            }
        } else {
            self.summarize_pooled(chapters, &mut outcomes).await?;
        }

        let mut summaries = Vec::with_capacity(names.len());
        for (name, outcome) in names.into_iter().zip(outcomes) {
            // Chapters never started only follow an earlier failure, which returns first
            let Some(outcome) = outcome else {
                continue;
            };
            let summary = match outcome {
                Ok(summary) => summary,
                Err(err) if self.on_failure == FailedSummaryPolicy::Placeholder => {
                    warn!(chapter = %name, error = %err, "Using placeholder summary");
                    placeholder(&err)
                }
                Err(source) => {
                    return Err(Error::ModelCallFailure {
                        context: format!("chapter '{name}'"),
                        source,
                    })
                }
            };
            summaries.push(ChapterSummary { name, summary });
        }
        Ok(summaries)
    }

    async fn summarize_pooled(
        &self,
        chapters: Vec<ChapterText>,
        outcomes: &mut [Option<Outcome>],
    ) -> Result<()> {
        let abort = self.on_failure == FailedSummaryPolicy::Abort;
        let permits = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, chapter) in chapters.into_iter().enumerate() {
            // Taking the permit before spawning starts calls in chapter order
            let Ok(permit) = Arc::clone(&permits).acquire_owned().await else {
                break;
            };
            while let Some(joined) = tasks.try_join_next() {
                let (done, outcome) = joined?;
                outcomes[done] = Some(outcome);
            }
            if abort && outcomes.iter().flatten().any(|o| o.is_err()) {
                break;
            }

            let model = Arc::clone(&self.model);
            let prompt = summary_prompt(&chapter.text, self.word_limit);
            let name = chapter.name;
            tasks.spawn(async move {
                let _permit = permit;
                info!(chapter = %name, "Summarizing chapter");
                (index, request_summary(model.as_ref(), &prompt).await)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            let (done, outcome) = joined?;
            outcomes[done] = Some(outcome);
        }
        Ok(())
    }
}

type Outcome = std::result::Result<String, ModelError>;

/// An empty reply is how refusals usually show up
async fn request_summary<M: TextModel>(
    model: &M,
    prompt: &str,
) -> std::result::Result<String, ModelError> {
    let reply = model.generate(prompt).await?;
    if reply.trim().is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(reply.trim().to_string())
}

fn placeholder(err: &ModelError) -> String {
    format!("_Summary unavailable: {err}_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Replies with the chapter text upper-cased; text "fail" errors, "blank" replies empty.
    /// A leading number in the text is a delay in milliseconds.
    #[derive(Default)]
    struct Shouting {
        prompts: Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
    }

    impl TextModel for Shouting {
        async fn generate(&self, prompt: &str) -> std::result::Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let text = prompt.split_once("\n\n").map(|(_, t)| t).unwrap_or("");
            let delay = text
                .split_whitespace()
                .next()
                .and_then(|w| w.parse().ok())
                .unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            match text {
                "fail" => Err(ModelError::RequestFailed("boom".to_string())),
                "blank" => Ok("  \n".to_string()),
                _ => Ok(text.to_uppercase()),
            }
        }
    }

    fn chapters(texts: &[&str]) -> Vec<ChapterText> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| ChapterText {
                name: format!("Ch{}", i + 1),
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn prompt_carries_limit_and_disclaimer() {
        let prompt = summary_prompt("Once upon a time.", 250);
        assert!(prompt.starts_with("Below is a chapter from a story, summarize it in up to 250 words."));
        assert!(prompt.contains("it is OK to proceed"));
        assert!(prompt.ends_with("\n\nOnce upon a time."));
    }

    #[tokio::test]
    async fn every_chapter_gets_the_same_limit() {
        let model = Arc::new(Shouting::default());
        let summarizer = Summarizer::new(Arc::clone(&model), 42);

        summarizer
            .summarize_all(chapters(&["a", "b", "c"]))
            .await
            .unwrap();

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 3);
        assert!(prompts.iter().all(|p| p.contains("in up to 42 words.")));
    }

    #[tokio::test]
    async fn results_follow_chapter_order_not_completion_order() {
        let model = Arc::new(Shouting::default());
        let summarizer = Summarizer::new(model, 300).with_concurrency(3);

        let summaries = summarizer
            .summarize_all(chapters(&["60 first", "30 second", "0 third"]))
            .await
            .unwrap();

        assert_eq!(
            summaries,
            vec![
                ChapterSummary {
                    name: "Ch1".to_string(),
                    summary: "60 FIRST".to_string()
                },
                ChapterSummary {
                    name: "Ch2".to_string(),
                    summary: "30 SECOND".to_string()
                },
                ChapterSummary {
                    name: "Ch3".to_string(),
                    summary: "0 THIRD".to_string()
                },
            ]
        );
    }

    #[tokio::test]
    async fn concurrency_is_bounded() {
        let model = Arc::new(Shouting::default());
        let summarizer = Summarizer::new(Arc::clone(&model), 300).with_concurrency(2);

        summarizer
            .summarize_all(chapters(&["20 a", "20 b", "20 c", "20 d", "20 e"]))
            .await
            .unwrap();

        assert_eq!(model.prompts.lock().unwrap().len(), 5);
        assert!(model.max_in_flight.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failure_aborts_and_names_the_chapter() {
        let summarizer = Summarizer::new(Arc::new(Shouting::default()), 300);

        let err = summarizer
            .summarize_all(chapters(&["ok", "fail"]))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::ModelCallFailure { context, source: ModelError::RequestFailed(_) }
                if context == "chapter 'Ch2'"
        ));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn sequential_calls_follow_chapter_order() {
        let model = Arc::new(Shouting::default());
        let summarizer = Summarizer::new(Arc::clone(&model), 300);
        let texts: Vec<String> = (0..40).map(|i| format!("chapter {i}")).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();

        summarizer.summarize_all(chapters(&texts)).await.unwrap();

        let seen: Vec<String> = model
            .prompts
            .lock()
            .unwrap()
            .iter()
            .map(|p| p.split_once("\n\n").unwrap().1.to_string())
            .collect();
        assert_eq!(seen, texts);
        assert_eq!(model.max_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn sequential_abort_makes_no_further_calls() {
        let model = Arc::new(Shouting::default());
        let summarizer = Summarizer::new(Arc::clone(&model), 300);

        let err = summarizer
            .summarize_all(chapters(&["ok", "fail", "later", "fail"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ModelCallFailure { context, .. } if context == "chapter 'Ch2'"));
        assert_eq!(model.prompts.lock().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pooled_abort_reports_earliest_failing_chapter() {
        let summarizer = Summarizer::new(Arc::new(Shouting::default()), 300).with_concurrency(3);

        let err = summarizer
            .summarize_all(chapters(&["40 slow", "fail", "fail"]))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ModelCallFailure { context, .. } if context == "chapter 'Ch2'"));
    }

    #[tokio::test]
    async fn empty_reply_counts_as_failure() {
        let summarizer = Summarizer::new(Arc::new(Shouting::default()), 300);
        let err = summarizer.summarize("blank").await.unwrap_err();
        assert!(matches!(err, ModelError::EmptyResponse));
    }

    #[tokio::test]
    async fn placeholder_policy_keeps_the_chapter() {
        let summarizer = Summarizer::new(Arc::new(Shouting::default()), 300)
            .with_failure_policy(FailedSummaryPolicy::Placeholder);

        let summaries = summarizer
            .summarize_all(chapters(&["ok", "blank", "done"]))
            .await
            .unwrap();

        assert_eq!(summaries.len(), 3);
        assert_eq!(summaries[0].summary, "OK");
        assert!(summaries[1].summary.starts_with("_Summary unavailable"));
        assert_eq!(summaries[2].summary, "DONE");
    }

    #[tokio::test]
    async fn no_chapters_no_calls() {
        let model = Arc::new(Shouting::default());
        let summaries = Summarizer::new(Arc::clone(&model), 300)
            .summarize_all(Vec::new())
            .await
            .unwrap();

        assert!(summaries.is_empty());
        assert!(model.prompts.lock().unwrap().is_empty());
    }
}
