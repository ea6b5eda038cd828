//! # esum
//!
//! Chapter-by-chapter summaries of EPUB books using LLMs.
//!
//! ## Pipeline
//!
//! - **Chapter boundaries**: the model reads the book's navigation and spine and groups
//!   spine documents into chapters
//! - **Assembly**: the plain text of each chapter's documents is concatenated
//! - **Summaries**: one model call per chapter, optionally several at once
//! - **Report**: a Markdown document with one `##` section per chapter
//!
//! The model is any [`TextModel`]; the CLI uses Gemini via rstructor.

pub mod assemble;
pub mod chapters;
pub mod config;
pub mod corpus;
pub mod epub;
pub mod error;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod summarize;

pub use chapters::Chapter;
pub use config::Config;
pub use corpus::{Corpus, Document};
pub use epub::EpubBook;
pub use error::{Error, Result};
pub use model::{GeminiTextModel, RetryPolicy, RetryingModel, TextModel};
pub use pipeline::Pipeline;
pub use report::Report;
pub use summarize::ChapterSummary;
