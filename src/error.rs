//! Error types for a summarisation run.

use crate::epub::CorpusError;
use crate::model::ModelError;
use thiserror::Error;

/// Errors that stop a run (or, depending on policy, a single chapter).
#[derive(Error, Debug)]
pub enum Error {
    #[error("model returned unusable chapter list ({reason}): {raw}")]
    MalformedModelOutput { reason: String, raw: String },

    #[error("chapter '{chapter}' references unknown document '{document}'")]
    DocumentNotFound { chapter: String, document: String },

    #[error("model call failed for {context}: {source}")]
    ModelCallFailure {
        context: String,
        #[source]
        source: ModelError,
    },

    #[error("failed to read book: {0}")]
    CorpusReadFailure(#[from] CorpusError),

    #[error("summary task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, Error>;
