use thiserror::Error;

/// Conditions that stop a resolution (or the delivery of its result) as a whole.
///
/// Failures that only concern a single file, directory or reference are not errors in this sense,
/// they are collected into a [`report::ResolutionReport`] instead.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Resolution {generation} was superseded by a newer drop (current generation {current})")]
    Superseded { generation: u64, current: u64 },

    #[error("The scene parser rejected the scene, because: {reason}")]
    ParserError { reason: String },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error(transparent)]
    UTF8ConversationError(#[from] std::string::FromUtf8Error),

    #[error(transparent)]
    JsonError(#[from] serde_json::Error),
}

pub mod coordinator;
pub mod entry;
pub mod manifest;
pub mod materializer;
pub mod report;
pub mod resource;
pub mod rewriter;
pub mod role;
pub mod scene;
