//! Row store error types.

use std::path::PathBuf;

use thiserror::Error;

use crate::error::{Effect, Transience};

/// Errors that can occur talking to the data repository.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("failed to open repository at {}: {}", .0.display(), .1)]
    OpenRepo(PathBuf, #[source] git2::Error),

    #[error("ref not found: {0}")]
    NoRef(String),

    #[error("missing file in tree: {0}")]
    MissingFile(String),

    #[error("expected blob at {0}")]
    NotABlob(String),

    #[error("failed to parse {file}: {source}")]
    Parse {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to render {file}: {source}")]
    Render {
        file: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to write blob: {0}")]
    WriteBlob(#[source] git2::Error),

    #[error("failed to build tree: {0}")]
    BuildTree(#[source] git2::Error),

    #[error("failed to create commit: {0}")]
    Commit(#[source] git2::Error),

    #[error("failed to push: {0}")]
    Push(#[source] git2::Error),

    #[error("commit rejected: {0}")]
    CommitRejected(String),

    #[error("git operation failed: {0}")]
    Git(#[from] git2::Error),
}

impl StoreError {
    /// Whether retrying the operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            StoreError::Commit(_)
            | StoreError::Push(_)
            | StoreError::CommitRejected(_) => Transience::Retryable,

            StoreError::OpenRepo(_, _)
            | StoreError::NoRef(_)
            | StoreError::MissingFile(_)
            | StoreError::NotABlob(_)
            | StoreError::Parse { .. }
            | StoreError::Render { .. }
            | StoreError::WriteBlob(_)
            | StoreError::BuildTree(_) => Transience::Permanent,

            StoreError::Git(_) => Transience::Unknown,
        }
    }

    /// What we know about persisted side effects when this error surfaced.
    pub fn effect(&self) -> Effect {
        match self {
            // Push happens after the local commit landed.
            StoreError::Push(_) => Effect::Some,
            StoreError::Git(_) => Effect::Unknown,
            _ => Effect::None,
        }
    }
}
