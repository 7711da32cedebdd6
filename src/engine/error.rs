//! Mutation operation errors.

use thiserror::Error;

use super::builder::BuildError;
use crate::core::SoftwareId;
use crate::error::{Effect, Transience};

#[derive(Error, Debug)]
#[non_exhaustive]
pub enum OpError {
    #[error("software not found: {0}")]
    SoftwareNotFound(SoftwareId),

    #[error("{email} is not a referent of any software")]
    NotAReferent { email: String },

    #[error("a software with the normalized name {normalized} is already referenced")]
    NameConflict { name: String, normalized: String },

    /// The commit landed but the recomputed catalog is missing the entry.
    #[error("software {0} missing from recomputed catalog")]
    MissingCompiledEntry(SoftwareId),

    #[error("validation failed for field {field}: {reason}")]
    ValidationFailed { field: String, reason: String },

    #[error(transparent)]
    Build(#[from] BuildError),
}

impl OpError {
    /// Whether retrying this operation may succeed.
    pub fn transience(&self) -> Transience {
        match self {
            OpError::SoftwareNotFound(_)
            | OpError::NotAReferent { .. }
            | OpError::NameConflict { .. }
            | OpError::MissingCompiledEntry(_)
            | OpError::ValidationFailed { .. } => Transience::Permanent,
            OpError::Build(_) => Transience::Unknown,
        }
    }

    /// What we know about side effects when this error is returned.
    pub fn effect(&self) -> Effect {
        match self {
            // These two surface after the commit was persisted.
            OpError::MissingCompiledEntry(_) | OpError::Build(_) => Effect::Some,
            _ => Effect::None,
        }
    }
}
