//! Engine error taxonomy.
//!
//! Every cycle reports failure as an [`EngineError`] value instead of
//! panicking, so a scheduler can log the failure and move on to its next
//! cycle. Nothing in the engine retries; [`EngineError::is_retryable`] tells
//! the caller whether retrying the whole cycle makes sense.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::GenerationError;
use crate::store::StoreError;
use crate::types::ContentKind;

/// Errors a cycle can end with.
#[derive(Debug, Error)]
pub enum EngineError {
    /// No personas or communities to act on.
    #[error("No personas or communities found. Seed the registry first.")]
    EmptyRegistry,

    /// Nothing of the drawn kind exists to vote on.
    #[error("No {0}s found to vote on")]
    NoTargets(ContentKind),

    /// The generator's text did not satisfy the structured-output contract.
    #[error("Generated text does not match the {contract} contract: {reason}")]
    MalformedGeneration {
        contract: &'static str,
        reason: String,
    },

    /// The generator did not answer within the allotted time.
    #[error("Generation timed out after {0:?}")]
    GenerationTimeout(Duration),

    /// The generator itself reported an error.
    #[error("Generation failed: {0}")]
    GenerationFailed(#[from] GenerationError),

    /// The store rejected an operation.
    #[error("Store failure: {0}")]
    StoreFailure(#[from] StoreError),
}

/// Flat, serializable discriminant of [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    EmptyRegistry,
    NoTargets,
    MalformedGeneration,
    GenerationTimeout,
    GenerationFailed,
    StoreFailure,
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyRegistry => ErrorKind::EmptyRegistry,
            Self::NoTargets(_) => ErrorKind::NoTargets,
            Self::MalformedGeneration { .. } => ErrorKind::MalformedGeneration,
            Self::GenerationTimeout(_) => ErrorKind::GenerationTimeout,
            Self::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Self::StoreFailure(_) => ErrorKind::StoreFailure,
        }
    }

    /// Whether re-running the same cycle can succeed without anyone seeding
    /// data first.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::EmptyRegistry | ErrorKind::NoTargets => false,
            ErrorKind::MalformedGeneration
            | ErrorKind::GenerationTimeout
            | ErrorKind::GenerationFailed
            | ErrorKind::StoreFailure => true,
        }
    }

    pub(crate) fn malformed(contract: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedGeneration {
            contract,
            reason: reason.into(),
        }
    }
}
