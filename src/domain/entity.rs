//! Domain Layer - Core Entity Trait
//!
//! This trait defines the basic contract for all domain entities.
//! All entities must have a unique ID and be thread-safe.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Core trait for all domain entities
pub trait Entity: Sized + Send + Sync + Clone {
    /// The type of the entity's unique identifier
    type Id: Copy + Eq + std::hash::Hash + Send + Sync;

    /// Returns the entity's unique identifier
    fn id(&self) -> Self::Id;
}

/// Common result type for domain operations
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level errors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Error)]
pub enum DomainError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Invalid range: previous rank {prev:?} must be below next rank {next:?}")]
    InvalidRange { prev: Option<f64>, next: Option<f64> },
    #[error("Rank collision: {0}")]
    RankCollision(String),
    #[error("Normalization failed: {0}")]
    NormalizationFailure(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DomainError {
    /// Errors the caller may retry with freshly read neighbors
    pub fn is_transient(&self) -> bool {
        matches!(self, DomainError::RankCollision(_))
    }

    /// Errors caused by the request itself rather than the store
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DomainError::NotFound(_) | DomainError::InvalidInput(_) | DomainError::InvalidRange { .. }
        )
    }
}
