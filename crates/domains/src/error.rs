//! # ForumError
//!
//! Centralized error handling for the peerforum core.
//! Absent subscription rows are not errors; they resolve to defaults.

use thiserror::Error;

/// The primary error type for all domain and service operations.
#[derive(Error, Debug)]
pub enum ForumError {
    /// Resource not found (e.g., Forum, Discussion)
    #[error("{0} not found with ID {1}")]
    NotFound(String, String),

    /// A stored subscription mode code outside the known set
    #[error("unrecognized subscription mode code {0}")]
    InvalidSubscriptionMode(i32),

    /// Malformed input from the host (e.g., a time window ending before it starts)
    #[error("validation error: {0}")]
    Validation(String),

    /// Failure inside a storage collaborator, passed through untouched
    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

/// A specialized Result type for peerforum logic.
pub type Result<T> = std::result::Result<T, ForumError>;
