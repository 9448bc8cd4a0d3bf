//! Review domain errors

use thiserror::Error;

/// Errors that can occur in the duplicate review domain
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Candidate not found: {0}")]
    CandidateNotFound(String),

    #[error("An override reason is required to approve a duplicate charge")]
    MissingOverrideReason,

    #[error("Candidate already reviewed: {0}")]
    AlreadyReviewed(String),
}
