//! Duplicate Review Domain - human-in-the-loop duplicate charge approval
//!
//! Charges colliding on (organization, accession number, CPT code) with
//! already-billed items are flagged for review instead of billed. Nothing
//! in this crate blocks on the reviewer; the decision arrives as a separate
//! request.

pub mod candidate;
pub mod error;
pub mod queue;

pub use candidate::{CandidateStatus, DuplicateCandidate, DuplicateKey};
pub use error::ReviewError;
pub use queue::{ApprovedCharge, ReviewQueue};
