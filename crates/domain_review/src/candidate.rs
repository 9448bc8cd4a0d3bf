//! Duplicate charge candidates
//!
//! An incoming charge that collides with an already-billed item on
//! (organization, accession number, CPT code) is held here instead of
//! entering billing. Review is the only path back into billing data.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use core_kernel::{ActorId, CandidateId, Money, OrganizationId};

/// The collision key duplicate detection matches on
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DuplicateKey {
    pub organization_id: OrganizationId,
    pub accession_number: String,
    pub cpt_code: String,
}

impl DuplicateKey {
    pub fn new(
        organization_id: OrganizationId,
        accession_number: impl Into<String>,
        cpt_code: impl Into<String>,
    ) -> Self {
        Self {
            organization_id,
            accession_number: accession_number.into(),
            cpt_code: cpt_code.into(),
        }
    }
}

impl fmt::Display for DuplicateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.organization_id, self.accession_number, self.cpt_code
        )
    }
}

/// Review state of a candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pending,
    Approved,
    Rejected,
}

impl CandidateStatus {
    /// Returns the status name as stored in the database
    pub fn as_str(&self) -> &'static str {
        match self {
            CandidateStatus::Pending => "pending",
            CandidateStatus::Approved => "approved",
            CandidateStatus::Rejected => "rejected",
        }
    }

    /// Parses a stored status name
    pub fn parse(s: &str) -> Option<CandidateStatus> {
        match s {
            "pending" => Some(CandidateStatus::Pending),
            "approved" => Some(CandidateStatus::Approved),
            "rejected" => Some(CandidateStatus::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for CandidateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A flagged duplicate charge awaiting review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateCandidate {
    /// Unique identifier
    pub id: CandidateId,
    /// The collision key
    pub key: DuplicateKey,
    /// Date of service on the incoming charge
    pub service_date: NaiveDate,
    /// Price and quantity of the incoming charge
    pub unit_price: Money,
    pub quantity: Decimal,
    /// Review state; pending until a reviewer decides
    pub status: CandidateStatus,
    /// The override reason recorded on approval
    pub override_reason: Option<String>,
    /// Who decided, and when
    pub reviewed_by: Option<ActorId>,
    pub reviewed_at: Option<DateTime<Utc>>,
    /// When the charge was flagged
    pub created_at: DateTime<Utc>,
}

impl DuplicateCandidate {
    /// Flags a new candidate as pending review
    pub fn flag(
        key: DuplicateKey,
        service_date: NaiveDate,
        unit_price: Money,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: CandidateId::new_v7(),
            key,
            service_date,
            unit_price,
            quantity,
            status: CandidateStatus::Pending,
            override_reason: None,
            reviewed_by: None,
            reviewed_at: None,
            created_at: Utc::now(),
        }
    }

    /// True while awaiting a decision
    pub fn is_pending(&self) -> bool {
        self.status == CandidateStatus::Pending
    }
}
