//! The duplicate review queue
//!
//! Approval is the only path by which a flagged duplicate becomes a
//! billable charge, and it always carries the reviewer's reason. A
//! rejected candidate is permanently excluded; correction means
//! resubmitting as a new candidate.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use tracing::info;

use core_kernel::{
    ActorId, AuditAction, AuditEntry, AuditTrail, AuditedEntity, CandidateId, Money,
};
use domain_invoicing::InvoiceLineItem;

use crate::candidate::{CandidateStatus, DuplicateCandidate, DuplicateKey};
use crate::error::ReviewError;

/// A charge released into billing by an approval
///
/// Carries the override flag and reason so the resulting line item is
/// permanently distinguishable from a normally-entered charge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovedCharge {
    pub candidate_id: CandidateId,
    pub key: DuplicateKey,
    pub service_date: NaiveDate,
    pub unit_price: Money,
    pub quantity: Decimal,
    pub override_reason: String,
}

impl ApprovedCharge {
    /// Builds the line item to insert into billing, flagged as an override
    pub fn into_line_item(self) -> InvoiceLineItem {
        InvoiceLineItem::new(
            self.key.accession_number,
            self.key.cpt_code,
            self.quantity,
            self.unit_price,
        )
        .flagged_as_override()
    }
}

/// The review queue service
#[derive(Debug, Default)]
pub struct ReviewQueue {
    candidates: HashMap<CandidateId, DuplicateCandidate>,
}

impl ReviewQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Flags an incoming charge that collided with billed data
    pub fn flag(
        &mut self,
        key: DuplicateKey,
        service_date: NaiveDate,
        unit_price: Money,
        quantity: Decimal,
    ) -> CandidateId {
        let candidate = DuplicateCandidate::flag(key, service_date, unit_price, quantity);
        let id = candidate.id;
        info!(candidate_id = %id, key = %candidate.key, "duplicate charge flagged");
        self.candidates.insert(id, candidate);
        id
    }

    /// Looks up a candidate
    pub fn candidate(&self, id: CandidateId) -> Option<&DuplicateCandidate> {
        self.candidates.get(&id)
    }

    /// All candidates still awaiting review
    pub fn pending(&self) -> Vec<&DuplicateCandidate> {
        self.candidates.values().filter(|c| c.is_pending()).collect()
    }

    /// Approves a flagged duplicate for billing
    ///
    /// Fails with `MissingOverrideReason` when the reason is empty. Writes
    /// exactly one audit entry capturing the duplicate key and the reason,
    /// and returns the charge to insert into billing data.
    pub fn approve(
        &mut self,
        candidate_id: CandidateId,
        reviewer: ActorId,
        reason: &str,
        trail: &mut AuditTrail,
    ) -> Result<ApprovedCharge, ReviewError> {
        if reason.trim().is_empty() {
            return Err(ReviewError::MissingOverrideReason);
        }
        let candidate = self
            .candidates
            .get_mut(&candidate_id)
            .ok_or_else(|| ReviewError::CandidateNotFound(candidate_id.to_string()))?;
        if !candidate.is_pending() {
            return Err(ReviewError::AlreadyReviewed(candidate.status.to_string()));
        }

        candidate.status = CandidateStatus::Approved;
        candidate.override_reason = Some(reason.to_string());
        candidate.reviewed_by = Some(reviewer);
        candidate.reviewed_at = Some(Utc::now());

        trail.append(
            AuditEntry::new(
                reviewer,
                AuditAction::DuplicateApproved,
                AuditedEntity::DuplicateCandidate,
                candidate_id.to_string(),
            )
            .with_details(json!({
                "organization_id": candidate.key.organization_id.to_string(),
                "accession_number": candidate.key.accession_number,
                "cpt_code": candidate.key.cpt_code,
                "service_date": candidate.service_date,
            }))
            .with_reason(reason),
        );

        Ok(ApprovedCharge {
            candidate_id,
            key: candidate.key.clone(),
            service_date: candidate.service_date,
            unit_price: candidate.unit_price,
            quantity: candidate.quantity,
            override_reason: reason.to_string(),
        })
    }

    /// Rejects a flagged duplicate, permanently excluding it
    pub fn reject(
        &mut self,
        candidate_id: CandidateId,
        reviewer: ActorId,
        trail: &mut AuditTrail,
    ) -> Result<(), ReviewError> {
        let candidate = self
            .candidates
            .get_mut(&candidate_id)
            .ok_or_else(|| ReviewError::CandidateNotFound(candidate_id.to_string()))?;
        if !candidate.is_pending() {
            return Err(ReviewError::AlreadyReviewed(candidate.status.to_string()));
        }

        candidate.status = CandidateStatus::Rejected;
        candidate.reviewed_by = Some(reviewer);
        candidate.reviewed_at = Some(Utc::now());

        trail.append(
            AuditEntry::new(
                reviewer,
                AuditAction::DuplicateRejected,
                AuditedEntity::DuplicateCandidate,
                candidate_id.to_string(),
            )
            .with_details(json!({
                "accession_number": candidate.key.accession_number,
                "cpt_code": candidate.key.cpt_code,
            })),
        );
        Ok(())
    }

    /// Approves a batch of candidates, each independently
    ///
    /// One failure never blocks or rolls back the others; the caller gets a
    /// per-item result list in input order.
    pub fn approve_batch(
        &mut self,
        candidate_ids: &[CandidateId],
        reviewer: ActorId,
        reason: &str,
        trail: &mut AuditTrail,
    ) -> Vec<(CandidateId, Result<ApprovedCharge, ReviewError>)> {
        candidate_ids
            .iter()
            .map(|id| (*id, self.approve(*id, reviewer, reason, trail)))
            .collect()
    }

    /// Rejects a batch of candidates, each independently
    pub fn reject_batch(
        &mut self,
        candidate_ids: &[CandidateId],
        reviewer: ActorId,
        trail: &mut AuditTrail,
    ) -> Vec<(CandidateId, Result<(), ReviewError>)> {
        candidate_ids
            .iter()
            .map(|id| (*id, self.reject(*id, reviewer, trail)))
            .collect()
    }
}
