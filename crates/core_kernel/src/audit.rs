//! Append-only audit trail
//!
//! Every override and status change in the ledger produces exactly one
//! [`AuditEntry`] in the same unit of work as the triggering mutation.
//! Entries are immutable once written; the trail exposes append and read
//! operations only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::identifiers::{ActorId, AuditEntryId};

/// The kind of entity an audit entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditedEntity {
    Invoice,
    LineItem,
    Credit,
    DuplicateCandidate,
    InvoiceCounter,
}

impl AuditedEntity {
    /// Returns the entity type name as stored in the audit trail
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditedEntity::Invoice => "invoice",
            AuditedEntity::LineItem => "line_item",
            AuditedEntity::Credit => "credit",
            AuditedEntity::DuplicateCandidate => "duplicate_candidate",
            AuditedEntity::InvoiceCounter => "invoice_counter",
        }
    }

    /// Parses a stored entity type name
    pub fn parse(s: &str) -> Option<AuditedEntity> {
        match s {
            "invoice" => Some(AuditedEntity::Invoice),
            "line_item" => Some(AuditedEntity::LineItem),
            "credit" => Some(AuditedEntity::Credit),
            "duplicate_candidate" => Some(AuditedEntity::DuplicateCandidate),
            "invoice_counter" => Some(AuditedEntity::InvoiceCounter),
            _ => None,
        }
    }
}

/// Actions recorded in the audit trail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    StatusChanged,
    RevertedToDraft,
    FieldOverridden,
    PaymentRecorded,
    WriteOffRecorded,
    DisputeOpened,
    DisputeResolved,
    CounterReset,
    CreditCreated,
    CreditApplied,
    CreditExpired,
    CreditCancelled,
    DuplicateApproved,
    DuplicateRejected,
}

impl AuditAction {
    /// Returns the action name as stored in the audit trail
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::StatusChanged => "status_changed",
            AuditAction::RevertedToDraft => "reverted_to_draft",
            AuditAction::FieldOverridden => "field_overridden",
            AuditAction::PaymentRecorded => "payment_recorded",
            AuditAction::WriteOffRecorded => "write_off_recorded",
            AuditAction::DisputeOpened => "dispute_opened",
            AuditAction::DisputeResolved => "dispute_resolved",
            AuditAction::CounterReset => "counter_reset",
            AuditAction::CreditCreated => "credit_created",
            AuditAction::CreditApplied => "credit_applied",
            AuditAction::CreditExpired => "credit_expired",
            AuditAction::CreditCancelled => "credit_cancelled",
            AuditAction::DuplicateApproved => "duplicate_approved",
            AuditAction::DuplicateRejected => "duplicate_rejected",
        }
    }

    /// Parses a stored action name
    pub fn parse(s: &str) -> Option<AuditAction> {
        match s {
            "status_changed" => Some(AuditAction::StatusChanged),
            "reverted_to_draft" => Some(AuditAction::RevertedToDraft),
            "field_overridden" => Some(AuditAction::FieldOverridden),
            "payment_recorded" => Some(AuditAction::PaymentRecorded),
            "write_off_recorded" => Some(AuditAction::WriteOffRecorded),
            "dispute_opened" => Some(AuditAction::DisputeOpened),
            "dispute_resolved" => Some(AuditAction::DisputeResolved),
            "counter_reset" => Some(AuditAction::CounterReset),
            "credit_created" => Some(AuditAction::CreditCreated),
            "credit_applied" => Some(AuditAction::CreditApplied),
            "credit_expired" => Some(AuditAction::CreditExpired),
            "credit_cancelled" => Some(AuditAction::CreditCancelled),
            "duplicate_approved" => Some(AuditAction::DuplicateApproved),
            "duplicate_rejected" => Some(AuditAction::DuplicateRejected),
            _ => None,
        }
    }
}

/// A single immutable audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier
    pub id: AuditEntryId,
    /// Who performed the action
    pub actor_id: ActorId,
    /// What was done
    pub action: AuditAction,
    /// Kind of entity acted on
    pub entity_type: AuditedEntity,
    /// Identifier of the entity acted on (display form)
    pub entity_id: String,
    /// Structured details (old/new values, amounts, duplicate keys)
    pub details: serde_json::Value,
    /// Human-supplied reason, mandatory for overrides
    pub reason: Option<String>,
    /// When the entry was recorded
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Creates a new audit entry
    pub fn new(
        actor_id: ActorId,
        action: AuditAction,
        entity_type: AuditedEntity,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: AuditEntryId::new_v7(),
            actor_id,
            action,
            entity_type,
            entity_id: entity_id.into(),
            details: serde_json::Value::Null,
            reason: None,
            recorded_at: Utc::now(),
        }
    }

    /// Attaches structured details
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    /// Attaches a reason
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// An in-memory append-only audit trail
///
/// Domain services append to this trail in the same operation that performs
/// the business mutation. The durable adapter persists entries inside the
/// same database transaction as the triggering change.
#[derive(Debug, Default)]
pub struct AuditTrail {
    entries: Vec<AuditEntry>,
}

impl AuditTrail {
    /// Creates an empty trail
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry, returning its identifier
    pub fn append(&mut self, entry: AuditEntry) -> AuditEntryId {
        let id = entry.id;
        self.entries.push(entry);
        id
    }

    /// Returns all entries in insertion order
    pub fn entries(&self) -> &[AuditEntry] {
        &self.entries
    }

    /// Returns entries for a specific entity
    pub fn for_entity(&self, entity_type: AuditedEntity, entity_id: &str) -> Vec<&AuditEntry> {
        self.entries
            .iter()
            .filter(|e| e.entity_type == entity_type && e.entity_id == entity_id)
            .collect()
    }

    /// Number of entries recorded
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entries have been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
