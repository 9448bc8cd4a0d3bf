//! Tests for the append-only audit trail

use core_kernel::{ActorId, AuditAction, AuditEntry, AuditTrail, AuditedEntity, InvoiceId};
use serde_json::json;

#[test]
fn test_append_returns_entry_id() {
    let mut trail = AuditTrail::new();
    let entry = AuditEntry::new(
        ActorId::new(),
        AuditAction::StatusChanged,
        AuditedEntity::Invoice,
        InvoiceId::new().to_string(),
    );
    let id = entry.id;

    assert_eq!(trail.append(entry), id);
    assert_eq!(trail.len(), 1);
}

#[test]
fn test_entries_preserve_insertion_order() {
    let mut trail = AuditTrail::new();
    let actor = ActorId::new();
    let invoice_id = InvoiceId::new().to_string();

    trail.append(AuditEntry::new(
        actor,
        AuditAction::StatusChanged,
        AuditedEntity::Invoice,
        invoice_id.clone(),
    ));
    trail.append(AuditEntry::new(
        actor,
        AuditAction::PaymentRecorded,
        AuditedEntity::Invoice,
        invoice_id,
    ));

    let actions: Vec<_> = trail.entries().iter().map(|e| e.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::StatusChanged, AuditAction::PaymentRecorded]
    );
}

#[test]
fn test_for_entity_filters_by_type_and_id() {
    let mut trail = AuditTrail::new();
    let actor = ActorId::new();
    let invoice_a = InvoiceId::new().to_string();
    let invoice_b = InvoiceId::new().to_string();

    trail.append(AuditEntry::new(
        actor,
        AuditAction::StatusChanged,
        AuditedEntity::Invoice,
        invoice_a.clone(),
    ));
    trail.append(AuditEntry::new(
        actor,
        AuditAction::StatusChanged,
        AuditedEntity::Invoice,
        invoice_b,
    ));
    trail.append(AuditEntry::new(
        actor,
        AuditAction::CreditCreated,
        AuditedEntity::Credit,
        invoice_a.clone(),
    ));

    let entries = trail.for_entity(AuditedEntity::Invoice, &invoice_a);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::StatusChanged);
}

#[test]
fn test_builder_attaches_details_and_reason() {
    let entry = AuditEntry::new(
        ActorId::new(),
        AuditAction::FieldOverridden,
        AuditedEntity::Invoice,
        "INV-1",
    )
    .with_details(json!({ "field": "unit_price" }))
    .with_reason("pricing correction");

    assert_eq!(entry.details["field"], "unit_price");
    assert_eq!(entry.reason.as_deref(), Some("pricing correction"));
}
