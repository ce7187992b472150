//! Operator audit trail model.

use serde::Serialize;
use sqlx::FromRow;

use glowcast_core::types::{DbId, Timestamp};

/// A row from `payout_audit_log`: who did what to a request, when, and why.
///
/// Written in the same transaction as the state change it records.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AuditEntry {
    pub id: DbId,
    pub request_id: DbId,
    pub actor_id: DbId,
    pub action: String,
    pub reason: Option<String>,
    pub created_at: Timestamp,
}
