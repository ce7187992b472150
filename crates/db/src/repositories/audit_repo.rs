//! Repository for the `payout_audit_log` table.
//!
//! Audit rows are written inside the same transaction as the state change
//! they record, so the trail can never disagree with the data.

use sqlx::{PgConnection, PgPool};

use glowcast_core::types::DbId;

use crate::models::audit::AuditEntry;

/// Column list for `payout_audit_log` queries.
const COLUMNS: &str = "id, request_id, actor_id, action, reason, created_at";

/// Provides insert and query operations for the operator audit trail.
pub struct AuditRepo;

impl AuditRepo {
    /// Append an audit row inside the caller's transaction.
    pub async fn insert_with(
        conn: &mut PgConnection,
        request_id: DbId,
        actor_id: DbId,
        action: &str,
        reason: Option<&str>,
    ) -> Result<AuditEntry, sqlx::Error> {
        let insert = format!(
            "INSERT INTO payout_audit_log (request_id, actor_id, action, reason) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AuditEntry>(&insert)
            .bind(request_id)
            .bind(actor_id)
            .bind(action)
            .bind(reason)
            .fetch_one(&mut *conn)
            .await
    }

    /// Full trail for one request, oldest first.
    pub async fn list_for_request(
        pool: &PgPool,
        request_id: DbId,
    ) -> Result<Vec<AuditEntry>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM payout_audit_log \
             WHERE request_id = $1 ORDER BY id ASC"
        );
        sqlx::query_as::<_, AuditEntry>(&query)
            .bind(request_id)
            .fetch_all(pool)
            .await
    }
}
