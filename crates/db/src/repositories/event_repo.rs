//! Repository for the `events` table (the engine's change log).

use sqlx::PgPool;

use glowcast_core::types::DbId;

use crate::models::event::StoredEvent;

/// Column list for `events` queries.
const COLUMNS: &str = "\
    id, event_type, source_entity_type, source_entity_id, actor_user_id, \
    payload, created_at";

/// Provides append and cursor-based read operations for platform events.
pub struct EventRepo;

impl EventRepo {
    /// Append one event row.
    pub async fn insert(
        pool: &PgPool,
        event_type: &str,
        source_entity_type: Option<&str>,
        source_entity_id: Option<DbId>,
        actor_user_id: Option<DbId>,
        payload: &serde_json::Value,
    ) -> Result<StoredEvent, sqlx::Error> {
        let insert = format!(
            "INSERT INTO events \
                 (event_type, source_entity_type, source_entity_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, StoredEvent>(&insert)
            .bind(event_type)
            .bind(source_entity_type)
            .bind(source_entity_id)
            .bind(actor_user_id)
            .bind(payload)
            .fetch_one(pool)
            .await
    }

    /// Events strictly after a change-log cursor, oldest first.
    pub async fn since(
        pool: &PgPool,
        after_id: DbId,
        limit: i64,
    ) -> Result<Vec<StoredEvent>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events WHERE id > $1 ORDER BY id ASC LIMIT $2"
        );
        sqlx::query_as::<_, StoredEvent>(&query)
            .bind(after_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    /// Newest event id, used as the snapshot version for cached views.
    pub async fn latest_id(pool: &PgPool) -> Result<DbId, sqlx::Error> {
        let (id,): (i64,) = sqlx::query_as("SELECT COALESCE(MAX(id), 0) FROM events")
            .fetch_one(pool)
            .await?;
        Ok(id)
    }
}
