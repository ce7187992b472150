use crate::types::DbId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Insufficient paid balance: {available} available, {requested} requested")]
    InsufficientBalance { available: i64, requested: i64 },

    #[error("Stale state: {entity} with id {id} was modified concurrently")]
    StaleState { entity: &'static str, id: DbId },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
