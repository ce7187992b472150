//! Repository for yearly 1099 threshold records.
//!
//! Two historical storage shapes exist for this data. Early deployments
//! used `creator_payout_totals` (v1); the current schema is
//! `threshold_records` (v2). Rather than try/catch per call, the repo
//! probes `information_schema` once at startup and binds one adapter for
//! the life of the process.
//!
//! Updates are additive (`total += amount`), never recomputed from
//! scratch, so partial reprocessing of a run cannot double count. The
//! `requires_1099` flag latches in SQL (`requires_1099 OR new_total >=
//! threshold`) and is never cleared, even by downward corrections.

use sqlx::{PgConnection, PgPool};

use glowcast_core::threshold::REPORTING_THRESHOLD_CENTS;
use glowcast_core::types::DbId;

use crate::models::threshold::ThresholdRecord;

/// Which storage shape this deployment carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSchema {
    /// Legacy `creator_payout_totals` table.
    V1Legacy,
    /// Current `threshold_records` table.
    V2,
}

impl ThresholdSchema {
    /// Capability probe: prefer v2 when present, fall back to v1.
    pub async fn detect(pool: &PgPool) -> Result<Self, sqlx::Error> {
        let (v2_exists,): (bool,) = sqlx::query_as(
            "SELECT EXISTS ( \
                 SELECT 1 FROM information_schema.tables \
                 WHERE table_schema = 'public' AND table_name = 'threshold_records' \
             )",
        )
        .fetch_one(pool)
        .await?;

        if v2_exists {
            Ok(ThresholdSchema::V2)
        } else {
            tracing::warn!("threshold_records not found, using legacy creator_payout_totals");
            Ok(ThresholdSchema::V1Legacy)
        }
    }
}

/// Column list for v2 `threshold_records` reads.
const V2_COLUMNS: &str =
    "user_id, year, total_paid_usd_cents, payout_count, requires_1099, last_payout_at";

/// v1 `creator_payout_totals` reads, aliased into the v2 shape.
const V1_COLUMNS: &str = "\
    user_id, year, total_cents AS total_paid_usd_cents, \
    payouts AS payout_count, needs_1099 AS requires_1099, \
    last_paid_at AS last_payout_at";

/// Provides additive threshold updates and the yearly report.
///
/// Not zero-sized: carries the schema adapter selected at startup.
#[derive(Debug, Clone, Copy)]
pub struct ThresholdRepo {
    schema: ThresholdSchema,
}

impl ThresholdRepo {
    /// Bind the repo to the probed schema version.
    pub fn new(schema: ThresholdSchema) -> Self {
        Self { schema }
    }

    /// Probe the database and bind the matching adapter.
    pub async fn detect(pool: &PgPool) -> Result<Self, sqlx::Error> {
        Ok(Self::new(ThresholdSchema::detect(pool).await?))
    }

    pub fn schema(&self) -> ThresholdSchema {
        self.schema
    }

    /// Additively record a settled payout inside the caller's transaction.
    pub async fn record_success_with(
        &self,
        conn: &mut PgConnection,
        user_id: DbId,
        year: i32,
        usd_cents: i64,
    ) -> Result<ThresholdRecord, sqlx::Error> {
        let upsert = match self.schema {
            ThresholdSchema::V2 => format!(
                "INSERT INTO threshold_records \
                     (user_id, year, total_paid_usd_cents, payout_count, requires_1099, last_payout_at) \
                 VALUES ($1, $2, $3, 1, $3 >= $4, NOW()) \
                 ON CONFLICT (user_id, year) DO UPDATE SET \
                     total_paid_usd_cents = threshold_records.total_paid_usd_cents + EXCLUDED.total_paid_usd_cents, \
                     payout_count = threshold_records.payout_count + 1, \
                     requires_1099 = threshold_records.requires_1099 \
                         OR (threshold_records.total_paid_usd_cents + EXCLUDED.total_paid_usd_cents >= $4), \
                     last_payout_at = NOW() \
                 RETURNING {V2_COLUMNS}"
            ),
            ThresholdSchema::V1Legacy => format!(
                "INSERT INTO creator_payout_totals \
                     (user_id, year, total_cents, payouts, needs_1099, last_paid_at) \
                 VALUES ($1, $2, $3, 1, $3 >= $4, NOW()) \
                 ON CONFLICT (user_id, year) DO UPDATE SET \
                     total_cents = creator_payout_totals.total_cents + EXCLUDED.total_cents, \
                     payouts = creator_payout_totals.payouts + 1, \
                     needs_1099 = creator_payout_totals.needs_1099 \
                         OR (creator_payout_totals.total_cents + EXCLUDED.total_cents >= $4), \
                     last_paid_at = NOW() \
                 RETURNING {V1_COLUMNS}"
            ),
        };
        sqlx::query_as::<_, ThresholdRecord>(&upsert)
            .bind(user_id)
            .bind(year)
            .bind(usd_cents)
            .bind(REPORTING_THRESHOLD_CENTS)
            .fetch_one(&mut *conn)
            .await
    }

    /// Apply a (possibly negative) correction without touching the
    /// `requires_1099` latch or the payout count.
    pub async fn record_correction_with(
        &self,
        conn: &mut PgConnection,
        user_id: DbId,
        year: i32,
        delta_cents: i64,
    ) -> Result<ThresholdRecord, sqlx::Error> {
        let (table, total, columns) = match self.schema {
            ThresholdSchema::V2 => ("threshold_records", "total_paid_usd_cents", V2_COLUMNS),
            ThresholdSchema::V1Legacy => ("creator_payout_totals", "total_cents", V1_COLUMNS),
        };
        let update = format!(
            "UPDATE {table} SET {total} = {total} + $3 \
             WHERE user_id = $1 AND year = $2 \
             RETURNING {columns}"
        );
        sqlx::query_as::<_, ThresholdRecord>(&update)
            .bind(user_id)
            .bind(year)
            .bind(delta_cents)
            .fetch_one(&mut *conn)
            .await
    }

    pub async fn find(
        &self,
        pool: &PgPool,
        user_id: DbId,
        year: i32,
    ) -> Result<Option<ThresholdRecord>, sqlx::Error> {
        let (table, columns) = self.read_source();
        let query = format!("SELECT {columns} FROM {table} WHERE user_id = $1 AND year = $2");
        sqlx::query_as::<_, ThresholdRecord>(&query)
            .bind(user_id)
            .bind(year)
            .fetch_optional(pool)
            .await
    }

    /// All records for a calendar year, highest totals first (the
    /// accountant hand-off report).
    pub async fn report_for_year(
        &self,
        pool: &PgPool,
        year: i32,
    ) -> Result<Vec<ThresholdRecord>, sqlx::Error> {
        let (table, columns) = self.read_source();
        let query = format!(
            "SELECT {columns} FROM {table} \
             WHERE year = $1 \
             ORDER BY total_paid_usd_cents DESC, user_id ASC"
        );
        sqlx::query_as::<_, ThresholdRecord>(&query)
            .bind(year)
            .fetch_all(pool)
            .await
    }

    fn read_source(&self) -> (&'static str, &'static str) {
        match self.schema {
            ThresholdSchema::V2 => ("threshold_records", V2_COLUMNS),
            ThresholdSchema::V1Legacy => ("creator_payout_totals", V1_COLUMNS),
        }
    }
}
