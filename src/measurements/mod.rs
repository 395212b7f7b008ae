use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::error;

use crate::db::models::{Capability, Measurement, NewMeasurement};

/// Read/write access to the raw `measurements` log.
///
/// Same write contract as the readings repository: one bulk insert per call,
/// failures logged and swallowed, zero count returned.
#[derive(Clone)]
pub struct MeasurementRepo {
    pool: PgPool,
}

impl MeasurementRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Persist a batch of measurements in one bulk insert.
    pub async fn save_batch(&self, measurements: &[NewMeasurement]) -> i64 {
        if measurements.is_empty() {
            return 0;
        }
        match self.insert_rows(measurements).await {
            Ok(written) => written,
            Err(e) => {
                error!(
                    error = %e,
                    batch = ?measurements,
                    "failed to write measurement batch, dropping it"
                );
                0
            }
        }
    }

    async fn insert_rows(&self, measurements: &[NewMeasurement]) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO measurements (item_id, capability, value, recorded_at) ",
        );
        qb.push_values(measurements, |mut row, m| {
            row.push_bind(&m.item_id)
                .push_bind(m.capability)
                .push_bind(m.value.to_stored())
                .push_bind(m.recorded_at);
        });

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as i64)
    }

    /// Latest measurement for one item+capability, if any.
    pub async fn latest(
        &self,
        item_id: &str,
        capability: Capability,
    ) -> Result<Option<Measurement>> {
        sqlx::query_as::<_, Measurement>(
            "SELECT id, item_id, capability, value, recorded_at FROM measurements \
             WHERE item_id = $1 AND capability = $2 \
             ORDER BY recorded_at DESC \
             LIMIT 1",
        )
        .bind(item_id)
        .bind(capability)
        .fetch_optional(&self.pool)
        .await
        .context("fetching latest measurement")
    }

    /// Measurements for one item, newest first, optionally filtered by
    /// capability and time range.
    pub async fn measurements(
        &self,
        item_id: &str,
        capability: Option<Capability>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<Measurement>> {
        sqlx::query_as::<_, Measurement>(
            "SELECT id, item_id, capability, value, recorded_at FROM measurements \
             WHERE item_id = $1 \
               AND ($2::capability IS NULL OR capability = $2) \
               AND ($3::timestamptz IS NULL OR recorded_at >= $3) \
               AND ($4::timestamptz IS NULL OR recorded_at <= $4) \
             ORDER BY recorded_at DESC \
             LIMIT $5",
        )
        .bind(item_id)
        .bind(capability)
        .bind(from)
        .bind(to)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("fetching measurements")
    }

    /// Count measurements for one item, optionally bounded by a time range.
    pub async fn count(
        &self,
        item_id: &str,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM measurements \
             WHERE item_id = $1 \
               AND ($2::timestamptz IS NULL OR recorded_at >= $2) \
               AND ($3::timestamptz IS NULL OR recorded_at <= $3)",
        )
        .bind(item_id)
        .bind(from)
        .bind(to)
        .fetch_one(&self.pool)
        .await
        .context("counting measurements")
    }
}
