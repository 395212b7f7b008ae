pub mod scan;
pub mod stats;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::error;

use crate::db::models::{Capability, NewReading, ReadingValue, SensorReading};

use self::scan::{scan_active, ScanCursor, SCAN_PAGE_SIZE};
use self::stats::{compute_stats, CapabilityStats, StatPoint};

/// Read/write access to the `sensor_readings` table.
///
/// Writes are best-effort: a failed batch is logged and dropped, and the
/// caller sees a zero count instead of an error — a transient storage outage
/// must not crash a polling loop. Reads propagate failures; status and stat
/// derivation cannot silently proceed on absent data.
#[derive(Clone)]
pub struct ReadingRepo {
    pool: PgPool,
}

const SELECT_COLUMNS: &str =
    "id, device_id, device_name, capability, value, zone_name, recorded_at";

impl ReadingRepo {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Write one reading. Returns the number of rows written (0 on failure).
    pub async fn save_reading(&self, reading: &NewReading) -> i64 {
        self.save_snapshot(std::slice::from_ref(reading)).await
    }

    /// Write a device snapshot in one bulk insert. Empty input is a no-op.
    /// Returns the number of rows written; on failure logs the error and the
    /// full batch and returns 0 — callers distinguish "nothing to do" from
    /// "write failed" by whether the input was non-empty.
    pub async fn save_snapshot(&self, readings: &[NewReading]) -> i64 {
        if readings.is_empty() {
            return 0;
        }
        match self.insert_rows(readings).await {
            Ok(written) => written,
            Err(e) => {
                error!(error = %e, batch = ?readings, "failed to write reading batch, dropping it");
                0
            }
        }
    }

    async fn insert_rows(&self, readings: &[NewReading]) -> Result<i64> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "INSERT INTO sensor_readings (device_id, device_name, capability, value, zone_name) ",
        );
        qb.push_values(readings, |mut row, r| {
            row.push_bind(&r.device_id)
                .push_bind(&r.device_name)
                .push_bind(r.capability)
                .push_bind(r.value.to_stored())
                .push_bind(&r.zone_name);
        });

        let result = qb.build().execute(&self.pool).await?;
        Ok(result.rows_affected() as i64)
    }

    /// Latest reading per `(device_id, capability)` pair.
    pub async fn latest_per_device(&self) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT DISTINCT ON (device_id, capability) {SELECT_COLUMNS} \
             FROM sensor_readings \
             ORDER BY device_id, capability, recorded_at DESC"
        );
        sqlx::query_as::<_, SensorReading>(&sql)
            .fetch_all(&self.pool)
            .await
            .context("fetching latest reading per device")
    }

    /// Readings for one device, newest first, optionally filtered by
    /// capability and time range.
    pub async fn device_readings(
        &self,
        device_id: &str,
        capability: Option<Capability>,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sensor_readings \
             WHERE device_id = $1 \
               AND ($2::capability IS NULL OR capability = $2) \
               AND ($3::timestamptz IS NULL OR recorded_at >= $3) \
               AND ($4::timestamptz IS NULL OR recorded_at <= $4) \
             ORDER BY recorded_at DESC \
             LIMIT $5"
        );
        sqlx::query_as::<_, SensorReading>(&sql)
            .bind(device_id)
            .bind(capability)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("fetching device readings")
    }

    /// All readings in a time range, oldest first.
    pub async fn range_readings(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
        limit: i64,
    ) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sensor_readings \
             WHERE ($1::timestamptz IS NULL OR recorded_at >= $1) \
               AND ($2::timestamptz IS NULL OR recorded_at <= $2) \
             ORDER BY recorded_at ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, SensorReading>(&sql)
            .bind(from)
            .bind(to)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("fetching readings in range")
    }

    /// Most recent readings across all devices, newest first.
    pub async fn recent_readings(&self, limit: i64) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sensor_readings \
             ORDER BY recorded_at DESC \
             LIMIT $1"
        );
        sqlx::query_as::<_, SensorReading>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .context("fetching recent readings")
    }

    /// Full transition-aware scan of `[start, end]`: walks the range in
    /// fixed-size pages and yields only activation events (see
    /// [`scan::TransitionTracker`]).
    pub async fn scan(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        scan_active(SCAN_PAGE_SIZE, |cursor| self.scan_page(start, end, cursor)).await
    }

    async fn scan_page(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cursor: Option<ScanCursor>,
    ) -> Result<Vec<SensorReading>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM sensor_readings \
             WHERE recorded_at >= $1 \
               AND recorded_at <= $2 \
               AND ($3::timestamptz IS NULL OR (recorded_at, id) > ($3, $4::uuid)) \
             ORDER BY recorded_at ASC, id ASC \
             LIMIT $5"
        );
        sqlx::query_as::<_, SensorReading>(&sql)
            .bind(start)
            .bind(end)
            .bind(cursor.map(|c| c.recorded_at))
            .bind(cursor.map(|c| c.id))
            .bind(SCAN_PAGE_SIZE as i64)
            .fetch_all(&self.pool)
            .await
            .context("fetching scan page")
    }

    /// Aggregate one device+capability over the trailing window.
    pub async fn capability_stats(
        &self,
        device_id: &str,
        capability: Capability,
        window_days: i64,
        now: DateTime<Utc>,
    ) -> Result<CapabilityStats> {
        let since = now - Duration::days(window_days);

        #[derive(FromRow)]
        struct ValueRow {
            value: String,
            recorded_at: DateTime<Utc>,
        }

        let rows = sqlx::query_as::<_, ValueRow>(
            "SELECT value, recorded_at FROM sensor_readings \
             WHERE device_id = $1 AND capability = $2 AND recorded_at >= $3 \
             ORDER BY recorded_at ASC",
        )
        .bind(device_id)
        .bind(capability)
        .bind(since)
        .fetch_all(&self.pool)
        .await
        .context("fetching stats window")?;

        let data = rows
            .into_iter()
            .map(|r| StatPoint {
                value: ReadingValue::from_stored(&r.value),
                recorded_at: r.recorded_at,
            })
            .collect();

        Ok(compute_stats(data))
    }

    /// Retention: drop readings older than `days_to_keep` days.
    pub async fn delete_old_readings(&self, days_to_keep: i64) -> Result<u64> {
        let cutoff = Utc::now() - Duration::days(days_to_keep);
        let result = sqlx::query("DELETE FROM sensor_readings WHERE recorded_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .context("deleting old readings")?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration as StdDuration;

    use sqlx::postgres::PgPoolOptions;

    use super::*;
    use crate::db::models::ReadingValue;

    fn unreachable_repo() -> ReadingRepo {
        let pool = PgPoolOptions::new()
            .acquire_timeout(StdDuration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:9/unreachable")
            .expect("lazy pool from static url");
        ReadingRepo::new(pool)
    }

    #[tokio::test]
    async fn empty_snapshot_is_a_noop() {
        assert_eq!(unreachable_repo().save_snapshot(&[]).await, 0);
    }

    #[tokio::test]
    async fn snapshot_write_failure_yields_zero_not_error() {
        let rows = vec![NewReading {
            device_id: "ABC".to_owned(),
            device_name: Some("Hallway".to_owned()),
            capability: Capability::Presence,
            value: ReadingValue::Bool(true),
            zone_name: None,
        }];

        assert_eq!(unreachable_repo().save_snapshot(&rows).await, 0);
    }

    #[tokio::test]
    async fn read_failure_is_propagated() {
        // Reads must surface storage failures instead of returning empty.
        assert!(unreachable_repo().recent_readings(10).await.is_err());
    }
}
