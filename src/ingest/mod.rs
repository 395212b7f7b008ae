pub mod extract;

use anyhow::Result;
use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::db::models::{NewMeasurement, NewReading, SensorReading};
use crate::hue::HueClient;
use crate::measurements::MeasurementRepo;
use crate::reading_cache::ReadingCache;
use crate::readings::ReadingRepo;

/// One polling cycle: fetch the full bridge picture, normalize it, persist
/// it, and refresh the in-memory latest-reading cache.
pub struct IngestService {
    hue: HueClient,
    readings: ReadingRepo,
    measurements: MeasurementRepo,
    cache: ReadingCache,
}

impl IngestService {
    pub fn new(
        hue: HueClient,
        readings: ReadingRepo,
        measurements: MeasurementRepo,
        cache: ReadingCache,
    ) -> Self {
        Self {
            hue,
            readings,
            measurements,
            cache,
        }
    }

    /// Fetch-normalize-persist one round. A vendor fetch failure aborts the
    /// round with an error; a storage write failure does not — the batch
    /// writers log and drop, and the poll loop keeps running either way.
    pub async fn run_cycle(&self) -> Result<()> {
        let config = self.hue.full_config().await?;
        let now = Utc::now();

        info!(
            sensors = config.sensors.len(),
            contact_sensors = config.contact_sensors.len(),
            lights = config.lights.len(),
            switches = config.switches.len(),
            rooms = config.rooms.len(),
            "Bridge state fetched"
        );

        // Raw measurement log, with vendor timestamps where available.
        let mut batch: Vec<NewMeasurement> = Vec::new();
        for sensor in &config.sensors {
            batch.extend(extract::sensor_measurements(sensor, now));
        }
        for contact in &config.contact_sensors {
            batch.extend(extract::contact_measurements(contact, now));
        }
        for (id, light) in &config.lights {
            batch.extend(extract::light_measurements(light, id, now));
        }

        let batch_len = batch.len();
        let written = self.measurements.save_batch(&batch).await;
        debug!(collected = batch_len, written, "Measurement batch persisted");

        // Per-device snapshots for the readings table + cache.
        let mut snapshot_rows: Vec<NewReading> = Vec::new();
        for sensor in &config.sensors {
            snapshot_rows.extend(extract::sensor_snapshot_rows(sensor, now));
        }
        for contact in &config.contact_sensors {
            snapshot_rows.extend(extract::contact_snapshot_rows(contact, now));
        }

        let written = self.readings.save_snapshot(&snapshot_rows).await;
        debug!(collected = snapshot_rows.len(), written, "Reading snapshot persisted");

        for row in snapshot_rows {
            self.cache
                .update(SensorReading {
                    id: Uuid::new_v4(),
                    device_id: row.device_id,
                    device_name: row.device_name,
                    capability: row.capability,
                    value: row.value.to_stored(),
                    zone_name: row.zone_name,
                    recorded_at: now,
                })
                .await;
        }

        Ok(())
    }
}
