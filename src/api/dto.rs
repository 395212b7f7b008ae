use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::models::{Capability, Measurement, ReadingValue, SensorReading};

/// Wire form of a sensor reading; the stored scalar is parsed back into its
/// JSON shape (boolean / number / string) on the way out.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SensorReadingDto {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub capability: Capability,
    pub value: ReadingValue,
    pub zone_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl From<SensorReading> for SensorReadingDto {
    fn from(r: SensorReading) -> Self {
        let value = r.parsed_value();
        Self {
            id: r.id,
            device_id: r.device_id,
            device_name: r.device_name,
            capability: r.capability,
            value,
            zone_name: r.zone_name,
            recorded_at: r.recorded_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeasurementDto {
    pub id: Uuid,
    pub item_id: String,
    pub capability: Capability,
    pub value: ReadingValue,
    pub recorded_at: DateTime<Utc>,
}

impl From<Measurement> for MeasurementDto {
    fn from(m: Measurement) -> Self {
        Self {
            id: m.id,
            item_id: m.item_id,
            capability: m.capability,
            value: ReadingValue::from_stored(&m.value),
            recorded_at: m.recorded_at,
        }
    }
}
