use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::ReadingValue;

/// One reading inside a statistics window.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct StatPoint {
    pub value: ReadingValue,
    pub recorded_at: DateTime<Utc>,
}

/// Aggregate over one device+capability window.
///
/// `min`/`max`/`avg` cover the numeric subset of the window only and are
/// omitted entirely (not zeroed) when no numeric values are present —
/// boolean and enumerated capabilities still report `count` and `data`.
#[derive(Debug, Serialize, ToSchema)]
pub struct CapabilityStats {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<f64>,
    pub data: Vec<StatPoint>,
}

pub fn compute_stats(data: Vec<StatPoint>) -> CapabilityStats {
    let numeric: Vec<f64> = data.iter().filter_map(|p| p.value.as_f64()).collect();

    if numeric.is_empty() {
        return CapabilityStats {
            count: data.len(),
            min: None,
            max: None,
            avg: None,
            data,
        };
    }

    let sum: f64 = numeric.iter().sum();
    CapabilityStats {
        count: data.len(),
        min: numeric.iter().copied().fold(f64::INFINITY, f64::min).into(),
        max: numeric.iter().copied().fold(f64::NEG_INFINITY, f64::max).into(),
        avg: Some(sum / numeric.len() as f64),
        data,
    }
}
