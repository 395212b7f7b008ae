use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Wire types — Hue Remote API
//
// v1 (classic) endpoints return maps keyed by the bridge-local numeric id:
//   GET /route/api/{username}/sensors   → { "5": { sensor }, ... }
//   GET /route/api/{username}/lights    → { "1": { light }, ... }
//   GET /route/api/{username}/groups    → { "2": { group }, ... }
// v2 (CLIP) endpoints return { "errors": [...], "data": [ resource, ... ] }.
// ---------------------------------------------------------------------------

/// Typed error for API-level failures the transport layer cannot see.
#[derive(Debug, thiserror::Error)]
pub enum HueApiError {
    #[error("hue token endpoint rejected the refresh token: {0}")]
    TokenRejected(String),
    #[error("hue API returned error status {status}: {body}")]
    Status { status: u16, body: String },
}

/// POST /v2/oauth2/token response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Validity period in seconds.
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
}

pub type SensorsResponse = HashMap<String, RawSensor>;
pub type LightsResponse = HashMap<String, RawLight>;
pub type GroupsResponse = HashMap<String, RawGroup>;

/// One v1 sensor record. A physical motion sensor appears as three of these
/// (`ZLLPresence`, `ZLLTemperature`, `ZLLLightLevel`) sharing a `uniqueid`
/// prefix.
#[derive(Debug, Clone, Deserialize)]
pub struct RawSensor {
    #[serde(rename = "type")]
    pub sensor_type: String,
    pub name: String,
    pub uniqueid: Option<String>,
    #[serde(default)]
    pub state: RawSensorState,
    #[serde(default)]
    pub config: RawSensorConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSensorState {
    pub presence: Option<bool>,
    /// Hundredths of a degree Celsius.
    pub temperature: Option<i64>,
    pub lightlevel: Option<i64>,
    pub dark: Option<bool>,
    pub daylight: Option<bool>,
    /// Naive UTC timestamp, or the literal `"none"` when never updated.
    pub lastupdated: Option<String>,
    pub buttonevent: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawSensorConfig {
    pub battery: Option<u8>,
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawLight {
    #[serde(rename = "type")]
    pub light_type: Option<String>,
    pub name: String,
    pub uniqueid: Option<String>,
    pub modelid: Option<String>,
    pub productname: Option<String>,
    #[serde(default)]
    pub state: RawLightState,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawLightState {
    pub on: Option<bool>,
    /// Brightness, 0-254.
    pub bri: Option<i64>,
    /// Color temperature in mireds.
    pub ct: Option<i64>,
    pub hue: Option<i64>,
    pub sat: Option<i64>,
    pub reachable: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroup {
    #[serde(rename = "type")]
    pub group_type: String,
    pub name: String,
    pub class: Option<String>,
    #[serde(default)]
    pub lights: Vec<String>,
    #[serde(default)]
    pub sensors: Vec<String>,
    pub state: Option<RawGroupState>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawGroupState {
    pub all_on: Option<bool>,
    pub any_on: Option<bool>,
}

/// v2 CLIP response envelope.
#[derive(Debug, Deserialize)]
pub struct ClipResponse<T> {
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// v2 contact sensor resource.
#[derive(Debug, Clone, Deserialize)]
pub struct RawContactSensor {
    pub id: String,
    pub enabled: Option<bool>,
    pub metadata: Option<ClipMetadata>,
    pub contact_report: Option<ContactReport>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClipMetadata {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContactReport {
    /// `"contact"` (closed) or `"no_contact"` (open).
    pub state: String,
    /// RFC 3339 timestamp of the last state change.
    pub changed: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Processed views handed to the rest of the service
// ---------------------------------------------------------------------------

/// One contact (door/window) sensor, normalized from the v2 resource.
#[derive(Debug, Clone)]
pub struct ContactSensor {
    pub id: String,
    pub name: String,
    /// `true` = open. `None` when the bridge reported an unknown state.
    pub open: Option<bool>,
    pub changed: Option<DateTime<Utc>>,
    pub enabled: bool,
}

impl From<RawContactSensor> for ContactSensor {
    fn from(raw: RawContactSensor) -> Self {
        let (open, changed) = match &raw.contact_report {
            Some(report) => (
                match report.state.as_str() {
                    "no_contact" => Some(true),
                    "contact" => Some(false),
                    _ => None,
                },
                report.changed,
            ),
            None => (None, None),
        };
        ContactSensor {
            id: raw.id,
            name: raw
                .metadata
                .and_then(|m| m.name)
                .unwrap_or_else(|| "Contact Sensor".to_owned()),
            open,
            changed,
            enabled: raw.enabled.unwrap_or(true),
        }
    }
}

/// One wall switch / dimmer, from v1 `ZLLSwitch` / `ZGPSwitch` records.
#[derive(Debug, Clone)]
pub struct Switch {
    pub id: String,
    pub name: String,
    /// `"dimmer"` or `"tap"`.
    pub switch_type: &'static str,
    pub last_button_event: Option<i64>,
    pub last_updated: Option<DateTime<Utc>>,
    pub battery: Option<u8>,
    pub reachable: Option<bool>,
}

/// One room (v1 group of type `Room`; entertainment zones etc. are skipped).
#[derive(Debug, Clone)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub class: Option<String>,
    pub lights: Vec<String>,
    pub sensors: Vec<String>,
    pub any_on: bool,
}

/// Parse a v1 bridge timestamp (`"2024-03-01T12:34:56"`, naive UTC).
///
/// The bridge reports `"none"` for never-updated state; that and any other
/// unparsable form yield `None` rather than an error.
pub fn parse_hue_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}
