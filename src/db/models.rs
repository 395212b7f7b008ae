use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

/// Mirrors the `capability` Postgres enum.
///
/// A capability fixes the semantic type of a reading's value: boolean for
/// presence/motion/vibration/contact/dark/daylight/reachable/on, numeric for
/// the rest. Values are stored in their `serde_json` string form (TEXT).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type, ToSchema)]
#[sqlx(type_name = "capability", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Presence,
    Motion,
    Vibration,
    Contact,
    Temperature,
    Lightlevel,
    Dark,
    Daylight,
    Battery,
    Reachable,
    On,
    Brightness,
    ColorTemp,
    Hue,
    Saturation,
}

/// How a boolean capability turns readings into countable events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// Only the false→true transition counts (door opening). A sustained
    /// `true` must not be re-counted on every reading.
    Edge,
    /// Every `true` observation counts (motion, vibration, ...).
    Level,
}

impl Capability {
    /// Event classification rule per capability. Adding a capability is a
    /// one-line edit here; the match is exhaustive on purpose.
    pub fn trigger_kind(self) -> TriggerKind {
        match self {
            Capability::Contact => TriggerKind::Edge,
            Capability::Presence
            | Capability::Motion
            | Capability::Vibration
            | Capability::Temperature
            | Capability::Lightlevel
            | Capability::Dark
            | Capability::Daylight
            | Capability::Battery
            | Capability::Reachable
            | Capability::On
            | Capability::Brightness
            | Capability::ColorTemp
            | Capability::Hue
            | Capability::Saturation => TriggerKind::Level,
        }
    }

    /// Whether values of this capability carry boolean semantics.
    pub fn is_boolean(self) -> bool {
        matches!(
            self,
            Capability::Presence
                | Capability::Motion
                | Capability::Vibration
                | Capability::Contact
                | Capability::Dark
                | Capability::Daylight
                | Capability::Reachable
                | Capability::On
        )
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Capability::Presence => "presence",
            Capability::Motion => "motion",
            Capability::Vibration => "vibration",
            Capability::Contact => "contact",
            Capability::Temperature => "temperature",
            Capability::Lightlevel => "lightlevel",
            Capability::Dark => "dark",
            Capability::Daylight => "daylight",
            Capability::Battery => "battery",
            Capability::Reachable => "reachable",
            Capability::On => "on",
            Capability::Brightness => "brightness",
            Capability::ColorTemp => "color_temp",
            Capability::Hue => "hue",
            Capability::Saturation => "saturation",
        };
        f.write_str(s)
    }
}

// ---------------------------------------------------------------------------
// ReadingValue — polymorphic reading scalar
//
// A reading value can be a boolean, a number, or a string depending on the
// capability. #[serde(untagged)] makes serde try each variant in order.
// Bool MUST come before Number — JSON true/false would otherwise be coerced
// to 1/0 by some deserializers.
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum ReadingValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl ReadingValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ReadingValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ReadingValue::Number(v) => Some(*v),
            _ => None,
        }
    }

    /// Serialized form written to the `value` TEXT column.
    pub fn to_stored(&self) -> String {
        serde_json::to_string(self).expect("scalar serialization cannot fail")
    }

    /// Inverse of [`ReadingValue::to_stored`]. A row whose value does not
    /// parse as JSON is preserved verbatim as text rather than rejected —
    /// one malformed row must never abort a read path.
    pub fn from_stored(raw: &str) -> ReadingValue {
        serde_json::from_str(raw).unwrap_or_else(|_| ReadingValue::Text(raw.to_owned()))
    }
}

impl fmt::Display for ReadingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingValue::Bool(v) => write!(f, "{v}"),
            // Whole numbers print without the trailing ".0".
            ReadingValue::Number(v) if v.fract() == 0.0 => write!(f, "{}", *v as i64),
            ReadingValue::Number(v) => write!(f, "{v}"),
            ReadingValue::Text(v) => f.write_str(v),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SensorReading {
    pub id: Uuid,
    pub device_id: String,
    pub device_name: Option<String>,
    pub capability: Capability,
    /// Serialized scalar — see [`ReadingValue::to_stored`].
    pub value: String,
    pub zone_name: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn parsed_value(&self) -> ReadingValue {
        ReadingValue::from_stored(&self.value)
    }
}

/// Insert form of a sensor reading. `recorded_at` is server-assigned.
#[derive(Debug, Clone)]
pub struct NewReading {
    pub device_id: String,
    pub device_name: Option<String>,
    pub capability: Capability,
    pub value: ReadingValue,
    pub zone_name: Option<String>,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Measurement {
    pub id: Uuid,
    pub item_id: String,
    pub capability: Capability,
    /// Serialized scalar — see [`ReadingValue::to_stored`].
    pub value: String,
    pub recorded_at: DateTime<Utc>,
}

/// Insert form of a measurement. `recorded_at` carries the vendor-supplied
/// timestamp when one exists, so it is set by the caller, not the server.
#[derive(Debug, Clone)]
pub struct NewMeasurement {
    pub item_id: String,
    pub capability: Capability,
    pub value: ReadingValue,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&Capability::ColorTemp).unwrap(),
            r#""color_temp""#
        );
        assert_eq!(
            serde_json::from_str::<Capability>(r#""lightlevel""#).unwrap(),
            Capability::Lightlevel
        );
    }

    #[test]
    fn only_contact_is_edge_triggered() {
        assert_eq!(Capability::Contact.trigger_kind(), TriggerKind::Edge);
        assert_eq!(Capability::Motion.trigger_kind(), TriggerKind::Level);
        assert_eq!(Capability::Presence.trigger_kind(), TriggerKind::Level);
        assert_eq!(Capability::Vibration.trigger_kind(), TriggerKind::Level);
    }

    #[test]
    fn boolean_semantics_per_capability() {
        assert!(Capability::Presence.is_boolean());
        assert!(Capability::Contact.is_boolean());
        assert!(Capability::On.is_boolean());
        assert!(!Capability::Temperature.is_boolean());
        assert!(!Capability::Battery.is_boolean());
    }

    #[test]
    fn untagged_value_prefers_bool_over_number() {
        assert_eq!(
            serde_json::from_str::<ReadingValue>("true").unwrap(),
            ReadingValue::Bool(true)
        );
        assert_eq!(
            serde_json::from_str::<ReadingValue>("21.5").unwrap(),
            ReadingValue::Number(21.5)
        );
    }

    #[test]
    fn stored_roundtrip() {
        for v in [
            ReadingValue::Bool(false),
            ReadingValue::Number(85.0),
            ReadingValue::Text("no_contact".into()),
        ] {
            assert_eq!(ReadingValue::from_stored(&v.to_stored()), v);
        }
    }

    #[test]
    fn malformed_stored_value_falls_back_to_text() {
        assert_eq!(
            ReadingValue::from_stored("{not json"),
            ReadingValue::Text("{not json".into())
        );
    }

    #[test]
    fn display_drops_trailing_zero_fraction() {
        assert_eq!(ReadingValue::Number(85.0).to_string(), "85");
        assert_eq!(ReadingValue::Number(20.5).to_string(), "20.5");
        assert_eq!(ReadingValue::Bool(true).to_string(), "true");
    }
}
