//! Derived dashboard views: coarse system status, today's activity timeline,
//! and per-device summaries.
//!
//! All functions are pure over a recent-readings slice (most-recent-first)
//! and an injected "now", so staleness thresholds are testable without a
//! clock.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::models::{Capability, ReadingValue, SensorReading};

/// Most recent qualifying activity must be younger than this for the system
/// to count as active.
const STALE_AFTER_MINUTES: i64 = 60;

/// A device is online iff its last activity is younger than this.
const ONLINE_WITHIN_MINUTES: i64 = 30;

/// Timeline entries are capped at this many rows.
const TIMELINE_LIMIT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StatusLevel {
    Normal,
    Attention,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemStatus {
    pub level: StatusLevel,
    pub message: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub last_activity_location: String,
}

/// Coarse system status over the most recent readings.
///
/// Zero known devices is its own attention state ("no sensors connected"),
/// distinct from attention due to staleness.
pub fn system_status(
    readings: &[SensorReading],
    device_count: usize,
    now: DateTime<Utc>,
) -> SystemStatus {
    if device_count == 0 {
        return SystemStatus {
            level: StatusLevel::Attention,
            message: "no sensors connected".to_owned(),
            last_activity: None,
            last_activity_location: "-".to_owned(),
        };
    }

    let Some(most_recent) = readings.first() else {
        return SystemStatus {
            level: StatusLevel::Attention,
            message: "waiting for sensor data".to_owned(),
            last_activity: None,
            last_activity_location: "-".to_owned(),
        };
    };

    let location = most_recent
        .device_name
        .clone()
        .unwrap_or_else(|| most_recent.device_id.clone());

    if (now - most_recent.recorded_at).num_minutes() > STALE_AFTER_MINUTES {
        SystemStatus {
            level: StatusLevel::Attention,
            message: "no recent activity".to_owned(),
            last_activity: Some(most_recent.recorded_at),
            last_activity_location: location,
        }
    } else {
        SystemStatus {
            level: StatusLevel::Normal,
            message: "system active".to_owned(),
            last_activity: Some(most_recent.recorded_at),
            last_activity_location: location,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TimelineEntry {
    /// Local time of day, "HH:MM".
    pub time: String,
    pub event: String,
    pub location: String,
    pub capability: Capability,
}

/// Readings that fall on the current local calendar day, most-recent-first,
/// capped at [`TIMELINE_LIMIT`]. The day boundary is 00:00 in `now`'s
/// timezone; readings are rendered at their local time of day.
pub fn today_timeline<Tz: TimeZone>(readings: &[SensorReading], now: DateTime<Tz>) -> Vec<TimelineEntry>
where
    Tz::Offset: fmt::Display,
{
    let tz = now.timezone();
    let today = now.date_naive();

    readings
        .iter()
        .filter(|r| r.recorded_at.with_timezone(&tz).date_naive() == today)
        .take(TIMELINE_LIMIT)
        .map(|r| TimelineEntry {
            time: r
                .recorded_at
                .with_timezone(&tz)
                .format("%H:%M")
                .to_string(),
            event: describe_reading(r.capability, &r.parsed_value()),
            location: r
                .device_name
                .clone()
                .unwrap_or_else(|| r.device_id.clone()),
            capability: r.capability,
        })
        .collect()
}

/// Fixed human-readable description per capability.
pub fn describe_reading(capability: Capability, value: &ReadingValue) -> String {
    let truthy = value.as_bool().unwrap_or(false);
    match capability {
        Capability::Presence if truthy => "presence detected".to_owned(),
        Capability::Presence => "no presence".to_owned(),
        Capability::Motion if truthy => "motion detected".to_owned(),
        Capability::Motion => "no motion".to_owned(),
        Capability::Vibration if truthy => "vibration detected".to_owned(),
        Capability::Vibration => "no vibration".to_owned(),
        Capability::Contact if truthy => "opened".to_owned(),
        Capability::Contact => "closed".to_owned(),
        Capability::Battery => format!("battery: {value}%"),
        Capability::Temperature => format!("temperature: {value}°C"),
        _ => format!("{capability}: {value}"),
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DeviceSummary {
    pub id: String,
    pub name: String,
    /// Coarse device kind guessed from its most recent capability.
    pub kind: String,
    pub zone_name: Option<String>,
    pub battery: Option<f64>,
    pub last_activity: DateTime<Utc>,
    pub online: bool,
}

/// Group recent readings (most-recent-first) into one summary per device.
///
/// The first reading encountered for a device is its latest, so it supplies
/// the name, kind guess and last-activity timestamp; the first battery
/// reading supplies the battery level.
pub fn device_summaries(readings: &[SensorReading], now: DateTime<Utc>) -> Vec<DeviceSummary> {
    let mut out: Vec<DeviceSummary> = Vec::new();

    for r in readings {
        if let Some(existing) = out.iter_mut().find(|d| d.id == r.device_id) {
            if existing.battery.is_none() && r.capability == Capability::Battery {
                existing.battery = r.parsed_value().as_f64();
            }
            continue;
        }
        out.push(DeviceSummary {
            id: r.device_id.clone(),
            name: r.device_name.clone().unwrap_or_else(|| r.device_id.clone()),
            kind: guess_device_kind(r.capability).to_owned(),
            zone_name: r.zone_name.clone(),
            battery: (r.capability == Capability::Battery)
                .then(|| r.parsed_value().as_f64())
                .flatten(),
            last_activity: r.recorded_at,
            online: is_online(Some(r.recorded_at), now),
        });
    }

    out
}

pub fn is_online(last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_activity {
        Some(ts) => (now - ts).num_minutes() < ONLINE_WITHIN_MINUTES,
        None => false,
    }
}

fn guess_device_kind(capability: Capability) -> &'static str {
    match capability {
        Capability::Presence => "presence",
        Capability::Motion => "motion",
        Capability::Vibration => "vibration",
        Capability::Contact => "door",
        Capability::Temperature => "temperature",
        _ => "sensor",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, FixedOffset};
    use uuid::Uuid;

    use super::*;

    fn reading_at(device: &str, capability: Capability, value: &str, at: DateTime<Utc>) -> SensorReading {
        SensorReading {
            id: Uuid::new_v4(),
            device_id: device.to_owned(),
            device_name: Some(format!("{device} name")),
            capability,
            value: value.to_owned(),
            zone_name: None,
            recorded_at: at,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 14, 0, 0).unwrap()
    }

    #[test]
    fn no_devices_is_attention_with_setup_message() {
        let status = system_status(&[], 0, now());
        assert_eq!(status.level, StatusLevel::Attention);
        assert_eq!(status.message, "no sensors connected");
        assert!(status.last_activity.is_none());
    }

    #[test]
    fn devices_but_no_readings_is_waiting() {
        let status = system_status(&[], 3, now());
        assert_eq!(status.level, StatusLevel::Attention);
        assert_eq!(status.message, "waiting for sensor data");
    }

    #[test]
    fn activity_59_minutes_ago_is_normal() {
        let r = reading_at("pir1", Capability::Motion, "true", now() - Duration::minutes(59));
        let status = system_status(&[r], 1, now());
        assert_eq!(status.level, StatusLevel::Normal);
        assert_eq!(status.message, "system active");
        assert_eq!(status.last_activity_location, "pir1 name");
    }

    #[test]
    fn activity_61_minutes_ago_is_attention() {
        let r = reading_at("pir1", Capability::Motion, "true", now() - Duration::minutes(61));
        let status = system_status(&[r], 1, now());
        assert_eq!(status.level, StatusLevel::Attention);
        assert_eq!(status.message, "no recent activity");
        assert_eq!(status.last_activity, Some(now() - Duration::minutes(61)));
    }

    #[test]
    fn timeline_keeps_only_todays_readings() {
        let tz = FixedOffset::east_opt(2 * 3600).unwrap();
        // Local now: 2024-03-01 10:00 (+02:00) == 08:00 UTC.
        let local_now = tz.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();

        let today = reading_at(
            "pir1",
            Capability::Motion,
            "true",
            Utc.with_ymd_and_hms(2024, 3, 1, 7, 30, 0).unwrap(),
        );
        // 23:30 UTC on Feb 29 is 01:30 local on Mar 1 — still today.
        let late_yesterday_utc = reading_at(
            "pir1",
            Capability::Motion,
            "true",
            Utc.with_ymd_and_hms(2024, 2, 29, 23, 30, 0).unwrap(),
        );
        // 21:00 UTC on Feb 29 is 23:00 local on Feb 29 — yesterday.
        let yesterday = reading_at(
            "pir1",
            Capability::Motion,
            "true",
            Utc.with_ymd_and_hms(2024, 2, 29, 21, 0, 0).unwrap(),
        );

        let entries = today_timeline(&[today, late_yesterday_utc, yesterday], local_now);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].time, "09:30");
        assert_eq!(entries[1].time, "01:30");
    }

    #[test]
    fn timeline_is_capped_at_twenty() {
        let rows: Vec<_> = (0..30)
            .map(|i| {
                reading_at(
                    "pir1",
                    Capability::Motion,
                    "true",
                    now() - Duration::minutes(i),
                )
            })
            .collect();

        let entries = today_timeline(&rows, now());
        assert_eq!(entries.len(), 20);
    }

    #[test]
    fn reading_descriptions() {
        assert_eq!(
            describe_reading(Capability::Presence, &ReadingValue::Bool(true)),
            "presence detected"
        );
        assert_eq!(
            describe_reading(Capability::Contact, &ReadingValue::Bool(false)),
            "closed"
        );
        assert_eq!(
            describe_reading(Capability::Battery, &ReadingValue::Number(85.0)),
            "battery: 85%"
        );
        assert_eq!(
            describe_reading(Capability::Temperature, &ReadingValue::Number(20.5)),
            "temperature: 20.5°C"
        );
        assert_eq!(
            describe_reading(Capability::Lightlevel, &ReadingValue::Number(12000.0)),
            "lightlevel: 12000"
        );
    }

    #[test]
    fn online_threshold_is_thirty_minutes() {
        assert!(is_online(Some(now() - Duration::minutes(29)), now()));
        assert!(!is_online(Some(now() - Duration::minutes(31)), now()));
        assert!(!is_online(None, now()));
    }

    #[test]
    fn device_summaries_take_latest_per_device() {
        let rows = vec![
            reading_at("pir1", Capability::Motion, "true", now() - Duration::minutes(5)),
            reading_at("pir1", Capability::Battery, "90", now() - Duration::minutes(10)),
            reading_at("door1", Capability::Contact, "false", now() - Duration::minutes(45)),
        ];

        let devices = device_summaries(&rows, now());
        assert_eq!(devices.len(), 2);

        let pir = devices.iter().find(|d| d.id == "pir1").unwrap();
        assert_eq!(pir.kind, "motion");
        assert_eq!(pir.battery, Some(90.0));
        assert!(pir.online);

        let door = devices.iter().find(|d| d.id == "door1").unwrap();
        assert_eq!(door.kind, "door");
        assert!(!door.online);
    }
}
