//! Turns one raw device record into flat measurement tuples.
//!
//! A field contributes a tuple only when it is present on the source —
//! `false` and `0` are present values, absence means the device does not
//! report that capability. `recorded_at` falls back from the
//! capability-specific update time to the device fallback time to the
//! injected `now`; callers pass `Utc::now()`, tests pass a fixed instant.

use chrono::{DateTime, Utc};

use crate::db::models::{Capability, NewMeasurement, NewReading, ReadingValue};
use crate::hue::grouping::SensorSnapshot;
use crate::hue::models::{ContactSensor, RawLight};

pub fn sensor_measurements(sensor: &SensorSnapshot, now: DateTime<Utc>) -> Vec<NewMeasurement> {
    let fallback = sensor.presence_updated.unwrap_or(now);
    let mut out = Vec::new();

    let mut push = |capability: Capability, value: ReadingValue, at: DateTime<Utc>| {
        out.push(NewMeasurement {
            item_id: sensor.id.clone(),
            capability,
            value,
            recorded_at: at,
        });
    };

    if let Some(presence) = sensor.presence {
        push(
            Capability::Presence,
            ReadingValue::Bool(presence),
            sensor.presence_updated.unwrap_or(fallback),
        );
    }
    if let Some(temperature) = sensor.temperature {
        push(
            Capability::Temperature,
            ReadingValue::Number(temperature),
            sensor.temperature_updated.unwrap_or(fallback),
        );
    }
    if let Some(light_level) = sensor.light_level {
        push(
            Capability::Lightlevel,
            ReadingValue::Number(light_level as f64),
            sensor.light_updated.unwrap_or(fallback),
        );
    }
    if let Some(dark) = sensor.dark {
        push(
            Capability::Dark,
            ReadingValue::Bool(dark),
            sensor.light_updated.unwrap_or(fallback),
        );
    }
    if let Some(daylight) = sensor.daylight {
        push(
            Capability::Daylight,
            ReadingValue::Bool(daylight),
            sensor.light_updated.unwrap_or(fallback),
        );
    }
    if let Some(battery) = sensor.battery {
        push(Capability::Battery, ReadingValue::Number(battery as f64), fallback);
    }
    if let Some(reachable) = sensor.reachable {
        push(Capability::Reachable, ReadingValue::Bool(reachable), fallback);
    }

    out
}

pub fn contact_measurements(contact: &ContactSensor, now: DateTime<Utc>) -> Vec<NewMeasurement> {
    let Some(open) = contact.open else {
        return Vec::new();
    };
    vec![NewMeasurement {
        item_id: contact.id.clone(),
        capability: Capability::Contact,
        value: ReadingValue::Bool(open),
        recorded_at: contact.changed.unwrap_or(now),
    }]
}

/// Lamp state carries no per-capability update times; everything is stamped
/// with the poll instant.
pub fn light_measurements(light: &RawLight, item_id: &str, now: DateTime<Utc>) -> Vec<NewMeasurement> {
    let mut out = Vec::new();

    let mut push = |capability: Capability, value: ReadingValue| {
        out.push(NewMeasurement {
            item_id: item_id.to_owned(),
            capability,
            value,
            recorded_at: now,
        });
    };

    if let Some(on) = light.state.on {
        push(Capability::On, ReadingValue::Bool(on));
    }
    if let Some(bri) = light.state.bri {
        push(Capability::Brightness, ReadingValue::Number(bri as f64));
    }
    if let Some(ct) = light.state.ct {
        push(Capability::ColorTemp, ReadingValue::Number(ct as f64));
    }
    if let Some(hue) = light.state.hue {
        push(Capability::Hue, ReadingValue::Number(hue as f64));
    }
    if let Some(sat) = light.state.sat {
        push(Capability::Saturation, ReadingValue::Number(sat as f64));
    }
    if let Some(reachable) = light.state.reachable {
        push(Capability::Reachable, ReadingValue::Bool(reachable));
    }

    out
}

/// Snapshot rows for the `sensor_readings` table: the same capability set as
/// [`sensor_measurements`], tagged with the device name and zone.
/// `recorded_at` is server-assigned on insert.
pub fn sensor_snapshot_rows(sensor: &SensorSnapshot, now: DateTime<Utc>) -> Vec<NewReading> {
    sensor_measurements(sensor, now)
        .into_iter()
        .map(|m| NewReading {
            device_id: m.item_id,
            device_name: Some(sensor.name.clone()),
            capability: m.capability,
            value: m.value,
            zone_name: sensor.zone_name.clone(),
        })
        .collect()
}

pub fn contact_snapshot_rows(contact: &ContactSensor, now: DateTime<Utc>) -> Vec<NewReading> {
    contact_measurements(contact, now)
        .into_iter()
        .map(|m| NewReading {
            device_id: m.item_id,
            device_name: Some(contact.name.clone()),
            capability: m.capability,
            value: m.value,
            zone_name: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn snapshot() -> SensorSnapshot {
        SensorSnapshot {
            id: "ABC".to_owned(),
            name: "Hallway".to_owned(),
            member_ids: vec!["5".to_owned()],
            zone_name: Some("Hallway".to_owned()),
            presence: Some(false),
            presence_updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 15, 0).unwrap()),
            battery: Some(87),
            reachable: Some(true),
            temperature: Some(20.54),
            temperature_updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 14, 30).unwrap()),
            light_level: Some(12000),
            dark: Some(false),
            daylight: Some(true),
            light_updated: Some(Utc.with_ymd_and_hms(2024, 3, 1, 8, 10, 0).unwrap()),
        }
    }

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn every_present_field_contributes_one_tuple() {
        let tuples = sensor_measurements(&snapshot(), fixed_now());
        let capabilities: Vec<Capability> = tuples.iter().map(|m| m.capability).collect();
        assert_eq!(
            capabilities,
            vec![
                Capability::Presence,
                Capability::Temperature,
                Capability::Lightlevel,
                Capability::Dark,
                Capability::Daylight,
                Capability::Battery,
                Capability::Reachable,
            ]
        );
    }

    #[test]
    fn false_is_a_present_value() {
        let tuples = sensor_measurements(&snapshot(), fixed_now());
        let presence = tuples.iter().find(|m| m.capability == Capability::Presence).unwrap();
        assert_eq!(presence.value, ReadingValue::Bool(false));
    }

    #[test]
    fn absent_fields_contribute_nothing() {
        let mut s = snapshot();
        s.temperature = None;
        s.dark = None;

        let tuples = sensor_measurements(&s, fixed_now());
        assert!(tuples.iter().all(|m| m.capability != Capability::Temperature));
        assert!(tuples.iter().all(|m| m.capability != Capability::Dark));
        assert_eq!(tuples.len(), 5);
    }

    #[test]
    fn timestamps_prefer_capability_specific_updates() {
        let s = snapshot();
        let tuples = sensor_measurements(&s, fixed_now());

        let find = |c: Capability| tuples.iter().find(|m| m.capability == c).unwrap();
        assert_eq!(find(Capability::Presence).recorded_at, s.presence_updated.unwrap());
        assert_eq!(
            find(Capability::Temperature).recorded_at,
            s.temperature_updated.unwrap()
        );
        assert_eq!(find(Capability::Lightlevel).recorded_at, s.light_updated.unwrap());
        // Battery has no dedicated update time — falls back to the shared one.
        assert_eq!(find(Capability::Battery).recorded_at, s.presence_updated.unwrap());
    }

    #[test]
    fn missing_timestamps_fall_back_to_injected_now() {
        let mut s = snapshot();
        s.presence_updated = None;
        s.temperature_updated = None;
        s.light_updated = None;

        let tuples = sensor_measurements(&s, fixed_now());
        assert!(tuples.iter().all(|m| m.recorded_at == fixed_now()));
    }

    #[test]
    fn contact_with_unknown_state_is_absent() {
        let contact = ContactSensor {
            id: "b1c2".to_owned(),
            name: "Front door".to_owned(),
            open: None,
            changed: None,
            enabled: true,
        };
        assert!(contact_measurements(&contact, fixed_now()).is_empty());
    }

    #[test]
    fn contact_uses_change_timestamp() {
        let changed = Utc.with_ymd_and_hms(2024, 3, 1, 7, 0, 0).unwrap();
        let contact = ContactSensor {
            id: "b1c2".to_owned(),
            name: "Front door".to_owned(),
            open: Some(true),
            changed: Some(changed),
            enabled: true,
        };

        let tuples = contact_measurements(&contact, fixed_now());
        assert_eq!(tuples.len(), 1);
        assert_eq!(tuples[0].capability, Capability::Contact);
        assert_eq!(tuples[0].value, ReadingValue::Bool(true));
        assert_eq!(tuples[0].recorded_at, changed);
    }

    #[test]
    fn light_tuples_are_stamped_with_now() {
        let light: RawLight = serde_json::from_str(
            r#"{
                "type": "Extended color light",
                "name": "Living room lamp",
                "state": { "on": true, "bri": 200, "ct": 366, "reachable": true }
            }"#,
        )
        .unwrap();

        let tuples = light_measurements(&light, "1", fixed_now());
        let capabilities: Vec<Capability> = tuples.iter().map(|m| m.capability).collect();
        assert_eq!(
            capabilities,
            vec![
                Capability::On,
                Capability::Brightness,
                Capability::ColorTemp,
                Capability::Reachable,
            ]
        );
        assert!(tuples.iter().all(|m| m.recorded_at == fixed_now()));
    }

    #[test]
    fn snapshot_rows_carry_name_and_zone() {
        let rows = sensor_snapshot_rows(&snapshot(), fixed_now());
        assert_eq!(rows.len(), 7);
        assert!(rows
            .iter()
            .all(|r| r.device_name.as_deref() == Some("Hallway")));
        assert!(rows.iter().all(|r| r.zone_name.as_deref() == Some("Hallway")));
        assert!(rows.iter().all(|r| r.device_id == "ABC"));
    }
}
