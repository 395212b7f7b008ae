use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::models::{parse_hue_timestamp, RawSensor, Room, SensorsResponse};

/// Merged view of one physical multi-part sensor.
///
/// A Hue motion sensor reports presence, temperature and light level as
/// three separate v1 records sharing a `uniqueid` prefix; this is the one
/// logical device they add up to. Rebuilt on every fetch, never persisted.
#[derive(Debug, Clone)]
pub struct SensorSnapshot {
    /// The shared `uniqueid` prefix.
    pub id: String,
    pub name: String,
    /// Bridge-local ids of the member records, for room membership lookups.
    pub member_ids: Vec<String>,
    pub zone_name: Option<String>,
    pub presence: Option<bool>,
    pub presence_updated: Option<DateTime<Utc>>,
    pub battery: Option<u8>,
    pub reachable: Option<bool>,
    /// Degrees Celsius (the bridge reports hundredths).
    pub temperature: Option<f64>,
    pub temperature_updated: Option<DateTime<Utc>>,
    pub light_level: Option<i64>,
    pub dark: Option<bool>,
    pub daylight: Option<bool>,
    pub light_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct GroupAccumulator {
    name: Option<String>,
    member_ids: Vec<String>,
    presence: Option<bool>,
    presence_updated: Option<DateTime<Utc>>,
    battery: Option<u8>,
    reachable: Option<bool>,
    temperature: Option<f64>,
    temperature_updated: Option<DateTime<Utc>>,
    light_level: Option<i64>,
    dark: Option<bool>,
    daylight: Option<bool>,
    light_updated: Option<DateTime<Utc>>,
}

/// Merge raw v1 sensor records into logical devices.
///
/// Two passes: fold members into per-prefix accumulators, then keep only
/// groups that resolved a display name. Only the presence-type member
/// carries a usable name, so a nameless group never had one and is dropped.
/// Output order is first-encounter order of the map iteration; consumers
/// treat the result as a set.
pub fn group_sensor_states(sensors: &SensorsResponse) -> Vec<SensorSnapshot> {
    let mut groups: HashMap<String, GroupAccumulator> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for (id, sensor) in sensors {
        let Some(prefix) = identity_prefix(sensor) else {
            continue;
        };

        let group = groups.entry(prefix.clone()).or_insert_with(|| {
            order.push(prefix.clone());
            GroupAccumulator::default()
        });
        group.member_ids.push(id.clone());

        let updated = sensor
            .state
            .lastupdated
            .as_deref()
            .and_then(parse_hue_timestamp);

        match sensor.sensor_type.as_str() {
            "ZLLPresence" => {
                group.name = Some(clean_sensor_name(&sensor.name));
                group.presence = Some(sensor.state.presence.unwrap_or(false));
                group.presence_updated = updated;
                group.battery = sensor.config.battery;
                group.reachable = sensor.config.reachable;
            }
            "ZLLTemperature" => {
                // The bridge reports hundredths of a degree.
                group.temperature = sensor.state.temperature.map(|t| t as f64 / 100.0);
                group.temperature_updated = updated;
            }
            "ZLLLightLevel" => {
                group.light_level = sensor.state.lightlevel;
                group.dark = sensor.state.dark;
                group.daylight = sensor.state.daylight;
                group.light_updated = updated;
            }
            _ => {}
        }
    }

    order
        .into_iter()
        .filter_map(|prefix| {
            let acc = groups.remove(&prefix)?;
            let name = acc.name?;
            Some(SensorSnapshot {
                id: prefix,
                name,
                member_ids: acc.member_ids,
                zone_name: None,
                presence: acc.presence,
                presence_updated: acc.presence_updated,
                battery: acc.battery,
                reachable: acc.reachable,
                temperature: acc.temperature,
                temperature_updated: acc.temperature_updated,
                light_level: acc.light_level,
                dark: acc.dark,
                daylight: acc.daylight,
                light_updated: acc.light_updated,
            })
        })
        .collect()
}

/// Identity prefix of a multi-part sensor: the `uniqueid` up to the first `-`.
fn identity_prefix(sensor: &RawSensor) -> Option<String> {
    let uniqueid = sensor.uniqueid.as_deref()?;
    Some(uniqueid.split('-').next().unwrap_or(uniqueid).to_owned())
}

/// The presence member is named like "Hallway motion sensor"; strip the
/// product suffixes to get the human label.
fn clean_sensor_name(name: &str) -> String {
    name.replace(" motion sensor", "").replace(" presence", "")
}

/// Resolve each snapshot's zone to the first room listing one of its member
/// ids.
pub fn assign_zones(snapshots: &mut [SensorSnapshot], rooms: &[Room]) {
    for snapshot in snapshots {
        snapshot.zone_name = rooms
            .iter()
            .find(|room| {
                room.sensors
                    .iter()
                    .any(|room_sensor| snapshot.member_ids.contains(room_sensor))
            })
            .map(|room| room.name.clone());
    }
}
