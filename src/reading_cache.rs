use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;

use crate::db::models::{Capability, SensorReading};

/// In-memory store of the most recent reading per `(device_id, Capability)`.
///
/// Wrapped in `Arc` so it can be cheaply cloned and shared across tasks.
/// Uses `tokio::sync::RwLock` so concurrent readers never block each other.
#[derive(Clone, Default)]
pub struct ReadingCache {
    inner: Arc<RwLock<HashMap<(String, Capability), SensorReading>>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrite the cached reading for `(reading.device_id, reading.capability)`.
    pub async fn update(&self, reading: SensorReading) {
        self.inner
            .write()
            .await
            .insert((reading.device_id.clone(), reading.capability), reading);
    }

    /// Return a snapshot of all latest readings across every device and capability.
    pub async fn all(&self) -> Vec<SensorReading> {
        self.inner.read().await.values().cloned().collect()
    }

    /// Number of distinct devices with at least one cached reading.
    pub async fn device_count(&self) -> usize {
        let map = self.inner.read().await;
        let mut devices: Vec<&str> = map.keys().map(|(id, _)| id.as_str()).collect();
        devices.sort_unstable();
        devices.dedup();
        devices.len()
    }

    /// Return the latest reading for a specific `(device_id, capability)`, if present.
    pub async fn get(&self, device_id: &str, capability: Capability) -> Option<SensorReading> {
        self.inner
            .read()
            .await
            .get(&(device_id.to_owned(), capability))
            .cloned()
    }

    /// Return all latest readings for a specific device (one per capability).
    pub async fn get_device(&self, device_id: &str) -> Vec<SensorReading> {
        self.inner
            .read()
            .await
            .iter()
            .filter(|((id, _), _)| id == device_id)
            .map(|(_, r)| r.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::*;

    fn make_reading(device_id: &str, capability: Capability, value: &str) -> SensorReading {
        SensorReading {
            id: Uuid::new_v4(),
            device_id: device_id.to_owned(),
            device_name: None,
            capability,
            value: value.to_owned(),
            zone_name: None,
            recorded_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn empty_cache_returns_nothing() {
        let cache = ReadingCache::new();
        assert!(cache.all().await.is_empty());
        assert_eq!(cache.device_count().await, 0);
        assert!(cache.get("dev1", Capability::Temperature).await.is_none());
        assert!(cache.get_device("dev1").await.is_empty());
    }

    #[tokio::test]
    async fn update_overwrites_previous_reading() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev1", Capability::Temperature, "20.0")).await;
        cache.update(make_reading("dev1", Capability::Temperature, "25.0")).await;

        let got = cache.get("dev1", Capability::Temperature).await.unwrap();
        assert_eq!(got.value, "25.0");
        assert_eq!(cache.all().await.len(), 1);
    }

    #[tokio::test]
    async fn capabilities_are_separate_entries() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev1", Capability::Temperature, "20.5")).await;
        cache.update(make_reading("dev1", Capability::Presence, "true")).await;

        assert_eq!(cache.all().await.len(), 2);
        assert_eq!(cache.get_device("dev1").await.len(), 2);
        assert_eq!(cache.device_count().await, 1);
    }

    #[tokio::test]
    async fn device_count_spans_capabilities_not_entries() {
        let cache = ReadingCache::new();
        cache.update(make_reading("dev1", Capability::Presence, "true")).await;
        cache.update(make_reading("dev1", Capability::Battery, "90")).await;
        cache.update(make_reading("dev2", Capability::Contact, "false")).await;

        assert_eq!(cache.all().await.len(), 3);
        assert_eq!(cache.device_count().await, 2);
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let cache = ReadingCache::new();
        let clone = cache.clone();

        cache.update(make_reading("dev1", Capability::Reachable, "true")).await;

        let got = clone.get("dev1", Capability::Reachable).await.unwrap();
        assert_eq!(got.value, "true");
    }
}
