use std::collections::HashMap;
use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::db::models::{Capability, SensorReading, TriggerKind};

/// Rows fetched per page during a range scan.
pub const SCAN_PAGE_SIZE: usize = 1000;

/// Resume point for the next page: strictly after this row in
/// `(recorded_at, id)` order. The compound key guarantees that rows sharing
/// a timestamp at a page boundary are neither lost nor fetched twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub recorded_at: DateTime<Utc>,
    pub id: Uuid,
}

/// Parse a stored scalar as an activity flag.
///
/// Values are stored in serialized JSON form, but rows written by older
/// clients may hold a bare textual `true`. Strict string equality is the
/// fallback; anything else counts as inactive.
pub fn parse_active(raw: &str) -> bool {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(v) => v == serde_json::Value::Bool(true),
        Err(_) => raw == "true",
    }
}

/// Per-scan map of the last observed boolean per `(device_id, capability)`.
///
/// Local to one scan invocation. Sharing one tracker across scans of
/// overlapping ranges corrupts transition detection.
#[derive(Debug, Default)]
pub struct TransitionTracker {
    prev: HashMap<(String, Capability), bool>,
}

impl TransitionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one reading; returns whether it is an activation event.
    ///
    /// Edge-triggered capabilities emit only on a false→true transition;
    /// level-triggered capabilities emit on every `true`. The tracked state
    /// is updated unconditionally so it always reflects the latest observed
    /// value, including readings that did not qualify as events.
    pub fn observe(&mut self, reading: &SensorReading) -> bool {
        let active = parse_active(&reading.value);
        let key = (reading.device_id.clone(), reading.capability);

        let emit = match reading.capability.trigger_kind() {
            TriggerKind::Edge => active && self.prev.get(&key).copied() != Some(true),
            TriggerKind::Level => active,
        };

        self.prev.insert(key, active);
        emit
    }
}

/// Drive a full paginated scan, yielding only activation events.
///
/// `fetch_page` returns the next batch of rows in ascending
/// `(recorded_at, id)` order, strictly after the cursor when one is given.
/// Pages are processed sequentially: each page's classification depends on
/// state mutated by the previous one. A short or empty page ends the scan.
pub async fn scan_active<F, Fut>(page_size: usize, mut fetch_page: F) -> Result<Vec<SensorReading>>
where
    F: FnMut(Option<ScanCursor>) -> Fut,
    Fut: Future<Output = Result<Vec<SensorReading>>>,
{
    let mut events = Vec::new();
    let mut tracker = TransitionTracker::new();
    let mut cursor: Option<ScanCursor> = None;

    loop {
        let page = fetch_page(cursor).await?;
        let Some(last) = page.last() else { break };
        cursor = Some(ScanCursor {
            recorded_at: last.recorded_at,
            id: last.id,
        });

        let exhausted = page.len() < page_size;
        for reading in &page {
            if tracker.observe(reading) {
                events.push(reading.clone());
            }
        }
        if exhausted {
            break;
        }
    }

    Ok(events)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn reading(device: &str, capability: Capability, value: &str, minute: u32) -> SensorReading {
        SensorReading {
            id: Uuid::new_v4(),
            device_id: device.to_owned(),
            device_name: None,
            capability,
            value: value.to_owned(),
            zone_name: None,
            recorded_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, minute, 0).unwrap(),
        }
    }

    fn bool_reading(device: &str, capability: Capability, v: bool, minute: u32) -> SensorReading {
        reading(device, capability, if v { "true" } else { "false" }, minute)
    }

    /// Serve `rows` in pages of `page_size`, resuming strictly after the
    /// cursor in `(recorded_at, id)` order — the same contract the repository
    /// query implements in SQL.
    async fn scan_rows(rows: Vec<SensorReading>, page_size: usize) -> Vec<SensorReading> {
        let mut sorted = rows;
        sorted.sort_by_key(|r| (r.recorded_at, r.id));

        scan_active(page_size, |cursor| {
            let page: Vec<SensorReading> = sorted
                .iter()
                .filter(|r| match cursor {
                    Some(c) => (r.recorded_at, r.id) > (c.recorded_at, c.id),
                    None => true,
                })
                .take(page_size)
                .cloned()
                .collect();
            async move { Ok(page) }
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn contact_counts_only_open_transitions() {
        let rows: Vec<_> = [false, true, true, false, true]
            .iter()
            .enumerate()
            .map(|(i, &v)| bool_reading("door1", Capability::Contact, v, i as u32))
            .collect();

        let events = scan_rows(rows, SCAN_PAGE_SIZE).await;
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].recorded_at.format("%M").to_string(), "01");
        assert_eq!(events[1].recorded_at.format("%M").to_string(), "04");
    }

    #[tokio::test]
    async fn motion_counts_every_true() {
        let rows: Vec<_> = [true, true, false, true]
            .iter()
            .enumerate()
            .map(|(i, &v)| bool_reading("pir1", Capability::Motion, v, i as u32))
            .collect();

        let events = scan_rows(rows, SCAN_PAGE_SIZE).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn transition_state_is_per_device_and_capability() {
        let rows = vec![
            bool_reading("door1", Capability::Contact, true, 0),
            bool_reading("door2", Capability::Contact, true, 1),
            // door1 stays open — no new event; door2 closes and reopens.
            bool_reading("door1", Capability::Contact, true, 2),
            bool_reading("door2", Capability::Contact, false, 3),
            bool_reading("door2", Capability::Contact, true, 4),
        ];

        let events = scan_rows(rows, SCAN_PAGE_SIZE).await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn pagination_matches_unpaginated_result() {
        let mut rows = Vec::new();
        for i in 0..7 {
            rows.push(bool_reading("pir1", Capability::Motion, i % 2 == 0, i));
            rows.push(bool_reading("door1", Capability::Contact, i % 3 == 0, i));
        }

        let unpaginated = scan_rows(rows.clone(), usize::MAX).await;
        for page_size in [1, 2, 3, 5] {
            let paged = scan_rows(rows.clone(), page_size).await;
            let ids: Vec<Uuid> = paged.iter().map(|r| r.id).collect();
            let expected: Vec<Uuid> = unpaginated.iter().map(|r| r.id).collect();
            assert_eq!(ids, expected, "page_size={page_size}");
        }
    }

    #[tokio::test]
    async fn shared_timestamp_at_page_boundary_is_not_lost_or_duplicated() {
        // Five rows at the same instant with a page size of 2: the cursor
        // must advance by (recorded_at, id), not by timestamp alone.
        let rows: Vec<_> = (0..5)
            .map(|_| bool_reading("pir1", Capability::Motion, true, 30))
            .collect();

        let events = scan_rows(rows, 2).await;
        assert_eq!(events.len(), 5);

        let mut ids: Vec<Uuid> = events.iter().map(|r| r.id).collect();
        let before = ids.len();
        ids.dedup();
        assert_eq!(ids.len(), before);
    }

    #[tokio::test]
    async fn empty_range_yields_no_events() {
        assert!(scan_rows(Vec::new(), SCAN_PAGE_SIZE).await.is_empty());
    }

    #[tokio::test]
    async fn malformed_value_does_not_abort_scan() {
        let rows = vec![
            reading("door1", Capability::Contact, "{broken", 0),
            bool_reading("door1", Capability::Contact, true, 1),
        ];

        let events = scan_rows(rows, SCAN_PAGE_SIZE).await;
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn state_updates_even_for_non_emitted_readings() {
        // The sustained-open reading at minute 1 emits nothing but must
        // still record "open", so the reopen at minute 3 stays a single
        // event after the close at minute 2.
        let rows = vec![
            bool_reading("door1", Capability::Contact, true, 0),
            bool_reading("door1", Capability::Contact, true, 1),
            bool_reading("door1", Capability::Contact, false, 2),
            bool_reading("door1", Capability::Contact, true, 3),
        ];

        let events = scan_rows(rows, SCAN_PAGE_SIZE).await;
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn parse_active_tolerates_both_forms() {
        assert!(parse_active("true"));
        assert!(!parse_active("false"));
        assert!(!parse_active("\"no_contact\""));
        assert!(!parse_active("1"));
        assert!(!parse_active("garbage"));
    }
}
