//! In-memory [`RecordStore`] backed by a mutex-guarded pair of vectors.
//!
//! Ids are assigned from per-table counters starting at 1. A single lock
//! covers both tables, so batch inserts and merge-updates are atomic with
//! respect to every other operation.

use anyhow::Result;
use async_trait::async_trait;
use std::cmp::Reverse;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{RecordStore, SinkUpdateOutcome};
use crate::emissions::{ActivityDraft, ActivityRecord, CarbonSinkRecord, SinkDraft};

fn lock_or_recover<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct Tables {
    next_activity_id: i64,
    next_sink_id: i64,
    activities: Vec<ActivityRecord>,
    sinks: Vec<CarbonSinkRecord>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with records as they are, keeping their ids and owners.
    pub fn seeded(activities: Vec<ActivityRecord>, sinks: Vec<CarbonSinkRecord>) -> Self {
        let tables = Tables {
            next_activity_id: activities.iter().map(|r| r.id).max().unwrap_or(0),
            next_sink_id: sinks.iter().map(|s| s.id).max().unwrap_or(0),
            activities,
            sinks,
        };
        MemoryStore {
            tables: Mutex::new(tables),
        }
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn fetch_activity_records(&self, user_id: i64) -> Result<Vec<ActivityRecord>> {
        let tables = lock_or_recover(&self.tables);
        let mut records: Vec<ActivityRecord> = tables
            .activities
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (Reverse(r.created_at), Reverse(r.id)));
        Ok(records)
    }

    async fn fetch_sink_records(&self, user_id: i64) -> Result<Vec<CarbonSinkRecord>> {
        let tables = lock_or_recover(&self.tables);
        Ok(tables
            .sinks
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn insert_activity(&self, user_id: i64, draft: ActivityDraft) -> Result<ActivityRecord> {
        let mut tables = lock_or_recover(&self.tables);
        tables.next_activity_id += 1;
        let record = draft.into_record(tables.next_activity_id, user_id);
        tables.activities.push(record.clone());
        Ok(record)
    }

    async fn update_activity(
        &self,
        user_id: i64,
        id: i64,
        draft: ActivityDraft,
    ) -> Result<Option<ActivityRecord>> {
        let mut tables = lock_or_recover(&self.tables);
        let Some(existing) = tables
            .activities
            .iter_mut()
            .find(|r| r.id == id && r.user_id == user_id)
        else {
            return Ok(None);
        };

        draft.section_updates().apply_to(existing);
        if let Some(date) = draft.date {
            existing.created_at = date;
        }
        Ok(Some(existing.clone()))
    }

    async fn delete_activity(&self, user_id: i64, id: i64) -> Result<bool> {
        let mut tables = lock_or_recover(&self.tables);
        let before = tables.activities.len();
        tables
            .activities
            .retain(|r| !(r.id == id && r.user_id == user_id));
        Ok(tables.activities.len() < before)
    }

    async fn insert_sinks(
        &self,
        user_id: i64,
        drafts: Vec<SinkDraft>,
    ) -> Result<Vec<CarbonSinkRecord>> {
        let mut tables = lock_or_recover(&self.tables);
        let mut inserted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            tables.next_sink_id += 1;
            inserted.push(draft.into_record(tables.next_sink_id, user_id));
        }
        tables.sinks.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update_sink(
        &self,
        user_id: i64,
        id: i64,
        update: SinkDraft,
    ) -> Result<SinkUpdateOutcome> {
        let mut tables = lock_or_recover(&self.tables);
        let Some(existing) = tables
            .sinks
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
        else {
            return Ok(SinkUpdateOutcome::NotFound);
        };

        let merged = update.merged_onto(existing);
        if let Err(e) = merged.validate() {
            return Ok(SinkUpdateOutcome::Invalid(e));
        }
        *existing = merged.into_record(id, user_id);
        Ok(SinkUpdateOutcome::Updated(existing.clone()))
    }

    async fn delete_sink(&self, user_id: i64, id: i64) -> Result<bool> {
        let mut tables = lock_or_recover(&self.tables);
        let before = tables.sinks.len();
        tables.sinks.retain(|s| !(s.id == id && s.user_id == user_id));
        Ok(tables.sinks.len() < before)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn activity(v: serde_json::Value) -> ActivityDraft {
        serde_json::from_value(v).unwrap()
    }

    fn sink(v: serde_json::Value) -> SinkDraft {
        serde_json::from_value(v).unwrap()
    }

    fn afforestation(area: f64) -> SinkDraft {
        sink(json!({
            "type": "Afforestation",
            "location": "Jharia",
            "afforestation": {"area": area, "treePlantingRate": 1, "treeType": "Sal"}
        }))
    }

    #[tokio::test]
    async fn records_are_scoped_to_owner() {
        let store = MemoryStore::new();
        store.insert_activity(1, ActivityDraft::default()).await.unwrap();
        store.insert_activity(2, ActivityDraft::default()).await.unwrap();
        assert_eq!(store.fetch_activity_records(1).await.unwrap().len(), 1);
        assert!(!store.delete_activity(2, 1).await.unwrap());
        assert!(store.delete_activity(1, 1).await.unwrap());
        assert!(store.fetch_activity_records(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_returns_newest_first() {
        let store = MemoryStore::new();
        store
            .insert_activity(1, activity(json!({"date": "2024-01-01T00:00:00Z"})))
            .await
            .unwrap();
        store
            .insert_activity(1, activity(json!({"date": "2024-06-01T00:00:00Z"})))
            .await
            .unwrap();
        let ids: Vec<i64> = store
            .fetch_activity_records(1)
            .await
            .unwrap()
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn update_replaces_only_provided_sections() {
        let store = MemoryStore::new();
        store
            .insert_activity(
                1,
                activity(json!({
                    "excavation": {"coalAmount": 1, "method": "Surface Mining", "fuelType": "coal", "distance": 0, "equipmentUsed": "x"},
                    "methaneEntrapment": {"captureRate": 0, "utilizationMethod": "Flaring", "dischargeAmount": 4, "conversionEfficiency": 0}
                })),
            )
            .await
            .unwrap();
        let updated = store
            .update_activity(
                1,
                1,
                activity(json!({
                    "excavation": {"coalAmount": 9, "method": "Surface Mining", "fuelType": "coal", "distance": 0, "equipmentUsed": "x"}
                })),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.excavation.unwrap().coal_amount, 9.0);
        assert_eq!(updated.methane_entrapment.unwrap().discharge_amount, 4.0);

        let cleared = store
            .update_activity(1, 1, activity(json!({"methaneEntrapment": null})))
            .await
            .unwrap()
            .unwrap();
        assert!(cleared.methane_entrapment.is_none());
        assert!(cleared.excavation.is_some());
        assert!(store
            .update_activity(2, 1, ActivityDraft::default())
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn sink_update_merges_and_revalidates() {
        let store = MemoryStore::new();
        store.insert_sinks(5, vec![afforestation(10.0)]).await.unwrap();

        match store
            .update_sink(5, 1, sink(json!({"location": "Bokaro"})))
            .await
            .unwrap()
        {
            SinkUpdateOutcome::Updated(s) => {
                assert_eq!(s.location, "Bokaro");
                assert_eq!(s.afforestation.unwrap().area, 10.0);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }

        assert!(matches!(
            store
                .update_sink(5, 1, sink(json!({"type": "Green Technology"})))
                .await
                .unwrap(),
            SinkUpdateOutcome::Invalid(_)
        ));
        assert!(matches!(
            store.update_sink(6, 1, SinkDraft::default()).await.unwrap(),
            SinkUpdateOutcome::NotFound
        ));
    }

    #[tokio::test]
    async fn batch_insert_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let inserted = store
            .insert_sinks(1, vec![afforestation(1.0), afforestation(2.0)])
            .await
            .unwrap();
        let ids: Vec<i64> = inserted.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(store.fetch_sink_records(1).await.unwrap().len(), 2);
    }
}
