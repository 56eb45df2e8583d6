//! Store-backed entry points for the calculation pipeline.

use anyhow::Result;
use tracing::debug;

use super::factors::FactorTable;
use super::report::{calculate, history, AggregateReport, Calculation, HistoryEntry};
use crate::store::RecordStore;

/// Fetch a user's records and sinks concurrently and compute the aggregate.
pub async fn compute_calculation(
    store: &dyn RecordStore,
    factors: &FactorTable,
    user_id: i64,
) -> Result<Calculation> {
    let (records, sinks) = tokio::try_join!(
        store.fetch_activity_records(user_id),
        store.fetch_sink_records(user_id),
    )?;
    debug!(
        user_id,
        records = records.len(),
        sinks = sinks.len(),
        "computing aggregate emissions"
    );
    Ok(calculate(&records, &sinks, factors))
}

pub async fn compute_aggregate(
    store: &dyn RecordStore,
    factors: &FactorTable,
    user_id: i64,
) -> Result<AggregateReport> {
    Ok(compute_calculation(store, factors, user_id).await?.report())
}

pub async fn compute_history(
    store: &dyn RecordStore,
    factors: &FactorTable,
    user_id: i64,
) -> Result<Vec<HistoryEntry>> {
    let records = store.fetch_activity_records(user_id).await?;
    debug!(user_id, records = records.len(), "computing emission history");
    Ok(history(&records, factors))
}
