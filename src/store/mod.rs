//! # Store: Record Storage Abstraction
//!
//! The calculation pipeline and HTTP handlers talk to storage only through
//! [`RecordStore`]. Production uses [`crate::db::Database`] (PostgreSQL);
//! tests and the `offline` subcommand use [`MemoryStore`].
//!
//! Every operation is scoped to one owning user. Lookups of another user's
//! record behave exactly like lookups of a missing record.

mod memory;

pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;

use crate::emissions::{
    ActivityDraft, ActivityRecord, CarbonSinkRecord, SinkDraft, ValidationError,
};

/// Result of a merge-and-revalidate sink update.
#[derive(Debug)]
pub enum SinkUpdateOutcome {
    Updated(CarbonSinkRecord),
    NotFound,
    Invalid(ValidationError),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// All activity records of a user, newest first.
    async fn fetch_activity_records(&self, user_id: i64) -> Result<Vec<ActivityRecord>>;

    /// All carbon sinks of a user, in creation order.
    async fn fetch_sink_records(&self, user_id: i64) -> Result<Vec<CarbonSinkRecord>>;

    /// Insert an already-validated activity draft.
    async fn insert_activity(&self, user_id: i64, draft: ActivityDraft) -> Result<ActivityRecord>;

    /// Replace the sub-sections present in `draft` on an owned record.
    /// Returns `None` when the record is missing or owned by someone else.
    async fn update_activity(
        &self,
        user_id: i64,
        id: i64,
        draft: ActivityDraft,
    ) -> Result<Option<ActivityRecord>>;

    async fn delete_activity(&self, user_id: i64, id: i64) -> Result<bool>;

    /// Insert already-validated sink drafts, all or nothing.
    async fn insert_sinks(
        &self,
        user_id: i64,
        drafts: Vec<SinkDraft>,
    ) -> Result<Vec<CarbonSinkRecord>>;

    /// Merge a partial update onto an owned sink and revalidate the result
    /// while holding that record exclusively.
    async fn update_sink(
        &self,
        user_id: i64,
        id: i64,
        update: SinkDraft,
    ) -> Result<SinkUpdateOutcome>;

    async fn delete_sink(&self, user_id: i64, id: i64) -> Result<bool>;

    /// Verify the backend is reachable.
    async fn health_check(&self) -> Result<()>;
}
