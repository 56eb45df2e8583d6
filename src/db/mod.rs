//! # Database: PostgreSQL Storage Layer
//!
//! Implements [`RecordStore`] on top of `sqlx::PgPool`. Activity sub-sections
//! and sink payloads live in JSONB columns and are turned into typed records
//! by the fail-soft constructors in [`crate::emissions`].
//!
//! ## Schema
//!
//! - `activity_records`: user_id, excavation, transportation, equipment_usage,
//!   methane_entrapment, created_at
//! - `carbon_sinks`: user_id, sink_type, location, creation_date, and one JSONB
//!   payload column per sink type
//!
//! ## Module Structure
//!
//! Operations are split into submodules by table:
//!
//! - [`activities`]: Activity record CRUD
//! - [`sinks`]: Carbon sink CRUD, batch insert, locked merge-update

mod activities;
mod sinks;

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};

use crate::emissions::{ActivityDraft, ActivityRecord, CarbonSinkRecord, SinkDraft};
use crate::store::{RecordStore, SinkUpdateOutcome};

const SCHEMA: &str = include_str!("../../migrations/001_initial.sql");

pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL using the provided database URL.
    ///
    /// The URL is parsed by hand so percent-encoded credentials are decoded
    /// exactly once and pooler usernames containing dots survive intact.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let url = url::Url::parse(database_url).context("invalid DATABASE_URL")?;
        let username = urlencoding::decode(url.username())?.into_owned();
        let password = url
            .password()
            .map(|p| urlencoding::decode(p).map(|s| s.into_owned()))
            .transpose()?;
        let mut opts = PgConnectOptions::new()
            .host(url.host_str().unwrap_or("localhost"))
            .port(url.port().unwrap_or(5432))
            .database(url.path().trim_start_matches('/'))
            .username(&username);
        if let Some(ref pw) = password {
            opts = opts.password(pw);
        }
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect_with(opts)
            .await?;
        Ok(Database { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Database { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create tables and indexes if they do not exist yet. Idempotent.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("failed to apply schema")?;
        Ok(())
    }

    /// Health check: execute `SELECT 1` to verify database connectivity.
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RecordStore for Database {
    async fn fetch_activity_records(&self, user_id: i64) -> Result<Vec<ActivityRecord>> {
        self.get_activity_records(user_id).await
    }

    async fn fetch_sink_records(&self, user_id: i64) -> Result<Vec<CarbonSinkRecord>> {
        self.get_carbon_sinks(user_id).await
    }

    async fn insert_activity(&self, user_id: i64, draft: ActivityDraft) -> Result<ActivityRecord> {
        self.create_activity_record(user_id, &draft).await
    }

    async fn update_activity(
        &self,
        user_id: i64,
        id: i64,
        draft: ActivityDraft,
    ) -> Result<Option<ActivityRecord>> {
        self.update_activity_record(user_id, id, &draft).await
    }

    async fn delete_activity(&self, user_id: i64, id: i64) -> Result<bool> {
        self.delete_activity_record(user_id, id).await
    }

    async fn insert_sinks(
        &self,
        user_id: i64,
        drafts: Vec<SinkDraft>,
    ) -> Result<Vec<CarbonSinkRecord>> {
        self.create_carbon_sinks(user_id, drafts).await
    }

    async fn update_sink(
        &self,
        user_id: i64,
        id: i64,
        update: SinkDraft,
    ) -> Result<SinkUpdateOutcome> {
        self.update_carbon_sink(user_id, id, update).await
    }

    async fn delete_sink(&self, user_id: i64, id: i64) -> Result<bool> {
        self.delete_carbon_sink(user_id, id).await
    }

    async fn health_check(&self) -> Result<()> {
        Database::health_check(self).await
    }
}
