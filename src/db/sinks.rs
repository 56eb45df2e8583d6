//! Carbon sink operations.
//!
//! Batch inserts run in one transaction so a failing row leaves nothing
//! behind. Updates lock the target row with `SELECT ... FOR UPDATE`, merge the
//! partial update onto it, and revalidate the merged record before writing.

use super::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::emissions::{CarbonSinkRecord, SinkDraft};
use crate::store::SinkUpdateOutcome;

#[derive(sqlx::FromRow)]
struct SinkRow {
    id: i64,
    user_id: i64,
    sink_type: String,
    location: String,
    creation_date: DateTime<Utc>,
    afforestation: Option<Value>,
    biodiversity_conservation: Option<Value>,
    green_technology: Option<Value>,
}

impl SinkRow {
    fn into_record(self) -> CarbonSinkRecord {
        CarbonSinkRecord::from_stored(
            self.id,
            self.user_id,
            &self.sink_type,
            self.location,
            self.creation_date,
            self.afforestation,
            self.biodiversity_conservation,
            self.green_technology,
        )
    }
}

const COLUMNS: &str = "id, user_id, sink_type, location, creation_date, \
                       afforestation, biodiversity_conservation, green_technology";

fn non_null(v: Option<Value>) -> Option<Value> {
    v.filter(|v| !v.is_null())
}

impl Database {
    pub async fn get_carbon_sinks(&self, user_id: i64) -> Result<Vec<CarbonSinkRecord>> {
        let rows = sqlx::query_as::<_, SinkRow>(&format!(
            "SELECT {COLUMNS} FROM carbon_sinks WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(SinkRow::into_record).collect())
    }

    /// Insert validated drafts in a single transaction.
    pub async fn create_carbon_sinks(
        &self,
        user_id: i64,
        drafts: Vec<SinkDraft>,
    ) -> Result<Vec<CarbonSinkRecord>> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let row = sqlx::query_as::<_, SinkRow>(&format!(
                "INSERT INTO carbon_sinks
                    (user_id, sink_type, location, creation_date,
                     afforestation, biodiversity_conservation, green_technology)
                 VALUES ($1, $2, $3, COALESCE($4, NOW()), $5, $6, $7)
                 RETURNING {COLUMNS}"
            ))
            .bind(user_id)
            .bind(draft.sink_type)
            .bind(draft.location)
            .bind(draft.creation_date)
            .bind(non_null(draft.afforestation))
            .bind(non_null(draft.biodiversity_conservation))
            .bind(non_null(draft.green_technology))
            .fetch_one(&mut *tx)
            .await?;
            inserted.push(row.into_record());
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Merge `update` onto the user's sink `id` under a row lock.
    pub async fn update_carbon_sink(
        &self,
        user_id: i64,
        id: i64,
        update: SinkDraft,
    ) -> Result<SinkUpdateOutcome> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_as::<_, SinkRow>(&format!(
            "SELECT {COLUMNS} FROM carbon_sinks
             WHERE id = $1 AND user_id = $2
             FOR UPDATE"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            return Ok(SinkUpdateOutcome::NotFound);
        };

        let merged = update.merged_onto(&existing.into_record());
        if let Err(e) = merged.validate() {
            return Ok(SinkUpdateOutcome::Invalid(e));
        }

        let row = sqlx::query_as::<_, SinkRow>(&format!(
            "UPDATE carbon_sinks SET
                sink_type = $3,
                location = $4,
                creation_date = COALESCE($5, creation_date),
                afforestation = $6,
                biodiversity_conservation = $7,
                green_technology = $8,
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(merged.sink_type)
        .bind(merged.location)
        .bind(merged.creation_date)
        .bind(non_null(merged.afforestation))
        .bind(non_null(merged.biodiversity_conservation))
        .bind(non_null(merged.green_technology))
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(SinkUpdateOutcome::Updated(row.into_record()))
    }

    pub async fn delete_carbon_sink(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM carbon_sinks WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
