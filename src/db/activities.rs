//! Activity record operations.
//!
//! Sub-sections are written as submitted. Updates overlay only the sections
//! present in the request via `COALESCE`, so a single statement both checks
//! ownership and applies the change.

use super::Database;
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::emissions::{ActivityDraft, ActivityRecord};

#[derive(sqlx::FromRow)]
struct ActivityRow {
    id: i64,
    user_id: i64,
    excavation: Option<Value>,
    transportation: Option<Value>,
    equipment_usage: Option<Value>,
    methane_entrapment: Option<Value>,
    created_at: DateTime<Utc>,
}

impl ActivityRow {
    fn into_record(self) -> ActivityRecord {
        ActivityRecord::from_stored(
            self.id,
            self.user_id,
            self.excavation,
            self.transportation,
            self.equipment_usage,
            self.methane_entrapment,
            self.created_at,
        )
    }
}

const COLUMNS: &str =
    "id, user_id, excavation, transportation, equipment_usage, methane_entrapment, created_at";

impl Database {
    /// All records of a user, newest first.
    pub async fn get_activity_records(&self, user_id: i64) -> Result<Vec<ActivityRecord>> {
        let rows = sqlx::query_as::<_, ActivityRow>(&format!(
            "SELECT {COLUMNS} FROM activity_records
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(ActivityRow::into_record).collect())
    }

    pub async fn create_activity_record(
        &self,
        user_id: i64,
        draft: &ActivityDraft,
    ) -> Result<ActivityRecord> {
        let sections = draft.sections();
        let row = sqlx::query_as::<_, ActivityRow>(&format!(
            "INSERT INTO activity_records
                (user_id, excavation, transportation, equipment_usage, methane_entrapment, created_at)
             VALUES ($1, $2, $3, $4, $5, COALESCE($6, NOW()))
             RETURNING {COLUMNS}"
        ))
        .bind(user_id)
        .bind(sections.excavation)
        .bind(sections.transportation)
        .bind(sections.equipment_usage)
        .bind(sections.methane_entrapment)
        .bind(draft.date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.into_record())
    }

    /// Returns `None` when no record with this id belongs to the user.
    pub async fn update_activity_record(
        &self,
        user_id: i64,
        id: i64,
        draft: &ActivityDraft,
    ) -> Result<Option<ActivityRecord>> {
        // SQL NULL keeps the column; a JSON null clears it.
        let sections = draft.section_updates();
        let row = sqlx::query_as::<_, ActivityRow>(&format!(
            "UPDATE activity_records SET
                excavation = NULLIF(COALESCE($3, excavation), 'null'::jsonb),
                transportation = NULLIF(COALESCE($4, transportation), 'null'::jsonb),
                equipment_usage = NULLIF(COALESCE($5, equipment_usage), 'null'::jsonb),
                methane_entrapment = NULLIF(COALESCE($6, methane_entrapment), 'null'::jsonb),
                created_at = COALESCE($7, created_at),
                updated_at = NOW()
             WHERE id = $1 AND user_id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .bind(user_id)
        .bind(sections.excavation)
        .bind(sections.transportation)
        .bind(sections.equipment_usage)
        .bind(sections.methane_entrapment)
        .bind(draft.date)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(ActivityRow::into_record))
    }

    pub async fn delete_activity_record(&self, user_id: i64, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM activity_records WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
