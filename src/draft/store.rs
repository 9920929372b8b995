use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::error::AppError;
use crate::models::{CourseRecord, Semester};

/// Draft slot for one semester. Regulation is deliberately not part of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DraftKey(Semester);

impl DraftKey {
    pub fn new(semester: Semester) -> Self {
        Self(semester)
    }

    pub fn storage_key(self) -> String {
        format!("courses-semester-{}", self.0)
    }
}

impl fmt::Display for DraftKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn get(&self, key: DraftKey) -> Result<Option<Vec<CourseRecord>>, AppError>;
    async fn set(&self, key: DraftKey, records: &[CourseRecord]) -> Result<(), AppError>;
    async fn clear(&self, key: DraftKey) -> Result<(), AppError>;
}

#[derive(Default)]
pub struct MemoryDraftStore {
    drafts: Mutex<HashMap<DraftKey, Vec<CourseRecord>>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<DraftKey, Vec<CourseRecord>>>, AppError> {
        self.drafts.lock().map_err(|_| AppError::InternalServerError)
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn get(&self, key: DraftKey) -> Result<Option<Vec<CourseRecord>>, AppError> {
        Ok(self.lock()?.get(&key).cloned())
    }

    async fn set(&self, key: DraftKey, records: &[CourseRecord]) -> Result<(), AppError> {
        self.lock()?.insert(key, records.to_vec());
        Ok(())
    }

    async fn clear(&self, key: DraftKey) -> Result<(), AppError> {
        self.lock()?.remove(&key);
        Ok(())
    }
}

/// Device-local drafts kept in the `drafts` table as JSON payloads.
#[derive(Clone)]
pub struct SqliteDraftStore {
    db: SqlitePool,
}

impl SqliteDraftStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DraftStore for SqliteDraftStore {
    async fn get(&self, key: DraftKey) -> Result<Option<Vec<CourseRecord>>, AppError> {
        let payload: Option<String> =
            sqlx::query_scalar("SELECT payload FROM drafts WHERE draft_key = ?")
                .bind(key.storage_key())
                .fetch_optional(&self.db)
                .await?;

        match payload {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: DraftKey, records: &[CourseRecord]) -> Result<(), AppError> {
        let payload = serde_json::to_string(records)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO drafts (draft_key, payload, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(draft_key) DO UPDATE SET
                payload = excluded.payload,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(key.storage_key())
        .bind(payload)
        .bind(now)
        .execute(&self.db)
        .await?;

        Ok(())
    }

    async fn clear(&self, key: DraftKey) -> Result<(), AppError> {
        sqlx::query("DELETE FROM drafts WHERE draft_key = ?")
            .bind(key.storage_key())
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
