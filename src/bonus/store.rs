use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sqlx::PgPool;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("bonus store unavailable: {0}")]
    Unavailable(String),
    #[error("bonus store query failed: {0}")]
    Database(#[from] sqlx::Error),
}

/// String key-value slot storage for per-day bonus schedules.
#[async_trait]
pub trait BonusStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Unconditional write, replacing any existing value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Atomically store `value` unless `key` already holds one. Returns
    /// whichever value is stored afterwards, so concurrent callers agree.
    async fn insert_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError>;

    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StoreError> {
        self.slots
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))
    }

    pub fn len(&self) -> usize {
        self.slots().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BonusStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.slots()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.slots()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError> {
        Ok(self
            .slots()?
            .entry(key.to_string())
            .or_insert_with(|| value.to_string())
            .clone())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.slots()?.remove(key);
        Ok(())
    }
}

/// Postgres-backed store; the `bonus_schedules` primary key makes
/// `insert_if_absent` a compare-and-set across processes.
#[derive(Clone)]
pub struct PgBonusStore {
    db: PgPool,
}

impl PgBonusStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BonusStore for PgBonusStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = sqlx::query_scalar::<_, String>(
            r#"SELECT value FROM bonus_schedules WHERE key = $1"#,
        )
        .bind(key)
        .fetch_optional(&self.db)
        .await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bonus_schedules (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert_if_absent(&self, key: &str, value: &str) -> Result<String, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO bonus_schedules (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key) DO NOTHING
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await?;

        // Separate statement so a row committed by a concurrent winner is visible.
        let stored = sqlx::query_scalar::<_, String>(
            r#"SELECT value FROM bonus_schedules WHERE key = $1"#,
        )
        .bind(key)
        .fetch_one(&self.db)
        .await?;
        Ok(stored)
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query(r#"DELETE FROM bonus_schedules WHERE key = $1"#)
            .bind(key)
            .execute(&self.db)
            .await?;
        Ok(())
    }
}
