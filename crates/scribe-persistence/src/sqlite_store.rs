//! SQLite-backed session store, the default durable backend.
//!
//! A single file holds every thread, so a suspended interrupt survives a
//! process restart without any external service.

use anyhow::Context;
use async_trait::async_trait;
use scribe_core::persistence::{SessionStore, ThreadId};
use scribe_core::state::ConversationState;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::str::FromStr;

#[derive(Clone)]
pub struct SqliteSessionStore {
    pool: SqlitePool,
    table_name: String,
}

impl SqliteSessionStore {
    /// Opens (creating if missing) the database at `url`, e.g. `sqlite://scribe.db`.
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        Self::builder().url(url).build().await
    }

    pub fn builder() -> SqliteSessionStoreBuilder {
        SqliteSessionStoreBuilder::default()
    }

    async fn ensure_table(&self) -> anyhow::Result<()> {
        let create_table_sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                thread_id TEXT PRIMARY KEY,
                state TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            self.table_name
        );

        sqlx::query(&create_table_sql)
            .execute(&self.pool)
            .await
            .context("Failed to create sessions table")?;

        Ok(())
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> anyhow::Result<()> {
        let json = serde_json::to_string(state)
            .context("Failed to serialize conversation state to JSON")?;

        let query = format!(
            r#"
            INSERT INTO {} (thread_id, state)
            VALUES (?1, ?2)
            ON CONFLICT (thread_id)
            DO UPDATE SET state = excluded.state, updated_at = CURRENT_TIMESTAMP
            "#,
            self.table_name
        );

        sqlx::query(&query)
            .bind(thread_id)
            .bind(&json)
            .execute(&self.pool)
            .await
            .context("Failed to write session row to SQLite")?;

        tracing::debug!(
            thread_id = %thread_id,
            table = %self.table_name,
            messages = state.messages.len(),
            pending = state.pending.is_some(),
            "Saved conversation state to SQLite"
        );

        Ok(())
    }

    async fn load(&self, thread_id: &ThreadId) -> anyhow::Result<Option<ConversationState>> {
        let query = format!("SELECT state FROM {} WHERE thread_id = ?1", self.table_name);

        let row: Option<(String,)> = sqlx::query_as(&query)
            .bind(thread_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to read session row from SQLite")?;

        row.map(|(json,)| {
            serde_json::from_str(&json).context("Failed to deserialize conversation state from JSON")
        })
        .transpose()
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> anyhow::Result<()> {
        let query = format!("DELETE FROM {} WHERE thread_id = ?1", self.table_name);

        sqlx::query(&query)
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .context("Failed to delete session row from SQLite")?;

        tracing::debug!(thread_id = %thread_id, table = %self.table_name, "Deleted thread from SQLite");
        Ok(())
    }

    async fn list_threads(&self) -> anyhow::Result<Vec<ThreadId>> {
        let query = format!(
            "SELECT thread_id FROM {} ORDER BY updated_at DESC, thread_id",
            self.table_name
        );

        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list session rows in SQLite")?;

        Ok(rows
            .into_iter()
            .map(|row| row.get::<String, _>("thread_id"))
            .collect())
    }
}

#[derive(Default)]
pub struct SqliteSessionStoreBuilder {
    url: Option<String>,
    table_name: Option<String>,
    max_connections: Option<u32>,
}

impl SqliteSessionStoreBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Table holding one row per thread (default: "scribe_sessions").
    pub fn table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    /// Pool ceiling (default: 5). In-memory databases always use one connection.
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    pub async fn build(self) -> anyhow::Result<SqliteSessionStore> {
        let url = self
            .url
            .ok_or_else(|| anyhow::anyhow!("SQLite URL is required"))?;

        let options = SqliteConnectOptions::from_str(&url)
            .with_context(|| format!("Invalid SQLite URL '{url}'"))?
            .create_if_missing(true);

        // Every connection to `:memory:` opens a separate database.
        let max_connections = if url.contains(":memory:") {
            1
        } else {
            self.max_connections.unwrap_or(5)
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .context("Failed to open SQLite database")?;

        let store = SqliteSessionStore {
            pool,
            table_name: self
                .table_name
                .unwrap_or_else(|| "scribe_sessions".to_string()),
        };

        store
            .ensure_table()
            .await
            .context("Failed to initialize database schema")?;

        Ok(store)
    }
}
