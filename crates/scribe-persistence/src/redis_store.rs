//! Redis-backed session store.
//!
//! Each thread is stored as a JSON string under `{namespace}:thread:{id}`,
//! and thread ids are indexed in the set `{namespace}:threads`.

use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use scribe_core::persistence::{SessionStore, ThreadId};
use scribe_core::state::ConversationState;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisSessionStore {
    connection: ConnectionManager,
    namespace: String,
    ttl: Option<Duration>,
}

impl RedisSessionStore {
    pub async fn new(url: &str) -> anyhow::Result<Self> {
        Self::builder().url(url).build().await
    }

    pub fn builder() -> RedisSessionStoreBuilder {
        RedisSessionStoreBuilder::default()
    }

    fn key_for_thread(&self, thread_id: &ThreadId) -> String {
        format!("{}:thread:{}", self.namespace, thread_id)
    }

    fn threads_index_key(&self) -> String {
        format!("{}:threads", self.namespace)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> anyhow::Result<()> {
        let key = self.key_for_thread(thread_id);
        let json = serde_json::to_string(state)
            .context("Failed to serialize conversation state to JSON")?;
        let mut conn = self.connection.clone();

        match self.ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(&key, json, ttl.as_secs())
                .await
                .context("Failed to write expiring session to Redis")?,
            None => conn
                .set::<_, _, ()>(&key, json)
                .await
                .context("Failed to write session to Redis")?,
        }

        conn.sadd::<_, _, ()>(self.threads_index_key(), thread_id)
            .await
            .context("Failed to update session index")?;

        tracing::debug!(thread_id = %thread_id, namespace = %self.namespace, "Saved conversation state to Redis");
        Ok(())
    }

    async fn load(&self, thread_id: &ThreadId) -> anyhow::Result<Option<ConversationState>> {
        let mut conn = self.connection.clone();
        let json: Option<String> = conn
            .get(self.key_for_thread(thread_id))
            .await
            .context("Failed to read session from Redis")?;

        json.map(|data| {
            serde_json::from_str(&data).context("Failed to deserialize conversation state from JSON")
        })
        .transpose()
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> anyhow::Result<()> {
        let mut conn = self.connection.clone();

        conn.del::<_, ()>(self.key_for_thread(thread_id))
            .await
            .context("Failed to delete session from Redis")?;
        conn.srem::<_, _, ()>(self.threads_index_key(), thread_id)
            .await
            .context("Failed to update session index")?;

        tracing::debug!(thread_id = %thread_id, namespace = %self.namespace, "Deleted thread from Redis");
        Ok(())
    }

    async fn list_threads(&self) -> anyhow::Result<Vec<ThreadId>> {
        let mut conn = self.connection.clone();
        let mut threads: Vec<String> = conn
            .smembers(self.threads_index_key())
            .await
            .context("Failed to list sessions in Redis")?;
        threads.sort();
        Ok(threads)
    }
}

#[derive(Default)]
pub struct RedisSessionStoreBuilder {
    url: Option<String>,
    namespace: Option<String>,
    ttl: Option<Duration>,
}

impl RedisSessionStoreBuilder {
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Key prefix (default: "scribe").
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Expire idle threads after `ttl`. A suspended interrupt expires with them.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub async fn build(self) -> anyhow::Result<RedisSessionStore> {
        let url = self
            .url
            .ok_or_else(|| anyhow::anyhow!("Redis URL is required"))?;

        let client = redis::Client::open(url.as_str()).context("Invalid Redis URL")?;
        let connection = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        Ok(RedisSessionStore {
            connection,
            namespace: self.namespace.unwrap_or_else(|| "scribe".to_string()),
            ttl: self.ttl,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::sample_state;

    #[tokio::test]
    #[ignore] // Requires a running Redis instance
    async fn redis_round_trip() {
        let store = RedisSessionStore::builder()
            .url("redis://127.0.0.1:6379")
            .namespace("scribe_test")
            .build()
            .await
            .expect("Failed to connect to Redis");

        let thread_id = "redis-thread".to_string();
        let state = sample_state();
        store.save(&thread_id, &state).await.unwrap();

        assert_eq!(store.load(&thread_id).await.unwrap(), Some(state));
        assert!(store.list_threads().await.unwrap().contains(&thread_id));

        store.delete_thread(&thread_id).await.unwrap();
        assert!(store.load(&thread_id).await.unwrap().is_none());
    }
}
