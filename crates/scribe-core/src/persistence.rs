//! Session store traits for keeping conversation state between runs.

use crate::state::ConversationState;
use async_trait::async_trait;
use std::collections::HashMap;

/// Unique identifier for a conversation thread.
pub type ThreadId = String;

/// Durable key-value store holding one [`ConversationState`] per thread.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Replace the stored state for a thread.
    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> anyhow::Result<()>;

    /// Returns None if the thread has never been saved.
    async fn load(&self, thread_id: &ThreadId) -> anyhow::Result<Option<ConversationState>>;

    async fn delete_thread(&self, thread_id: &ThreadId) -> anyhow::Result<()>;

    async fn list_threads(&self) -> anyhow::Result<Vec<ThreadId>>;
}

/// In-memory store for tests and development.
/// State is lost on restart.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    states: std::sync::RwLock<HashMap<ThreadId, ConversationState>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, thread_id: &ThreadId, state: &ConversationState) -> anyhow::Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock on in-memory session store"))?;
        states.insert(thread_id.clone(), state.clone());
        tracing::debug!(thread_id = %thread_id, messages = state.messages.len(), "Saved conversation state to memory");
        Ok(())
    }

    async fn load(&self, thread_id: &ThreadId) -> anyhow::Result<Option<ConversationState>> {
        let states = self
            .states
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock on in-memory session store"))?;
        Ok(states.get(thread_id).cloned())
    }

    async fn delete_thread(&self, thread_id: &ThreadId) -> anyhow::Result<()> {
        let mut states = self
            .states
            .write()
            .map_err(|_| anyhow::anyhow!("Failed to acquire write lock on in-memory session store"))?;
        states.remove(thread_id);
        tracing::debug!(thread_id = %thread_id, "Deleted thread from memory");
        Ok(())
    }

    async fn list_threads(&self) -> anyhow::Result<Vec<ThreadId>> {
        let states = self
            .states
            .read()
            .map_err(|_| anyhow::anyhow!("Failed to acquire read lock on in-memory session store"))?;
        let mut threads: Vec<ThreadId> = states.keys().cloned().collect();
        threads.sort();
        Ok(threads)
    }
}
