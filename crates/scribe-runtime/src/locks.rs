//! At most one in-flight run per thread.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use scribe_core::error::ScribeError;

#[derive(Debug, Clone, Default)]
pub struct ThreadLocks {
    active: Arc<Mutex<HashSet<String>>>,
}

impl ThreadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `thread_id`, or fails with `RunInProgress` when another run
    /// already holds it. Requests are never queued.
    pub fn acquire(&self, thread_id: &str) -> Result<ThreadGuard, ScribeError> {
        let mut active = self
            .active
            .lock()
            .map_err(|_| ScribeError::Storage("thread lock set poisoned".into()))?;
        if !active.insert(thread_id.to_string()) {
            tracing::debug!(thread_id, "Rejected concurrent run");
            return Err(ScribeError::RunInProgress(thread_id.to_string()));
        }
        Ok(ThreadGuard {
            thread_id: thread_id.to_string(),
            active: self.active.clone(),
        })
    }

    pub fn is_active(&self, thread_id: &str) -> bool {
        self.active
            .lock()
            .map(|active| active.contains(thread_id))
            .unwrap_or(false)
    }
}

/// Releases the thread when dropped, including when the task driving a run
/// panics.
#[derive(Debug)]
pub struct ThreadGuard {
    thread_id: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl ThreadGuard {
    pub fn thread_id(&self) -> &str {
        &self.thread_id
    }
}

impl Drop for ThreadGuard {
    fn drop(&mut self) {
        match self.active.lock() {
            Ok(mut active) => {
                active.remove(&self.thread_id);
            }
            Err(poisoned) => {
                poisoned.into_inner().remove(&self.thread_id);
            }
        }
    }
}
