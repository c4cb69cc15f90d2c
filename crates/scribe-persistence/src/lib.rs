//! Durable session stores for the Scribe agent engine.
//!
//! ## Available Backends
//!
//! - **SQLite** (default): single-file store, no external service
//! - **PostgreSQL**: shared relational store
//! - **Redis**: in-memory store with optional TTL
//!
//! ## Feature Flags
//!
//! - `sqlite` (default), `postgres`, `redis`, `all`
//!
//! [`connect`] picks a backend from a store URL:
//!
//! ```rust,no_run
//! # async fn run() -> anyhow::Result<()> {
//! let store = scribe_persistence::connect("sqlite://scribe.db").await?;
//! # Ok(())
//! # }
//! ```

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

#[cfg(feature = "postgres")]
pub mod postgres_store;

#[cfg(feature = "redis")]
pub mod redis_store;

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteSessionStore;

#[cfg(feature = "postgres")]
pub use postgres_store::PostgresSessionStore;

#[cfg(feature = "redis")]
pub use redis_store::RedisSessionStore;

pub use scribe_core::persistence::{InMemorySessionStore, SessionStore, ThreadId};
pub use scribe_core::state::ConversationState;

use std::sync::Arc;

/// Open the store named by `url`: `memory`, `sqlite://…`, `postgres://…`
/// or `redis://…`. Backends compiled out by features are reported as errors.
pub async fn connect(url: &str) -> anyhow::Result<Arc<dyn SessionStore>> {
    let url = url.trim();
    let scheme = url.split(':').next().unwrap_or_default();

    match scheme {
        "memory" => {
            tracing::warn!("Using in-memory session store; threads are lost on restart");
            Ok(Arc::new(InMemorySessionStore::new()))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => Ok(Arc::new(SqliteSessionStore::new(url).await?)),
        #[cfg(feature = "postgres")]
        "postgres" | "postgresql" => Ok(Arc::new(PostgresSessionStore::new(url).await?)),
        #[cfg(feature = "redis")]
        "redis" | "rediss" => Ok(Arc::new(RedisSessionStore::new(url).await?)),
        other => anyhow::bail!("Unsupported session store '{other}' (is the feature enabled?)"),
    }
}
