//! Error taxonomy shared by the engine, the gateway, and the server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScribeError {
    /// Malformed request, rejected before any state mutation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resume without a matching pending interrupt, duplicate resumes, or
    /// tool results that answer no known call.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("run already in progress for thread '{0}'")]
    RunInProgress(String),

    #[error("tool '{tool}' failed: {message}")]
    Tool { tool: String, message: String },

    #[error("model invocation failed: {0}")]
    Model(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl ScribeError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    pub fn storage(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }

    pub fn model(err: anyhow::Error) -> Self {
        Self::Model(format!("{err:#}"))
    }

    /// True for errors that leave the thread untouched and are the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ScribeError::Validation(_) | ScribeError::Protocol(_) | ScribeError::RunInProgress(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScribeError>;
