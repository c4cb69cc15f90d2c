//! Core traits and shared data models for the Scribe agent engine.
//! This crate keeps the domain primitives lightweight and transport-agnostic
//! so the runtime, the stores, and the server can compose them freely.

pub mod error;
pub mod events;
pub mod hitl;
pub mod llm;
pub mod messaging;
pub mod mode;
pub mod persistence;
pub mod prompts;
pub mod serializer;
pub mod state;
pub mod tools;

pub use error::ScribeError;
pub use events::{
    DiffPreview, ExecutionEvent, Notice, NoticeHub, ToolLifecycle, ToolLifecycleKind,
};
pub use hitl::{ChoiceAction, Decision, Interrupt};
pub use llm::{LanguageModel, LlmRequest, LlmResponse};
pub use messaging::{Message, MessageContent, MessageMetadata, MessageRole, ToolCall, ToolStatus};
pub use mode::Mode;
pub use persistence::{InMemorySessionStore, SessionStore, ThreadId};
pub use serializer::{serialize, ExecObject, Inspect};
pub use state::{ConversationState, StateSnapshot, TaskDescriptor};
pub use tools::{Tool, ToolBox, ToolContext, ToolParameterSchema, ToolRegistry, ToolResult, ToolSchema};
