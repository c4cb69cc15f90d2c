//! Tokio-powered runtime for the Scribe agent: the interruptible
//! orchestration engine, per-run tool loading, hot-reloaded settings, and
//! the wire framing used by the streaming gateway.

pub mod config;
pub mod engine;
pub mod gateway;
pub mod locks;
pub mod middleware;
pub mod planner;
pub mod providers;
pub mod registry;

pub use config::{ModeSettings, Settings, SettingsSource, SummarySettings};
pub use engine::{
    Engine, EngineBuilder, EventStream, RunState, SummaryOutcome, DEFAULT_THREAD_ID, MODEL_NODE,
    TOOLS_NODE,
};
pub use gateway::{frames, Frame, FrameStream, Gateway, MessageRequest, ResumeRequest};
pub use locks::{ThreadGuard, ThreadLocks};
pub use middleware::{ModelRequest, RequestMiddleware};
pub use providers::{OpenAiChatModel, OpenAiConfig};
pub use registry::{ToolCatalog, ToolFactory};
