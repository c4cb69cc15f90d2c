//! Built-in tools for the Scribe agent engine.
//!
//! Every tool works against a [`Workspace`], a directory that paths from
//! the model are resolved into. `write_file`, `search_file` and `ask_user`
//! are gated and suspend the run for the author's decision; `read_file` and
//! `list_files` run immediately.

pub mod builder;
pub mod builtin;
pub mod workspace;

pub use scribe_core::tools::{
    Tool, ToolBox, ToolContext, ToolParameterSchema, ToolRegistry, ToolResult, ToolSchema,
};

pub use builder::{tool, ToolBuilder};
pub use builtin::{
    ask_user_tool, builtin_tool, ListFilesTool, ReadFileTool, SearchFileTool, WriteFileTool,
    BUILTIN_TOOL_NAMES,
};
pub use workspace::Workspace;
