//! Built-in workspace tools

pub mod ask_user;
pub mod files;
pub mod search;

pub use ask_user::ask_user_tool;
pub use files::{ListFilesTool, ReadFileTool, WriteFileTool};
pub use search::SearchFileTool;

use scribe_core::tools::ToolBox;
use std::sync::Arc;

use crate::workspace::Workspace;

/// Names of every built-in tool, in registration order.
pub const BUILTIN_TOOL_NAMES: [&str; 5] =
    ["write_file", "search_file", "ask_user", "read_file", "list_files"];

/// Instantiate a built-in tool by name.
pub fn builtin_tool(name: &str, workspace: &Workspace) -> Option<ToolBox> {
    let tool: ToolBox = match name {
        "write_file" => Arc::new(WriteFileTool::new(workspace.clone())),
        "search_file" => Arc::new(SearchFileTool::new(workspace.clone())),
        "ask_user" => ask_user_tool(),
        "read_file" => Arc::new(ReadFileTool::new(workspace.clone())),
        "list_files" => Arc::new(ListFilesTool::new(workspace.clone())),
        _ => return None,
    };
    Some(tool)
}
