//! Workspace file tools: read, list, and (gated) write.

use async_trait::async_trait;
use scribe_core::events::{DiffPreview, Notice};
use scribe_core::tools::{Tool, ToolContext, ToolParameterSchema, ToolResult, ToolSchema};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::workspace::Workspace;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct ReadFileArgs {
    path: String,
    #[serde(default)]
    offset: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

const fn default_limit() -> usize {
    2000
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ToolParameterSchema::string("File path relative to the workspace root"),
        );
        properties.insert(
            "offset".to_string(),
            ToolParameterSchema::integer("Line number to start reading from (default: 0)"),
        );
        properties.insert(
            "limit".to_string(),
            ToolParameterSchema::integer("Maximum number of lines to read (default: 2000)"),
        );

        ToolSchema::new(
            "read_file",
            "Read a workspace file with optional line offset and limit",
            ToolParameterSchema::object("Read file parameters", properties, vec!["path".to_string()]),
        )
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: ReadFileArgs = serde_json::from_value(args)?;

        let Some(contents) = self.workspace.read_to_string(&args.path).await? else {
            return Ok(ToolResult::text(format!("Error: File '{}' not found", args.path)));
        };

        if contents.trim().is_empty() {
            return Ok(ToolResult::text("File exists but is empty"));
        }

        let lines: Vec<&str> = contents.lines().collect();
        if args.offset >= lines.len() {
            return Ok(ToolResult::text(format!(
                "Error: Line offset {} exceeds file length ({} lines)",
                args.offset,
                lines.len()
            )));
        }

        let end = (args.offset + args.limit).min(lines.len());
        let formatted = lines[args.offset..end]
            .iter()
            .enumerate()
            .map(|(idx, line)| format!("{:6}\t{}", args.offset + idx + 1, line))
            .collect::<Vec<_>>()
            .join("\n");

        Ok(ToolResult::text(formatted))
    }
}

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize, Default)]
struct ListFilesArgs {
    #[serde(default)]
    path: String,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ToolParameterSchema::string("Directory relative to the workspace root (default: root)"),
        );
        ToolSchema::new(
            "list_files",
            "List files under a workspace directory, recursively",
            ToolParameterSchema::object("List files parameters", properties, Vec::new()),
        )
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: ListFilesArgs = if args.is_null() {
            ListFilesArgs::default()
        } else {
            serde_json::from_value(args)?
        };
        let dir = self.workspace.resolve(&args.path)?;
        let workspace = self.workspace.clone();

        let files = tokio::task::spawn_blocking(move || {
            let mut files: Vec<String> = walkdir::WalkDir::new(&dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| workspace.relative(entry.path()))
                .collect();
            files.sort();
            files
        })
        .await?;

        Ok(ToolResult::json(json!(files)))
    }
}

/// Overwrites a workspace file. Gated: the author reviews a diff preview
/// before the write happens.
pub struct WriteFileTool {
    workspace: Workspace,
}

impl WriteFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct WriteFileArgs {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ToolParameterSchema::string("File path relative to the workspace root"),
        );
        properties.insert(
            "content".to_string(),
            ToolParameterSchema::string("Full file content"),
        );

        ToolSchema::new(
            "write_file",
            "Write content to a file, creating it if it does not exist",
            ToolParameterSchema::object(
                "Write file parameters",
                properties,
                vec!["path".to_string(), "content".to_string()],
            ),
        )
    }

    fn requires_gate(&self) -> bool {
        true
    }

    fn gate_prompt(&self, args: &Value) -> String {
        let path = args["path"].as_str().unwrap_or("<unknown>");
        let size = args["content"].as_str().map(str::len).unwrap_or(0);
        format!("Write {size} characters to '{path}'? Reply 1 to approve, 2 to cancel.")
    }

    async fn preview(&self, args: &Value, ctx: &ToolContext) -> anyhow::Result<()> {
        let args: WriteFileArgs = serde_json::from_value(args.clone())?;
        let original = self.workspace.read_to_string(&args.path).await?;
        ctx.notices.publish(Notice::DiffPreview(DiffPreview {
            file_path: Workspace::normalize(&args.path),
            suggested_content: args.content,
            original_content: original,
        }));
        Ok(())
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: WriteFileArgs = serde_json::from_value(args)?;
        self.workspace.write(&args.path, &args.content).await?;
        Ok(ToolResult::text(format!(
            "File '{}' written, {} characters",
            args.path,
            args.content.chars().count()
        )))
    }
}
