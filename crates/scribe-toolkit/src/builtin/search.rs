use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use scribe_core::tools::{Tool, ToolContext, ToolParameterSchema, ToolResult, ToolSchema};
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::workspace::Workspace;

/// Matches shown in the tool result; the rest are only counted.
pub const MAX_LISTED_MATCHES: usize = 10;

#[derive(Debug, Clone, PartialEq)]
struct SearchMatch {
    file: String,
    line: usize,
    content: String,
}

/// Regex search over a workspace file or directory. Gated.
pub struct SearchFileTool {
    workspace: Workspace,
}

impl SearchFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct SearchFileArgs {
    path: String,
    regex: String,
}

fn collect_matches(contents: &str, label: &str, pattern: &Regex, out: &mut Vec<SearchMatch>) {
    for (idx, line) in contents.split('\n').enumerate() {
        if pattern.is_match(line) {
            out.push(SearchMatch {
                file: label.to_string(),
                line: idx + 1,
                content: line.trim().to_string(),
            });
        }
    }
}

fn render(path: &str, matches: &[SearchMatch]) -> String {
    if matches.is_empty() {
        return format!("No matches found in '{path}'");
    }

    let mut out = format!("Found {} matches in '{path}':\n\n", matches.len());
    for m in matches.iter().take(MAX_LISTED_MATCHES) {
        out.push_str(&format!("File: {}:{}\nContent: {}\n\n", m.file, m.line, m.content));
    }
    if matches.len() > MAX_LISTED_MATCHES {
        out.push_str(&format!(
            "... {} more matches not shown",
            matches.len() - MAX_LISTED_MATCHES
        ));
    }
    out.trim_end().to_string()
}

#[async_trait]
impl Tool for SearchFileTool {
    fn schema(&self) -> ToolSchema {
        let mut properties = HashMap::new();
        properties.insert(
            "path".to_string(),
            ToolParameterSchema::string("File or directory relative to the workspace root"),
        );
        properties.insert(
            "regex".to_string(),
            ToolParameterSchema::string("Regular expression to search for"),
        );
        ToolSchema::new(
            "search_file",
            "Search a file or directory for lines matching a regular expression",
            ToolParameterSchema::object(
                "Search parameters",
                properties,
                vec!["path".to_string(), "regex".to_string()],
            ),
        )
    }

    fn requires_gate(&self) -> bool {
        true
    }

    fn gate_prompt(&self, args: &Value) -> String {
        format!(
            "Search '{}' for /{}/? Reply 1 to approve, 2 to cancel.",
            args["path"].as_str().unwrap_or(""),
            args["regex"].as_str().unwrap_or("")
        )
    }

    async fn execute(&self, args: Value, _ctx: ToolContext) -> anyhow::Result<ToolResult> {
        let args: SearchFileArgs = serde_json::from_value(args)?;
        let pattern = Regex::new(&args.regex)?;
        let target = self.workspace.resolve(&args.path)?;
        let workspace = self.workspace.clone();
        let display = args.path.clone();

        let matches = tokio::task::spawn_blocking(move || -> anyhow::Result<Option<Vec<SearchMatch>>> {
            let mut matches = Vec::new();
            if target.is_file() {
                let contents = std::fs::read_to_string(&target)
                    .with_context(|| format!("Failed to read '{}'", target.display()))?;
                collect_matches(&contents, &workspace.relative(&target), &pattern, &mut matches);
            } else if target.is_dir() {
                let mut files: Vec<_> = walkdir::WalkDir::new(&target)
                    .into_iter()
                    .filter_map(Result::ok)
                    .filter(|entry| entry.file_type().is_file())
                    .map(|entry| entry.into_path())
                    .collect();
                files.sort();
                for file in files {
                    // Binary and unreadable files are skipped.
                    let Ok(contents) = std::fs::read_to_string(&file) else {
                        continue;
                    };
                    let label = file
                        .strip_prefix(&target)
                        .unwrap_or(&file)
                        .to_string_lossy()
                        .replace('\\', "/");
                    collect_matches(&contents, &label, &pattern, &mut matches);
                }
            } else {
                return Ok(None);
            }
            Ok(Some(matches))
        })
        .await??;

        match matches {
            Some(matches) => Ok(ToolResult::text(render(&display, &matches))),
            None => Ok(ToolResult::text(format!("Path does not exist: {display}"))),
        }
    }
}
