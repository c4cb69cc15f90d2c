use scribe_core::tools::{ToolBox, ToolParameterSchema, ToolResult};
use serde::Deserialize;
use std::collections::HashMap;

use crate::builder::ToolBuilder;

#[derive(Deserialize)]
struct AskUserArgs {
    question: String,
}

/// Puts a question to the author. The run suspends on it like any gated
/// call; the author's reply arrives as the decision note and is appended to
/// the result by the engine.
pub fn ask_user_tool() -> ToolBox {
    let mut properties = HashMap::new();
    properties.insert(
        "question".to_string(),
        ToolParameterSchema::string("The question to ask the author"),
    );

    ToolBuilder::new("ask_user", "Ask the author a question and wait for the answer")
        .with_parameters(ToolParameterSchema::object(
            "Question parameters",
            properties,
            vec!["question".to_string()],
        ))
        .gated_with_prompt(|args| {
            format!(
                "Please reply: {}",
                args["question"].as_str().unwrap_or_default()
            )
        })
        .build_sync(|args, ctx| {
            let args: AskUserArgs = serde_json::from_value(args)?;
            if ctx.user_note().trim().is_empty() {
                return Ok(ToolResult::text(format!(
                    "The author gave no answer to: {}",
                    args.question
                )));
            }
            Ok(ToolResult::text(format!("Asked the author: {}", args.question)))
        })
}
