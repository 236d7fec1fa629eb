//! Read file tool: return the text content of a file.

use std::path::PathBuf;

use async_trait::async_trait;
use grokcli_core::error::ToolError;
use grokcli_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ReadFileArgs {
    path: String,
}

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read the full text content of a file. Paths are relative to the current working directory."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file path to read"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: ReadFileArgs = parse_arguments(self.name(), arguments)?;
        let path = crate::resolve(&self.root, &args.path);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(ToolResult::error(format!("File not found: {}", args.path)));
            }
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to read file {}: {e}",
                    args.path
                )));
            }
        };

        match String::from_utf8(bytes) {
            Ok(content) => Ok(ToolResult::success(serde_json::json!({ "content": content }))),
            Err(_) => Ok(ToolResult::error(format!(
                "File {} is not valid UTF-8 text",
                args.path
            ))),
        }
    }
}
