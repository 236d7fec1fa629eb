//! List files tool: non-recursive listing of the working directory.

use std::path::PathBuf;

use async_trait::async_trait;
use grokcli_core::error::ToolError;
use grokcli_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;

/// Takes no parameters; unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
struct ListFilesArgs {}

pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    async fn list(&self) -> std::io::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.root).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        Ok(names)
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the files and directories in the current working directory (not recursive)."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let _: ListFilesArgs = parse_arguments(self.name(), arguments)?;

        match self.list().await {
            Ok(files) => Ok(ToolResult::success(serde_json::json!({ "files": files }))),
            Err(e) => Ok(ToolResult::error(format!(
                "Failed to list {}: {e}",
                self.root.display()
            ))),
        }
    }
}
