//! Edit file tool: append, delete or replace text in an existing file.
//!
//! | `old_text` | `new_text` | Operation |
//! |------------|------------|-----------|
//! | empty      | empty      | error |
//! | empty      | set        | append `new_text` to the end |
//! | set        | empty      | delete the first occurrence of `old_text` |
//! | set        | set        | replace the first occurrence of `old_text` |
//!
//! Every edit is a single whole-file read-modify-write. The new content is
//! written to a sibling temp file and renamed over the original, so a crash
//! never leaves a half-written file behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use grokcli_core::error::ToolError;
use grokcli_core::tool::{Tool, ToolResult, parse_arguments};
use serde::Deserialize;
use tracing::debug;

use crate::DEFAULT_SNIPPET_CHARS;

#[derive(Debug, Deserialize)]
struct EditFileArgs {
    path: String,
    #[serde(default)]
    old_text: String,
    #[serde(default)]
    new_text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Append,
    Delete,
    Replace,
}

impl Operation {
    fn as_str(self) -> &'static str {
        match self {
            Operation::Append => "append",
            Operation::Delete => "delete",
            Operation::Replace => "replace",
        }
    }
}

/// The computed edit: new content plus the byte offset where it happened.
struct Edit {
    operation: Operation,
    content: String,
    offset: usize,
}

pub struct EditFileTool {
    root: PathBuf,
    snippet_chars: usize,
}

impl EditFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            snippet_chars: DEFAULT_SNIPPET_CHARS,
        }
    }

    /// Cap the length of before/after snippets in results.
    pub fn with_snippet_chars(mut self, snippet_chars: usize) -> Self {
        self.snippet_chars = snippet_chars;
        self
    }
}

/// Apply the four-way edit policy to `original`.
fn apply_edit(original: &str, old_text: &str, new_text: &str, path: &str) -> Result<Edit, String> {
    match (old_text.is_empty(), new_text.is_empty()) {
        (true, true) => Err("Must provide old_text or new_text".into()),
        (true, false) => Ok(Edit {
            operation: Operation::Append,
            content: format!("{original}{new_text}"),
            offset: original.len(),
        }),
        (false, _) => {
            let Some(offset) = original.find(old_text) else {
                return Err(format!(
                    "old_text not found in {path}. Re-read the file with read_file and retry \
                     with text that matches the file exactly, including whitespace and indentation."
                ));
            };
            let operation = if new_text.is_empty() {
                Operation::Delete
            } else {
                Operation::Replace
            };
            Ok(Edit {
                operation,
                content: original.replacen(old_text, new_text, 1),
                offset,
            })
        }
    }
}

const ELLIPSIS: &str = "...";

/// A window of at most `cap` characters of `content` around byte `offset`.
///
/// A quarter of the window is spent on text preceding the edit site;
/// `...` marks elided text on either side and counts toward `cap`.
fn snippet(content: &str, offset: usize, cap: usize) -> String {
    let total = content.chars().count();
    if total <= cap {
        return content.to_string();
    }

    let chars_before = content[..offset.min(content.len())].chars().count();
    let skip = chars_before.saturating_sub(cap / 4);

    // too narrow for markers
    if cap <= 2 * ELLIPSIS.len() {
        return content.chars().skip(skip).take(cap).collect();
    }

    let head = if skip > 0 { ELLIPSIS.len() } else { 0 };
    let mut take = cap - head;
    let elide_tail = skip + take < total;
    if elide_tail {
        take -= ELLIPSIS.len();
    }

    let mut out = String::with_capacity(cap);
    if head > 0 {
        out.push_str(ELLIPSIS);
    }
    out.extend(content.chars().skip(skip).take(take));
    if elide_tail {
        out.push_str(ELLIPSIS);
    }
    out
}

/// Write `content` to a temp file next to `path`, then rename it into place.
///
/// `path` must already be resolved past any symlink, or the rename replaces
/// the link itself.
async fn write_atomically(path: &Path, content: &str) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "edit".into());
    let tmp = path.with_file_name(format!(".{file_name}.grokcli.tmp"));

    tokio::fs::write(&tmp, content).await?;
    if let Ok(meta) = tokio::fs::metadata(path).await {
        let _ = tokio::fs::set_permissions(&tmp, meta.permissions()).await;
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Edit an existing file. With only new_text, append it to the end. With only old_text, \
         delete its first occurrence. With both, replace the first occurrence of old_text with \
         new_text. old_text must match the file exactly; if it is not found, re-read the file \
         and retry."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "The file to edit"
                },
                "old_text": {
                    "type": "string",
                    "description": "Exact text to replace or delete. Leave empty to append."
                },
                "new_text": {
                    "type": "string",
                    "description": "Replacement or appended text. Leave empty to delete old_text."
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let args: EditFileArgs = parse_arguments(self.name(), arguments)?;

        if args.old_text.is_empty() && args.new_text.is_empty() {
            return Ok(ToolResult::error("Must provide old_text or new_text"));
        }

        let path = crate::resolve(&self.root, &args.path);
        if !tokio::fs::metadata(&path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Ok(ToolResult::error(format!("File not found: {}", args.path)));
        }
        let path = tokio::fs::canonicalize(&path).await.unwrap_or(path);

        let original = match tokio::fs::read(&path).await {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(text) => text,
                Err(_) => {
                    return Ok(ToolResult::error(format!(
                        "File {} is not valid UTF-8 text",
                        args.path
                    )));
                }
            },
            Err(e) => {
                return Ok(ToolResult::error(format!(
                    "Failed to read file {}: {e}",
                    args.path
                )));
            }
        };

        let edit = match apply_edit(&original, &args.old_text, &args.new_text, &args.path) {
            Ok(edit) => edit,
            Err(message) => return Ok(ToolResult::error(message)),
        };

        if let Err(e) = write_atomically(&path, &edit.content).await {
            return Ok(ToolResult::error(format!(
                "Failed to write file {}: {e}",
                args.path
            )));
        }

        debug!(
            path = %args.path,
            operation = edit.operation.as_str(),
            bytes = edit.content.len(),
            "Edited file"
        );

        Ok(ToolResult::success(serde_json::json!({
            "operation": edit.operation.as_str(),
            "file_path": args.path,
            "before": snippet(&original, edit.offset, self.snippet_chars),
            "after": snippet(&edit.content, edit.offset, self.snippet_chars),
        })))
    }
}
