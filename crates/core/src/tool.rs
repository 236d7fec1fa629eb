//! Tool trait: the abstraction over agent capabilities.
//!
//! Tools are what give the agent the ability to act on the local
//! filesystem: list the working directory, read files, edit files.
//!
//! Every tool returns a [`ToolResult`], which is always JSON-serializable.
//! The serialized form is both fed back to the model as a tool turn and
//! parsed by the front end for display:
//!
//! ```json
//! {"status": "success", "files": ["Cargo.toml", "src"]}
//! {"status": "error", "message": "File not found: notes.txt"}
//! ```

use crate::error::ToolError;
use crate::message::MessageToolCall;
use crate::provider::ToolDefinition;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A request to execute a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique call ID (matches the LLM's tool_call.id)
    pub id: String,

    /// Name of the tool to execute
    pub name: String,

    /// Arguments as a JSON value
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Parse the raw JSON argument string of a model-issued call.
    ///
    /// An empty argument string is treated as `{}`; anything else must be a
    /// JSON object.
    pub fn from_message_call(call: &MessageToolCall) -> Result<Self, ToolError> {
        let raw = call.arguments.trim();
        let arguments = if raw.is_empty() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_str::<serde_json::Value>(raw).map_err(|e| {
                ToolError::InvalidArguments(format!(
                    "arguments for '{}' are not valid JSON: {e}",
                    call.name
                ))
            })?
        };

        if !arguments.is_object() {
            return Err(ToolError::InvalidArguments(format!(
                "arguments for '{}' must be a JSON object",
                call.name
            )));
        }

        Ok(Self {
            id: call.id.clone(),
            name: call.name.clone(),
            arguments,
        })
    }
}

/// Deserialize a tool's typed argument struct, rejecting malformed input.
pub fn parse_arguments<T: DeserializeOwned>(
    tool_name: &str,
    arguments: serde_json::Value,
) -> Result<T, ToolError> {
    serde_json::from_value(arguments)
        .map_err(|e| ToolError::InvalidArguments(format!("{tool_name}: {e}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// The result of a tool execution: `{status: success, ...payload}` or
/// `{status: error, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub status: ToolStatus,

    /// Error description (error results only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Tool-specific payload fields (success results only)
    #[serde(flatten)]
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl ToolResult {
    /// A success result whose payload is the given JSON object.
    ///
    /// Non-object values are stored under a `result` key.
    pub fn success(payload: serde_json::Value) -> Self {
        let payload = match payload {
            serde_json::Value::Object(map) => map,
            other => {
                let mut map = serde_json::Map::new();
                map.insert("result".into(), other);
                map
            }
        };
        Self {
            status: ToolStatus::Success,
            message: None,
            payload,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ToolStatus::Error,
            message: Some(message.into()),
            payload: serde_json::Map::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// Look up a payload field.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.payload.get(key)
    }

    /// Serialize to the JSON string stored in the tool turn.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| {
            format!(r#"{{"status":"error","message":"unserializable tool result: {e}"}}"#)
        })
    }
}

/// The core Tool trait.
///
/// Each tool (list_files, read_file, edit_file) implements this trait.
/// Filesystem failures are reported as error-shaped `ToolResult`s; the
/// `Err` channel is reserved for argument validation, and the registry
/// folds it into an error result as well.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "read_file").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// JSON Schema describing this tool's parameters.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;

    /// Convert this tool into a ToolDefinition for sending to the LLM.
    fn to_definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }
}

/// A registry of available tools.
///
/// The agent loop uses this to:
/// 1. Get tool definitions to send to the LLM
/// 2. Look up and execute tools when the LLM requests them
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        self.tools.insert(name, tool);
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Get all tool definitions (for sending to the LLM), sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(|t| t.to_definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Execute a tool call.
    pub async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;
        tool.execute(call.arguments.clone()).await
    }

    /// List all registered tool names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(|s| s.as_str()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Deserialize)]
    struct EchoArgs {
        text: String,
    }

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> serde_json::Value {
            serde_json::json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" }
                },
                "required": ["text"]
            })
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let args: EchoArgs = parse_arguments(self.name(), arguments)?;
            Ok(ToolResult::success(serde_json::json!({ "text": args.text })))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.names(), vec!["echo"]);
    }

    #[test]
    fn registry_definitions() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        let defs = registry.definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));

        let call = ToolCall {
            id: "call_1".into(),
            name: "echo".into(),
            arguments: serde_json::json!({"text": "hello world"}),
        };
        let result = registry.execute(&call).await.unwrap();
        assert!(result.is_success());
        assert_eq!(result.get("text"), Some(&serde_json::json!("hello world")));
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let call = ToolCall {
            id: "call_1".into(),
            name: "nonexistent".into(),
            arguments: serde_json::json!({}),
        };
        let err = registry.execute(&call).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn tool_call_from_message_call() {
        let call = ToolCall::from_message_call(&MessageToolCall {
            id: "call_9".into(),
            name: "read_file".into(),
            arguments: r#"{"path":"a.txt"}"#.into(),
        })
        .unwrap();
        assert_eq!(call.arguments["path"], "a.txt");

        let empty = ToolCall::from_message_call(&MessageToolCall {
            id: "call_10".into(),
            name: "list_files".into(),
            arguments: String::new(),
        })
        .unwrap();
        assert!(empty.arguments.as_object().unwrap().is_empty());
    }

    #[test]
    fn tool_call_rejects_malformed_arguments() {
        let bad_json = ToolCall::from_message_call(&MessageToolCall {
            id: "c".into(),
            name: "read_file".into(),
            arguments: "{path: ".into(),
        });
        assert!(matches!(bad_json, Err(ToolError::InvalidArguments(_))));

        let not_object = ToolCall::from_message_call(&MessageToolCall {
            id: "c".into(),
            name: "read_file".into(),
            arguments: "[1, 2]".into(),
        });
        assert!(matches!(not_object, Err(ToolError::InvalidArguments(_))));
    }

    #[test]
    fn result_json_shape() {
        let ok = ToolResult::success(serde_json::json!({"files": ["a", "b"]}));
        let json: serde_json::Value = serde_json::from_str(&ok.to_json()).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["files"], serde_json::json!(["a", "b"]));
        assert!(json.get("message").is_none());

        let err = ToolResult::error("File not found: x");
        let json: serde_json::Value = serde_json::from_str(&err.to_json()).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["message"], "File not found: x");
    }

    #[test]
    fn result_parses_back_for_rendering() {
        let raw = r#"{"status":"success","content":"hello"}"#;
        let parsed: ToolResult = serde_json::from_str(raw).unwrap();
        assert!(parsed.is_success());
        assert_eq!(parsed.get("content"), Some(&serde_json::json!("hello")));
    }
}
