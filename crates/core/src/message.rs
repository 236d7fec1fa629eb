//! Message (turn) and Conversation domain types.
//!
//! These are the value objects that flow through the whole system:
//! the front end hands the agent a user message, the agent exchanges
//! assistant and tool turns with the provider, and the final assistant
//! turn goes back to the front end.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions (prompt, conversation summary)
    System,
    /// Tool execution result
    Tool,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content. For tool turns this is the serialized tool result.
    pub content: String,

    /// Tool calls requested by the assistant (if any)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<MessageToolCall>,

    /// If this is a tool result, which tool call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,

    /// If this is a tool result, the tool that produced it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tool_calls: Vec::new(),
            tool_call_id: None,
            tool_name: None,
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content.into())
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content.into())
    }

    /// Create an assistant message that requests tool calls.
    pub fn assistant_tool_calls(content: impl Into<String>, tool_calls: Vec<MessageToolCall>) -> Self {
        let mut msg = Self::with_role(Role::Assistant, content.into());
        msg.tool_calls = tool_calls;
        msg
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content.into())
    }

    /// Create a tool result message correlated to the call that requested it.
    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let mut msg = Self::with_role(Role::Tool, content.into());
        msg.tool_call_id = Some(tool_call_id.into());
        msg.tool_name = Some(tool_name.into());
        msg
    }

    /// Whether this is an assistant turn carrying tool call requests.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// A tool call embedded in an assistant message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageToolCall {
    /// Unique ID for this tool call
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string, exactly as the model produced them
    pub arguments: String,
}

/// An ordered log of turns plus an optional rolling summary.
///
/// The material sent to the model is either the full turn log or
/// `summary + turns since the last compaction`. Turns are only ever
/// appended; the only other mutation is [`Conversation::compact`], which
/// replaces a prefix with a summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation ID
    pub id: ConversationId,

    messages: Vec<Message>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    summary: Option<String>,

    #[serde(default)]
    compactions: u32,

    /// When this conversation was created
    pub created_at: DateTime<Utc>,

    /// When the last turn was added or the log was compacted
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            messages: Vec::new(),
            summary: None,
            compactions: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn to the conversation.
    pub fn push(&mut self, message: Message) {
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    /// The live (non-summarized) turns, in insertion order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// The summary of evicted turns, if compaction has run.
    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// How many times the conversation has been compacted.
    pub fn compactions(&self) -> u32 {
        self.compactions
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Replace the first `split` turns with `summary`.
    ///
    /// The caller is responsible for folding both the previous summary and the
    /// evicted turns into the new summary text. Returns the evicted turns.
    pub fn compact(&mut self, split: usize, summary: impl Into<String>) -> Vec<Message> {
        let split = split.min(self.messages.len());
        let evicted: Vec<Message> = self.messages.drain(..split).collect();
        self.summary = Some(summary.into());
        self.compactions += 1;
        self.updated_at = Utc::now();
        evicted
    }
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello, agent!");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello, agent!");
        assert!(msg.tool_calls.is_empty());
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn tool_result_carries_correlation() {
        let msg = Message::tool_result("call_1", "read_file", r#"{"status":"success"}"#);
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.tool_name.as_deref(), Some("read_file"));
    }

    #[test]
    fn conversation_tracks_updates() {
        let mut conv = Conversation::new();
        let created = conv.created_at;

        conv.push(Message::user("First message"));
        assert_eq!(conv.len(), 1);
        assert!(conv.updated_at >= created);
        assert!(conv.summary().is_none());
    }

    #[test]
    fn compact_replaces_prefix_with_summary() {
        let mut conv = Conversation::new();
        conv.push(Message::user("one"));
        conv.push(Message::assistant("two"));
        conv.push(Message::user("three"));

        let evicted = conv.compact(2, "one and two happened");
        assert_eq!(evicted.len(), 2);
        assert_eq!(evicted[0].content, "one");
        assert_eq!(conv.len(), 1);
        assert_eq!(conv.messages()[0].content, "three");
        assert_eq!(conv.summary(), Some("one and two happened"));
        assert_eq!(conv.compactions(), 1);
    }

    #[test]
    fn compact_split_is_clamped() {
        let mut conv = Conversation::new();
        conv.push(Message::user("only"));
        let evicted = conv.compact(10, "everything");
        assert_eq!(evicted.len(), 1);
        assert!(conv.is_empty());
    }

    #[test]
    fn message_serialization_roundtrip() {
        let msg = Message::user("Test message");
        let json = serde_json::to_string(&msg).unwrap();
        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized.content, "Test message");
        assert_eq!(deserialized.role, Role::User);
    }
}
