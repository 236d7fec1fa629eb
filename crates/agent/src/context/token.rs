//! Token estimation utilities.
//!
//! Used as the fallback when the provider omits usage, and to decide when a
//! conversation needs compacting. Heuristic: ~4 characters per token, which is
//! within ~10% for BPE tokenizers on English text. Counts produced here are
//! always reported as approximate.

use grokcli_core::message::Message;
use grokcli_core::provider::ToolDefinition;

/// Per-message overhead for role name and delimiters in the wire format.
const MESSAGE_OVERHEAD: usize = 4;

/// Estimate the token count for a string. Rounds up.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// Estimate tokens for a single message, including any tool-call payloads.
pub fn estimate_message_tokens(message: &Message) -> usize {
    let calls: usize = message
        .tool_calls
        .iter()
        .map(|c| estimate_tokens(&c.name) + estimate_tokens(&c.arguments))
        .sum();
    MESSAGE_OVERHEAD + estimate_tokens(&message.content) + calls
}

/// Estimate tokens for a slice of messages.
pub fn estimate_messages_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_message_tokens).sum()
}

/// Estimate tokens for a tool definition (serialized as JSON).
pub fn estimate_tool_tokens(tool: &ToolDefinition) -> usize {
    let json = serde_json::to_string(tool).unwrap_or_default();
    estimate_tokens(&json)
}

/// Estimate tokens for a slice of tool definitions.
pub fn estimate_tools_tokens(tools: &[ToolDefinition]) -> usize {
    tools.iter().map(estimate_tool_tokens).sum()
}
