//! Compaction policy and summarizers.
//!
//! When the live (non-summarized) turns grow past the token limit, the oldest
//! turns are folded into a prose summary and only the most recent turns are
//! kept verbatim. The retained suffix always starts at a user turn, so a tool
//! result is never separated from the assistant turn that requested it.

use std::sync::Arc;

use async_trait::async_trait;
use grokcli_config::CompactionSettings;
use grokcli_core::error::ProviderError;
use grokcli_core::message::{Message, Role};
use grokcli_core::provider::ProviderRequest;

use super::token;
use crate::gateway::ModelGateway;
use crate::metrics::TokenUsage;

const SUMMARY_PROMPT: &str = "You compress chat transcripts between a user and a coding assistant \
that can list, read and edit files. Write a concise prose summary that keeps every fact needed \
to continue the conversation: the user's goals and preferences, names, file paths, decisions, \
edits already made and open questions. Fold any previous summary into the new one. Reply with \
the summary only.";

/// When and how much of the conversation is compacted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactionPolicy {
    pub enabled: bool,
    /// Estimated live-history tokens that trigger compaction
    pub token_limit: usize,
    /// Most recent turns kept verbatim
    pub retain_messages: usize,
}

impl CompactionPolicy {
    pub fn from_settings(settings: &CompactionSettings) -> Self {
        Self {
            enabled: settings.enabled,
            token_limit: settings.token_limit,
            retain_messages: settings.retain_messages.max(1),
        }
    }

    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Whether `messages` exceed the token limit.
    pub fn over_limit(&self, messages: &[Message]) -> bool {
        self.enabled && token::estimate_messages_tokens(messages) > self.token_limit
    }

    /// Index of the first retained turn, or `None` if nothing can be evicted.
    ///
    /// Picks the latest user turn that still keeps at least `retain_messages`
    /// turns verbatim.
    pub fn split_point(&self, messages: &[Message]) -> Option<usize> {
        let target = messages.len().checked_sub(self.retain_messages)?;
        (1..=target).rev().find(|&i| messages[i].role == Role::User)
    }
}

impl Default for CompactionPolicy {
    fn default() -> Self {
        Self::from_settings(&CompactionSettings::default())
    }
}

/// A summary and the tokens spent producing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
    pub usage: TokenUsage,
}

impl Summary {
    /// A summary that cost no model tokens.
    pub fn free(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            usage: TokenUsage::default(),
        }
    }
}

/// Produces the summary that replaces evicted turns.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `evicted`, folding in the `previous` summary if any.
    async fn summarize(&self, previous: Option<&str>, evicted: &[Message]) -> Result<Summary, ProviderError>;
}

/// Summarizes through the model gateway with a dedicated prompt.
pub struct GatewaySummarizer {
    gateway: Arc<ModelGateway>,
    model: String,
    max_tokens: Option<u32>,
}

impl GatewaySummarizer {
    pub fn new(gateway: Arc<ModelGateway>, model: impl Into<String>) -> Self {
        Self {
            gateway,
            model: model.into(),
            max_tokens: Some(500),
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait]
impl Summarizer for GatewaySummarizer {
    async fn summarize(&self, previous: Option<&str>, evicted: &[Message]) -> Result<Summary, ProviderError> {
        let mut request = ProviderRequest::new(
            self.model.clone(),
            vec![
                Message::system(SUMMARY_PROMPT),
                Message::user(render_transcript(previous, evicted)),
            ],
        );
        request.temperature = 0.2;
        request.max_tokens = self.max_tokens;

        let response = self.gateway.send(request).await?;
        let text = response.message.content.trim();
        if text.is_empty() {
            return Err(ProviderError::InvalidResponse("empty summary".into()));
        }
        Ok(Summary {
            text: text.to_string(),
            usage: response.usage,
        })
    }
}

/// Plain-text transcript of `turns`, preceded by the previous summary.
pub fn render_transcript(previous: Option<&str>, turns: &[Message]) -> String {
    let mut out = String::new();
    if let Some(previous) = previous {
        out.push_str("Previous summary:\n");
        out.push_str(previous);
        out.push_str("\n\n");
    }
    out.push_str("Transcript:\n");
    for turn in turns {
        match turn.role {
            Role::User => out.push_str(&format!("User: {}\n", turn.content)),
            Role::System => out.push_str(&format!("System: {}\n", turn.content)),
            Role::Assistant => {
                if !turn.content.is_empty() {
                    out.push_str(&format!("Assistant: {}\n", turn.content));
                }
                for call in &turn.tool_calls {
                    out.push_str(&format!("Assistant called {}({})\n", call.name, call.arguments));
                }
            }
            Role::Tool => out.push_str(&format!(
                "Tool {} returned: {}\n",
                turn.tool_name.as_deref().unwrap_or("unknown"),
                turn.content
            )),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::test_support::*;
    use grokcli_core::message::MessageToolCall;

    fn policy(retain: usize) -> CompactionPolicy {
        CompactionPolicy {
            enabled: true,
            token_limit: 10,
            retain_messages: retain,
        }
    }

    #[test]
    fn split_lands_on_a_user_turn() {
        let messages = vec![
            Message::user("u1"),
            Message::assistant("a1"),
            Message::user("u2"),
            Message::assistant_tool_calls("", vec![tool_call("c1", "read_file", serde_json::json!({}))]),
            Message::tool_result("c1", "read_file", "{}"),
            Message::assistant("a2"),
        ];
        // target index 4 is a tool turn; walk back to the user turn at 2
        assert_eq!(policy(2).split_point(&messages), Some(2));
    }

    #[test]
    fn no_boundary_means_no_split() {
        let messages = vec![
            Message::user("u1"),
            Message::assistant_tool_calls("", vec![tool_call("c1", "list_files", serde_json::json!({}))]),
            Message::tool_result("c1", "list_files", "{}"),
            Message::assistant("done"),
        ];
        assert_eq!(policy(2).split_point(&messages), None);
        assert_eq!(policy(10).split_point(&messages), None);
    }

    #[test]
    fn over_limit_respects_enabled_flag() {
        let messages = vec![Message::user("x".repeat(200))];
        assert!(policy(1).over_limit(&messages));
        assert!(!CompactionPolicy::disabled().over_limit(&messages));
    }

    #[test]
    fn transcript_includes_previous_summary_and_tool_traffic() {
        let turns = vec![
            Message::user("My name is Ada"),
            Message::assistant_tool_calls(
                "",
                vec![MessageToolCall {
                    id: "c1".into(),
                    name: "read_file".into(),
                    arguments: r#"{"path":"notes.txt"}"#.into(),
                }],
            ),
            Message::tool_result("c1", "read_file", r#"{"status":"success","content":"hi"}"#),
        ];
        let text = render_transcript(Some("Earlier: project is grokcli"), &turns);

        assert!(text.starts_with("Previous summary:\nEarlier: project is grokcli"));
        assert!(text.contains("User: My name is Ada"));
        assert!(text.contains(r#"Assistant called read_file({"path":"notes.txt"})"#));
        assert!(text.contains("Tool read_file returned:"));
    }

    #[tokio::test]
    async fn gateway_summarizer_sends_transcript() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response(
            "  The user is Ada and likes tea.  ",
        )]));
        let gateway = Arc::new(ModelGateway::new(provider.clone()));
        let summarizer = GatewaySummarizer::new(gateway, "mock-model");

        let summary = summarizer
            .summarize(None, &[Message::user("I'm Ada and I like tea")])
            .await
            .unwrap();

        assert_eq!(summary.text, "The user is Ada and likes tea.");
        assert_eq!(summary.usage.total_tokens, 15);
        assert!(!summary.usage.approximate);
        let sent = &provider.requests()[0];
        assert_eq!(sent.messages[0].role, Role::System);
        assert!(sent.messages[1].content.contains("I'm Ada and I like tea"));
        assert!(sent.tools.is_empty());
    }

    #[tokio::test]
    async fn empty_summary_is_an_error() {
        let provider = Arc::new(ScriptedProvider::new(vec![text_response("   ")]));
        let summarizer = GatewaySummarizer::new(Arc::new(ModelGateway::new(provider)), "mock-model");

        let result = summarizer.summarize(None, &[Message::user("x")]).await;
        assert!(matches!(result, Err(ProviderError::InvalidResponse(_))));
    }
}
