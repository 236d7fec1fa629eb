//! Conversation state owned by one agent session.

use grokcli_core::error::ProviderError;
use grokcli_core::message::{Conversation, Message};
use tracing::info;

use super::compaction::{CompactionPolicy, Summarizer, Summary};
use super::token;
use crate::metrics::TokenUsage;

/// Prefix of the system turn that carries the rolling summary.
pub const SUMMARY_HEADER: &str = "Summary of the earlier conversation:";

/// The session's turn log plus the policy that bounds its growth.
#[derive(Debug, Clone)]
pub struct ConversationState {
    conversation: Conversation,
    policy: CompactionPolicy,
}

impl ConversationState {
    pub fn new(policy: CompactionPolicy) -> Self {
        Self {
            conversation: Conversation::new(),
            policy,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn policy(&self) -> &CompactionPolicy {
        &self.policy
    }

    pub fn push(&mut self, message: Message) {
        self.conversation.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn summary(&self) -> Option<&str> {
        self.conversation.summary()
    }

    /// Estimated tokens of the live (non-summarized) turns.
    pub fn live_tokens(&self) -> usize {
        token::estimate_messages_tokens(self.conversation.messages())
    }

    /// Whether the live turns exceed the limit and a safe split exists.
    pub fn needs_compaction(&self) -> bool {
        let messages = self.conversation.messages();
        self.policy.over_limit(messages) && self.policy.split_point(messages).is_some()
    }

    /// Compact if the policy says so.
    ///
    /// Returns the summarizer's token usage when compaction happened. On
    /// summarizer failure the turn log is left untouched.
    pub async fn compact_if_needed(
        &mut self,
        summarizer: &dyn Summarizer,
    ) -> Result<Option<TokenUsage>, ProviderError> {
        if !self.policy.over_limit(self.conversation.messages()) {
            return Ok(None);
        }
        let Some(split) = self.policy.split_point(self.conversation.messages()) else {
            return Ok(None);
        };

        let before = self.live_tokens();
        let Summary { text, usage } = summarizer
            .summarize(self.conversation.summary(), &self.conversation.messages()[..split])
            .await?;
        let evicted = self.conversation.compact(split, text);

        info!(
            conversation_id = %self.conversation.id,
            evicted = evicted.len(),
            retained = self.conversation.len(),
            tokens_before = before,
            tokens_after = self.live_tokens(),
            "Compacted conversation"
        );
        Ok(Some(usage))
    }

    /// What the model sees: system prompt, then the summary, then live turns.
    pub fn model_view(&self, system_prompt: Option<&str>) -> Vec<Message> {
        let mut view = Vec::with_capacity(self.conversation.len() + 2);
        if let Some(prompt) = system_prompt {
            view.push(Message::system(prompt));
        }
        if let Some(summary) = self.conversation.summary() {
            view.push(Message::system(format!("{SUMMARY_HEADER}\n{summary}")));
        }
        view.extend(self.conversation.messages().iter().cloned());
        view
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(CompactionPolicy::default())
    }
}
