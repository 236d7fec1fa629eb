//! The agent reasoning loop implementation.
//!
//! One user turn walks a small state machine:
//!
//! ```text
//! AwaitingUser -> CallingModel -> { ExecutingTools -> CallingModel }* -> Done
//! ```
//!
//! Tool calls from one response run sequentially, in the order the model
//! issued them, and each one is isolated: a rejected call becomes an error
//! result and the rest still run. Every failure path ends in a string.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use grokcli_config::AppConfig;
use grokcli_core::message::{Conversation, Message, MessageToolCall, Role};
use grokcli_core::provider::{Provider, ProviderRequest, ToolDefinition};
use grokcli_core::tool::{ToolCall, ToolRegistry, ToolResult};
use tracing::{debug, info, warn};

use crate::context::{CompactionPolicy, ConversationState, GatewaySummarizer, Summarizer};
use crate::gateway::{GatewayResponse, ModelGateway, RequestQuirks, RetryPolicy};
use crate::metrics::{SessionMetrics, TokenUsage};
use crate::prompt;

/// Where the current user turn is.
enum Step {
    CallingModel,
    ExecutingTools(Vec<MessageToolCall>),
    Done(String),
}

/// One interactive session: conversation state plus the collaborators
/// needed to answer a user turn.
pub struct Agent {
    gateway: Arc<ModelGateway>,
    tools: Arc<ToolRegistry>,
    summarizer: Arc<dyn Summarizer>,
    state: ConversationState,

    model: String,
    system_prompt: String,
    temperature: f32,
    max_tokens: Option<u32>,

    /// Maximum model calls per user turn
    max_iterations: u32,
    turn_timeout: Option<Duration>,

    metrics: SessionMetrics,
}

impl Agent {
    pub fn new(gateway: Arc<ModelGateway>, tools: Arc<ToolRegistry>, model: impl Into<String>) -> Self {
        let model = model.into();
        let summarizer = Arc::new(GatewaySummarizer::new(gateway.clone(), model.clone()));
        Self {
            gateway,
            tools,
            summarizer,
            state: ConversationState::default(),
            model,
            system_prompt: prompt::DEFAULT_SYSTEM_PROMPT.to_string(),
            temperature: 0.7,
            max_tokens: None,
            max_iterations: 25,
            turn_timeout: None,
            metrics: SessionMetrics::default(),
        }
    }

    /// Build an agent from application config.
    ///
    /// `model` is the profile's model, which differs from `config.model`
    /// in dev mode.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        let model = model.into();
        let quirks = RequestQuirks::for_model(&model).with_unsupported(&config.unsupported_params);
        let gateway = ModelGateway::new(provider)
            .with_policy(RetryPolicy::from_settings(&config.retry))
            .with_quirks(quirks);
        let turn_timeout = (config.agent.turn_timeout_secs > 0)
            .then(|| Duration::from_secs(config.agent.turn_timeout_secs));

        Self::new(Arc::new(gateway), tools, model)
            .with_system_prompt(prompt::system_prompt(config.system_prompt.as_deref()))
            .with_temperature(config.temperature)
            .with_max_tokens(Some(config.max_tokens))
            .with_max_iterations(config.agent.max_iterations)
            .with_turn_timeout(turn_timeout)
            .with_compaction(CompactionPolicy::from_settings(&config.compaction))
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the maximum number of model calls per user turn.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max.max(1);
        self
    }

    pub fn with_turn_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.turn_timeout = timeout;
        self
    }

    /// Replace the compaction policy. Starts a fresh conversation.
    pub fn with_compaction(mut self, policy: CompactionPolicy) -> Self {
        self.state = ConversationState::new(policy);
        self
    }

    pub fn with_summarizer(mut self, summarizer: Arc<dyn Summarizer>) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn conversation(&self) -> &Conversation {
        self.state.conversation()
    }

    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    /// Summed token usage of the last user turn.
    pub fn last_token_usage(&self) -> TokenUsage {
        self.metrics.last_token_usage
    }

    /// Errors caught during the last user turn.
    pub fn last_error_count(&self) -> u32 {
        self.metrics.last_error_count
    }

    /// Answer one user message. Never fails; errors come back as text.
    pub async fn chat(&mut self, user_text: &str) -> String {
        self.metrics.reset();
        self.state.push(Message::user(user_text));

        info!(
            conversation_id = %self.state.conversation().id,
            turns = self.state.messages().len(),
            "Processing user turn"
        );

        let Some(limit) = self.turn_timeout else {
            return self.run_turn().await;
        };

        match tokio::time::timeout(limit, self.run_turn()).await {
            Ok(answer) => answer,
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Turn timed out");
                self.metrics.record_error();
                self.close_dangling_tool_calls();
                format!(
                    "Error: no answer within {}s. The request was cancelled.",
                    limit.as_secs()
                )
            }
        }
    }

    async fn run_turn(&mut self) -> String {
        let tool_definitions = self.tools.definitions();
        let mut model_calls = 0u32;
        let mut best_text: Option<String> = None;
        let mut step = Step::CallingModel;

        loop {
            step = match step {
                Step::CallingModel => {
                    if model_calls >= self.max_iterations {
                        warn!(
                            conversation_id = %self.state.conversation().id,
                            iterations = model_calls,
                            "Max iterations reached without a final answer"
                        );
                        return best_text.unwrap_or_else(|| {
                            format!(
                                "I did not reach a final answer after {model_calls} steps. \
                                 Please provide further guidance."
                            )
                        });
                    }
                    model_calls += 1;
                    debug!(iteration = model_calls, "Agent loop iteration");

                    self.compact().await;
                    match self.call_model(&tool_definitions).await {
                        Ok(response) => self.absorb_response(response, &mut best_text),
                        Err(message) => Step::Done(message),
                    }
                }
                Step::ExecutingTools(calls) => {
                    debug!(tool_count = calls.len(), "Executing tool calls");
                    for call in &calls {
                        self.execute_tool_call(call).await;
                    }
                    Step::CallingModel
                }
                Step::Done(answer) => return answer,
            };
        }
    }

    /// Run compaction between model calls. Failures keep history intact.
    async fn compact(&mut self) {
        if !self.state.needs_compaction() {
            return;
        }
        match self.state.compact_if_needed(self.summarizer.as_ref()).await {
            Ok(Some(usage)) => self.metrics.record_usage(usage),
            Ok(None) => {}
            Err(e) => {
                warn!(error = %e, "Compaction failed, keeping full history");
                self.metrics.record_error();
            }
        }
    }

    async fn call_model(&mut self, tools: &[ToolDefinition]) -> Result<GatewayResponse, String> {
        let mut request = ProviderRequest::new(
            self.model.clone(),
            self.state.model_view(Some(&self.system_prompt)),
        );
        request.temperature = self.temperature;
        request.max_tokens = self.max_tokens;
        request.tools = tools.to_vec();

        match self.gateway.send(request).await {
            Ok(response) => {
                self.metrics.record_usage(response.usage);
                Ok(response)
            }
            Err(e) => {
                warn!(provider = self.gateway.provider_name(), error = %e, "Model call failed");
                self.metrics.record_error();
                Err(format!("Error: {e}"))
            }
        }
    }

    fn absorb_response(&mut self, response: GatewayResponse, best_text: &mut Option<String>) -> Step {
        let message = response.message;
        if message.tool_calls.is_empty() {
            let answer = message.content.clone();
            self.state.push(message);
            return Step::Done(answer);
        }

        if !message.content.trim().is_empty() {
            *best_text = Some(message.content.clone());
        }
        let calls = message.tool_calls.clone();
        self.state.push(message);
        Step::ExecutingTools(calls)
    }

    async fn execute_tool_call(&mut self, call: &MessageToolCall) {
        let start = Instant::now();
        let outcome = match ToolCall::from_message_call(call) {
            Ok(tool_call) => self.tools.execute(&tool_call).await,
            Err(e) => Err(e),
        };

        let result = match outcome {
            Ok(result) => {
                debug!(
                    tool = %call.name,
                    success = result.is_success(),
                    duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                    "Tool executed"
                );
                result
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Tool call rejected");
                self.metrics.record_error();
                ToolResult::error(e.to_string())
            }
        };

        self.state
            .push(Message::tool_result(&call.id, &call.name, result.to_json()));
    }

    /// Answer any tool calls left unanswered by a timed-out turn, so the next
    /// request stays well-formed. An interrupted call may already have written
    /// its file, so the result says the outcome is unknown.
    fn close_dangling_tool_calls(&mut self) {
        let messages = self.state.messages();
        let Some(pos) = messages
            .iter()
            .rposition(|m| m.role == Role::Assistant && m.has_tool_calls())
        else {
            return;
        };

        let answered: HashSet<&str> = messages[pos + 1..]
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        let dangling: Vec<MessageToolCall> = messages[pos]
            .tool_calls
            .iter()
            .filter(|c| !answered.contains(c.id.as_str()))
            .cloned()
            .collect();

        let interrupted = ToolResult::error(
            "Tool call interrupted by the turn timeout; outcome unknown. \
             Re-read the file before relying on or retrying this change.",
        )
        .to_json();
        for call in dangling {
            self.state
                .push(Message::tool_result(call.id, call.name, interrupted.clone()));
        }
    }
}
