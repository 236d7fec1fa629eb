//! Model gateway: a retrying, normalizing wrapper around a [`Provider`].
//!
//! Every outbound call goes through [`normalize_request`] first, so parameters
//! the target model rejects are stripped uniformly. Rate-limit failures are
//! retried with exponential backoff plus uniform jitter; any other failure is
//! returned immediately. The backoff only suspends the calling turn.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use grokcli_config::RetrySettings;
use grokcli_core::error::ProviderError;
use grokcli_core::message::{Message, MessageToolCall};
use grokcli_core::provider::{Provider, ProviderRequest, ProviderResponse};
use tracing::{debug, warn};

use crate::context::token;
use crate::metrics::TokenUsage;

/// How rate-limited calls are retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound of the uniform jitter added to each delay
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &RetrySettings) -> Self {
        Self {
            max_attempts: settings.max_attempts,
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_jitter: Duration::from_millis(settings.max_jitter_ms),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
        }
    }

    /// Delay before retrying after the 0-based `attempt` failed:
    /// `base_delay * 2^attempt + U(0, max_jitter)`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .saturating_mul(factor)
            .saturating_add(self.jitter())
    }

    fn jitter(&self) -> Duration {
        use rand::Rng;

        let max = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(0..=max))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&RetrySettings::default())
    }
}

/// Suspends the caller between retry attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Request parameters the target model does not accept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQuirks {
    pub strip_stop: bool,
    pub strip_presence_penalty: bool,
    pub strip_frequency_penalty: bool,
}

impl RequestQuirks {
    /// Known quirks by model name. The grok-4 and grok-3-mini reasoning models
    /// reject `stop` and the penalty parameters.
    pub fn for_model(model: &str) -> Self {
        let model = model.to_ascii_lowercase();
        let reasoning = model.starts_with("grok-4") || model.starts_with("grok-3-mini");
        Self {
            strip_stop: reasoning,
            strip_presence_penalty: reasoning,
            strip_frequency_penalty: reasoning,
        }
    }

    /// Additionally strip the named parameters.
    pub fn with_unsupported<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            match name.as_ref() {
                "stop" => self.strip_stop = true,
                "presence_penalty" => self.strip_presence_penalty = true,
                "frequency_penalty" => self.strip_frequency_penalty = true,
                other => warn!(param = other, "Ignoring unknown unsupported_params entry"),
            }
        }
        self
    }
}

/// Strip the parameters `quirks` marks unsupported.
pub fn normalize_request(mut request: ProviderRequest, quirks: &RequestQuirks) -> ProviderRequest {
    if quirks.strip_stop {
        request.stop.clear();
    }
    if quirks.strip_presence_penalty {
        request.presence_penalty = None;
    }
    if quirks.strip_frequency_penalty {
        request.frequency_penalty = None;
    }
    request
}

/// The assistant's reply to one gateway call.
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// The assistant turn, including any tool-call requests
    pub message: Message,
    pub usage: TokenUsage,
    pub model: String,
}

impl GatewayResponse {
    pub fn tool_calls(&self) -> &[MessageToolCall] {
        &self.message.tool_calls
    }

    /// Whether this is a terminal answer (no tool calls requested).
    pub fn is_final(&self) -> bool {
        self.message.tool_calls.is_empty()
    }
}

/// Retrying wrapper around a provider.
pub struct ModelGateway {
    provider: Arc<dyn Provider>,
    policy: RetryPolicy,
    quirks: RequestQuirks,
    sleeper: Arc<dyn Sleeper>,
}

impl ModelGateway {
    pub fn new(provider: Arc<dyn Provider>) -> Self {
        Self {
            provider,
            policy: RetryPolicy::default(),
            quirks: RequestQuirks::default(),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_quirks(mut self, quirks: RequestQuirks) -> Self {
        self.quirks = quirks;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Send a request using the gateway's retry policy.
    pub async fn send(&self, request: ProviderRequest) -> Result<GatewayResponse, ProviderError> {
        let policy = self.policy.clone();
        self.send_with_policy(request, &policy).await
    }

    /// Send a request with a per-call retry policy.
    pub async fn send_with_policy(
        &self,
        request: ProviderRequest,
        policy: &RetryPolicy,
    ) -> Result<GatewayResponse, ProviderError> {
        let request = normalize_request(request, &self.quirks);
        let max_attempts = policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            debug!(
                provider = self.provider.name(),
                model = %request.model,
                attempt = attempt + 1,
                messages = request.messages.len(),
                "Calling model"
            );

            match self.provider.complete(request.clone()).await {
                Ok(response) => return Ok(Self::into_gateway_response(&request, response)),
                Err(e) if e.is_rate_limited() && attempt + 1 < max_attempts => {
                    let delay = policy.backoff(attempt);
                    warn!(
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Rate limited, backing off"
                    );
                    self.sleeper.sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if e.is_rate_limited() {
                        warn!(attempts = max_attempts, "Rate limit retries exhausted");
                    }
                    return Err(e);
                }
            }
        }
    }

    fn into_gateway_response(request: &ProviderRequest, response: ProviderResponse) -> GatewayResponse {
        let usage = match response.usage {
            Some(usage) => TokenUsage::exact(usage),
            None => {
                let prompt = token::estimate_messages_tokens(&request.messages)
                    + token::estimate_tools_tokens(&request.tools);
                let completion = token::estimate_message_tokens(&response.message);
                debug!(prompt, completion, "Provider omitted usage, using estimate");
                TokenUsage::estimated(prompt, completion)
            }
        };

        GatewayResponse {
            message: response.message,
            usage,
            model: response.model,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Scripted providers and a recording sleeper shared by the agent tests.

    use super::*;
    use grokcli_core::provider::Usage;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Returns scripted results in order; repeats the last one when exhausted.
    pub struct ScriptedProvider {
        script: Mutex<VecDeque<Result<ProviderResponse, ProviderError>>>,
        last: Mutex<Option<Result<ProviderResponse, ProviderError>>>,
        requests: Mutex<Vec<ProviderRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(script: Vec<Result<ProviderResponse, ProviderError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                last: Mutex::new(None),
                requests: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }

        pub fn requests(&self) -> Vec<ProviderRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
            self.requests.lock().unwrap().push(request);
            let next = self.script.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            match next {
                Some(result) => {
                    *last = Some(result.clone());
                    result
                }
                None => last
                    .clone()
                    .unwrap_or_else(|| Err(ProviderError::InvalidResponse("script empty".into()))),
            }
        }
    }

    /// Records requested delays without sleeping.
    #[derive(Default)]
    pub struct RecordingSleeper {
        pub delays: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.delays.lock().unwrap().push(duration);
        }
    }

    pub fn text_response(text: &str) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant(text),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    pub fn tool_call_response(calls: Vec<MessageToolCall>) -> Result<ProviderResponse, ProviderError> {
        Ok(ProviderResponse {
            message: Message::assistant_tool_calls("", calls),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    pub fn tool_call(id: &str, name: &str, args: serde_json::Value) -> MessageToolCall {
        MessageToolCall {
            id: id.into(),
            name: name.into(),
            arguments: serde_json::to_string(&args).unwrap(),
        }
    }

    pub fn rate_limited() -> Result<ProviderResponse, ProviderError> {
        Err(ProviderError::RateLimited { retry_after_secs: 1 })
    }

    pub fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(100),
            max_jitter: Duration::ZERO,
        }
    }
}
