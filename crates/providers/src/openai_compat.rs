//! OpenAI-compatible provider implementation.
//!
//! Works with: xAI (Grok), OpenAI, and any endpoint exposing
//! `/v1/chat/completions` with function calling.

use async_trait::async_trait;
use grokcli_core::error::ProviderError;
use grokcli_core::message::{Message, MessageToolCall, Role};
use grokcli_core::provider::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fallback wait when a 429 carries no usable `Retry-After` header.
const DEFAULT_RETRY_AFTER_SECS: u64 = 5;

/// An OpenAI-compatible LLM provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client,
        }
    }

    /// Convert our Message types to OpenAI API format.
    fn to_api_messages(messages: &[Message]) -> Vec<ApiMessage> {
        messages
            .iter()
            .map(|m| {
                let tool_calls = if m.tool_calls.is_empty() {
                    None
                } else {
                    Some(
                        m.tool_calls
                            .iter()
                            .map(|tc| ApiToolCall {
                                id: tc.id.clone(),
                                r#type: "function".into(),
                                function: ApiFunction {
                                    name: tc.name.clone(),
                                    arguments: tc.arguments.clone(),
                                },
                            })
                            .collect(),
                    )
                };

                // Assistant turns that only carry tool calls are sent with a
                // null content, which every compatible endpoint accepts.
                let content = if tool_calls.is_some() && m.content.is_empty() {
                    None
                } else {
                    Some(m.content.clone())
                };

                ApiMessage {
                    role: match m.role {
                        Role::User => "user".into(),
                        Role::Assistant => "assistant".into(),
                        Role::System => "system".into(),
                        Role::Tool => "tool".into(),
                    },
                    content,
                    tool_calls,
                    tool_call_id: m.tool_call_id.clone(),
                }
            })
            .collect()
    }

    /// Convert tool definitions to OpenAI API format.
    fn to_api_tools(tools: &[ToolDefinition]) -> Vec<ApiToolDefinition> {
        tools
            .iter()
            .map(|t| ApiToolDefinition {
                r#type: "function".into(),
                function: ApiToolFunction {
                    name: t.name.clone(),
                    description: t.description.clone(),
                    parameters: t.parameters.clone(),
                },
            })
            .collect()
    }

    /// Build the JSON request body. Optional parameters are only emitted when set.
    fn build_body(request: &ProviderRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": request.model,
            "messages": Self::to_api_messages(&request.messages),
            "temperature": request.temperature,
            "stream": false,
        });

        if let Some(max_tokens) = request.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        if !request.tools.is_empty() {
            body["tools"] = serde_json::json!(Self::to_api_tools(&request.tools));
            body["tool_choice"] = serde_json::json!("auto");
        }

        if !request.stop.is_empty() {
            body["stop"] = serde_json::json!(request.stop);
        }

        if let Some(penalty) = request.presence_penalty {
            body["presence_penalty"] = serde_json::json!(penalty);
        }

        if let Some(penalty) = request.frequency_penalty {
            body["frequency_penalty"] = serde_json::json!(penalty);
        }

        body
    }

    /// Convert a parsed API response into our domain response.
    fn from_api_response(api_response: ApiResponse) -> Result<ProviderResponse, ProviderError> {
        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".into()))?;

        let tool_calls: Vec<MessageToolCall> = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| MessageToolCall {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let message = Message {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
            tool_call_id: None,
            tool_name: None,
            timestamp: chrono::Utc::now(),
        };

        let usage = api_response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(ProviderResponse {
            message,
            usage,
            model: api_response.model.unwrap_or_default(),
        })
    }
}

/// Parse a `Retry-After` header given in whole seconds.
fn parse_retry_after(value: Option<&reqwest::header::HeaderValue>) -> u64 {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .unwrap_or(DEFAULT_RETRY_AFTER_SECS)
}

#[async_trait]
impl grokcli_core::Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = Self::build_body(&request);

        debug!(
            provider = %self.name,
            model = %request.model,
            messages = request.messages.len(),
            tools = request.tools.len(),
            "Sending completion request"
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout(e.to_string())
                } else {
                    ProviderError::Network(e.to_string())
                }
            })?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs =
                parse_retry_after(response.headers().get(reqwest::header::RETRY_AFTER));
            warn!(provider = %self.name, retry_after_secs, "Provider rate limited the request");
            return Err(ProviderError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse response: {e}")))?;

        Self::from_api_response(api_response)
    }
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize, Deserialize)]
struct ApiMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use grokcli_core::Provider;

    #[test]
    fn constructor_keeps_name_and_base_url() {
        let provider = OpenAiCompatProvider::new("xai", "https://api.x.ai/v1", "xai-test");
        assert_eq!(provider.name(), "xai");
        assert_eq!(provider.base_url, "https://api.x.ai/v1");
    }

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let provider = OpenAiCompatProvider::new("custom", "http://localhost:8080/v1/", "k");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn message_conversion() {
        let messages = vec![Message::system("You are helpful"), Message::user("Hello")];
        let api_messages = OpenAiCompatProvider::to_api_messages(&messages);
        assert_eq!(api_messages.len(), 2);
        assert_eq!(api_messages[0].role, "system");
        assert_eq!(api_messages[1].role, "user");
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = Message::assistant_tool_calls(
            "",
            vec![MessageToolCall {
                id: "call_1".into(),
                name: "read_file".into(),
                arguments: r#"{"path":"README.md"}"#.into(),
            }],
        );
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs.len(), 1);
        assert!(api_msgs[0].content.is_none());
        let tc = api_msgs[0].tool_calls.as_ref().unwrap();
        assert_eq!(tc.len(), 1);
        assert_eq!(tc[0].function.name, "read_file");
        assert_eq!(tc[0].r#type, "function");
    }

    #[test]
    fn message_conversion_tool_response() {
        let msg = Message::tool_result("call_1", "read_file", r#"{"status":"success"}"#);
        let api_msgs = OpenAiCompatProvider::to_api_messages(&[msg]);
        assert_eq!(api_msgs[0].role, "tool");
        assert_eq!(api_msgs[0].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn tool_definition_conversion() {
        let tools = vec![ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let api_tools = OpenAiCompatProvider::to_api_tools(&tools);
        assert_eq!(api_tools.len(), 1);
        assert_eq!(api_tools[0].function.name, "list_files");
        assert_eq!(api_tools[0].r#type, "function");
    }

    #[test]
    fn body_includes_tools_and_tool_choice() {
        let mut request = ProviderRequest::new("grok-4-0709", vec![Message::user("hi")]);
        request.max_tokens = Some(1000);
        request.tools = vec![ToolDefinition {
            name: "list_files".into(),
            description: "List files".into(),
            parameters: serde_json::json!({"type": "object"}),
        }];
        let body = OpenAiCompatProvider::build_body(&request);
        assert_eq!(body["model"], "grok-4-0709");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["tool_choice"], "auto");
        assert_eq!(body["tools"][0]["function"]["name"], "list_files");
        assert!(body.get("stop").is_none());
        assert!(body.get("presence_penalty").is_none());
    }

    #[test]
    fn body_omits_tool_choice_without_tools() {
        let mut request = ProviderRequest::new("gpt-3.5-turbo", vec![Message::user("hi")]);
        request.stop = vec!["\nObservation".into()];
        let body = OpenAiCompatProvider::build_body(&request);
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
        assert_eq!(body["stop"][0], "\nObservation");
    }

    #[test]
    fn parse_text_response() {
        let raw = r#"{
            "model": "grok-4-0709",
            "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAiCompatProvider::from_api_response(parsed).unwrap();
        assert_eq!(response.message.content, "Hello!");
        assert!(response.message.tool_calls.is_empty());
        assert_eq!(response.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn parse_tool_call_response() {
        let raw = r#"{
            "model": "grok-4-0709",
            "choices": [{"message": {
                "role": "assistant",
                "content": null,
                "tool_calls": [{"id": "call_abc", "type": "function",
                    "function": {"name": "read_file", "arguments": "{\"path\":\"a.txt\"}"}}]
            }}]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(raw).unwrap();
        let response = OpenAiCompatProvider::from_api_response(parsed).unwrap();
        assert_eq!(response.message.content, "");
        assert_eq!(response.message.tool_calls.len(), 1);
        assert_eq!(response.message.tool_calls[0].id, "call_abc");
        assert_eq!(response.message.tool_calls[0].name, "read_file");
        assert!(response.usage.is_none());
    }

    #[test]
    fn empty_choices_is_invalid_response() {
        let parsed: ApiResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        let err = OpenAiCompatProvider::from_api_response(parsed).unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse(_)));
    }

    #[test]
    fn retry_after_parsing() {
        let header = reqwest::header::HeaderValue::from_static("12");
        assert_eq!(parse_retry_after(Some(&header)), 12);
        let bogus = reqwest::header::HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT");
        assert_eq!(parse_retry_after(Some(&bogus)), DEFAULT_RETRY_AFTER_SECS);
        assert_eq!(parse_retry_after(None), DEFAULT_RETRY_AFTER_SECS);
    }
}
