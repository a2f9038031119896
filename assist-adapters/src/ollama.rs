//! `Ollama` adapter implementation.

use std::{fmt, time::Duration};

use assist_primitives::ToolCallId;
use async_trait::async_trait;
use futures::stream;
use hyper::header::CONTENT_TYPE;
use hyper::{Body, Request, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http_client::{HyperClient, Reply, build_https_client, sanitize_base_url, send};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    ModelAdapter, PromptMessage, ToolCall, ToolDefinition,
};

/// Default address of a local Ollama daemon.
pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434/";

/// Configuration for the `Ollama` adapter.
#[derive(Clone, Debug)]
pub struct OllamaConfig {
    base_url: String,
    model: String,
    default_temperature: Option<f32>,
    timeout: Duration,
}

impl OllamaConfig {
    /// Creates a configuration for the supplied model using default settings.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_OLLAMA_BASE_URL.to_owned(),
            model: model.into(),
            default_temperature: None,
            timeout: Duration::from_secs(60),
        }
    }

    /// Overrides the base URL of the local Ollama daemon.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url("Ollama", base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the default sampling temperature used when the request does not
    /// provide one explicitly.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the HTTP timeout for requests to the Ollama daemon.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// `Ollama` adapter that calls the local Ollama daemon over HTTP/HTTPS.
pub struct OllamaAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OllamaAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OllamaAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OllamaAdapter {
    /// Constructs a new adapter from the supplied configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the endpoint is invalid or the HTTP
    /// client cannot be constructed.
    #[allow(clippy::needless_pass_by_value)]
    pub fn new(config: OllamaConfig) -> AdapterResult<Self> {
        let endpoint = format!("{}api/chat", config.base_url)
            .parse::<Uri>()
            .map_err(|err| {
                AdapterError::configuration(format!("invalid Ollama endpoint: {err}"))
            })?;

        let client = build_https_client()?;
        let metadata = AdapterMetadata::new("ollama", config.model.clone());

        Ok(Self {
            client,
            endpoint,
            metadata,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
        })
    }

    fn build_request(&self, request: &InferenceRequest) -> ChatRequest {
        let system = request.system_prompt().map(|prompt| ChatMessage {
            role: "system".to_owned(),
            content: prompt.to_owned(),
            tool_calls: Vec::new(),
        });
        let messages = system
            .into_iter()
            .chain(request.messages().iter().map(map_prompt_message))
            .collect();

        let temperature = request.temperature().or(self.default_temperature);
        let options = if temperature.is_some()
            || request.max_output_tokens().is_some()
            || request.top_p().is_some()
            || request.seed().is_some()
        {
            Some(ChatOptions {
                temperature,
                top_p: request.top_p(),
                seed: request.seed(),
                max_output_tokens: request.max_output_tokens(),
            })
        } else {
            None
        };

        ChatRequest {
            model: self.metadata.model().to_owned(),
            stream: false,
            messages,
            tools: request.tools().iter().map(map_tool_definition).collect(),
            options,
        }
    }
}

#[async_trait]
impl ModelAdapter for OllamaAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        let payload = self.build_request(&request);
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode Ollama request: {err}"))
        })?;

        let req = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build Ollama request: {err}"))
            })?;

        let Reply { status, body: bytes, .. } =
            send(&self.client, req, self.timeout, "Ollama").await?;

        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes).to_string();
            return Err(AdapterError::response(format!(
                "Ollama returned {status}: {reason}"
            )));
        }

        let response: ChatResponse = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode Ollama response: {err}"))
        })?;

        let chunk = response.into_chunk()?;
        let stream = stream::once(async move { Ok(chunk) });
        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    stream: bool,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ChatTool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ChatToolCall>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatToolCall {
    function: ChatFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: Value,
}

#[derive(Debug, Serialize)]
struct ChatTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: ToolDefinition,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "num_predict")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: Option<ChatMessage>,
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl ChatResponse {
    fn into_chunk(self) -> AdapterResult<InferenceChunk> {
        if let Some(error) = self.error {
            return Err(AdapterError::response(error));
        }

        let (content, calls) = match self.message {
            Some(message) => (message.content, message.tool_calls),
            None => (self.response.unwrap_or_default(), Vec::new()),
        };

        // Ollama sends arguments as an object and does not assign call ids.
        let calls = calls
            .into_iter()
            .map(|call| {
                let arguments = match call.function.arguments {
                    Value::Null => "{}".to_owned(),
                    Value::String(raw) => raw,
                    other => other.to_string(),
                };
                ToolCall::new(ToolCallId::generate(), call.function.name, arguments)
            })
            .collect();

        Ok(InferenceChunk::new(content, true).with_tool_calls(calls))
    }
}

fn map_prompt_message(message: &PromptMessage) -> ChatMessage {
    let tool_calls = message
        .tool_calls()
        .iter()
        .map(|call| ChatToolCall {
            function: ChatFunctionCall {
                name: call.name.clone(),
                arguments: serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| Value::String(call.arguments.clone())),
            },
        })
        .collect();

    ChatMessage {
        role: message.role().to_string(),
        content: message.content().to_owned(),
        tool_calls,
    }
}

fn map_tool_definition(tool: &ToolDefinition) -> ChatTool {
    ChatTool {
        kind: "function",
        function: tool.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rejects_base_url_without_scheme() {
        let err = OllamaConfig::new("gemma")
            .with_base_url("localhost:11434")
            .expect_err("missing scheme should error");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_adds_trailing_slash() {
        let cfg = OllamaConfig::new("gemma")
            .with_base_url("http://localhost:11434")
            .expect("valid url");
        assert_eq!(cfg.base_url, "http://localhost:11434/");
    }

    #[test]
    fn tool_messages_keep_their_role() {
        let message = PromptMessage::tool_result(ToolCallId::new("c1"), "echo", "output");
        let mapped = map_prompt_message(&message);
        assert_eq!(mapped.role, "tool");
        assert_eq!(mapped.content, "output");
    }

    #[test]
    fn chat_response_parsing_prefers_message() {
        let json = r#"{
            "message": {"role": "assistant", "content": "hi"},
            "response": "ignored"
        }"#;

        let parsed: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.into_chunk().unwrap().delta, "hi");
    }

    #[test]
    fn tool_call_arguments_become_json_text() {
        let json = r#"{
            "message": {
                "role": "assistant",
                "content": "",
                "tool_calls": [{ "function": { "name": "list_dir", "arguments": { "path": "." } } }]
            }
        }"#;
        let chunk = serde_json::from_str::<ChatResponse>(json)
            .unwrap()
            .into_chunk()
            .unwrap();
        assert_eq!(chunk.tool_calls[0].name, "list_dir");
        let args: Value = serde_json::from_str(&chunk.tool_calls[0].arguments).unwrap();
        assert_eq!(args, json!({ "path": "." }));
    }

    #[test]
    fn error_field_is_surfaced() {
        let parsed: ChatResponse = serde_json::from_str(r#"{ "error": "model not found" }"#).unwrap();
        assert!(matches!(
            parsed.into_chunk(),
            Err(AdapterError::Response { reason }) if reason == "model not found"
        ));
    }

    #[test]
    fn build_request_respects_defaults() {
        let config = OllamaConfig::new("gemma").with_default_temperature(0.1);
        let adapter = OllamaAdapter::new(config).expect("adapter");
        let request = InferenceRequest::new(vec![PromptMessage::user("hello")])
            .unwrap()
            .with_system_prompt("sys");

        let chat = adapter.build_request(&request);
        assert_eq!(chat.model, adapter.metadata.model());
        assert_eq!(chat.messages.len(), 2);
        assert_eq!(chat.messages[0].role, "system");
        assert!(chat.options.is_some());
    }
}
