//! Adapter for OpenAI-compatible chat completion endpoints.
//!
//! Any service exposing `POST {base}/chat/completions` in the `OpenAI` wire
//! format works, including Gemini's compatibility endpoint.

use std::{env, fmt, time::Duration};

use assist_primitives::ToolCallId;
use async_trait::async_trait;
use futures::stream;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE};
use hyper::{Body, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::http_client::{HyperClient, Reply, build_https_client, sanitize_base_url, send};
use crate::traits::{
    AdapterError, AdapterMetadata, AdapterResult, AdapterStream, InferenceChunk, InferenceRequest,
    MessageRole, ModelAdapter, PromptMessage, ToolCall, ToolDefinition,
};

/// Environment variable checked first for the API key.
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable checked when [`OPENAI_API_KEY_ENV`] is unset.
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Default endpoint base.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1/";

/// Configuration for the `OpenAI` adapter.
#[derive(Clone, Debug)]
pub struct OpenAiConfig {
    api_key: Option<String>,
    model: String,
    base_url: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl OpenAiConfig {
    /// Creates a configuration using the supplied model identifier.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            api_key: None,
            model: model.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_owned(),
            timeout: Duration::from_secs(60),
            default_temperature: None,
        }
    }

    /// Loads the API key from `OPENAI_API_KEY`, falling back to `GEMINI_API_KEY`.
    #[must_use]
    pub fn from_env(model: impl Into<String>) -> Self {
        let mut cfg = Self::new(model);
        cfg.api_key = env::var(OPENAI_API_KEY_ENV)
            .or_else(|_| env::var(GEMINI_API_KEY_ENV))
            .ok();
        cfg
    }

    /// Overrides the base URL; `chat/completions` is appended to it.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the supplied URL is invalid.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = sanitize_base_url("OpenAI", base_url.as_ref())?;
        Ok(self)
    }

    /// Sets the default sampling temperature used when requests omit it.
    #[must_use]
    pub fn with_default_temperature(mut self, temperature: f32) -> Self {
        self.default_temperature = Some(temperature);
        self
    }

    /// Sets the HTTP request timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Supplies an explicit API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }
}

/// Adapter that calls an OpenAI-compatible API over HTTPS.
pub struct OpenAiAdapter {
    client: HyperClient,
    endpoint: Uri,
    metadata: AdapterMetadata,
    api_key: String,
    timeout: Duration,
    default_temperature: Option<f32>,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("model", &self.metadata.model())
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Constructs a new adapter with the provided configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] if the API key is missing.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        let api_key = config.api_key.ok_or_else(|| {
            AdapterError::configuration(format!(
                "OpenAI adapter requires an API key (set {OPENAI_API_KEY_ENV} or {GEMINI_API_KEY_ENV})"
            ))
        })?;

        let metadata = AdapterMetadata::new("openai", config.model.clone());
        let endpoint = format!("{}chat/completions", config.base_url)
            .parse::<Uri>()
            .map_err(|err| {
                AdapterError::configuration(format!("invalid OpenAI endpoint: {err}"))
            })?;

        let client = build_https_client()?;

        Ok(Self {
            client,
            endpoint,
            metadata,
            api_key,
            timeout: config.timeout,
            default_temperature: config.default_temperature,
        })
    }

    fn build_request(&self, request: &InferenceRequest) -> ChatCompletionRequest {
        let system = request
            .system_prompt()
            .map(|prompt| OpenAiMessage::plain(MessageRole::System, prompt));
        let messages = system
            .into_iter()
            .chain(request.messages().iter().map(map_prompt_message))
            .collect();

        ChatCompletionRequest {
            model: self.metadata.model().to_owned(),
            messages,
            temperature: request.temperature().or(self.default_temperature),
            top_p: request.top_p(),
            seed: request.seed(),
            max_tokens: request.max_output_tokens(),
            tools: request.tools().iter().map(map_tool_definition).collect(),
            stream: false,
        }
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
        let payload = self.build_request(&request);
        let body = serde_json::to_vec(&payload).map_err(|err| {
            AdapterError::invalid_request(format!("failed to encode OpenAI request: {err}"))
        })?;
        debug!(
            model = %payload.model,
            messages = payload.messages.len(),
            tools = payload.tools.len(),
            "sending chat completion request"
        );

        let request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .body(Body::from(body))
            .map_err(|err| {
                AdapterError::transport(format!("failed to build OpenAI request: {err}"))
            })?;

        let Reply {
            status,
            retry_after,
            body: bytes,
        } = send(&self.client, request, self.timeout, "OpenAI").await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(AdapterError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let reason = String::from_utf8_lossy(&bytes).to_string();
            return Err(AdapterError::response(format!(
                "OpenAI returned {status}: {reason}"
            )));
        }

        let response: ChatCompletionResponse = serde_json::from_slice(&bytes).map_err(|err| {
            AdapterError::response(format!("failed to decode OpenAI response: {err}"))
        })?;

        let chunk = response.into_chunk();
        let stream = stream::once(async move { Ok(chunk) });
        Ok(Box::pin(stream))
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "max_tokens")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<OpenAiTool>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OpenAiMessage {
    role: String,
    content: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<OpenAiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
}

impl OpenAiMessage {
    fn plain(role: MessageRole, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_owned()),
            tool_calls: Vec::new(),
            tool_call_id: None,
            name: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct OpenAiTool {
    #[serde(rename = "type")]
    kind: &'static str,
    function: OpenAiFunction,
}

#[derive(Debug, Serialize)]
struct OpenAiFunction {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiToolCall {
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: OpenAiFunctionCall,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_owned()
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

impl ChatCompletionResponse {
    fn into_chunk(self) -> InferenceChunk {
        let message = self
            .choices
            .into_iter()
            .find_map(|choice| choice.message)
            .unwrap_or_default();

        let calls = message
            .tool_calls
            .into_iter()
            .map(|call| {
                let id = call
                    .id
                    .filter(|id| !id.is_empty())
                    .map_or_else(ToolCallId::generate, ToolCallId::new);
                ToolCall::new(id, call.function.name, call.function.arguments)
            })
            .collect();

        InferenceChunk::new(message.content.unwrap_or_default(), true).with_tool_calls(calls)
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<OpenAiToolCall>,
}

fn map_prompt_message(message: &PromptMessage) -> OpenAiMessage {
    let tool_calls: Vec<OpenAiToolCall> = message
        .tool_calls()
        .iter()
        .map(|call| OpenAiToolCall {
            id: Some(call.id.to_string()),
            kind: function_kind(),
            function: OpenAiFunctionCall {
                name: call.name.clone(),
                arguments: call.arguments.clone(),
            },
        })
        .collect();

    let content = if message.content().is_empty() && !tool_calls.is_empty() {
        None
    } else {
        Some(message.content().to_owned())
    };

    OpenAiMessage {
        role: message.role().to_string(),
        content,
        tool_calls,
        tool_call_id: message.tool_call_id().map(ToString::to_string),
        name: message.name().map(str::to_owned),
    }
}

fn map_tool_definition(tool: &ToolDefinition) -> OpenAiTool {
    OpenAiTool {
        kind: "function",
        function: OpenAiFunction {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}
