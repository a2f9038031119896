//! Runs model-requested tool calls against the registry.

use std::sync::Arc;
use std::time::{Duration, Instant};

use assist_adapters::traits::{ToolCall, ToolDefinition};
use assist_tools::{PluginError, ToolRegistry};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

/// Why a tool call produced no value.
#[derive(Debug, Error)]
pub enum ToolFailure {
    /// The arguments were not valid JSON.
    #[error("invalid JSON arguments for {tool}: {reason}")]
    MalformedArguments {
        /// Tool name.
        tool: String,
        /// Decoder message.
        reason: String,
    },

    /// The model passed a parameter the tool does not declare.
    #[error("unexpected argument `{argument}` for tool {tool}")]
    UnexpectedArgument {
        /// Tool name.
        tool: String,
        /// Undeclared argument.
        argument: String,
    },

    /// Lookup, validation, or execution failed inside the tool layer.
    #[error(transparent)]
    Plugin(#[from] PluginError),
}

/// Result of one tool call.
#[derive(Debug)]
pub struct ToolOutcome {
    /// The call as requested by the model.
    pub call: ToolCall,
    /// Handler output or failure.
    pub result: Result<Value, ToolFailure>,
    /// Time spent from argument decoding to handler return.
    pub elapsed: Duration,
}

impl ToolOutcome {
    /// Text sent back to the model as the tool message.
    #[must_use]
    pub fn message_content(&self) -> String {
        match &self.result {
            Ok(Value::String(text)) => text.clone(),
            Ok(value) => value.to_string(),
            Err(err) => format!("Error: {err}"),
        }
    }

    /// Elapsed time in whole milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed.as_millis()).unwrap_or(u64::MAX)
    }
}

/// Decodes arguments and dispatches tool calls.
#[derive(Clone, Debug)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
}

impl ToolExecutor {
    /// Creates an executor over a frozen registry.
    #[must_use]
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    /// Registry the executor dispatches into.
    #[must_use]
    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Function declarations for every registered tool, sorted by name.
    #[must_use]
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.registry
            .list()
            .into_iter()
            .map(|spec| ToolDefinition {
                name: spec.name().to_owned(),
                description: spec.description().to_owned(),
                parameters: spec.parameters_schema(),
            })
            .collect()
    }

    /// Executes one call. Never fails; errors are captured in the outcome.
    pub async fn execute(&self, call: &ToolCall) -> ToolOutcome {
        let started = Instant::now();
        let result = self.run(call).await;
        let outcome = ToolOutcome {
            call: call.clone(),
            result,
            elapsed: started.elapsed(),
        };
        debug!(
            tool = %call.name,
            ok = outcome.result.is_ok(),
            elapsed_ms = outcome.elapsed_ms(),
            "tool call finished"
        );
        outcome
    }

    async fn run(&self, call: &ToolCall) -> Result<Value, ToolFailure> {
        let tool = self.registry.get_tool(&call.name)?;
        let args = decode_arguments(&call.name, &call.arguments)?;

        if let Value::Object(map) = &args {
            if let Some(argument) = map.keys().find(|key| tool.spec().parameter(key).is_none()) {
                return Err(ToolFailure::UnexpectedArgument {
                    tool: call.name.clone(),
                    argument: argument.clone(),
                });
            }
        }

        Ok(tool.invoke(args).await?)
    }
}

fn decode_arguments(tool: &str, raw: &str) -> Result<Value, ToolFailure> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(raw).map_err(|err| ToolFailure::MalformedArguments {
        tool: tool.to_owned(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assist_primitives::ToolCallId;
    use assist_tools::{ErrorKind, ParameterRule, ToolBuilder};
    use serde_json::json;

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        ToolBuilder::new("greet")
            .description("Greets someone")
            .param("who", ParameterRule::string().regex("[A-Za-z]+"))
            .param("shout", ParameterRule::new().default(false))
            .register(&mut registry, |args: Value| async move {
                let who = args["who"].as_str().unwrap_or_default().to_owned();
                if args["shout"] == json!(true) {
                    Ok(json!(who.to_uppercase()))
                } else {
                    Ok(json!({ "greeting": format!("hello {who}") }))
                }
            })
            .unwrap();
        ToolExecutor::new(Arc::new(registry))
    }

    fn call(name: &str, arguments: &str) -> ToolCall {
        ToolCall::new(ToolCallId::new("c1"), name, arguments)
    }

    #[tokio::test]
    async fn executes_and_fills_defaults() {
        let outcome = executor().execute(&call("greet", r#"{"who": "ada"}"#)).await;
        assert_eq!(outcome.result.unwrap(), json!({ "greeting": "hello ada" }));
    }

    #[tokio::test]
    async fn string_results_are_sent_verbatim() {
        let outcome = executor()
            .execute(&call("greet", r#"{"who": "ada", "shout": true}"#))
            .await;
        assert_eq!(outcome.message_content(), "ADA");
    }

    #[tokio::test]
    async fn rejects_undeclared_arguments() {
        let outcome = executor()
            .execute(&call("greet", r#"{"who": "ada", "volume": 11}"#))
            .await;
        assert!(matches!(
            outcome.result,
            Err(ToolFailure::UnexpectedArgument { ref argument, .. }) if argument == "volume"
        ));
    }

    #[tokio::test]
    async fn malformed_json_is_reported() {
        let outcome = executor().execute(&call("greet", "{who:")).await;
        assert!(matches!(outcome.result, Err(ToolFailure::MalformedArguments { .. })));
        assert!(outcome.message_content().starts_with("Error: invalid JSON"));
    }

    #[tokio::test]
    async fn unknown_tools_and_validation_failures_are_plugin_errors() {
        let exec = executor();
        let missing = exec.execute(&call("nope", "{}")).await;
        assert!(matches!(
            missing.result,
            Err(ToolFailure::Plugin(ref err)) if err.kind() == ErrorKind::ToolNotFound
        ));

        let invalid = exec.execute(&call("greet", "")).await;
        assert!(matches!(
            invalid.result,
            Err(ToolFailure::Plugin(ref err)) if err.kind() == ErrorKind::MissingParameter
        ));
    }

    #[test]
    fn definitions_use_parameter_schemas() {
        let defs = executor().definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "greet");
        assert_eq!(defs[0].parameters["required"], json!(["who"]));
    }
}
