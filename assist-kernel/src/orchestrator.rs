//! The reasoning-then-execution turn loop.

use std::fmt;
use std::sync::Arc;

use assist_adapters::traits::{
    AdapterError, AdapterMetadata, InferenceRequest, InferenceResponse, ModelAdapter,
    PromptMessage,
};
use assist_prompts::{Phase, PromptSet, RuntimeContext};
use assist_tools::ToolRegistry;
use tracing::{info, warn};

use crate::conversation::Conversation;
use crate::error::{KernelError, KernelResult};
use crate::events::{TracingObserver, TurnEvent, TurnObserver};
use crate::executor::ToolExecutor;
use crate::retry::RetryPolicy;
use crate::review::{PlanReview, ReasoningValidator};

/// Instruction appended to the user message in the reasoning phase.
pub const REASONING_INSTRUCTION: &str = "Provide your step-by-step reasoning plan.";

/// Tunables for [`Orchestrator`].
#[derive(Clone, Debug, PartialEq)]
pub struct OrchestratorConfig {
    /// Name substituted into prompts.
    pub assistant_name: String,
    /// History messages sent with each request.
    pub history_limit: usize,
    /// Tool rounds allowed before the turn is abandoned.
    pub max_tool_rounds: usize,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Nucleus sampling.
    pub top_p: Option<f32>,
    /// Output token cap.
    pub max_output_tokens: Option<u32>,
    /// Sampling seed.
    pub seed: Option<i64>,
    /// Score plans with [`ReasoningValidator`].
    pub enable_reasoning_validation: bool,
    /// Score below which a plan is flagged.
    pub reasoning_quality_threshold: f64,
    /// Backoff for rate-limited requests.
    pub retry: RetryPolicy,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            assistant_name: "Gemini".to_owned(),
            history_limit: 40,
            max_tool_rounds: 8,
            temperature: Some(0.25),
            top_p: None,
            max_output_tokens: Some(8192),
            seed: None,
            enable_reasoning_validation: true,
            reasoning_quality_threshold: 0.7,
            retry: RetryPolicy::default(),
        }
    }
}

/// What a completed turn produced.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    /// Plan from the reasoning phase.
    pub reasoning: String,
    /// Plan score, when review is enabled.
    pub review: Option<PlanReview>,
    /// Final answer.
    pub response: String,
    /// Rounds in which tools were executed.
    pub tool_rounds: usize,
    /// Tool calls executed across all rounds.
    pub tool_calls: usize,
}

/// Drives one conversation through reasoning and execution phases.
pub struct Orchestrator {
    adapter: Arc<dyn ModelAdapter>,
    executor: ToolExecutor,
    prompts: PromptSet,
    validator: Option<ReasoningValidator>,
    observer: Arc<dyn TurnObserver>,
    config: OrchestratorConfig,
    conversation: Conversation,
    last_reasoning: Option<String>,
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let metadata = self.adapter.metadata();
        f.debug_struct("Orchestrator")
            .field("provider", &metadata.provider())
            .field("model", &metadata.model())
            .field("tools", &self.executor.registry().len())
            .field("session", &self.conversation.session_id())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Wires an adapter, a frozen registry and prompts into a fresh conversation.
    #[must_use]
    pub fn new(
        adapter: Arc<dyn ModelAdapter>,
        registry: Arc<ToolRegistry>,
        prompts: PromptSet,
        config: OrchestratorConfig,
    ) -> Self {
        let validator = config
            .enable_reasoning_validation
            .then(|| ReasoningValidator::from_registry(&registry, config.reasoning_quality_threshold));
        Self {
            adapter,
            executor: ToolExecutor::new(registry),
            prompts,
            validator,
            observer: Arc::new(TracingObserver),
            config,
            conversation: Conversation::new(),
            last_reasoning: None,
        }
    }

    /// Replaces the default tracing observer.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Adapter metadata.
    #[must_use]
    pub fn metadata(&self) -> &AdapterMetadata {
        self.adapter.metadata()
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Tool registry offered to the model.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Current conversation.
    #[must_use]
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Swaps in another conversation, returning the previous one.
    pub fn replace_conversation(&mut self, conversation: Conversation) -> Conversation {
        self.last_reasoning = None;
        std::mem::replace(&mut self.conversation, conversation)
    }

    /// Forgets the history and the last plan.
    pub fn clear(&mut self) {
        self.conversation.clear();
        self.last_reasoning = None;
    }

    /// Plan produced by the most recent reasoning phase.
    #[must_use]
    pub fn last_reasoning(&self) -> Option<&str> {
        self.last_reasoning.as_deref()
    }

    /// Runs one user turn.
    ///
    /// The history is only extended when the turn completes.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::InvalidInput`] for blank input,
    /// [`KernelError::EmptyResponse`] or [`KernelError::Adapter`] when the
    /// model misbehaves, and [`KernelError::ToolLoopExhausted`] when tools are
    /// requested past the configured limit.
    pub async fn handle_turn(&mut self, message: &str) -> KernelResult<TurnOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(KernelError::invalid_input("message is empty"));
        }

        let context = RuntimeContext::capture(&self.config.assistant_name).with_tools(
            self.registry()
                .list()
                .into_iter()
                .map(|spec| spec.name().to_owned()),
        );
        let history = self.conversation.recent(self.config.history_limit);

        let reasoning = self.reason(message, &history, &context).await?;
        self.last_reasoning = Some(reasoning.clone());
        let review = self.review_plan(&reasoning);

        let (response, tool_rounds, tool_calls) =
            self.execute(message, &reasoning, history, &context).await?;

        self.conversation.push_exchange(message, response.clone());
        self.emit(&TurnEvent::Final {
            text: response.clone(),
        });
        info!(
            session = %self.conversation.session_id(),
            tool_rounds,
            tool_calls,
            "turn completed"
        );

        Ok(TurnOutcome {
            reasoning,
            review,
            response,
            tool_rounds,
            tool_calls,
        })
    }

    async fn reason(
        &self,
        message: &str,
        history: &[PromptMessage],
        context: &RuntimeContext,
    ) -> KernelResult<String> {
        self.emit(&TurnEvent::PhaseStarted {
            phase: Phase::Reasoning,
        });
        let system = self.prompts.render(Phase::Reasoning, context)?;

        let mut messages = history.to_vec();
        messages.push(PromptMessage::user(format!(
            "TASK: {message}\n\n{REASONING_INSTRUCTION}"
        )));

        let request = self.request(Phase::Reasoning, messages, system)?;
        let response = self.infer(Phase::Reasoning, request).await?;
        let plan = response.text.trim().to_owned();
        if plan.is_empty() {
            return Err(KernelError::EmptyResponse {
                phase: Phase::Reasoning,
            });
        }

        self.emit(&TurnEvent::Reasoning { plan: plan.clone() });
        Ok(plan)
    }

    fn review_plan(&self, plan: &str) -> Option<PlanReview> {
        let review = self.validator.as_ref()?.review(plan);
        if !review.passed() {
            warn!(
                score = review.score,
                threshold = review.threshold,
                "reasoning plan below quality threshold; continuing"
            );
        }
        self.emit(&TurnEvent::PlanReviewed {
            review: review.clone(),
        });
        Some(review)
    }

    async fn execute(
        &self,
        message: &str,
        reasoning: &str,
        history: Vec<PromptMessage>,
        context: &RuntimeContext,
    ) -> KernelResult<(String, usize, usize)> {
        self.emit(&TurnEvent::PhaseStarted {
            phase: Phase::Execution,
        });
        let system = format!(
            "{}\n\nYour reasoning plan: {reasoning}",
            self.prompts.render(Phase::Execution, context)?
        );
        let tools = self.executor.definitions();
        let max_rounds = self.config.max_tool_rounds;

        let mut working = history;
        working.push(PromptMessage::user(message));
        let mut calls_made = 0;

        for round in 0..=max_rounds {
            let request = self
                .request(Phase::Execution, working.clone(), system.clone())?
                .with_tools(tools.clone());
            let response = self.infer(Phase::Execution, request).await?;

            if response.tool_calls.is_empty() {
                let text = response.text.trim().to_owned();
                if text.is_empty() {
                    return Err(KernelError::EmptyResponse {
                        phase: Phase::Execution,
                    });
                }
                return Ok((text, round, calls_made));
            }
            if round == max_rounds {
                break;
            }

            working.push(PromptMessage::assistant_tool_calls(
                response.text,
                response.tool_calls.clone(),
            ));
            for call in &response.tool_calls {
                self.emit(&TurnEvent::ToolCall {
                    id: call.id.clone(),
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });

                let outcome = self.executor.execute(call).await;
                match &outcome.result {
                    Ok(output) => self.emit(&TurnEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output: output.clone(),
                        elapsed_ms: outcome.elapsed_ms(),
                    }),
                    Err(err) => self.emit(&TurnEvent::ToolFailed {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        error: err.to_string(),
                    }),
                }

                working.push(PromptMessage::tool_result(
                    call.id.clone(),
                    call.name.clone(),
                    outcome.message_content(),
                ));
                calls_made += 1;
            }
        }

        Err(KernelError::ToolLoopExhausted { rounds: max_rounds })
    }

    fn request(
        &self,
        phase: Phase,
        messages: Vec<PromptMessage>,
        system: String,
    ) -> KernelResult<InferenceRequest> {
        let mut request = InferenceRequest::new(messages)
            .map_err(|source| KernelError::Adapter { phase, source })?
            .with_system_prompt(system)
            .with_top_p(self.config.top_p)
            .with_seed(self.config.seed);
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        if let Some(tokens) = self.config.max_output_tokens {
            request = request.with_max_output_tokens(tokens);
        }
        Ok(request)
    }

    async fn infer(
        &self,
        phase: Phase,
        request: InferenceRequest,
    ) -> KernelResult<InferenceResponse> {
        let mut attempt = 1;
        loop {
            let result = match self.adapter.infer(request.clone()).await {
                Ok(stream) => InferenceResponse::collect(stream).await,
                Err(err) => Err(err),
            };

            match result {
                Ok(response) => return Ok(response),
                Err(AdapterError::RateLimited { retry_after }) => {
                    let Some(delay) = self.config.retry.delay_after(attempt, retry_after) else {
                        return Err(KernelError::Adapter {
                            phase,
                            source: AdapterError::RateLimited { retry_after },
                        });
                    };
                    self.emit(&TurnEvent::RetryScheduled {
                        phase,
                        attempt,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => return Err(KernelError::Adapter { phase, source }),
            }
        }
    }

    fn emit(&self, event: &TurnEvent) {
        self.observer.on_event(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use assist_adapters::traits::{
        AdapterResult, AdapterStream, InferenceChunk, MessageRole, ToolCall,
    };
    use assist_primitives::ToolCallId;
    use assist_tools::{ParameterRule, ToolBuilder};
    use async_trait::async_trait;
    use futures::stream;
    use serde_json::{Value, json};

    use crate::events::CollectingObserver;

    type Scripted = AdapterResult<InferenceChunk>;

    struct ScriptedAdapter {
        metadata: AdapterMetadata,
        script: Mutex<VecDeque<Scripted>>,
        requests: Mutex<Vec<InferenceRequest>>,
    }

    impl ScriptedAdapter {
        fn new(script: Vec<Scripted>) -> Arc<Self> {
            Arc::new(Self {
                metadata: AdapterMetadata::new("scripted", "test-model"),
                script: Mutex::new(script.into()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn requests(&self) -> Vec<InferenceRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ModelAdapter for ScriptedAdapter {
        fn metadata(&self) -> &AdapterMetadata {
            &self.metadata
        }

        async fn infer(&self, request: InferenceRequest) -> AdapterResult<AdapterStream> {
            self.requests.lock().unwrap().push(request);
            let next = self
                .script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(InferenceChunk::new("", true)));
            let chunk = next?;
            Ok(Box::pin(stream::once(async move { Ok(chunk) })))
        }
    }

    fn text(reply: &str) -> Scripted {
        Ok(InferenceChunk::new(reply, true))
    }

    fn tool_call(name: &str, arguments: Value) -> Scripted {
        Ok(InferenceChunk::new("", true).with_tool_calls(vec![ToolCall::new(
            ToolCallId::generate(),
            name,
            arguments.to_string(),
        )]))
    }

    const PLAN: &str = "## Problem Analysis\nx\n## Information Needs\ny\n\
        ## Tool Selection Strategy\nrecord_age(age=30)\n## Verification Strategy\nz";

    fn registry(counter: Arc<AtomicUsize>) -> Arc<ToolRegistry> {
        let mut registry = ToolRegistry::new();
        ToolBuilder::new("record_age")
            .description("Stores an age")
            .param("age", ParameterRule::integer().range(0, 150))
            .register(&mut registry, move |args: Value| {
                let counter = Arc::clone(&counter);
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(json!({ "stored": args["age"] }))
                }
            })
            .unwrap();
        Arc::new(registry)
    }

    fn orchestrator(
        adapter: Arc<ScriptedAdapter>,
        counter: Arc<AtomicUsize>,
        config: OrchestratorConfig,
    ) -> (Orchestrator, Arc<CollectingObserver>) {
        let observer = CollectingObserver::new();
        let orchestrator = Orchestrator::new(
            adapter,
            registry(counter),
            PromptSet::default(),
            config,
        )
        .with_observer(observer.clone());
        (orchestrator, observer)
    }

    #[tokio::test]
    async fn reasoning_has_no_tools_and_execution_carries_the_plan() {
        let adapter = ScriptedAdapter::new(vec![text(PLAN), text("All done.")]);
        let counter = Arc::new(AtomicUsize::new(0));
        let (mut orch, _) = orchestrator(adapter.clone(), counter, OrchestratorConfig::default());

        let outcome = orch.handle_turn("  remember my age  ").await.unwrap();
        assert_eq!(outcome.response, "All done.");
        assert_eq!(outcome.tool_rounds, 0);
        assert!(outcome.review.as_ref().is_some_and(PlanReview::passed));

        let requests = adapter.requests();
        assert_eq!(requests.len(), 2);

        let reasoning = &requests[0];
        assert!(reasoning.tools().is_empty());
        let task = reasoning.messages().last().unwrap();
        assert_eq!(
            task.content(),
            format!("TASK: remember my age\n\n{REASONING_INSTRUCTION}")
        );

        let execution = &requests[1];
        assert_eq!(execution.tools().len(), 1);
        assert!(
            execution
                .system_prompt()
                .unwrap()
                .ends_with(&format!("Your reasoning plan: {PLAN}"))
        );
        assert_eq!(execution.messages().last().unwrap().content(), "remember my age");

        assert_eq!(orch.conversation().len(), 2);
        assert_eq!(orch.last_reasoning(), Some(PLAN));
    }

    #[tokio::test]
    async fn validation_failures_are_fed_back_and_the_turn_completes() {
        let adapter = ScriptedAdapter::new(vec![
            text(PLAN),
            tool_call("record_age", json!({ "age": 200 })),
            tool_call("record_age", json!({ "age": 30 })),
            text("Stored 30."),
        ]);
        let counter = Arc::new(AtomicUsize::new(0));
        let (mut orch, observer) =
            orchestrator(adapter.clone(), counter.clone(), OrchestratorConfig::default());

        let outcome = orch.handle_turn("store age").await.unwrap();
        assert_eq!(outcome.response, "Stored 30.");
        assert_eq!(outcome.tool_rounds, 2);
        assert_eq!(outcome.tool_calls, 2);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        let requests = adapter.requests();
        let feedback = requests[2].messages().last().unwrap();
        assert_eq!(feedback.role(), MessageRole::Tool);
        assert!(feedback.content().contains("max"), "{}", feedback.content());

        let events = observer.drain();
        assert!(events.iter().any(|e| matches!(e, TurnEvent::ToolFailed { .. })));
        assert!(events.iter().any(|e| matches!(e, TurnEvent::ToolResult { .. })));
        assert!(matches!(events.last(), Some(TurnEvent::Final { text }) if text == "Stored 30."));

        // Tool rounds are not persisted.
        assert_eq!(orch.conversation().len(), 2);
    }

    #[tokio::test]
    async fn tool_loop_is_bounded() {
        let adapter = ScriptedAdapter::new(vec![
            text(PLAN),
            tool_call("record_age", json!({ "age": 1 })),
            tool_call("record_age", json!({ "age": 2 })),
        ]);
        let config = OrchestratorConfig {
            max_tool_rounds: 1,
            ..OrchestratorConfig::default()
        };
        let (mut orch, _) = orchestrator(adapter, Arc::new(AtomicUsize::new(0)), config);

        let err = orch.handle_turn("loop").await.unwrap_err();
        assert!(matches!(err, KernelError::ToolLoopExhausted { rounds: 1 }));
        assert!(orch.conversation().is_empty());
    }

    #[tokio::test]
    async fn blank_input_never_reaches_the_model() {
        let adapter = ScriptedAdapter::new(Vec::new());
        let (mut orch, _) = orchestrator(
            adapter.clone(),
            Arc::new(AtomicUsize::new(0)),
            OrchestratorConfig::default(),
        );

        let err = orch.handle_turn("   ").await.unwrap_err();
        assert!(matches!(err, KernelError::InvalidInput { .. }));
        assert!(adapter.requests().is_empty());
    }

    #[tokio::test]
    async fn empty_reasoning_is_an_error() {
        let adapter = ScriptedAdapter::new(vec![text("   ")]);
        let (mut orch, _) = orchestrator(
            adapter,
            Arc::new(AtomicUsize::new(0)),
            OrchestratorConfig::default(),
        );

        let err = orch.handle_turn("hello").await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::EmptyResponse {
                phase: Phase::Reasoning
            }
        ));
    }

    #[tokio::test]
    async fn rate_limits_are_retried() {
        let adapter = ScriptedAdapter::new(vec![
            Err(AdapterError::RateLimited { retry_after: None }),
            text(PLAN),
            text("ok"),
        ]);
        let config = OrchestratorConfig {
            retry: RetryPolicy::new(3, Duration::ZERO),
            ..OrchestratorConfig::default()
        };
        let (mut orch, observer) = orchestrator(adapter, Arc::new(AtomicUsize::new(0)), config);

        let outcome = orch.handle_turn("hi").await.unwrap();
        assert_eq!(outcome.response, "ok");
        assert!(observer.drain().iter().any(|e| matches!(
            e,
            TurnEvent::RetryScheduled {
                phase: Phase::Reasoning,
                attempt: 1,
                ..
            }
        )));
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_adapter_error() {
        let adapter = ScriptedAdapter::new(vec![
            Err(AdapterError::RateLimited { retry_after: None }),
            Err(AdapterError::RateLimited { retry_after: None }),
        ]);
        let config = OrchestratorConfig {
            retry: RetryPolicy::new(2, Duration::ZERO),
            ..OrchestratorConfig::default()
        };
        let (mut orch, _) = orchestrator(adapter, Arc::new(AtomicUsize::new(0)), config);

        let err = orch.handle_turn("hi").await.unwrap_err();
        assert!(matches!(
            err,
            KernelError::Adapter { phase: Phase::Reasoning, ref source } if source.is_rate_limited()
        ));
    }

    #[tokio::test]
    async fn weak_plans_are_flagged_but_executed() {
        let adapter = ScriptedAdapter::new(vec![text("just wing it with magic()"), text("done")]);
        let (mut orch, observer) = orchestrator(
            adapter,
            Arc::new(AtomicUsize::new(0)),
            OrchestratorConfig::default(),
        );

        let outcome = orch.handle_turn("do it").await.unwrap();
        let review = outcome.review.unwrap();
        assert!(!review.passed());
        assert_eq!(review.unknown_tools, vec!["magic"]);
        assert_eq!(outcome.response, "done");
        assert!(observer
            .drain()
            .iter()
            .any(|e| matches!(e, TurnEvent::PlanReviewed { review } if !review.passed())));
    }

    #[tokio::test]
    async fn history_is_replayed_and_clear_resets_it() {
        let adapter = ScriptedAdapter::new(vec![
            text(PLAN),
            text("first answer"),
            text(PLAN),
            text("second answer"),
        ]);
        let (mut orch, _) = orchestrator(
            adapter.clone(),
            Arc::new(AtomicUsize::new(0)),
            OrchestratorConfig::default(),
        );

        orch.handle_turn("first").await.unwrap();
        orch.handle_turn("second").await.unwrap();

        let requests = adapter.requests();
        let second_reasoning = requests[2].messages();
        assert_eq!(second_reasoning[0].content(), "first");
        assert_eq!(second_reasoning[1].content(), "first answer");

        orch.clear();
        assert!(orch.conversation().is_empty());
        assert!(orch.last_reasoning().is_none());
    }
}
