//! Progress events emitted while a turn runs.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use assist_primitives::ToolCallId;
use assist_prompts::Phase;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::review::PlanReview;

/// Something observable that happened during a turn.
#[derive(Clone, Debug, PartialEq)]
pub enum TurnEvent {
    /// A model call for `phase` is about to be made.
    PhaseStarted {
        /// Phase being entered.
        phase: Phase,
    },
    /// The reasoning plan returned by the model.
    Reasoning {
        /// Plan text.
        plan: String,
    },
    /// The plan was scored.
    PlanReviewed {
        /// Review details.
        review: PlanReview,
    },
    /// The model requested a tool.
    ToolCall {
        /// Call identifier.
        id: ToolCallId,
        /// Tool name.
        name: String,
        /// Raw JSON arguments.
        arguments: String,
    },
    /// A tool finished successfully.
    ToolResult {
        /// Call identifier.
        id: ToolCallId,
        /// Tool name.
        name: String,
        /// Value returned by the handler.
        output: Value,
        /// Wall-clock duration in milliseconds.
        elapsed_ms: u64,
    },
    /// A tool call was rejected or failed; the error text goes back to the model.
    ToolFailed {
        /// Call identifier.
        id: ToolCallId,
        /// Tool name.
        name: String,
        /// Error message.
        error: String,
    },
    /// The final answer of the turn.
    Final {
        /// Response text.
        text: String,
    },
    /// A rate-limited request will be retried.
    RetryScheduled {
        /// Phase of the failed request.
        phase: Phase,
        /// Attempt that failed, starting at 1.
        attempt: u32,
        /// Wait before the next attempt.
        delay: Duration,
    },
}

/// Receives [`TurnEvent`]s, typically to drive a UI.
pub trait TurnObserver: Send + Sync {
    /// Called synchronously for every event, in order.
    fn on_event(&self, event: &TurnEvent);
}

/// Observer that logs events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl TurnObserver for TracingObserver {
    fn on_event(&self, event: &TurnEvent) {
        match event {
            TurnEvent::PhaseStarted { phase } => info!(%phase, "phase started"),
            TurnEvent::Reasoning { plan } => debug!(chars = plan.len(), "reasoning received"),
            TurnEvent::PlanReviewed { review } => {
                if review.passed() {
                    debug!(score = review.score, "plan review passed");
                } else {
                    warn!(
                        score = review.score,
                        threshold = review.threshold,
                        missing = ?review.missing_sections,
                        unknown = ?review.unknown_tools,
                        "plan scored below threshold"
                    );
                }
            }
            TurnEvent::ToolCall { id, name, .. } => info!(%id, tool = %name, "tool call"),
            TurnEvent::ToolResult {
                id,
                name,
                elapsed_ms,
                ..
            } => debug!(%id, tool = %name, elapsed_ms, "tool succeeded"),
            TurnEvent::ToolFailed { id, name, error } => {
                warn!(%id, tool = %name, %error, "tool failed");
            }
            TurnEvent::Final { text } => debug!(chars = text.len(), "final response"),
            TurnEvent::RetryScheduled {
                phase,
                attempt,
                delay,
            } => warn!(%phase, attempt, ?delay, "rate limited, retrying"),
        }
    }
}

/// Observer used in tests to capture events.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    events: Mutex<Vec<TurnEvent>>,
}

impl CollectingObserver {
    /// Creates a shareable collecting observer.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Removes and returns every captured event.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<TurnEvent> {
        let mut lock = self.events.lock().expect("collecting observer poisoned");
        lock.drain(..).collect()
    }
}

impl TurnObserver for CollectingObserver {
    fn on_event(&self, event: &TurnEvent) {
        self.events
            .lock()
            .expect("collecting observer poisoned")
            .push(event.clone());
    }
}

/// Forwards events to several observers in registration order.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn TurnObserver>>,
}

impl CompositeObserver {
    /// Creates a composite from the supplied observers.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn TurnObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds another observer.
    pub fn push(&mut self, observer: Arc<dyn TurnObserver>) {
        self.observers.push(observer);
    }
}

impl TurnObserver for CompositeObserver {
    fn on_event(&self, event: &TurnEvent) {
        for observer in &self.observers {
            observer.on_event(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composite_forwards_to_every_observer() {
        let first = CollectingObserver::new();
        let second = CollectingObserver::new();
        let composite = CompositeObserver::new([
            first.clone() as Arc<dyn TurnObserver>,
            second.clone() as Arc<dyn TurnObserver>,
        ]);

        composite.on_event(&TurnEvent::Final {
            text: "done".into(),
        });
        TracingObserver.on_event(&TurnEvent::PhaseStarted {
            phase: Phase::Execution,
        });

        assert_eq!(first.drain().len(), 1);
        assert_eq!(second.drain().len(), 1);
        assert!(first.drain().is_empty());
    }
}
