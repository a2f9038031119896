//! Conversation kernel: the two-phase turn loop and its supporting pieces.
//!
//! An [`Orchestrator`] first asks the model for a plan without offering any
//! tools, optionally scores the plan with a [`ReasoningValidator`], then runs
//! an execution phase in which the model may call registered tools through
//! the [`ToolExecutor`]. Progress is reported to a [`TurnObserver`].

#![warn(missing_docs, clippy::pedantic)]

mod conversation;
mod error;
mod events;
mod executor;
mod orchestrator;
mod retry;
mod review;

pub use conversation::Conversation;
pub use error::{KernelError, KernelResult};
pub use events::{CollectingObserver, CompositeObserver, TracingObserver, TurnEvent, TurnObserver};
pub use executor::{ToolExecutor, ToolFailure, ToolOutcome};
pub use orchestrator::{Orchestrator, OrchestratorConfig, REASONING_INSTRUCTION, TurnOutcome};
pub use retry::{MAX_SERVER_HINT, RetryPolicy};
pub use review::{PlanReview, REQUIRED_SECTIONS, ReasoningValidator};
