//! Step executors and the registry that dispatches to them.
//!
//! A [`StepExecutor`] is the capability that knows how to run one kind of
//! workflow step. The engine resolves executors through an
//! [`ExecutorRegistry`] keyed by [`StepType`], so new step kinds plug in
//! without touching the run loop.
//!
//! Two executors ship with the crate:
//!
//! - [`ModelExecutor`]: renders a prompt template and dispatches it to a
//!   [`ModelInvoker`] capability
//! - [`DataProcessorExecutor`]: applies one of four deterministic
//!   data-processing operations

pub mod model;
pub mod processor;

pub use model::{InvokerError, ModelExecutor, ModelInvoker, ModelReply, SimulatedInvoker};
pub use processor::DataProcessorExecutor;

use async_trait::async_trait;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;

use crate::context::{ExecutionContext, OutputMap};
use crate::entities::{NodeEntity, StepType, WorkflowStep};

/// A unit of work the engine can dispatch a step to.
///
/// Implementations should be stateless: everything a step needs arrives
/// through the step definition, its resolved entity, and the run context.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    /// Whether this executor handles the given step's type tag.
    fn can_execute(&self, step: &WorkflowStep) -> bool;

    /// Run the step and return its flat output map.
    async fn execute(
        &self,
        step: &WorkflowStep,
        entity: &NodeEntity,
        ctx: &ExecutionContext,
    ) -> Result<OutputMap, ExecutorError>;
}

/// Errors raised by step executors.
#[derive(Debug, Error, Diagnostic)]
pub enum ExecutorError {
    /// The engine dispatched a step to an executor whose type tag does not
    /// match. Indicates a mis-registered executor.
    #[error("executor cannot handle step {step_id} of type: {step_type}")]
    #[diagnostic(
        code(taskloom::executor::wrong_step_type),
        help("Register the executor under the step type it reports via can_execute.")
    )]
    WrongStepType { step_id: String, step_type: String },

    /// The step's resolved entity is not of the kind this executor expects.
    #[error("step {step_id} expected a {expected} entity but resolved a {actual}")]
    #[diagnostic(code(taskloom::executor::wrong_entity))]
    WrongEntity {
        step_id: String,
        expected: &'static str,
        actual: &'static str,
    },

    /// A data processor declared an operation this crate does not implement.
    #[error("unsupported processor type: {kind}")]
    #[diagnostic(
        code(taskloom::executor::unsupported_processor),
        help("Known processor types are filter, transform, validate, and aggregate.")
    )]
    UnsupportedProcessorType { kind: String },

    /// The model-invocation capability refused or failed the call.
    #[error(transparent)]
    #[diagnostic(code(taskloom::executor::invoker))]
    Invoker(#[from] InvokerError),

    /// JSON encoding of context data failed while rendering a prompt.
    #[error(transparent)]
    #[diagnostic(code(taskloom::executor::serde_json))]
    Serde(#[from] serde_json::Error),
}

/// Maps step type tags to the executor capable of running them.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use taskloom::entities::StepType;
/// use taskloom::executors::{DataProcessorExecutor, ExecutorRegistry};
///
/// let mut registry = ExecutorRegistry::new();
/// registry.register(StepType::DataProcessor, DataProcessorExecutor);
/// assert!(registry.resolve(&StepType::DataProcessor).is_some());
/// assert!(registry.resolve(&StepType::AiModel).is_none());
/// ```
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: FxHashMap<StepType, Arc<dyn StepExecutor>>,
}

impl ExecutorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an executor for a step type, replacing any previous one.
    pub fn register(&mut self, step_type: StepType, executor: impl StepExecutor + 'static) {
        self.executors.insert(step_type, Arc::new(executor));
    }

    /// Resolve the executor for a step type, if one is registered.
    #[must_use]
    pub fn resolve(&self, step_type: &StepType) -> Option<Arc<dyn StepExecutor>> {
        self.executors.get(step_type).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.executors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.executors.is_empty()
    }
}
