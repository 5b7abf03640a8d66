//! Public-facing run façade.
//!
//! [`WorkflowRunner`] resolves a workflow from the business repository,
//! gathers its steps, connections, and entities, and hands them to the
//! engine. It also offers [`validate`](WorkflowRunner::validate), the one
//! non-throwing path: a structural check (entity integrity, activity status,
//! acyclicity) that accumulates every violation instead of failing fast.

use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::context::OutputMap;
use crate::engine::{EngineError, WorkflowEngine};
use crate::entities::{EntityStatus, NodeEntity, StepType, WorkflowStep};
use crate::events::StatusSender;
use crate::executors::{DataProcessorExecutor, ModelExecutor, ModelInvoker};
use crate::graph;
use crate::repository::BusinessRepository;
use crate::store::{ExecutionRecord, ExecutionStore};

/// Outcome of a non-executing workflow validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Errors from the run façade.
#[derive(Debug, Error, Diagnostic)]
pub enum RunnerError {
    #[error("no current workflow selected")]
    #[diagnostic(
        code(taskloom::runner::no_current_workflow),
        help("Select a workflow before calling execute_current.")
    )]
    NoCurrentWorkflow,

    #[error("workflow not found: {workflow_id}")]
    #[diagnostic(code(taskloom::runner::workflow_not_found))]
    WorkflowNotFound { workflow_id: String },

    #[error(transparent)]
    #[diagnostic(code(taskloom::runner::engine))]
    Engine(#[from] EngineError),
}

/// High-level execution interface over a business repository and an engine
/// pre-wired with the two built-in executors.
pub struct WorkflowRunner {
    engine: WorkflowEngine,
    repository: Arc<dyn BusinessRepository>,
}

impl WorkflowRunner {
    /// Build a runner with the model and data-processor executors
    /// registered, dispatching model calls through the given invoker.
    pub fn new(
        repository: Arc<dyn BusinessRepository>,
        store: Arc<dyn ExecutionStore>,
        invoker: Arc<dyn ModelInvoker>,
    ) -> Self {
        let mut engine = WorkflowEngine::new(store);
        engine.register_executor(StepType::AiModel, ModelExecutor::new(invoker));
        engine.register_executor(StepType::DataProcessor, DataProcessorExecutor);
        Self { engine, repository }
    }

    /// Build a runner around a caller-configured engine, for custom
    /// executor registries.
    pub fn with_engine(repository: Arc<dyn BusinessRepository>, engine: WorkflowEngine) -> Self {
        Self { engine, repository }
    }

    /// Execute the currently selected workflow.
    pub async fn execute_current(
        &self,
        input: OutputMap,
        status: Option<&StatusSender>,
    ) -> Result<ExecutionRecord, RunnerError> {
        let workflow_id = self
            .repository
            .current_workflow_id()
            .ok_or(RunnerError::NoCurrentWorkflow)?;
        self.execute(&workflow_id, input, status).await
    }

    /// Execute a workflow by id.
    pub async fn execute(
        &self,
        workflow_id: &str,
        input: OutputMap,
        status: Option<&StatusSender>,
    ) -> Result<ExecutionRecord, RunnerError> {
        let workflow =
            self.repository
                .workflow(workflow_id)
                .ok_or_else(|| RunnerError::WorkflowNotFound {
                    workflow_id: workflow_id.to_string(),
                })?;
        let steps = self.repository.steps_for(workflow_id);
        let connections = self.repository.connections_for(workflow_id);
        let entities = self.gather_entities(&steps);
        debug!(%workflow_id, steps = steps.len(), entities = entities.len(), "executing workflow");

        let record = self
            .engine
            .execute_workflow(&workflow, &steps, &connections, &entities, input, status)
            .await?;
        Ok(record)
    }

    /// Check a workflow without running it.
    ///
    /// Accumulates every violation: missing entities, inactive entities, and
    /// circular dependencies. Unlike the execute paths this never errors;
    /// an unknown workflow id yields a single-entry report.
    ///
    /// Note the deliberate asymmetry with execution: an inactive entity
    /// fails validation but does not stop a run.
    pub fn validate(&self, workflow_id: &str) -> ValidationReport {
        if self.repository.workflow(workflow_id).is_none() {
            return ValidationReport {
                valid: false,
                errors: vec![format!("Workflow not found: {workflow_id}")],
            };
        }

        let steps = self.repository.steps_for(workflow_id);
        let connections = self.repository.connections_for(workflow_id);
        let mut errors: Vec<String> = Vec::new();

        for step in &steps {
            match &step.step_type {
                StepType::AiModel => match self.repository.ai_model(&step.entity_id) {
                    None => errors.push(format!(
                        "AI Model not found for step {}: {}",
                        step.id, step.entity_id
                    )),
                    Some(model) if model.status != EntityStatus::Active => errors.push(format!(
                        "AI Model is not active for step {}: {}",
                        step.id, model.name
                    )),
                    Some(_) => {}
                },
                StepType::DataProcessor => {
                    match self.repository.data_processor(&step.entity_id) {
                        None => errors.push(format!(
                            "Data Processor not found for step {}: {}",
                            step.id, step.entity_id
                        )),
                        Some(processor) if processor.status != EntityStatus::Active => errors
                            .push(format!(
                                "Data Processor is not active for step {}: {}",
                                step.id, processor.name
                            )),
                        Some(_) => {}
                    }
                }
                // Custom step types resolve entities elsewhere; nothing to check.
                StepType::Custom(_) => {}
            }
        }

        if let Err(err) = graph::detect_cycle(&steps, &connections) {
            errors.push(err.to_string());
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Resolve each step's executable entity from the repository.
    ///
    /// Steps whose entity is missing are simply left out; the engine raises
    /// `EntityNotFound` when such a step is reached.
    fn gather_entities(&self, steps: &[WorkflowStep]) -> FxHashMap<String, NodeEntity> {
        let mut entities = FxHashMap::default();
        for step in steps {
            match &step.step_type {
                StepType::AiModel => {
                    if let Some(model) = self.repository.ai_model(&step.entity_id) {
                        entities.insert(step.entity_id.clone(), NodeEntity::AiModel(model));
                    }
                }
                StepType::DataProcessor => {
                    if let Some(processor) = self.repository.data_processor(&step.entity_id) {
                        entities
                            .insert(step.entity_id.clone(), NodeEntity::DataProcessor(processor));
                    }
                }
                StepType::Custom(_) => {}
            }
        }
        entities
    }
}
