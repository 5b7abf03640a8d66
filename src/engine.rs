//! The workflow engine: sequential step dispatch with lifecycle bookkeeping.
//!
//! [`WorkflowEngine`] drives one run end to end: it creates the execution
//! record, builds the dispatch order, resolves each step's entity and
//! executor, threads the [`ExecutionContext`](crate::context::ExecutionContext)
//! through every invocation, and finalizes the record on either outcome.
//!
//! Failure policy: any step failure aborts the whole run. The engine is the
//! single place that catches executor errors, records them into the
//! execution record, and re-raises to the caller, so the caller can both
//! observe the thrown error and fetch the fully populated record afterwards.

use chrono::Utc;
use miette::Diagnostic;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::context::{ExecutionContext, OutputMap};
use crate::entities::{Connection, NodeEntity, StepType, Workflow, WorkflowStep};
use crate::events::{StatusSender, StepStatusUpdate};
use crate::executors::{ExecutorError, ExecutorRegistry, StepExecutor};
use crate::graph::{self, GraphError};
use crate::store::{
    ExecutionRecord, ExecutionStore, ExecutionUpdate, LogLevel, NewExecution, NewLog,
    NewStepExecution, RunStatus, StepExecutionUpdate, StepMetadata, StepRunStatus, StoreError,
};

/// Errors that fail a workflow run.
#[derive(Debug, Error, Diagnostic)]
pub enum EngineError {
    /// The connection set contains a cycle; raised before any step runs.
    #[error(transparent)]
    #[diagnostic(code(taskloom::engine::graph))]
    Graph(#[from] GraphError),

    /// A step references a business entity that was not supplied.
    #[error("entity not found for step {step_id}: {entity_id}")]
    #[diagnostic(
        code(taskloom::engine::entity_not_found),
        help("The referenced entity was deleted or never gathered; re-sync the workflow.")
    )]
    EntityNotFound { step_id: String, entity_id: String },

    /// No registered executor handles the step's type.
    #[error("no executor found for step type: {step_type}")]
    #[diagnostic(
        code(taskloom::engine::no_executor),
        help("Register an executor for this step type before running.")
    )]
    NoExecutorForType { step_type: String },

    /// A step's executor rejected or failed.
    #[error(transparent)]
    #[diagnostic(code(taskloom::engine::executor))]
    Executor(#[from] ExecutorError),

    /// The execution store rejected a bookkeeping call.
    #[error(transparent)]
    #[diagnostic(code(taskloom::engine::store))]
    Store(#[from] StoreError),
}

/// Orchestrates workflow runs against a pluggable executor registry and an
/// injected execution store.
///
/// The engine holds no business state: workflows, steps, connections, and
/// entities arrive per call (usually from
/// [`WorkflowRunner`](crate::runner::WorkflowRunner)).
pub struct WorkflowEngine {
    executors: ExecutorRegistry,
    store: Arc<dyn ExecutionStore>,
}

impl WorkflowEngine {
    /// Create an engine with an empty executor registry.
    pub fn new(store: Arc<dyn ExecutionStore>) -> Self {
        Self {
            executors: ExecutorRegistry::new(),
            store,
        }
    }

    /// Register an executor for a step type, replacing any previous one.
    pub fn register_executor(&mut self, step_type: StepType, executor: impl StepExecutor + 'static) {
        self.executors.register(step_type, executor);
    }

    #[must_use]
    pub fn executors(&self) -> &ExecutorRegistry {
        &self.executors
    }

    /// Execute a workflow: one run, strictly sequential steps.
    ///
    /// On success, returns the completed [`ExecutionRecord`] with aggregated
    /// output. On any failure, the record is finalized as `Failed` (end time
    /// and error message set) before the error is returned, so callers can
    /// fetch the record by id to inspect what happened.
    #[instrument(skip_all, fields(workflow_id = %workflow.id, steps = steps.len()))]
    pub async fn execute_workflow(
        &self,
        workflow: &Workflow,
        steps: &[WorkflowStep],
        connections: &[Connection],
        entities: &FxHashMap<String, NodeEntity>,
        input: OutputMap,
        status: Option<&StatusSender>,
    ) -> Result<ExecutionRecord, EngineError> {
        let execution = self
            .store
            .create_execution(NewExecution {
                workflow_id: workflow.id.clone(),
                status: RunStatus::Pending,
                start_time: Utc::now(),
                input: input.clone(),
            })
            .await?;
        let execution_id = execution.id.clone();
        info!(%execution_id, "workflow run created");

        self.store
            .update_execution(&execution_id, ExecutionUpdate::running())
            .await?;
        self.log(
            &execution_id,
            None,
            LogLevel::Info,
            format!("workflow '{}' started", workflow.name),
        )
        .await;

        let run = self
            .run_steps(
                &execution_id,
                workflow,
                steps,
                connections,
                entities,
                input,
                status,
            )
            .await;

        match run {
            Ok(output) => {
                self.store
                    .update_execution(&execution_id, ExecutionUpdate::completed(Utc::now(), output))
                    .await?;
                self.log(
                    &execution_id,
                    None,
                    LogLevel::Info,
                    format!("workflow '{}' completed", workflow.name),
                )
                .await;
                info!(%execution_id, "workflow run completed");
                Ok(self.store.get_execution(&execution_id).await?)
            }
            Err(err) => {
                let message = err.to_string();
                self.store
                    .update_execution(
                        &execution_id,
                        ExecutionUpdate::failed(Utc::now(), message.clone()),
                    )
                    .await?;
                self.log(&execution_id, None, LogLevel::Error, message.clone())
                    .await;
                warn!(%execution_id, error = %message, "workflow run failed");
                Err(err)
            }
        }
    }

    /// The inner run loop; any error here fails the whole run.
    #[allow(clippy::too_many_arguments)]
    async fn run_steps(
        &self,
        execution_id: &str,
        workflow: &Workflow,
        steps: &[WorkflowStep],
        connections: &[Connection],
        entities: &FxHashMap<String, NodeEntity>,
        input: OutputMap,
        status: Option<&StatusSender>,
    ) -> Result<OutputMap, EngineError> {
        let order = graph::execution_order(steps, connections)?;
        let mut ctx = ExecutionContext::new(execution_id, workflow.id.clone(), input);
        let mut final_output = OutputMap::default();

        for step in order {
            let entity =
                entities
                    .get(&step.entity_id)
                    .ok_or_else(|| EngineError::EntityNotFound {
                        step_id: step.id.clone(),
                        entity_id: step.entity_id.clone(),
                    })?;

            let start_time = Utc::now();
            if let Some(tx) = status {
                tx.emit(&step.id, StepStatusUpdate::running(start_time));
            }
            debug!(step_id = %step.id, step_type = %step.step_type, "step started");

            let step_execution = self
                .store
                .create_step_execution(NewStepExecution {
                    execution_id: execution_id.to_string(),
                    step_id: step.id.clone(),
                    status: StepRunStatus::Running,
                    start_time,
                    metadata: StepMetadata::default(),
                })
                .await?;

            let step_input = ctx.step_input();
            let result = match self.executors.resolve(&step.step_type) {
                Some(executor) => executor
                    .execute(step, entity, &ctx)
                    .await
                    .map_err(EngineError::from),
                None => Err(EngineError::NoExecutorForType {
                    step_type: step.step_type.encode(),
                }),
            };

            match result {
                Ok(output) => {
                    ctx.record_output(&step.id, output.clone());
                    for (key, value) in &output {
                        final_output.insert(key.clone(), value.clone());
                    }

                    if let Some(tx) = status {
                        tx.emit(&step.id, StepStatusUpdate::completed(start_time));
                    }
                    let end_time = Utc::now();
                    let token_usage = output.get("tokenUsage").and_then(|v| v.as_u64());
                    self.store
                        .update_step_execution(
                            &step_execution.id,
                            StepExecutionUpdate::completed(end_time, step_input, output)
                                .with_duration_ms((end_time - start_time).num_milliseconds())
                                .with_token_usage(token_usage),
                        )
                        .await?;
                    debug!(step_id = %step.id, "step completed");
                }
                Err(err) => {
                    let message = err.to_string();
                    if let Some(tx) = status {
                        tx.emit(&step.id, StepStatusUpdate::failed(start_time, &message));
                    }
                    let end_time = Utc::now();
                    self.store
                        .update_step_execution(
                            &step_execution.id,
                            StepExecutionUpdate::failed(end_time, message.clone())
                                .with_duration_ms((end_time - start_time).num_milliseconds()),
                        )
                        .await?;
                    self.log(execution_id, Some(&step.id), LogLevel::Error, message)
                        .await;
                    return Err(err);
                }
            }
        }

        Ok(final_output)
    }

    /// Best-effort log write; a failing log must not fail the run.
    async fn log(
        &self,
        execution_id: &str,
        step_id: Option<&str>,
        level: LogLevel,
        message: String,
    ) {
        let result = self
            .store
            .create_log(NewLog {
                execution_id: execution_id.to_string(),
                step_id: step_id.map(ToString::to_string),
                level,
                message,
                metadata: None,
            })
            .await;
        if let Err(err) = result {
            warn!(%execution_id, error = %err, "failed to write execution log");
        }
    }
}
