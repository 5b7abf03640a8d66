//! # taskloom: Workflow Execution Engine
//!
//! taskloom executes directed graphs of typed steps: AI-model calls and
//! deterministic data-processing operations, ordered topologically, run
//! strictly one at a time, with per-step and per-run lifecycle records.
//!
//! ## Core Concepts
//!
//! - **Steps and connections**: a workflow is a flat set of steps plus
//!   directed edges; the engine derives a total execution order (or rejects
//!   the workflow if the edges form a cycle)
//! - **Executors**: each step type maps to a [`StepExecutor`](executors::StepExecutor)
//!   through a registry; executors validate their input and do the work
//! - **Execution context**: per-run state threading input and prior step
//!   outputs into every invocation
//! - **Records**: every run writes an execution record and one step record
//!   per dispatched step through an injected [`ExecutionStore`](store::ExecutionStore)
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use taskloom::entities::{AiModel, Provider, StepType, Workflow, WorkflowStep};
//! use taskloom::executors::SimulatedInvoker;
//! use taskloom::repository::InMemoryBusinessState;
//! use taskloom::runner::WorkflowRunner;
//! use taskloom::store::{InMemoryExecutionStore, RunStatus};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> miette::Result<()> {
//! let state = Arc::new(InMemoryBusinessState::new());
//! state.insert_workflow(Workflow::new("wf_1", "demo"));
//! state.insert_ai_model(AiModel::new("model_1", "summarizer", Provider::OpenAi, "gpt-4o"));
//! state.insert_step(WorkflowStep::new("step_1", "wf_1", StepType::AiModel, "model_1"));
//! state.set_current_workflow(Some("wf_1".into()));
//!
//! let runner = WorkflowRunner::new(
//!     state,
//!     Arc::new(InMemoryExecutionStore::new()),
//!     Arc::new(SimulatedInvoker::new()),
//! );
//!
//! let input = [("message".to_string(), "Hello World".into())]
//!     .into_iter()
//!     .collect();
//! let record = runner.execute_current(input, None).await?;
//! assert_eq!(record.status, RunStatus::Completed);
//! assert!(record.output.unwrap().contains_key("response"));
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Model
//!
//! One step failing fails the run: later steps never execute, the execution
//! record is finalized as `Failed` with the error message, and the error is
//! re-raised to the caller. The only non-throwing path is
//! [`WorkflowRunner::validate`](runner::WorkflowRunner::validate), which
//! returns a structured report instead.
//!
//! ## Module Guide
//!
//! - [`entities`] - Workflows, steps, connections, and executable entities
//! - [`graph`] - Topological ordering and cycle detection
//! - [`context`] - Per-run execution context and output merging
//! - [`executors`] - Step executor trait, registry, and built-in executors
//! - [`engine`] - The sequential run loop and its bookkeeping
//! - [`store`] - Execution/step records and the store collaborator
//! - [`repository`] - Business-state collaborator contract
//! - [`runner`] - Execute/validate façade
//! - [`events`] - Step-status events for run observers

pub mod context;
pub mod engine;
pub mod entities;
pub mod events;
pub mod executors;
pub mod graph;
pub mod repository;
pub mod runner;
pub mod store;
pub mod telemetry;
