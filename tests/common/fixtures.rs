use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use taskloom::context::{ExecutionContext, OutputMap};
use taskloom::entities::{
    AiModel, Connection, DataProcessor, EntityStatus, NodeEntity, ProcessorKind, Provider,
    StepType, Workflow, WorkflowStep,
};
use taskloom::executors::{ExecutorError, ModelInvoker, StepExecutor};
use taskloom::repository::InMemoryBusinessState;
use taskloom::runner::WorkflowRunner;
use taskloom::store::InMemoryExecutionStore;

use super::invokers::EchoInvoker;

/// Everything a runner test needs. The repository and store stay concrete so
/// assertions can insert entities and query records directly.
pub struct Harness {
    pub state: Arc<InMemoryBusinessState>,
    pub store: Arc<InMemoryExecutionStore>,
    pub runner: WorkflowRunner,
}

pub fn harness() -> Harness {
    harness_with_invoker(Arc::new(EchoInvoker))
}

pub fn harness_with_invoker(invoker: Arc<dyn ModelInvoker>) -> Harness {
    taskloom::telemetry::init_tracing();
    let state = Arc::new(InMemoryBusinessState::new());
    let store = Arc::new(InMemoryExecutionStore::new());
    let runner = WorkflowRunner::new(state.clone(), store.clone(), invoker);
    Harness {
        state,
        store,
        runner,
    }
}

impl Harness {
    pub fn add_workflow(&self, id: &str) {
        self.state
            .insert_workflow(Workflow::new(id, format!("{id} workflow")));
    }

    /// Insert a model entity plus a step pointing at it. The entity id is
    /// `model_<step_id>` and the provider model id `<step_id>-v1`.
    pub fn add_model_step(&self, workflow_id: &str, step_id: &str, provider: Provider) {
        self.add_model_step_with_status(workflow_id, step_id, provider, EntityStatus::Active);
    }

    pub fn add_model_step_with_status(
        &self,
        workflow_id: &str,
        step_id: &str,
        provider: Provider,
        status: EntityStatus,
    ) {
        let entity_id = format!("model_{step_id}");
        self.state.insert_ai_model(
            AiModel::new(
                &entity_id,
                format!("{step_id} model"),
                provider,
                format!("{step_id}-v1"),
            )
            .with_status(status),
        );
        self.state.insert_step(WorkflowStep::new(
            step_id,
            workflow_id,
            StepType::AiModel,
            entity_id,
        ));
    }

    /// Insert a processor entity plus a step pointing at it. The entity name
    /// feeds into output keys like `<name>_filtered`.
    pub fn add_processor_step(
        &self,
        workflow_id: &str,
        step_id: &str,
        name: &str,
        kind: ProcessorKind,
    ) {
        self.add_processor_step_with_status(workflow_id, step_id, name, kind, EntityStatus::Active);
    }

    pub fn add_processor_step_with_status(
        &self,
        workflow_id: &str,
        step_id: &str,
        name: &str,
        kind: ProcessorKind,
        status: EntityStatus,
    ) {
        let entity_id = format!("proc_{step_id}");
        self.state
            .insert_data_processor(DataProcessor::new(&entity_id, name, kind).with_status(status));
        self.state.insert_step(WorkflowStep::new(
            step_id,
            workflow_id,
            StepType::DataProcessor,
            entity_id,
        ));
    }

    /// Insert a step whose entity does not exist in the repository.
    pub fn add_orphan_step(
        &self,
        workflow_id: &str,
        step_id: &str,
        step_type: StepType,
        entity_id: &str,
    ) {
        self.state.insert_step(WorkflowStep::new(
            step_id,
            workflow_id,
            step_type,
            entity_id,
        ));
    }

    pub fn connect(&self, workflow_id: &str, id: &str, from: &str, to: &str) {
        self.state
            .insert_connection(Connection::new(id, workflow_id, from, to));
    }
}

/// Build an [`OutputMap`] from key/value pairs.
pub fn output_map(pairs: &[(&str, Value)]) -> OutputMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

/// Executor that ignores its step and entity and returns a canned output,
/// for exercising the custom-step-type extension path.
pub struct StaticExecutor {
    pub output: OutputMap,
}

#[async_trait]
impl StepExecutor for StaticExecutor {
    fn can_execute(&self, _step: &WorkflowStep) -> bool {
        true
    }

    async fn execute(
        &self,
        _step: &WorkflowStep,
        _entity: &NodeEntity,
        _ctx: &ExecutionContext,
    ) -> Result<OutputMap, ExecutorError> {
        Ok(self.output.clone())
    }
}
