//! Engine run-loop behavior: lifecycle records, status events, failure
//! short-circuiting, and the custom-executor extension path.

mod common;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::json;

use common::*;
use taskloom::engine::{EngineError, WorkflowEngine};
use taskloom::entities::{
    Connection, DataProcessor, NodeEntity, ProcessorKind, StepType, Workflow, WorkflowStep,
};
use taskloom::events::{StatusSender, StepStatus};
use taskloom::executors::DataProcessorExecutor;
use taskloom::store::{ExecutionStore, InMemoryExecutionStore, RunStatus, StepRunStatus};

fn engine_with_processor(store: Arc<InMemoryExecutionStore>) -> WorkflowEngine {
    let mut engine = WorkflowEngine::new(store);
    engine.register_executor(StepType::DataProcessor, DataProcessorExecutor);
    engine
}

fn processor_step(id: &str) -> WorkflowStep {
    WorkflowStep::new(id, "wf_1", StepType::DataProcessor, format!("proc_{id}"))
}

fn processor_entity(step_id: &str, name: &str, kind: ProcessorKind) -> (String, NodeEntity) {
    (
        format!("proc_{step_id}"),
        NodeEntity::DataProcessor(DataProcessor::new(format!("proc_{step_id}"), name, kind)),
    )
}

fn conn(id: &str, from: &str, to: &str) -> Connection {
    Connection::new(id, "wf_1", from, to)
}

#[tokio::test]
async fn run_completes_and_finalizes_all_records() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = engine_with_processor(store.clone());

    let workflow = Workflow::new("wf_1", "two-stage");
    let steps = vec![processor_step("p1"), processor_step("p2")];
    let connections = vec![conn("c1", "p1", "p2")];
    let entities: FxHashMap<String, NodeEntity> = [
        processor_entity("p1", "clean", ProcessorKind::Filter),
        processor_entity("p2", "stats", ProcessorKind::Aggregate),
    ]
    .into_iter()
    .collect();

    let record = engine
        .execute_workflow(
            &workflow,
            &steps,
            &connections,
            &entities,
            output_map(&[("message", json!("hi"))]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    assert!(record.end_time.is_some());
    let output = record.output.unwrap();
    assert!(output.contains_key("clean_filtered"));
    assert!(output.contains_key("stats_aggregation"));

    let step_records = store.step_executions_for(&record.id).await.unwrap();
    assert_eq!(step_records.len(), 2);
    for step_record in &step_records {
        assert_eq!(step_record.status, StepRunStatus::Completed);
        assert!(step_record.metadata.duration_ms.is_some());
        assert!(step_record.output.is_some());
    }
    assert_eq!(step_records[0].step_id, "p1");
    assert_eq!(step_records[1].step_id, "p2");

    // The second step's input snapshot carries the first step's namespaced output.
    let second_input = step_records[1].input.as_ref().unwrap();
    assert!(second_input.contains_key("step_p1"));
    assert_eq!(second_input["message"], json!("hi"));
}

#[tokio::test]
async fn status_events_trace_each_step_in_order() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = engine_with_processor(store);

    let workflow = Workflow::new("wf_1", "traced");
    let steps = vec![processor_step("p1"), processor_step("p2")];
    let connections = vec![conn("c1", "p1", "p2")];
    let entities: FxHashMap<String, NodeEntity> = [
        processor_entity("p1", "clean", ProcessorKind::Filter),
        processor_entity("p2", "stats", ProcessorKind::Aggregate),
    ]
    .into_iter()
    .collect();

    let (sender, receiver) = StatusSender::channel();
    engine
        .execute_workflow(
            &workflow,
            &steps,
            &connections,
            &entities,
            output_map(&[("message", json!("hi"))]),
            Some(&sender),
        )
        .await
        .unwrap();

    let events: Vec<(String, StepStatus)> = receiver
        .try_iter()
        .map(|e| (e.step_id, e.update.status))
        .collect();
    assert_eq!(
        events,
        vec![
            ("p1".to_string(), StepStatus::Running),
            ("p1".to_string(), StepStatus::Completed),
            ("p2".to_string(), StepStatus::Running),
            ("p2".to_string(), StepStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn failing_step_short_circuits_the_run() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = engine_with_processor(store.clone());

    let workflow = Workflow::new("wf_1", "doomed");
    let steps = vec![
        processor_step("p1"),
        processor_step("p2"),
        processor_step("p3"),
    ];
    let connections = vec![conn("c1", "p1", "p2"), conn("c2", "p2", "p3")];
    let entities: FxHashMap<String, NodeEntity> = [
        processor_entity("p1", "clean", ProcessorKind::Filter),
        processor_entity("p2", "odd", ProcessorKind::Other("explode".into())),
        processor_entity("p3", "stats", ProcessorKind::Aggregate),
    ]
    .into_iter()
    .collect();

    let (sender, receiver) = StatusSender::channel();
    let err = engine
        .execute_workflow(
            &workflow,
            &steps,
            &connections,
            &entities,
            output_map(&[("message", json!("hi"))]),
            Some(&sender),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported processor type"));

    let record = &store.executions_for("wf_1").await.unwrap()[0];
    assert_eq!(record.status, RunStatus::Failed);
    assert!(record
        .error
        .as_ref()
        .unwrap()
        .contains("unsupported processor type: explode"));
    assert!(record.output.is_none());

    // The third step never got a record.
    let step_records = store.step_executions_for(&record.id).await.unwrap();
    assert_eq!(step_records.len(), 2);
    assert_eq!(step_records[0].status, StepRunStatus::Completed);
    assert_eq!(step_records[1].status, StepRunStatus::Failed);
    assert!(step_records[1].error.is_some());

    let events: Vec<(String, StepStatus)> = receiver
        .try_iter()
        .map(|e| (e.step_id, e.update.status))
        .collect();
    assert_eq!(
        events,
        vec![
            ("p1".to_string(), StepStatus::Running),
            ("p1".to_string(), StepStatus::Completed),
            ("p2".to_string(), StepStatus::Running),
            ("p2".to_string(), StepStatus::Failed),
        ]
    );

    let logs = store.logs_for(&record.id).await.unwrap();
    assert!(logs
        .iter()
        .any(|log| log.step_id.as_deref() == Some("p2")
            && log.message.contains("unsupported processor type")));
}

#[tokio::test]
async fn cyclic_workflow_fails_before_any_step_runs() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = engine_with_processor(store.clone());

    let workflow = Workflow::new("wf_1", "looped");
    let steps = vec![processor_step("p1"), processor_step("p2")];
    let connections = vec![conn("c1", "p1", "p2"), conn("c2", "p2", "p1")];
    let entities: FxHashMap<String, NodeEntity> = [
        processor_entity("p1", "clean", ProcessorKind::Filter),
        processor_entity("p2", "stats", ProcessorKind::Aggregate),
    ]
    .into_iter()
    .collect();

    let err = engine
        .execute_workflow(&workflow, &steps, &connections, &entities, FxHashMap::default(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Graph(_)));
    assert_eq!(err.to_string(), "circular dependency detected in workflow");

    let record = &store.executions_for("wf_1").await.unwrap()[0];
    assert_eq!(record.status, RunStatus::Failed);
    assert!(store
        .step_executions_for(&record.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn missing_entity_fails_without_a_step_record() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let engine = engine_with_processor(store.clone());

    let workflow = Workflow::new("wf_1", "incomplete");
    let steps = vec![processor_step("p1")];

    let err = engine
        .execute_workflow(
            &workflow,
            &steps,
            &[],
            &FxHashMap::default(),
            FxHashMap::default(),
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::EntityNotFound { .. }));
    assert_eq!(err.to_string(), "entity not found for step p1: proc_p1");

    let record = &store.executions_for("wf_1").await.unwrap()[0];
    assert!(store
        .step_executions_for(&record.id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn unregistered_step_type_marks_the_step_failed() {
    let store = Arc::new(InMemoryExecutionStore::new());
    // Empty registry: the engine must still record the dispatched step.
    let engine = WorkflowEngine::new(store.clone());

    let workflow = Workflow::new("wf_1", "unhandled");
    let steps = vec![processor_step("p1")];
    let entities: FxHashMap<String, NodeEntity> =
        [processor_entity("p1", "clean", ProcessorKind::Filter)]
            .into_iter()
            .collect();

    let err = engine
        .execute_workflow(&workflow, &steps, &[], &entities, FxHashMap::default(), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "no executor found for step type: dataProcessor"
    );

    let record = &store.executions_for("wf_1").await.unwrap()[0];
    let step_records = store.step_executions_for(&record.id).await.unwrap();
    assert_eq!(step_records.len(), 1);
    assert_eq!(step_records[0].status, StepRunStatus::Failed);
}

#[tokio::test]
async fn custom_step_types_flow_through_the_registry() {
    let store = Arc::new(InMemoryExecutionStore::new());
    let mut engine = engine_with_processor(store.clone());
    engine.register_executor(
        StepType::Custom("emit".into()),
        StaticExecutor {
            output: output_map(&[("x", json!(5))]),
        },
    );

    let workflow = Workflow::new("wf_1", "extended");
    let steps = vec![
        WorkflowStep::new("c1", "wf_1", StepType::Custom("emit".into()), "proc_c1"),
        processor_step("p2"),
    ];
    let connections = vec![conn("e1", "c1", "p2")];
    let entities: FxHashMap<String, NodeEntity> = [
        processor_entity("c1", "placeholder", ProcessorKind::Filter),
        processor_entity("p2", "stats", ProcessorKind::Aggregate),
    ]
    .into_iter()
    .collect();

    let record = engine
        .execute_workflow(&workflow, &steps, &connections, &entities, FxHashMap::default(), None)
        .await
        .unwrap();

    // The aggregate step saw the custom step's output through the flat merge.
    let output = record.output.unwrap();
    assert_eq!(output["stats_aggregation"]["numberSum"], json!(5.0));
}
