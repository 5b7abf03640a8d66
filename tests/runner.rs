//! Runner façade behavior: workflow resolution, validation, and end-to-end
//! runs through the repository.

mod common;

use serde_json::json;

use common::*;
use taskloom::entities::{EntityStatus, ProcessorKind, Provider, StepType};
use taskloom::runner::RunnerError;
use taskloom::store::{ExecutionStore, RunStatus, StepRunStatus};

#[tokio::test]
async fn end_to_end_chain_completes_with_merged_output() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_processor_step("wf_1", "step_1", "cleaner", ProcessorKind::Filter);
    h.add_model_step("wf_1", "step_2", Provider::OpenAi);
    h.add_model_step("wf_1", "step_3", Provider::Anthropic);
    h.connect("wf_1", "c1", "step_1", "step_2");
    h.connect("wf_1", "c2", "step_2", "step_3");

    let record = h
        .runner
        .execute(
            "wf_1",
            output_map(&[("message", json!("Hello World"))]),
            None,
        )
        .await
        .unwrap();

    assert_eq!(record.status, RunStatus::Completed);
    let output = record.output.unwrap();
    assert!(output.contains_key("cleaner_filtered"));
    assert!(output.contains_key("response"));
    // Later steps overwrite shared keys; the model key belongs to step_3.
    assert_eq!(output["model"], json!("step_3-v1"));
    assert_eq!(output["provider"], json!("anthropic"));

    let step_records = h.store.step_executions_for(&record.id).await.unwrap();
    let summary: Vec<(&str, StepRunStatus)> = step_records
        .iter()
        .map(|r| (r.step_id.as_str(), r.status))
        .collect();
    assert_eq!(
        summary,
        vec![
            ("step_1", StepRunStatus::Completed),
            ("step_2", StepRunStatus::Completed),
            ("step_3", StepRunStatus::Completed),
        ]
    );
}

#[tokio::test]
async fn execute_current_follows_the_selection() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_processor_step("wf_1", "step_1", "cleaner", ProcessorKind::Filter);
    h.state.set_current_workflow(Some("wf_1".into()));

    let record = h
        .runner
        .execute_current(output_map(&[("message", json!("hi"))]), None)
        .await
        .unwrap();
    assert_eq!(record.workflow_id, "wf_1");
    assert_eq!(record.status, RunStatus::Completed);
}

#[tokio::test]
async fn execute_current_without_selection_errors() {
    let h = harness();
    let err = h
        .runner
        .execute_current(output_map(&[]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::NoCurrentWorkflow));
    assert_eq!(err.to_string(), "no current workflow selected");
}

#[tokio::test]
async fn unknown_workflow_errors() {
    let h = harness();
    let err = h
        .runner
        .execute("ghost", output_map(&[]), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::WorkflowNotFound { .. }));
    assert_eq!(err.to_string(), "workflow not found: ghost");
}

#[tokio::test]
async fn validate_reports_unknown_workflow() {
    let h = harness();
    let report = h.runner.validate("ghost");
    assert!(!report.valid);
    assert_eq!(report.errors, vec!["Workflow not found: ghost".to_string()]);
}

#[tokio::test]
async fn validate_passes_a_well_formed_workflow() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_processor_step("wf_1", "step_1", "cleaner", ProcessorKind::Filter);
    h.add_model_step("wf_1", "step_2", Provider::Google);
    h.connect("wf_1", "c1", "step_1", "step_2");

    let report = h.runner.validate("wf_1");
    assert!(report.valid);
    assert!(report.errors.is_empty());
}

#[tokio::test]
async fn validate_accumulates_every_violation() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_orphan_step("wf_1", "step_1", StepType::AiModel, "ghost_model");
    h.add_processor_step_with_status(
        "wf_1",
        "step_2",
        "sleeper",
        ProcessorKind::Filter,
        EntityStatus::Inactive,
    );
    h.connect("wf_1", "c1", "step_1", "step_2");
    h.connect("wf_1", "c2", "step_2", "step_1");

    let report = h.runner.validate("wf_1");
    assert!(!report.valid);
    assert_eq!(report.errors.len(), 3);
    assert_eq!(
        report.errors[0],
        "AI Model not found for step step_1: ghost_model"
    );
    assert_eq!(
        report.errors[1],
        "Data Processor is not active for step step_2: sleeper"
    );
    assert_eq!(report.errors[2], "circular dependency detected in workflow");
}

#[tokio::test]
async fn inactive_entity_fails_validation_but_still_executes() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_processor_step_with_status(
        "wf_1",
        "step_1",
        "sleeper",
        ProcessorKind::Filter,
        EntityStatus::Inactive,
    );

    let report = h.runner.validate("wf_1");
    assert!(!report.valid);
    assert!(report.errors[0].contains("is not active"));

    // Execution deliberately does not re-check activity status.
    let record = h
        .runner
        .execute("wf_1", output_map(&[("message", json!("hi"))]), None)
        .await
        .unwrap();
    assert_eq!(record.status, RunStatus::Completed);
}

#[tokio::test]
async fn failed_run_record_is_fetchable_after_the_error() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_processor_step("wf_1", "step_1", "odd", ProcessorKind::Other("explode".into()));

    let err = h
        .runner
        .execute("wf_1", output_map(&[]), None)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unsupported processor type"));

    let records = h.store.executions_for("wf_1").await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].status, RunStatus::Failed);
    assert!(records[0]
        .error
        .as_ref()
        .unwrap()
        .contains("unsupported processor type: explode"));
}

#[tokio::test]
async fn step_with_missing_entity_fails_the_run() {
    let h = harness();
    h.add_workflow("wf_1");
    h.add_orphan_step("wf_1", "step_1", StepType::DataProcessor, "ghost_proc");

    let err = h
        .runner
        .execute("wf_1", output_map(&[]), None)
        .await
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "entity not found for step step_1: ghost_proc"
    );
}
