//! Execution records and the store collaborator contract.
//!
//! The engine does its bookkeeping through an [`ExecutionStore`]: one
//! [`ExecutionRecord`] per run, one [`StepExecutionRecord`] per step within
//! a run, and free-form [`ExecutionLog`] entries. The trait is the external
//! seam; [`InMemoryExecutionStore`] is the reference implementation, and a
//! persistent backend can slot in behind the same contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use miette::Diagnostic;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

use crate::context::OutputMap;

/// Lifecycle status of a whole run.
///
/// `Cancelled` is reserved: it serializes and round-trips, but nothing in
/// this crate drives a run into it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Lifecycle status of one step within a run.
///
/// `Skipped` is reserved for callers that prune steps before dispatch; the
/// engine itself never skips.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepRunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

/// Severity of an execution log entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Bookkeeping carried on every step record.
///
/// `retry_count` is recorded for compatibility and is always 0: no retry
/// loop exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepMetadata {
    pub retry_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_usage: Option<u64>,
}

/// One run of a workflow.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: String,
    pub workflow_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    pub input: OutputMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One step's participation in a run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StepExecutionRecord {
    pub id: String,
    pub execution_id: String,
    pub step_id: String,
    pub status: StepRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<OutputMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputMap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: StepMetadata,
    pub created_at: DateTime<Utc>,
}

/// One log line attached to a run (and optionally a step).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLog {
    pub id: String,
    pub execution_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Fields for creating an execution record; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewExecution {
    pub workflow_id: String,
    pub status: RunStatus,
    pub start_time: DateTime<Utc>,
    pub input: OutputMap,
}

/// Fields for creating a step execution record; the store assigns the id.
#[derive(Clone, Debug)]
pub struct NewStepExecution {
    pub execution_id: String,
    pub step_id: String,
    pub status: StepRunStatus,
    pub start_time: DateTime<Utc>,
    pub metadata: StepMetadata,
}

/// Fields for creating a log entry; the store assigns id and timestamp.
#[derive(Clone, Debug)]
pub struct NewLog {
    pub execution_id: String,
    pub step_id: Option<String>,
    pub level: LogLevel,
    pub message: String,
    pub metadata: Option<Value>,
}

/// Partial update applied to an execution record. `None` fields are left
/// untouched.
#[derive(Clone, Debug, Default)]
pub struct ExecutionUpdate {
    pub status: Option<RunStatus>,
    pub end_time: Option<DateTime<Utc>>,
    pub output: Option<OutputMap>,
    pub error: Option<String>,
}

impl ExecutionUpdate {
    #[must_use]
    pub fn running() -> Self {
        Self {
            status: Some(RunStatus::Running),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn completed(end_time: DateTime<Utc>, output: OutputMap) -> Self {
        Self {
            status: Some(RunStatus::Completed),
            end_time: Some(end_time),
            output: Some(output),
            error: None,
        }
    }

    #[must_use]
    pub fn failed(end_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: Some(RunStatus::Failed),
            end_time: Some(end_time),
            output: None,
            error: Some(error.into()),
        }
    }
}

/// Partial update applied to a step execution record.
#[derive(Clone, Debug, Default)]
pub struct StepExecutionUpdate {
    pub status: Option<StepRunStatus>,
    pub end_time: Option<DateTime<Utc>>,
    pub input: Option<OutputMap>,
    pub output: Option<OutputMap>,
    pub error: Option<String>,
    pub duration_ms: Option<i64>,
    pub token_usage: Option<u64>,
}

impl StepExecutionUpdate {
    #[must_use]
    pub fn completed(end_time: DateTime<Utc>, input: OutputMap, output: OutputMap) -> Self {
        Self {
            status: Some(StepRunStatus::Completed),
            end_time: Some(end_time),
            input: Some(input),
            output: Some(output),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(end_time: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            status: Some(StepRunStatus::Failed),
            end_time: Some(end_time),
            error: Some(error.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    #[must_use]
    pub fn with_token_usage(mut self, token_usage: Option<u64>) -> Self {
        self.token_usage = token_usage;
        self
    }
}

/// Errors from the execution store.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    #[error("execution not found: {id}")]
    #[diagnostic(code(taskloom::store::execution_not_found))]
    ExecutionNotFound { id: String },

    #[error("step execution not found: {id}")]
    #[diagnostic(code(taskloom::store::step_execution_not_found))]
    StepExecutionNotFound { id: String },

    /// A persistent backend failed below the contract.
    #[error("store backend error: {message}")]
    #[diagnostic(code(taskloom::store::backend))]
    Backend { message: String },
}

/// Storage collaborator for execution bookkeeping.
///
/// All operations are async so persistent implementations can do I/O;
/// updates and reads of unknown ids reject with a not-found error.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn create_execution(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError>;
    async fn update_execution(&self, id: &str, update: ExecutionUpdate)
        -> Result<(), StoreError>;
    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError>;
    /// Execution records of one workflow, in creation order.
    async fn executions_for(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError>;

    async fn create_step_execution(
        &self,
        new: NewStepExecution,
    ) -> Result<StepExecutionRecord, StoreError>;
    async fn update_step_execution(
        &self,
        id: &str,
        update: StepExecutionUpdate,
    ) -> Result<(), StoreError>;
    /// Step records of one run, in creation order.
    async fn step_executions_for(
        &self,
        execution_id: &str,
    ) -> Result<Vec<StepExecutionRecord>, StoreError>;

    async fn create_log(&self, new: NewLog) -> Result<ExecutionLog, StoreError>;
    /// Log entries of one run, in creation order.
    async fn logs_for(&self, execution_id: &str) -> Result<Vec<ExecutionLog>, StoreError>;
}

/// In-memory [`ExecutionStore`] backed by RwLock-guarded maps.
#[derive(Default)]
pub struct InMemoryExecutionStore {
    executions: RwLock<FxHashMap<String, ExecutionRecord>>,
    step_executions: RwLock<FxHashMap<String, StepExecutionRecord>>,
    // Creation order per workflow/execution; map iteration order is not stable.
    exec_order: RwLock<FxHashMap<String, Vec<String>>>,
    step_order: RwLock<FxHashMap<String, Vec<String>>>,
    logs: RwLock<FxHashMap<String, Vec<ExecutionLog>>>,
}

impl InMemoryExecutionStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for InMemoryExecutionStore {
    async fn create_execution(&self, new: NewExecution) -> Result<ExecutionRecord, StoreError> {
        let record = ExecutionRecord {
            id: format!("exec_{}", Uuid::new_v4().simple()),
            workflow_id: new.workflow_id,
            status: new.status,
            start_time: new.start_time,
            end_time: None,
            input: new.input,
            output: None,
            error: None,
            created_at: Utc::now(),
        };
        self.exec_order
            .write()
            .entry(record.workflow_id.clone())
            .or_default()
            .push(record.id.clone());
        self.executions
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_execution(
        &self,
        id: &str,
        update: ExecutionUpdate,
    ) -> Result<(), StoreError> {
        let mut executions = self.executions.write();
        let record = executions
            .get_mut(id)
            .ok_or_else(|| StoreError::ExecutionNotFound { id: id.to_string() })?;
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(end_time) = update.end_time {
            record.end_time = Some(end_time);
        }
        if let Some(output) = update.output {
            record.output = Some(output);
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        Ok(())
    }

    async fn get_execution(&self, id: &str) -> Result<ExecutionRecord, StoreError> {
        self.executions
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::ExecutionNotFound { id: id.to_string() })
    }

    async fn executions_for(&self, workflow_id: &str) -> Result<Vec<ExecutionRecord>, StoreError> {
        let order = self.exec_order.read();
        let executions = self.executions.read();
        let ids = order.get(workflow_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| executions.get(id).cloned())
            .collect())
    }

    async fn create_step_execution(
        &self,
        new: NewStepExecution,
    ) -> Result<StepExecutionRecord, StoreError> {
        let record = StepExecutionRecord {
            id: format!("sexec_{}", Uuid::new_v4().simple()),
            execution_id: new.execution_id,
            step_id: new.step_id,
            status: new.status,
            start_time: Some(new.start_time),
            end_time: None,
            input: None,
            output: None,
            error: None,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        self.step_order
            .write()
            .entry(record.execution_id.clone())
            .or_default()
            .push(record.id.clone());
        self.step_executions
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn update_step_execution(
        &self,
        id: &str,
        update: StepExecutionUpdate,
    ) -> Result<(), StoreError> {
        let mut step_executions = self.step_executions.write();
        let record = step_executions
            .get_mut(id)
            .ok_or_else(|| StoreError::StepExecutionNotFound { id: id.to_string() })?;
        if let Some(status) = update.status {
            record.status = status;
        }
        if let Some(end_time) = update.end_time {
            record.end_time = Some(end_time);
        }
        if let Some(input) = update.input {
            record.input = Some(input);
        }
        if let Some(output) = update.output {
            record.output = Some(output);
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }
        if let Some(duration_ms) = update.duration_ms {
            record.metadata.duration_ms = Some(duration_ms);
        }
        if let Some(token_usage) = update.token_usage {
            record.metadata.token_usage = Some(token_usage);
        }
        Ok(())
    }

    async fn step_executions_for(
        &self,
        execution_id: &str,
    ) -> Result<Vec<StepExecutionRecord>, StoreError> {
        let order = self.step_order.read();
        let step_executions = self.step_executions.read();
        let ids = order.get(execution_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| step_executions.get(id).cloned())
            .collect())
    }

    async fn create_log(&self, new: NewLog) -> Result<ExecutionLog, StoreError> {
        let log = ExecutionLog {
            id: format!("log_{}", Uuid::new_v4().simple()),
            execution_id: new.execution_id,
            step_id: new.step_id,
            level: new.level,
            message: new.message,
            timestamp: Utc::now(),
            metadata: new.metadata,
        };
        self.logs
            .write()
            .entry(log.execution_id.clone())
            .or_default()
            .push(log.clone());
        Ok(log)
    }

    async fn logs_for(&self, execution_id: &str) -> Result<Vec<ExecutionLog>, StoreError> {
        Ok(self
            .logs
            .read()
            .get(execution_id)
            .cloned()
            .unwrap_or_default())
    }
}
