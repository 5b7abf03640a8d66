//! Business domain model for taskloom workflows.
//!
//! This module defines the entities the engine operates on: workflows, their
//! steps and connections, and the executable entities (AI models and data
//! processors) that steps point at. Everything here is plain data; execution
//! behavior lives in [`crate::engine`] and [`crate::executors`].
//!
//! # Key Types
//!
//! - [`StepType`]: tag that selects which executor handles a step
//! - [`WorkflowStep`] / [`Connection`] / [`Workflow`]: the graph definition
//! - [`AiModel`] / [`DataProcessor`] / [`NodeEntity`]: the units of work
//!
//! # Examples
//!
//! ```rust
//! use taskloom::entities::{StepType, Workflow, WorkflowStep};
//!
//! let step = WorkflowStep::new("step_1", "wf_1", StepType::AiModel, "model_1");
//! assert_eq!(step.step_type.encode(), "aiModel");
//! assert_eq!(StepType::decode("dataProcessor"), StepType::DataProcessor);
//! ```

use chrono::{DateTime, Utc};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Free-form configuration attached to steps and processors.
pub type ConfigMap = FxHashMap<String, Value>;

/// Identifies which executor handles a workflow step.
///
/// The two built-in kinds cover the bundled executors; `Custom` keeps the
/// registry open for application-defined step types without touching this
/// crate. The encoded form is the wire tag used in persisted workflows.
///
/// # Examples
///
/// ```rust
/// use taskloom::entities::StepType;
///
/// assert_eq!(StepType::AiModel.encode(), "aiModel");
/// assert_eq!(StepType::decode("annotation"), StepType::Custom("annotation".into()));
/// let t: StepType = "dataProcessor".into();
/// assert_eq!(t, StepType::DataProcessor);
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StepType {
    /// Step backed by an [`AiModel`] entity.
    AiModel,
    /// Step backed by a [`DataProcessor`] entity.
    DataProcessor,
    /// Application-defined step type, identified by its raw tag.
    Custom(String),
}

impl StepType {
    /// Encode into the persisted tag form.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            StepType::AiModel => "aiModel".to_string(),
            StepType::DataProcessor => "dataProcessor".to_string(),
            StepType::Custom(s) => s.clone(),
        }
    }

    /// Decode a persisted tag back into a `StepType`.
    ///
    /// Unknown tags become `Custom`, so newer workflow files round-trip
    /// through older binaries.
    pub fn decode(s: &str) -> Self {
        match s {
            "aiModel" => StepType::AiModel,
            "dataProcessor" => StepType::DataProcessor,
            other => StepType::Custom(other.to_string()),
        }
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<&str> for StepType {
    fn from(s: &str) -> Self {
        StepType::decode(s)
    }
}

impl From<String> for StepType {
    fn from(s: String) -> Self {
        StepType::decode(&s)
    }
}

impl From<StepType> for String {
    fn from(t: StepType) -> Self {
        t.encode()
    }
}

/// Canvas position of a step. Carried through for editors, never interpreted
/// by the engine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node in a workflow graph, pointing at one executable entity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: String,
    pub workflow_id: String,
    pub step_type: StepType,
    pub entity_id: String,
    #[serde(default)]
    pub configuration: ConfigMap,
    #[serde(default)]
    pub position: Position,
    pub created_at: DateTime<Utc>,
}

impl WorkflowStep {
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        step_type: StepType,
        entity_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            step_type,
            entity_id: entity_id.into(),
            configuration: ConfigMap::default(),
            position: Position::default(),
            created_at: Utc::now(),
        }
    }

    /// Set one configuration value, e.g. the prompt template of a model step.
    #[must_use]
    pub fn with_config(mut self, key: impl Into<String>, value: Value) -> Self {
        self.configuration.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// A directed edge between two steps of the same workflow.
///
/// `data_mapping` (logical output field to input field) is carried for
/// forward compatibility; the merge semantics do not consult it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    pub workflow_id: String,
    pub source_step_id: String,
    pub target_step_id: String,
    #[serde(default)]
    pub data_mapping: FxHashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        id: impl Into<String>,
        workflow_id: impl Into<String>,
        source_step_id: impl Into<String>,
        target_step_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            workflow_id: workflow_id.into(),
            source_step_id: source_step_id.into(),
            target_step_id: target_step_id.into(),
            data_mapping: FxHashMap::default(),
            created_at: Utc::now(),
        }
    }
}

/// Lifecycle status of a workflow definition.
///
/// Informational to the engine: execution is permitted regardless of status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Published,
    Archived,
}

/// Named container owning steps and connections.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Activity status of an executable entity.
///
/// Only `Active` entities pass [`crate::runner::WorkflowRunner::validate`];
/// the engine itself does not re-check status at run time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityStatus {
    #[default]
    Active,
    Inactive,
    Error,
}

/// AI provider backing a model entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
    Google,
}

impl Provider {
    /// Lowercase wire tag, matching the serialized form.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OpenAi => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Google => "google",
        }
    }

    /// Human-facing label used in simulated responses.
    #[must_use]
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::OpenAi => "OpenAI",
            Provider::Anthropic => "Anthropic",
            Provider::Google => "Google",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Sampling parameters for a model entity.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    pub temperature: f64,
    pub max_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 1024,
            top_p: None,
            frequency_penalty: None,
        }
    }
}

/// An AI-model configuration a step can invoke.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AiModel {
    pub id: String,
    pub name: String,
    pub status: EntityStatus,
    pub provider: Provider,
    pub model_id: String,
    #[serde(default)]
    pub params: ModelParams,
}

impl AiModel {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        provider: Provider,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: EntityStatus::Active,
            provider,
            model_id: model_id.into(),
            params: ModelParams::default(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }
}

/// Deterministic operation a data-processor entity performs.
///
/// Unknown tags round-trip as `Other` and fail at execution time with
/// an unsupported-processor error.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ProcessorKind {
    Filter,
    Transform,
    Validate,
    Aggregate,
    Other(String),
}

impl ProcessorKind {
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            ProcessorKind::Filter => "filter".to_string(),
            ProcessorKind::Transform => "transform".to_string(),
            ProcessorKind::Validate => "validate".to_string(),
            ProcessorKind::Aggregate => "aggregate".to_string(),
            ProcessorKind::Other(s) => s.clone(),
        }
    }

    pub fn decode(s: &str) -> Self {
        match s {
            "filter" => ProcessorKind::Filter,
            "transform" => ProcessorKind::Transform,
            "validate" => ProcessorKind::Validate,
            "aggregate" => ProcessorKind::Aggregate,
            other => ProcessorKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for ProcessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

impl From<String> for ProcessorKind {
    fn from(s: String) -> Self {
        ProcessorKind::decode(&s)
    }
}

impl From<ProcessorKind> for String {
    fn from(k: ProcessorKind) -> Self {
        k.encode()
    }
}

/// A data-processing configuration a step can run.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataProcessor {
    pub id: String,
    pub name: String,
    pub status: EntityStatus,
    pub kind: ProcessorKind,
    #[serde(default)]
    pub input_schema: String,
    #[serde(default)]
    pub output_schema: String,
    #[serde(default)]
    pub configuration: ConfigMap,
}

impl DataProcessor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ProcessorKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: EntityStatus::Active,
            kind,
            input_schema: String::new(),
            output_schema: String::new(),
            configuration: ConfigMap::default(),
        }
    }

    #[must_use]
    pub fn with_status(mut self, status: EntityStatus) -> Self {
        self.status = status;
        self
    }
}

/// The executable entity a step resolves to at run time.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeEntity {
    AiModel(AiModel),
    DataProcessor(DataProcessor),
}

impl NodeEntity {
    #[must_use]
    pub fn id(&self) -> &str {
        match self {
            NodeEntity::AiModel(m) => &m.id,
            NodeEntity::DataProcessor(p) => &p.id,
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            NodeEntity::AiModel(m) => &m.name,
            NodeEntity::DataProcessor(p) => &p.name,
        }
    }

    #[must_use]
    pub fn status(&self) -> EntityStatus {
        match self {
            NodeEntity::AiModel(m) => m.status,
            NodeEntity::DataProcessor(p) => p.status,
        }
    }

    /// Short label used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeEntity::AiModel(_) => "aiModel",
            NodeEntity::DataProcessor(_) => "dataProcessor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_type_round_trip() {
        for tag in ["aiModel", "dataProcessor", "annotation"] {
            assert_eq!(StepType::decode(tag).encode(), tag);
        }
    }

    #[test]
    fn processor_kind_unknown_is_other() {
        assert_eq!(
            ProcessorKind::decode("enrich"),
            ProcessorKind::Other("enrich".into())
        );
    }

    #[test]
    fn provider_serializes_lowercase() {
        let json = serde_json::to_string(&Provider::OpenAi).unwrap();
        assert_eq!(json, "\"openai\"");
    }
}
