//! Business-state collaborator contract.
//!
//! The engine and runner never reach into global state: everything they need
//! about workflows, steps, connections, and executable entities comes
//! through a [`BusinessRepository`] handed in at construction. The built-in
//! [`InMemoryBusinessState`] covers tests, demos, and embedders that keep
//! their catalog in memory; an application backed by real storage implements
//! the same trait.
//!
//! The repository is read-only from the engine's perspective during a run.

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::entities::{AiModel, Connection, DataProcessor, Workflow, WorkflowStep};

/// Read access to the business catalog.
pub trait BusinessRepository: Send + Sync {
    fn workflow(&self, id: &str) -> Option<Workflow>;

    /// Steps belonging to one workflow, in a deterministic order.
    fn steps_for(&self, workflow_id: &str) -> Vec<WorkflowStep>;

    /// Connections belonging to one workflow, in a deterministic order.
    fn connections_for(&self, workflow_id: &str) -> Vec<Connection>;

    fn ai_model(&self, id: &str) -> Option<AiModel>;

    fn data_processor(&self, id: &str) -> Option<DataProcessor>;

    /// The workflow currently selected in the host application, if any.
    fn current_workflow_id(&self) -> Option<String>;
}

/// In-memory [`BusinessRepository`] backed by RwLock-guarded maps.
///
/// # Examples
///
/// ```rust
/// use taskloom::entities::{StepType, Workflow, WorkflowStep};
/// use taskloom::repository::{BusinessRepository, InMemoryBusinessState};
///
/// let state = InMemoryBusinessState::new();
/// state.insert_workflow(Workflow::new("wf_1", "demo"));
/// state.insert_step(WorkflowStep::new("s1", "wf_1", StepType::AiModel, "m1"));
/// state.set_current_workflow(Some("wf_1".into()));
///
/// assert_eq!(state.steps_for("wf_1").len(), 1);
/// assert_eq!(state.current_workflow_id().as_deref(), Some("wf_1"));
/// ```
#[derive(Default)]
pub struct InMemoryBusinessState {
    workflows: RwLock<FxHashMap<String, Workflow>>,
    steps: RwLock<FxHashMap<String, WorkflowStep>>,
    connections: RwLock<FxHashMap<String, Connection>>,
    ai_models: RwLock<FxHashMap<String, AiModel>>,
    data_processors: RwLock<FxHashMap<String, DataProcessor>>,
    current_workflow: RwLock<Option<String>>,
}

impl InMemoryBusinessState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_workflow(&self, workflow: Workflow) {
        self.workflows.write().insert(workflow.id.clone(), workflow);
    }

    pub fn insert_step(&self, step: WorkflowStep) {
        self.steps.write().insert(step.id.clone(), step);
    }

    pub fn insert_connection(&self, connection: Connection) {
        self.connections
            .write()
            .insert(connection.id.clone(), connection);
    }

    pub fn insert_ai_model(&self, model: AiModel) {
        self.ai_models.write().insert(model.id.clone(), model);
    }

    pub fn insert_data_processor(&self, processor: DataProcessor) {
        self.data_processors
            .write()
            .insert(processor.id.clone(), processor);
    }

    pub fn set_current_workflow(&self, workflow_id: Option<String>) {
        *self.current_workflow.write() = workflow_id;
    }
}

impl BusinessRepository for InMemoryBusinessState {
    fn workflow(&self, id: &str) -> Option<Workflow> {
        self.workflows.read().get(id).cloned()
    }

    fn steps_for(&self, workflow_id: &str) -> Vec<WorkflowStep> {
        let mut steps: Vec<WorkflowStep> = self
            .steps
            .read()
            .values()
            .filter(|s| s.workflow_id == workflow_id)
            .cloned()
            .collect();
        steps.sort_by(|a, b| a.id.cmp(&b.id));
        steps
    }

    fn connections_for(&self, workflow_id: &str) -> Vec<Connection> {
        let mut connections: Vec<Connection> = self
            .connections
            .read()
            .values()
            .filter(|c| c.workflow_id == workflow_id)
            .cloned()
            .collect();
        connections.sort_by(|a, b| a.id.cmp(&b.id));
        connections
    }

    fn ai_model(&self, id: &str) -> Option<AiModel> {
        self.ai_models.read().get(id).cloned()
    }

    fn data_processor(&self, id: &str) -> Option<DataProcessor> {
        self.data_processors.read().get(id).cloned()
    }

    fn current_workflow_id(&self) -> Option<String> {
        self.current_workflow.read().clone()
    }
}
