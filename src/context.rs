//! Per-run execution context.
//!
//! An [`ExecutionContext`] travels through every step of a run: it holds the
//! run's input snapshot, the outputs produced so far (in completion order),
//! and a free-form variable bag. Executors read from it; only the engine
//! writes to it.

use rustc_hash::FxHashMap;
use serde_json::Value;

/// Flat key/value map produced and consumed by executors.
pub type OutputMap = FxHashMap<String, Value>;

/// Mutable per-run state threaded through each step invocation.
///
/// Step outputs are stored as an ordered list of `(step_id, output)` pairs so
/// merge semantics stay deterministic: later steps overwrite earlier ones
/// wherever a merge flattens keys.
#[derive(Clone, Debug)]
pub struct ExecutionContext {
    /// Id of the execution record this run writes to.
    pub execution_id: String,
    /// Id of the workflow being executed.
    pub workflow_id: String,
    /// Input snapshot captured at run start; never mutated afterwards.
    pub input: OutputMap,
    /// Outputs of completed steps, in completion order.
    step_outputs: Vec<(String, OutputMap)>,
    /// Scratch variables, reserved for executor-to-executor signaling.
    pub variables: FxHashMap<String, Value>,
}

impl ExecutionContext {
    pub fn new(
        execution_id: impl Into<String>,
        workflow_id: impl Into<String>,
        input: OutputMap,
    ) -> Self {
        Self {
            execution_id: execution_id.into(),
            workflow_id: workflow_id.into(),
            input,
            step_outputs: Vec::new(),
            variables: FxHashMap::default(),
        }
    }

    /// Record the output of a completed step.
    pub fn record_output(&mut self, step_id: impl Into<String>, output: OutputMap) {
        self.step_outputs.push((step_id.into(), output));
    }

    /// Outputs of completed steps, in completion order.
    pub fn outputs(&self) -> impl Iterator<Item = (&str, &OutputMap)> {
        self.step_outputs.iter().map(|(id, out)| (id.as_str(), out))
    }

    /// Output of one prior step, if it has completed.
    #[must_use]
    pub fn output_of(&self, step_id: &str) -> Option<&OutputMap> {
        self.step_outputs
            .iter()
            .find(|(id, _)| id == step_id)
            .map(|(_, out)| out)
    }

    /// The input snapshot handed to the next step: the run input plus each
    /// prior output under a `step_<id>` key. Namespacing keeps prior outputs
    /// from colliding with run input keys.
    #[must_use]
    pub fn step_input(&self) -> OutputMap {
        let mut input = self.input.clone();
        for (step_id, output) in &self.step_outputs {
            input.insert(format!("step_{step_id}"), map_to_value(output));
        }
        input
    }

    /// Flat merge of the run input with every prior output, later outputs
    /// overwriting earlier keys. This is the data-processor view of the run.
    #[must_use]
    pub fn flat_input(&self) -> OutputMap {
        let mut merged = self.input.clone();
        for (_, output) in &self.step_outputs {
            for (key, value) in output {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }
}

/// Convert an output map into a JSON object value.
pub(crate) fn map_to_value(map: &OutputMap) -> Value {
    Value::Object(
        map.iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
    )
}
