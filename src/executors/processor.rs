//! Data-processing executor.
//!
//! Flat-merges the run input with every prior step output, then applies one
//! of four deterministic operations selected by the processor entity's kind.
//! Output field names (including the camelCase bookkeeping keys) are part of
//! the output contract; downstream consumers match on them.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use super::{ExecutorError, StepExecutor};
use crate::context::{ExecutionContext, OutputMap};
use crate::entities::{DataProcessor, NodeEntity, ProcessorKind, StepType, WorkflowStep};

/// Executor for [`StepType::DataProcessor`] steps.
#[derive(Clone, Copy, Debug, Default)]
pub struct DataProcessorExecutor;

#[async_trait]
impl StepExecutor for DataProcessorExecutor {
    fn can_execute(&self, step: &WorkflowStep) -> bool {
        step.step_type == StepType::DataProcessor
    }

    async fn execute(
        &self,
        step: &WorkflowStep,
        entity: &NodeEntity,
        ctx: &ExecutionContext,
    ) -> Result<OutputMap, ExecutorError> {
        if !self.can_execute(step) {
            return Err(ExecutorError::WrongStepType {
                step_id: step.id.clone(),
                step_type: step.step_type.encode(),
            });
        }
        let NodeEntity::DataProcessor(processor) = entity else {
            return Err(ExecutorError::WrongEntity {
                step_id: step.id.clone(),
                expected: "dataProcessor",
                actual: entity.kind_name(),
            });
        };

        debug!(step_id = %step.id, name = %processor.name, kind = %processor.kind,
            "running data processor");
        let data = ctx.flat_input();

        match &processor.kind {
            ProcessorKind::Filter => Ok(filter_data(&data, processor)),
            ProcessorKind::Transform => Ok(transform_data(&data, processor)),
            ProcessorKind::Validate => Ok(validate_data(&data, processor)),
            ProcessorKind::Aggregate => Ok(aggregate_data(&data, processor)),
            ProcessorKind::Other(kind) => Err(ExecutorError::UnsupportedProcessorType {
                kind: kind.clone(),
            }),
        }
    }
}

/// A value counts as present unless it is null or an empty string.
fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null) && value.as_str() != Some("")
}

/// Entries sorted by key, for deterministic output shapes and error lists.
fn sorted_entries(data: &OutputMap) -> Vec<(&String, &Value)> {
    let mut entries: Vec<_> = data.iter().collect();
    entries.sort_by_key(|(key, _)| key.as_str());
    entries
}

fn filter_data(data: &OutputMap, processor: &DataProcessor) -> OutputMap {
    let filtered: serde_json::Map<String, Value> = sorted_entries(data)
        .into_iter()
        .filter(|(_, value)| is_present(value))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    let mut output = OutputMap::default();
    output.insert("originalKeys".to_string(), json!(data.len()));
    output.insert("filteredKeys".to_string(), json!(filtered.len()));
    output.insert(
        format!("{}_filtered", processor.name),
        Value::Object(filtered),
    );
    output.insert("processorType".to_string(), json!("filter"));
    output.insert("processedAt".to_string(), json!(Utc::now().to_rfc3339()));
    output
}

fn transform_data(data: &OutputMap, processor: &DataProcessor) -> OutputMap {
    let transformed: serde_json::Map<String, Value> = sorted_entries(data)
        .into_iter()
        .map(|(key, value)| {
            let value = match value.as_str() {
                Some(s) => json!(s.to_uppercase()),
                None => value.clone(),
            };
            (format!("{key}_transformed"), value)
        })
        .collect();

    let mut output = OutputMap::default();
    output.insert("transformedKeys".to_string(), json!(transformed.len()));
    output.insert(
        format!("{}_transformed", processor.name),
        Value::Object(transformed),
    );
    output.insert("processorType".to_string(), json!("transform"));
    output.insert("processedAt".to_string(), json!(Utc::now().to_rfc3339()));
    output
}

fn validate_data(data: &OutputMap, processor: &DataProcessor) -> OutputMap {
    let mut results = serde_json::Map::new();
    let mut errors: Vec<String> = Vec::new();

    for (key, value) in sorted_entries(data) {
        let valid = is_present(value);
        results.insert(key.clone(), json!(valid));
        if !valid {
            errors.push(format!("Field '{key}' is invalid"));
        }
    }

    let is_valid = errors.is_empty();
    let mut output = OutputMap::default();
    output.insert(
        format!("{}_validation", processor.name),
        json!({
            "isValid": is_valid,
            "results": Value::Object(results),
            "errors": errors,
            "validatedAt": Utc::now().to_rfc3339(),
        }),
    );
    output.insert("processorType".to_string(), json!("validate"));
    output.insert("processedAt".to_string(), json!(Utc::now().to_rfc3339()));
    output
}

fn aggregate_data(data: &OutputMap, processor: &DataProcessor) -> OutputMap {
    let mut numbers: Vec<f64> = Vec::new();
    let mut string_length_total = 0usize;
    let mut string_fields = 0usize;

    for value in data.values() {
        if let Some(n) = value.as_f64() {
            numbers.push(n);
        } else if let Some(s) = value.as_str() {
            string_fields += 1;
            // String lengths are counted in UTF-16 code units.
            string_length_total += s.encode_utf16().count();
        }
    }

    let number_sum: f64 = numbers.iter().sum();
    let number_average = if numbers.is_empty() {
        0.0
    } else {
        number_sum / numbers.len() as f64
    };

    let mut output = OutputMap::default();
    output.insert(
        format!("{}_aggregation", processor.name),
        json!({
            "totalFields": data.len(),
            "numberFields": numbers.len(),
            "stringFields": string_fields,
            "numberSum": number_sum,
            "numberAverage": number_average,
            "stringLengthTotal": string_length_total,
        }),
    );
    output.insert("processorType".to_string(), json!("aggregate"));
    output.insert("processedAt".to_string(), json!(Utc::now().to_rfc3339()));
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_and_null_are_absent() {
        assert!(!is_present(&Value::Null));
        assert!(!is_present(&json!("")));
        assert!(is_present(&json!(0)));
        assert!(is_present(&json!(false)));
        assert!(is_present(&json!(" ")));
    }
}
