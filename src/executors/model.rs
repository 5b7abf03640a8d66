//! Model-invocation executor.
//!
//! Renders a prompt template from the step configuration, substitutes the
//! run input and prior step outputs into it, and dispatches the result to a
//! [`ModelInvoker`] capability. The invoker is the seam where real provider
//! clients plug in; [`SimulatedInvoker`] ships for demos and tests.

use async_trait::async_trait;
use miette::Diagnostic;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use super::{ExecutorError, StepExecutor};
use crate::context::{map_to_value, ExecutionContext, OutputMap};
use crate::entities::{NodeEntity, Provider, StepType, WorkflowStep};

/// Prompt used when a model step carries no `prompt` configuration.
pub const DEFAULT_PROMPT_TEMPLATE: &str = "Process the following input: {{input}}";

/// Result of one model invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelReply {
    pub response: String,
    pub token_usage: u64,
}

/// Errors from the model-invocation capability.
#[derive(Debug, Error, Diagnostic)]
pub enum InvokerError {
    /// The invoker does not serve this provider.
    #[error("unsupported AI provider: {provider}")]
    #[diagnostic(
        code(taskloom::invoker::unsupported_provider),
        help("Wire up an invoker that serves this provider, or change the model entity.")
    )]
    UnsupportedProvider { provider: Provider },

    /// The provider call itself failed; the engine treats any rejection as
    /// the step's failure.
    #[error("provider call failed ({provider}): {message}")]
    #[diagnostic(code(taskloom::invoker::provider))]
    Provider { provider: Provider, message: String },
}

/// Opaque capability that dispatches a prompt to an AI provider.
///
/// Latency and failure modes are the implementation's business; any error
/// becomes the calling step's failure.
#[async_trait]
pub trait ModelInvoker: Send + Sync {
    async fn invoke(
        &self,
        provider: Provider,
        model_id: &str,
        prompt: &str,
    ) -> Result<ModelReply, InvokerError>;
}

/// Executor for [`StepType::AiModel`] steps.
pub struct ModelExecutor {
    invoker: Arc<dyn ModelInvoker>,
}

impl ModelExecutor {
    pub fn new(invoker: Arc<dyn ModelInvoker>) -> Self {
        Self { invoker }
    }

    /// Render the step's prompt template against the run context.
    ///
    /// `{{input}}` is replaced with the JSON-encoded run input and each
    /// `{{step_<id>}}` token with that step's JSON-encoded output.
    fn render_prompt(
        step: &WorkflowStep,
        ctx: &ExecutionContext,
    ) -> Result<String, serde_json::Error> {
        let template = step
            .configuration
            .get("prompt")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_PROMPT_TEMPLATE);

        let input_json = serde_json::to_string(&map_to_value(&ctx.input))?;
        let mut prompt = template.replace("{{input}}", &input_json);

        for (step_id, output) in ctx.outputs() {
            let token = format!("{{{{step_{step_id}}}}}");
            if prompt.contains(&token) {
                let output_json = serde_json::to_string(&map_to_value(output))?;
                prompt = prompt.replace(&token, &output_json);
            }
        }
        Ok(prompt)
    }
}

#[async_trait]
impl StepExecutor for ModelExecutor {
    fn can_execute(&self, step: &WorkflowStep) -> bool {
        step.step_type == StepType::AiModel
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
        let NodeEntity::AiModel(model) = entity else {
            return Err(ExecutorError::WrongEntity {
                step_id: step.id.clone(),
                expected: "aiModel",
                actual: entity.kind_name(),
            });
        };

        let prompt = Self::render_prompt(step, ctx)?;
        debug!(step_id = %step.id, provider = %model.provider, model = %model.model_id,
            "dispatching model invocation");

        let reply = self
            .invoker
            .invoke(model.provider, &model.model_id, &prompt)
            .await?;

        let mut output = OutputMap::default();
        output.insert("response".to_string(), reply.response.into());
        output.insert("tokenUsage".to_string(), reply.token_usage.into());
        output.insert("model".to_string(), model.model_id.clone().into());
        output.insert("provider".to_string(), model.provider.as_str().into());
        Ok(output)
    }
}

/// Canned invoker for demos and tests; no provider is ever contacted.
///
/// Produces a `"<Provider> <model> response to: <prompt prefix>..."` reply
/// with a provider-specific random token count. Latency defaults to zero;
/// use [`with_latency`](Self::with_latency) to mimic real provider delay.
#[derive(Clone, Debug, Default)]
pub struct SimulatedInvoker {
    latency: Duration,
}

impl SimulatedInvoker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

#[async_trait]
impl ModelInvoker for SimulatedInvoker {
    async fn invoke(
        &self,
        provider: Provider,
        model_id: &str,
        prompt: &str,
    ) -> Result<ModelReply, InvokerError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let token_usage = match provider {
            Provider::OpenAi => rand::rng().random_range(100..1100),
            Provider::Anthropic => rand::rng().random_range(80..880),
            Provider::Google => rand::rng().random_range(60..660),
        };
        let prefix: String = prompt.chars().take(50).collect();
        Ok(ModelReply {
            response: format!(
                "{} {model_id} response to: {prefix}...",
                provider.display_name()
            ),
            token_usage,
        })
    }
}
