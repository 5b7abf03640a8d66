use async_trait::async_trait;

use taskloom::entities::Provider;
use taskloom::executors::{InvokerError, ModelInvoker, ModelReply};

/// Deterministic invoker echoing its arguments back, for asserting on the
/// exact prompt a model step dispatched.
pub struct EchoInvoker;

#[async_trait]
impl ModelInvoker for EchoInvoker {
    async fn invoke(
        &self,
        provider: Provider,
        model_id: &str,
        prompt: &str,
    ) -> Result<ModelReply, InvokerError> {
        Ok(ModelReply {
            response: format!("{provider}:{model_id}:{prompt}"),
            token_usage: 42,
        })
    }
}

/// Invoker that refuses every provider.
pub struct RefusingInvoker;

#[async_trait]
impl ModelInvoker for RefusingInvoker {
    async fn invoke(
        &self,
        provider: Provider,
        _model_id: &str,
        _prompt: &str,
    ) -> Result<ModelReply, InvokerError> {
        Err(InvokerError::UnsupportedProvider { provider })
    }
}
