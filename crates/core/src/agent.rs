mod builder;

use std::time::Duration;

use async_trait::async_trait;
use backoff::ExponentialBackoffBuilder;
use shopkeeper_model::{
    ModelFinishReason, ModelMessage, ModelProviderError, ModelRequest,
    ModelResponse,
};
use tracing::Instrument;

use crate::conversation::{ContextEntry, Role};
use crate::error::AgentError;
use crate::model_client::ModelClient;
use crate::tool::Executor as ToolExecutor;
pub use builder::ModelAgentBuilder;

/// Something that can answer a user message given the conversation so far.
///
/// This is the seam between the orchestrator and whatever generates replies.
/// Implementations own their timeout and retry policies.
#[async_trait]
pub trait AgentRunner: Send + Sync {
    /// Produces the reply to `message`.
    ///
    /// `context` is the trailing part of the conversation, oldest first. It
    /// usually already ends with `message` itself.
    async fn run(
        &self,
        message: &str,
        context: &[ContextEntry],
    ) -> Result<String, AgentError>;
}

/// How transient model failures are retried.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// The delay before the first retry, grown exponentially afterwards.
    pub initial_interval: Duration,
    /// Stop retrying once this much time has passed since the first attempt.
    pub max_elapsed_time: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_millis(500),
            max_elapsed_time: Duration::from_secs(60),
        }
    }
}

/// An [`AgentRunner`] backed by a model provider and a set of tools.
///
/// Each run sends the system prompt and the context to the model. While the
/// model asks for tools, the calls are executed in order and their results
/// are fed back; the first reply without tool calls is the answer.
pub struct ModelAgent {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tool_executor: ToolExecutor,
    max_tool_rounds: usize,
    retry_policy: RetryPolicy,
}

#[async_trait]
impl AgentRunner for ModelAgent {
    async fn run(
        &self,
        message: &str,
        context: &[ContextEntry],
    ) -> Result<String, AgentError> {
        let mut messages = self.initial_messages(message, context);
        let tools = self.tool_executor.definitions();

        for round in 0..=self.max_tool_rounds {
            let req = ModelRequest {
                messages,
                tools: tools.clone(),
            };
            let resp = self
                .send_request(&req)
                .instrument(debug_span!("model round", round))
                .await?;
            messages = req.messages;

            if !resp.wants_tools() {
                if resp.finish_reason == ModelFinishReason::Length {
                    warn!("model reply was cut by the token limit");
                }
                return Ok(resp.content);
            }
            if round == self.max_tool_rounds {
                break;
            }

            debug!("model requested {} tool call(s)", resp.tool_calls.len());
            let results = self.tool_executor.execute(&resp.tool_calls).await;
            messages.push(ModelMessage::ToolCalls {
                content: resp.content,
                calls: resp.tool_calls,
            });
            messages.extend(results.into_iter().map(ModelMessage::Tool));
        }

        error!("tool call rounds exceeded: {}", self.max_tool_rounds);
        Err(AgentError::ToolRoundsExceeded(self.max_tool_rounds))
    }
}

impl ModelAgent {
    fn initial_messages(
        &self,
        message: &str,
        context: &[ContextEntry],
    ) -> Vec<ModelMessage> {
        let mut messages = Vec::with_capacity(context.len() + 2);
        if let Some(system_prompt) = &self.system_prompt {
            messages.push(ModelMessage::System(system_prompt.clone()));
        }
        messages.extend(context.iter().map(ModelMessage::from));

        let ends_with_message = context
            .last()
            .is_some_and(|entry| entry.role == Role::User && entry.content == message);
        if !ends_with_message {
            messages.push(ModelMessage::User(message.to_owned()));
        }
        messages
    }

    async fn send_request(
        &self,
        req: &ModelRequest,
    ) -> Result<ModelResponse, AgentError> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.retry_policy.initial_interval)
            .with_max_elapsed_time(Some(self.retry_policy.max_elapsed_time))
            .build();

        let model_client = &self.model_client;
        let op = || async move {
            model_client.send_request(req).await.map_err(|err| {
                if err.kind().is_transient() {
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        };
        let notify = |err: Box<dyn ModelProviderError>, after: Duration| {
            warn!("model request failed ({err}), retrying in {after:?}");
        };

        backoff::future::retry_notify(backoff, op, notify)
            .await
            .map_err(|err| AgentError::Model {
                kind: err.kind(),
                message: err.to_string(),
            })
    }
}
