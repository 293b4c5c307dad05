use shopkeeper_model::ModelProvider;

use super::{ModelAgent, RetryPolicy};
use crate::model_client::ModelClient;
use crate::tool::{AnyTool, Executor as ToolExecutor, Tool, ToolObject};

const DEFAULT_MAX_TOOL_ROUNDS: usize = 8;

/// [`ModelAgent`] builder.
pub struct ModelAgentBuilder {
    model_client: ModelClient,
    system_prompt: Option<String>,
    tools: Vec<Box<dyn ToolObject>>,
    max_tool_rounds: usize,
    retry_policy: RetryPolicy,
}

impl ModelAgentBuilder {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider<P: ModelProvider + 'static>(
        provider: P,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            tools: vec![],
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
            retry_policy: Default::default(),
        }
    }

    /// Sets the system prompt sent before every conversation.
    #[inline]
    pub fn system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Registers a tool.
    #[inline]
    pub fn with_tool<T: Tool>(mut self, tool: T) -> Self {
        let tool = Box::new(AnyTool(tool));
        self.tools.push(tool);
        self
    }

    /// Limits how many rounds of tool calls a single run may take.
    #[inline]
    pub fn max_tool_rounds(mut self, rounds: usize) -> Self {
        self.max_tool_rounds = rounds;
        self
    }

    /// Sets the retry policy for transient model failures.
    #[inline]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry_policy = policy;
        self
    }

    /// Builds the agent.
    pub fn build(self) -> ModelAgent {
        let Self {
            model_client,
            system_prompt,
            tools,
            max_tool_rounds,
            retry_policy,
        } = self;
        let tool_executor = ToolExecutor::with_tools(tools);
        info!(
            "agent ready with {} tool(s)",
            tool_executor.definitions().len()
        );
        ModelAgent {
            model_client,
            system_prompt,
            tool_executor,
            max_tool_rounds,
            retry_policy,
        }
    }
}
