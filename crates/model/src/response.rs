use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A complete response from the model provider.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// The text the model generated.
    pub content: String,
    /// Tool calls requested by the model, in emission order.
    pub tool_calls: Vec<ToolCallRequest>,
    /// The reason the model finished generating.
    pub finish_reason: ModelFinishReason,
}

impl ModelResponse {
    /// Creates a text-only response.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            finish_reason: ModelFinishReason::Stop,
        }
    }

    /// Returns `true` if the model wants tools to run before it answers.
    #[inline]
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// The reason why a model response has finished.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
pub enum ModelFinishReason {
    /// The model needs to call a tool.
    ToolCalls,
    /// The model has finished generating text.
    #[default]
    Stop,
    /// The output was cut by the provider's token limit.
    Length,
}

/// Describes a tool call request from the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// The unique identifier for the tool call request.
    pub id: String,
    /// The name of the tool to call.
    pub name: String,
    /// The arguments to pass to the tool, usually a JSON object.
    pub arguments: Value,
}
