use shopkeeper_model::{ModelFinishReason, ModelResponse, ToolCallRequest};
use serde::{Deserialize, Serialize};

/// The preset response for one model request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetResponse {
    /// Text of the response.
    pub content: String,
    /// Tool calls requested by the response.
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
}

impl PresetResponse {
    /// Creates a text-only `PresetResponse`.
    #[inline]
    pub fn text<S: Into<String>>(content: S) -> Self {
        Self {
            content: content.into(),
            tool_calls: vec![],
            failures: None,
        }
    }

    /// Creates a `PresetResponse` that asks for the given tool calls.
    #[inline]
    pub fn with_tool_calls(calls: impl Into<Vec<ToolCallRequest>>) -> Self {
        Self {
            content: String::new(),
            tool_calls: calls.into(),
            failures: None,
        }
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }

    pub(crate) fn to_response(&self) -> ModelResponse {
        ModelResponse {
            content: self.content.clone(),
            tool_calls: self.tool_calls.clone(),
            finish_reason: if self.tool_calls.is_empty() {
                ModelFinishReason::Stop
            } else {
                ModelFinishReason::ToolCalls
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize_script_entry() {
        let preset: PresetResponse = serde_json::from_value(json!({
            "content": "",
            "tool_calls": [{
                "id": "1",
                "name": "get_order",
                "arguments": { "id": 42 }
            }],
            "failures": 2
        }))
        .unwrap();

        assert_eq!(preset.failures, Some(2));
        let response = preset.to_response();
        assert_eq!(response.finish_reason, ModelFinishReason::ToolCalls);
        assert_eq!(response.tool_calls[0].name, "get_order");
    }
}
