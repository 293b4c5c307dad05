use serde::{Deserialize, Serialize};
use serde_json::Value;
use shopkeeper_model::{
    ModelFinishReason, ModelMessage, ModelRequest, ModelResponse, ModelTool,
    ToolCallRequest,
};

use crate::OpenAIConfig;

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ChatCompletion {
    pub id: String,
    pub choices: Vec<Choice>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    pub finish_reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ResponseMessage {
    pub content: Option<String>,
    pub tool_calls: Option<Vec<ToolCall>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: String,
    pub code: Option<Value>,
}

// ---------------------------
// Types shared by both sides
// ---------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// JSON-encoded arguments, as the API transports them.
    pub arguments: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub r#type: String,
    pub function: FunctionCall,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct FunctionTool {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Tool {
    r#type: &'static str,
    function: FunctionTool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Message {
    System {
        content: String,
    },
    User {
        content: String,
    },
    Assistant {
        content: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tool_calls: Option<Vec<ToolCall>>,
    },
    Tool {
        tool_call_id: String,
        content: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    stream: bool,
}

// -----------
// Conversions
// -----------

#[inline]
pub fn create_request(
    req: &ModelRequest,
    config: &OpenAIConfig,
) -> ChatCompletionRequest {
    ChatCompletionRequest {
        model: config.model.clone(),
        messages: req.messages.iter().map(create_message).collect(),
        tools: req.tools.iter().map(create_tool).collect(),
        stream: false,
    }
}

fn create_message(msg: &ModelMessage) -> Message {
    match msg {
        ModelMessage::System(content) => Message::System {
            content: content.clone(),
        },
        ModelMessage::User(content) => Message::User {
            content: content.clone(),
        },
        ModelMessage::Assistant(content) => Message::Assistant {
            content: Some(content.clone()),
            tool_calls: None,
        },
        ModelMessage::ToolCalls { content, calls } => Message::Assistant {
            content: (!content.is_empty()).then(|| content.clone()),
            tool_calls: Some(calls.iter().map(create_tool_call).collect()),
        },
        ModelMessage::Tool(result) => Message::Tool {
            tool_call_id: result.id.clone(),
            content: result.content.clone(),
        },
    }
}

fn create_tool_call(call: &ToolCallRequest) -> ToolCall {
    ToolCall {
        id: call.id.clone(),
        r#type: "function".to_owned(),
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.to_string(),
        },
    }
}

#[inline]
fn create_tool(tool: &ModelTool) -> Tool {
    Tool {
        r#type: "function",
        function: FunctionTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            parameters: tool.parameters.clone(),
        },
    }
}

/// Reasons the completion could not be turned into a response.
#[derive(Debug, PartialEq, Eq)]
pub enum ConvertError {
    NoChoices,
    ContentFiltered,
}

pub fn convert_completion(
    mut completion: ChatCompletion,
) -> Result<ModelResponse, ConvertError> {
    if completion.choices.is_empty() {
        return Err(ConvertError::NoChoices);
    }
    let choice = completion.choices.swap_remove(0);

    let finish_reason = match choice.finish_reason.as_deref() {
        Some("tool_calls") => ModelFinishReason::ToolCalls,
        Some("length") => ModelFinishReason::Length,
        Some("content_filter") => return Err(ConvertError::ContentFiltered),
        _ => ModelFinishReason::Stop,
    };

    let tool_calls = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| {
            // Models occasionally emit broken JSON; hand it to the tool as
            // a raw string so the tool reports a readable input error.
            let arguments = serde_json::from_str(&call.function.arguments)
                .unwrap_or(Value::String(call.function.arguments));
            ToolCallRequest {
                id: call.id,
                name: call.function.name,
                arguments,
            }
        })
        .collect();

    Ok(ModelResponse {
        content: choice.message.content.unwrap_or_default(),
        tool_calls,
        finish_reason,
    })
}
