//! Core logic: conversations, their durable store, the agent loop and the
//! orchestrator tying them together.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

mod agent;
pub mod conversation;
mod error;
mod model_client;
mod orchestrator;
mod store;
pub mod tool;

pub use agent::{AgentRunner, ModelAgent, ModelAgentBuilder, RetryPolicy};
pub use error::{AgentError, MalformedRecordError, StoreError};
pub use orchestrator::{
    APOLOGY, ConversationSummary, NewConversation, Orchestrator,
    OrchestratorConfig, ResponseEnvelope,
};
pub use store::{ConversationHandle, ConversationStore, TurnGuard};
