//! Turns user messages into agent replies recorded in a conversation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::agent::AgentRunner;
use crate::conversation::{
    Conversation, ConversationId, Message, Metadata, Role, timestamp,
};
use crate::store::ConversationStore;

/// The reply users see when the agent fails. Details only go to logs and
/// [`ResponseEnvelope::error`].
pub const APOLOGY: &str =
    "I'm sorry, I encountered an error while processing your request.";

const DEFAULT_CONTEXT_LIMIT: usize = 20;

/// Tunables of an [`Orchestrator`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// How many trailing messages are sent to the agent, `None` sends the
    /// whole history.
    pub context_limit: Option<usize>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            context_limit: Some(DEFAULT_CONTEXT_LIMIT),
        }
    }
}

/// Returned by [`Orchestrator::create_conversation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewConversation {
    /// The generated id.
    pub conversation_id: ConversationId,
    /// When the conversation was created.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

/// The outcome of [`Orchestrator::process_message`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    /// The conversation the turn was recorded in. Differs from the requested
    /// id when that one was unknown.
    pub conversation_id: ConversationId,
    /// The agent's reply, or [`APOLOGY`] on failure.
    pub response: String,
    /// Whether the agent produced a reply.
    pub success: bool,
    /// What went wrong, for diagnostics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A read-only overview of a conversation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// The conversation id.
    pub id: ConversationId,
    /// Creation time.
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Time of the last append.
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    /// Number of messages.
    pub message_count: usize,
    /// The conversation metadata.
    pub metadata: Metadata,
}

impl From<&Conversation> for ConversationSummary {
    fn from(conversation: &Conversation) -> Self {
        Self {
            id: conversation.id().clone(),
            created_at: conversation.created_at(),
            updated_at: conversation.updated_at(),
            message_count: conversation.len(),
            metadata: conversation.metadata().clone(),
        }
    }
}

/// Coordinates the store and an agent.
///
/// Turns on the same conversation are serialized, so a user message and the
/// reply to it are always adjacent in the history. Turns on different
/// conversations run concurrently.
pub struct Orchestrator {
    store: Arc<ConversationStore>,
    agent: Arc<dyn AgentRunner>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Creates an orchestrator with the default configuration.
    ///
    /// `store` may be an owned store or an `Arc` shared with other
    /// components of the process.
    pub fn new<A: AgentRunner + 'static>(
        store: impl Into<Arc<ConversationStore>>,
        agent: A,
    ) -> Self {
        Self::with_config(store, agent, Default::default())
    }

    /// Creates an orchestrator with the given configuration.
    pub fn with_config<A: AgentRunner + 'static>(
        store: impl Into<Arc<ConversationStore>>,
        agent: A,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store: store.into(),
            agent: Arc::new(agent),
            config,
        }
    }

    /// Returns the underlying store.
    #[inline]
    pub fn store(&self) -> &Arc<ConversationStore> {
        &self.store
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Starts an empty conversation.
    pub async fn create_conversation(&self, metadata: Metadata) -> NewConversation {
        let handle = self.store.create(metadata).await;
        let conversation = handle.snapshot().await;
        NewConversation {
            conversation_id: conversation.id().clone(),
            created_at: conversation.created_at(),
        }
    }

    /// Runs one turn: records `user_text`, asks the agent and records the
    /// outcome.
    ///
    /// An unknown `conversation_id` is not an error. A new conversation is
    /// started instead and its id is returned in the envelope, so callers
    /// must always continue with [`ResponseEnvelope::conversation_id`].
    ///
    /// Agent failures never escape: they are recorded as a system message
    /// and reported through the envelope.
    pub async fn process_message(
        &self,
        conversation_id: &str,
        user_text: &str,
    ) -> ResponseEnvelope {
        let handle = match self.store.get(conversation_id).await {
            Some(handle) => handle,
            None => {
                let handle = self.store.create(Metadata::new()).await;
                warn!(
                    "unknown conversation {conversation_id:?}, continuing in {}",
                    handle.id()
                );
                handle
            }
        };
        let id = handle.id().clone();

        let _turn = handle.lock_turn().await;
        self.store
            .append_message(id.as_str(), Role::User, user_text)
            .await;
        let context = handle.context_window(self.config.context_limit).await;

        let result = self
            .agent
            .run(user_text, &context)
            .instrument(info_span!("agent run", conversation = %id))
            .await;

        match result {
            Ok(reply) => {
                self.store
                    .append_message(id.as_str(), Role::Assistant, reply.as_str())
                    .await;
                ResponseEnvelope {
                    conversation_id: id,
                    response: reply,
                    success: true,
                    error: None,
                }
            }
            Err(err) => {
                error!("error processing message in conversation {id}: {err}");
                self.store
                    .append_message(
                        id.as_str(),
                        Role::System,
                        format!("Error processing message: {err}"),
                    )
                    .await;
                ResponseEnvelope {
                    conversation_id: id,
                    response: APOLOGY.to_owned(),
                    success: false,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Returns every message of a conversation, or `None` if it is unknown.
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
    ) -> Option<Vec<Message>> {
        let handle = self.store.get(conversation_id).await?;
        Some(handle.snapshot().await.messages().to_vec())
    }

    /// Summarizes the most recently updated conversations.
    pub async fn list_conversations(&self, limit: usize) -> Vec<ConversationSummary> {
        self.store
            .list_recent(limit)
            .await
            .iter()
            .map(ConversationSummary::from)
            .collect()
    }
}
