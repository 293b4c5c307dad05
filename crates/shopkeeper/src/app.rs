use std::path::PathBuf;

use shopkeeper_core::conversation::{Message, Metadata};
use shopkeeper_core::{
    ConversationStore, ConversationSummary, ModelAgentBuilder, NewConversation,
    Orchestrator, OrchestratorConfig, ResponseEnvelope, StoreError,
};
use shopkeeper_model::ModelProvider;
use shopkeeper_openai_model::{OpenAIConfigBuilder, OpenAIProvider};

use crate::config::Settings;
use crate::tools::*;

const DEFAULT_SYSTEM_PROMPT: &str = include_str!("./system_prompt.md");

/// An app builder.
///
/// See [`App`].
pub struct AppBuilder {
    agent_builder: ModelAgentBuilder,
    store_api: Option<StoreApi>,
    conversations_dir: PathBuf,
    config: OrchestratorConfig,
}

impl AppBuilder {
    /// Creates an app builder with a specified model provider.
    pub fn with_model_provider<M: ModelProvider + 'static>(provider: M) -> Self {
        let agent_builder = ModelAgentBuilder::with_model_provider(provider)
            .system_prompt(DEFAULT_SYSTEM_PROMPT);
        Self {
            agent_builder,
            store_api: None,
            conversations_dir: "conversations".into(),
            config: Default::default(),
        }
    }

    /// Replaces the built-in system prompt.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        self.agent_builder = self.agent_builder.system_prompt(prompt);
        self
    }

    /// Gives the agent the store tools backed by `api`.
    #[inline]
    pub fn with_store_api(mut self, api: StoreApi) -> Self {
        self.store_api = Some(api);
        self
    }

    /// Sets where conversations are stored.
    #[inline]
    pub fn with_conversations_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.conversations_dir = dir.into();
        self
    }

    /// Sets how many trailing messages are sent to the model.
    #[inline]
    pub fn with_context_limit(mut self, limit: Option<usize>) -> Self {
        self.config.context_limit = limit;
        self
    }

    /// Opens the store and builds the app.
    pub async fn build(self) -> Result<App, StoreError> {
        let Self {
            mut agent_builder,
            store_api,
            conversations_dir,
            config,
        } = self;

        if let Some(api) = &store_api {
            agent_builder = agent_builder
                .with_tool(ListProductsTool::new(api.clone()))
                .with_tool(GetProductTool::new(api.clone()))
                .with_tool(CreateProductTool::new(api.clone()))
                .with_tool(UpdateProductTool::new(api.clone()))
                .with_tool(ListOrdersTool::new(api.clone()))
                .with_tool(GetOrderTool::new(api.clone()))
                .with_tool(UpdateOrderTool::new(api.clone()))
                .with_tool(ListCouponsTool::new(api.clone()))
                .with_tool(CreateCouponTool::new(api.clone()));
        }

        let store = ConversationStore::open(conversations_dir).await?;
        let orchestrator = Orchestrator::with_config(store, agent_builder.build(), config);
        Ok(App {
            orchestrator,
            store_api,
        })
    }
}

/// The assembled application: a conversation store, an OpenAI-backed agent
/// and the store tools.
///
/// All methods are safe to call concurrently.
pub struct App {
    orchestrator: Orchestrator,
    store_api: Option<StoreApi>,
}

impl App {
    /// Builds the app described by `settings`.
    pub async fn from_settings(settings: &Settings) -> Result<Self, StoreError> {
        let config = OpenAIConfigBuilder::with_api_key(&settings.openai_api_key)
            .with_base_url(&settings.openai_base_url)
            .with_model(&settings.openai_model)
            .build();
        AppBuilder::with_model_provider(OpenAIProvider::new(config))
            .with_store_api(StoreApi::new(&settings.mcp_server_url))
            .with_conversations_dir(&settings.conversations_dir)
            .with_context_limit(settings.context_max_messages)
            .build()
            .await
    }

    /// Checks that the tool server is reachable. Failures are only logged,
    /// the agent still works without its tools.
    pub async fn probe_tool_server(&self) -> bool {
        let Some(api) = &self.store_api else {
            return false;
        };
        match api.health().await {
            Ok(()) => {
                info!("tool server at {} is healthy", api.base_url());
                true
            }
            Err(err) => {
                warn!("tool server at {} is unavailable: {err}", api.base_url());
                false
            }
        }
    }

    /// See [`Orchestrator::create_conversation`].
    #[inline]
    pub async fn create_conversation(&self, metadata: Metadata) -> NewConversation {
        self.orchestrator.create_conversation(metadata).await
    }

    /// See [`Orchestrator::process_message`].
    #[inline]
    pub async fn process_message(
        &self,
        conversation_id: &str,
        message: &str,
    ) -> ResponseEnvelope {
        self.orchestrator
            .process_message(conversation_id, message)
            .await
    }

    /// See [`Orchestrator::get_conversation_history`].
    #[inline]
    pub async fn get_conversation_history(
        &self,
        conversation_id: &str,
    ) -> Option<Vec<Message>> {
        self.orchestrator
            .get_conversation_history(conversation_id)
            .await
    }

    /// See [`Orchestrator::list_conversations`].
    #[inline]
    pub async fn list_conversations(&self, limit: usize) -> Vec<ConversationSummary> {
        self.orchestrator.list_conversations(limit).await
    }
}
