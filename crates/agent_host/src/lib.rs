//! Agent Host - agent command pipeline for local chat
//!
//! This crate turns raw model replies into finished answers:
//! - Load the agent registry and render the instruction block for the model
//! - Extract `--<agent> <argument>` markers from model replies
//! - Dispatch them to the built-in agents (calc, code, image)
//! - Substitute the results and run the chat send pipeline

pub mod agents;
pub mod dispatch;
pub mod extractor;
pub mod heuristics;
pub mod instructions;
pub mod postprocess;
pub mod registry;
pub mod session;

pub use agents::{Agent, AgentFailure, AgentOutput, Presentation};
pub use dispatch::{AgentDispatcher, DispatchOutcome};
pub use extractor::extract_commands;
pub use instructions::{build_instruction_prompt, partition_agents, AgentPartition};
pub use postprocess::{ProcessedReply, ReplyPostProcessor};
pub use registry::{AgentRegistry, RegistryError};
pub use session::{ChatSession, ReplyMode, SendError, SendOutcome};

use anyhow::Result;
use providers::{
    ChatBackend, ImageBackend, ImageStore, OllamaClient, StableDiffusionClient, UploadClient,
};
use shared::agent::AgentOverrides;
use shared::events::AgentEvent;
use shared::profile::AssistantProfile;
use shared::settings::{AppSettings, ImageDelivery};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Agent host wires settings, registry, backends and agents together
pub struct AgentHost {
    pub settings: Arc<AppSettings>,
    chat: Arc<dyn ChatBackend>,
    dispatcher: Arc<AgentDispatcher>,
}

impl AgentHost {
    /// Host talking to the Ollama, txt2img and upload services from `settings`
    pub fn new(
        settings: AppSettings,
        events: Option<mpsc::UnboundedSender<AgentEvent>>,
    ) -> Result<Self, RegistryError> {
        let registry = load_registry(&settings)?;
        let chat: Arc<dyn ChatBackend> = Arc::new(OllamaClient::new(&settings.ollama.base_url));
        let images: Arc<dyn ImageBackend> =
            Arc::new(StableDiffusionClient::new(&settings.image.endpoint));
        let store: Option<Arc<dyn ImageStore>> = match settings.image.delivery {
            ImageDelivery::Upload => Some(Arc::new(UploadClient::new(&settings.image.upload_url))),
            ImageDelivery::DataUrl => None,
        };
        Ok(Self::with_backends(settings, registry, chat, images, store, events))
    }

    /// Host over explicit backends
    pub fn with_backends(
        settings: AppSettings,
        registry: AgentRegistry,
        chat: Arc<dyn ChatBackend>,
        images: Arc<dyn ImageBackend>,
        store: Option<Arc<dyn ImageStore>>,
        events: Option<mpsc::UnboundedSender<AgentEvent>>,
    ) -> Self {
        let agents = agents::builtin_agents(&settings, chat.clone(), images, store);
        let mut dispatcher = AgentDispatcher::new(Arc::new(registry))
            .with_agents(agents)
            .with_timeout(Duration::from_secs(settings.agent_timeout_secs));
        if let Some(events) = events {
            dispatcher = dispatcher.with_events(events);
        }

        Self {
            settings: Arc::new(settings),
            chat,
            dispatcher: Arc::new(dispatcher),
        }
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        self.dispatcher.registry()
    }

    pub fn dispatcher(&self) -> &Arc<AgentDispatcher> {
        &self.dispatcher
    }

    /// Instruction block for an assistant with these overrides
    pub fn instruction_prompt(&self, overrides: &AgentOverrides) -> String {
        build_instruction_prompt(self.registry(), overrides)
    }

    /// Model for `profile`: explicit override, then the profile's, then the default
    pub fn resolve_model(&self, profile: &AssistantProfile, model_override: Option<&str>) -> String {
        model_override
            .filter(|m| !m.trim().is_empty())
            .or(Some(profile.model.as_str()).filter(|m| !m.trim().is_empty()))
            .unwrap_or(&self.settings.ollama.model)
            .to_string()
    }

    /// Start a conversation with `profile`
    pub fn session(&self, profile: AssistantProfile, model_override: Option<&str>) -> ChatSession {
        let model = self.resolve_model(&profile, model_override);
        ChatSession::new(
            self.chat.clone(),
            self.dispatcher.clone(),
            profile,
            model,
            self.settings.history_limit,
        )
    }

    /// Models installed on the Ollama server
    pub async fn list_models(&self) -> Result<Vec<String>> {
        OllamaClient::new(&self.settings.ollama.base_url)
            .list_models()
            .await
    }
}

/// Registry from `agentsFile` when set, else the bundled one
pub fn load_registry(settings: &AppSettings) -> Result<AgentRegistry, RegistryError> {
    match settings.agents_file.as_deref() {
        Some(path) => AgentRegistry::load(Path::new(path)),
        None => AgentRegistry::builtin(),
    }
}
