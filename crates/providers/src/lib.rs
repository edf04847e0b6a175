//! Providers - HTTP clients for the local model and image services
//!
//! The agents talk to these services only through the [`ChatBackend`],
//! [`ImageBackend`] and [`ImageStore`] traits so they can be exercised
//! against in-memory fakes.

pub mod ollama;
pub mod stable_diffusion;
pub mod upload;

use anyhow::Result;
use shared::agent_api::ChatMessage;

pub use ollama::OllamaClient;
pub use stable_diffusion::{StableDiffusionClient, Txt2ImgRequest};
pub use upload::UploadClient;

/// Model families that honour a system message; others get the user turn only
const SYSTEM_PROMPT_FAMILIES: &[&str] = &["mistral", "llama"];

/// Whether `model` belongs to a family that is sent a system message
pub fn honours_system_prompt(model: &str) -> bool {
    let lower = model.to_lowercase();
    SYSTEM_PROMPT_FAMILIES.iter().any(|f| lower.contains(f))
}

/// Chat-completion service (Ollama `/api/chat`)
#[async_trait::async_trait]
pub trait ChatBackend: Send + Sync {
    /// Send a full conversation and return the assistant's message content
    async fn generate(&self, model: &str, messages: Vec<ChatMessage>) -> Result<String>;

    /// Single-turn helper used for auxiliary prompts such as translation
    async fn complete(&self, prompt: &str, system_prompt: &str, model: &str) -> Result<String> {
        let mut messages = Vec::new();
        if honours_system_prompt(model) && !system_prompt.trim().is_empty() {
            messages.push(ChatMessage::system(system_prompt));
        }
        messages.push(ChatMessage::user(prompt));
        self.generate(model, messages).await
    }
}

/// Text-to-image service
#[async_trait::async_trait]
pub trait ImageBackend: Send + Sync {
    /// Returns the first base64 image of the response, `None` when the server sent none
    async fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Option<String>>;
}

/// Storage for generated images that hands back a URL
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    async fn store_png(&self, base64: &str) -> Result<String>;
}
