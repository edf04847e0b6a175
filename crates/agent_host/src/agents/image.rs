//! Image generation agent: translate, render through txt2img, deliver.

use async_trait::async_trait;
use providers::upload::png_data_url;
use providers::{honours_system_prompt, ChatBackend, ImageBackend, ImageStore, Txt2ImgRequest};
use shared::agent_api::ChatMessage;
use shared::settings::{ImageDelivery, ImageSettings};
use std::sync::Arc;

use super::{Agent, AgentFailure, AgentOutput, Presentation};

pub const TRANSLATE_PROMPT: &str = "Translate the following prompt into fluent, descriptive English for image generation. Do not explain, just return the translated prompt.";

pub const IMAGE_ALT: &str = "generated image";

pub struct ImageAgent {
    chat: Arc<dyn ChatBackend>,
    images: Arc<dyn ImageBackend>,
    store: Option<Arc<dyn ImageStore>>,
    settings: ImageSettings,
    translation_model: String,
}

impl ImageAgent {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        images: Arc<dyn ImageBackend>,
        store: Option<Arc<dyn ImageStore>>,
        settings: ImageSettings,
        translation_model: impl Into<String>,
    ) -> Self {
        Self {
            chat,
            images,
            store,
            settings,
            translation_model: translation_model.into(),
        }
    }

    /// English rendition of `prompt`, or `prompt` itself when translation fails
    async fn translate(&self, prompt: &str) -> String {
        let messages = translation_messages(&self.translation_model, prompt);
        match self.chat.generate(&self.translation_model, messages).await {
            Ok(translated) if !translated.trim().is_empty() => translated.trim().to_string(),
            Ok(_) => prompt.to_string(),
            Err(e) => {
                tracing::warn!("Prompt translation failed, using original text: {}", e);
                prompt.to_string()
            }
        }
    }

    async fn deliver(&self, base64: &str) -> Result<String, AgentFailure> {
        match self.settings.delivery {
            ImageDelivery::DataUrl => Ok(png_data_url(base64)),
            ImageDelivery::Upload => {
                let store = self
                    .store
                    .as_ref()
                    .ok_or_else(|| AgentFailure::Upstream("no upload endpoint configured".into()))?;
                store
                    .store_png(base64)
                    .await
                    .map_err(|e| AgentFailure::Upstream(e.to_string()))
            }
        }
    }
}

/// Markdown image reference for `url`
pub fn image_markdown(url: &str) -> String {
    format!("![{}]({})", IMAGE_ALT, url)
}

/// The translation instruction travels in the user turn for models that ignore system messages
fn translation_messages(model: &str, prompt: &str) -> Vec<ChatMessage> {
    if honours_system_prompt(model) {
        vec![ChatMessage::system(TRANSLATE_PROMPT), ChatMessage::user(prompt)]
    } else {
        vec![ChatMessage::user(format!("{}\n\n{}", TRANSLATE_PROMPT, prompt))]
    }
}

#[async_trait]
impl Agent for ImageAgent {
    fn id(&self) -> &str {
        "image"
    }

    async fn run(&self, argument: &str) -> Result<AgentOutput, AgentFailure> {
        let prompt = self.translate(argument).await;
        tracing::debug!("Image prompt: {}", prompt);

        let request = Txt2ImgRequest::from_settings(prompt, &self.settings);
        let payload = self
            .images
            .txt2img(&request)
            .await
            .map_err(|e| AgentFailure::Upstream(e.to_string()))?
            .ok_or(AgentFailure::Empty)?;

        let url = self.deliver(&payload).await?;
        Ok(AgentOutput::text(image_markdown(&url)))
    }

    fn presentation(&self) -> Presentation {
        Presentation::Image
    }

    /// The text contract for images is the empty string; the cause is only logged
    fn failure_text(&self, failure: &AgentFailure) -> String {
        tracing::warn!("Image generation failed: {}", failure);
        String::new()
    }
}
