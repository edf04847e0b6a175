pub mod agent;
pub mod events;
pub mod profile;

pub mod settings {
    use serde::{Deserialize, Serialize};
    use std::env;

    use crate::profile::AssistantProfile;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct OllamaSettings {
        pub base_url: String,
        /// Model used when the active profile names none
        pub model: String,
        /// Model used to translate image prompts into English
        pub translation_model: String,
    }

    /// How a generated image ends up in the reply
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub enum ImageDelivery {
        /// Embed the payload as a `data:image/png;base64,` URL
        DataUrl,
        /// Post the payload to the upload endpoint and link the returned URL
        Upload,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct ImageSettings {
        /// Base URL of the txt2img server
        pub endpoint: String,
        pub delivery: ImageDelivery,
        pub upload_url: String,
        pub negative_prompt: String,
        pub steps: u32,
        pub cfg_scale: f32,
        pub sampler: String,
        pub width: u32,
        pub height: u32,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CodeSettings {
        /// Interpreter invoked as `<interpreter> -c <script>`
        pub interpreter: String,
        pub timeout_ms: u64,
        /// Substrings that abort execution before anything is spawned
        pub denied_tokens: Vec<String>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct AppSettings {
        pub ollama: OllamaSettings,
        pub image: ImageSettings,
        pub code: CodeSettings,
        /// Caller-side limit around every agent executor
        pub agent_timeout_secs: u64,
        /// Prior messages kept when appending a new exchange
        pub history_limit: usize,
        /// Optional path to an `agents.config.json` replacing the bundled registry
        pub agents_file: Option<String>,
        pub profiles: Vec<AssistantProfile>,
        pub default_profile: Option<String>,
    }

    impl Default for OllamaSettings {
        fn default() -> Self {
            Self {
                base_url: "http://127.0.0.1:11434".into(),
                model: "mistral".into(),
                translation_model: "gemma3:4b".into(),
            }
        }
    }

    impl Default for ImageSettings {
        fn default() -> Self {
            Self {
                endpoint: "http://127.0.0.1:7860".into(),
                delivery: ImageDelivery::Upload,
                upload_url: "http://localhost:3001/upload".into(),
                negative_prompt: "blurry, distorted, low quality, bad anatomy, watermark, text, logo"
                    .into(),
                steps: 30,
                cfg_scale: 7.0,
                sampler: "DPM++ 2M Karras".into(),
                width: 512,
                height: 512,
            }
        }
    }

    impl Default for CodeSettings {
        fn default() -> Self {
            Self {
                interpreter: "python3".into(),
                timeout_ms: 3000,
                denied_tokens: [
                    "os", "subprocess", "sys", "shutil", "socket", "open", "eval", "exec",
                ]
                .iter()
                .map(|t| t.to_string())
                .collect(),
            }
        }
    }

    impl Default for AppSettings {
        fn default() -> Self {
            Self {
                ollama: OllamaSettings::default(),
                image: ImageSettings::default(),
                code: CodeSettings::default(),
                agent_timeout_secs: 120,
                history_limit: 28,
                agents_file: None,
                profiles: Vec::new(),
                default_profile: None,
            }
        }
    }

    impl AppSettings {
        /// Environment variables win over file values
        pub fn apply_env_overrides(&mut self) {
            if let Ok(url) = env::var("OLLAMA_BASE_URL") {
                self.ollama.base_url = url;
            }
            if let Ok(url) = env::var("SD_BASE_URL") {
                self.image.endpoint = url;
            }
            if let Ok(url) = env::var("LOCALCHAT_UPLOAD_URL") {
                self.image.upload_url = url;
            }
        }

        /// Profile by id, else the configured default, else the first one
        pub fn profile(&self, id: Option<&str>) -> Option<&AssistantProfile> {
            let wanted = id.or(self.default_profile.as_deref());
            match wanted {
                Some(id) => self.profiles.iter().find(|p| p.id == id),
                None => self.profiles.first(),
            }
        }
    }
}

pub mod agent_api {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ChatMessage {
        pub role: String, // "system" | "user" | "assistant"
        pub content: String,
    }

    impl ChatMessage {
        pub fn system(content: impl Into<String>) -> Self {
            Self {
                role: "system".to_string(),
                content: content.into(),
            }
        }

        pub fn user(content: impl Into<String>) -> Self {
            Self {
                role: "user".to_string(),
                content: content.into(),
            }
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self {
                role: "assistant".to_string(),
                content: content.into(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::profile::AssistantProfile;
    use super::settings::{AppSettings, ImageDelivery};

    #[test]
    fn test_settings_partial_json_keeps_defaults() {
        let settings: AppSettings = serde_json::from_str(
            r#"{ "ollama": { "model": "llama3.2:3b" }, "image": { "delivery": "dataUrl" } }"#,
        )
        .unwrap();
        assert_eq!(settings.ollama.model, "llama3.2:3b");
        assert_eq!(settings.ollama.base_url, "http://127.0.0.1:11434");
        assert_eq!(settings.image.delivery, ImageDelivery::DataUrl);
        assert_eq!(settings.image.steps, 30);
        assert_eq!(settings.code.timeout_ms, 3000);
        assert_eq!(settings.history_limit, 28);
    }

    #[test]
    fn test_default_denied_tokens_include_socket() {
        let settings = AppSettings::default();
        assert!(settings.code.denied_tokens.iter().any(|t| t == "socket"));
        assert_eq!(settings.code.denied_tokens.len(), 8);
    }

    #[test]
    fn test_profile_lookup() {
        let mut settings = AppSettings::default();
        assert!(settings.profile(None).is_none());

        settings.profiles = vec![
            AssistantProfile::new("a", "First"),
            AssistantProfile::new("b", "Second"),
        ];
        assert_eq!(settings.profile(None).map(|p| p.id.as_str()), Some("a"));
        assert_eq!(settings.profile(Some("b")).map(|p| p.id.as_str()), Some("b"));

        settings.default_profile = Some("b".into());
        assert_eq!(settings.profile(None).map(|p| p.id.as_str()), Some("b"));
        assert!(settings.profile(Some("missing")).is_none());
    }
}
