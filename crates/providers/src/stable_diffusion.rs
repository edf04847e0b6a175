//! Client for Stable-Diffusion-style `txt2img` servers.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::settings::ImageSettings;
use std::sync::LazyLock;
use std::time::Duration;

use crate::ImageBackend;

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(600))
        .build()
        .unwrap_or_else(|_| Client::new())
});

/// Body of `POST /sdapi/v1/txt2img`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Txt2ImgRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub cfg_scale: f32,
    pub sampler_index: String,
    pub width: u32,
    pub height: u32,
    /// -1 lets the server pick a random seed
    pub seed: i64,
    pub restore_faces: bool,
    pub tiling: bool,
    pub enable_hr: bool,
}

impl Txt2ImgRequest {
    /// Fixed generation parameters from settings around the given prompt
    pub fn from_settings(prompt: impl Into<String>, settings: &ImageSettings) -> Self {
        Self {
            prompt: prompt.into(),
            negative_prompt: settings.negative_prompt.clone(),
            steps: settings.steps,
            cfg_scale: settings.cfg_scale,
            sampler_index: settings.sampler.clone(),
            width: settings.width,
            height: settings.height,
            seed: -1,
            restore_faces: false,
            tiling: false,
            enable_hr: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Txt2ImgResponse {
    #[serde(default)]
    images: Vec<String>,
}

pub struct StableDiffusionClient {
    http: Client,
    base: String,
}

impl StableDiffusionClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            base: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait::async_trait]
impl ImageBackend for StableDiffusionClient {
    async fn txt2img(&self, request: &Txt2ImgRequest) -> Result<Option<String>> {
        let url = format!("{}/sdapi/v1/txt2img", self.base);
        let resp = self.http.post(url).json(request).send().await?;
        if !resp.status().is_success() {
            return Err(anyhow!("txt2img error: {}", resp.status()));
        }
        let body: Txt2ImgResponse = resp.json().await?;
        Ok(body.images.into_iter().next().filter(|b| !b.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_from_default_settings() {
        let req = Txt2ImgRequest::from_settings("a panda in the snow", &ImageSettings::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["prompt"], "a panda in the snow");
        assert_eq!(json["steps"], 30);
        assert_eq!(json["cfg_scale"], 7.0);
        assert_eq!(json["sampler_index"], "DPM++ 2M Karras");
        assert_eq!(json["width"], 512);
        assert_eq!(json["height"], 512);
        assert_eq!(json["seed"], -1);
        assert_eq!(json["enable_hr"], false);
    }

    #[test]
    fn test_response_missing_images() {
        let body: Txt2ImgResponse = serde_json::from_str(r#"{"info": "{}"}"#).unwrap();
        assert!(body.images.is_empty());
    }
}
