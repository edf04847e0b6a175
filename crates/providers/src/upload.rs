//! Client for the companion upload endpoint that turns a PNG payload into a URL.

use anyhow::{anyhow, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;

use crate::ImageStore;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .timeout(Duration::from_secs(60))
        .build()
        .unwrap_or_else(|_| Client::new())
});

#[derive(Debug, Serialize)]
struct UploadRequest<'a> {
    base64: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: Option<String>,
}

/// Wrap a bare base64 PNG payload in a data URL (already-wrapped input is kept)
pub fn png_data_url(base64: &str) -> String {
    if base64.starts_with("data:image/") {
        base64.to_string()
    } else {
        format!("{}{}", PNG_DATA_URL_PREFIX, base64)
    }
}

pub struct UploadClient {
    http: Client,
    url: String,
}

impl UploadClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            url: url.into(),
        }
    }
}

#[async_trait::async_trait]
impl ImageStore for UploadClient {
    async fn store_png(&self, base64: &str) -> Result<String> {
        let payload = png_data_url(base64);
        let resp = self
            .http
            .post(&self.url)
            .json(&UploadRequest { base64: &payload })
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(anyhow!("upload error: {}", resp.status()));
        }
        let body: UploadResponse = resp.json().await?;
        body.url
            .filter(|u| !u.is_empty())
            .ok_or_else(|| anyhow!("upload response carried no url"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_data_url() {
        assert_eq!(png_data_url("iVBOR"), "data:image/png;base64,iVBOR");
        assert_eq!(
            png_data_url("data:image/png;base64,iVBOR"),
            "data:image/png;base64,iVBOR"
        );
    }

    #[test]
    fn test_upload_response() {
        let body: UploadResponse =
            serde_json::from_str(r#"{"url": "/uploads/image-1.png"}"#).unwrap();
        assert_eq!(body.url.as_deref(), Some("/uploads/image-1.png"));
    }
}
