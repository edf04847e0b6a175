//! Assistant profiles and their attached context documents.

use serde::{Deserialize, Serialize};

use crate::agent::AgentOverrides;

/// Length used when previewing a document in listings
const PREVIEW_CHARS: usize = 200;

/// Text document attached to an assistant and prepended to every prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextDocument {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub text: String,
}

impl ContextDocument {
    pub fn new(id: u64, name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            text: text.into(),
        }
    }

    /// Short preview for listings
    pub fn preview(&self) -> String {
        if self.text.trim().is_empty() {
            return "No summary available.".to_string();
        }
        let mut preview: String = self.text.chars().take(PREVIEW_CHARS).collect();
        if self.text.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }
        preview
    }
}

/// A named assistant: model, system prompt, agent overrides and documents
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistantProfile {
    pub id: String,
    pub name: String,
    /// Empty means "use the configured default model"
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub system_prompt: String,
    #[serde(default)]
    pub agents: AgentOverrides,
    #[serde(default)]
    pub documents: Vec<ContextDocument>,
}

impl AssistantProfile {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            "Assistant"
        } else {
            &self.name
        }
    }

    /// All non-empty document texts joined by blank lines
    pub fn context_text(&self) -> Option<String> {
        let texts: Vec<&str> = self
            .documents
            .iter()
            .map(|d| d.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect();
        if texts.is_empty() {
            None
        } else {
            Some(texts.join("\n\n"))
        }
    }
}
