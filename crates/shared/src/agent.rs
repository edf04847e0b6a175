//! Agent configuration and invocation types.
//!
//! These are the data shapes that flow between the registry, the command
//! extractor, the instruction builder and the dispatcher.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

fn default_true() -> bool {
    true
}

/// What kind of payload an agent produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputType {
    #[default]
    Text,
    Image,
}

/// Static configuration for one agent, as found in `agents.config.json`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Filled from the mapping key when loaded from a config file
    #[serde(default, skip_serializing)]
    pub id: String,
    pub description: String,
    #[serde(default = "default_true")]
    pub enabled_by_default: bool,
    #[serde(default)]
    pub output_type: OutputType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,
}

impl AgentConfig {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            enabled_by_default: true,
            output_type: OutputType::Text,
            system_instructions: None,
        }
    }

    pub fn with_output_type(mut self, output_type: OutputType) -> Self {
        self.output_type = output_type;
        self
    }

    pub fn is_image(&self) -> bool {
        self.output_type == OutputType::Image
    }
}

/// Per-assistant customisation of one agent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Replaces the registry's system instructions for this agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
}

impl AgentOverride {
    pub fn enabled(enabled: bool) -> Self {
        Self {
            enabled: Some(enabled),
            prompt: None,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }
}

/// Overrides keyed by agent id
pub type AgentOverrides = HashMap<String, AgentOverride>;

/// One `--<agent> <argument>` occurrence found in a model reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandInvocation {
    pub agent_id: String,
    /// Everything after the separating whitespace up to the end of the line, untrimmed
    pub argument_text: String,
    /// The exact slice of the reply that matched
    pub raw_match_text: String,
}
