//! Agent registry: the static id → configuration mapping.
//!
//! The registry is built once at startup (from the bundled
//! `agents.config.json` or a user-supplied file) and shared read-only
//! behind an `Arc`. Iteration follows the order of the source document.

use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use shared::agent::AgentConfig;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Registry shipped with the binary
const BUILTIN_CONFIG: &str = include_str!("../agents.config.json");

/// Errors raised while loading agent configuration
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Failed to read agent configuration {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed agent configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Duplicate agent id: {0}")]
    DuplicateId(String),

    #[error("Invalid agent id {0:?}: only letters, digits and underscores are allowed")]
    InvalidId(String),
}

/// Registry of agent configurations in declaration order
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<AgentConfig>,
    index: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry from the bundled configuration
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_CONFIG)
    }

    /// Load a registry from a JSON file
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Parse a JSON object mapping agent id to configuration
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        let entries: OrderedAgents = serde_json::from_str(json)?;
        let mut registry = Self::new();
        for (id, mut config) in entries.0 {
            config.id = id;
            registry.register(config)?;
        }
        Ok(registry)
    }

    /// Add an agent configuration
    pub fn register(&mut self, config: AgentConfig) -> Result<(), RegistryError> {
        if !is_valid_id(&config.id) {
            return Err(RegistryError::InvalidId(config.id));
        }
        if self.index.contains_key(&config.id) {
            return Err(RegistryError::DuplicateId(config.id));
        }
        self.index.insert(config.id.clone(), self.agents.len());
        self.agents.push(config);
        Ok(())
    }

    /// Get an agent configuration by id
    pub fn get(&self, agent_id: &str) -> Option<&AgentConfig> {
        self.index.get(agent_id).map(|&i| &self.agents[i])
    }

    pub fn contains(&self, agent_id: &str) -> bool {
        self.index.contains_key(agent_id)
    }

    /// All configurations in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &AgentConfig> {
        self.agents.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.agents.iter().map(|a| a.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Ids must be matchable by the command marker syntax
fn is_valid_id(id: &str) -> bool {
    !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// JSON object entries kept in document order, duplicates included
struct OrderedAgents(Vec<(String, AgentConfig)>);

impl<'de> Deserialize<'de> for OrderedAgents {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct OrderedVisitor;

        impl<'de> Visitor<'de> for OrderedVisitor {
            type Value = OrderedAgents;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of agent id to agent configuration")
            }

            fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
            where
                A: MapAccess<'de>,
            {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((id, config)) = map.next_entry::<String, AgentConfig>()? {
                    entries.push((id, config));
                }
                Ok(OrderedAgents(entries))
            }
        }

        deserializer.deserialize_map(OrderedVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::agent::OutputType;
    use std::io::Write;

    #[test]
    fn test_builtin_registry() {
        let registry = AgentRegistry::builtin().unwrap();
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["calc", "code", "image"]);
        assert_eq!(registry.get("image").unwrap().output_type, OutputType::Image);
        assert_eq!(registry.get("calc").unwrap().output_type, OutputType::Text);
        assert!(registry.iter().all(|a| a.enabled_by_default));
    }

    #[test]
    fn test_document_order_is_preserved() {
        let registry = AgentRegistry::from_json(
            r#"{
                "zeta": { "description": "last letter" },
                "alpha": { "description": "first letter" },
                "mid_1": { "description": "middle" }
            }"#,
        )
        .unwrap();
        let ids: Vec<_> = registry.ids().collect();
        assert_eq!(ids, vec!["zeta", "alpha", "mid_1"]);
        assert_eq!(registry.get("alpha").unwrap().id, "alpha");
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let err = AgentRegistry::from_json(
            r#"{ "calc": { "description": "a" }, "calc": { "description": "b" } }"#,
        )
        .unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateId(id) if id == "calc"));
    }

    #[test]
    fn test_invalid_id_rejected() {
        let err =
            AgentRegistry::from_json(r#"{ "web-search": { "description": "x" } }"#).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidId(_)));

        let err = AgentRegistry::from_json(r#"{ "": { "description": "x" } }"#).unwrap_err();
        assert!(matches!(err, RegistryError::InvalidId(_)));
    }

    #[test]
    fn test_malformed_json_fails_fast() {
        assert!(matches!(
            AgentRegistry::from_json("[1, 2]"),
            Err(RegistryError::Parse(_))
        ));
        assert!(matches!(
            AgentRegistry::from_json(r#"{ "calc": { "enabledByDefault": true } }"#),
            Err(RegistryError::Parse(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "echo": {{ "description": "Echoes", "enabledByDefault": false }} }}"#
        )
        .unwrap();

        let registry = AgentRegistry::load(file.path()).unwrap();
        assert_eq!(registry.len(), 1);
        assert!(!registry.get("echo").unwrap().enabled_by_default);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AgentRegistry::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, RegistryError::Io { .. }));
    }
}
