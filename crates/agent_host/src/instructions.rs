//! Instruction block telling the model which agent commands exist.
//!
//! The block is appended to the assistant's system prompt. Active agents are
//! listed with their description and extended instructions; disabled ones
//! are listed briefly so the model can offer them to the user.

use shared::agent::{AgentConfig, AgentOverrides};

use crate::registry::AgentRegistry;

/// The worked example shown in every instruction block
pub const EXAMPLE_MARKER: &str = "--image a panda in the snow";

/// An agent with its per-assistant settings resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAgent<'a> {
    pub config: &'a AgentConfig,
    pub enabled: bool,
    /// Override prompt if set, otherwise the registry's instructions
    pub instructions: Option<&'a str>,
}

/// Registry split by enablement, both halves in registry order
#[derive(Debug, Clone, Default)]
pub struct AgentPartition<'a> {
    pub active: Vec<ResolvedAgent<'a>>,
    pub inactive: Vec<ResolvedAgent<'a>>,
}

/// Resolve one agent against the overrides (override, then default)
pub fn resolve<'a>(config: &'a AgentConfig, overrides: &'a AgentOverrides) -> ResolvedAgent<'a> {
    let ov = overrides.get(&config.id);
    let enabled = ov
        .and_then(|o| o.enabled)
        .unwrap_or(config.enabled_by_default);
    let instructions = ov
        .and_then(|o| o.prompt.as_deref())
        .filter(|p| !p.trim().is_empty())
        .or(config.system_instructions.as_deref())
        .filter(|p| !p.trim().is_empty());
    ResolvedAgent {
        config,
        enabled,
        instructions,
    }
}

pub fn partition_agents<'a>(
    registry: &'a AgentRegistry,
    overrides: &'a AgentOverrides,
) -> AgentPartition<'a> {
    let mut partition = AgentPartition::default();
    for config in registry.iter() {
        let resolved = resolve(config, overrides);
        if resolved.enabled {
            partition.active.push(resolved);
        } else {
            partition.inactive.push(resolved);
        }
    }
    partition
}

/// Whether `agent_id` is enabled for an assistant with these overrides
pub fn is_enabled(registry: &AgentRegistry, overrides: &AgentOverrides, agent_id: &str) -> bool {
    registry
        .get(agent_id)
        .map(|config| resolve(config, overrides).enabled)
        .unwrap_or(false)
}

/// Render the instruction block; empty when the registry is empty
pub fn build_instruction_prompt(registry: &AgentRegistry, overrides: &AgentOverrides) -> String {
    if registry.is_empty() {
        return String::new();
    }

    let partition = partition_agents(registry, overrides);

    let active = if partition.active.is_empty() {
        "(none)".to_string()
    } else {
        partition
            .active
            .iter()
            .map(render_active)
            .collect::<Vec<_>>()
            .join("\n")
    };

    let mut block = format!(
        r#"## Agents
You can hand a task to a helper agent by writing a line of the form:

--<agentId> <argument>

The command must start the line, the argument ends at the end of that line, and the line is replaced by the agent's result before the user sees your answer. Use one line per command.

Example:

{example}

Available agents:
{active}"#,
        example = EXAMPLE_MARKER,
        active = active,
    );

    if !partition.inactive.is_empty() {
        let inactive = partition
            .inactive
            .iter()
            .map(|a| format!("- --{} : {}", a.config.id, a.config.description))
            .collect::<Vec<_>>()
            .join("\n");
        block.push_str(&format!(
            "\n\nDisabled agents (do not call them; you may tell the user they can be enabled if they would help):\n{}",
            inactive
        ));
    }

    block
}

fn render_active(agent: &ResolvedAgent<'_>) -> String {
    let mut line = format!("- --{} : {}", agent.config.id, agent.config.description);
    if let Some(instructions) = agent.instructions {
        for l in instructions.trim().lines() {
            line.push_str("\n  ");
            line.push_str(l);
        }
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::extract_commands;
    use shared::agent::AgentOverride;

    fn three_agents() -> AgentRegistry {
        AgentRegistry::from_json(
            r#"{
                "calc": { "description": "Arithmetic", "systemInstructions": "Only the expression." },
                "code": { "description": "Python snippets" },
                "image": { "description": "Pictures", "outputType": "image" }
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_one_disabled_partitions_two_and_one() {
        let registry = three_agents();
        let mut overrides = AgentOverrides::new();
        overrides.insert("code".into(), AgentOverride::enabled(false));

        for _ in 0..5 {
            let partition = partition_agents(&registry, &overrides);
            let active: Vec<_> = partition.active.iter().map(|a| a.config.id.as_str()).collect();
            let inactive: Vec<_> =
                partition.inactive.iter().map(|a| a.config.id.as_str()).collect();
            assert_eq!(active, vec!["calc", "image"]);
            assert_eq!(inactive, vec!["code"]);
        }
    }

    #[test]
    fn test_output_is_deterministic() {
        let registry = three_agents();
        let mut overrides = AgentOverrides::new();
        overrides.insert("image".into(), AgentOverride::enabled(false));
        overrides.insert("calc".into(), AgentOverride::default().with_prompt("Be exact."));

        let first = build_instruction_prompt(&registry, &overrides);
        for _ in 0..10 {
            assert_eq!(build_instruction_prompt(&registry, &overrides), first);
        }
    }

    #[test]
    fn test_block_contents() {
        let registry = three_agents();
        let mut overrides = AgentOverrides::new();
        overrides.insert("image".into(), AgentOverride::enabled(false));

        let block = build_instruction_prompt(&registry, &overrides);
        assert!(block.contains("--<agentId> <argument>"));
        assert!(block.contains(EXAMPLE_MARKER));
        assert!(block.contains("- --calc : Arithmetic\n  Only the expression."));
        assert!(block.contains("- --code : Python snippets"));

        let (available, disabled) = block.split_once("Disabled agents").unwrap();
        assert!(!available.contains("--image : Pictures"));
        assert!(disabled.contains("- --image : Pictures"));
    }

    #[test]
    fn test_override_prompt_replaces_instructions() {
        let registry = three_agents();
        let mut overrides = AgentOverrides::new();
        overrides.insert("calc".into(), AgentOverride::default().with_prompt("Use integers."));

        let block = build_instruction_prompt(&registry, &overrides);
        assert!(block.contains("Use integers."));
        assert!(!block.contains("Only the expression."));
    }

    #[test]
    fn test_disabled_by_default_and_enabled_by_override() {
        let registry = AgentRegistry::from_json(
            r#"{ "secret": { "description": "Hidden", "enabledByDefault": false } }"#,
        )
        .unwrap();
        let none = AgentOverrides::new();
        assert!(!is_enabled(&registry, &none, "secret"));

        let mut overrides = AgentOverrides::new();
        overrides.insert("secret".into(), AgentOverride::enabled(true));
        assert!(is_enabled(&registry, &overrides, "secret"));
        assert!(!is_enabled(&registry, &overrides, "unknown"));
    }

    #[test]
    fn test_empty_registry_renders_nothing() {
        assert!(build_instruction_prompt(&AgentRegistry::new(), &AgentOverrides::new()).is_empty());
    }

    #[test]
    fn test_documented_example_round_trips_through_extractor() {
        let registry = AgentRegistry::builtin().unwrap();
        let block = build_instruction_prompt(&registry, &AgentOverrides::new());
        assert!(block.contains(EXAMPLE_MARKER));

        let reply = format!("Here you go:\n{}\n", EXAMPLE_MARKER);
        let found = extract_commands(&reply);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].agent_id, "image");
        assert_eq!(found[0].argument_text, "a panda in the snow");
        assert!(registry.contains(&found[0].agent_id));
    }
}
