//! Command marker extraction from model output.
//!
//! A marker is `--` followed by an agent id (`[A-Za-z0-9_]+`), at least one
//! whitespace character, and then the rest of the line. The argument is
//! returned untrimmed; cleaning it up is the executor's business.

use regex::Regex;
use shared::agent::CommandInvocation;
use std::sync::LazyLock;

static MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"--([A-Za-z0-9_]+)\s+([^\n]+)").expect("command marker pattern is valid")
});

/// Every marker in `text`, left to right, duplicates kept
pub fn extract_commands(text: &str) -> Vec<CommandInvocation> {
    MARKER_RE
        .captures_iter(text)
        .filter_map(|cap| {
            let raw = cap.get(0)?;
            let agent_id = cap.get(1)?;
            let argument = cap.get(2)?;
            Some(CommandInvocation {
                agent_id: agent_id.as_str().to_string(),
                argument_text: argument.as_str().to_string(),
                raw_match_text: raw.as_str().to_string(),
            })
        })
        .collect()
}

/// True when any invocation targets `agent_id`
pub fn has_marker_for(invocations: &[CommandInvocation], agent_id: &str) -> bool {
    invocations.iter().any(|inv| inv.agent_id == agent_id)
}
