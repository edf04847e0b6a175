//! Reply post-processing: find agent commands in a model reply, run them and
//! splice the results back in.
//!
//! Substitution is a single left-to-right pass over the reply: every
//! occurrence of an executed marker's raw text is swapped for its rendering,
//! and rendered output is never scanned again. When the same raw text appears
//! more than once, every occurrence receives the result of the first one and
//! the agent runs once. Where two raw texts start at the same offset the
//! longer one wins.

use shared::agent::AgentOverrides;
use shared::events::AgentExecution;
use shared::profile::ContextDocument;
use std::collections::HashSet;
use std::sync::Arc;

use crate::agents::{AgentFailure, Presentation};
use crate::dispatch::{AgentDispatcher, DispatchOutcome};
use crate::extractor::extract_commands;
use crate::heuristics::{augment_with_implicit_markers, strip_generated_images, strip_reasoning};
use crate::instructions::is_enabled;

/// Final reply plus what happened while producing it
#[derive(Debug, Clone, Default)]
pub struct ProcessedReply {
    pub text: String,
    pub executions: Vec<AgentExecution>,
    /// Names of context documents the reply mentions
    pub referenced_documents: Vec<String>,
}

impl ProcessedReply {
    pub fn used_context(&self) -> bool {
        !self.referenced_documents.is_empty()
    }
}

pub struct ReplyPostProcessor {
    dispatcher: Arc<AgentDispatcher>,
}

impl ReplyPostProcessor {
    pub fn new(dispatcher: Arc<AgentDispatcher>) -> Self {
        Self { dispatcher }
    }

    pub async fn process(
        &self,
        raw: &str,
        overrides: &AgentOverrides,
        documents: &[ContextDocument],
    ) -> ProcessedReply {
        let registry = self.dispatcher.registry();

        let cleaned = strip_reasoning(raw);
        let view = strip_generated_images(&cleaned);
        let explicit = extract_commands(&cleaned);
        let text = augment_with_implicit_markers(&cleaned, &view, &explicit, |id| {
            is_enabled(registry, overrides, id)
        });

        let invocations = extract_commands(&text);
        tracing::debug!("Found {} agent command(s) in reply", invocations.len());

        let mut substituted = HashSet::new();
        let mut replacements = Vec::new();
        let mut executions = Vec::new();

        for invocation in invocations {
            if !registry.contains(&invocation.agent_id) {
                tracing::debug!("Leaving unknown agent marker --{}", invocation.agent_id);
                continue;
            }
            if !substituted.insert(invocation.raw_match_text.clone()) {
                continue;
            }

            let argument = self
                .dispatcher
                .sanitize(&invocation.agent_id, &invocation.argument_text);
            let Some(outcome) = self
                .dispatcher
                .execute_agent(&invocation.agent_id, &argument)
                .await
            else {
                continue;
            };

            let rendered = render(
                self.dispatcher.presentation(&invocation.agent_id),
                &invocation.agent_id,
                &argument,
                &outcome,
            );
            executions.push(record(&invocation.agent_id, &argument, &outcome, rendered.clone()));
            replacements.push((invocation.raw_match_text, rendered));
        }
        let text = splice(&text, &replacements);

        ProcessedReply {
            referenced_documents: referenced_documents(&text, documents),
            text,
            executions,
        }
    }
}

/// Replace each `(raw, rendered)` occurrence in one pass over `text`
fn splice(text: &str, replacements: &[(String, String)]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut pos = 0;
    loop {
        let next = replacements
            .iter()
            .filter_map(|(raw, rendered)| {
                text[pos..].find(raw.as_str()).map(|at| (pos + at, raw, rendered))
            })
            .min_by(|a, b| a.0.cmp(&b.0).then(b.1.len().cmp(&a.1.len())));
        let Some((at, raw, rendered)) = next else {
            out.push_str(&text[pos..]);
            return out;
        };
        out.push_str(&text[pos..at]);
        out.push_str(rendered);
        pos = at + raw.len();
    }
}

fn render(
    presentation: Presentation,
    agent_id: &str,
    argument: &str,
    outcome: &DispatchOutcome,
) -> String {
    match (presentation, &outcome.result) {
        (Presentation::Equation, Ok(output)) => format!(
            "{} = {}",
            argument,
            output.value.as_deref().unwrap_or(&output.text)
        ),
        (Presentation::Equation, Err(_)) => format!("{} = {}", argument, outcome.text),
        (Presentation::Image, Ok(_)) => format!("🖼️ Generated image:\n{}", outcome.text),
        (Presentation::Image, Err(_)) => outcome.text.clone(),
        (Presentation::Labeled, _) => format!("[Agent {}]\n{}", agent_id, outcome.text),
    }
}

fn record(
    agent_id: &str,
    argument: &str,
    outcome: &DispatchOutcome,
    rendered: String,
) -> AgentExecution {
    let mut execution = AgentExecution::new(agent_id, argument);
    execution.id = outcome.execution_id;
    match &outcome.result {
        Ok(_) => execution.complete(rendered, outcome.duration_ms),
        Err(AgentFailure::Timeout(_)) => execution.timeout(rendered, outcome.duration_ms),
        Err(failure) => execution.fail(failure.to_string(), rendered, outcome.duration_ms),
    }
}

/// Documents whose name (or name without extension) the reply mentions
fn referenced_documents(text: &str, documents: &[ContextDocument]) -> Vec<String> {
    let haystack = text.to_lowercase();
    documents
        .iter()
        .filter(|doc| {
            let name = doc.name.trim().to_lowercase();
            let stem = name.rsplit_once('.').map(|(s, _)| s).unwrap_or(&name);
            (!name.is_empty() && haystack.contains(&name))
                || (stem.chars().count() >= 3 && haystack.contains(stem))
        })
        .map(|doc| doc.name.clone())
        .collect()
}
