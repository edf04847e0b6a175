//! Agent dispatch with timeout handling and event reporting.
//!
//! The dispatcher owns the static id → executor table built at startup and
//! wraps every call with a caller-side timeout. Image agents additionally get
//! their output normalised into a markdown image reference.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::agent::AgentConfig;
use shared::events::AgentEvent;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::agents::image::image_markdown;
use crate::agents::{Agent, AgentFailure, AgentOutput, Presentation};
use crate::registry::AgentRegistry;

/// Default caller-side timeout (120 seconds)
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one dispatched invocation
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    pub execution_id: Uuid,
    /// Typed result; for image agents a failure keeps its original cause
    pub result: Result<AgentOutput, AgentFailure>,
    /// Text-boundary rendition of the result
    pub text: String,
    pub duration_ms: u64,
}

/// Static dispatch table plus the registry it serves
pub struct AgentDispatcher {
    registry: Arc<AgentRegistry>,
    agents: HashMap<String, Arc<dyn Agent>>,
    timeout: Duration,
    event_sender: Option<mpsc::UnboundedSender<AgentEvent>>,
}

impl AgentDispatcher {
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            agents: HashMap::new(),
            timeout: DEFAULT_TIMEOUT,
            event_sender: None,
        }
    }

    /// Register an executor under its own id
    pub fn register(&mut self, agent: Arc<dyn Agent>) {
        self.agents.insert(agent.id().to_string(), agent);
    }

    pub fn with_agents(mut self, agents: impl IntoIterator<Item = Arc<dyn Agent>>) -> Self {
        for agent in agents {
            self.register(agent);
        }
        self
    }

    pub fn with_events(mut self, event_sender: mpsc::UnboundedSender<AgentEvent>) -> Self {
        self.event_sender = Some(event_sender);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn registry(&self) -> &Arc<AgentRegistry> {
        &self.registry
    }

    pub fn config(&self, agent_id: &str) -> Option<&AgentConfig> {
        self.registry.get(agent_id)
    }

    /// Argument cleaned the way the agent wants it
    pub fn sanitize(&self, agent_id: &str, argument: &str) -> String {
        match self.agents.get(agent_id) {
            Some(agent) => agent.sanitize(argument),
            None => argument.trim().to_string(),
        }
    }

    pub fn presentation(&self, agent_id: &str) -> Presentation {
        if self.config(agent_id).is_some_and(|c| c.is_image()) {
            return Presentation::Image;
        }
        self.agents
            .get(agent_id)
            .map(|a| a.presentation())
            .unwrap_or(Presentation::Labeled)
    }

    /// Run one agent. `None` when the id is not in the registry.
    pub async fn execute_agent(&self, agent_id: &str, argument: &str) -> Option<DispatchOutcome> {
        let config = self.registry.get(agent_id)?;
        let execution_id = Uuid::new_v4();

        let Some(agent) = self.agents.get(agent_id) else {
            tracing::warn!("Agent {} is configured but has no executor", agent_id);
            let failure = AgentFailure::MissingExecutor(agent_id.to_string());
            return Some(DispatchOutcome {
                execution_id,
                text: failure.to_sentinel(),
                result: Err(failure),
                duration_ms: 0,
            });
        };

        self.send_event(AgentEvent::Started {
            execution_id,
            agent_id: agent_id.to_string(),
        });
        tracing::debug!("Dispatching {} with {:?}", agent_id, argument);

        let start = Instant::now();
        let result = match tokio::time::timeout(self.timeout, agent.run(argument)).await {
            Ok(result) => result,
            Err(_) => Err(AgentFailure::Timeout(self.timeout)),
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut text = match &result {
            Ok(output) => output.text.clone(),
            Err(failure) => agent.failure_text(failure),
        };

        let mut result = result;
        if config.is_image() {
            match normalize_image_output(&text) {
                Ok(markdown) => text = markdown,
                Err(failure) => {
                    text = failure.to_sentinel();
                    // keep the upstream cause when there is one
                    if result.is_ok() {
                        result = Err(failure);
                    }
                }
            }
        }

        match &result {
            Ok(_) => {
                tracing::info!("Agent {} completed in {}ms", agent_id, duration_ms);
                self.send_event(AgentEvent::Completed {
                    execution_id,
                    duration_ms,
                });
            }
            Err(failure) if failure.is_timeout() => {
                tracing::warn!("Agent {} timed out after {}ms", agent_id, duration_ms);
                self.send_event(AgentEvent::Timeout {
                    execution_id,
                    duration_ms,
                });
            }
            Err(failure) => {
                tracing::warn!("Agent {} failed: {}", agent_id, failure);
                self.send_event(AgentEvent::Failed {
                    execution_id,
                    error: failure.to_string(),
                    duration_ms,
                });
            }
        }

        Some(DispatchOutcome {
            execution_id,
            result,
            text,
            duration_ms,
        })
    }

    fn send_event(&self, event: AgentEvent) {
        if let Some(ref sender) = self.event_sender {
            // Receiver may have gone away
            let _ = sender.send(event);
        }
    }
}

/// Turn whatever an image agent returned into a markdown image reference
pub fn normalize_image_output(text: &str) -> Result<String, AgentFailure> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AgentFailure::NoImageContent);
    }
    if text.starts_with("![") && text.ends_with(')') && text.contains("](") {
        return Ok(text.to_string());
    }
    if text.starts_with("data:image/")
        || text.starts_with('/')
        || text.starts_with("http://")
        || text.starts_with("https://")
    {
        return Ok(image_markdown(text));
    }
    if STANDARD.decode(text).is_ok() {
        return Ok(image_markdown(&format!("data:image/png;base64,{}", text)));
    }
    Err(AgentFailure::ImageFormat)
}
