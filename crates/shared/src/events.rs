//! Event and record types for agent execution.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Agent execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Timeout,
}

/// Agent execution event for real-time status updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AgentEvent {
    /// Agent execution started
    Started {
        execution_id: Uuid,
        agent_id: String,
    },
    /// Agent execution completed successfully
    Completed {
        execution_id: Uuid,
        duration_ms: u64,
    },
    /// Agent execution failed
    Failed {
        execution_id: Uuid,
        error: String,
        duration_ms: u64,
    },
    /// Agent execution hit the caller-side timeout
    Timeout {
        execution_id: Uuid,
        duration_ms: u64,
    },
}

impl AgentEvent {
    pub fn execution_id(&self) -> Uuid {
        match self {
            AgentEvent::Started { execution_id, .. } => *execution_id,
            AgentEvent::Completed { execution_id, .. } => *execution_id,
            AgentEvent::Failed { execution_id, .. } => *execution_id,
            AgentEvent::Timeout { execution_id, .. } => *execution_id,
        }
    }
}

/// Record of one agent invocation inside a reply
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentExecution {
    pub id: Uuid,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
    /// Argument after sanitisation, as passed to the executor
    pub argument: String,
    /// Text that replaced the raw marker
    pub rendered: Option<String>,
    pub status: ExecutionStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
}

impl AgentExecution {
    pub fn new(agent_id: impl Into<String>, argument: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
            argument: argument.into(),
            rendered: None,
            status: ExecutionStatus::Running,
            duration_ms: 0,
            error: None,
        }
    }

    pub fn complete(mut self, rendered: impl Into<String>, duration_ms: u64) -> Self {
        self.status = ExecutionStatus::Completed;
        self.rendered = Some(rendered.into());
        self.duration_ms = duration_ms;
        self
    }

    pub fn fail(
        mut self,
        error: impl Into<String>,
        rendered: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        self.status = ExecutionStatus::Failed;
        self.error = Some(error.into());
        self.rendered = Some(rendered.into());
        self.duration_ms = duration_ms;
        self
    }

    pub fn timeout(mut self, rendered: impl Into<String>, duration_ms: u64) -> Self {
        self.status = ExecutionStatus::Timeout;
        self.error = Some("Execution timed out".to_string());
        self.rendered = Some(rendered.into());
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_execution_lifecycle() {
        let exec = AgentExecution::new("calc", "2 + 2");
        assert_eq!(exec.status, ExecutionStatus::Running);

        let done = exec.complete("2 + 2 = 4", 3);
        assert_eq!(done.status, ExecutionStatus::Completed);
        assert_eq!(done.rendered.as_deref(), Some("2 + 2 = 4"));
        assert_eq!(done.duration_ms, 3);
    }

    #[test]
    fn test_execution_timeout_sets_error() {
        let exec = AgentExecution::new("code", "while True: pass").timeout("⏱️ stopped", 3000);
        assert_eq!(exec.status, ExecutionStatus::Timeout);
        assert!(exec.error.is_some());
    }

    #[test]
    fn test_event_execution_id() {
        let id = Uuid::new_v4();
        let event = AgentEvent::Failed {
            execution_id: id,
            error: "boom".into(),
            duration_ms: 1,
        };
        assert_eq!(event.execution_id(), id);
    }
}
