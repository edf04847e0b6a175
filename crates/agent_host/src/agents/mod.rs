//! Built-in agents and the common executor contract.
//!
//! Every agent produces a typed `Result<AgentOutput, AgentFailure>`; the
//! conversion to in-band text (`❌ …`, `⏱️ …`) happens in [`Agent::execute`]
//! and nowhere earlier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

pub mod calc;
pub mod code;
pub mod image;

pub use calc::CalcAgent;
pub use code::CodeAgent;
pub use image::ImageAgent;

pub const FAILURE_MARK: &str = "❌";
pub const TIMEOUT_MARK: &str = "⏱️";

/// Successful agent result
#[derive(Debug, Clone, PartialEq)]
pub struct AgentOutput {
    /// Formatted payload as shown to the user
    pub text: String,
    /// Short inline value, when the agent has one (calc's number)
    pub value: Option<String>,
}

impl AgentOutput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            value: None,
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

/// Why an agent produced no result
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AgentFailure {
    #[error("Disallowed character in expression: {0:?}")]
    DisallowedCharacter(char),

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Forbidden code: use of `{0}`")]
    ForbiddenToken(String),

    #[error("Execution stopped: took longer than {}s", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("Could not start {0}")]
    Spawn(String),

    #[error("Upstream service failed: {0}")]
    Upstream(String),

    #[error("No content generated")]
    Empty,

    #[error("No image content generated")]
    NoImageContent,

    #[error("Image format error")]
    ImageFormat,

    #[error("Error in agent {0}")]
    MissingExecutor(String),
}

impl AgentFailure {
    pub fn marker(&self) -> &'static str {
        match self {
            AgentFailure::Timeout(_) => TIMEOUT_MARK,
            _ => FAILURE_MARK,
        }
    }

    /// In-band text form, e.g. `❌ Forbidden code: use of `socket``
    pub fn to_sentinel(&self) -> String {
        format!("{} {}", self.marker(), self)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, AgentFailure::Timeout(_))
    }
}

/// How a result is spliced into the reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presentation {
    /// `<expr> = <value>`
    Equation,
    /// `🖼️ Generated image:\n<markdown>`
    Image,
    /// `[Agent <id>]\n<result>`
    Labeled,
}

/// A pluggable handler bound to one agent id
#[async_trait]
pub trait Agent: Send + Sync {
    fn id(&self) -> &str;

    /// Run on an already sanitised argument
    async fn run(&self, argument: &str) -> Result<AgentOutput, AgentFailure>;

    /// Clean the raw marker argument before `run`
    fn sanitize(&self, argument: &str) -> String {
        argument.trim().to_string()
    }

    fn presentation(&self) -> Presentation {
        Presentation::Labeled
    }

    /// Text emitted for a failure
    fn failure_text(&self, failure: &AgentFailure) -> String {
        failure.to_sentinel()
    }

    /// Text contract: never fails, failures become sentinel text
    async fn execute(&self, argument: &str) -> String {
        match self.run(argument).await {
            Ok(output) => output.text,
            Err(failure) => self.failure_text(&failure),
        }
    }
}

/// The three agents shipped with the application
pub fn builtin_agents(
    settings: &shared::settings::AppSettings,
    chat: Arc<dyn providers::ChatBackend>,
    images: Arc<dyn providers::ImageBackend>,
    store: Option<Arc<dyn providers::ImageStore>>,
) -> Vec<Arc<dyn Agent>> {
    vec![
        Arc::new(CalcAgent::new()),
        Arc::new(CodeAgent::new(&settings.code)),
        Arc::new(ImageAgent::new(
            chat,
            images,
            store,
            settings.image.clone(),
            settings.ollama.translation_model.clone(),
        )),
    ]
}
