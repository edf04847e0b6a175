//! One chat conversation with an assistant profile.
//!
//! A send builds the system prompt (profile prompt plus the agent
//! instruction block), prefixes the prompt with the profile's document
//! context, asks the model once and post-processes the reply. Only one send
//! may be in flight; whatever happens, the history receives an assistant
//! message.

use parking_lot::Mutex;
use providers::ChatBackend;
use shared::agent_api::ChatMessage;
use shared::events::AgentExecution;
use shared::profile::AssistantProfile;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::dispatch::AgentDispatcher;
use crate::instructions::build_instruction_prompt;
use crate::postprocess::ReplyPostProcessor;

pub const APOLOGY: &str = "❌ Something went wrong. Please try again.";
pub const IMAGE_APOLOGY: &str = "⚠️ Image generation failed. Please try again.";

/// Agent used for direct image requests
const IMAGE_AGENT: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReplyMode {
    #[default]
    Text,
    /// Send the prompt straight to the image agent
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    #[error("A message is already being sent")]
    Busy,
    #[error("Prompt is empty")]
    EmptyPrompt,
}

/// What one send produced
#[derive(Debug, Clone, Default)]
pub struct SendOutcome {
    /// Assistant message as appended to the history
    pub reply: String,
    pub executions: Vec<AgentExecution>,
    pub referenced_documents: Vec<String>,
    /// True when `reply` is an apology
    pub failed: bool,
}

impl SendOutcome {
    fn apology(text: &str) -> Self {
        Self {
            reply: text.to_string(),
            failed: true,
            ..Self::default()
        }
    }

    pub fn used_context(&self) -> bool {
        !self.referenced_documents.is_empty()
    }
}

/// Clears the busy flag when a send finishes, however it finishes
struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct ChatSession {
    chat: Arc<dyn ChatBackend>,
    dispatcher: Arc<AgentDispatcher>,
    postprocessor: ReplyPostProcessor,
    profile: AssistantProfile,
    model: String,
    history_limit: usize,
    history: Mutex<Vec<ChatMessage>>,
    busy: AtomicBool,
}

impl ChatSession {
    pub fn new(
        chat: Arc<dyn ChatBackend>,
        dispatcher: Arc<AgentDispatcher>,
        profile: AssistantProfile,
        model: impl Into<String>,
        history_limit: usize,
    ) -> Self {
        let session = Self {
            chat,
            postprocessor: ReplyPostProcessor::new(dispatcher.clone()),
            dispatcher,
            profile,
            model: model.into(),
            history_limit,
            history: Mutex::new(Vec::new()),
            busy: AtomicBool::new(false),
        };
        session.new_chat();
        session
    }

    pub fn profile(&self) -> &AssistantProfile {
        &self.profile
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Profile prompt followed by the agent instruction block
    pub fn system_prompt(&self) -> String {
        let block = build_instruction_prompt(self.dispatcher.registry(), &self.profile.agents);
        let base = self.profile.system_prompt.trim();
        match (base.is_empty(), block.is_empty()) {
            (true, _) => block,
            (false, true) => base.to_string(),
            (false, false) => format!("{}\n\n{}", base, block),
        }
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.history.lock().clone()
    }

    /// Start over with only the system prompt in the history
    pub fn new_chat(&self) {
        let system = self.system_prompt();
        let mut history = self.history.lock();
        history.clear();
        if !system.is_empty() {
            history.push(ChatMessage::system(system));
        }
    }

    pub async fn send(&self, prompt: &str, mode: ReplyMode) -> Result<SendOutcome, SendError> {
        if prompt.trim().is_empty() {
            return Err(SendError::EmptyPrompt);
        }
        if self
            .busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SendError::Busy);
        }
        let _guard = BusyGuard(&self.busy);

        let outcome = match mode {
            ReplyMode::Text => self.send_text(prompt).await,
            ReplyMode::Image => self.send_image(prompt).await,
        };
        self.append_exchange(prompt, &outcome.reply);
        Ok(outcome)
    }

    async fn send_text(&self, prompt: &str) -> SendOutcome {
        let raw = match self.ask_model(prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!("Chat request failed: {:#}", e);
                return SendOutcome::apology(APOLOGY);
            }
        };

        let processed = self
            .postprocessor
            .process(&raw, &self.profile.agents, &self.profile.documents)
            .await;
        SendOutcome {
            reply: processed.text,
            executions: processed.executions,
            referenced_documents: processed.referenced_documents,
            failed: false,
        }
    }

    async fn ask_model(&self, prompt: &str) -> anyhow::Result<String> {
        let mut messages = Vec::with_capacity(2);
        let system = self.system_prompt();
        if !system.is_empty() {
            messages.push(ChatMessage::system(system));
        }
        let content = match self.profile.context_text() {
            Some(context) => format!("{}\n\n{}", context, prompt),
            None => prompt.to_string(),
        };
        messages.push(ChatMessage::user(content));

        tracing::debug!("Asking {} ({} messages)", self.model, messages.len());
        self.chat.generate(&self.model, messages).await
    }

    async fn send_image(&self, prompt: &str) -> SendOutcome {
        match self.dispatcher.execute_agent(IMAGE_AGENT, prompt.trim()).await {
            Some(outcome) if outcome.result.is_ok() => SendOutcome {
                reply: outcome.text,
                ..SendOutcome::default()
            },
            Some(outcome) => {
                tracing::error!("Image request failed: {}", outcome.text);
                SendOutcome::apology(IMAGE_APOLOGY)
            }
            None => {
                tracing::error!("No image agent is configured");
                SendOutcome::apology(IMAGE_APOLOGY)
            }
        }
    }

    /// Keep the system message and the last `history_limit` messages after it,
    /// then add the new pair
    fn append_exchange(&self, prompt: &str, reply: &str) {
        let mut history = self.history.lock();
        let pinned = usize::from(history.first().is_some_and(|m| m.role == "system"));
        let excess = (history.len() - pinned).saturating_sub(self.history_limit);
        history.drain(pinned..pinned + excess);
        history.push(ChatMessage::user(prompt));
        history.push(ChatMessage::assistant(reply));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{Agent, AgentFailure, AgentOutput};
    use crate::registry::AgentRegistry;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use shared::agent::{AgentConfig, OutputType};
    use shared::profile::ContextDocument;
    use tokio::sync::Notify;

    struct ScriptedChat {
        reply: Option<String>,
        seen: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedChat {
        fn replying(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: Some(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                reply: None,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl ChatBackend for ScriptedChat {
        async fn generate(&self, _model: &str, messages: Vec<ChatMessage>) -> Result<String> {
            self.seen.lock().push(messages);
            self.reply
                .clone()
                .ok_or_else(|| anyhow!("Ollama error: 500 Internal Server Error"))
        }
    }

    #[derive(Default)]
    struct GatedChat {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl ChatBackend for GatedChat {
        async fn generate(&self, _model: &str, _messages: Vec<ChatMessage>) -> Result<String> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok("done".into())
        }
    }

    struct Painter {
        fail: bool,
    }

    #[async_trait]
    impl Agent for Painter {
        fn id(&self) -> &str {
            "image"
        }

        async fn run(&self, _argument: &str) -> Result<AgentOutput, AgentFailure> {
            if self.fail {
                Err(AgentFailure::Upstream("connection refused".into()))
            } else {
                Ok(AgentOutput::text("![generated image](/uploads/7.png)"))
            }
        }

        fn failure_text(&self, _failure: &AgentFailure) -> String {
            String::new()
        }
    }

    fn empty_dispatcher() -> Arc<AgentDispatcher> {
        Arc::new(AgentDispatcher::new(Arc::new(AgentRegistry::new())))
    }

    fn image_dispatcher(fail: bool) -> Arc<AgentDispatcher> {
        let mut registry = AgentRegistry::new();
        registry
            .register(AgentConfig::new("image", "Pictures").with_output_type(OutputType::Image))
            .unwrap();
        let painter: Arc<dyn Agent> = Arc::new(Painter { fail });
        Arc::new(AgentDispatcher::new(Arc::new(registry)).with_agents([painter]))
    }

    #[tokio::test]
    async fn test_prompt_assembly() {
        let chat = ScriptedChat::replying("Hi!");
        let mut profile = AssistantProfile::new("helper", "Helper");
        profile.system_prompt = "You are terse.".into();
        profile.documents = vec![ContextDocument::new(1, "a.txt", "Alpha facts")];
        let dispatcher = Arc::new(AgentDispatcher::new(Arc::new(AgentRegistry::builtin().unwrap())));
        let session = ChatSession::new(chat.clone(), dispatcher, profile, "mistral", 28);

        let outcome = session.send("hello", ReplyMode::Text).await.unwrap();
        assert_eq!(outcome.reply, "Hi!");

        let seen = chat.seen.lock();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].role, "system");
        assert!(seen[0][0].content.starts_with("You are terse.\n\n## Agents"));
        assert_eq!(seen[0][1], ChatMessage::user("Alpha facts\n\nhello"));
    }

    #[tokio::test]
    async fn test_no_system_message_when_nothing_to_say() {
        let chat = ScriptedChat::replying("ok");
        let session = ChatSession::new(
            chat.clone(),
            empty_dispatcher(),
            AssistantProfile::default(),
            "gemma3:4b",
            28,
        );
        session.send("ping", ReplyMode::Text).await.unwrap();
        assert_eq!(chat.seen.lock()[0], vec![ChatMessage::user("ping")]);
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_failure_becomes_apology() {
        let session = ChatSession::new(
            ScriptedChat::failing(),
            empty_dispatcher(),
            AssistantProfile::default(),
            "mistral",
            28,
        );
        let outcome = session.send("hello", ReplyMode::Text).await.unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.reply, APOLOGY);
        assert_eq!(
            session.history().last(),
            Some(&ChatMessage::assistant(APOLOGY))
        );
        assert!(!session.is_busy());
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected() {
        let session = ChatSession::new(
            ScriptedChat::replying("x"),
            empty_dispatcher(),
            AssistantProfile::default(),
            "mistral",
            28,
        );
        assert_eq!(
            session.send("   ", ReplyMode::Text).await.unwrap_err(),
            SendError::EmptyPrompt
        );
        assert!(session.history().is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_send_rejected() {
        let chat = Arc::new(GatedChat::default());
        let session = Arc::new(ChatSession::new(
            chat.clone(),
            empty_dispatcher(),
            AssistantProfile::default(),
            "mistral",
            28,
        ));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.send("first", ReplyMode::Text).await })
        };
        chat.entered.notified().await;

        assert!(session.is_busy());
        assert_eq!(
            session.send("second", ReplyMode::Text).await.unwrap_err(),
            SendError::Busy
        );

        chat.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome.reply, "done");
        assert!(!session.is_busy());
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_trimmed() {
        let session = ChatSession::new(
            ScriptedChat::replying("ok"),
            empty_dispatcher(),
            AssistantProfile::default(),
            "mistral",
            4,
        );
        for i in 0..5 {
            session
                .send(&format!("message {}", i), ReplyMode::Text)
                .await
                .unwrap();
        }
        let history = session.history();
        assert_eq!(history.len(), 6);
        assert_eq!(history[0], ChatMessage::user("message 2"));
        assert_eq!(history[5], ChatMessage::assistant("ok"));
    }

    #[tokio::test]
    async fn test_history_trim_keeps_system_prompt() {
        let mut profile = AssistantProfile::default();
        profile.system_prompt = "Be brief.".into();
        let session = ChatSession::new(
            ScriptedChat::replying("ok"),
            empty_dispatcher(),
            profile,
            "mistral",
            4,
        );
        for i in 0..5 {
            session
                .send(&format!("message {}", i), ReplyMode::Text)
                .await
                .unwrap();
        }
        let history = session.history();
        assert_eq!(history.len(), 7);
        assert_eq!(history[0], ChatMessage::system("Be brief."));
        assert_eq!(history[1], ChatMessage::user("message 2"));
        assert_eq!(history[6], ChatMessage::assistant("ok"));
    }

    #[tokio::test]
    async fn test_new_chat_resets_to_system_prompt() {
        let mut profile = AssistantProfile::default();
        profile.system_prompt = "Be kind.".into();
        let session = ChatSession::new(
            ScriptedChat::replying("ok"),
            empty_dispatcher(),
            profile,
            "mistral",
            28,
        );
        session.send("hi", ReplyMode::Text).await.unwrap();
        assert_eq!(session.history().len(), 3);

        session.new_chat();
        assert_eq!(session.history(), vec![ChatMessage::system("Be kind.")]);
    }

    #[tokio::test]
    async fn test_image_mode() {
        let session = ChatSession::new(
            ScriptedChat::replying("unused"),
            image_dispatcher(false),
            AssistantProfile::default(),
            "mistral",
            28,
        );
        let outcome = session.send("a lighthouse", ReplyMode::Image).await.unwrap();
        assert_eq!(outcome.reply, "![generated image](/uploads/7.png)");

        let session = ChatSession::new(
            ScriptedChat::replying("unused"),
            image_dispatcher(true),
            AssistantProfile::default(),
            "mistral",
            28,
        );
        let outcome = session.send("a lighthouse", ReplyMode::Image).await.unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.reply, IMAGE_APOLOGY);
    }
}
