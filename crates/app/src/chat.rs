//! Terminal front end: interactive loop, one-shot ask and listings.

use agent_host::instructions::partition_agents;
use agent_host::{AgentHost, ChatSession, ReplyMode, SendOutcome};
use anyhow::Result;
use shared::events::AgentEvent;
use shared::profile::AssistantProfile;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// One line typed at the chat prompt
#[derive(Debug, PartialEq)]
pub enum Input<'a> {
    Empty,
    Quit,
    NewChat,
    Image(&'a str),
    Text(&'a str),
}

pub fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    match line.split_once(char::is_whitespace) {
        _ if line == "/quit" || line == "/exit" => Input::Quit,
        _ if line == "/new" => Input::NewChat,
        Some(("/image", prompt)) if !prompt.trim().is_empty() => Input::Image(prompt.trim()),
        _ if line == "/image" => Input::Empty,
        _ => Input::Text(line),
    }
}

/// Print agent progress to stderr while a reply is being processed
pub fn spawn_event_printer(mut events: mpsc::UnboundedReceiver<AgentEvent>) {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                AgentEvent::Started { agent_id, .. } => eprintln!("⚙️  running --{}", agent_id),
                AgentEvent::Completed { duration_ms, .. } => eprintln!("✅ done in {}ms", duration_ms),
                AgentEvent::Failed { error, .. } => eprintln!("❌ {}", error),
                AgentEvent::Timeout { duration_ms, .. } => {
                    eprintln!("⏱️  gave up after {}ms", duration_ms)
                }
            }
        }
    });
}

fn print_outcome(outcome: &SendOutcome) {
    println!("{}\n", outcome.reply);
    if outcome.used_context() {
        println!("📄 Context: {}\n", outcome.referenced_documents.join(", "));
    }
}

async fn send_and_print(session: &ChatSession, prompt: &str, mode: ReplyMode) {
    match session.send(prompt, mode).await {
        Ok(outcome) => print_outcome(&outcome),
        Err(e) => eprintln!("{}", e),
    }
}

pub async fn run_chat(session: ChatSession) -> Result<()> {
    println!(
        "🤖 {} ({}) - /new for a new chat, /image <prompt> for a picture, /quit to leave",
        session.profile().display_name(),
        session.model()
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        match parse_input(&line) {
            Input::Empty => continue,
            Input::Quit => break,
            Input::NewChat => {
                session.new_chat();
                println!("🧹 New chat\n");
            }
            Input::Image(prompt) => send_and_print(&session, prompt, ReplyMode::Image).await,
            Input::Text(prompt) => send_and_print(&session, prompt, ReplyMode::Text).await,
        }
    }
    Ok(())
}

pub async fn ask(session: ChatSession, prompt: &str, mode: ReplyMode) -> Result<()> {
    let outcome = session.send(prompt, mode).await?;
    print_outcome(&outcome);
    Ok(())
}

pub fn list_agents(host: &AgentHost, profile: &AssistantProfile) {
    let partition = partition_agents(host.registry(), &profile.agents);
    println!("Agents for {}:", profile.display_name());
    for (state, agents) in [("on ", &partition.active), ("off", &partition.inactive)] {
        for agent in agents {
            println!(
                "  [{}] --{:<8} {:<5}  {}",
                state,
                agent.config.id,
                if agent.config.is_image() { "image" } else { "text" },
                agent.config.description
            );
        }
    }
    if !profile.documents.is_empty() {
        println!("\nDocuments:");
        for doc in &profile.documents {
            println!("  📄 {}: {}", doc.name, doc.preview());
        }
    }
    println!("\n{}", host.instruction_prompt(&profile.agents));
}

pub async fn list_models(host: &AgentHost) -> Result<()> {
    let models = host.list_models().await?;
    if models.is_empty() {
        println!("No models installed on {}", host.settings.ollama.base_url);
    }
    for model in models {
        println!("{}", model);
    }
    Ok(())
}
