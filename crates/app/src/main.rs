mod chat;
mod cli;
mod config;

use agent_host::{AgentHost, ReplyMode};
use anyhow::{bail, Result};
use clap::Parser;
use shared::profile::AssistantProfile;
use shared::settings::AppSettings;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};

/// Profile named on the command line, else the configured default, else a blank one
fn select_profile(settings: &AppSettings, requested: Option<&str>) -> Result<AssistantProfile> {
    match settings.profile(requested) {
        Some(profile) => Ok(profile.clone()),
        None => match requested {
            Some(id) => bail!("Unknown profile {:?}", id),
            None => Ok(AssistantProfile::new("default", "Assistant")),
        },
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so replies on stdout stay clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = config::load_settings(cli.config.as_deref())?;
    let profile = select_profile(&settings, cli.profile.as_deref())?;

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let host = AgentHost::new(settings, Some(events_tx))?;
    tracing::debug!("{} agents registered", host.registry().len());

    match cli.command {
        Commands::Agents => chat::list_agents(&host, &profile),
        Commands::Models => chat::list_models(&host).await?,
        Commands::Chat => {
            chat::spawn_event_printer(events_rx);
            chat::run_chat(host.session(profile, cli.model.as_deref())).await?;
        }
        Commands::Ask { image, prompt } => {
            chat::spawn_event_printer(events_rx);
            let mode = if image {
                ReplyMode::Image
            } else {
                ReplyMode::Text
            };
            let session = host.session(profile, cli.model.as_deref());
            chat::ask(session, &prompt.join(" "), mode).await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_profile() {
        let mut settings = AppSettings::default();
        assert_eq!(select_profile(&settings, None).unwrap().name, "Assistant");
        assert!(select_profile(&settings, Some("chef")).is_err());

        settings.profiles.push(AssistantProfile::new("chef", "Chef"));
        assert_eq!(select_profile(&settings, Some("chef")).unwrap().name, "Chef");
        assert_eq!(select_profile(&settings, None).unwrap().id, "chef");
    }
}
