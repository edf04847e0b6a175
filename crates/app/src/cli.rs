//! Command-line definition for `localchat`.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Local Chat - talk to a local model that can call helper agents
#[derive(Parser, Debug)]
#[command(name = "localchat")]
#[command(about = "Chat with a local model; agent commands in its replies are run and substituted")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Settings file (defaults to settings.json in the config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Assistant profile id
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Model name, overriding the profile and settings
    #[arg(long, global = true)]
    pub model: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Commands {
    /// Interactive chat (/new, /image <prompt>, /quit)
    Chat,
    /// Send one prompt and print the reply
    Ask {
        /// Generate an image from the prompt instead of asking the model
        #[arg(long)]
        image: bool,

        #[arg(required = true, trailing_var_arg = true)]
        prompt: Vec<String>,
    },
    /// Show the agent registry and the instruction block
    Agents,
    /// List models installed on the server
    Models,
}
