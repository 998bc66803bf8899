use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::io;

use crate::platform::Platform;

#[derive(Parser)]
#[command(name = "linkcode")]
#[command(about = "Link external game accounts with one-time codes")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Issue a link code and wait until the account is linked or the code expires
    #[command(visible_alias = "l")]
    Link {
        /// Platform to link (mc, minecraft, steam, discord, ...)
        #[arg(short, long, value_parser = parse_platform)]
        platform: Option<Platform>,

        /// User ID whose links are checked (default: LINKCODE_USER_ID or config)
        #[arg(short, long, value_parser = parse_user_id)]
        user_id: Option<String>,

        /// Request up to N fresh codes after the current one expires
        #[arg(long, default_value_t = 0)]
        renew: u32,

        /// Copy the code to the clipboard
        #[arg(long)]
        copy: bool,

        /// Output as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Request a single link code and print it
    Code {
        /// Copy the code to the clipboard
        #[arg(long)]
        copy: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the accounts currently linked to a user
    #[command(visible_alias = "st")]
    Status {
        /// Platform to highlight (default: configured platform)
        #[arg(short, long, value_parser = parse_platform)]
        platform: Option<Platform>,

        /// User ID to look up (default: LINKCODE_USER_ID or config)
        #[arg(short, long, value_parser = parse_user_id)]
        user_id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for [possible values: bash, zsh, fish, powershell, elvish]
        shell: Shell,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set a configuration value
    Set {
        /// Configuration key (api.url, api.token, user.id, platform, session.expires_in, ...)
        key: String,
        /// Value to set
        value: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Get a configuration value
    Get {
        /// Configuration key (api.url, api.token, user.id, platform, session.expires_in, ...)
        key: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

impl Cli {
    pub async fn run(self) -> crate::error::Result<()> {
        use crate::commands::{
            LinkOptions, cmd_code, cmd_config_get, cmd_config_set, cmd_config_show, cmd_link,
            cmd_status,
        };

        match self.command {
            Commands::Link {
                platform,
                user_id,
                renew,
                copy,
                json,
            } => {
                cmd_link(LinkOptions {
                    platform,
                    user_id,
                    renew,
                    copy,
                    json,
                })
                .await
            }
            Commands::Code { copy, json } => cmd_code(copy, json).await,
            Commands::Status {
                platform,
                user_id,
                json,
            } => cmd_status(platform, user_id, json).await,
            Commands::Config { action } => match action {
                ConfigAction::Show { json } => cmd_config_show(json),
                ConfigAction::Set { key, value, json } => cmd_config_set(&key, &value, json),
                ConfigAction::Get { key, json } => cmd_config_get(&key, json),
            },
            Commands::Completions { shell } => {
                generate_completions(shell);
                Ok(())
            }
        }
    }
}

fn parse_platform(s: &str) -> Result<Platform, String> {
    s.parse::<Platform>().map_err(|_| {
        format!(
            "Invalid platform. Must be one of: {} (or any other platform tag)",
            Platform::KNOWN
                .iter()
                .map(Platform::canonical)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })
}

fn parse_user_id(s: &str) -> Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("user ID cannot be empty".to_string());
    }
    Ok(trimmed.to_string())
}

pub fn generate_completions(shell: Shell) {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "linkcode", &mut io::stdout());
}
