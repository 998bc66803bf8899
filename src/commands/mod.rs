mod code;
mod config;
mod link;
mod status;

pub use code::cmd_code;
pub use config::{cmd_config_get, cmd_config_set, cmd_config_show};
pub use link::{LinkOptions, cmd_link};
pub use status::cmd_status;

use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, USER_ID_ENV};
use crate::error::{LinkError, Result};

/// Output of a command in both JSON and human-readable form.
pub struct CommandOutput {
    json: Value,
    text: Option<String>,
}

impl CommandOutput {
    pub fn new(json: Value) -> Self {
        Self { json, text: None }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Print as pretty JSON when `output_json` is set, else print the text
    /// (falling back to JSON when no text was given).
    pub fn print(self, output_json: bool) -> Result<()> {
        match self.text {
            Some(text) if !output_json => println!("{text}"),
            _ => println!("{}", serde_json::to_string_pretty(&self.json)?),
        }
        Ok(())
    }
}

/// Format a remaining duration as `m:ss`, rounding partial seconds up.
pub fn format_countdown(remaining: Duration) -> String {
    let mut secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs += 1;
    }
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// Pick the user ID from the command line, the environment, or the config file.
fn resolve_user_id(config: &Config, flag: Option<String>) -> Result<String> {
    flag.or_else(|| config.user_id())
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| {
            LinkError::Config(format!(
                "no user ID given; pass --user-id, set {USER_ID_ENV}, or run 'linkcode config set user.id <ID>'"
            ))
        })
}

/// Copy text to the system clipboard. Failures are reported, never fatal.
fn copy_to_clipboard(text: &str) -> bool {
    use clipboard_rs::Clipboard;

    match clipboard_rs::ClipboardContext::new().and_then(|ctx| ctx.set_text(text.to_string())) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not copy to clipboard: {e}");
            false
        }
    }
}
