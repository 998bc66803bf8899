use owo_colors::OwoColorize;
use serde_json::json;

use super::{CommandOutput, copy_to_clipboard};
use crate::api::{HttpLinkApi, LinkApi};
use crate::config::Config;
use crate::error::Result;

/// Request one link code without starting a session.
pub async fn cmd_code(copy: bool, output_json: bool) -> Result<()> {
    let config = Config::load()?;
    let api = HttpLinkApi::from_config(&config)?;

    let code = api.generate_link_code().await?;
    let expires_in = code
        .expires_in
        .unwrap_or(config.timings().expires_in)
        .as_secs();
    let copied = copy && copy_to_clipboard(&code.code);

    let mut text = format!("{}", code.code.bold());
    if copied {
        text.push_str(&format!(" {}", "(copied)".dimmed()));
    }

    CommandOutput::new(json!({
        "code": code.code,
        "expires_in": expires_in,
        "copied": copied,
    }))
    .with_text(text)
    .print(output_json)
}
