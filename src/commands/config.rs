//! Configuration commands for managing linkcode settings.
//!
//! - `config set`: Set a configuration value
//! - `config get`: Print a single value
//! - `config show`: Display current configuration

use owo_colors::OwoColorize;
use serde_json::json;

use super::CommandOutput;
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::platform::Platform;

const VALID_KEYS: &[&str] = &[
    "api.url",
    "api.token",
    "api.code_path",
    "api.status_path",
    "api.timeout",
    "api.connect_timeout",
    "user.id",
    "platform",
    "session.expires_in",
    "session.tick_ms",
    "session.poll_ms",
    "session.dismiss_ms",
];

/// Validate a config key, suggesting dot notation for `api_url` style keys
fn validate_config_key(key: &str) -> Result<&str> {
    if VALID_KEYS.contains(&key) {
        return Ok(key);
    }

    // Only the first underscore becomes a dot (e.g., api_token -> api.token)
    if let Some(pos) = key.find('_') {
        let dot_version = format!("{}.{}", &key[..pos], &key[pos + 1..]);
        if VALID_KEYS.contains(&dot_version.as_str()) {
            return Err(LinkError::Config(format!(
                "invalid config key '{key}'. Use dot notation: '{dot_version}'"
            )));
        }
    }

    Err(LinkError::Config(format!(
        "unknown config key '{key}'. Valid keys: {}",
        VALID_KEYS.join(", ")
    )))
}

/// Mask a sensitive value by showing only the first 2 and last 2 characters
fn mask_sensitive_value(value: &str) -> String {
    let char_count = value.chars().count();
    if char_count > 4 {
        let first: String = value.chars().take(2).collect();
        let last: String = value.chars().skip(char_count - 2).collect();
        format!("{first}...{last}")
    } else {
        "****".to_string()
    }
}

fn parse_number(key: &str, value: &str) -> Result<u64> {
    let parsed = value.trim().parse::<u64>().map_err(|_| {
        LinkError::Config(format!(
            "invalid value '{value}' for {key}. Expected a whole number"
        ))
    })?;
    if parsed == 0 {
        return Err(LinkError::Config(format!("{key} must be greater than zero")));
    }
    Ok(parsed)
}

/// Show current configuration
pub fn cmd_config_show(output_json: bool) -> Result<()> {
    let config = Config::load()?;
    let config_path = Config::config_path()?;
    let token_configured = config.has_api_token();
    let user_id = config.user_id();
    let session = &config.session;

    let json_output = json!({
        "api": {
            "url": config.api_url(),
            "code_path": config.api.code_path,
            "status_path": config.api.status_path,
            "timeout": config.api.timeout,
            "connect_timeout": config.api.connect_timeout,
            "token_configured": token_configured,
        },
        "user_id": user_id,
        "platform": config.platform.to_string(),
        "session": {
            "expires_in": session.expires_in,
            "tick_ms": session.tick_ms,
            "poll_ms": session.poll_ms,
            "dismiss_ms": session.dismiss_ms,
        },
        "config_file": config_path.to_string_lossy(),
    });

    let mut text_output = String::new();

    text_output.push_str(&format!("{}\n\n", "Configuration:".cyan().bold()));

    text_output.push_str(&format!("{}:\n", "api".cyan()));
    text_output.push_str(&format!("  url: {}\n", config.api_url()));
    text_output.push_str(&format!("  code_path: {}\n", config.api.code_path));
    text_output.push_str(&format!("  status_path: {}\n", config.api.status_path));
    text_output.push_str(&format!(
        "  timeout: {}s (connect {}s)\n",
        config.api.timeout, config.api.connect_timeout
    ));

    // Never print the token itself
    let token_status = if token_configured {
        "configured".green().to_string()
    } else {
        "not configured".dimmed().to_string()
    };
    text_output.push_str(&format!("  token: {token_status}\n"));

    text_output.push('\n');

    match user_id {
        Some(id) => text_output.push_str(&format!("{}: {id}\n", "user.id".cyan())),
        None => text_output.push_str(&format!(
            "{}: {}\n",
            "user.id".cyan(),
            "not configured".dimmed()
        )),
    }
    text_output.push_str(&format!("{}: {}\n", "platform".cyan(), config.platform));

    text_output.push('\n');

    text_output.push_str(&format!("{}:\n", "session".cyan()));
    text_output.push_str(&format!("  expires_in: {}s\n", session.expires_in));
    text_output.push_str(&format!("  tick_ms: {}\n", session.tick_ms));
    text_output.push_str(&format!("  poll_ms: {}\n", session.poll_ms));
    text_output.push_str(&format!("  dismiss_ms: {}\n", session.dismiss_ms));

    text_output.push('\n');
    text_output.push_str(&format!(
        "{}",
        format!("Config file: {}", config_path.display()).dimmed()
    ));

    CommandOutput::new(json_output)
        .with_text(text_output)
        .print(output_json)
}

/// Set a configuration value
pub fn cmd_config_set(key: &str, value: &str, output_json: bool) -> Result<()> {
    validate_config_key(key)?;

    let mut config = Config::load()?;
    let mut shown_value = json!(value);

    match key {
        "api.url" => {
            url::Url::parse(value.trim()).map_err(|e| {
                LinkError::Config(format!("invalid value '{value}' for api.url: {e}"))
            })?;
            config.set_api_url(value.trim().to_string());
        }
        "api.token" => {
            config.set_api_token(value.to_string());
            shown_value = json!(mask_sensitive_value(value));
        }
        "api.code_path" => config.api.code_path = value.trim().to_string(),
        "api.status_path" => config.api.status_path = value.trim().to_string(),
        "api.timeout" => config.api.timeout = parse_number(key, value)?,
        "api.connect_timeout" => config.api.connect_timeout = parse_number(key, value)?,
        "user.id" => {
            let id = value.trim();
            if id.is_empty() {
                return Err(LinkError::Config("user.id cannot be empty".to_string()));
            }
            config.set_user_id(id.to_string());
        }
        "platform" => {
            let platform: Platform = value.parse()?;
            shown_value = json!(platform.to_string());
            config.set_platform(platform);
        }
        "session.expires_in" => config.session.expires_in = parse_number(key, value)?,
        "session.tick_ms" => config.session.tick_ms = parse_number(key, value)?,
        "session.poll_ms" => config.session.poll_ms = parse_number(key, value)?,
        "session.dismiss_ms" => config.session.dismiss_ms = parse_number(key, value)?,
        _ => return Err(LinkError::Config(format!("unknown config key '{key}'"))),
    }

    config.timings().validate()?;
    config.save()?;

    let text = match shown_value.as_str() {
        Some(shown) if key != "api.token" => format!("Set {} to {shown}", key.cyan()),
        _ => format!("Set {}", key.cyan()),
    };

    CommandOutput::new(json!({
        "action": "config_set",
        "key": key,
        "value": shown_value,
        "success": true,
    }))
    .with_text(text)
    .print(output_json)
}

/// Get a specific configuration value
pub fn cmd_config_get(key: &str, output_json: bool) -> Result<()> {
    validate_config_key(key)?;

    let config = Config::load()?;

    let value = match key {
        "api.url" => config.api_url(),
        "api.token" => {
            let Some(token) = config.api.token.as_deref() else {
                return Err(LinkError::Config("api.token not set".to_string()));
            };
            let masked = mask_sensitive_value(token);
            return CommandOutput::new(json!({
                "key": key,
                "value": masked,
                "configured": true,
                "masked": true,
            }))
            .with_text(format!(
                "{masked} (masked - showing first 2 and last 2 characters)"
            ))
            .print(output_json);
        }
        "api.code_path" => config.api.code_path.clone(),
        "api.status_path" => config.api.status_path.clone(),
        "api.timeout" => config.api.timeout.to_string(),
        "api.connect_timeout" => config.api.connect_timeout.to_string(),
        "user.id" => config
            .user_id()
            .ok_or_else(|| LinkError::Config("user.id not set".to_string()))?,
        "platform" => config.platform.to_string(),
        "session.expires_in" => config.session.expires_in.to_string(),
        "session.tick_ms" => config.session.tick_ms.to_string(),
        "session.poll_ms" => config.session.poll_ms.to_string(),
        "session.dismiss_ms" => config.session.dismiss_ms.to_string(),
        _ => return Err(LinkError::Config(format!("unknown config key '{key}'"))),
    };

    CommandOutput::new(json!({
        "key": key,
        "value": value,
        "configured": true,
    }))
    .with_text(value.clone())
    .print(output_json)
}
