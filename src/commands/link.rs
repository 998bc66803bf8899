use std::io::{IsTerminal, Write};
use std::time::Duration;

use owo_colors::OwoColorize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;

use super::{copy_to_clipboard, format_countdown, resolve_user_id};
use crate::api::{AccountLink, HttpLinkApi, LinkApi};
use crate::config::Config;
use crate::error::{LinkError, Result};
use crate::platform::Platform;
use crate::session::{LinkController, LinkStatus, SessionEvent, SessionSnapshot};

/// Options for `linkcode link`
pub struct LinkOptions {
    pub platform: Option<Platform>,
    pub user_id: Option<String>,
    pub renew: u32,
    pub copy: bool,
    pub json: bool,
}

/// Run a full link session: issue a code, count down, and poll until the
/// account is linked or the code (and every renewal) expires.
pub async fn cmd_link(options: LinkOptions) -> Result<()> {
    let config = Config::load()?;
    let platform = options
        .platform
        .clone()
        .unwrap_or_else(|| config.platform.clone());
    let user_id = resolve_user_id(&config, options.user_id.clone())?;
    let api = HttpLinkApi::from_config(&config)?;

    let mut controller = LinkController::new(api, platform, user_id, config.timings())?;
    let live = !options.json && std::io::stdout().is_terminal();
    let printer = Printer {
        json: options.json,
        live,
        copy: options.copy,
    };

    let snapshot = drive(
        &mut controller,
        options.renew,
        &printer,
        tokio::signal::ctrl_c(),
    )
    .await?;
    match snapshot.status {
        LinkStatus::Linked => Ok(()),
        status => Err(LinkError::Other(format!(
            "link session ended without a link ({status})"
        ))),
    }
}

/// Drive a session to completion, renewing up to `renewals` expired codes.
///
/// Returns the final snapshot once the account is linked or the last code
/// expires. When `cancel` resolves (Ctrl-C in the CLI) the session is closed
/// and an error is returned.
async fn drive<A, C>(
    controller: &mut LinkController<A>,
    mut renewals: u32,
    printer: &Printer,
    cancel: C,
) -> Result<SessionSnapshot>
where
    A: LinkApi + 'static,
    C: Future,
{
    let mut events = controller.subscribe();
    let platform = controller.platform().clone();
    // Polled across iterations so a signal between events is not lost.
    tokio::pin!(cancel);
    controller.generate_code().await?;

    loop {
        let event = tokio::select! {
            _ = &mut cancel => {
                controller.close().await;
                printer.finish_line();
                return Err(LinkError::Other("link cancelled".to_string()));
            }
            event = events.recv() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                tracing::debug!(skipped, "event receiver lagged");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        printer.event(&event, &platform);

        match event {
            SessionEvent::Linked { .. } => {
                controller.close().await;
                break;
            }
            SessionEvent::Expired if renewals > 0 => {
                renewals -= 1;
                controller.generate_code().await?;
            }
            SessionEvent::Expired | SessionEvent::Dismissed | SessionEvent::Closed => break,
            SessionEvent::CodeIssued { .. }
            | SessionEvent::Tick { .. }
            | SessionEvent::PollFailed { .. } => {}
        }
    }

    Ok(controller.snapshot())
}

/// Renders session events for the terminal or as JSON lines.
struct Printer {
    json: bool,
    live: bool,
    copy: bool,
}

impl Printer {
    fn event(&self, event: &SessionEvent, platform: &Platform) {
        if self.json {
            if let Some(line) = event_json(event) {
                println!("{line}");
            }
            return;
        }

        match event {
            SessionEvent::CodeIssued { code, expires_in } => {
                self.finish_line();
                println!("{}", render_code_banner(code, platform, *expires_in));
                if self.copy && copy_to_clipboard(code) {
                    println!("{}", "Code copied to clipboard".dimmed());
                }
            }
            SessionEvent::Tick { remaining } => {
                if self.live {
                    print!(
                        "\r{} {} ",
                        "Expires in".dimmed(),
                        format_countdown(*remaining).bold()
                    );
                    let _ = std::io::stdout().flush();
                }
            }
            SessionEvent::PollFailed { .. } => {}
            SessionEvent::Linked { link } => {
                self.finish_line();
                println!("{}", render_linked(link, platform).green());
            }
            SessionEvent::Expired => {
                self.finish_line();
                println!("{}", "Link code expired".yellow());
            }
            SessionEvent::Dismissed | SessionEvent::Closed => {}
        }
    }

    /// End an in-place countdown line before printing anything else.
    fn finish_line(&self) {
        if self.live {
            println!();
        }
    }
}

fn render_code_banner(code: &str, platform: &Platform, expires_in: Duration) -> String {
    format!(
        "Link code: {code}\nEnter it on {platform} to link your account. Valid for {}.",
        format_countdown(expires_in)
    )
}

fn render_linked(link: &AccountLink, platform: &Platform) -> String {
    format!("Linked {platform} account {}", link.display_name())
}

fn event_json(event: &SessionEvent) -> Option<Value> {
    let value = match event {
        SessionEvent::CodeIssued { code, expires_in } => json!({
            "event": "code_issued",
            "code": code,
            "expires_in": expires_in.as_secs(),
        }),
        SessionEvent::PollFailed { message } => json!({
            "event": "poll_failed",
            "message": message,
        }),
        SessionEvent::Linked { link } => json!({
            "event": "linked",
            "link": link,
        }),
        SessionEvent::Expired => json!({ "event": "expired" }),
        SessionEvent::Tick { .. } | SessionEvent::Dismissed | SessionEvent::Closed => {
            return None;
        }
    };
    Some(value)
}
