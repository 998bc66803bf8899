//! Link-code session state.
//!
//! A [`LinkSession`] is the plain data behind one linking attempt: the code
//! handed out by the auth API, when it was issued, how much of its lifetime
//! is left, and where it sits in the lifecycle. It does no I/O and owns no
//! timers; [`controller::LinkController`] drives it.
//!
//! Status only moves forward:
//!
//! ```text
//! Idle --begin--> Pending --poll match--> Linked
//!                    |
//!                    +--countdown at zero--> Expired --renew--> Idle
//! ```

pub mod controller;

use std::fmt;
use std::time::Duration;

use jiff::Timestamp;
use serde::Serialize;

use crate::api::{AccountLink, LinkCode, LinkStatusReport};
use crate::error::{LinkError, Result};
use crate::platform::Platform;

pub use controller::{LinkController, SessionEvent};

/// Server-side lifetime of a link code.
pub const DEFAULT_EXPIRES_IN: Duration = Duration::from_secs(300);
/// Countdown granularity.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(1);
/// How often the link-status endpoint is polled while a code is pending.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(4);
/// Pause between a successful link and dismissing the session.
pub const DEFAULT_DISMISS_DELAY: Duration = Duration::from_millis(2500);

/// Lifecycle of a link code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkStatus {
    /// No code yet.
    Idle,
    /// Code issued; countdown and polling are running.
    Pending,
    /// The external account showed up in the link list.
    Linked,
    /// The countdown ran out before a link appeared.
    Expired,
}

impl LinkStatus {
    /// Whether the current code has reached the end of its life.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LinkStatus::Linked | LinkStatus::Expired)
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkStatus::Idle => write!(f, "idle"),
            LinkStatus::Pending => write!(f, "pending"),
            LinkStatus::Linked => write!(f, "linked"),
            LinkStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Result of checking one poll response against the session's platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPoll {
    Linked(AccountLink),
    Pending,
}

/// Timer settings for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub expires_in: Duration,
    pub tick_interval: Duration,
    pub poll_interval: Duration,
    pub dismiss_delay: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            expires_in: DEFAULT_EXPIRES_IN,
            tick_interval: DEFAULT_TICK_INTERVAL,
            poll_interval: DEFAULT_POLL_INTERVAL,
            dismiss_delay: DEFAULT_DISMISS_DELAY,
        }
    }
}

impl SessionTimings {
    /// Reject settings that would stall or spin the timers.
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval.is_zero() {
            return Err(LinkError::Config(
                "session tick interval must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(LinkError::Config(
                "session poll interval must be greater than zero".to_string(),
            ));
        }
        if self.expires_in.is_zero() {
            return Err(LinkError::Config(
                "link code expiry must be greater than zero".to_string(),
            ));
        }
        if self.tick_interval > self.expires_in {
            return Err(LinkError::Config(format!(
                "session tick interval ({}ms) must not exceed the code expiry ({}s)",
                self.tick_interval.as_millis(),
                self.expires_in.as_secs()
            )));
        }
        Ok(())
    }
}

/// State of a single link-code session.
#[derive(Debug, Clone)]
pub struct LinkSession {
    code: Option<String>,
    issued_at: Option<Timestamp>,
    expires_in: Duration,
    remaining: Duration,
    status: LinkStatus,
    link: Option<AccountLink>,
    last_error: Option<String>,
}

/// Point-in-time copy of a session for display and JSON output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub status: LinkStatus,
    pub code: Option<String>,
    pub issued_at: Option<String>,
    pub expires_at: Option<String>,
    pub remaining_secs: u64,
    pub link: Option<AccountLink>,
    pub last_error: Option<String>,
}

impl LinkSession {
    pub fn new(expires_in: Duration) -> Self {
        Self {
            code: None,
            issued_at: None,
            expires_in,
            remaining: expires_in,
            status: LinkStatus::Idle,
            link: None,
            last_error: None,
        }
    }

    pub fn status(&self) -> LinkStatus {
        self.status
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn issued_at(&self) -> Option<Timestamp> {
        self.issued_at
    }

    pub fn remaining(&self) -> Duration {
        self.remaining
    }

    pub fn link(&self) -> Option<&AccountLink> {
        self.link.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Wall-clock time the code stops being valid.
    pub fn expires_at(&self) -> Option<Timestamp> {
        self.issued_at
            .and_then(|issued| issued.checked_add(self.expires_in).ok())
    }

    /// Move `Idle -> Pending` with a freshly issued code.
    pub fn begin(&mut self, code: LinkCode, issued_at: Timestamp) -> Result<()> {
        if self.status != LinkStatus::Idle {
            return Err(LinkError::InvalidTransition(format!(
                "cannot start a new code while {}",
                self.status
            )));
        }
        self.code = Some(code.code);
        self.issued_at = Some(issued_at);
        self.remaining = self.expires_in;
        self.link = None;
        self.last_error = None;
        self.status = LinkStatus::Pending;
        Ok(())
    }

    /// Remember why code generation failed. The session stays `Idle`.
    pub fn record_failure(&mut self, message: impl Into<String>) {
        if self.status == LinkStatus::Idle {
            self.last_error = Some(message.into());
        }
    }

    /// Whether the next countdown step of `step` would end the session.
    pub fn would_expire(&self, step: Duration) -> bool {
        self.status == LinkStatus::Pending && self.remaining <= step
    }

    /// Advance the countdown by `step`. Only has an effect while `Pending`.
    pub fn tick(&mut self, step: Duration) -> LinkStatus {
        if self.status != LinkStatus::Pending {
            return self.status;
        }
        self.remaining = self.remaining.saturating_sub(step);
        if self.remaining.is_zero() {
            self.status = LinkStatus::Expired;
        }
        self.status
    }

    /// Check a status report for a link on `platform`.
    ///
    /// Only a `Pending` session can become `Linked`; reports arriving in any
    /// other state are ignored.
    pub fn apply_poll(&mut self, report: &LinkStatusReport, platform: &Platform) -> LinkPoll {
        if self.status != LinkStatus::Pending {
            return LinkPoll::Pending;
        }
        match report.find(platform) {
            Some(link) => {
                self.link = Some(link.clone());
                self.status = LinkStatus::Linked;
                LinkPoll::Linked(link.clone())
            }
            None => LinkPoll::Pending,
        }
    }

    /// Move `Expired -> Idle`, dropping the old code.
    pub fn renew(&mut self) -> Result<()> {
        if self.status != LinkStatus::Expired {
            return Err(LinkError::InvalidTransition(format!(
                "only an expired code can be renewed (currently {})",
                self.status
            )));
        }
        *self = Self::new(self.expires_in);
        Ok(())
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            status: self.status,
            code: self.code.clone(),
            issued_at: self.issued_at.map(|t| t.to_string()),
            expires_at: self.expires_at().map(|t| t.to_string()),
            remaining_secs: self.remaining.as_secs(),
            link: self.link.clone(),
            last_error: self.last_error.clone(),
        }
    }
}

impl Default for LinkSession {
    fn default() -> Self {
        Self::new(DEFAULT_EXPIRES_IN)
    }
}
