//! Account-linking API.
//!
//! The auth API owns link codes and the list of linked external accounts.
//! This module holds the normalized shapes the rest of the crate works
//! with, the [`LinkApi`] seam, and the HTTP implementation.

pub mod http;
pub mod wire;

use std::time::Duration;

use serde::Serialize;

use crate::error::Result;
use crate::platform::Platform;

pub use http::HttpLinkApi;

/// A one-time code issued by the auth API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkCode {
    pub code: String,
    /// Lifetime hint from the server, if it sent one.
    pub expires_in: Option<Duration>,
}

/// An external account already linked to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountLink {
    /// Platform tag exactly as the API returned it (e.g. "mc", "Steam").
    pub platform: String,
    pub external_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform_username: Option<String>,
}

impl AccountLink {
    /// Name to show for this account: the username if known, else the external ID.
    pub fn display_name(&self) -> &str {
        self.platform_username
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(&self.external_id)
    }
}

/// Normalized response of the link-status endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStatusReport {
    pub links: Vec<AccountLink>,
}

impl LinkStatusReport {
    /// First link whose platform tag refers to `platform`.
    pub fn find(&self, platform: &Platform) -> Option<&AccountLink> {
        self.links.iter().find(|link| platform.matches(&link.platform))
    }

    pub fn is_linked(&self, platform: &Platform) -> bool {
        self.find(platform).is_some()
    }
}

/// Operations the session needs from the auth API.
pub trait LinkApi: Send + Sync {
    /// Ask the server for a fresh link code.
    fn generate_link_code(&self) -> impl std::future::Future<Output = Result<LinkCode>> + Send;

    /// Fetch the user's currently linked external accounts.
    fn check_link_status(
        &self,
        user_id: &str,
    ) -> impl std::future::Future<Output = Result<LinkStatusReport>> + Send;
}
