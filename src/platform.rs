//! Platform tags for external game accounts.
//!
//! The auth API has never pinned down a canonical spelling for some
//! platforms (Minecraft shows up as both `mc` and `minecraft`), so a
//! `Platform` owns its full synonym list and matching goes through it.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{LinkError, Result};

const MINECRAFT_TAGS: &[&str] = &["minecraft", "mc"];
const STEAM_TAGS: &[&str] = &["steam"];
const DISCORD_TAGS: &[&str] = &["discord"];

/// External account platform that a link code targets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    #[default]
    Minecraft,
    Steam,
    Discord,
    /// Any tag the API returns that we have no synonym table for.
    /// Stored lowercased.
    Other(String),
}

impl Platform {
    /// Platforms with a known synonym table.
    pub const KNOWN: &'static [Platform] = &[Platform::Minecraft, Platform::Steam, Platform::Discord];

    /// Canonical tag used for display and config.
    pub fn canonical(&self) -> &str {
        match self {
            Platform::Minecraft => MINECRAFT_TAGS[0],
            Platform::Steam => STEAM_TAGS[0],
            Platform::Discord => DISCORD_TAGS[0],
            Platform::Other(tag) => tag,
        }
    }

    /// Every tag the API may use for this platform.
    pub fn synonyms(&self) -> &[&str] {
        match self {
            Platform::Minecraft => MINECRAFT_TAGS,
            Platform::Steam => STEAM_TAGS,
            Platform::Discord => DISCORD_TAGS,
            Platform::Other(_) => &[],
        }
    }

    /// Check whether a raw platform tag from the API refers to this platform.
    ///
    /// Comparison uses Unicode case folding, and surrounding whitespace is ignored.
    pub fn matches(&self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() {
            return false;
        }
        match self {
            Platform::Other(own) => unicase::eq(own.as_str(), tag),
            known => known.synonyms().iter().any(|s| unicase::eq(*s, tag)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical())
    }
}

impl FromStr for Platform {
    type Err = LinkError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(LinkError::UnknownPlatform(s.to_string()));
        }

        if let Some(known) = Self::KNOWN.iter().find(|p| p.matches(trimmed)) {
            return Ok(known.clone());
        }

        Ok(Platform::Other(
            unicase::UniCase::new(trimmed).to_folded_case(),
        ))
    }
}

impl TryFrom<String> for Platform {
    type Error = LinkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.canonical().to_string()
    }
}
