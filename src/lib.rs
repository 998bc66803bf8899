pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod platform;
pub mod session;

pub use api::{AccountLink, HttpLinkApi, LinkApi, LinkCode, LinkStatusReport};
pub use config::Config;
pub use error::{LinkError, Result};
pub use platform::Platform;
pub use session::{
    LinkController, LinkPoll, LinkSession, LinkStatus, SessionEvent, SessionSnapshot,
    SessionTimings,
};
