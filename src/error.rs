use thiserror::Error;

#[derive(Error, Debug)]
pub enum LinkError {
    /// The auth API refused or failed to hand out a link code.
    ///
    /// Shown to the user; retry is an explicit action.
    #[error("could not generate a link code: {0}")]
    CodeGeneration(String),

    /// A link-status poll failed. Logged and retried on the next interval.
    #[error("link status check failed: {0}")]
    PollTransient(String),

    #[error("invalid session transition: {0}")]
    InvalidTransition(String),

    #[error("unknown platform '{0}'")]
    UnknownPlatform(String),

    #[error("unexpected API response: {0}")]
    Decode(String),

    #[error("API error ({status}): {message}")]
    Api {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml_ng::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{0}")]
    Other(String),
}

impl LinkError {
    /// Whether a caller may reasonably try the same call again.
    pub fn is_retryable(&self) -> bool {
        match self {
            LinkError::CodeGeneration(_) | LinkError::PollTransient(_) | LinkError::Http(_) => {
                true
            }
            LinkError::Api { status, .. } => status.is_server_error() || status.as_u16() == 429,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, LinkError>;
