use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("domain {0} is not managed by the registrar account")]
    DomainNotFound(String),
    #[error("registrar returned status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("failed to decode registrar response: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to reach registrar: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("no usable record id in {}: {reason}", path.display())]
    State { path: PathBuf, reason: String },
    #[error("TXT record {name} is still not visible after {attempts} lookups")]
    PropagationTimeout { name: String, attempts: u32 },
}

impl Error {
    /// Whether the error came from talking to the registrar API.
    pub fn is_api(&self) -> bool {
        matches!(
            self,
            Error::Api { .. } | Error::Decode(_) | Error::Transport(_)
        )
    }
}
