//! Error taxonomy for the control engine. Session operations fold these into a
//! `CommandOutcome` at their boundary; discovery folds `NotFound` into `None`.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// Discovery window elapsed without a usable reply
    #[error("no Roku device answered the discovery probe")]
    NotFound,

    #[error("transport error: {0}")]
    Transport(String),

    /// The device answered but the body or header block could not be parsed
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("device rejected the request with status {0}")]
    Rejected(u16),

    #[error("invalid device address: {0:?}")]
    InvalidAddress(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(err: reqwest::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Transport(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
