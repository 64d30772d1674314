// chat-client/src/error.rs
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no credential available, sign in first")]
    MissingCredential,

    #[error("credential has expired")]
    ExpiredCredential,

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(#[from] url::ParseError),

    #[error("websocket transport error: {0}")]
    Transport(#[from] tungstenite::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("failed to decode payload: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("actor mailbox error: {0}")]
    Mailbox(#[from] actix::MailboxError),

    #[error("identity provider error: {0}")]
    Identity(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] common::ConfigInvalid),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Failures that mean the user has to sign in again
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::MissingCredential | ClientError::ExpiredCredential)
    }
}
