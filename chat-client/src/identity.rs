// chat-client/src/identity.rs
use async_trait::async_trait;
use common::IdentitySession;
use std::sync::Mutex;

use crate::error::ClientError;

/// Seam to the managed identity service. Sign-up and sign-in happen
/// outside this client; it only needs the current session and sign-out.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn current_session(&self) -> Result<Option<IdentitySession>, ClientError>;

    async fn sign_out(&self) -> Result<(), ClientError>;
}

/// Identity backed by a bearer token issued elsewhere
#[derive(Debug, Default)]
pub struct TokenIdentity {
    session: Mutex<Option<IdentitySession>>,
}

pub const ACCESS_TOKEN_VAR: &str = "CHAT_ACCESS_TOKEN";

impl TokenIdentity {
    pub fn new(session: Option<IdentitySession>) -> Self {
        Self {
            session: Mutex::new(session),
        }
    }

    pub fn with_token(token: impl Into<String>) -> Self {
        Self::new(Some(IdentitySession::new(token)))
    }

    /// Reads the token from `CHAT_ACCESS_TOKEN`, signed out when unset
    pub fn from_env() -> Self {
        match std::env::var(ACCESS_TOKEN_VAR) {
            Ok(token) if !token.trim().is_empty() => Self::with_token(token.trim()),
            _ => {
                tracing::warn!("{} is not set; starting signed out", ACCESS_TOKEN_VAR);
                Self::default()
            }
        }
    }
}

#[async_trait]
impl IdentityProvider for TokenIdentity {
    async fn current_session(&self) -> Result<Option<IdentitySession>, ClientError> {
        let session = self.session
            .lock()
            .map_err(|_| ClientError::Identity("session lock poisoned".to_string()))?;
        Ok(session.clone())
    }

    async fn sign_out(&self) -> Result<(), ClientError> {
        let mut session = self.session
            .lock()
            .map_err(|_| ClientError::Identity("session lock poisoned".to_string()))?;
        if session.take().is_some() {
            tracing::info!("Signed out");
        }
        Ok(())
    }
}
