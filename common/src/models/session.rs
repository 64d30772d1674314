// common/src/models/session.rs
use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

/// Session handed out by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentitySession {
    /// Bearer credential attached to socket and HTTP requests
    pub access_token: String,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExpiryClaims {
    exp: Option<i64>,
}

impl IdentitySession {
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            username: None,
        }
    }

    /// Expiry read from the `exp` claim. The signature is not checked: the
    /// gateway verifies the token, this is only a liveness hint.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.required_spec_claims.clear();
        validation.algorithms = vec![
            Algorithm::HS256,
            Algorithm::HS384,
            Algorithm::HS512,
            Algorithm::RS256,
            Algorithm::RS384,
            Algorithm::RS512,
            Algorithm::ES256,
            Algorithm::ES384,
            Algorithm::PS256,
            Algorithm::PS384,
            Algorithm::PS512,
        ];

        let data = decode::<ExpiryClaims>(
            &self.access_token,
            &DecodingKey::from_secret(&[]),
            &validation,
        ).ok()?;

        Utc.timestamp_opt(data.claims.exp?, 0).single()
    }

    /// Opaque tokens (not a JWT, or no `exp`) are assumed live
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        !self.access_token.is_empty()
            && self.expires_at().map_or(true, |exp| exp > now)
    }
}
