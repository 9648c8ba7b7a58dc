use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token payload. `sub` is the user id the rest of the system trusts as the
/// resolved user reference.
#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: Uuid,
    iat: i64,
    exp: i64,
}

/// Issues and verifies bearer tokens. The booking core never re-derives a
/// user reference; it trusts whatever `verify` resolved.
#[derive(Clone)]
pub struct IdentityProvider {
    encoding: EncodingKey,
    decoding: DecodingKey,
    expires_in: Duration,
}

impl IdentityProvider {
    pub fn new(secret: &str, expires_in_hours: i64) -> Self {
        IdentityProvider {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            expires_in: Duration::hours(expires_in_hours),
        }
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iat: now.timestamp(),
            exp: (now + self.expires_in).timestamp(),
        };
        encode(&Header::default(), &claims, &self.encoding)
    }

    /// Resolves a token to the user id it was issued for, or rejects it.
    pub fn verify(&self, token: &str) -> Result<Uuid, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.decoding, &Validation::default())?;
        Ok(data.claims.sub)
    }
}
