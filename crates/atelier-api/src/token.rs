use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};

use atelier_types::api::Claims;

/// Tokens live for 24 hours unless configured otherwise.
pub const DEFAULT_TTL_HOURS: i64 = 24;

/// HS256 signing material, built once at startup from the configured
/// secret and shared through the application state.
pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenKeys {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        // Expiry is exact: no leeway window past `exp`.
        validation.leeway = 0;
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a signed token for the given subject email.
    pub fn issue(&self, email: &str, ttl: Duration) -> Result<String> {
        let claims = Claims {
            sub: email.to_string(),
            exp: (Utc::now() + ttl).timestamp() as usize,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify signature, payload shape and expiry. Every failure mode
    /// (bad signature, malformed payload, missing subject, expired)
    /// collapses to None; the caller answers 401.
    pub fn validate(&self, token: &str) -> Option<Claims> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .ok()
    }
}
