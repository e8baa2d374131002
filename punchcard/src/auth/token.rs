//! Session tokens: HS256 JWT mint and verification.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;

pub const TOKEN_TTL_MINUTES: i64 = 60;

const ISSUER: &str = "punchcard";
const AUDIENCE: &str = "punchcard-api";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Principal identifier (username).
    pub sub: String,
    pub exp: i64,
    pub iss: String,
    pub aud: String,
}

/// Mints and verifies the session tokens that carry the principal identity.
pub struct TokenAuthority {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl TokenAuthority {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[ISSUER]);
        validation.set_audience(&[AUDIENCE]);

        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            validation,
        }
    }

    /// Mint a token for `principal`, valid for [`TOKEN_TTL_MINUTES`].
    pub fn mint(&self, principal: &str) -> Result<String, AuthError> {
        let claims = Claims {
            sub: principal.to_string(),
            exp: (chrono::Utc::now() + chrono::Duration::minutes(TOKEN_TTL_MINUTES)).timestamp(),
            iss: ISSUER.to_string(),
            aud: AUDIENCE.to_string(),
        };

        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(AuthError::Mint)
    }

    /// Verify signature, expiry, issuer and audience; return the principal.
    pub fn verify(&self, token: &str) -> Result<String, AuthError> {
        let data = jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "token verification failed");
                AuthError::InvalidToken
            })?;

        Ok(data.claims.sub)
    }
}
