//! Authentication boundary: credential verification and session tokens.
//!
//! The core service never sees any of this; it only receives the resolved
//! principal identifier. Everything here exists to produce that identifier.

mod password;
mod token;

pub use password::{Login, UserDirectory};
pub use token::{Claims, TokenAuthority, TOKEN_TTL_MINUTES};

use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("failed to mint token: {0}")]
    Mint(#[source] jsonwebtoken::errors::Error),

    #[error("stored user record is corrupt: {0}")]
    CorruptRecord(#[source] serde_json::Error),

    #[error("store failure: {0}")]
    Store(#[from] StoreError),
}
