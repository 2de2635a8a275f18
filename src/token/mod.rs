//! Access tokens
//!
//! - [`Claims`]: subject, issue and expiry capabilities of a token payload
//! - [`Payload`]: the concrete claims carried by every token
//! - [`TokenAuthenticator`]: issue/verify seam used by the gateway
//! - [`JwtAuthenticator`]: HS256 implementation

pub mod jwt;
pub mod payload;

use std::time::Duration;

use thiserror::Error;

pub use jwt::JwtAuthenticator;
pub use payload::{Claims, Payload};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("invalid key size: must be at least {min} characters")]
    InvalidKeySize { min: usize },

    #[error("token is invalid")]
    Invalid,

    #[error("token has expired")]
    Expired,

    #[error("token duration out of range")]
    InvalidDuration,

    #[error("failed to sign token: {0}")]
    Encoding(String),
}

/// Issues and verifies access tokens
pub trait TokenAuthenticator: Send + Sync {
    /// Sign a token for `username` valid for `duration`
    fn create_token(&self, username: &str, duration: Duration)
    -> Result<(String, Payload), TokenError>;

    /// Check signature and expiry, returning the embedded claims
    fn verify(&self, token: &str) -> Result<Payload, TokenError>;
}
