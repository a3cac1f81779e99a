//! Access token verification.
//!
//! Provider-specific auth outcomes are surfaced as a closed error-kind
//! enum checked by the caller, never as control-flow exceptions.

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthErrorKind {
    #[error("authentication token is missing")]
    MissingToken,
    #[error("authentication token has expired")]
    Expired,
    #[error("authentication token is invalid")]
    Invalid,
    #[error("authentication provider unavailable")]
    Unavailable,
}

/// A successfully verified caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    /// Stable user id.
    pub user_id: String,
}

/// Verifies access tokens presented with client messages.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Verify a token, resolving the owning user.
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthErrorKind>;
}

/// Fixed token-to-user verifier for development and tests.
#[derive(Debug, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, String>,
}

impl StaticTokenVerifier {
    /// Create an empty verifier.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a token for a user.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(token.into(), user_id.into());
        self
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<AuthenticatedUser, AuthErrorKind> {
        if token.is_empty() {
            return Err(AuthErrorKind::MissingToken);
        }
        self.tokens
            .get(token)
            .map(|user_id| AuthenticatedUser {
                user_id: user_id.clone(),
            })
            .ok_or(AuthErrorKind::Invalid)
    }
}
