/// JWT Claims structure
///
/// Payload shared by access and refresh tokens: the principal's id and email plus
/// the standard JWT claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TokenError;

/// Which half of a token pair a JWT belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT Claims for access and refresh tokens
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Claims {
    /// Subject (principal ID as UUID string)
    pub sub: String,
    /// Principal email
    pub email: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
    /// Unique token id; two tokens minted in the same second still differ
    pub jti: String,
    /// Access or refresh
    pub typ: TokenKind,
}

impl Claims {
    /// Create new claims for a principal
    ///
    /// # Arguments
    /// * `user_id` - Principal's UUID
    /// * `email` - Principal's email address
    /// * `expiry_seconds` - Token lifetime in seconds from now (may be negative in tests)
    /// * `issuer` - Issuer identifier
    /// * `kind` - Access or refresh
    pub fn new(
        user_id: Uuid,
        email: String,
        expiry_seconds: i64,
        issuer: String,
        kind: TokenKind,
    ) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: user_id.to_string(),
            email,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer,
            jti: Uuid::new_v4().to_string(),
            typ: kind,
        }
    }

    /// Extract principal ID from claims
    ///
    /// # Errors
    /// Returns `Malformed` if the subject is not a valid UUID
    pub fn user_id(&self) -> Result<Uuid, TokenError> {
        Uuid::parse_str(&self.sub).map_err(|_| TokenError::Malformed)
    }

    /// Check if token has expired
    pub fn is_expired(&self) -> bool {
        let now = chrono::Utc::now().timestamp();
        self.exp < now
    }
}

/// Verified identity attached to a request by the auth gate.
///
/// Handlers read this from request extensions; identity claims in request bodies are
/// never trusted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
}

impl TryFrom<Claims> for Identity {
    type Error = TokenError;

    fn try_from(claims: Claims) -> Result<Self, Self::Error> {
        Ok(Self {
            id: claims.user_id()?,
            email: claims.email,
        })
    }
}
