/// JWT Token Generation and Validation
///
/// Signs and verifies the access/refresh token pair with a shared HS256 secret.

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, Identity, TokenKind};
use crate::configuration::JwtSettings;
use crate::error::{AppError, TokenError};

/// Holds the signing keys and lifetimes for both token kinds.
#[derive(Clone)]
pub struct TokenSigner {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    settings: JwtSettings,
}

impl TokenSigner {
    pub fn new(settings: JwtSettings) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(settings.secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(settings.secret.as_bytes()),
            settings,
        }
    }

    pub fn settings(&self) -> &JwtSettings {
        &self.settings
    }

    fn lifetime(&self, kind: TokenKind) -> i64 {
        match kind {
            TokenKind::Access => self.settings.access_token_expiry,
            TokenKind::Refresh => self.settings.refresh_token_expiry,
        }
    }

    /// Sign a new token of `kind` for a principal
    ///
    /// # Errors
    /// Returns error if token encoding fails
    pub fn sign(&self, identity: &Identity, kind: TokenKind) -> Result<String, AppError> {
        let claims = Claims::new(
            identity.id,
            identity.email.clone(),
            self.lifetime(kind),
            self.settings.issuer.clone(),
            kind,
        );
        self.encode(&claims)
    }

    /// Encode arbitrary claims with this signer's key.
    pub fn encode(&self, claims: &Claims) -> Result<String, AppError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
    }

    /// Verify signature, issuer, expiry and kind of a token
    ///
    /// # Errors
    /// * `Expired` - signature is valid but `exp` has passed
    /// * `Malformed` - anything else: bad structure, signature, issuer or kind
    pub fn verify(&self, token: &str, kind: TokenKind) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.settings.issuer]);
        validation.leeway = 0;

        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => {
                    tracing::debug!("JWT validation error: {}", e);
                    TokenError::Malformed
                }
            })?;

        if claims.typ != kind {
            tracing::debug!(expected = ?kind, actual = ?claims.typ, "Token kind mismatch");
            return Err(TokenError::Malformed);
        }

        Ok(claims)
    }
}
