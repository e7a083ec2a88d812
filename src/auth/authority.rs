/// Token Authority
///
/// Issues, verifies and rotates token pairs against the user directory. The only
/// server-side token state is each principal's refresh slot:
///
/// ```text
/// EMPTY --login--> ISSUED --refresh--> ISSUED (rotated) --logout--> EMPTY
/// ```
///
/// Access tokens are verified statelessly (signature + expiry only).

use std::sync::Arc;

use uuid::Uuid;

use crate::auth::claims::{Identity, TokenKind};
use crate::auth::jwt::TokenSigner;
use crate::auth::password::{hash_password, verify_password};
use crate::auth::refresh_token::{fingerprint, matches_slot};
use crate::configuration::{JwtSettings, PasswordSettings};
use crate::directory::{NewPrincipal, Principal, SlotSwap, UserDirectory};
use crate::error::{AppError, AuthError, TokenError};

/// Freshly issued access/refresh pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Result of a successful login or refresh
#[derive(Debug, Clone)]
pub struct Session {
    pub identity: Identity,
    pub tokens: TokenPair,
}

/// Registration input, already validated
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub phone: String,
    pub password: String,
}

#[derive(Clone)]
pub struct TokenAuthority {
    directory: Arc<dyn UserDirectory>,
    signer: TokenSigner,
    password: PasswordSettings,
}

impl TokenAuthority {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        jwt: JwtSettings,
        password: PasswordSettings,
    ) -> Self {
        Self {
            directory,
            signer: TokenSigner::new(jwt),
            password,
        }
    }

    pub fn directory(&self) -> &Arc<dyn UserDirectory> {
        &self.directory
    }

    pub fn signer(&self) -> &TokenSigner {
        &self.signer
    }

    fn sign_pair(&self, identity: &Identity) -> Result<TokenPair, AppError> {
        Ok(TokenPair {
            access_token: self.signer.sign(identity, TokenKind::Access)?,
            refresh_token: self.signer.sign(identity, TokenKind::Refresh)?,
        })
    }

    /// Sign a new pair and store the refresh token in the principal's slot,
    /// overwriting (and thereby invalidating) whatever was there.
    ///
    /// # Errors
    /// * `NotFound` - the principal is absent or soft-deleted
    pub async fn issue(&self, principal: &Principal) -> Result<Session, AppError> {
        let identity = Identity {
            id: principal.id,
            email: principal.email.clone(),
        };
        let tokens = self.sign_pair(&identity)?;

        let stored = self
            .directory
            .set_refresh_slot(principal.id, Some(fingerprint(&tokens.refresh_token)))
            .await?;
        if !stored {
            return Err(AuthError::NotFound.into());
        }

        tracing::debug!(user_id = %principal.id, "Issued token pair");
        Ok(Session { identity, tokens })
    }

    /// Stateless access-token check: signature, issuer, kind and expiry.
    pub fn verify_access(&self, token: &str) -> Result<Identity, TokenError> {
        let claims = self.signer.verify(token, TokenKind::Access)?;
        Identity::try_from(claims)
    }

    /// Exchange a refresh token for a brand-new pair, rotating the slot.
    ///
    /// # Errors
    /// All wrapped in `AuthError::InvalidRefreshToken`:
    /// * `Expired` / `Malformed` - signature or expiry check failed
    /// * `UnknownPrincipal` - no active principal for the token's email
    /// * `Mismatch` - the token is not the one in the slot (already rotated, logged
    ///   out, or lost a concurrent race)
    pub async fn refresh(&self, refresh_token: &str) -> Result<Session, AppError> {
        let reject = |kind: TokenError| AppError::Auth(AuthError::InvalidRefreshToken(kind));

        let claims = self
            .signer
            .verify(refresh_token, TokenKind::Refresh)
            .map_err(reject)?;

        let principal = self
            .directory
            .find_by_email(&claims.email)
            .await?
            .ok_or_else(|| {
                tracing::info!("Refresh token names an unknown or deleted principal");
                reject(TokenError::UnknownPrincipal)
            })?;

        if !matches_slot(refresh_token, principal.refresh_slot.as_deref()) {
            tracing::warn!(
                user_id = %principal.id,
                "Presented refresh token does not match the active slot"
            );
            return Err(reject(TokenError::Mismatch));
        }

        let identity = Identity {
            id: principal.id,
            email: principal.email.clone(),
        };
        let tokens = self.sign_pair(&identity)?;

        let outcome = self
            .directory
            .swap_refresh_slot(
                principal.id,
                &fingerprint(refresh_token),
                fingerprint(&tokens.refresh_token),
            )
            .await?;

        match outcome {
            SlotSwap::Swapped => {
                tracing::info!(user_id = %principal.id, "Refresh token rotated");
                Ok(Session { identity, tokens })
            }
            SlotSwap::Stale => {
                tracing::warn!(user_id = %principal.id, "Lost refresh rotation race");
                Err(reject(TokenError::Mismatch))
            }
            SlotSwap::Missing => Err(reject(TokenError::UnknownPrincipal)),
        }
    }

    /// Authenticate with email and password, then issue a pair.
    ///
    /// Unknown email and wrong password fail identically to prevent enumeration.
    pub async fn login(&self, email: &str, password: &str) -> Result<Session, AppError> {
        let principal = match self.directory.find_by_email(email).await? {
            Some(principal) => principal,
            None => return Err(AuthError::InvalidCredentials.into()),
        };

        if !verify_password(password, &principal.credential_hash).await? {
            return Err(AuthError::InvalidCredentials.into());
        }

        self.issue(&principal).await
    }

    /// Clear the principal's refresh slot. Idempotent.
    ///
    /// # Errors
    /// * `NotFound` - the principal is absent or soft-deleted
    pub async fn logout(&self, principal_id: Uuid) -> Result<(), AppError> {
        if !self.directory.set_refresh_slot(principal_id, None).await? {
            return Err(AuthError::NotFound.into());
        }
        tracing::info!(user_id = %principal_id, "Refresh slot cleared");
        Ok(())
    }

    /// Create a principal with an empty refresh slot.
    ///
    /// # Errors
    /// * `UserExists` - an active principal already uses this email
    /// * `Validation` - password length out of bounds
    pub async fn register(&self, registration: Registration) -> Result<Principal, AppError> {
        if self.directory.find_by_email(&registration.email).await?.is_some() {
            return Err(AuthError::UserExists.into());
        }

        let credential_hash = hash_password(&registration.password, self.password.hash_cost).await?;

        // The unique index still guards against a concurrent registration.
        self.directory
            .insert(NewPrincipal {
                email: registration.email,
                phone: registration.phone,
                credential_hash,
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::Claims;
    use crate::directory::InMemoryDirectory;

    fn authority() -> TokenAuthority {
        TokenAuthority::new(
            Arc::new(InMemoryDirectory::new()),
            JwtSettings {
                secret: "test-secret-key-at-least-32-characters-long".to_string(),
                access_token_expiry: 900,
                refresh_token_expiry: 604800,
                issuer: "test".to_string(),
            },
            PasswordSettings { hash_cost: 4 },
        )
    }

    async fn registered(authority: &TokenAuthority) -> Principal {
        authority
            .register(Registration {
                email: "user@example.com".to_string(),
                phone: "+1 555 0100".to_string(),
                password: "secret123".to_string(),
            })
            .await
            .expect("registration failed")
    }

    fn refresh_kind(err: AppError) -> TokenError {
        match err {
            AppError::Auth(AuthError::InvalidRefreshToken(kind)) => kind,
            other => panic!("expected refresh rejection, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn register_starts_with_empty_slot() {
        let authority = authority();
        let principal = registered(&authority).await;
        assert!(principal.refresh_slot.is_none());
    }

    #[tokio::test]
    async fn register_rejects_active_duplicate() {
        let authority = authority();
        registered(&authority).await;

        let err = authority
            .register(Registration {
                email: "user@example.com".to_string(),
                phone: "+1 555 0199".to_string(),
                password: "another-pass".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.auth_kind(), Some(&AuthError::UserExists));
    }

    #[tokio::test]
    async fn issue_stores_exactly_one_slot_value() {
        let authority = authority();
        let principal = registered(&authority).await;

        let session = authority.issue(&principal).await.unwrap();
        let stored = authority.directory().find_by_id(principal.id).await.unwrap().unwrap();

        assert_eq!(stored.refresh_slot, Some(fingerprint(&session.tokens.refresh_token)));
    }

    #[tokio::test]
    async fn second_issue_invalidates_first() {
        let authority = authority();
        let principal = registered(&authority).await;

        let first = authority.issue(&principal).await.unwrap();
        let _second = authority.issue(&principal).await.unwrap();

        let err = authority.refresh(&first.tokens.refresh_token).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Mismatch);
    }

    #[tokio::test]
    async fn verify_access_round_trips_identity() {
        let authority = authority();
        let principal = registered(&authority).await;

        let session = authority.issue(&principal).await.unwrap();
        let identity = authority.verify_access(&session.tokens.access_token).unwrap();

        assert_eq!(identity.id, principal.id);
        assert_eq!(identity.email, principal.email);
    }

    #[tokio::test]
    async fn verify_access_rejects_refresh_tokens_and_garbage() {
        let authority = authority();
        let principal = registered(&authority).await;
        let session = authority.issue(&principal).await.unwrap();

        assert_eq!(
            authority.verify_access(&session.tokens.refresh_token),
            Err(TokenError::Malformed)
        );
        assert_eq!(authority.verify_access("garbage"), Err(TokenError::Malformed));
    }

    #[tokio::test]
    async fn verify_access_reports_expiry() {
        let authority = authority();
        let principal = registered(&authority).await;
        let expired = authority
            .signer()
            .encode(&Claims::new(
                principal.id,
                principal.email.clone(),
                -60,
                "test".to_string(),
                TokenKind::Access,
            ))
            .unwrap();

        assert_eq!(authority.verify_access(&expired), Err(TokenError::Expired));
    }

    #[tokio::test]
    async fn verify_access_ignores_soft_delete() {
        let authority = authority();
        let principal = registered(&authority).await;
        let session = authority.issue(&principal).await.unwrap();

        authority.directory().soft_delete(principal.id).await.unwrap();

        assert!(authority.verify_access(&session.tokens.access_token).is_ok());
        let err = authority.refresh(&session.tokens.refresh_token).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::UnknownPrincipal);
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_replay() {
        let authority = authority();
        let principal = registered(&authority).await;
        let original = authority.issue(&principal).await.unwrap();

        let rotated = authority.refresh(&original.tokens.refresh_token).await.unwrap();
        assert_ne!(rotated.tokens.refresh_token, original.tokens.refresh_token);
        assert_eq!(rotated.identity.id, principal.id);

        let err = authority.refresh(&original.tokens.refresh_token).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Mismatch);

        // The rotated token keeps working.
        assert!(authority.refresh(&rotated.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test]
    async fn refresh_distinguishes_expired_and_malformed() {
        let authority = authority();
        let principal = registered(&authority).await;
        let expired = authority
            .signer()
            .encode(&Claims::new(
                principal.id,
                principal.email.clone(),
                -60,
                "test".to_string(),
                TokenKind::Refresh,
            ))
            .unwrap();

        let err = authority.refresh(&expired).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Expired);

        let err = authority.refresh("never-issued").await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Malformed);
    }

    #[tokio::test]
    async fn refresh_with_signed_but_never_issued_token_is_mismatch() {
        let authority = authority();
        let principal = registered(&authority).await;
        authority.issue(&principal).await.unwrap();

        let forged = authority
            .signer()
            .sign(
                &Identity {
                    id: principal.id,
                    email: principal.email.clone(),
                },
                TokenKind::Refresh,
            )
            .unwrap();

        let err = authority.refresh(&forged).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Mismatch);
    }

    #[tokio::test]
    async fn logout_is_idempotent_and_blocks_refresh() {
        let authority = authority();
        let principal = registered(&authority).await;
        let session = authority.issue(&principal).await.unwrap();

        authority.logout(principal.id).await.unwrap();
        authority.logout(principal.id).await.unwrap();

        let err = authority.refresh(&session.tokens.refresh_token).await.unwrap_err();
        assert_eq!(refresh_kind(err), TokenError::Mismatch);
    }

    #[tokio::test]
    async fn logout_unknown_principal_is_not_found() {
        let authority = authority();
        let err = authority.logout(Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.auth_kind(), Some(&AuthError::NotFound));
    }

    #[tokio::test]
    async fn login_failures_are_indistinguishable() {
        let authority = authority();
        registered(&authority).await;

        let wrong_password = authority.login("user@example.com", "wrong-pass").await.unwrap_err();
        let unknown_email = authority.login("nobody@example.com", "secret123").await.unwrap_err();

        assert_eq!(wrong_password.auth_kind(), Some(&AuthError::InvalidCredentials));
        assert_eq!(unknown_email.auth_kind(), Some(&AuthError::InvalidCredentials));
        assert_eq!(wrong_password.to_string(), unknown_email.to_string());
    }

    #[tokio::test]
    async fn login_issues_pair() {
        let authority = authority();
        let principal = registered(&authority).await;

        let session = authority.login("user@example.com", "secret123").await.unwrap();

        assert_eq!(session.identity.id, principal.id);
        assert!(!session.tokens.access_token.is_empty());
        assert!(authority.refresh(&session.tokens.refresh_token).await.is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_refresh_has_exactly_one_winner() {
        let authority = authority();
        let principal = registered(&authority).await;
        let session = authority.issue(&principal).await.unwrap();

        let attempts = (0..16).map(|_| {
            let authority = authority.clone();
            let token = session.tokens.refresh_token.clone();
            tokio::spawn(async move { authority.refresh(&token).await })
        });
        let results = futures::future::join_all(attempts).await;

        let mut winners = 0;
        for result in results {
            match result.expect("task panicked") {
                Ok(_) => winners += 1,
                Err(err) => assert_eq!(refresh_kind(err), TokenError::Mismatch),
            }
        }
        assert_eq!(winners, 1);
    }
}
