/// User Directory
///
/// Persisted principal records, each with a single refresh-token slot. Every lookup
/// excludes soft-deleted records. Slot writes are the only state the token authority
/// keeps, and `swap_refresh_slot` is the compare-and-set that makes rotation atomic
/// per principal.

mod memory;
mod postgres;

pub use memory::InMemoryDirectory;
pub use postgres::PgUserDirectory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::AppError;

/// Stored principal record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub id: Uuid,
    pub email: String,
    pub phone: String,
    pub credential_hash: String,
    /// Fingerprint of the one active refresh token, `None` when logged out
    pub refresh_slot: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Principal {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// Fields needed to create a principal
#[derive(Debug, Clone)]
pub struct NewPrincipal {
    pub email: String,
    pub phone: String,
    pub credential_hash: String,
}

/// Outcome of a compare-and-set on a refresh slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSwap {
    /// Slot held the expected value and now holds the replacement.
    Swapped,
    /// Slot held something else; nothing was written.
    Stale,
    /// No active principal with that id.
    Missing,
}

#[async_trait]
pub trait UserDirectory: Send + Sync + 'static {
    /// Active principal by exact (case-sensitive) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError>;

    /// Active principal by id.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError>;

    /// Create a principal with an empty refresh slot.
    ///
    /// # Errors
    /// * `AuthError::UserExists` - an active principal already has this email
    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, AppError>;

    /// Unconditionally overwrite the refresh slot. Returns `false` if no active
    /// principal has this id.
    async fn set_refresh_slot(&self, id: Uuid, value: Option<String>) -> Result<bool, AppError>;

    /// Replace the refresh slot only if it currently holds `expected`.
    async fn swap_refresh_slot(
        &self,
        id: Uuid,
        expected: &str,
        replacement: String,
    ) -> Result<SlotSwap, AppError>;

    /// Mark a principal deleted. Returns `false` if it was not active.
    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError>;
}
