/// In-Memory Directory
///
/// `UserDirectory` kept in a mutex-guarded map. Same contract as the Postgres
/// directory, including soft delete and compare-and-set on the refresh slot.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{NewPrincipal, Principal, SlotSwap, UserDirectory};
use crate::error::{AppError, AuthError};

/// Directory held in process memory. Used by tests and local runs without Postgres.
///
/// All slot operations happen under one mutex, so compare-and-set is atomic.
#[derive(Default)]
pub struct InMemoryDirectory {
    principals: Mutex<HashMap<Uuid, Principal>>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn principals(&self) -> Result<MutexGuard<'_, HashMap<Uuid, Principal>>, AppError> {
        self.principals
            .lock()
            .map_err(|_| AppError::Internal("principal store lock poisoned".to_string()))
    }
}

fn active(map: &mut HashMap<Uuid, Principal>, id: Uuid) -> Option<&mut Principal> {
    map.get_mut(&id).filter(|p| p.is_active())
}

#[async_trait]
impl UserDirectory for InMemoryDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        Ok(self
            .principals()?
            .values()
            .find(|p| p.is_active() && p.email == email)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        Ok(self.principals()?.get(&id).filter(|p| p.is_active()).cloned())
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, AppError> {
        let mut map = self.principals()?;
        if map.values().any(|p| p.is_active() && p.email == principal.email) {
            return Err(AuthError::UserExists.into());
        }

        let now = Utc::now();
        let record = Principal {
            id: Uuid::new_v4(),
            email: principal.email,
            phone: principal.phone,
            credential_hash: principal.credential_hash,
            refresh_slot: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        map.insert(record.id, record.clone());
        Ok(record)
    }

    async fn set_refresh_slot(&self, id: Uuid, value: Option<String>) -> Result<bool, AppError> {
        let mut map = self.principals()?;
        Ok(match active(&mut map, id) {
            Some(principal) => {
                principal.refresh_slot = value;
                principal.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn swap_refresh_slot(
        &self,
        id: Uuid,
        expected: &str,
        replacement: String,
    ) -> Result<SlotSwap, AppError> {
        let mut map = self.principals()?;
        let Some(principal) = active(&mut map, id) else {
            return Ok(SlotSwap::Missing);
        };
        if principal.refresh_slot.as_deref() != Some(expected) {
            return Ok(SlotSwap::Stale);
        }
        principal.refresh_slot = Some(replacement);
        principal.updated_at = Utc::now();
        Ok(SlotSwap::Swapped)
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let mut map = self.principals()?;
        Ok(match active(&mut map, id) {
            Some(principal) => {
                let now = Utc::now();
                principal.deleted_at = Some(now);
                principal.updated_at = now;
                principal.refresh_slot = None;
                true
            }
            None => false,
        })
    }
}
