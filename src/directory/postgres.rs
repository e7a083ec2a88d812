/// Postgres Directory
///
/// `UserDirectory` over the `users` table with sqlx.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{NewPrincipal, Principal, SlotSwap, UserDirectory};
use crate::error::{AppError, AuthError, DatabaseError};

/// Postgres-backed directory over the `users` table.
///
/// Slot rotation is a single conditional `UPDATE`, so concurrent refreshes for the
/// same principal serialize on the row lock and exactly one of them matches.
#[derive(Clone)]
pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    email: String,
    phone: String,
    password_hash: String,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    deleted_at: Option<DateTime<Utc>>,
}

impl From<PrincipalRow> for Principal {
    fn from(row: PrincipalRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            phone: row.phone,
            credential_hash: row.password_hash,
            refresh_slot: row.refresh_token,
            created_at: row.created_at,
            updated_at: row.updated_at,
            deleted_at: row.deleted_at,
        }
    }
}

const SELECT_PRINCIPAL: &str = r#"
    SELECT id, email, phone, password_hash, refresh_token, created_at, updated_at, deleted_at
    FROM users
"#;

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn find_by_email(&self, email: &str) -> Result<Option<Principal>, AppError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "{} WHERE email = $1 AND deleted_at IS NULL",
            SELECT_PRINCIPAL
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Principal::from))
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Principal>, AppError> {
        let row = sqlx::query_as::<_, PrincipalRow>(&format!(
            "{} WHERE id = $1 AND deleted_at IS NULL",
            SELECT_PRINCIPAL
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Principal::from))
    }

    async fn insert(&self, principal: NewPrincipal) -> Result<Principal, AppError> {
        let now = Utc::now();
        let row = sqlx::query_as::<_, PrincipalRow>(
            r#"
            INSERT INTO users (id, email, phone, password_hash, refresh_token, created_at, updated_at)
            VALUES ($1, $2, $3, $4, NULL, $5, $5)
            RETURNING id, email, phone, password_hash, refresh_token, created_at, updated_at, deleted_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&principal.email)
        .bind(&principal.phone)
        .bind(&principal.credential_hash)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Database(DatabaseError::UniqueConstraintViolation(_)) => {
                AppError::Auth(AuthError::UserExists)
            }
            other => other,
        })?;

        Ok(row.into())
    }

    async fn set_refresh_slot(&self, id: Uuid, value: Option<String>) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = $2
            WHERE id = $3 AND deleted_at IS NULL
            "#,
        )
        .bind(value)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn swap_refresh_slot(
        &self,
        id: Uuid,
        expected: &str,
        replacement: String,
    ) -> Result<SlotSwap, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET refresh_token = $1, updated_at = $2
            WHERE id = $3 AND deleted_at IS NULL AND refresh_token = $4
            "#,
        )
        .bind(replacement)
        .bind(Utc::now())
        .bind(id)
        .bind(expected)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(SlotSwap::Swapped);
        }

        // Nothing matched: distinguish a rotated slot from a vanished principal.
        Ok(match self.find_by_id(id).await? {
            Some(_) => SlotSwap::Stale,
            None => SlotSwap::Missing,
        })
    }

    async fn soft_delete(&self, id: Uuid) -> Result<bool, AppError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE users
            SET deleted_at = $1, updated_at = $1, refresh_token = NULL
            WHERE id = $2 AND deleted_at IS NULL
            "#,
        )
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
