//! PostgreSQL-backed bearer token digests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use ecclesia_application::AuthTokenRepository;
use ecclesia_core::{AppError, AppResult, UserId};

/// PostgreSQL implementation of the auth token repository port.
#[derive(Clone)]
pub struct PostgresAuthTokenRepository {
    pool: PgPool,
}

impl PostgresAuthTokenRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes tokens that expired before `now`. Returns the number removed.
    pub async fn delete_expired(&self, now: DateTime<Utc>) -> AppResult<u64> {
        sqlx::query("DELETE FROM auth_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map(|result| result.rows_affected())
            .map_err(|error| {
                AppError::Internal(format!("failed to delete expired auth tokens: {error}"))
            })
    }
}

#[async_trait]
impl AuthTokenRepository for PostgresAuthTokenRepository {
    async fn issue_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (user_id, token_hash, expires_at)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(token_hash)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to create auth token: {error}")))?;

        Ok(())
    }

    async fn find_user_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT user_id
            FROM auth_tokens
            WHERE token_hash = $1
                AND revoked_at IS NULL
                AND expires_at > $2
            "#,
        )
        .bind(token_hash)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to resolve auth token: {error}")))?;

        Ok(user_id.map(UserId::from_uuid))
    }

    async fn revoke_token(&self, token_hash: &str) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE auth_tokens
            SET revoked_at = now()
            WHERE token_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(token_hash)
        .execute(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to revoke auth token: {error}")))?;

        Ok(result.rows_affected() > 0)
    }
}
