//! PostgreSQL-backed user accounts.

use async_trait::async_trait;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use ecclesia_application::{NewUser, UserRecord, UserRepository};
use ecclesia_core::{AppError, AppResult, RoleId, UserId};

/// PostgreSQL implementation of the user repository port.
#[derive(Clone)]
pub struct PostgresUserRepository {
    pool: PgPool,
}

impl PostgresUserRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    email: String,
    display_name: String,
    password_hash: String,
    role_id: Option<Uuid>,
    role_name: Option<String>,
}

impl From<UserRow> for UserRecord {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId::from_uuid(row.id),
            email: row.email,
            display_name: row.display_name,
            password_hash: row.password_hash,
            role_id: row.role_id.map(RoleId::from_uuid),
            role_name: row.role_name,
        }
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT users.id, users.email, users.display_name, users.password_hash,
                   users.role_id, roles.name AS role_name
            FROM users
            LEFT JOIN roles ON roles.id = users.role_id
            WHERE LOWER(users.email) = LOWER($1)
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by email: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let row = sqlx::query_as::<_, UserRow>(
            r#"
            SELECT users.id, users.email, users.display_name, users.password_hash,
                   users.role_id, roles.name AS role_name
            FROM users
            LEFT JOIN roles ON roles.id = users.role_id
            WHERE users.id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find user by id: {error}")))?;

        Ok(row.map(UserRecord::from))
    }

    async fn create_user(&self, user: NewUser) -> AppResult<UserRecord> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO users (email, display_name, password_hash, role_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(user.email.as_str())
        .bind(user.display_name.as_str())
        .bind(user.password_hash.as_str())
        .bind(user.role_id.map(|role_id| role_id.as_uuid()))
        .fetch_one(&self.pool)
        .await
        .map_err(|error| email_conflict_or_internal(error, "create user"))?;

        self.find_by_id(UserId::from_uuid(user_id))
            .await?
            .ok_or_else(|| AppError::Internal(format!("user '{user_id}' vanished after creation")))
    }
}

fn email_conflict_or_internal(error: sqlx::Error, operation: &str) -> AppError {
    if let sqlx::Error::Database(ref database_error) = error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict("an account with this email already exists".to_owned());
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}
