//! PostgreSQL-backed role documents and user role references.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use ecclesia_application::{
    CreateRoleInput, RoleDefinition, RoleRepository, RoleResolution, RoleResolutionRepository,
    UpdateRoleInput,
};
use ecclesia_core::{AppError, AppResult, RoleId, UserId};
use ecclesia_domain::Permission;

/// PostgreSQL implementation of the role ports.
#[derive(Clone)]
pub struct PostgresRoleRepository {
    pool: PgPool,
}

impl PostgresRoleRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_role_by_id(&self, role_id: Uuid) -> AppResult<Option<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                roles.is_system,
                roles.created_at,
                roles.updated_at,
                grants.permission
            FROM roles
            LEFT JOIN role_permissions AS grants
                ON grants.role_id = roles.id
            WHERE roles.id = $1
            ORDER BY grants.position
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load role '{role_id}': {error}")))?;

        Ok(aggregate_roles(rows)?.into_iter().next())
    }
}

#[derive(Debug, FromRow)]
struct RoleRow {
    role_id: Uuid,
    role_name: String,
    description: String,
    is_system: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    permission: Option<String>,
}

#[derive(Debug, FromRow)]
struct UserRoleRow {
    role_id: Option<Uuid>,
    role_name: Option<String>,
    description: Option<String>,
    is_system: Option<bool>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    permission: Option<String>,
}

#[async_trait]
impl RoleResolutionRepository for PostgresRoleRepository {
    async fn resolve_role_for_user(&self, user_id: UserId) -> AppResult<RoleResolution> {
        let rows = sqlx::query_as::<_, UserRoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                roles.is_system,
                roles.created_at,
                roles.updated_at,
                grants.permission
            FROM users
            LEFT JOIN roles
                ON roles.id = users.role_id
            LEFT JOIN role_permissions AS grants
                ON grants.role_id = roles.id
            WHERE users.id = $1
            ORDER BY grants.position
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to resolve role for user '{user_id}': {error}"))
        })?;

        if rows.is_empty() {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }

        let role_rows = rows
            .into_iter()
            .filter_map(|row| {
                Some(RoleRow {
                    role_id: row.role_id?,
                    role_name: row.role_name?,
                    description: row.description?,
                    is_system: row.is_system?,
                    created_at: row.created_at?,
                    updated_at: row.updated_at?,
                    permission: row.permission,
                })
            })
            .collect::<Vec<_>>();

        Ok(aggregate_roles(role_rows)?
            .into_iter()
            .next()
            .map_or(RoleResolution::Unassigned, RoleResolution::Resolved))
    }
}

#[async_trait]
impl RoleRepository for PostgresRoleRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let rows = sqlx::query_as::<_, RoleRow>(
            r#"
            SELECT
                roles.id AS role_id,
                roles.name AS role_name,
                roles.description,
                roles.is_system,
                roles.created_at,
                roles.updated_at,
                grants.permission
            FROM roles
            LEFT JOIN role_permissions AS grants
                ON grants.role_id = roles.id
            ORDER BY roles.name, grants.position
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to list roles: {error}")))?;

        aggregate_roles(rows)
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        let role_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT id
            FROM roles
            WHERE name = $1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to find role '{name}': {error}")))?;

        match role_id {
            Some(role_id) => self.find_role_by_id(role_id).await,
            None => Ok(None),
        }
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let role_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO roles (name, description, is_system)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.name.as_str())
        .bind(input.description.as_str())
        .bind(input.is_system)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|error| map_role_conflict(error, input.name.as_str(), "create role"))?;

        replace_permissions(&mut transaction, role_id, &input.permissions).await?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        self.find_role_by_id(role_id).await?.ok_or_else(|| {
            AppError::Internal(format!("role '{}' vanished after creation", input.name))
        })
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Internal(format!("failed to begin transaction: {error}"))
        })?;

        let new_name = input.name.as_ref().map(|name| name.as_str().to_owned());
        let updated = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE roles
            SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = now()
            WHERE id = $1
            RETURNING id
            "#,
        )
        .bind(role_id.as_uuid())
        .bind(new_name.as_deref())
        .bind(input.description.as_deref())
        .fetch_optional(&mut *transaction)
        .await
        .map_err(|error| {
            map_role_conflict(
                error,
                new_name.as_deref().unwrap_or_default(),
                "update role",
            )
        })?;

        if updated.is_none() {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }

        if let Some(permissions) = input.permissions.as_deref() {
            replace_permissions(&mut transaction, role_id.as_uuid(), permissions).await?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        self.find_role_by_id(role_id.as_uuid())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                if let sqlx::Error::Database(database_error) = &error
                    && database_error.code().as_deref() == Some("23503")
                {
                    return AppError::Conflict(format!(
                        "role '{role_id}' is still assigned to users"
                    ));
                }
                AppError::Internal(format!("failed to delete role '{role_id}': {error}"))
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE role_id = $1")
            .bind(role_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to count holders of role '{role_id}': {error}"))
            })?;

        Ok(u64::try_from(count).unwrap_or_default())
    }

    async fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET role_id = $2, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(user_id.as_uuid())
        .bind(role_id.map(|role_id| role_id.as_uuid()))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to set role for user '{user_id}': {error}"))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        }
        Ok(())
    }
}

async fn replace_permissions(
    transaction: &mut Transaction<'_, Postgres>,
    role_id: Uuid,
    permissions: &[Permission],
) -> AppResult<()> {
    sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to clear role grants: {error}")))?;

    for (position, permission) in permissions.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO role_permissions (role_id, permission, position)
            VALUES ($1, $2, $3)
            ON CONFLICT (role_id, permission) DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission.as_str())
        .bind(i32::try_from(position).unwrap_or(i32::MAX))
        .execute(&mut **transaction)
        .await
        .map_err(|error| AppError::Internal(format!("failed to persist role grants: {error}")))?;
    }

    Ok(())
}

/// Folds joined role/grant rows into role documents, keeping row order.
fn aggregate_roles(rows: Vec<RoleRow>) -> AppResult<Vec<RoleDefinition>> {
    let mut roles: Vec<RoleDefinition> = Vec::new();

    for row in rows {
        let is_same_role = roles
            .last()
            .is_some_and(|role| role.role_id.as_uuid() == row.role_id);
        if !is_same_role {
            roles.push(RoleDefinition {
                role_id: RoleId::from_uuid(row.role_id),
                name: row.role_name.clone(),
                description: row.description.clone(),
                permissions: Vec::new(),
                is_system: row.is_system,
                created_at: row.created_at,
                updated_at: row.updated_at,
            });
        }

        if let Some(permission_value) = row.permission {
            let permission = Permission::from_str(permission_value.as_str()).map_err(|error| {
                AppError::Internal(format!(
                    "invalid stored permission '{permission_value}' on role '{}': {error}",
                    row.role_name
                ))
            })?;
            if let Some(role) = roles.last_mut() {
                role.permissions.push(permission);
            }
        }
    }

    Ok(roles)
}

fn map_role_conflict(error: sqlx::Error, role_name: &str, operation: &str) -> AppError {
    if let sqlx::Error::Database(database_error) = &error
        && database_error.code().as_deref() == Some("23505")
    {
        return AppError::Conflict(format!("role '{role_name}' already exists"));
    }

    AppError::Internal(format!("failed to {operation}: {error}"))
}

#[cfg(test)]
mod tests;
