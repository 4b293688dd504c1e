//! Role administration.

use std::sync::Arc;

use tracing::info;

use ecclesia_core::{AppError, AppResult, UserId, UserIdentity};
use ecclesia_domain::{Permission, RoleName, SystemRole};

use crate::{
    AuthorizationService, CreateRoleInput, RoleDefinition, RoleRepository, UpdateRoleInput,
};

/// Request to create a custom role. Permission tokens arrive unparsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleRequest {
    /// Role name, normalised before storage.
    pub name: String,
    /// Description.
    pub description: String,
    /// Permission tokens.
    pub permissions: Vec<String>,
}

/// Partial role update. Permission tokens arrive unparsed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleRequest {
    /// New name; rejected for system roles.
    pub name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// Replacement permission tokens.
    pub permissions: Option<Vec<String>>,
}

/// Application service for roles and user role assignment.
#[derive(Clone)]
pub struct RoleAdminService {
    authorization_service: AuthorizationService,
    repository: Arc<dyn RoleRepository>,
}

impl RoleAdminService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        authorization_service: AuthorizationService,
        repository: Arc<dyn RoleRepository>,
    ) -> Self {
        Self {
            authorization_service,
            repository,
        }
    }

    /// Lists every role.
    pub async fn list_roles(&self, actor: &UserIdentity) -> AppResult<Vec<RoleDefinition>> {
        self.require_role_manage_permission(actor).await?;
        self.repository.list_roles().await
    }

    /// Returns one role by name.
    pub async fn get_role(
        &self,
        actor: &UserIdentity,
        role_name: &str,
    ) -> AppResult<RoleDefinition> {
        self.require_role_manage_permission(actor).await?;
        self.find_existing(role_name).await
    }

    /// Creates a custom role.
    pub async fn create_role(
        &self,
        actor: &UserIdentity,
        request: CreateRoleRequest,
    ) -> AppResult<RoleDefinition> {
        self.require_role_manage_permission(actor).await?;

        let name = RoleName::new(request.name.as_str())?;
        let permissions = Permission::parse_all(request.permissions.as_slice())?;
        let role = self
            .repository
            .create_role(CreateRoleInput {
                name,
                description: request.description.trim().to_owned(),
                permissions,
                is_system: false,
            })
            .await?;

        info!(role = %role.name, actor = %actor.user_id(), "role created");
        Ok(role)
    }

    /// Updates a role's name, description or permissions.
    ///
    /// System roles keep their names; permission edits take effect on the
    /// holders' next request.
    pub async fn update_role(
        &self,
        actor: &UserIdentity,
        role_name: &str,
        request: UpdateRoleRequest,
    ) -> AppResult<RoleDefinition> {
        self.require_role_manage_permission(actor).await?;

        let existing = self.find_existing(role_name).await?;
        let name = request.name.as_deref().map(RoleName::new).transpose()?;
        if existing.is_system
            && name
                .as_ref()
                .is_some_and(|name| name.as_str() != existing.name)
        {
            return Err(AppError::Validation(format!(
                "system role '{}' cannot be renamed",
                existing.name
            )));
        }

        let permissions = request
            .permissions
            .as_deref()
            .map(Permission::parse_all)
            .transpose()?;

        let role = self
            .repository
            .update_role(
                existing.role_id,
                UpdateRoleInput {
                    name,
                    description: request
                        .description
                        .map(|description| description.trim().to_owned()),
                    permissions,
                },
            )
            .await?;

        info!(role = %role.name, actor = %actor.user_id(), "role updated");
        Ok(role)
    }

    /// Deletes a custom role that no user references.
    pub async fn delete_role(&self, actor: &UserIdentity, role_name: &str) -> AppResult<()> {
        self.require_role_manage_permission(actor).await?;

        let existing = self.find_existing(role_name).await?;
        if existing.is_system {
            return Err(AppError::Forbidden(format!(
                "system role '{}' cannot be deleted",
                existing.name
            )));
        }

        let holders = self
            .repository
            .count_users_with_role(existing.role_id)
            .await?;
        if holders > 0 {
            return Err(AppError::Conflict(format!(
                "role '{}' is still assigned to {holders} user(s)",
                existing.name
            )));
        }

        self.repository.delete_role(existing.role_id).await?;
        info!(role = %existing.name, actor = %actor.user_id(), "role deleted");
        Ok(())
    }

    /// Points a user at a role.
    pub async fn assign_role(
        &self,
        actor: &UserIdentity,
        user_id: UserId,
        role_name: &str,
    ) -> AppResult<RoleDefinition> {
        self.require_role_manage_permission(actor).await?;

        let role = self.find_existing(role_name).await?;
        self.repository
            .set_user_role(user_id, Some(role.role_id))
            .await?;

        info!(%user_id, role = %role.name, actor = %actor.user_id(), "role assigned");
        Ok(role)
    }

    /// Clears a user's role reference. The user is denied everything until a
    /// role is assigned again.
    pub async fn clear_role(&self, actor: &UserIdentity, user_id: UserId) -> AppResult<()> {
        self.require_role_manage_permission(actor).await?;
        self.repository.set_user_role(user_id, None).await?;
        info!(%user_id, actor = %actor.user_id(), "role cleared");
        Ok(())
    }

    /// Inserts missing system roles. Existing roles are left untouched, so
    /// admin edits to their permission lists survive restarts.
    ///
    /// Returns the number of roles inserted.
    pub async fn seed_system_roles(&self) -> AppResult<usize> {
        let mut inserted = 0;
        for system_role in SystemRole::all() {
            if self
                .repository
                .find_role_by_name(system_role.name())
                .await?
                .is_some()
            {
                continue;
            }

            let created = self
                .repository
                .create_role(CreateRoleInput {
                    name: RoleName::new(system_role.name())?,
                    description: system_role.description().to_owned(),
                    permissions: system_role.default_permissions(),
                    is_system: true,
                })
                .await;

            match created {
                Ok(_) => inserted += 1,
                // Another instance seeded it concurrently.
                Err(AppError::Conflict(_)) => {}
                Err(error) => return Err(error),
            }
        }

        if inserted > 0 {
            info!(inserted, "seeded system roles");
        }
        Ok(inserted)
    }

    async fn find_existing(&self, role_name: &str) -> AppResult<RoleDefinition> {
        let normalized = RoleName::new(role_name)?;
        self.repository
            .find_role_by_name(normalized.as_str())
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{normalized}' not found")))
    }

    async fn require_role_manage_permission(&self, actor: &UserIdentity) -> AppResult<()> {
        self.authorization_service
            .require_permission(actor, Permission::ManageRoles)
            .await?;
        Ok(())
    }
}
