use async_trait::async_trait;
use chrono::{DateTime, Utc};

use ecclesia_core::{AppResult, RoleId, UserId};
use ecclesia_domain::{EffectivePermissions, Permission, RoleName};

/// Role document as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleDefinition {
    /// Stable role identifier.
    pub role_id: RoleId,
    /// Unique lowercase role name.
    pub name: String,
    /// Human-readable description.
    pub description: String,
    /// Stored permission tokens, before expansion.
    pub permissions: Vec<Permission>,
    /// System roles cannot be renamed or deleted.
    pub is_system: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp.
    pub updated_at: DateTime<Utc>,
}

impl RoleDefinition {
    /// Expands the stored permissions for authorization checks.
    #[must_use]
    pub fn effective_permissions(&self) -> EffectivePermissions {
        EffectivePermissions::resolve(self.name.as_str(), &self.permissions)
    }
}

/// Outcome of looking up the role a user currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleResolution {
    /// The user exists but holds no role reference.
    Unassigned,
    /// The user's current role document.
    Resolved(RoleDefinition),
}

/// Input for creating a role document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateRoleInput {
    /// Validated role name.
    pub name: RoleName,
    /// Human-readable description.
    pub description: String,
    /// Permission tokens to store.
    pub permissions: Vec<Permission>,
    /// Marks a seeded system role.
    pub is_system: bool,
}

/// Partial update for a role document. `None` keeps the stored value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateRoleInput {
    /// New role name.
    pub name: Option<RoleName>,
    /// New description.
    pub description: Option<String>,
    /// Replacement permission list.
    pub permissions: Option<Vec<Permission>>,
}

/// Read port used by the authorization gate.
#[async_trait]
pub trait RoleResolutionRepository: Send + Sync {
    /// Loads the current role document of a user.
    ///
    /// Returns `NotFound` when the user itself does not exist.
    async fn resolve_role_for_user(&self, user_id: UserId) -> AppResult<RoleResolution>;
}

/// Repository port for role administration.
#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Lists every role ordered by name.
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>>;

    /// Finds a role by its exact name.
    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>>;

    /// Stores a new role. Duplicate names fail with `Conflict`.
    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition>;

    /// Applies a partial update and returns the stored result.
    async fn update_role(&self, role_id: RoleId, input: UpdateRoleInput)
    -> AppResult<RoleDefinition>;

    /// Deletes a role document.
    async fn delete_role(&self, role_id: RoleId) -> AppResult<()>;

    /// Counts users currently referencing the role.
    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64>;

    /// Replaces a user's role reference. `None` clears it.
    ///
    /// Returns `NotFound` when the user does not exist.
    async fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()>;
}
