use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

use ecclesia_application::{
    AuthTokenRepository, CreateRoleInput, NewUser, RoleDefinition, RoleRepository,
    RoleResolution, RoleResolutionRepository, UpdateRoleInput, UserRecord, UserRepository,
};
use ecclesia_core::{AppError, AppResult, RoleId, UserId};
use ecclesia_domain::SystemRole;

#[derive(Debug, Clone)]
struct StoredToken {
    user_id: UserId,
    token_hash: String,
    expires_at: DateTime<Utc>,
    revoked: bool,
}

/// In-memory roles, users and bearer tokens for tests and local development.
#[derive(Debug, Default)]
pub struct InMemorySecurityRepository {
    roles: RwLock<Vec<RoleDefinition>>,
    users: RwLock<Vec<UserRecord>>,
    tokens: RwLock<Vec<StoredToken>>,
}

impl InMemorySecurityRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a repository holding the system roles with their default grants.
    #[must_use]
    pub fn seeded() -> Self {
        let now = Utc::now();
        let roles = SystemRole::all()
            .iter()
            .map(|system_role| RoleDefinition {
                role_id: RoleId::new(),
                name: system_role.name().to_owned(),
                description: system_role.description().to_owned(),
                permissions: system_role.default_permissions(),
                is_system: true,
                created_at: now,
                updated_at: now,
            })
            .collect();

        Self {
            roles: RwLock::new(roles),
            ..Self::default()
        }
    }

    /// Drops tokens that expired before `now`. Returns the number removed.
    pub async fn delete_expired_tokens(&self, now: DateTime<Utc>) -> u64 {
        let mut tokens = self.tokens.write().await;
        let before = tokens.len();
        tokens.retain(|token| token.expires_at > now);
        (before - tokens.len()) as u64
    }

    fn role_name_for(roles: &[RoleDefinition], role_id: Option<RoleId>) -> Option<String> {
        let role_id = role_id?;
        roles
            .iter()
            .find(|role| role.role_id == role_id)
            .map(|role| role.name.clone())
    }

    async fn with_role_name(&self, mut record: UserRecord) -> UserRecord {
        record.role_name = Self::role_name_for(&self.roles.read().await, record.role_id);
        record
    }
}

#[async_trait]
impl RoleResolutionRepository for InMemorySecurityRepository {
    async fn resolve_role_for_user(&self, user_id: UserId) -> AppResult<RoleResolution> {
        let role_id = self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.id == user_id)
            .map(|user| user.role_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;

        let Some(role_id) = role_id else {
            return Ok(RoleResolution::Unassigned);
        };

        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned()
            .map_or(RoleResolution::Unassigned, RoleResolution::Resolved))
    }
}

#[async_trait]
impl RoleRepository for InMemorySecurityRepository {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let mut roles = self.roles.read().await.clone();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self
            .roles
            .read()
            .await
            .iter()
            .find(|role| role.name == name)
            .cloned())
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.write().await;
        if roles.iter().any(|role| role.name == input.name.as_str()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name.as_str()
            )));
        }

        let now = Utc::now();
        let mut permissions = Vec::with_capacity(input.permissions.len());
        for permission in input.permissions {
            if !permissions.contains(&permission) {
                permissions.push(permission);
            }
        }

        let role = RoleDefinition {
            role_id: RoleId::new(),
            name: input.name.as_str().to_owned(),
            description: input.description,
            permissions,
            is_system: input.is_system,
            created_at: now,
            updated_at: now,
        };
        roles.push(role.clone());
        debug!(role = %role.name, "role created in memory");
        Ok(role)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.write().await;
        if let Some(name) = input.name.as_ref()
            && roles
                .iter()
                .any(|role| role.role_id != role_id && role.name == name.as_str())
        {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                name.as_str()
            )));
        }

        let role = roles
            .iter_mut()
            .find(|role| role.role_id == role_id)
            .ok_or_else(|| AppError::NotFound(format!("role '{role_id}' not found")))?;

        if let Some(name) = input.name {
            role.name = name.as_str().to_owned();
        }
        if let Some(description) = input.description {
            role.description = description;
        }
        if let Some(permissions) = input.permissions {
            role.permissions.clear();
            for permission in permissions {
                if !role.permissions.contains(&permission) {
                    role.permissions.push(permission);
                }
            }
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        if self
            .users
            .read()
            .await
            .iter()
            .any(|user| user.role_id == Some(role_id))
        {
            return Err(AppError::Conflict(format!(
                "role '{role_id}' is still assigned to users"
            )));
        }

        let mut roles = self.roles.write().await;
        let before = roles.len();
        roles.retain(|role| role.role_id != role_id);
        if roles.len() == before {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        }
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64> {
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|user| user.role_id == Some(role_id))
            .count() as u64)
    }

    async fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()> {
        let mut users = self.users.write().await;
        let user = users
            .iter_mut()
            .find(|user| user.id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("user '{user_id}' not found")))?;
        user.role_id = role_id;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemorySecurityRepository {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let found = self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned();

        match found {
            Some(record) => Ok(Some(self.with_role_name(record).await)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let found = self
            .users
            .read()
            .await
            .iter()
            .find(|user| user.id == user_id)
            .cloned();

        match found {
            Some(record) => Ok(Some(self.with_role_name(record).await)),
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: NewUser) -> AppResult<UserRecord> {
        let record = {
            let mut users = self.users.write().await;
            if users
                .iter()
                .any(|existing| existing.email.eq_ignore_ascii_case(user.email.as_str()))
            {
                return Err(AppError::Conflict(format!(
                    "user with email '{}' already exists",
                    user.email
                )));
            }

            let record = UserRecord {
                id: UserId::new(),
                email: user.email,
                display_name: user.display_name,
                password_hash: user.password_hash,
                role_id: user.role_id,
                role_name: None,
            };
            users.push(record.clone());
            record
        };

        Ok(self.with_role_name(record).await)
    }
}

#[async_trait]
impl AuthTokenRepository for InMemorySecurityRepository {
    async fn issue_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.tokens.write().await.push(StoredToken {
            user_id,
            token_hash: token_hash.to_owned(),
            expires_at,
            revoked: false,
        });
        Ok(())
    }

    async fn find_user_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>> {
        Ok(self
            .tokens
            .read()
            .await
            .iter()
            .find(|token| token.token_hash == token_hash && !token.revoked && token.expires_at > now)
            .map(|token| token.user_id))
    }

    async fn revoke_token(&self, token_hash: &str) -> AppResult<bool> {
        let mut revoked_any = false;
        for token in self
            .tokens
            .write()
            .await
            .iter_mut()
            .filter(|token| token.token_hash == token_hash && !token.revoked)
        {
            token.revoked = true;
            revoked_any = true;
        }
        Ok(revoked_any)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};

    use ecclesia_application::{
        AuthTokenRepository, CreateRoleInput, NewUser, RoleRepository, RoleResolution,
        RoleResolutionRepository, UpdateRoleInput, UserRepository,
    };
    use ecclesia_core::{AppError, UserId};
    use ecclesia_domain::{Permission, RoleName};

    use super::InMemorySecurityRepository;

    fn new_user(email: &str, role_id: Option<ecclesia_core::RoleId>) -> NewUser {
        NewUser {
            email: email.to_owned(),
            display_name: "Deacon".to_owned(),
            password_hash: "hash".to_owned(),
            role_id,
        }
    }

    #[tokio::test]
    async fn seeded_repository_resolves_assigned_roles() {
        let repository = InMemorySecurityRepository::seeded();
        let Ok(Some(bishop)) = repository.find_role_by_name("bishop").await else {
            panic!("expected bishop system role");
        };

        let created = repository
            .create_user(new_user("bishop@example.org", Some(bishop.role_id)))
            .await;
        let Ok(user) = created else {
            panic!("expected user creation to succeed");
        };
        assert_eq!(user.role_name.as_deref(), Some("bishop"));

        let resolution = repository.resolve_role_for_user(user.id).await;
        assert!(matches!(
            resolution,
            Ok(RoleResolution::Resolved(role)) if role.name == "bishop"
        ));

        let missing = repository.resolve_role_for_user(UserId::new()).await;
        assert!(matches!(missing, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn role_names_are_unique_and_assigned_roles_cannot_be_deleted() {
        let repository = InMemorySecurityRepository::new();
        let input = |name: &str| CreateRoleInput {
            name: RoleName::new(name).unwrap_or_else(|error| panic!("{error}")),
            description: String::new(),
            permissions: vec![Permission::ManageEvents, Permission::ManageEvents],
            is_system: false,
        };

        let Ok(usher) = repository.create_role(input("usher")).await else {
            panic!("expected role creation to succeed");
        };
        assert_eq!(usher.permissions, vec![Permission::ManageEvents]);
        assert!(matches!(
            repository.create_role(input("usher")).await,
            Err(AppError::Conflict(_))
        ));

        let Ok(greeter) = repository.create_role(input("greeter")).await else {
            panic!("expected role creation to succeed");
        };
        let rename = repository
            .update_role(
                greeter.role_id,
                UpdateRoleInput {
                    name: RoleName::new("usher").ok(),
                    ..UpdateRoleInput::default()
                },
            )
            .await;
        assert!(matches!(rename, Err(AppError::Conflict(_))));

        let created = repository
            .create_user(new_user("usher@example.org", Some(usher.role_id)))
            .await;
        assert!(created.is_ok());
        assert_eq!(repository.count_users_with_role(usher.role_id).await.ok(), Some(1));
        assert!(matches!(
            repository.delete_role(usher.role_id).await,
            Err(AppError::Conflict(_))
        ));
        assert!(repository.delete_role(greeter.role_id).await.is_ok());
    }

    #[tokio::test]
    async fn tokens_expire_and_revoke() {
        let repository = InMemorySecurityRepository::new();
        let user_id = UserId::new();
        let now = Utc::now();

        assert!(
            repository
                .issue_token(user_id, "active", now + Duration::hours(1))
                .await
                .is_ok()
        );
        assert!(
            repository
                .issue_token(user_id, "stale", now - Duration::hours(1))
                .await
                .is_ok()
        );

        assert_eq!(
            repository.find_user_for_token("active", now).await.ok(),
            Some(Some(user_id))
        );
        assert_eq!(
            repository.find_user_for_token("stale", now).await.ok(),
            Some(None)
        );

        assert_eq!(repository.revoke_token("active").await.ok(), Some(true));
        assert_eq!(repository.revoke_token("active").await.ok(), Some(false));
        assert_eq!(
            repository.find_user_for_token("active", now).await.ok(),
            Some(None)
        );
        assert_eq!(repository.delete_expired_tokens(now).await, 1);
    }

    #[tokio::test]
    async fn duplicate_emails_conflict_case_insensitively() {
        let repository = InMemorySecurityRepository::new();
        assert!(
            repository
                .create_user(new_user("pastor@example.org", None))
                .await
                .is_ok()
        );
        let duplicate = repository
            .create_user(new_user("Pastor@Example.org", None))
            .await;
        assert!(matches!(duplicate, Err(AppError::Conflict(_))));
    }
}
