//! In-process fakes shared by service tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use ecclesia_core::{AppError, AppResult, RoleId, UserId, UserIdentity};
use ecclesia_domain::{AuditAction, Permission, SystemRole, TransactionAuditAction};

use crate::{
    AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditLogRepository,
    AuditStatistics, AuthTokenRepository, CreateRoleInput, DateRange, NewAuditLogEntry,
    NewTransactionAuditEntry, NewUser, PasswordHasher, RoleDefinition, RoleRepository,
    RoleResolution, RoleResolutionRepository, SecurityAlerts, TransactionAuditLogEntry,
    TransactionAuditPage, TransactionAuditQuery, TransactionAuditRepository, UpdateRoleInput,
    UserRecord, UserRepository,
};

fn role(name: &str, permissions: Vec<Permission>, is_system: bool) -> RoleDefinition {
    let now = Utc::now();
    RoleDefinition {
        role_id: RoleId::new(),
        name: name.to_owned(),
        description: String::new(),
        permissions,
        is_system,
        created_at: now,
        updated_at: now,
    }
}

#[derive(Default)]
pub struct FakeRoleStore {
    roles: Mutex<Vec<RoleDefinition>>,
    assignments: Mutex<HashMap<UserId, Option<RoleId>>>,
    fail_resolution: Mutex<bool>,
    resolution_count: AtomicUsize,
}

impl FakeRoleStore {
    pub fn seeded() -> Self {
        let roles = SystemRole::all()
            .iter()
            .map(|system_role| role(system_role.name(), system_role.default_permissions(), true))
            .collect();

        Self {
            roles: Mutex::new(roles),
            ..Self::default()
        }
    }

    pub async fn add_role(&self, name: &str, permissions: Vec<Permission>) -> RoleId {
        let definition = role(name, permissions, false);
        let role_id = definition.role_id;
        self.roles.lock().await.push(definition);
        role_id
    }

    pub async fn role_id_of(&self, name: &str) -> Option<RoleId> {
        self.roles
            .lock()
            .await
            .iter()
            .find(|role| role.name == name)
            .map(|role| role.role_id)
    }

    pub async fn role_named(&self, name: &str) -> Option<RoleDefinition> {
        self.roles
            .lock()
            .await
            .iter()
            .find(|role| role.name == name)
            .cloned()
    }

    pub async fn set_permissions(&self, name: &str, permissions: Vec<Permission>) {
        if let Some(role) = self
            .roles
            .lock()
            .await
            .iter_mut()
            .find(|role| role.name == name)
        {
            role.permissions = permissions;
        }
    }

    pub async fn assign(&self, user_id: UserId, role_id: Option<RoleId>) {
        self.assignments.lock().await.insert(user_id, role_id);
    }

    pub async fn assigned_role(&self, user_id: UserId) -> Option<RoleId> {
        self.assignments
            .lock()
            .await
            .get(&user_id)
            .copied()
            .flatten()
    }

    pub async fn fail_resolution(&self) {
        *self.fail_resolution.lock().await = true;
    }

    pub fn resolution_count(&self) -> usize {
        self.resolution_count.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoleResolutionRepository for FakeRoleStore {
    async fn resolve_role_for_user(&self, user_id: UserId) -> AppResult<RoleResolution> {
        self.resolution_count.fetch_add(1, Ordering::SeqCst);
        if *self.fail_resolution.lock().await {
            return Err(AppError::Internal("role store unavailable".to_owned()));
        }

        let assignment = self.assignments.lock().await.get(&user_id).copied();
        let Some(role_id) = assignment else {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        };

        let Some(role_id) = role_id else {
            return Ok(RoleResolution::Unassigned);
        };

        Ok(self
            .roles
            .lock()
            .await
            .iter()
            .find(|role| role.role_id == role_id)
            .cloned()
            .map_or(RoleResolution::Unassigned, RoleResolution::Resolved))
    }
}

#[async_trait]
impl RoleRepository for FakeRoleStore {
    async fn list_roles(&self) -> AppResult<Vec<RoleDefinition>> {
        let mut roles = self.roles.lock().await.clone();
        roles.sort_by(|left, right| left.name.cmp(&right.name));
        Ok(roles)
    }

    async fn find_role_by_name(&self, name: &str) -> AppResult<Option<RoleDefinition>> {
        Ok(self.role_named(name).await)
    }

    async fn create_role(&self, input: CreateRoleInput) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.lock().await;
        if roles.iter().any(|role| role.name == input.name.as_str()) {
            return Err(AppError::Conflict(format!(
                "role '{}' already exists",
                input.name
            )));
        }

        let mut definition = role(input.name.as_str(), input.permissions, input.is_system);
        definition.description = input.description;
        roles.push(definition.clone());
        Ok(definition)
    }

    async fn update_role(
        &self,
        role_id: RoleId,
        input: UpdateRoleInput,
    ) -> AppResult<RoleDefinition> {
        let mut roles = self.roles.lock().await;
        let Some(role) = roles.iter_mut().find(|role| role.role_id == role_id) else {
            return Err(AppError::NotFound(format!("role '{role_id}' not found")));
        };

        if let Some(name) = input.name {
            role.name = name.as_str().to_owned();
        }
        if let Some(description) = input.description {
            role.description = description;
        }
        if let Some(permissions) = input.permissions {
            role.permissions = permissions;
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, role_id: RoleId) -> AppResult<()> {
        self.roles
            .lock()
            .await
            .retain(|role| role.role_id != role_id);
        Ok(())
    }

    async fn count_users_with_role(&self, role_id: RoleId) -> AppResult<u64> {
        Ok(self
            .assignments
            .lock()
            .await
            .values()
            .filter(|assigned| **assigned == Some(role_id))
            .count() as u64)
    }

    async fn set_user_role(&self, user_id: UserId, role_id: Option<RoleId>) -> AppResult<()> {
        let mut assignments = self.assignments.lock().await;
        let Some(slot) = assignments.get_mut(&user_id) else {
            return Err(AppError::NotFound(format!("user '{user_id}' not found")));
        };
        *slot = role_id;
        Ok(())
    }
}

pub struct FakeUserStore {
    roles: Arc<FakeRoleStore>,
    users: Mutex<Vec<UserRecord>>,
}

impl FakeUserStore {
    pub fn new(roles: Arc<FakeRoleStore>) -> Self {
        Self {
            roles,
            users: Mutex::new(Vec::new()),
        }
    }

    /// Inserts a user with a fake password hash and returns its identity.
    pub async fn insert(
        &self,
        email: &str,
        display_name: &str,
        password: &str,
        role: Option<SystemRole>,
    ) -> UserIdentity {
        let role_id = match role {
            Some(role) => self.roles.role_id_of(role.name()).await,
            None => None,
        };

        let record = UserRecord {
            id: UserId::new(),
            email: email.to_owned(),
            display_name: display_name.to_owned(),
            password_hash: format!("hashed:{password}"),
            role_id,
            role_name: role.map(|role| role.name().to_owned()),
        };
        self.roles.assign(record.id, role_id).await;
        let identity = record.identity();
        self.users.lock().await.push(record);
        identity
    }

    async fn with_current_role(&self, mut record: UserRecord) -> UserRecord {
        record.role_id = self.roles.assigned_role(record.id).await;
        record.role_name = match record.role_id {
            Some(role_id) => self
                .roles
                .list_roles()
                .await
                .unwrap_or_default()
                .into_iter()
                .find(|role| role.role_id == role_id)
                .map(|role| role.name),
            None => None,
        };
        record
    }
}

#[async_trait]
impl UserRepository for FakeUserStore {
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>> {
        let found = self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.email == email)
            .cloned();
        match found {
            Some(record) => Ok(Some(self.with_current_role(record).await)),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>> {
        let found = self
            .users
            .lock()
            .await
            .iter()
            .find(|user| user.id == user_id)
            .cloned();
        match found {
            Some(record) => Ok(Some(self.with_current_role(record).await)),
            None => Ok(None),
        }
    }

    async fn create_user(&self, user: NewUser) -> AppResult<UserRecord> {
        let mut users = self.users.lock().await;
        if users.iter().any(|existing| existing.email == user.email) {
            return Err(AppError::Conflict("email already registered".to_owned()));
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
        drop(users);

        self.roles.assign(record.id, record.role_id).await;
        Ok(record)
    }
}

#[derive(Default)]
pub struct FakeTokenStore {
    tokens: Mutex<Vec<(UserId, String, DateTime<Utc>, bool)>>,
}

impl FakeTokenStore {
    pub async fn hashes(&self) -> Vec<String> {
        self.tokens
            .lock()
            .await
            .iter()
            .map(|(_, hash, _, _)| hash.clone())
            .collect()
    }
}

#[async_trait]
impl AuthTokenRepository for FakeTokenStore {
    async fn issue_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()> {
        self.tokens
            .lock()
            .await
            .push((user_id, token_hash.to_owned(), expires_at, false));
        Ok(())
    }

    async fn find_user_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>> {
        Ok(self
            .tokens
            .lock()
            .await
            .iter()
            .find(|(_, hash, expires_at, revoked)| {
                hash == token_hash && *expires_at > now && !revoked
            })
            .map(|(user_id, _, _, _)| *user_id))
    }

    async fn revoke_token(&self, token_hash: &str) -> AppResult<bool> {
        let mut tokens = self.tokens.lock().await;
        let mut revoked_any = false;
        for (_, hash, _, revoked) in tokens.iter_mut() {
            if hash == token_hash && !*revoked {
                *revoked = true;
                revoked_any = true;
            }
        }
        Ok(revoked_any)
    }
}

pub struct FakePasswordHasher;

impl PasswordHasher for FakePasswordHasher {
    fn hash_password(&self, password: &str) -> AppResult<String> {
        Ok(format!("hashed:{password}"))
    }

    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool> {
        Ok(hash == format!("hashed:{password}"))
    }
}

#[derive(Default)]
pub struct FakeAuditLog {
    pub entries: Mutex<Vec<AuditLogEntry>>,
    pub fail_appends: Mutex<bool>,
    pub last_query: Mutex<Option<AuditLogQuery>>,
    pub last_export_limit: Mutex<Option<usize>>,
    pub last_alert_window: Mutex<Option<(DateTime<Utc>, usize)>>,
}

impl FakeAuditLog {
    /// Inserts an already-persisted entry, bypassing the recorder.
    pub async fn seed(&self, entry: NewAuditLogEntry, created_at: DateTime<Utc>) {
        self.entries
            .lock()
            .await
            .push(entry.into_entry(Uuid::new_v4(), created_at));
    }
}

#[async_trait]
impl AuditLogRepository for FakeAuditLog {
    async fn append_entry(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        if *self.fail_appends.lock().await {
            return Err(AppError::Internal("audit store unavailable".to_owned()));
        }

        let stored = entry.into_entry(Uuid::new_v4(), Utc::now());
        self.entries.lock().await.push(stored.clone());
        Ok(stored)
    }

    async fn list_entries(&self, query: &AuditLogQuery) -> AppResult<AuditLogPage> {
        *self.last_query.lock().await = Some(query.clone());
        let entries = self.entries.lock().await.clone();
        Ok(AuditLogPage {
            total: entries.len() as u64,
            entries,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn export_entries(
        &self,
        _filter: &AuditLogFilter,
        max_rows: usize,
    ) -> AppResult<Vec<AuditLogEntry>> {
        *self.last_export_limit.lock().await = Some(max_rows);
        let mut entries = self.entries.lock().await.clone();
        entries.sort_by(|left, right| right.created_at.cmp(&left.created_at));
        entries.truncate(max_rows);
        Ok(entries)
    }

    async fn statistics(&self, _range: &DateRange, _top_n: usize) -> AppResult<AuditStatistics> {
        let entries = self.entries.lock().await;
        Ok(AuditStatistics {
            total: entries.len() as u64,
            successful: entries.iter().filter(|entry| entry.success).count() as u64,
            top_actions: Vec::new(),
            by_resource_type: Vec::new(),
            top_actors: Vec::new(),
            failed_logins_by_ip: Vec::new(),
            recent_failures: Vec::new(),
        })
    }

    async fn security_alerts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<SecurityAlerts> {
        *self.last_alert_window.lock().await = Some((since, limit));
        Ok(SecurityAlerts {
            since,
            failed_logins: Vec::new(),
            access_denied: Vec::new(),
            system_errors: Vec::new(),
        })
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        protected_actions: &[AuditAction],
    ) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.created_at >= cutoff || protected_actions.contains(&entry.action)
        });
        Ok((before - entries.len()) as u64)
    }
}

#[derive(Default)]
pub struct FakeTransactionAuditLog {
    pub entries: Mutex<Vec<TransactionAuditLogEntry>>,
    pub append_calls: AtomicUsize,
}

impl FakeTransactionAuditLog {
    pub async fn seed(&self, entry: NewTransactionAuditEntry, created_at: DateTime<Utc>) {
        self.entries
            .lock()
            .await
            .push(entry.into_entry(Uuid::new_v4(), created_at));
    }
}

#[async_trait]
impl TransactionAuditRepository for FakeTransactionAuditLog {
    async fn append_entry(
        &self,
        entry: NewTransactionAuditEntry,
    ) -> AppResult<TransactionAuditLogEntry> {
        self.append_calls.fetch_add(1, Ordering::SeqCst);
        let mut entries = self.entries.lock().await;
        if let Some(key) = entry.idempotency_key.as_deref()
            && entries.iter().any(|existing| {
                existing.idempotency_key.as_deref() == Some(key) && existing.action == entry.action
            })
        {
            return Err(AppError::Conflict("duplicate idempotency key".to_owned()));
        }

        let stored = entry.into_entry(Uuid::new_v4(), Utc::now());
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_idempotency_key(
        &self,
        idempotency_key: &str,
        action: TransactionAuditAction,
    ) -> AppResult<Option<TransactionAuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .find(|entry| {
                entry.idempotency_key.as_deref() == Some(idempotency_key) && entry.action == action
            })
            .cloned())
    }

    async fn list_entries(&self, query: &TransactionAuditQuery) -> AppResult<TransactionAuditPage> {
        let entries = self.entries.lock().await.clone();
        Ok(TransactionAuditPage {
            total: entries.len() as u64,
            entries,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn history_for_transaction(
        &self,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionAuditLogEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|entry| entry.transaction_id == transaction_id)
            .cloned()
            .collect())
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        eligible_actions: &[TransactionAuditAction],
    ) -> AppResult<u64> {
        let mut entries = self.entries.lock().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.created_at >= cutoff || !eligible_actions.contains(&entry.action)
        });
        Ok((before - entries.len()) as u64)
    }
}
