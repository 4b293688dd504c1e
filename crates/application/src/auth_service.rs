//! Bearer-token authentication.
//!
//! Resolves credentials to a [`UserIdentity`] for the request pipeline. Tokens
//! are 32 random bytes, handed out hex-encoded and stored only as SHA-256
//! digests. Login failures never reveal whether the email exists.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use ecclesia_core::{AppError, AppResult, RoleId, UserId, UserIdentity};
use ecclesia_domain::{EmailAddress, Permission, SystemRole, validate_password};

use crate::{AuthorizationService, RoleRepository};

/// User record returned by repository queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    /// Unique user identifier.
    pub id: UserId,
    /// Canonical email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Current role reference.
    pub role_id: Option<RoleId>,
    /// Name of the referenced role, joined at read time.
    pub role_name: Option<String>,
}

impl UserRecord {
    /// Builds the request identity for this user.
    #[must_use]
    pub fn identity(&self) -> UserIdentity {
        UserIdentity::new(
            self.id,
            self.display_name.as_str(),
            self.email.as_str(),
            self.role_name.clone(),
        )
    }
}

/// Input for persisting a new user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    /// Canonical email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Argon2id password hash.
    pub password_hash: String,
    /// Initial role reference.
    pub role_id: Option<RoleId>,
}

/// Repository port for user persistence.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Finds a user by canonical email.
    async fn find_by_email(&self, email: &str) -> AppResult<Option<UserRecord>>;

    /// Finds a user by identifier.
    async fn find_by_id(&self, user_id: UserId) -> AppResult<Option<UserRecord>>;

    /// Creates a user. Duplicate emails fail with `Conflict`.
    async fn create_user(&self, user: NewUser) -> AppResult<UserRecord>;
}

/// Repository port for bearer token persistence.
#[async_trait]
pub trait AuthTokenRepository: Send + Sync {
    /// Stores a token digest for a user.
    async fn issue_token(
        &self,
        user_id: UserId,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Returns the owner of an unexpired, unrevoked token digest.
    async fn find_user_for_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<Option<UserId>>;

    /// Revokes a token digest. Returns whether an active token was revoked.
    async fn revoke_token(&self, token_hash: &str) -> AppResult<bool>;
}

/// Port for password hashing. Keeps the application free of direct
/// cryptographic library coupling.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password.
    fn hash_password(&self, password: &str) -> AppResult<String>;

    /// Verifies a plaintext password against a stored hash.
    fn verify_password(&self, password: &str, hash: &str) -> AppResult<bool>;
}

/// Result of a login attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// Credentials matched and a token was issued.
    Authenticated {
        /// Raw bearer token, shown to the client once.
        token: String,
        /// Authenticated identity.
        identity: UserIdentity,
        /// Token expiry.
        expires_at: DateTime<Utc>,
    },
    /// Unknown email or wrong password.
    Failed,
}

/// Input for staff-created accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterUserInput {
    /// Email address.
    pub email: String,
    /// Display name.
    pub display_name: String,
    /// Plaintext password.
    pub password: String,
    /// Initial role; defaults to `member`.
    pub role_name: Option<String>,
}

/// Application service for login, logout and token resolution.
#[derive(Clone)]
pub struct AuthService {
    users: Arc<dyn UserRepository>,
    tokens: Arc<dyn AuthTokenRepository>,
    roles: Arc<dyn RoleRepository>,
    password_hasher: Arc<dyn PasswordHasher>,
    authorization_service: AuthorizationService,
    token_ttl: Duration,
}

impl AuthService {
    /// Creates the service.
    #[must_use]
    pub fn new(
        users: Arc<dyn UserRepository>,
        tokens: Arc<dyn AuthTokenRepository>,
        roles: Arc<dyn RoleRepository>,
        password_hasher: Arc<dyn PasswordHasher>,
        authorization_service: AuthorizationService,
        token_ttl: Duration,
    ) -> Self {
        Self {
            users,
            tokens,
            roles,
            password_hasher,
            authorization_service,
            token_ttl,
        }
    }

    /// Authenticates with email and password and issues a bearer token.
    ///
    /// Unknown or malformed emails still pay for one hash so both failure
    /// paths take comparable time.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<LoginOutcome> {
        let user = match EmailAddress::new(email) {
            Ok(email) => self.users.find_by_email(email.as_str()).await?,
            Err(_) => None,
        };

        let Some(user) = user else {
            let _ = self.password_hasher.hash_password(password);
            return Ok(LoginOutcome::Failed);
        };

        if !self
            .password_hasher
            .verify_password(password, user.password_hash.as_str())?
        {
            return Ok(LoginOutcome::Failed);
        }

        let (token, token_hash) = generate_token()?;
        let expires_at = Utc::now() + self.token_ttl;
        self.tokens
            .issue_token(user.id, token_hash.as_str(), expires_at)
            .await?;

        Ok(LoginOutcome::Authenticated {
            token,
            identity: user.identity(),
            expires_at,
        })
    }

    /// Resolves a raw bearer token to its user identity.
    ///
    /// Malformed, expired and revoked tokens resolve to `None`.
    pub async fn resolve_bearer(&self, token: &str) -> AppResult<Option<UserIdentity>> {
        if !is_well_formed_token(token) {
            return Ok(None);
        }

        let Some(user_id) = self
            .tokens
            .find_user_for_token(hash_token(token).as_str(), Utc::now())
            .await?
        else {
            return Ok(None);
        };

        Ok(self
            .users
            .find_by_id(user_id)
            .await?
            .map(|user| user.identity()))
    }

    /// Revokes a bearer token. Unknown tokens are ignored.
    pub async fn logout(&self, token: &str) -> AppResult<()> {
        if !is_well_formed_token(token) {
            return Ok(());
        }

        self.tokens.revoke_token(hash_token(token).as_str()).await?;
        Ok(())
    }

    /// Creates an account on behalf of staff holding `manage:users`.
    pub async fn register_user(
        &self,
        actor: &UserIdentity,
        input: RegisterUserInput,
    ) -> AppResult<UserRecord> {
        self.authorization_service
            .require_permission(actor, Permission::ManageUsers)
            .await?;

        let email = EmailAddress::new(input.email.as_str())?;
        validate_password(input.password.as_str())?;

        let display_name = input.display_name.trim();
        if display_name.is_empty() {
            return Err(AppError::Validation(
                "display name must not be empty".to_owned(),
            ));
        }

        let role_name = input
            .role_name
            .as_deref()
            .unwrap_or(SystemRole::Member.name());
        let role = self
            .roles
            .find_role_by_name(role_name)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("role '{role_name}' does not exist")))?;

        if self.users.find_by_email(email.as_str()).await?.is_some() {
            return Err(AppError::Conflict(format!(
                "a user with email '{}' already exists",
                email.as_str()
            )));
        }

        let password_hash = self.password_hasher.hash_password(input.password.as_str())?;
        self.users
            .create_user(NewUser {
                email: email.into(),
                display_name: display_name.to_owned(),
                password_hash,
                role_id: Some(role.role_id),
            })
            .await
    }
}

fn is_well_formed_token(token: &str) -> bool {
    token.len() == 64 && token.bytes().all(|byte| byte.is_ascii_hexdigit())
}

/// Generates a random bearer token and its SHA-256 digest.
///
/// Returns `(raw_token_hex, sha256_hash_hex)`.
fn generate_token() -> AppResult<(String, String)> {
    let mut bytes = [0u8; 32];
    getrandom::fill(&mut bytes)
        .map_err(|error| AppError::Internal(format!("failed to generate token: {error}")))?;

    let raw_token = to_hex(&bytes);
    let hash = hash_token(&raw_token);
    Ok((raw_token, hash))
}

/// Computes the SHA-256 digest of a token for storage.
fn hash_token(raw_token: &str) -> String {
    use sha2::{Digest, Sha256};

    let mut hasher = Sha256::new();
    hasher.update(raw_token.as_bytes());
    to_hex(&hasher.finalize())
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes
        .iter()
        .fold(String::with_capacity(bytes.len() * 2), |mut acc, byte| {
            let _ = write!(acc, "{byte:02x}");
            acc
        })
}
