use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use ecclesia_core::{UserId, UserIdentity};
use ecclesia_domain::{AuditAction, ResourceType};

/// Actor snapshot captured when an entry is written.
///
/// The user record may change or disappear later; the snapshot keeps what
/// was true at log time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditActor {
    /// Acting user, absent for unauthenticated requests.
    pub user_id: Option<UserId>,
    /// Display name at log time.
    pub name: Option<String>,
    /// Email at log time.
    pub email: Option<String>,
    /// Role name at log time.
    pub role: Option<String>,
}

impl AuditActor {
    /// Snapshot for requests without a resolved principal.
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Snapshot of an authenticated identity.
    #[must_use]
    pub fn from_identity(identity: &UserIdentity) -> Self {
        Self {
            user_id: Some(identity.user_id()),
            name: Some(identity.display_name().to_owned()),
            email: Some(identity.email().to_owned()),
            role: identity.role_name().map(str::to_owned),
        }
    }

    /// Returns whether the snapshot carries no user.
    #[must_use]
    pub fn is_anonymous(&self) -> bool {
        self.user_id.is_none()
    }
}

/// Optional before and after state of a changed resource.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSnapshot {
    /// State before the change.
    pub before: Option<Value>,
    /// State after the change.
    pub after: Option<Value>,
}

/// Audit entry ready to be appended.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditLogEntry {
    /// Actor snapshot.
    pub actor: AuditActor,
    /// Classified action.
    pub action: AuditAction,
    /// Classified resource type.
    pub resource_type: ResourceType,
    /// Best-effort resource identifier.
    pub resource_id: Option<String>,
    /// Best-effort resource display name.
    pub resource_name: Option<String>,
    /// HTTP method.
    pub method: String,
    /// Request path without the query string.
    pub endpoint: String,
    /// Response status code.
    pub status_code: u16,
    /// Derived from the status code range.
    pub success: bool,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Query and path parameters.
    pub metadata: Option<Value>,
    /// Optional change snapshot.
    pub changes: Option<ChangeSnapshot>,
    /// Error detail for failed requests.
    pub error_message: Option<String>,
    /// Wall-clock handling time.
    pub duration_ms: u64,
}

impl NewAuditLogEntry {
    /// Attaches storage-assigned identity and timestamp.
    #[must_use]
    pub fn into_entry(self, entry_id: Uuid, created_at: DateTime<Utc>) -> AuditLogEntry {
        AuditLogEntry {
            entry_id,
            actor: self.actor,
            action: self.action,
            resource_type: self.resource_type,
            resource_id: self.resource_id,
            resource_name: self.resource_name,
            method: self.method,
            endpoint: self.endpoint,
            status_code: self.status_code,
            success: self.success,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            metadata: self.metadata,
            changes: self.changes,
            error_message: self.error_message,
            duration_ms: self.duration_ms,
            created_at,
        }
    }
}

/// Persisted, immutable audit entry.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditLogEntry {
    /// Stable entry identifier.
    pub entry_id: Uuid,
    /// Actor snapshot.
    pub actor: AuditActor,
    /// Classified action.
    pub action: AuditAction,
    /// Classified resource type.
    pub resource_type: ResourceType,
    /// Best-effort resource identifier.
    pub resource_id: Option<String>,
    /// Best-effort resource display name.
    pub resource_name: Option<String>,
    /// HTTP method.
    pub method: String,
    /// Request path.
    pub endpoint: String,
    /// Response status code.
    pub status_code: u16,
    /// Whether the request succeeded.
    pub success: bool,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Query and path parameters.
    pub metadata: Option<Value>,
    /// Optional change snapshot.
    pub changes: Option<ChangeSnapshot>,
    /// Error detail for failed requests.
    pub error_message: Option<String>,
    /// Wall-clock handling time.
    pub duration_ms: u64,
    /// Write timestamp.
    pub created_at: DateTime<Utc>,
}
