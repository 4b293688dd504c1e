//! Best-effort HTTP audit trail writer.
//!
//! Entries are built from what the pipeline observed after the handler ran.
//! Write failures are logged and dropped; they never reach the client.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use ecclesia_domain::{ResourceType, classify_outcome};

use crate::{AuditActor, AuditLogRepository, ChangeSnapshot, NewAuditLogEntry};

const ID_FIELDS: &[&str] = &["_id", "id"];
const NAME_FIELDS: &[&str] = &["title", "name", "fullName", "email"];
const SECRET_MARKERS: &[&str] = &["password", "token", "secret"];
const REDACTED: &str = "[redacted]";

/// Everything the pipeline observed about one request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestAuditContext {
    /// HTTP method.
    pub method: String,
    /// Request path without the query string.
    pub path: String,
    /// Decoded query parameters.
    pub query_params: Vec<(String, String)>,
    /// Matched route parameters.
    pub path_params: Vec<(String, String)>,
    /// Response status code.
    pub status_code: u16,
    /// Wall-clock handling time.
    pub duration_ms: u64,
    /// Client IP address.
    pub ip_address: Option<String>,
    /// Client user agent.
    pub user_agent: Option<String>,
    /// Actor snapshot.
    pub actor: AuditActor,
    /// Request body of updates, when it was JSON.
    pub request_body: Option<Value>,
    /// Response body, when it was JSON.
    pub response_body: Option<Value>,
    /// Error detail captured by the pipeline.
    pub error_message: Option<String>,
}

/// Appends audit entries for classified requests.
#[derive(Clone)]
pub struct AuditRecorder {
    repository: Arc<dyn AuditLogRepository>,
}

impl AuditRecorder {
    /// Creates the recorder.
    #[must_use]
    pub fn new(repository: Arc<dyn AuditLogRepository>) -> Self {
        Self { repository }
    }

    /// Builds the entry for a request, or `None` when it is not audited.
    #[must_use]
    pub fn build_entry(context: &RequestAuditContext) -> Option<NewAuditLogEntry> {
        let classification = classify_outcome(
            context.method.as_str(),
            context.path.as_str(),
            context.status_code,
        )?;

        let success = (200..400).contains(&context.status_code);
        let (body_id, resource_name) = context
            .response_body
            .as_ref()
            .map(|body| extract_resource(body, classification.resource_type))
            .unwrap_or_default();
        let resource_id = body_id.or_else(|| fallback_resource_id(context));

        let error_message = if success {
            None
        } else {
            context.error_message.clone().or_else(|| {
                context
                    .response_body
                    .as_ref()
                    .and_then(|body| body.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_owned)
            })
        };

        Some(NewAuditLogEntry {
            actor: context.actor.clone(),
            action: classification.action,
            resource_type: classification.resource_type,
            resource_id,
            resource_name,
            method: context.method.to_ascii_uppercase(),
            endpoint: context.path.clone(),
            status_code: context.status_code,
            success,
            ip_address: context.ip_address.clone(),
            user_agent: context.user_agent.clone(),
            metadata: request_metadata(context),
            changes: change_snapshot(context, success),
            error_message,
            duration_ms: context.duration_ms,
        })
    }

    /// Builds and appends the entry for a completed request.
    ///
    /// Returns whether an entry was written.
    pub async fn record(&self, context: RequestAuditContext) -> bool {
        let Some(entry) = Self::build_entry(&context) else {
            return false;
        };

        let action = entry.action;
        match self.repository.append_entry(entry).await {
            Ok(_) => true,
            Err(error) => {
                warn!(
                    error = %error,
                    action = %action,
                    endpoint = %context.path,
                    "failed to write audit entry"
                );
                false
            }
        }
    }
}

fn resource_keys(resource_type: ResourceType) -> &'static [&'static str] {
    match resource_type {
        ResourceType::Sermon => &["sermon"],
        ResourceType::Blog => &["blog", "post"],
        ResourceType::Event => &["event"],
        ResourceType::Gallery => &["image", "item", "gallery"],
        ResourceType::Livestream => &["livestream", "stream"],
        ResourceType::Volunteer => &["volunteer", "application"],
        ResourceType::Feedback => &["feedback"],
        ResourceType::User | ResourceType::Auth => &["user"],
        ResourceType::Role => &["role"],
        ResourceType::Audit | ResourceType::System => &[],
    }
}

fn string_field(object: &Map<String, Value>, fields: &[&str]) -> Option<String> {
    fields.iter().find_map(|field| match object.get(*field)? {
        Value::String(value) if !value.is_empty() => Some(value.clone()),
        Value::Number(value) => Some(value.to_string()),
        _ => None,
    })
}

/// Looks for an identifier and display name in the common response shapes:
/// the body itself, `data`, and resource-keyed objects at either level.
fn extract_resource(body: &Value, resource_type: ResourceType) -> (Option<String>, Option<String>) {
    let mut candidates: Vec<&Map<String, Value>> = Vec::new();
    let data = body.get("data");

    for keyed in resource_keys(resource_type) {
        if let Some(object) = data.and_then(|data| data.get(*keyed)).and_then(Value::as_object) {
            candidates.push(object);
        }
        if let Some(object) = body.get(*keyed).and_then(Value::as_object) {
            candidates.push(object);
        }
    }
    if let Some(object) = data.and_then(Value::as_object) {
        candidates.push(object);
    }
    if let Some(object) = body.as_object() {
        candidates.push(object);
    }

    let resource_id = candidates
        .iter()
        .find_map(|object| string_field(object, ID_FIELDS));
    let resource_name = candidates
        .iter()
        .find_map(|object| string_field(object, NAME_FIELDS));

    (resource_id, resource_name)
}

fn looks_like_identifier(segment: &str) -> bool {
    let is_uuid = segment.len() == 36
        && segment
            .chars()
            .all(|character| character.is_ascii_hexdigit() || character == '-');
    let is_object_id =
        segment.len() == 24 && segment.chars().all(|character| character.is_ascii_hexdigit());
    let is_number = !segment.is_empty() && segment.chars().all(|character| character.is_ascii_digit());

    is_uuid || is_object_id || is_number
}

fn fallback_resource_id(context: &RequestAuditContext) -> Option<String> {
    context
        .path_params
        .iter()
        .find(|(name, _)| name == "id" || name.ends_with("_id") || name.ends_with("Id"))
        .map(|(_, value)| value.clone())
        .or_else(|| {
            context
                .path
                .split('/')
                .rev()
                .find(|segment| looks_like_identifier(segment))
                .map(str::to_owned)
        })
}

/// Successful `PUT`/`PATCH` requests record the submitted fields as the
/// post-change state. The prior state is not visible at the HTTP boundary.
fn change_snapshot(context: &RequestAuditContext, success: bool) -> Option<ChangeSnapshot> {
    let is_update = ["PUT", "PATCH"]
        .iter()
        .any(|method| method.eq_ignore_ascii_case(context.method.as_str()));
    if !success || !is_update {
        return None;
    }

    let after = context.request_body.as_ref().map(redact_secrets)?;
    Some(ChangeSnapshot {
        before: None,
        after: Some(after),
    })
}

fn redact_secrets(value: &Value) -> Value {
    match value {
        Value::Object(object) => Value::Object(
            object
                .iter()
                .map(|(key, value)| {
                    let lowered = key.to_ascii_lowercase();
                    let value = if SECRET_MARKERS
                        .iter()
                        .any(|marker| lowered.contains(marker))
                    {
                        Value::String(REDACTED.to_owned())
                    } else {
                        redact_secrets(value)
                    };
                    (key.clone(), value)
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_secrets).collect()),
        other => other.clone(),
    }
}

fn request_metadata(context: &RequestAuditContext) -> Option<Value> {
    if context.query_params.is_empty() && context.path_params.is_empty() {
        return None;
    }

    let to_object = |pairs: &[(String, String)]| {
        Value::Object(
            pairs
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect(),
        )
    };

    let mut metadata = Map::new();
    if !context.query_params.is_empty() {
        metadata.insert("query".to_owned(), to_object(&context.query_params));
    }
    if !context.path_params.is_empty() {
        metadata.insert("params".to_owned(), to_object(&context.path_params));
    }
    Some(Value::Object(metadata))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use ecclesia_core::UserId;
    use ecclesia_domain::{AuditAction, ResourceType};

    use super::{AuditRecorder, RequestAuditContext};
    use crate::AuditActor;
    use crate::test_support::FakeAuditLog;

    fn context(method: &str, path: &str, status_code: u16) -> RequestAuditContext {
        RequestAuditContext {
            method: method.to_owned(),
            path: path.to_owned(),
            query_params: Vec::new(),
            path_params: Vec::new(),
            status_code,
            duration_ms: 12,
            ip_address: Some("203.0.113.7".to_owned()),
            user_agent: Some("test-agent".to_owned()),
            actor: AuditActor::anonymous(),
            request_body: None,
            response_body: None,
            error_message: None,
        }
    }

    #[test]
    fn sermon_like_entry_falls_back_to_path_identifier() {
        let entry = AuditRecorder::build_entry(&context(
            "PUT",
            "/api/sermons/64f1c2a9e4b0a1b2c3d4e5f6/like",
            200,
        ));

        let Some(entry) = entry else {
            panic!("expected an entry");
        };
        assert_eq!(entry.action, AuditAction::SermonLike);
        assert_eq!(entry.resource_type, ResourceType::Sermon);
        assert_eq!(entry.resource_id.as_deref(), Some("64f1c2a9e4b0a1b2c3d4e5f6"));
        assert!(entry.success);
    }

    #[test]
    fn health_checks_and_reads_produce_no_entry() {
        assert!(AuditRecorder::build_entry(&context("GET", "/api/health", 200)).is_none());
        assert!(AuditRecorder::build_entry(&context("GET", "/api/sermons", 200)).is_none());
    }

    #[test]
    fn failed_login_is_recorded_as_failure() {
        let mut failed = context("POST", "/api/auth/login", 401);
        failed.response_body = Some(json!({"success": false, "message": "Invalid credentials"}));

        let Some(entry) = AuditRecorder::build_entry(&failed) else {
            panic!("expected an entry");
        };
        assert_eq!(entry.action, AuditAction::AuthLoginFailed);
        assert!(!entry.success);
        assert_eq!(entry.status_code, 401);
        assert_eq!(entry.error_message.as_deref(), Some("Invalid credentials"));
    }

    #[test]
    fn resource_fields_are_extracted_from_nested_shapes() {
        let mut created = context("POST", "/api/sermons", 201);
        created.response_body = Some(json!({
            "success": true,
            "data": {"sermon": {"_id": "abc123", "title": "Grace Abounds"}}
        }));
        let entry = AuditRecorder::build_entry(&created);
        assert_eq!(
            entry.map(|entry| (entry.resource_id, entry.resource_name)),
            Some((Some("abc123".to_owned()), Some("Grace Abounds".to_owned())))
        );

        let mut role = context("POST", "/api/roles", 201);
        role.response_body = Some(json!({"data": {"id": "r-1", "name": "choir"}}));
        let entry = AuditRecorder::build_entry(&role);
        assert_eq!(
            entry.map(|entry| (entry.resource_id, entry.resource_name)),
            Some((Some("r-1".to_owned()), Some("choir".to_owned())))
        );

        let mut user = context("POST", "/api/users", 201);
        user.response_body = Some(json!({"user": {"id": 42, "fullName": "Ada Obi"}}));
        let entry = AuditRecorder::build_entry(&user);
        assert_eq!(
            entry.map(|entry| (entry.resource_id, entry.resource_name)),
            Some((Some("42".to_owned()), Some("Ada Obi".to_owned())))
        );
    }

    #[test]
    fn denied_requests_on_unmapped_paths_are_still_recorded() {
        let entry = AuditRecorder::build_entry(&context("GET", "/api/payments/report", 403));
        assert_eq!(
            entry.map(|entry| (entry.action, entry.resource_type, entry.success)),
            Some((AuditAction::SystemAccessDenied, ResourceType::System, false))
        );
    }

    #[test]
    fn request_parameters_become_metadata() {
        let mut request = context("PUT", "/api/roles/choir", 200);
        request.path_params = vec![("role_name".to_owned(), "choir".to_owned())];
        request.query_params = vec![("dryRun".to_owned(), "false".to_owned())];

        let metadata = AuditRecorder::build_entry(&request).and_then(|entry| entry.metadata);
        assert_eq!(
            metadata,
            Some(json!({"query": {"dryRun": "false"}, "params": {"role_name": "choir"}}))
        );
    }

    #[test]
    fn updates_record_submitted_fields_without_secrets() {
        let mut update = context("PUT", "/api/roles/choir", 200);
        update.request_body = Some(json!({
            "description": "Sunday choir",
            "permissions": ["manage:events"],
            "credentials": {"newPassword": "hunter2"}
        }));

        let changes = AuditRecorder::build_entry(&update).and_then(|entry| entry.changes);
        let Some(changes) = changes else {
            panic!("expected a change snapshot");
        };
        assert_eq!(changes.before, None);
        assert_eq!(
            changes.after,
            Some(json!({
                "description": "Sunday choir",
                "permissions": ["manage:events"],
                "credentials": {"newPassword": "[redacted]"}
            }))
        );

        let mut rejected = update.clone();
        rejected.status_code = 400;
        assert!(
            AuditRecorder::build_entry(&rejected)
                .and_then(|entry| entry.changes)
                .is_none()
        );

        let mut created = context("POST", "/api/roles", 201);
        created.request_body = Some(json!({"name": "choir"}));
        assert!(
            AuditRecorder::build_entry(&created)
                .and_then(|entry| entry.changes)
                .is_none()
        );
    }

    #[test]
    fn redirects_count_as_success() {
        let entry = AuditRecorder::build_entry(&context("POST", "/api/auth/logout", 302));
        assert_eq!(entry.map(|entry| entry.success), Some(true));
    }

    #[tokio::test]
    async fn record_appends_actor_snapshot() {
        let repository = Arc::new(FakeAuditLog::default());
        let recorder = AuditRecorder::new(repository.clone());
        let user_id = UserId::new();

        let mut request = context("DELETE", "/api/events/17", 200);
        request.actor = AuditActor {
            user_id: Some(user_id),
            name: Some("Usher One".to_owned()),
            email: Some("usher@example.org".to_owned()),
            role: Some("usher".to_owned()),
        };

        assert!(recorder.record(request).await);
        let entries = repository.entries.lock().await;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].actor.user_id, Some(user_id));
        assert_eq!(entries[0].actor.role.as_deref(), Some("usher"));
        assert_eq!(entries[0].resource_id.as_deref(), Some("17"));
    }

    #[tokio::test]
    async fn write_failures_are_swallowed() {
        let repository = Arc::new(FakeAuditLog::default());
        *repository.fail_appends.lock().await = true;
        let recorder = AuditRecorder::new(repository.clone());

        assert!(!recorder.record(context("POST", "/api/sermons", 201)).await);
        assert!(repository.entries.lock().await.is_empty());
    }
}
