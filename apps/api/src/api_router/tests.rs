use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Method, Request, StatusCode, header};
use chrono::{DateTime, Utc};
use ecclesia_application::{
    AuditActor, AuditLogEntry, AuditLogFilter, AuditLogPage, AuditLogQuery, AuditLogRepository,
    AuditRecorder, AuditStatistics, DateRange, NewAuditLogEntry, NewUser, PasswordHasher,
    RoleRepository, SecurityAlerts, UserRepository,
};
use ecclesia_core::{AppError, AppResult, UserId};
use ecclesia_domain::{AuditAction, ResourceType};
use serde_json::{Value, json};
use tower::ServiceExt;

use crate::api_services::{InMemoryRepositories, build_in_memory_app_state};
use crate::state::AppState;

use super::build_router;

const PASSWORD: &str = "Correct-Horse-42";

struct TestApp {
    router: Router,
    repositories: InMemoryRepositories,
}

impl TestApp {
    fn new(audit_export_max_rows: usize) -> Self {
        let repositories = InMemoryRepositories::seeded();
        let state = build_in_memory_app_state(&repositories, audit_export_max_rows, Vec::new());
        Self::with_state(repositories, state)
    }

    fn with_state(repositories: InMemoryRepositories, state: AppState) -> Self {
        let router = build_router(state, "http://localhost:3000")
            .unwrap_or_else(|error| panic!("router should build: {error}"));
        Self {
            router,
            repositories,
        }
    }

    async fn create_user(&self, email: &str, role_name: Option<&str>) -> UserId {
        let role_id = match role_name {
            Some(role_name) => {
                let role = RoleRepository::find_role_by_name(
                    self.repositories.security.as_ref(),
                    role_name,
                )
                .await
                .unwrap_or_else(|error| panic!("role lookup failed: {error}"));
                let Some(role) = role else {
                    panic!("role '{role_name}' should be seeded");
                };
                Some(role.role_id)
            }
            None => None,
        };
        let password_hash = self
            .repositories
            .password_hasher
            .hash_password(PASSWORD)
            .unwrap_or_else(|error| panic!("hashing failed: {error}"));

        UserRepository::create_user(
            self.repositories.security.as_ref(),
            NewUser {
                email: email.to_owned(),
                display_name: email.split('@').next().unwrap_or_default().to_owned(),
                password_hash,
                role_id,
            },
        )
        .await
        .unwrap_or_else(|error| panic!("user creation failed: {error}"))
        .id
    }

    async fn login(&self, email: &str) -> String {
        let (status, _, body) = self
            .send(json_request(
                Method::POST,
                "/api/auth/login",
                None,
                json!({ "email": email, "password": PASSWORD }),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);

        let Some(token) = json_body(&body)["token"].as_str().map(str::to_owned) else {
            panic!("login response should carry a token");
        };
        token
    }

    async fn user_with_token(&self, email: &str, role_name: &str) -> String {
        self.create_user(email, Some(role_name)).await;
        self.login(email).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|error| match error {});
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap_or_else(|error| panic!("body should be readable: {error}"));
        (status, headers, body)
    }

    async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, HeaderMap, Bytes) {
        self.send(request(Method::GET, uri, token, Body::empty()))
            .await
    }

    /// Waits for spawned audit writes to land.
    async fn audit_entries_matching(
        &self,
        predicate: impl Fn(&AuditLogEntry) -> bool,
    ) -> Vec<AuditLogEntry> {
        for _ in 0..100 {
            let entries = self
                .repositories
                .audit
                .audit_entries()
                .await
                .into_iter()
                .filter(|entry| predicate(entry))
                .collect::<Vec<_>>();
            if !entries.is_empty() {
                return entries;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        Vec::new()
    }
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(body)
        .unwrap_or_else(|error| panic!("request should build: {error}"))
}

fn json_request(method: Method, uri: &str, token: Option<&str>, payload: Value) -> Request<Body> {
    let mut request = request(method, uri, token, Body::from(payload.to_string()));
    request.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static("application/json"),
    );
    request
}

fn json_body(body: &Bytes) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn seeded_entry(action: AuditAction) -> NewAuditLogEntry {
    NewAuditLogEntry {
        actor: AuditActor::anonymous(),
        action,
        resource_type: ResourceType::Auth,
        resource_id: None,
        resource_name: None,
        method: "POST".to_owned(),
        endpoint: "/api/auth/login".to_owned(),
        status_code: 401,
        success: false,
        ip_address: Some("203.0.113.7".to_owned()),
        user_agent: None,
        metadata: None,
        changes: None,
        error_message: None,
        duration_ms: 3,
    }
}

struct FailingAuditLogRepository;

#[async_trait]
impl AuditLogRepository for FailingAuditLogRepository {
    async fn append_entry(&self, _entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }

    async fn list_entries(&self, _query: &AuditLogQuery) -> AppResult<AuditLogPage> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }

    async fn export_entries(
        &self,
        _filter: &AuditLogFilter,
        _max_rows: usize,
    ) -> AppResult<Vec<AuditLogEntry>> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }

    async fn statistics(&self, _range: &DateRange, _top_n: usize) -> AppResult<AuditStatistics> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }

    async fn security_alerts(
        &self,
        _since: DateTime<Utc>,
        _limit: usize,
    ) -> AppResult<SecurityAlerts> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }

    async fn purge_entries_older_than(
        &self,
        _cutoff: DateTime<Utc>,
        _protected_actions: &[AuditAction],
    ) -> AppResult<u64> {
        Err(AppError::Internal("audit store offline".to_owned()))
    }
}

#[tokio::test]
async fn health_is_public_and_never_audited() {
    let app = TestApp::new(100);

    let (status, _, body) = app.get("/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["status"], "ok");

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(app.repositories.audit.audit_entries().await.is_empty());
}

#[tokio::test]
async fn protected_routes_reject_anonymous_callers() {
    let app = TestApp::new(100);

    let (status, _, body) = app.get("/api/audit-logs", None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(&body),
        json!({ "success": false, "message": "Authentication required" })
    );
}

#[tokio::test]
async fn garbage_bearer_tokens_are_treated_as_anonymous() {
    let app = TestApp::new(100);

    let (status, _, _) = app.get("/api/auth/me", Some("not-a-real-token")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn insufficient_permissions_report_requirements_and_are_audited() {
    let app = TestApp::new(100);
    let token = app.user_with_token("helper@example.org", "volunteer").await;

    let (status, _, body) = app.get("/api/roles", Some(token.as_str())).await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(&body),
        json!({
            "success": false,
            "message": "Insufficient permissions",
            "requiredPermissions": ["manage:roles"],
            "userPermissions": ["manage:events"],
            "userRole": "volunteer",
        })
    );

    let denied = app
        .audit_entries_matching(|entry| entry.action == AuditAction::SystemAccessDenied)
        .await;
    assert_eq!(denied.len(), 1);
    assert_eq!(denied[0].status_code, 403);
    assert!(!denied[0].success);
    assert_eq!(denied[0].endpoint, "/api/roles");
    assert_eq!(denied[0].actor.email.as_deref(), Some("helper@example.org"));
}

#[tokio::test]
async fn failed_logins_are_recorded_anonymously() {
    let app = TestApp::new(100);
    app.create_user("pastor@example.org", Some("pastor")).await;

    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/auth/login",
            None,
            json!({ "email": "pastor@example.org", "password": "wrong-password" }),
        ))
        .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json_body(&body)["success"], false);

    let failed = app
        .audit_entries_matching(|entry| entry.action == AuditAction::AuthLoginFailed)
        .await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].status_code, 401);
    assert_eq!(failed[0].actor, AuditActor::anonymous());
}

#[tokio::test]
async fn failed_logins_surface_in_security_alerts_by_ip() {
    let app = TestApp::new(100);
    app.create_user("pastor@example.org", Some("pastor")).await;
    let admin = app.user_with_token("admin@example.org", "admin").await;

    let mut attempt = json_request(
        Method::POST,
        "/api/auth/login",
        None,
        json!({ "email": "pastor@example.org", "password": "wrong-password" }),
    );
    attempt
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from(([203, 0, 113, 50], 41_000))));
    let (status, _, _) = app.send(attempt).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let failed = app
        .audit_entries_matching(|entry| entry.action == AuditAction::AuthLoginFailed)
        .await;
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].ip_address.as_deref(), Some("203.0.113.50"));

    let (status, _, body) = app
        .get("/api/audit-logs/security-alerts", Some(admin.as_str()))
        .await;
    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["failedLogins"][0]["ipAddress"], "203.0.113.50");
    assert_eq!(body["failedLogins"][0]["attempts"], 1);
}

#[tokio::test]
async fn successful_logins_are_attributed_to_the_new_session() {
    let app = TestApp::new(100);
    let user_id = app.create_user("bishop@example.org", Some("bishop")).await;
    app.login("bishop@example.org").await;

    let logins = app
        .audit_entries_matching(|entry| entry.action == AuditAction::AuthLogin)
        .await;

    assert_eq!(logins.len(), 1);
    assert_eq!(logins[0].actor.user_id, Some(user_id));
    assert_eq!(logins[0].actor.role.as_deref(), Some("bishop"));
}

#[tokio::test]
async fn bishops_can_page_through_audit_logs() {
    let app = TestApp::new(100);
    for _ in 0..3 {
        app.repositories
            .audit
            .insert_at(seeded_entry(AuditAction::AuthLoginFailed), Utc::now())
            .await;
    }
    let token = app.user_with_token("bishop@example.org", "bishop").await;

    let (status, _, body) = app
        .get(
            "/api/audit-logs?action=auth.login.failed&limit=2",
            Some(token.as_str()),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    let body = json_body(&body);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().map(Vec::len), Some(2));
    assert_eq!(body["pagination"]["total"], 3);
    assert_eq!(body["pagination"]["totalPages"], 2);
    assert_eq!(body["data"][0]["action"], "auth.login.failed");
}

#[tokio::test]
async fn invalid_audit_filters_are_rejected() {
    let app = TestApp::new(100);
    let token = app.user_with_token("bishop@example.org", "bishop").await;

    let (status, _, body) = app
        .get("/api/audit-logs?startDate=yesterday", Some(token.as_str()))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["success"], false);
}

#[tokio::test]
async fn oversized_time_windows_are_rejected() {
    let app = TestApp::new(100);
    let admin = app.user_with_token("admin@example.org", "admin").await;

    let (status, _, body) = app
        .get(
            "/api/audit-logs/security-alerts?hours=4294967295",
            Some(admin.as_str()),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json_body(&body)["success"], false);

    let (status, _, _) = app
        .send(json_request(
            Method::POST,
            "/api/audit-logs/retention",
            Some(admin.as_str()),
            json!({ "days": 4_294_967_295_u32 }),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_streams_csv_attachment_and_flags_truncation() {
    let app = TestApp::new(1);
    for _ in 0..2 {
        app.repositories
            .audit
            .insert_at(seeded_entry(AuditAction::AuthLoginFailed), Utc::now())
            .await;
    }
    let token = app.user_with_token("admin@example.org", "admin").await;

    let (status, headers, body) = app
        .get("/api/audit-logs/export", Some(token.as_str()))
        .await;

    assert_eq!(status, StatusCode::OK);
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(content_type.starts_with("text/csv"));
    let disposition = headers
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();
    assert!(disposition.starts_with("attachment; filename=\"audit-logs-"));
    assert!(disposition.ends_with(".csv\""));
    assert_eq!(
        headers
            .get("x-export-truncated")
            .and_then(|value| value.to_str().ok()),
        Some("true")
    );

    let csv = String::from_utf8_lossy(&body);
    let lines = csv.lines().collect::<Vec<_>>();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("Timestamp,"));
}

#[tokio::test]
async fn retention_sweep_requires_the_admin_role() {
    let app = TestApp::new(100);
    let bishop = app.user_with_token("bishop@example.org", "bishop").await;
    let admin = app.user_with_token("admin@example.org", "admin").await;

    let (status, _, body) = app
        .send(request(
            Method::POST,
            "/api/audit-logs/retention",
            Some(bishop.as_str()),
            Body::empty(),
        ))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(&body),
        json!({
            "success": false,
            "message": "Admin access required",
            "userRole": "bishop",
        })
    );

    app.repositories
        .audit
        .insert_at(
            seeded_entry(AuditAction::AuthLoginFailed),
            Utc::now() - chrono::Duration::days(400),
        )
        .await;
    let (status, _, body) = app
        .send(json_request(
            Method::POST,
            "/api/audit-logs/retention",
            Some(admin.as_str()),
            json!({ "days": 30 }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["auditEntriesDeleted"], 1);
}

#[tokio::test]
async fn role_edits_apply_to_the_next_request() {
    let app = TestApp::new(100);
    let volunteer = app.user_with_token("helper@example.org", "volunteer").await;
    let admin = app.user_with_token("admin@example.org", "admin").await;

    let (status, _, _) = app.get("/api/audit-logs", Some(volunteer.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _, body) = app
        .send(json_request(
            Method::PUT,
            "/api/roles/volunteer",
            Some(admin.as_str()),
            json!({ "permissions": ["manage:events", "view:audit_logs"] }),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body)["name"], "volunteer");

    let (status, _, _) = app.get("/api/audit-logs", Some(volunteer.as_str())).await;
    assert_eq!(status, StatusCode::OK);

    let updates = app
        .audit_entries_matching(|entry| entry.action == AuditAction::RoleUpdate)
        .await;
    assert_eq!(updates.len(), 1);
    let Some(changes) = updates[0].changes.as_ref() else {
        panic!("role update should record its changes");
    };
    assert_eq!(changes.before, None);
    assert_eq!(
        changes.after,
        Some(json!({ "permissions": ["manage:events", "view:audit_logs"] }))
    );
}

#[tokio::test]
async fn cleared_roles_deny_every_gated_route() {
    let app = TestApp::new(100);
    let user_id = app
        .create_user("bishop@example.org", Some("bishop"))
        .await;
    let bishop = app.login("bishop@example.org").await;
    let admin = app.user_with_token("admin@example.org", "admin").await;

    let (status, _, _) = app
        .send(request(
            Method::DELETE,
            format!("/api/users/{user_id}/role").as_str(),
            Some(admin.as_str()),
            Body::empty(),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, body) = app.get("/api/audit-logs", Some(bishop.as_str())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(&body)["message"],
        "No role assigned to this account"
    );
}

#[tokio::test]
async fn audit_store_failures_never_reach_the_client() {
    let repositories = InMemoryRepositories::seeded();
    let mut state = build_in_memory_app_state(&repositories, 100, Vec::new());
    state.audit_recorder = AuditRecorder::new(Arc::new(FailingAuditLogRepository));
    let app = TestApp::with_state(repositories, state);
    let token = app.user_with_token("admin@example.org", "admin").await;

    let (status, _, body) = app.get("/api/roles", Some(token.as_str())).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_body(&body).as_array().map(Vec::is_empty), Some(false));
}
