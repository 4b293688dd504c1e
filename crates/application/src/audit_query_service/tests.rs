use std::sync::Arc;

use chrono::{Duration, Utc};

use ecclesia_core::{AppError, UserId, UserIdentity};
use ecclesia_domain::{
    AuditAction, ResourceType, TransactionAuditAction, TransactionType,
};

use super::{AuditQueryService, SECURITY_ALERT_LIMIT};
use crate::test_support::{FakeAuditLog, FakeRoleStore, FakeTransactionAuditLog};
use crate::{
    AuditActor, AuditLogFilter, AuditLogQuery, AuthorizationService, DateRange,
    NewAuditLogEntry, NewTransactionAuditEntry,
};

struct Harness {
    service: AuditQueryService,
    roles: Arc<FakeRoleStore>,
    audit_log: Arc<FakeAuditLog>,
    transactions: Arc<FakeTransactionAuditLog>,
}

fn harness(export_max_rows: usize) -> Harness {
    let roles = Arc::new(FakeRoleStore::seeded());
    let audit_log = Arc::new(FakeAuditLog::default());
    let transactions = Arc::new(FakeTransactionAuditLog::default());
    let service = AuditQueryService::new(
        AuthorizationService::new(roles.clone()),
        audit_log.clone(),
        transactions.clone(),
        export_max_rows,
    );

    Harness {
        service,
        roles,
        audit_log,
        transactions,
    }
}

async fn actor(roles: &FakeRoleStore, role: &str) -> UserIdentity {
    let user_id = UserId::new();
    roles.assign(user_id, roles.role_id_of(role).await).await;
    UserIdentity::new(user_id, "Actor", "actor@example.org", Some(role.to_owned()))
}

fn audit_entry(action: AuditAction, resource_type: ResourceType) -> NewAuditLogEntry {
    NewAuditLogEntry {
        actor: AuditActor::anonymous(),
        action,
        resource_type,
        resource_id: None,
        resource_name: None,
        method: "POST".to_owned(),
        endpoint: "/api/sermons".to_owned(),
        status_code: 201,
        success: true,
        ip_address: None,
        user_agent: None,
        metadata: None,
        changes: None,
        error_message: None,
        duration_ms: 5,
    }
}

fn transaction_entry(action: TransactionAuditAction) -> NewTransactionAuditEntry {
    NewTransactionAuditEntry {
        transaction_id: "pay-001".to_owned(),
        transaction_type: TransactionType::Payment,
        action,
        actor: AuditActor::anonymous(),
        payment_method: None,
        amount_minor: 150_000,
        currency: "KES".to_owned(),
        previous_state: None,
        new_state: None,
        idempotency_key: None,
        external_reference: None,
        verified_by: None,
        verified_at: None,
        ip_address: None,
        metadata: None,
    }
}

#[tokio::test]
async fn listing_normalizes_paging_before_querying() {
    let harness = harness(100);
    let bishop = actor(&harness.roles, "bishop").await;

    let query = AuditLogQuery {
        page: 0,
        limit: 500,
        ..AuditLogQuery::default()
    };
    let page = harness.service.list_audit_logs(&bishop, query).await;
    assert!(page.is_ok());

    let recorded = harness.audit_log.last_query.lock().await.clone();
    assert_eq!(recorded.map(|query| (query.page, query.limit)), Some((1, 100)));
}

#[tokio::test]
async fn reads_require_audit_permission() {
    let harness = harness(100);
    let pastor = actor(&harness.roles, "pastor").await;

    let listed = harness
        .service
        .list_audit_logs(&pastor, AuditLogQuery::default())
        .await;
    assert!(matches!(listed, Err(AppError::Forbidden(_))));

    let exported = harness
        .service
        .export_csv(&pastor, AuditLogFilter::default())
        .await;
    assert!(matches!(exported, Err(AppError::Forbidden(_))));
}

#[tokio::test]
async fn export_quotes_fields_and_reports_truncation() {
    let harness = harness(2);
    let admin = actor(&harness.roles, "admin").await;
    let now = Utc::now();

    let mut quoted = audit_entry(AuditAction::SermonCreate, ResourceType::Sermon);
    quoted.actor = AuditActor {
        user_id: Some(UserId::new()),
        name: Some("Ada \"Mama\" Obi".to_owned()),
        email: Some("ada@example.org".to_owned()),
        role: Some("pastor".to_owned()),
    };
    quoted.resource_id = Some("s-1".to_owned());
    quoted.ip_address = Some("203.0.113.9".to_owned());

    harness
        .audit_log
        .seed(
            audit_entry(AuditAction::EventCreate, ResourceType::Event),
            now - Duration::hours(3),
        )
        .await;
    harness
        .audit_log
        .seed(
            audit_entry(AuditAction::BlogDelete, ResourceType::Blog),
            now - Duration::hours(2),
        )
        .await;
    harness
        .audit_log
        .seed(quoted, now - Duration::hours(1))
        .await;

    let export = harness
        .service
        .export_csv(&admin, AuditLogFilter::default())
        .await;
    let Ok(export) = export else {
        panic!("expected export to succeed");
    };

    assert!(export.truncated);
    assert_eq!(export.row_count, 2);
    assert_eq!(*harness.audit_log.last_export_limit.lock().await, Some(3));

    let lines: Vec<&str> = export.content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "Timestamp,User,Email,Role,Action,Resource Type,Resource ID,Method,Endpoint,Status,IP Address,Success"
    );
    assert!(lines[1].contains("\"Ada \"\"Mama\"\" Obi\",\"ada@example.org\",\"pastor\",\"sermon.create\",\"sermon\",\"s-1\""));
    assert!(lines[1].ends_with("\"201\",\"203.0.113.9\",\"Yes\""));
    assert!(lines[2].contains("\"Anonymous\""));
    assert!(lines[2].contains("\"blog.delete\""));
}

#[tokio::test]
async fn export_under_cap_is_not_truncated() {
    let harness = harness(10);
    let bishop = actor(&harness.roles, "bishop").await;
    harness
        .audit_log
        .seed(
            audit_entry(AuditAction::SermonLike, ResourceType::Sermon),
            Utc::now(),
        )
        .await;

    let export = harness
        .service
        .export_csv(&bishop, AuditLogFilter::default())
        .await;
    assert_eq!(
        export.ok().map(|export| (export.row_count, export.truncated)),
        Some((1, false))
    );
}

#[tokio::test]
async fn security_alerts_default_to_one_day_window() {
    let harness = harness(100);
    let bishop = actor(&harness.roles, "bishop").await;

    let before = Utc::now();
    let alerts = harness.service.security_alerts(&bishop, None).await;
    assert!(alerts.is_ok());

    let window = *harness.audit_log.last_alert_window.lock().await;
    let Some((since, limit)) = window else {
        panic!("expected alerts to be queried");
    };
    assert_eq!(limit, SECURITY_ALERT_LIMIT);
    let expected = before - Duration::hours(24);
    assert!((since - expected).num_seconds().abs() < 60);
}

#[tokio::test]
async fn inverted_ranges_and_zero_windows_are_rejected() {
    let harness = harness(100);
    let admin = actor(&harness.roles, "admin").await;
    let now = Utc::now();

    let range = DateRange {
        from: Some(now),
        to: Some(now - Duration::days(1)),
    };
    let statistics = harness.service.statistics(&admin, range).await;
    assert!(matches!(statistics, Err(AppError::Validation(_))));

    let alerts = harness.service.security_alerts(&admin, Some(0)).await;
    assert!(matches!(alerts, Err(AppError::Validation(_))));

    let sweep = harness.service.run_retention_sweep(&admin, Some(0)).await;
    assert!(matches!(sweep, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn windows_beyond_the_calendar_are_rejected() {
    let harness = harness(100);
    let admin = actor(&harness.roles, "admin").await;

    let alerts = harness.service.security_alerts(&admin, Some(u32::MAX)).await;
    assert!(matches!(alerts, Err(AppError::Validation(_))));

    let sweep = harness
        .service
        .run_retention_sweep(&admin, Some(u32::MAX))
        .await;
    assert!(matches!(sweep, Err(AppError::Validation(_))));

    let unattended = harness.service.sweep_retention(u32::MAX).await;
    assert!(matches!(unattended, Err(AppError::Validation(_))));
    assert!(harness.audit_log.last_alert_window.lock().await.is_none());
}

#[tokio::test]
async fn retention_sweep_keeps_protected_and_critical_entries() {
    let harness = harness(100);
    let admin = actor(&harness.roles, "admin").await;
    let now = Utc::now();
    let aged = now - Duration::days(100);

    harness
        .audit_log
        .seed(audit_entry(AuditAction::SermonCreate, ResourceType::Sermon), aged)
        .await;
    harness
        .audit_log
        .seed(audit_entry(AuditAction::RoleUpdate, ResourceType::Role), aged)
        .await;
    harness
        .audit_log
        .seed(
            audit_entry(AuditAction::SermonCreate, ResourceType::Sermon),
            now - Duration::days(1),
        )
        .await;

    harness
        .transactions
        .seed(
            transaction_entry(TransactionAuditAction::PaymentStatusChecked),
            aged,
        )
        .await;
    harness
        .transactions
        .seed(transaction_entry(TransactionAuditAction::PaymentCompleted), aged)
        .await;
    harness
        .transactions
        .seed(
            transaction_entry(TransactionAuditAction::PaymentStatusChecked),
            now - Duration::days(1),
        )
        .await;

    let result = harness.service.run_retention_sweep(&admin, None).await;
    let Ok(result) = result else {
        panic!("expected sweep to succeed");
    };
    assert_eq!(result.audit_entries_deleted, 1);
    assert_eq!(result.transaction_entries_deleted, 1);

    let remaining: Vec<AuditAction> = harness
        .audit_log
        .entries
        .lock()
        .await
        .iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        remaining,
        vec![AuditAction::RoleUpdate, AuditAction::SermonCreate]
    );

    let remaining_transactions: Vec<TransactionAuditAction> = harness
        .transactions
        .entries
        .lock()
        .await
        .iter()
        .map(|entry| entry.action)
        .collect();
    assert_eq!(
        remaining_transactions,
        vec![
            TransactionAuditAction::PaymentCompleted,
            TransactionAuditAction::PaymentStatusChecked,
        ]
    );
}

#[tokio::test]
async fn retention_sweep_is_admin_only() {
    let harness = harness(100);
    let bishop = actor(&harness.roles, "bishop").await;

    let result = harness.service.run_retention_sweep(&bishop, None).await;
    assert!(matches!(result, Err(AppError::Forbidden(_))));
}
