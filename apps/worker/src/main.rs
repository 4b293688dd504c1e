//! Ecclesia maintenance worker: audit retention and expired token cleanup.

#![forbid(unsafe_code)]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ecclesia_application::{AuditQueryService, AuthorizationService, DEFAULT_RETENTION_DAYS};
use ecclesia_core::{AppError, AppResult};
use ecclesia_infrastructure::{
    PostgresAuditLogRepository, PostgresAuthTokenRepository, PostgresRoleRepository,
    PostgresTransactionAuditRepository,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone)]
struct WorkerConfig {
    database_url: String,
    retention_days: u32,
    interval_secs: u64,
    run_once: bool,
}

struct MaintenanceJobs {
    audit_query_service: AuditQueryService,
    auth_token_repository: PostgresAuthTokenRepository,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = WorkerConfig::load()?;
    let pool = connect_pool(config.database_url.as_str()).await?;
    let jobs = MaintenanceJobs::new(pool);

    info!(
        retention_days = config.retention_days,
        interval_secs = config.interval_secs,
        run_once = config.run_once,
        "ecclesia-worker started"
    );

    if config.run_once {
        jobs.run(&config).await;
        return Ok(());
    }

    let mut interval = tokio::time::interval(Duration::from_secs(config.interval_secs));
    loop {
        interval.tick().await;
        jobs.run(&config).await;
    }
}

impl MaintenanceJobs {
    fn new(pool: PgPool) -> Self {
        let authorization_service =
            AuthorizationService::new(Arc::new(PostgresRoleRepository::new(pool.clone())));
        let audit_query_service = AuditQueryService::new(
            authorization_service,
            Arc::new(PostgresAuditLogRepository::new(pool.clone())),
            Arc::new(PostgresTransactionAuditRepository::new(pool.clone())),
            1,
        );

        Self {
            audit_query_service,
            auth_token_repository: PostgresAuthTokenRepository::new(pool),
        }
    }

    /// Runs every job once. Failures are logged and retried on the next tick.
    async fn run(&self, config: &WorkerConfig) {
        match self
            .audit_query_service
            .sweep_retention(config.retention_days)
            .await
        {
            Ok(result) => info!(
                cutoff = %result.cutoff.to_rfc3339(),
                audit_entries_deleted = result.audit_entries_deleted,
                transaction_entries_deleted = result.transaction_entries_deleted,
                "audit retention sweep finished"
            ),
            Err(error) => warn!(error = %error, "audit retention sweep failed"),
        }

        match self.auth_token_repository.delete_expired(Utc::now()).await {
            Ok(deleted) => info!(deleted, "expired auth tokens removed"),
            Err(error) => warn!(error = %error, "failed to remove expired auth tokens"),
        }
    }
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(2)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

impl WorkerConfig {
    fn load() -> AppResult<Self> {
        let database_url = required_env("DATABASE_URL")?;
        let retention_days = parse_env_u32("AUDIT_RETENTION_DAYS", DEFAULT_RETENTION_DAYS)?;
        let interval_secs = parse_env_u64("AUDIT_RETENTION_INTERVAL_SECS", 86_400)?;
        let run_once = env::args().skip(1).any(|argument| argument == "once");

        if retention_days == 0 {
            return Err(AppError::Validation(
                "AUDIT_RETENTION_DAYS must be greater than zero".to_owned(),
            ));
        }

        if chrono::Duration::try_days(i64::from(retention_days))
            .and_then(|window| Utc::now().checked_sub_signed(window))
            .is_none()
        {
            return Err(AppError::Validation(format!(
                "AUDIT_RETENTION_DAYS value '{retention_days}' is out of range"
            )));
        }

        if interval_secs == 0 {
            return Err(AppError::Validation(
                "AUDIT_RETENTION_INTERVAL_SECS must be greater than zero".to_owned(),
            ));
        }

        Ok(Self {
            database_url,
            retention_days,
            interval_secs,
            run_once,
        })
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

fn required_env(name: &str) -> AppResult<String> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn parse_env_u32(name: &str, default: u32) -> AppResult<u32> {
    match env::var(name) {
        Ok(value) => value.parse::<u32>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(name: &str, default: u64) -> AppResult<u64> {
    match env::var(name) {
        Ok(value) => value.parse::<u64>().map_err(|error| {
            AppError::Validation(format!("invalid {name} value '{value}': {error}"))
        }),
        Err(_) => Ok(default),
    }
}
