use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use ecclesia_application::{
    AccessDeniedSummary, ActionCount, ActorActivity, AuditLogEntry, AuditLogFilter, AuditLogPage,
    AuditLogQuery, AuditLogRepository, AuditSortField, AuditStatistics, DateRange,
    FailedLoginSummary, NewAuditLogEntry, NewTransactionAuditEntry, ResourceTypeCount,
    SecurityAlerts, SortDirection, TransactionAuditLogEntry, TransactionAuditPage,
    TransactionAuditQuery, TransactionAuditRepository,
};
use ecclesia_core::{AppError, AppResult, UserId};
use ecclesia_domain::{AuditAction, TransactionAuditAction};

/// In-memory audit trail for tests and local development.
///
/// Mirrors the PostgreSQL adapters: entries are append-only and only the
/// retention purge removes them.
#[derive(Debug, Default)]
pub struct InMemoryAuditRepository {
    audit_entries: RwLock<Vec<AuditLogEntry>>,
    transaction_entries: RwLock<Vec<TransactionAuditLogEntry>>,
}

impl InMemoryAuditRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an entry with an explicit timestamp, bypassing the clock.
    pub async fn insert_at(&self, entry: NewAuditLogEntry, created_at: DateTime<Utc>) {
        self.audit_entries
            .write()
            .await
            .push(entry.into_entry(Uuid::new_v4(), created_at));
    }

    /// Stores a transaction entry with an explicit timestamp.
    pub async fn insert_transaction_at(
        &self,
        entry: NewTransactionAuditEntry,
        created_at: DateTime<Utc>,
    ) {
        self.transaction_entries
            .write()
            .await
            .push(entry.into_entry(Uuid::new_v4(), created_at));
    }

    /// Returns a snapshot of every stored audit entry in insertion order.
    pub async fn audit_entries(&self) -> Vec<AuditLogEntry> {
        self.audit_entries.read().await.clone()
    }

    /// Returns a snapshot of every stored transaction entry.
    pub async fn transaction_entries(&self) -> Vec<TransactionAuditLogEntry> {
        self.transaction_entries.read().await.clone()
    }
}

fn contains_ignore_case(haystack: Option<&str>, needle: &str) -> bool {
    haystack.is_some_and(|value| value.to_lowercase().contains(needle))
}

fn matches_filter(entry: &AuditLogEntry, filter: &AuditLogFilter) -> bool {
    if filter
        .actor_id
        .is_some_and(|actor_id| entry.actor.user_id != Some(actor_id))
    {
        return false;
    }
    if filter.action.is_some_and(|action| entry.action != action) {
        return false;
    }
    if filter
        .resource_type
        .is_some_and(|resource_type| entry.resource_type != resource_type)
    {
        return false;
    }
    if filter.success.is_some_and(|success| entry.success != success) {
        return false;
    }
    if !filter.range.contains(entry.created_at) {
        return false;
    }
    if let Some(ip_address) = filter.ip_address.as_deref()
        && entry.ip_address.as_deref() != Some(ip_address)
    {
        return false;
    }

    match filter
        .search
        .as_deref()
        .map(str::trim)
        .filter(|search| !search.is_empty())
    {
        Some(search) => {
            let needle = search.to_lowercase();
            contains_ignore_case(entry.actor.email.as_deref(), needle.as_str())
                || contains_ignore_case(entry.actor.name.as_deref(), needle.as_str())
                || contains_ignore_case(Some(entry.endpoint.as_str()), needle.as_str())
                || contains_ignore_case(entry.resource_name.as_deref(), needle.as_str())
        }
        None => true,
    }
}

fn compare_by(left: &AuditLogEntry, right: &AuditLogEntry, field: AuditSortField) -> Ordering {
    let primary = match field {
        AuditSortField::CreatedAt => left.created_at.cmp(&right.created_at),
        AuditSortField::Action => left.action.as_str().cmp(right.action.as_str()),
        AuditSortField::ResourceType => left
            .resource_type
            .as_str()
            .cmp(right.resource_type.as_str()),
        AuditSortField::StatusCode => left.status_code.cmp(&right.status_code),
        AuditSortField::DurationMs => left.duration_ms.cmp(&right.duration_ms),
        AuditSortField::ActorEmail => left.actor.email.cmp(&right.actor.email),
        AuditSortField::IpAddress => left.ip_address.cmp(&right.ip_address),
        AuditSortField::Method => left.method.cmp(&right.method),
        AuditSortField::Endpoint => left.endpoint.cmp(&right.endpoint),
        AuditSortField::Success => left.success.cmp(&right.success),
        AuditSortField::ResourceId => left.resource_id.cmp(&right.resource_id),
        AuditSortField::ResourceName => left.resource_name.cmp(&right.resource_name),
        AuditSortField::ActorId => left.actor.user_id.cmp(&right.actor.user_id),
        AuditSortField::ActorName => left.actor.name.cmp(&right.actor.name),
        AuditSortField::ActorRole => left.actor.role.cmp(&right.actor.role),
        AuditSortField::UserAgent => left.user_agent.cmp(&right.user_agent),
        AuditSortField::ErrorMessage => left.error_message.cmp(&right.error_message),
    };

    primary.then_with(|| left.entry_id.cmp(&right.entry_id))
}

fn newest_first(left: &AuditLogEntry, right: &AuditLogEntry) -> Ordering {
    right
        .created_at
        .cmp(&left.created_at)
        .then_with(|| right.entry_id.cmp(&left.entry_id))
}

fn page_bounds(offset: u64, limit: u32, len: usize) -> (usize, usize) {
    let start = usize::try_from(offset).unwrap_or(usize::MAX).min(len);
    let end = start
        .saturating_add(usize::try_from(limit).unwrap_or(usize::MAX))
        .min(len);
    (start, end)
}

/// Counts entries per key, ordered by count descending then key ascending.
fn ranked_counts<K, F>(entries: &[&AuditLogEntry], key_of: F) -> Vec<(K, u64)>
where
    K: Copy + Eq + std::hash::Hash,
    F: Fn(&AuditLogEntry) -> (K, &'static str),
{
    let mut counts: HashMap<K, (&'static str, u64)> = HashMap::new();
    for entry in entries {
        let (key, label) = key_of(entry);
        counts.entry(key).or_insert((label, 0)).1 += 1;
    }

    let mut ranked = counts.into_iter().collect::<Vec<_>>();
    ranked.sort_by(|(_, (left_label, left_count)), (_, (right_label, right_count))| {
        right_count
            .cmp(left_count)
            .then_with(|| left_label.cmp(right_label))
    });
    ranked
        .into_iter()
        .map(|(key, (_, count))| (key, count))
        .collect()
}

fn failed_logins_in(entries: &[&AuditLogEntry], limit: usize) -> Vec<FailedLoginSummary> {
    let mut groups: HashMap<Option<String>, FailedLoginSummary> = HashMap::new();
    for entry in entries
        .iter()
        .filter(|entry| entry.action == AuditAction::AuthLoginFailed)
    {
        let summary = groups
            .entry(entry.ip_address.clone())
            .or_insert_with(|| FailedLoginSummary {
                ip_address: entry.ip_address.clone(),
                attempts: 0,
                last_attempt: entry.created_at,
            });
        summary.attempts += 1;
        summary.last_attempt = summary.last_attempt.max(entry.created_at);
    }

    let mut summaries = groups.into_values().collect::<Vec<_>>();
    summaries.sort_by(|left, right| {
        right
            .attempts
            .cmp(&left.attempts)
            .then_with(|| right.last_attempt.cmp(&left.last_attempt))
    });
    summaries.truncate(limit);
    summaries
}

#[async_trait]
impl AuditLogRepository for InMemoryAuditRepository {
    async fn append_entry(&self, entry: NewAuditLogEntry) -> AppResult<AuditLogEntry> {
        let stored = entry.into_entry(Uuid::new_v4(), Utc::now());
        self.audit_entries.write().await.push(stored.clone());
        debug!(action = %stored.action, "audit entry appended in memory");
        Ok(stored)
    }

    async fn list_entries(&self, query: &AuditLogQuery) -> AppResult<AuditLogPage> {
        let entries = self.audit_entries.read().await;
        let mut matching = entries
            .iter()
            .filter(|entry| matches_filter(entry, &query.filter))
            .cloned()
            .collect::<Vec<_>>();

        matching.sort_by(|left, right| {
            let ordering = compare_by(left, right, query.sort_field);
            match query.sort_direction {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });

        let total = matching.len() as u64;
        let (start, end) = page_bounds(query.offset(), query.limit, matching.len());

        Ok(AuditLogPage {
            entries: matching.drain(start..end).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn export_entries(
        &self,
        filter: &AuditLogFilter,
        max_rows: usize,
    ) -> AppResult<Vec<AuditLogEntry>> {
        let entries = self.audit_entries.read().await;
        let mut matching = entries
            .iter()
            .filter(|entry| matches_filter(entry, filter))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(newest_first);
        matching.truncate(max_rows);
        Ok(matching)
    }

    async fn statistics(&self, range: &DateRange, top_n: usize) -> AppResult<AuditStatistics> {
        let entries = self.audit_entries.read().await;
        let mut window = entries
            .iter()
            .filter(|entry| range.contains(entry.created_at))
            .collect::<Vec<_>>();
        window.sort_by(|left, right| newest_first(left, right));

        let mut top_actions = ranked_counts(&window, |entry| (entry.action, entry.action.as_str()))
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect::<Vec<_>>();
        top_actions.truncate(top_n);

        let by_resource_type = ranked_counts(&window, |entry| {
            (entry.resource_type, entry.resource_type.as_str())
        })
        .into_iter()
        .map(|(resource_type, count)| ResourceTypeCount {
            resource_type,
            count,
        })
        .collect();

        let mut actors: HashMap<UserId, ActorActivity> = HashMap::new();
        for entry in &window {
            let Some(user_id) = entry.actor.user_id else {
                continue;
            };
            // The window is newest first, so the first snapshot seen is the latest.
            actors
                .entry(user_id)
                .or_insert_with(|| ActorActivity {
                    user_id,
                    email: entry.actor.email.clone(),
                    name: entry.actor.name.clone(),
                    count: 0,
                })
                .count += 1;
        }
        let mut top_actors = actors.into_values().collect::<Vec<_>>();
        top_actors.sort_by(|left, right| {
            right
                .count
                .cmp(&left.count)
                .then_with(|| left.user_id.cmp(&right.user_id))
        });
        top_actors.truncate(top_n);

        let recent_failures = window
            .iter()
            .filter(|entry| !entry.success)
            .take(top_n)
            .map(|entry| (*entry).clone())
            .collect();

        Ok(AuditStatistics {
            total: window.len() as u64,
            successful: window.iter().filter(|entry| entry.success).count() as u64,
            top_actions,
            by_resource_type,
            top_actors,
            failed_logins_by_ip: failed_logins_in(&window, top_n),
            recent_failures,
        })
    }

    async fn security_alerts(
        &self,
        since: DateTime<Utc>,
        limit: usize,
    ) -> AppResult<SecurityAlerts> {
        let entries = self.audit_entries.read().await;
        let mut window = entries
            .iter()
            .filter(|entry| entry.created_at >= since)
            .collect::<Vec<_>>();
        window.sort_by(|left, right| newest_first(left, right));

        let mut denials: HashMap<(Option<UserId>, String), AccessDeniedSummary> = HashMap::new();
        for entry in window
            .iter()
            .filter(|entry| entry.action == AuditAction::SystemAccessDenied)
        {
            let summary = denials
                .entry((entry.actor.user_id, entry.endpoint.clone()))
                .or_insert_with(|| AccessDeniedSummary {
                    user_id: entry.actor.user_id,
                    email: entry.actor.email.clone(),
                    endpoint: entry.endpoint.clone(),
                    attempts: 0,
                    last_attempt: entry.created_at,
                });
            summary.attempts += 1;
        }
        let mut access_denied = denials.into_values().collect::<Vec<_>>();
        access_denied.sort_by(|left, right| {
            right
                .attempts
                .cmp(&left.attempts)
                .then_with(|| right.last_attempt.cmp(&left.last_attempt))
        });
        access_denied.truncate(limit);

        let system_errors = window
            .iter()
            .filter(|entry| entry.status_code >= 500)
            .take(limit)
            .map(|entry| (*entry).clone())
            .collect();

        Ok(SecurityAlerts {
            since,
            failed_logins: failed_logins_in(&window, limit),
            access_denied,
            system_errors,
        })
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        protected_actions: &[AuditAction],
    ) -> AppResult<u64> {
        let mut entries = self.audit_entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.created_at >= cutoff || protected_actions.contains(&entry.action)
        });
        Ok((before - entries.len()) as u64)
    }
}

fn matches_transaction_query(
    entry: &TransactionAuditLogEntry,
    query: &TransactionAuditQuery,
) -> bool {
    query
        .transaction_id
        .as_deref()
        .is_none_or(|transaction_id| entry.transaction_id == transaction_id)
        && query
            .transaction_type
            .is_none_or(|transaction_type| entry.transaction_type == transaction_type)
        && query.action.is_none_or(|action| entry.action == action)
        && query
            .actor_id
            .is_none_or(|actor_id| entry.actor.user_id == Some(actor_id))
        && query.range.contains(entry.created_at)
}

#[async_trait]
impl TransactionAuditRepository for InMemoryAuditRepository {
    async fn append_entry(
        &self,
        entry: NewTransactionAuditEntry,
    ) -> AppResult<TransactionAuditLogEntry> {
        let mut entries = self.transaction_entries.write().await;
        if let Some(key) = entry.idempotency_key.as_deref()
            && entries.iter().any(|existing| {
                existing.idempotency_key.as_deref() == Some(key) && existing.action == entry.action
            })
        {
            return Err(AppError::Conflict(format!(
                "transaction audit entry for key '{key}' and action '{}' already exists",
                entry.action
            )));
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
            .transaction_entries
            .read()
            .await
            .iter()
            .find(|entry| {
                entry.idempotency_key.as_deref() == Some(idempotency_key) && entry.action == action
            })
            .cloned())
    }

    async fn list_entries(&self, query: &TransactionAuditQuery) -> AppResult<TransactionAuditPage> {
        let entries = self.transaction_entries.read().await;
        let mut matching = entries
            .iter()
            .filter(|entry| matches_transaction_query(entry, query))
            .cloned()
            .collect::<Vec<_>>();
        matching.sort_by(|left, right| {
            right
                .created_at
                .cmp(&left.created_at)
                .then_with(|| right.entry_id.cmp(&left.entry_id))
        });

        let total = matching.len() as u64;
        let (start, end) = page_bounds(query.offset(), query.limit, matching.len());

        Ok(TransactionAuditPage {
            entries: matching.drain(start..end).collect(),
            total,
            page: query.page,
            limit: query.limit,
        })
    }

    async fn history_for_transaction(
        &self,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionAuditLogEntry>> {
        let mut history = self
            .transaction_entries
            .read()
            .await
            .iter()
            .filter(|entry| entry.transaction_id == transaction_id)
            .cloned()
            .collect::<Vec<_>>();
        history.sort_by(|left, right| {
            left.created_at
                .cmp(&right.created_at)
                .then_with(|| left.entry_id.cmp(&right.entry_id))
        });
        Ok(history)
    }

    async fn purge_entries_older_than(
        &self,
        cutoff: DateTime<Utc>,
        eligible_actions: &[TransactionAuditAction],
    ) -> AppResult<u64> {
        let mut entries = self.transaction_entries.write().await;
        let before = entries.len();
        entries.retain(|entry| {
            entry.created_at >= cutoff || !eligible_actions.contains(&entry.action)
        });
        Ok((before - entries.len()) as u64)
    }
}
