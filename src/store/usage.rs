// JURADOC Usage Tracking - per-user monthly quotas over the KV store
// Quota checks fail OPEN; usage increments are best-effort telemetry

use chrono::Utc;
use std::sync::Arc;
use tracing::{error, warn};
use uuid::Uuid;

use super::kv::{usage_key, KvStore};
use crate::models::UserUsage;

/// Quota kinds, matching the fields of the usage hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsageKind {
    Tokens,
    Queries,
    Documents,
}

impl UsageKind {
    pub fn field(&self) -> &'static str {
        match self {
            UsageKind::Tokens => "tokens_used",
            UsageKind::Queries => "queries_count",
            UsageKind::Documents => "documents_indexed",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UsageKind::Tokens => "tokens",
            UsageKind::Queries => "queries",
            UsageKind::Documents => "documents",
        }
    }
}

/// Per-kind monthly quotas.
#[derive(Debug, Clone)]
pub struct QuotaConfig {
    pub tokens_per_month: i64,
    pub queries_per_month: i64,
    pub documents_per_month: i64,
}

impl QuotaConfig {
    fn limit(&self, kind: UsageKind) -> i64 {
        match kind {
            UsageKind::Tokens => self.tokens_per_month,
            UsageKind::Queries => self.queries_per_month,
            UsageKind::Documents => self.documents_per_month,
        }
    }
}

/// Raised by `enforce_quota` when a bucket would exceed its limit.
#[derive(Debug, thiserror::Error)]
#[error("quota exceeded for {kind}")]
pub struct QuotaExceeded {
    pub kind: &'static str,
}

/// Tracks and enforces user quotas. Month rollover is implicit: a fresh
/// bucket appears on the first write of a new month.
pub struct UsageTracker {
    kv: Arc<dyn KvStore>,
    quotas: QuotaConfig,
}

impl UsageTracker {
    pub fn new(kv: Arc<dyn KvStore>, quotas: QuotaConfig) -> Self {
        Self { kv, quotas }
    }

    fn current_month() -> String {
        Utc::now().format("%Y-%m").to_string()
    }

    /// True iff counter + amount stays within the quota. Store errors fail
    /// open: a telemetry outage must not block requests.
    pub async fn check_quota(&self, user_id: Uuid, kind: UsageKind, amount: i64) -> bool {
        let key = usage_key(&user_id, &Self::current_month());

        match self.kv.hgetall(&key).await {
            Ok(fields) => {
                let used = fields.get(kind.field()).copied().unwrap_or(0);
                used + amount <= self.quotas.limit(kind)
            }
            Err(e) => {
                error!(user_id = %user_id, "Quota check failed, allowing request: {e}");
                true
            }
        }
    }

    /// Raises `QuotaExceeded` when the check fails.
    pub async fn enforce_quota(
        &self,
        user_id: Uuid,
        kind: UsageKind,
        amount: i64,
    ) -> Result<(), QuotaExceeded> {
        if self.check_quota(user_id, kind, amount).await {
            Ok(())
        } else {
            Err(QuotaExceeded { kind: kind.label() })
        }
    }

    /// Additive, non-blocking usage increment. Errors are swallowed: the
    /// request must not fail because counters could not be written.
    pub async fn increment_usage(&self, user_id: Uuid, tokens: i64, queries: i64, documents: i64) {
        let key = usage_key(&user_id, &Self::current_month());

        for (kind, amount) in [
            (UsageKind::Tokens, tokens),
            (UsageKind::Queries, queries),
            (UsageKind::Documents, documents),
        ] {
            if amount == 0 {
                continue;
            }
            if let Err(e) = self.kv.hincrby(&key, kind.field(), amount).await {
                warn!(user_id = %user_id, field = kind.field(), "Usage increment failed: {e}");
            }
        }
    }

    /// Current month bucket; zeroed bucket when the user has no usage yet.
    pub async fn get_usage(&self, user_id: Uuid) -> UserUsage {
        let month = Self::current_month();
        let key = usage_key(&user_id, &month);

        let fields = match self.kv.hgetall(&key).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(user_id = %user_id, "Usage fetch failed: {e}");
                Default::default()
            }
        };

        UserUsage {
            user_id,
            month,
            tokens_used: fields.get("tokens_used").copied().unwrap_or(0),
            queries_count: fields.get("queries_count").copied().unwrap_or(0),
            documents_indexed: fields.get("documents_indexed").copied().unwrap_or(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryKv, StoreError, StoreResult};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::time::Duration;

    fn quotas() -> QuotaConfig {
        QuotaConfig {
            tokens_per_month: 100,
            queries_per_month: 2,
            documents_per_month: 1,
        }
    }

    #[tokio::test]
    async fn test_quota_enforced() {
        let kv = Arc::new(MemoryKv::new());
        let tracker = UsageTracker::new(kv, quotas());
        let user = Uuid::new_v4();

        assert!(tracker.enforce_quota(user, UsageKind::Documents, 1).await.is_ok());
        tracker.increment_usage(user, 0, 0, 1).await;

        let err = tracker
            .enforce_quota(user, UsageKind::Documents, 1)
            .await
            .unwrap_err();
        assert_eq!(err.kind, "documents");
    }

    #[tokio::test]
    async fn test_usage_readback() {
        let kv = Arc::new(MemoryKv::new());
        let tracker = UsageTracker::new(kv, quotas());
        let user = Uuid::new_v4();

        tracker.increment_usage(user, 42, 1, 0).await;
        tracker.increment_usage(user, 8, 1, 0).await;

        let usage = tracker.get_usage(user).await;
        assert_eq!(usage.tokens_used, 50);
        assert_eq!(usage.queries_count, 2);
        assert_eq!(usage.documents_indexed, 0);
    }

    /// KV stub where every operation fails, to exercise fail-open paths.
    struct BrokenKv;

    #[async_trait]
    impl KvStore for BrokenKv {
        async fn set_ex(&self, _: &str, _: String, _: Duration) -> StoreResult<()> {
            Err(StoreError::Kv("down".into()))
        }
        async fn get(&self, _: &str) -> StoreResult<Option<String>> {
            Err(StoreError::Kv("down".into()))
        }
        async fn delete(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Kv("down".into()))
        }
        async fn hincrby(&self, _: &str, _: &str, _: i64) -> StoreResult<i64> {
            Err(StoreError::Kv("down".into()))
        }
        async fn hgetall(&self, _: &str) -> StoreResult<HashMap<String, i64>> {
            Err(StoreError::Kv("down".into()))
        }
        async fn exists(&self, _: &str) -> StoreResult<bool> {
            Err(StoreError::Kv("down".into()))
        }
        async fn ttl(&self, _: &str) -> StoreResult<Option<Duration>> {
            Err(StoreError::Kv("down".into()))
        }
        async fn scan_prefix(&self, _: &str) -> StoreResult<Vec<String>> {
            Err(StoreError::Kv("down".into()))
        }
    }

    #[tokio::test]
    async fn test_quota_fails_open_on_store_error() {
        let tracker = UsageTracker::new(Arc::new(BrokenKv), quotas());
        let user = Uuid::new_v4();

        // A broken telemetry store must never block the request
        assert!(tracker.check_quota(user, UsageKind::Queries, 1).await);
        assert!(tracker.enforce_quota(user, UsageKind::Queries, 1).await.is_ok());

        // Increments are swallowed
        tracker.increment_usage(user, 1, 1, 1).await;
    }
}
