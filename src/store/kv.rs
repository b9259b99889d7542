// JURADOC KV Store - TTL'd values, numeric hash counters, prefix scan
// Three namespaces: pii:<request_id>, cache:<key>, usage:<user_id>:<month>

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use super::{StoreError, StoreResult};

/// Minimal key-value contract the pipeline consumes. A server-backed store
/// (Redis or compatible) implements the same operations out of tree;
/// `MemoryKv` is the in-process implementation used for development and tests.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// SET k v EX ttl
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// GET k
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// DEL k; returns whether the key existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// HINCRBY k field delta; creates the hash on first write
    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64>;

    /// All numeric fields of a hash (empty map when absent)
    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, i64>>;

    /// EXISTS k
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Remaining TTL, None for keys without expiry or missing keys
    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>>;

    /// Keys starting with the given prefix
    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>>;
}

/// Key for a per-request PII mapping
pub fn pii_key(request_id: &str) -> String {
    format!("pii:{request_id}")
}

/// Key for a cached JSON payload
pub fn cache_key(key: &str) -> String {
    format!("cache:{key}")
}

/// Key for a user's monthly usage hash
pub fn usage_key(user_id: &uuid::Uuid, month: &str) -> String {
    format!("usage:{user_id}:{month}")
}

// === In-memory implementation ===

enum Value {
    Text(String),
    Hash(HashMap<String, i64>),
}

struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

/// In-process KV store with lazy expiry, backed by a concurrent map.
#[derive(Default)]
pub struct MemoryKv {
    entries: DashMap<String, Entry>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the entry when expired; returns whether a live entry remains.
    fn purge_if_expired(&self, key: &str) -> bool {
        if let Some(entry) = self.entries.get(key) {
            if entry.expired() {
                drop(entry);
                self.entries.remove(key);
                return false;
            }
            return true;
        }
        false
    }
}

#[async_trait]
impl KvStore for MemoryKv {
    async fn set_ex(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        self.entries.insert(
            key.to_string(),
            Entry {
                value: Value::Text(value),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        if !self.purge_if_expired(key) {
            return Ok(None);
        }
        match self.entries.get(key).map(|e| match &e.value {
            Value::Text(s) => Ok(s.clone()),
            Value::Hash(_) => Err(StoreError::WrongType(key.to_string())),
        }) {
            Some(res) => res.map(Some),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let live = self.purge_if_expired(key);
        Ok(self.entries.remove(key).is_some() && live)
    }

    async fn hincrby(&self, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
        self.purge_if_expired(key);
        let mut entry = self.entries.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at: None,
        });
        match &mut entry.value {
            Value::Hash(h) => {
                let counter = h.entry(field.to_string()).or_insert(0);
                *counter += delta;
                Ok(*counter)
            }
            Value::Text(_) => Err(StoreError::WrongType(key.to_string())),
        }
    }

    async fn hgetall(&self, key: &str) -> StoreResult<HashMap<String, i64>> {
        if !self.purge_if_expired(key) {
            return Ok(HashMap::new());
        }
        match self.entries.get(key) {
            Some(entry) => match &entry.value {
                Value::Hash(h) => Ok(h.clone()),
                Value::Text(_) => Err(StoreError::WrongType(key.to_string())),
            },
            None => Ok(HashMap::new()),
        }
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        Ok(self.purge_if_expired(key))
    }

    async fn ttl(&self, key: &str) -> StoreResult<Option<Duration>> {
        if !self.purge_if_expired(key) {
            return Ok(None);
        }
        Ok(self
            .entries
            .get(key)
            .and_then(|e| e.expires_at)
            .map(|t| t.saturating_duration_since(Instant::now())))
    }

    async fn scan_prefix(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.value().expired() && e.key().starts_with(prefix))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let kv = MemoryKv::new();
        kv.set_ex("k1", "v1".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(kv.get("k1").await.unwrap(), Some("v1".to_string()));
        assert!(kv.exists("k1").await.unwrap());

        assert!(kv.delete("k1").await.unwrap());
        assert_eq!(kv.get("k1").await.unwrap(), None);
        assert!(!kv.delete("k1").await.unwrap());
    }

    #[tokio::test]
    async fn test_expiry() {
        let kv = MemoryKv::new();
        kv.set_ex("short", "gone soon".to_string(), Duration::from_millis(20))
            .await
            .unwrap();

        assert!(kv.exists("short").await.unwrap());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(!kv.exists("short").await.unwrap());
        assert_eq!(kv.get("short").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hincrby() {
        let kv = MemoryKv::new();
        assert_eq!(kv.hincrby("usage:u:2026-08", "tokens_used", 10).await.unwrap(), 10);
        assert_eq!(kv.hincrby("usage:u:2026-08", "tokens_used", 5).await.unwrap(), 15);
        assert_eq!(kv.hincrby("usage:u:2026-08", "queries_count", 1).await.unwrap(), 1);

        let all = kv.hgetall("usage:u:2026-08").await.unwrap();
        assert_eq!(all.get("tokens_used"), Some(&15));
        assert_eq!(all.get("queries_count"), Some(&1));
    }

    #[tokio::test]
    async fn test_scan_prefix() {
        let kv = MemoryKv::new();
        kv.set_ex("pii:r1", "{}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        kv.set_ex("pii:r2", "{}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        kv.set_ex("cache:x", "{}".to_string(), Duration::from_secs(60))
            .await
            .unwrap();

        let keys = kv.scan_prefix("pii:").await.unwrap();
        assert_eq!(keys, vec!["pii:r1".to_string(), "pii:r2".to_string()]);
    }

    #[tokio::test]
    async fn test_wrong_type() {
        let kv = MemoryKv::new();
        kv.set_ex("text", "v".to_string(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(kv.hincrby("text", "f", 1).await.is_err());
    }
}
