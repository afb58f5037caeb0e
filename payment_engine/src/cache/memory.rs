use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use async_trait::async_trait;
use log::trace;
use serde_json::Value;

use super::{CacheError, PaymentCache};

/// Expired entries are swept out of the map on write, at most this often.
const PURGE_INTERVAL: Duration = Duration::from_secs(1);

struct Entry {
    value: Value,
    expires_at: Instant,
}

#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    /// No entry expires before this. `None` when the map is empty.
    next_expiry: Option<Instant>,
    last_purge: Option<Instant>,
}

impl Entries {
    fn purge_due(&self, now: Instant) -> bool {
        let expired = self.next_expiry.is_some_and(|t| t <= now);
        expired && self.last_purge.map_or(true, |t| now.duration_since(t) >= PURGE_INTERVAL)
    }

    fn purge(&mut self, now: Instant) {
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        self.next_expiry = self.map.values().map(|e| e.expires_at).min();
        self.last_purge = Some(now);
        trace!("🗃️ Purged {} expired cache entries", before - self.map.len());
    }
}

/// An in-process [`PaymentCache`].
///
/// A stale entry is dropped when it is read, and writes sweep out everything that has expired, so keys that are never
/// read again do not pile up.
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PaymentCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Ok(Some(entry.value.clone())),
            Some(_) => {
                trace!("🗃️ Cache entry {key} has expired");
                entries.map.remove(key);
                Ok(None)
            },
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let expires_at = now + ttl;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.purge_due(now) {
            entries.purge(now);
        }
        entries.next_expiry = Some(entries.next_expiry.map_or(expires_at, |t| t.min(expires_at)));
        entries.map.insert(key.to_string(), Entry { value, expires_at });
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).map.remove(key);
        Ok(())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<usize, CacheError> {
        let prefix = pattern.strip_suffix('*').ok_or_else(|| CacheError::InvalidPattern(pattern.to_string()))?;
        if prefix.contains('*') {
            return Err(CacheError::InvalidPattern(pattern.to_string()));
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.map.len();
        entries.map.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.map.len())
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::cache::{payment_key, user_payments_key, user_payments_pattern};

    #[tokio::test]
    async fn set_get_delete() {
        let cache = MemoryCache::new();
        cache.set(&payment_key("p1"), json!({"id": "p1"}), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.get("payment:p1").await.unwrap(), Some(json!({"id": "p1"})));
        cache.delete("payment:p1").await.unwrap();
        assert_eq!(cache.get("payment:p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn entries_expire_on_read() {
        let cache = MemoryCache::new();
        cache.set("k", json!(1), Duration::from_millis(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.get("k").await.unwrap(), None);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn writes_reclaim_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..1000 {
            cache.set(&payment_key(&format!("p{i}")), json!(i), Duration::from_millis(1)).await.unwrap();
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.set(&payment_key("fresh"), json!("fresh"), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("payment:fresh").await.unwrap(), Some(json!("fresh")));

        // Sweeps are rate limited, but nothing live is ever dropped
        cache.set(&payment_key("short"), json!(1), Duration::from_millis(1)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.set(&payment_key("another"), json!(2), Duration::from_secs(60)).await.unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("payment:short").await.unwrap(), None);
        assert_eq!(cache.len(), 2);
    }

    #[tokio::test]
    async fn prefix_patterns() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.set(&user_payments_key("alice", 1, 10), json!([]), ttl).await.unwrap();
        cache.set(&user_payments_key("alice", 2, 10), json!([]), ttl).await.unwrap();
        cache.set(&user_payments_key("alicia", 1, 10), json!([]), ttl).await.unwrap();
        let removed = cache.delete_pattern(&user_payments_pattern("alice")).await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.len(), 1);
        assert!(cache.delete_pattern("user_payments:alice").await.is_err());
        assert!(cache.delete_pattern("user_*:alice:*").await.is_err());
    }
}
