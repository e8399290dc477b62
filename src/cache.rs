//! Process-lifetime cache of registration expiry timestamps.
//!
//! Keys are registrable domains (eTLD+1). Entries are never invalidated
//! during a run. Reads and writes go through one mutex; the lock is never
//! held across an await point, so concurrent misses for the same key each
//! perform their own lookup and both writes store the same value.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Shared registration-expiry cache.
pub trait ExpiryCache: Send + Sync {
    fn get(&self, registrable: &str) -> Option<DateTime<Utc>>;
    fn put(&self, registrable: &str, expiry: DateTime<Utc>);
}

/// Mutex-guarded in-memory implementation.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // A panic while holding the lock cannot leave a half-written entry.
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ExpiryCache for MemoryCache {
    fn get(&self, registrable: &str) -> Option<DateTime<Utc>> {
        self.lock().get(registrable).copied()
    }

    fn put(&self, registrable: &str, expiry: DateTime<Utc>) {
        self.lock().insert(registrable.to_string(), expiry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    #[test]
    fn get_after_put() {
        let cache = MemoryCache::new();
        assert!(cache.is_empty());
        assert!(cache.get("example.com").is_none());

        let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap();
        cache.put("example.com", expiry);
        assert_eq!(cache.get("example.com"), Some(expiry));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn repeated_put_converges() {
        let cache = MemoryCache::new();
        let expiry = Utc.with_ymd_and_hms(2030, 1, 2, 0, 0, 0).unwrap();
        cache.put("example.com", expiry);
        cache.put("example.com", expiry);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("example.com"), Some(expiry));
    }

    #[test]
    fn shared_across_threads() {
        let cache = Arc::new(MemoryCache::new());
        let expiry = Utc.with_ymd_and_hms(2031, 6, 1, 12, 0, 0).unwrap();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || cache.put(&format!("site{i}.com"), expiry))
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len(), 8);
    }
}
