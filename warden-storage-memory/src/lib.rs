//! In-memory attempt store for warden
//!
//! [`MemoryAttemptStore`] keeps every key in a [`DashMap`] with an optional
//! deadline. Expired entries are dropped lazily when they are read, and can also
//! be swept periodically with [`MemoryAttemptStore::start_cleanup_task`].
//!
//! State lives in the process, so the store only suits single-instance
//! deployments and tests. Use the Redis store when several servers must share
//! one policy.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_storage_memory::MemoryAttemptStore;
//!
//! let store = Arc::new(MemoryAttemptStore::new());
//! let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//! let cleanup = store.start_cleanup_task(std::time::Duration::from_secs(60), shutdown_rx);
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use regex::Regex;
use tokio::{sync::watch, task::JoinHandle};
use warden_core::{AttemptStore, Error, error::StorageError};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

impl StoredValue {
    fn persistent(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            expires_at: None,
        }
    }

    fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

/// Attempt store backed by a concurrent hash map.
///
/// Cloning the store is cheap and every clone shares the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptStore {
    entries: Arc<DashMap<String, StoredValue>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.entries
            .iter()
            .filter(|entry| !entry.is_expired_at(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every expired entry, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.entries)
    }

    /// Start the background sweep task.
    ///
    /// The task removes expired entries every `interval` until `shutdown`
    /// changes or its sender is dropped. Lazy expiry keeps reads correct
    /// without it; the sweep only bounds memory held by keys nobody reads again.
    pub fn start_cleanup_task(
        &self,
        interval: std::time::Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let entries = Arc::clone(&self.entries);

        tokio::spawn(async move {
            let mut interval_timer = tokio::time::interval(interval);

            loop {
                tokio::select! {
                    _ = interval_timer.tick() => {
                        let count = purge(&entries);
                        if count > 0 {
                            tracing::debug!(count = count, "Removed expired attempt store entries");
                        }
                    }
                    _ = shutdown.changed() => {
                        tracing::info!("Shutting down memory attempt store cleanup task");
                        break;
                    }
                }
            }
        })
    }
}

fn purge(entries: &DashMap<String, StoredValue>) -> usize {
    let now = Utc::now();
    let before = entries.len();
    entries.retain(|_, entry| !entry.is_expired_at(now));
    before.saturating_sub(entries.len())
}

/// Deadline `seconds` after `now`. `None` when it cannot be represented,
/// which leaves the key without an expiry.
fn deadline(now: DateTime<Utc>, seconds: u64) -> Option<DateTime<Utc>> {
    i64::try_from(seconds)
        .ok()
        .and_then(Duration::try_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
}

/// Translate a glob pattern (`*` and `?`) into an anchored regex.
fn glob_to_regex(pattern: &str) -> Result<Regex, Error> {
    let mut expr = String::with_capacity(pattern.len() + 8);
    expr.push('^');
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr)
        .map_err(|e| StorageError::Command(format!("invalid key pattern {pattern:?}: {e}")).into())
}

#[async_trait]
impl AttemptStore for MemoryAttemptStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        let now = Utc::now();
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired_at(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        }
        Ok(None)
    }

    async fn incr(&self, key: &str) -> Result<i64, Error> {
        let now = Utc::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| StoredValue::persistent("0"));

        if entry.is_expired_at(now) {
            *entry = StoredValue::persistent("0");
        }

        let current: i64 = entry.value.parse().map_err(|_| {
            StorageError::Command(format!("value at {key} is not an integer"))
        })?;
        let next = current
            .checked_add(1)
            .ok_or_else(|| StorageError::Command(format!("increment of {key} would overflow")))?;
        entry.value = next.to_string();

        Ok(next)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<(), Error> {
        if seconds == 0 {
            self.entries.remove(key);
            return Ok(());
        }

        let now = Utc::now();
        let mut expired = false;
        if let Some(mut entry) = self.entries.get_mut(key) {
            if entry.is_expired_at(now) {
                expired = true;
            } else {
                entry.expires_at = deadline(now, seconds);
            }
        }

        if expired {
            self.entries.remove_if(key, |_, entry| entry.is_expired_at(now));
        }
        Ok(())
    }

    async fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<(), Error> {
        if seconds == 0 {
            return Err(StorageError::Command(format!("invalid expire time in setex for {key}")).into());
        }

        let now = Utc::now();
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                expires_at: deadline(now, seconds),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), Error> {
        self.entries.remove(key);
        Ok(())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error> {
        let matcher = glob_to_regex(pattern)?;
        let now = Utc::now();

        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|entry| !entry.is_expired_at(now) && matcher.is_match(entry.key()))
            .map(|entry| entry.key().clone())
            .collect();
        keys.sort();

        Ok(keys)
    }
}
