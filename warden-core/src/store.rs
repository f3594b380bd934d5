//! The attempt store seam.
//!
//! All state of the login protection policy lives in an external key-value store
//! reached through [`AttemptStore`]. The policy itself keeps nothing in process,
//! so several server instances sharing one store enforce one policy.

use async_trait::async_trait;
use chrono::Duration;

use crate::Error;

/// Key-value operations the policy needs from its store.
///
/// Values are strings. Counters hold their decimal form. Each operation must be
/// atomic for its own key; no operation spans several keys.
///
/// # Contract
///
/// - `incr` creates a missing key with value `1` and keeps any existing expiry.
/// - `expire` on a missing key is a no-op; an expiry of `0` removes the key.
/// - `del` on a missing key is a no-op.
/// - `keys` takes a glob pattern where `*` matches any run of characters and
///   `?` matches one character.
#[async_trait]
pub trait AttemptStore: Send + Sync + 'static {
    /// Read a value.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Atomically increment a counter, returning the new value.
    async fn incr(&self, key: &str) -> Result<i64, Error>;

    /// Set the time to live of an existing key.
    async fn expire(&self, key: &str, seconds: u64) -> Result<(), Error>;

    /// Write a value with a time to live.
    async fn setex(&self, key: &str, seconds: u64, value: &str) -> Result<(), Error>;

    /// Remove a key.
    async fn del(&self, key: &str) -> Result<(), Error>;

    /// List keys matching a glob pattern.
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, Error>;

    /// Store health check
    async fn health_check(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// Convert a duration into a store expiry in whole seconds, rounding up.
///
/// Never returns less than one second, so a positive duration never
/// becomes an immediate expiry.
pub fn ttl_seconds(duration: Duration) -> u64 {
    let millis = duration.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_seconds_rounds_up() {
        assert_eq!(ttl_seconds(Duration::milliseconds(900_000)), 900);
        assert_eq!(ttl_seconds(Duration::milliseconds(1_500)), 2);
        assert_eq!(ttl_seconds(Duration::milliseconds(1)), 1);
    }

    #[test]
    fn test_ttl_seconds_minimum() {
        assert_eq!(ttl_seconds(Duration::zero()), 1);
        assert_eq!(ttl_seconds(Duration::seconds(-3)), 1);
    }
}
