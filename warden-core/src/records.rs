//! Typed records kept in the attempt store.
//!
//! Counters are plain decimal strings handled by the store's `INCR`. The two
//! time-bounded records get explicit encode/decode functions so that a corrupt
//! value is detected instead of silently misread.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, error::StorageError};

/// Reason written when an address crosses the failure threshold.
pub const EXCESSIVE_FAILURES_REASON: &str = "excessive failed attempts";

/// A temporary block on a client address.
///
/// Stored as JSON `{"until": <epoch ms>, "reason": "..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub until: DateTime<Utc>,
    pub reason: String,
}

impl BlockRecord {
    pub fn new(until: DateTime<Utc>, reason: impl Into<String>) -> Self {
        Self {
            until,
            reason: reason.into(),
        }
    }

    /// Whether the block still applies at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }

    pub fn encode(&self) -> Result<String, Error> {
        serde_json::to_string(self)
            .map_err(|e| Error::Storage(StorageError::Serialization(e.to_string())))
    }

    pub fn decode(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| {
            Error::Storage(StorageError::Serialization(format!(
                "invalid block record: {e}"
            )))
        })
    }
}

/// A temporary lockout of an identifier.
///
/// Stored as the lockout expiry in epoch milliseconds, as a decimal string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutRecord {
    pub until: DateTime<Utc>,
}

impl LockoutRecord {
    pub fn new(until: DateTime<Utc>) -> Self {
        Self { until }
    }

    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.until
    }

    pub fn encode(&self) -> String {
        self.until.timestamp_millis().to_string()
    }

    pub fn decode(raw: &str) -> Result<Self, Error> {
        let millis: i64 = raw.trim().parse().map_err(|_| {
            Error::Storage(StorageError::Serialization(format!(
                "invalid lockout record: {raw}"
            )))
        })?;

        DateTime::from_timestamp_millis(millis)
            .map(Self::new)
            .ok_or_else(|| {
                Error::Storage(StorageError::Serialization(format!(
                    "lockout timestamp out of range: {millis}"
                )))
            })
    }
}
