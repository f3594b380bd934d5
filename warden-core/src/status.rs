//! Decisions and read-only projections returned by the protection service.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Outcome of evaluating one login attempt.
///
/// `lockout_until` serialises as epoch milliseconds. It is set when an
/// identifier is locked out, and also when the client address is blocked, in
/// which case it carries the end of the block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginDecision {
    pub allowed: bool,
    pub remaining_attempts: u32,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub lockout_until: Option<DateTime<Utc>>,
    pub requires_captcha: bool,
    pub is_blocked: bool,
    pub message: String,
}

impl LoginDecision {
    pub(crate) fn success(max_attempts: u32) -> Self {
        Self {
            allowed: true,
            remaining_attempts: max_attempts,
            lockout_until: None,
            requires_captcha: false,
            is_blocked: false,
            message: "Login successful".to_string(),
        }
    }

    pub(crate) fn failure(remaining_attempts: u32, requires_captcha: bool) -> Self {
        let mut message = format!(
            "Invalid credentials. {remaining_attempts} {} remaining before the account is locked.",
            if remaining_attempts == 1 {
                "attempt"
            } else {
                "attempts"
            }
        );
        if requires_captcha {
            message.push_str(" Please complete the CAPTCHA to continue.");
        }

        Self {
            allowed: true,
            remaining_attempts,
            lockout_until: None,
            requires_captcha,
            is_blocked: false,
            message,
        }
    }

    pub(crate) fn locked(until: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining_attempts: 0,
            lockout_until: Some(until),
            requires_captcha: false,
            is_blocked: false,
            message: format!(
                "Account temporarily locked due to too many failed attempts. Try again in {}.",
                humanize_minutes(until, now)
            ),
        }
    }

    pub(crate) fn blocked(until: DateTime<Utc>) -> Self {
        Self {
            allowed: false,
            remaining_attempts: 0,
            lockout_until: Some(until),
            requires_captcha: false,
            is_blocked: true,
            message: "Too many failed attempts from this address. Access is temporarily blocked."
                .to_string(),
        }
    }

    pub(crate) fn unprotected(max_attempts: u32, message: &str) -> Self {
        Self {
            allowed: true,
            remaining_attempts: max_attempts,
            lockout_until: None,
            requires_captcha: false,
            is_blocked: false,
            message: message.to_string(),
        }
    }

    pub(crate) fn unavailable() -> Self {
        Self {
            allowed: false,
            remaining_attempts: 0,
            lockout_until: None,
            requires_captcha: false,
            is_blocked: false,
            message: "Login is temporarily unavailable. Please try again later.".to_string(),
        }
    }

    /// Seconds until the lockout or block ends, for a `Retry-After` header.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        self.lockout_until.map(|until| {
            let remaining = until - Utc::now();
            remaining.num_seconds().max(0) as u64
        })
    }
}

fn humanize_minutes(until: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (until - now).num_seconds().max(0);
    let minutes = ((seconds + 59) / 60).max(1);
    if minutes == 1 {
        "1 minute".to_string()
    } else {
        format!("{minutes} minutes")
    }
}

/// Result of [`is_address_blocked`](crate::BruteForceProtectionService::is_address_blocked).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressBlockStatus {
    pub blocked: bool,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub until: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub reason: Option<String>,
}

impl AddressBlockStatus {
    pub fn unblocked() -> Self {
        Self {
            blocked: false,
            until: None,
            reason: None,
        }
    }
}

/// Admin view of one identifier. Timestamps serialise as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierStatus {
    pub identifier: String,
    pub failed_attempts: u32,
    pub remaining_attempts: u32,
    pub requires_captcha: bool,
    pub is_locked: bool,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub locked_until: Option<DateTime<Utc>>,
    /// Lockouts triggered within the rolling 24 hour history
    pub recent_lockouts: u32,
}

/// Admin view of one client address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressStatus {
    pub address: String,
    pub failed_attempts: u32,
    /// Failures left before the address is blocked
    pub remaining_attempts: u32,
    pub is_blocked: bool,
    #[serde(
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub blocked_until: Option<DateTime<Utc>>,
    pub block_reason: Option<String>,
}

/// Counts of live records across the attempt store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityMetrics {
    pub blocked_addresses: usize,
    pub locked_identifiers: usize,
    pub identifiers_with_failures: usize,
    pub addresses_with_failures: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub generated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_failure_message_mentions_remaining_attempts() {
        let decision = LoginDecision::failure(4, false);
        assert!(decision.allowed);
        assert_eq!(decision.remaining_attempts, 4);
        assert!(decision.message.contains("4 attempts remaining"));
        assert!(!decision.message.contains("CAPTCHA"));

        let decision = LoginDecision::failure(1, true);
        assert!(decision.message.contains("1 attempt remaining"));
        assert!(decision.message.contains("CAPTCHA"));
    }

    #[test]
    fn test_locked_message() {
        let now = Utc::now();
        let decision = LoginDecision::locked(now + Duration::minutes(15), now);
        assert!(!decision.allowed);
        assert!(!decision.is_blocked);
        assert!(decision.message.contains("15 minutes"));

        let decision = LoginDecision::locked(now + Duration::seconds(20), now);
        assert!(decision.message.contains("1 minute."));
    }

    #[test]
    fn test_retry_after_seconds() {
        let decision = LoginDecision::blocked(Utc::now() + Duration::minutes(15));
        let retry_after = decision.retry_after_seconds().unwrap();
        assert!(retry_after > 890 && retry_after <= 900);

        assert_eq!(LoginDecision::success(5).retry_after_seconds(), None);
    }

    #[test]
    fn test_decision_serialization() {
        let until = DateTime::from_timestamp_millis(1_700_000_900_000).unwrap();
        let decision = LoginDecision::blocked(until);
        let value = serde_json::to_value(&decision).unwrap();
        assert_eq!(value["allowed"], false);
        assert_eq!(value["is_blocked"], true);
        assert_eq!(value["lockout_until"], 1_700_000_900_000_i64);

        let value = serde_json::to_value(LoginDecision::success(5)).unwrap();
        assert!(value.get("lockout_until").is_none());
        assert_eq!(value["remaining_attempts"], 5);
    }

    #[test]
    fn test_status_timestamps_are_epoch_millis() {
        let until = DateTime::from_timestamp_millis(1_700_000_900_000).unwrap();
        let status = IdentifierStatus {
            identifier: "a@b.com".into(),
            failed_attempts: 5,
            remaining_attempts: 0,
            requires_captcha: true,
            is_locked: true,
            locked_until: Some(until),
            recent_lockouts: 1,
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["locked_until"], 1_700_000_900_000_i64);

        let status = AddressStatus {
            address: "203.0.113.7".into(),
            failed_attempts: 0,
            remaining_attempts: 20,
            is_blocked: true,
            blocked_until: Some(until),
            block_reason: Some("manual".into()),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["blocked_until"], 1_700_000_900_000_i64);

        let status = AddressStatus {
            is_blocked: false,
            blocked_until: None,
            block_reason: None,
            ..status
        };
        let value = serde_json::to_value(&status).unwrap();
        assert!(value.get("blocked_until").is_none());
    }
}
