//! Brute force protection configuration.
//!
//! All tunables of the login protection policy live in one immutable value,
//! [`BruteForceProtectionConfig`], which is validated when a service is built.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Upper bound for any single progressive lockout.
pub fn max_lockout_duration() -> Duration {
    Duration::hours(24)
}

/// Rolling window of the per-identifier lockout history.
pub fn lockout_history_window() -> Duration {
    Duration::hours(24)
}

/// What an evaluation does when the attempt store cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreFailurePolicy {
    /// Return the storage error to the caller.
    #[default]
    Propagate,
    /// Allow the login attempt without rate limiting.
    FailOpen,
    /// Deny the login attempt.
    FailClosed,
}

impl FromStr for StoreFailurePolicy {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "propagate" => Ok(Self::Propagate),
            "fail_open" | "open" => Ok(Self::FailOpen),
            "fail_closed" | "closed" => Ok(Self::FailClosed),
            other => Err(ValidationError::InvalidField(format!(
                "unknown store failure policy: {other}"
            ))),
        }
    }
}

/// Configuration for login brute force protection.
///
/// # Example
///
/// ```rust
/// use chrono::Duration;
/// use warden_core::BruteForceProtectionConfig;
///
/// let config = BruteForceProtectionConfig::default()
///     .with_max_attempts(3)
///     .with_lockout_duration(Duration::minutes(30));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BruteForceProtectionConfig {
    /// Whether protection is enforced at all.
    pub enabled: bool,
    /// Failures allowed for one identifier before it is locked out.
    pub max_attempts: u32,
    /// Sliding window for counting failures. Each failure pushes it forward.
    pub window: Duration,
    /// Base lockout duration.
    pub lockout_duration: Duration,
    /// Double the lockout for each repeated lockout within 24 hours.
    pub progressive_lockout: bool,
    /// Failures after which a CAPTCHA is demanded.
    pub captcha_threshold: u32,
    /// Failures from one address, across all identifiers, before the address is blocked.
    pub ip_block_threshold: u32,
    /// How long an address block lasts.
    pub ip_block_duration: Duration,
    /// Behaviour when the attempt store fails during an evaluation.
    pub store_failure_policy: StoreFailurePolicy,
}

impl Default for BruteForceProtectionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 5,
            window: Duration::minutes(15),
            lockout_duration: Duration::minutes(15),
            progressive_lockout: true,
            captcha_threshold: 3,
            ip_block_threshold: 20,
            ip_block_duration: Duration::hours(1),
            store_failure_policy: StoreFailurePolicy::default(),
        }
    }
}

impl BruteForceProtectionConfig {
    /// A configuration that allows every attempt and never touches the store.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    pub fn with_lockout_duration(mut self, duration: Duration) -> Self {
        self.lockout_duration = duration;
        self
    }

    pub fn with_progressive_lockout(mut self, progressive: bool) -> Self {
        self.progressive_lockout = progressive;
        self
    }

    pub fn with_captcha_threshold(mut self, threshold: u32) -> Self {
        self.captcha_threshold = threshold;
        self
    }

    pub fn with_ip_block_threshold(mut self, threshold: u32) -> Self {
        self.ip_block_threshold = threshold;
        self
    }

    pub fn with_ip_block_duration(mut self, duration: Duration) -> Self {
        self.ip_block_duration = duration;
        self
    }

    pub fn with_store_failure_policy(mut self, policy: StoreFailurePolicy) -> Self {
        self.store_failure_policy = policy;
        self
    }

    /// Check that every threshold and duration is usable.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_attempts == 0 {
            return Err(invalid("max_attempts must be greater than 0"));
        }
        if self.captcha_threshold == 0 {
            return Err(invalid("captcha_threshold must be greater than 0"));
        }
        if self.ip_block_threshold == 0 {
            return Err(invalid("ip_block_threshold must be greater than 0"));
        }
        if self.window <= Duration::zero() {
            return Err(invalid("window must be positive"));
        }
        if self.lockout_duration <= Duration::zero() {
            return Err(invalid("lockout_duration must be positive"));
        }
        if self.ip_block_duration <= Duration::zero() {
            return Err(invalid("ip_block_duration must be positive"));
        }
        Ok(())
    }

    /// Load configuration from `WARDEN_*` environment variables.
    ///
    /// Unset variables keep their defaults. Durations are given in seconds.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `WARDEN_ENABLED` | `enabled` |
    /// | `WARDEN_MAX_ATTEMPTS` | `max_attempts` |
    /// | `WARDEN_WINDOW_SECS` | `window` |
    /// | `WARDEN_LOCKOUT_SECS` | `lockout_duration` |
    /// | `WARDEN_PROGRESSIVE_LOCKOUT` | `progressive_lockout` |
    /// | `WARDEN_CAPTCHA_THRESHOLD` | `captcha_threshold` |
    /// | `WARDEN_IP_BLOCK_THRESHOLD` | `ip_block_threshold` |
    /// | `WARDEN_IP_BLOCK_SECS` | `ip_block_duration` |
    /// | `WARDEN_STORE_FAILURE_POLICY` | `store_failure_policy` (`propagate`, `fail_open`, `fail_closed`) |
    pub fn from_env() -> Result<Self, ValidationError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ValidationError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(enabled) = parse_var::<bool, _>(&lookup, "WARDEN_ENABLED")? {
            config.enabled = enabled;
        }
        if let Some(max_attempts) = parse_var(&lookup, "WARDEN_MAX_ATTEMPTS")? {
            config.max_attempts = max_attempts;
        }
        if let Some(duration) = parse_secs(&lookup, "WARDEN_WINDOW_SECS")? {
            config.window = duration;
        }
        if let Some(duration) = parse_secs(&lookup, "WARDEN_LOCKOUT_SECS")? {
            config.lockout_duration = duration;
        }
        if let Some(progressive) = parse_var(&lookup, "WARDEN_PROGRESSIVE_LOCKOUT")? {
            config.progressive_lockout = progressive;
        }
        if let Some(threshold) = parse_var(&lookup, "WARDEN_CAPTCHA_THRESHOLD")? {
            config.captcha_threshold = threshold;
        }
        if let Some(threshold) = parse_var(&lookup, "WARDEN_IP_BLOCK_THRESHOLD")? {
            config.ip_block_threshold = threshold;
        }
        if let Some(duration) = parse_secs(&lookup, "WARDEN_IP_BLOCK_SECS")? {
            config.ip_block_duration = duration;
        }
        if let Some(policy) = lookup("WARDEN_STORE_FAILURE_POLICY") {
            config.store_failure_policy = policy.parse()?;
        }

        config.validate()?;
        Ok(config)
    }
}

fn invalid(message: &str) -> ValidationError {
    ValidationError::InvalidConfig(message.to_string())
}

fn parse_var<T, F>(lookup: &F, name: &str) -> Result<Option<T>, ValidationError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::InvalidField(format!("{name}={raw}"))),
        None => Ok(None),
    }
}

fn parse_secs<F>(lookup: &F, name: &str) -> Result<Option<Duration>, ValidationError>
where
    F: Fn(&str) -> Option<String>,
{
    match parse_var::<i64, _>(lookup, name)? {
        Some(secs) => Duration::try_seconds(secs)
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidField(format!("{name}={secs} is out of range"))),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = BruteForceProtectionConfig::default();
        assert!(config.enabled);
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.window, Duration::milliseconds(900_000));
        assert_eq!(config.lockout_duration, Duration::milliseconds(900_000));
        assert!(config.progressive_lockout);
        assert_eq!(config.captcha_threshold, 3);
        assert_eq!(config.ip_block_threshold, 20);
        assert_eq!(config.ip_block_duration, Duration::milliseconds(3_600_000));
        assert_eq!(config.store_failure_policy, StoreFailurePolicy::Propagate);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_disabled_config() {
        let config = BruteForceProtectionConfig::disabled();
        assert!(!config.enabled);
        assert_eq!(config.max_attempts, 5);
    }

    #[test]
    fn test_validate_rejects_zero_thresholds() {
        let config = BruteForceProtectionConfig::default().with_max_attempts(0);
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidConfig(msg)) if msg.contains("max_attempts")
        ));

        let config = BruteForceProtectionConfig::default().with_captcha_threshold(0);
        assert!(config.validate().is_err());

        let config = BruteForceProtectionConfig::default().with_ip_block_threshold(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_durations() {
        let config = BruteForceProtectionConfig::default().with_window(Duration::zero());
        assert!(config.validate().is_err());

        let config =
            BruteForceProtectionConfig::default().with_lockout_duration(Duration::seconds(-5));
        assert!(config.validate().is_err());

        let config = BruteForceProtectionConfig::default().with_ip_block_duration(Duration::zero());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_lookup_defaults_when_unset() {
        let config = BruteForceProtectionConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, BruteForceProtectionConfig::default());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let config = BruteForceProtectionConfig::from_lookup(lookup_from(&[
            ("WARDEN_ENABLED", "true"),
            ("WARDEN_MAX_ATTEMPTS", "7"),
            ("WARDEN_WINDOW_SECS", "600"),
            ("WARDEN_LOCKOUT_SECS", "120"),
            ("WARDEN_PROGRESSIVE_LOCKOUT", "false"),
            ("WARDEN_CAPTCHA_THRESHOLD", "2"),
            ("WARDEN_IP_BLOCK_THRESHOLD", "50"),
            ("WARDEN_IP_BLOCK_SECS", "7200"),
            ("WARDEN_STORE_FAILURE_POLICY", "fail-closed"),
        ]))
        .unwrap();

        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.window, Duration::minutes(10));
        assert_eq!(config.lockout_duration, Duration::minutes(2));
        assert!(!config.progressive_lockout);
        assert_eq!(config.captcha_threshold, 2);
        assert_eq!(config.ip_block_threshold, 50);
        assert_eq!(config.ip_block_duration, Duration::hours(2));
        assert_eq!(config.store_failure_policy, StoreFailurePolicy::FailClosed);
    }

    #[test]
    fn test_from_lookup_rejects_garbage() {
        let result =
            BruteForceProtectionConfig::from_lookup(lookup_from(&[("WARDEN_MAX_ATTEMPTS", "five")]));
        assert!(matches!(
            result,
            Err(ValidationError::InvalidField(msg)) if msg == "WARDEN_MAX_ATTEMPTS=five"
        ));
    }

    #[test]
    fn test_from_lookup_validates() {
        let result =
            BruteForceProtectionConfig::from_lookup(lookup_from(&[("WARDEN_LOCKOUT_SECS", "0")]));
        assert!(matches!(result, Err(ValidationError::InvalidConfig(_))));
    }

    #[test]
    fn test_store_failure_policy_parse() {
        assert_eq!(
            "propagate".parse::<StoreFailurePolicy>().unwrap(),
            StoreFailurePolicy::Propagate
        );
        assert_eq!(
            "FAIL_OPEN".parse::<StoreFailurePolicy>().unwrap(),
            StoreFailurePolicy::FailOpen
        );
        assert_eq!(
            "closed".parse::<StoreFailurePolicy>().unwrap(),
            StoreFailurePolicy::FailClosed
        );
        assert!("sometimes".parse::<StoreFailurePolicy>().is_err());
    }
}
