//! Brute force protection service for login attempts.
//!
//! This module implements the login protection policy: per-identifier failure
//! counting with account lockout, per-address failure counting with address
//! blocks, CAPTCHA escalation, and progressive lockout growth.
//!
//! # Features
//!
//! - Sliding failure window, pushed forward by every failure
//! - Account lockout after a configurable number of failures
//! - Lockout doubling for repeated lockouts within 24 hours, capped at 24 hours
//! - Address blocks once one address fails too often across any accounts
//! - Lazy expiry of block and lockout records
//! - Administrative overrides and read-only status projections
//! - An audit event for every decision
//!
//! # Example
//!
//! ```rust,ignore
//! use warden_core::{BruteForceProtectionConfig, BruteForceProtectionService};
//!
//! let service = BruteForceProtectionService::new(store, BruteForceProtectionConfig::default())?;
//!
//! // After checking credentials
//! let decision = service
//!     .evaluate_login_attempt("user@example.com", "192.168.1.1", user_agent, password_ok)
//!     .await?;
//! if !decision.allowed {
//!     // Refuse the login, report decision.message
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::{
    Error,
    config::{
        BruteForceProtectionConfig, StoreFailurePolicy, lockout_history_window,
        max_lockout_duration,
    },
    error::{StorageError, ValidationError},
    events::{SecurityEvent, SecurityEventLogger, SecurityEventType, Severity, TracingEventLogger},
    keys,
    records::{BlockRecord, EXCESSIVE_FAILURES_REASON, LockoutRecord},
    status::{AddressBlockStatus, AddressStatus, IdentifierStatus, LoginDecision, SecurityMetrics},
    store::{AttemptStore, ttl_seconds},
};

/// Service enforcing the login protection policy.
///
/// The service holds no state of its own: every call re-reads the attempt store,
/// so any number of service instances sharing one store enforce one policy.
/// Correctness under concurrent attempts rests on the store's per-key atomic
/// increment; the service takes no locks.
///
/// # Thread Safety
///
/// This service is thread-safe and can be shared across multiple tasks.
pub struct BruteForceProtectionService<S: AttemptStore> {
    store: Arc<S>,
    logger: Arc<dyn SecurityEventLogger>,
    config: BruteForceProtectionConfig,
}

impl<S: AttemptStore> BruteForceProtectionService<S> {
    /// Create a new service that reports security events through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the configuration is unusable.
    pub fn new(store: Arc<S>, config: BruteForceProtectionConfig) -> Result<Self, Error> {
        Self::with_event_logger(store, Arc::new(TracingEventLogger), config)
    }

    /// Create a new service with a custom security event logger.
    pub fn with_event_logger(
        store: Arc<S>,
        logger: Arc<dyn SecurityEventLogger>,
        config: BruteForceProtectionConfig,
    ) -> Result<Self, Error> {
        config.validate()?;
        Ok(Self {
            store,
            logger,
            config,
        })
    }

    /// Get the current configuration.
    pub fn config(&self) -> &BruteForceProtectionConfig {
        &self.config
    }

    /// Check if brute force protection is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// The attempt store backing this service.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Check that the attempt store is reachable.
    pub async fn health_check(&self) -> Result<(), Error> {
        self.store.health_check().await
    }

    /// Decide the outcome of a login attempt and record its side effects.
    ///
    /// `succeeded` is the result of the credential check, which happens
    /// elsewhere. The checks run in order: address block, identifier lockout,
    /// then success or failure accounting.
    ///
    /// When protection is disabled every attempt is allowed and the store is
    /// never touched.
    ///
    /// # Errors
    ///
    /// Store failures are handled according to
    /// [`store_failure_policy`](BruteForceProtectionConfig::store_failure_policy):
    /// returned as-is, or turned into an allowing or denying decision.
    pub async fn evaluate_login_attempt(
        &self,
        identifier: &str,
        address: &str,
        user_agent: &str,
        succeeded: bool,
    ) -> Result<LoginDecision, Error> {
        if !self.config.enabled {
            return Ok(LoginDecision::unprotected(
                self.config.max_attempts,
                if succeeded {
                    "Login successful"
                } else {
                    "Invalid credentials"
                },
            ));
        }

        match self
            .evaluate(identifier, address, user_agent, succeeded)
            .await
        {
            Err(Error::Storage(e)) => Ok(self
                .on_store_failure(e, identifier, address)?
                .unwrap_or_else(|| {
                    LoginDecision::unprotected(
                        self.config.max_attempts,
                        "Login attempt allowed; protection is temporarily unavailable.",
                    )
                })),
            other => other,
        }
    }

    /// Check, before credentials are verified, whether an attempt may proceed.
    ///
    /// Reads the address block and the identifier lockout without recording
    /// anything. Returns the refusing decision if the attempt must be turned
    /// away, or `None` if it may go ahead.
    ///
    /// # Errors
    ///
    /// Store failures follow the same
    /// [`store_failure_policy`](BruteForceProtectionConfig::store_failure_policy)
    /// as [`evaluate_login_attempt`](Self::evaluate_login_attempt): `FailOpen`
    /// lets the attempt through and `FailClosed` refuses it.
    pub async fn check_attempt(
        &self,
        identifier: &str,
        address: &str,
    ) -> Result<Option<LoginDecision>, Error> {
        if !self.config.enabled {
            return Ok(None);
        }

        match self.precheck(identifier, address).await {
            Err(Error::Storage(e)) => self.on_store_failure(e, identifier, address),
            other => other,
        }
    }

    async fn precheck(
        &self,
        identifier: &str,
        address: &str,
    ) -> Result<Option<LoginDecision>, Error> {
        let now = Utc::now();

        if let Some(block) = self.read_block(address, now).await? {
            return Ok(Some(LoginDecision::blocked(block.until)));
        }
        if let Some(lockout) = self.read_lockout(identifier, now).await? {
            return Ok(Some(LoginDecision::locked(lockout.until, now)));
        }
        Ok(None)
    }

    /// Apply the store failure policy. `None` means the attempt goes ahead
    /// without protection.
    fn on_store_failure(
        &self,
        e: StorageError,
        identifier: &str,
        address: &str,
    ) -> Result<Option<LoginDecision>, Error> {
        match self.config.store_failure_policy {
            StoreFailurePolicy::Propagate => Err(Error::Storage(e)),
            StoreFailurePolicy::FailOpen => {
                error!(
                    identifier = identifier,
                    address = address,
                    error = %e,
                    "Attempt store failed, allowing login attempt without protection"
                );
                Ok(None)
            }
            StoreFailurePolicy::FailClosed => {
                error!(
                    identifier = identifier,
                    address = address,
                    error = %e,
                    "Attempt store failed, denying login attempt"
                );
                Ok(Some(LoginDecision::unavailable()))
            }
        }
    }

    async fn evaluate(
        &self,
        identifier: &str,
        address: &str,
        user_agent: &str,
        succeeded: bool,
    ) -> Result<LoginDecision, Error> {
        let now = Utc::now();

        if let Some(block) = self.read_block(address, now).await? {
            debug!(
                address = address,
                until = %block.until,
                "Login attempt from blocked address refused"
            );
            return Ok(LoginDecision::blocked(block.until));
        }

        if let Some(lockout) = self.read_lockout(identifier, now).await? {
            debug!(
                identifier = identifier,
                until = %lockout.until,
                "Login attempt for locked identifier refused"
            );
            return Ok(LoginDecision::locked(lockout.until, now));
        }

        if succeeded {
            self.store.del(&keys::login_attempts(identifier)).await?;
            self.store.del(&keys::lockout(identifier)).await?;

            self.log_event(
                SecurityEvent::new(SecurityEventType::LoginSuccess, Severity::Low)
                    .with_ip_address(address)
                    .with_user_agent(user_agent)
                    .with_details(json!({ "identifier": identifier })),
            )
            .await;

            return Ok(LoginDecision::success(self.config.max_attempts));
        }

        let window = ttl_seconds(self.config.window);

        let identifier_key = keys::login_attempts(identifier);
        let identifier_count = clamp_count(self.store.incr(&identifier_key).await?);
        self.store.expire(&identifier_key, window).await?;

        let address_key = keys::ip_attempts(address);
        let address_count = clamp_count(self.store.incr(&address_key).await?);
        self.store.expire(&address_key, window).await?;

        debug!(
            identifier = identifier,
            address = address,
            identifier_failures = identifier_count,
            address_failures = address_count,
            "Login failure recorded"
        );

        if address_count >= self.config.ip_block_threshold {
            let record = BlockRecord::new(
                deadline(now, self.config.ip_block_duration)?,
                EXCESSIVE_FAILURES_REASON,
            );
            self.store
                .setex(
                    &keys::ip_blocked(address),
                    ttl_seconds(self.config.ip_block_duration),
                    &record.encode()?,
                )
                .await?;

            warn!(
                address = address,
                address_failures = address_count,
                until = %record.until,
                "Address blocked due to repeated login failures"
            );

            self.log_event(
                SecurityEvent::new(SecurityEventType::AddressBlocked, Severity::Critical)
                    .with_ip_address(address)
                    .with_user_agent(user_agent)
                    .with_blocked(true)
                    .with_details(json!({
                        "identifier": identifier,
                        "failed_attempts": address_count,
                        "reason": record.reason,
                        "blocked_until": record.until.timestamp_millis(),
                    })),
            )
            .await;

            return Ok(LoginDecision::blocked(record.until));
        }

        if identifier_count >= self.config.max_attempts {
            let duration = self.next_lockout_duration(identifier).await?;
            let record = LockoutRecord::new(deadline(now, duration)?);
            self.store
                .setex(
                    &keys::lockout(identifier),
                    ttl_seconds(duration),
                    &record.encode(),
                )
                .await?;

            warn!(
                identifier = identifier,
                failed_attempts = identifier_count,
                lockout_secs = duration.num_seconds(),
                "Account locked due to repeated login failures"
            );

            self.log_event(
                SecurityEvent::new(SecurityEventType::AccountLocked, Severity::High)
                    .with_ip_address(address)
                    .with_user_agent(user_agent)
                    .with_blocked(true)
                    .with_details(json!({
                        "identifier": identifier,
                        "failed_attempts": identifier_count,
                        "lockout_duration_ms": duration.num_milliseconds(),
                        "locked_until": record.until.timestamp_millis(),
                    })),
            )
            .await;

            return Ok(LoginDecision::locked(record.until, now));
        }

        let remaining = self.config.max_attempts - identifier_count;
        let requires_captcha = identifier_count >= self.config.captcha_threshold;

        self.log_event(
            SecurityEvent::new(SecurityEventType::LoginFailure, Severity::Medium)
                .with_ip_address(address)
                .with_user_agent(user_agent)
                .with_details(json!({
                    "identifier": identifier,
                    "failed_attempts": identifier_count,
                    "remaining_attempts": remaining,
                    "requires_captcha": requires_captcha,
                })),
        )
        .await;

        Ok(LoginDecision::failure(remaining, requires_captcha))
    }

    /// Check whether an address is currently blocked.
    ///
    /// A block whose end has passed, or whose record cannot be decoded, is
    /// removed as a side effect and reported as not blocked.
    pub async fn is_address_blocked(&self, address: &str) -> Result<AddressBlockStatus, Error> {
        Ok(match self.read_block(address, Utc::now()).await? {
            Some(record) => AddressBlockStatus {
                blocked: true,
                until: Some(record.until),
                reason: Some(record.reason),
            },
            None => AddressBlockStatus::unblocked(),
        })
    }

    /// Block an address regardless of its failure count.
    pub async fn block_address(
        &self,
        address: &str,
        reason: &str,
        duration: Duration,
    ) -> Result<BlockRecord, Error> {
        if duration <= Duration::zero() {
            return Err(ValidationError::InvalidField(
                "block duration must be positive".to_string(),
            )
            .into());
        }

        let record = BlockRecord::new(deadline(Utc::now(), duration)?, reason);
        self.store
            .setex(
                &keys::ip_blocked(address),
                ttl_seconds(duration),
                &record.encode()?,
            )
            .await?;

        info!(
            address = address,
            reason = reason,
            until = %record.until,
            "Address manually blocked (admin)"
        );

        self.log_event(
            SecurityEvent::new(SecurityEventType::AddressBlocked, Severity::High)
                .with_ip_address(address)
                .with_blocked(true)
                .with_details(json!({
                    "reason": reason,
                    "blocked_until": record.until.timestamp_millis(),
                    "manual": true,
                })),
        )
        .await;

        Ok(record)
    }

    /// Lift any block on an address and clear its failure counter.
    ///
    /// Unblocking an address that is not blocked is not an error.
    ///
    /// # Returns
    ///
    /// `true` if the address was blocked before the call.
    pub async fn unblock_address(&self, address: &str) -> Result<bool, Error> {
        let was_blocked = self.read_block(address, Utc::now()).await?.is_some();

        self.store.del(&keys::ip_blocked(address)).await?;
        self.store.del(&keys::ip_attempts(address)).await?;

        if was_blocked {
            info!(address = address, "Address manually unblocked (admin)");
            self.log_event(
                SecurityEvent::new(SecurityEventType::AddressUnblocked, Severity::Low)
                    .with_ip_address(address),
            )
            .await;
        }

        Ok(was_blocked)
    }

    /// Clear an identifier's failure counter and any lockout.
    ///
    /// The lockout history is kept, so a later lockout still grows progressively.
    pub async fn reset_identifier_attempts(&self, identifier: &str) -> Result<(), Error> {
        self.store.del(&keys::login_attempts(identifier)).await?;
        self.store.del(&keys::lockout(identifier)).await?;

        info!(identifier = identifier, "Login attempts reset (admin)");

        self.log_event(
            SecurityEvent::new(SecurityEventType::AttemptsReset, Severity::Low)
                .with_details(json!({ "identifier": identifier })),
        )
        .await;

        Ok(())
    }

    /// Read-only view of an identifier's failures and lockout.
    pub async fn get_identifier_status(&self, identifier: &str) -> Result<IdentifierStatus, Error> {
        let failed_attempts = self.read_counter(&keys::login_attempts(identifier)).await?;
        let lockout = self.read_lockout(identifier, Utc::now()).await?;
        let recent_lockouts = self.read_counter(&keys::lockout_history(identifier)).await?;

        Ok(IdentifierStatus {
            identifier: identifier.to_string(),
            failed_attempts,
            remaining_attempts: self.config.max_attempts.saturating_sub(failed_attempts),
            requires_captcha: failed_attempts >= self.config.captcha_threshold,
            is_locked: lockout.is_some(),
            locked_until: lockout.map(|record| record.until),
            recent_lockouts,
        })
    }

    /// Read-only view of an address's failures and block.
    pub async fn get_address_status(&self, address: &str) -> Result<AddressStatus, Error> {
        let failed_attempts = self.read_counter(&keys::ip_attempts(address)).await?;
        let block = self.read_block(address, Utc::now()).await?;

        Ok(AddressStatus {
            address: address.to_string(),
            failed_attempts,
            remaining_attempts: self.config.ip_block_threshold.saturating_sub(failed_attempts),
            is_blocked: block.is_some(),
            blocked_until: block.as_ref().map(|record| record.until),
            block_reason: block.map(|record| record.reason),
        })
    }

    /// Count live blocks, lockouts and failure counters across the store.
    pub async fn get_security_metrics(&self) -> Result<SecurityMetrics, Error> {
        let blocked_addresses = self
            .store
            .keys(&keys::pattern(keys::IP_BLOCKED_PREFIX))
            .await?
            .len();
        let locked_identifiers = self
            .store
            .keys(&keys::pattern(keys::LOCKOUT_PREFIX))
            .await?
            .len();
        let identifiers_with_failures = self
            .store
            .keys(&keys::pattern(keys::LOGIN_ATTEMPTS_PREFIX))
            .await?
            .len();
        let addresses_with_failures = self
            .store
            .keys(&keys::pattern(keys::IP_ATTEMPTS_PREFIX))
            .await?
            .len();

        Ok(SecurityMetrics {
            blocked_addresses,
            locked_identifiers,
            identifiers_with_failures,
            addresses_with_failures,
            generated_at: Utc::now(),
        })
    }

    /// Lockout duration for the given position in the 24 hour lockout history.
    ///
    /// With progressive lockout the base duration doubles for each earlier
    /// lockout (`base * 2^(history - 1)`), never exceeding 24 hours. Without it
    /// the base duration is returned unchanged.
    pub fn lockout_duration_for(&self, history_count: u32) -> Duration {
        let base = self.config.lockout_duration;
        if !self.config.progressive_lockout {
            return base;
        }

        let cap = max_lockout_duration();
        let exponent = history_count.saturating_sub(1).min(62);
        let millis = base.num_milliseconds().saturating_mul(1_i64 << exponent);
        Duration::milliseconds(millis.min(cap.num_milliseconds()))
    }

    async fn next_lockout_duration(&self, identifier: &str) -> Result<Duration, Error> {
        if !self.config.progressive_lockout {
            return Ok(self.config.lockout_duration);
        }

        let key = keys::lockout_history(identifier);
        let history_count = clamp_count(self.store.incr(&key).await?);
        self.store
            .expire(&key, ttl_seconds(lockout_history_window()))
            .await?;

        Ok(self.lockout_duration_for(history_count))
    }

    async fn read_block(
        &self,
        address: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<BlockRecord>, Error> {
        let key = keys::ip_blocked(address);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match BlockRecord::decode(&raw) {
            Ok(record) if record.is_active_at(now) => Ok(Some(record)),
            Ok(_) => {
                self.store.del(&key).await?;
                debug!(address = address, "Expired address block removed");
                Ok(None)
            }
            Err(e) => {
                warn!(address = address, error = %e, "Discarding malformed block record");
                self.store.del(&key).await?;
                Ok(None)
            }
        }
    }

    async fn read_lockout(
        &self,
        identifier: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockoutRecord>, Error> {
        let key = keys::lockout(identifier);
        let Some(raw) = self.store.get(&key).await? else {
            return Ok(None);
        };

        match LockoutRecord::decode(&raw) {
            Ok(record) if record.is_active_at(now) => Ok(Some(record)),
            Ok(_) => {
                self.store.del(&key).await?;
                debug!(identifier = identifier, "Expired lockout removed");
                Ok(None)
            }
            Err(e) => {
                warn!(identifier = identifier, error = %e, "Discarding malformed lockout record");
                self.store.del(&key).await?;
                Ok(None)
            }
        }
    }

    async fn read_counter(&self, key: &str) -> Result<u32, Error> {
        Ok(self
            .store
            .get(key)
            .await?
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .map(clamp_count)
            .unwrap_or(0))
    }

    async fn log_event(&self, event: SecurityEvent) {
        if let Err(e) = self.logger.log_security_event(&event).await {
            warn!(
                error = %e,
                event_id = %event.id,
                event_type = %event.event_type,
                "Failed to record security event"
            );
        }
    }
}

fn deadline(now: DateTime<Utc>, duration: Duration) -> Result<DateTime<Utc>, Error> {
    now.checked_add_signed(duration).ok_or_else(|| {
        ValidationError::InvalidField(format!("duration of {duration} is out of range")).into()
    })
}

fn clamp_count(value: i64) -> u32 {
    value.clamp(0, u32::MAX as i64) as u32
}
