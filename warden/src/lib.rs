//! # Warden
//!
//! Warden protects login endpoints against credential guessing. Every login
//! attempt is evaluated against a per-account failure counter and a per-address
//! failure counter kept in an external attempt store, and the result is a
//! [`LoginDecision`]: allow, require a CAPTCHA, lock the account, or block the
//! address.
//!
//! The policy:
//! - An account is locked after `max_attempts` failures within the window
//! - Repeated lockouts within 24 hours double in length, up to 24 hours
//! - A CAPTCHA is requested from `captcha_threshold` failures on
//! - An address is blocked after `ip_block_threshold` failures across any accounts
//! - A successful login clears the account's failures and lockout
//!
//! Credential checking is not part of warden: the caller verifies the password
//! and reports the outcome.
//!
//! ## Storage Support
//!
//! - In-memory (`memory` feature, default) for single servers and tests
//! - Redis (`redis` feature) for state shared between servers
//!
//! ## Example
//!
//! ```rust,no_run
//! use warden::{BruteForceProtectionConfig, WardenBuilder};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warden = WardenBuilder::new()
//!         .with_memory_store()
//!         .with_config(BruteForceProtectionConfig::default().with_max_attempts(3))
//!         .build()
//!         .await?;
//!
//!     let password_ok = false;
//!     let decision = warden
//!         .evaluate_login_attempt("user@example.com", "203.0.113.7", "Mozilla/5.0", password_ok)
//!         .await?;
//!
//!     if !decision.allowed {
//!         println!("refused: {}", decision.message);
//!     }
//!     Ok(())
//! }
//! ```

pub mod builder;

pub use builder::{NoStore, WardenBuilder, WardenBuilderError, WithStore};

/// Re-export core types from warden_core
pub use warden_core::{
    AddressBlockStatus, AddressStatus, AttemptStore, BlockRecord, BruteForceProtectionConfig,
    BruteForceProtectionService, Error, EventBus, IdentifierStatus, LockoutRecord, LoginDecision,
    NoopEventLogger, SecurityEvent, SecurityEventLogger, SecurityEventType, SecurityMetrics,
    Severity, StoreFailurePolicy, TracingEventLogger,
};

/// Re-export error types
pub use warden_core::error::{EventError, StorageError, ValidationError};

/// Re-export attempt store backends
///
/// These implementations are available when the corresponding feature is enabled.
#[cfg(feature = "memory")]
pub use warden_storage_memory::MemoryAttemptStore;

#[cfg(feature = "redis")]
pub use warden_storage_redis::RedisAttemptStore;
