//! Core functionality for the warden project
//!
//! This crate contains the login protection policy: the brute force protection
//! service, its configuration, the [`AttemptStore`] trait that storage backends
//! implement, the typed records kept in the store, and the security events the
//! policy emits.
//!
//! The core crate is designed to be used as a dependency for storage backends and
//! integrations. Application code usually goes through the `warden` crate, which
//! re-exports everything here.
//!
//! See [`BruteForceProtectionService`] for the policy engine, [`AttemptStore`] for
//! the storage seam, and [`SecurityEventLogger`] for the audit seam.
pub mod config;
pub mod error;
pub mod events;
pub mod keys;
pub mod records;
pub mod services;
pub mod status;
pub mod store;

pub use config::{BruteForceProtectionConfig, StoreFailurePolicy};
pub use error::Error;
pub use events::{
    EventBus, NoopEventLogger, SecurityEvent, SecurityEventLogger, SecurityEventType, Severity,
    TracingEventLogger,
};
pub use records::{BlockRecord, LockoutRecord};
pub use services::BruteForceProtectionService;
pub use status::{AddressBlockStatus, AddressStatus, IdentifierStatus, LoginDecision, SecurityMetrics};
pub use store::AttemptStore;
