//! Builder pattern for constructing the protection service
//!
//! This module provides a type-safe builder for creating a
//! [`BruteForceProtectionService`] with compile-time validation that an attempt
//! store has been configured.
//!
//! # Example
//!
//! ```rust,no_run
//! use warden::WardenBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // In-process store for a single server
//!     let warden = WardenBuilder::new()
//!         .with_memory_store()
//!         .build()
//!         .await?;
//!
//!     let decision = warden
//!         .evaluate_login_attempt("user@example.com", "203.0.113.7", "curl/8.0", false)
//!         .await?;
//!     println!("{}", decision.message);
//!
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use warden_core::{
    AttemptStore, BruteForceProtectionConfig, BruteForceProtectionService, SecurityEventLogger,
    TracingEventLogger,
};

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur when building the protection service.
#[derive(Debug, thiserror::Error)]
pub enum WardenBuilderError {
    /// Failed to connect to the attempt store
    #[error("Store connection failed: {0}")]
    StoreConnection(String),

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

// ============================================================================
// Type-State Markers
// ============================================================================

/// Marker type indicating no attempt store has been configured yet.
///
/// This is the initial state of [`WardenBuilder`].
pub struct NoStore;

/// Marker type indicating an attempt store has been configured.
pub struct WithStore<S: AttemptStore> {
    store: Arc<S>,
}

// ============================================================================
// Builder Implementation
// ============================================================================

/// A type-safe builder for constructing a [`BruteForceProtectionService`].
///
/// # Type States
///
/// - [`NoStore`]: Initial state, a store must be configured
/// - [`WithStore<S>`]: Store configured, ready to build or add more configuration
pub struct WardenBuilder<Store> {
    store: Store,
    config: BruteForceProtectionConfig,
    logger: Arc<dyn SecurityEventLogger>,
    check_store: bool,
}

impl Default for WardenBuilder<NoStore> {
    fn default() -> Self {
        Self::new()
    }
}

impl WardenBuilder<NoStore> {
    /// Create a new builder with default configuration.
    ///
    /// # Defaults
    ///
    /// - Protection: enabled (5 attempts in 15 minutes, 15 minute progressive lockout)
    /// - CAPTCHA after 3 failures, address block after 20 failures for 1 hour
    /// - Store failures: propagated to the caller
    /// - Security events: written through `tracing`
    /// - Store health check on build: false
    pub fn new() -> Self {
        Self {
            store: NoStore,
            config: BruteForceProtectionConfig::default(),
            logger: Arc::new(TracingEventLogger),
            check_store: false,
        }
    }

    /// Configure any [`AttemptStore`] implementation.
    pub fn with_store<S: AttemptStore>(self, store: Arc<S>) -> WardenBuilder<WithStore<S>> {
        WardenBuilder {
            store: WithStore { store },
            config: self.config,
            logger: self.logger,
            check_store: self.check_store,
        }
    }
}

// ============================================================================
// Store Configuration Methods (NoStore -> WithStore)
// ============================================================================

#[cfg(feature = "memory")]
impl WardenBuilder<NoStore> {
    /// Configure an in-process store.
    ///
    /// State is lost on restart and not shared between servers. Call
    /// [`MemoryAttemptStore::start_cleanup_task`](crate::MemoryAttemptStore::start_cleanup_task)
    /// on the built service's store to bound memory use.
    pub fn with_memory_store(self) -> WardenBuilder<WithStore<crate::MemoryAttemptStore>> {
        self.with_store(Arc::new(crate::MemoryAttemptStore::new()))
    }
}

#[cfg(feature = "redis")]
impl WardenBuilder<NoStore> {
    /// Configure Redis storage from a connection URL.
    ///
    /// The connection is verified with a `PING` before the builder is returned.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// use warden::WardenBuilder;
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let warden = WardenBuilder::new()
    ///     .with_redis("redis://127.0.0.1:6379")
    ///     .await?
    ///     .build()
    ///     .await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn with_redis(
        self,
        url: &str,
    ) -> Result<WardenBuilder<WithStore<crate::RedisAttemptStore>>, WardenBuilderError> {
        let store = crate::RedisAttemptStore::from_url(url)
            .map_err(|e| WardenBuilderError::StoreConnection(e.to_string()))?;

        store
            .health_check()
            .await
            .map_err(|e| WardenBuilderError::StoreConnection(e.to_string()))?;

        Ok(self.with_store(Arc::new(store)))
    }

    /// Configure Redis storage with an existing connection pool.
    ///
    /// Use this to share a pool the application already holds.
    pub fn with_redis_pool(
        self,
        pool: deadpool_redis::Pool,
    ) -> WardenBuilder<WithStore<crate::RedisAttemptStore>> {
        self.with_store(Arc::new(crate::RedisAttemptStore::new(pool)))
    }
}

// ============================================================================
// Configuration Methods (available in every state)
// ============================================================================

impl<Store> WardenBuilder<Store> {
    /// Replace the protection policy.
    ///
    /// The configuration is validated by [`build`](WardenBuilder::build).
    pub fn with_config(mut self, config: BruteForceProtectionConfig) -> Self {
        self.config = config;
        self
    }

    /// Read the protection policy from `WARDEN_*` environment variables.
    ///
    /// See [`BruteForceProtectionConfig::from_env`] for the variables read.
    pub fn with_config_from_env(mut self) -> Result<Self, WardenBuilderError> {
        self.config = BruteForceProtectionConfig::from_env()
            .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;
        Ok(self)
    }

    /// Send security events to a custom logger instead of `tracing`.
    ///
    /// Use an [`EventBus`](crate::EventBus) to reach several loggers.
    pub fn with_event_logger(mut self, logger: Arc<dyn SecurityEventLogger>) -> Self {
        self.logger = logger;
        self
    }
}

impl<S: AttemptStore> WardenBuilder<WithStore<S>> {
    /// Set whether [`build`](WardenBuilder::build) checks that the store is reachable.
    ///
    /// Default: false
    pub fn check_store_on_build(mut self, check: bool) -> Self {
        self.check_store = check;
        self
    }

    /// Build the protection service.
    ///
    /// # Errors
    ///
    /// Returns [`WardenBuilderError::InvalidConfiguration`] if the configuration
    /// does not validate, and [`WardenBuilderError::StoreConnection`] if the
    /// store health check was requested and failed.
    pub async fn build(self) -> Result<BruteForceProtectionService<S>, WardenBuilderError> {
        if self.check_store {
            self.store
                .store
                .health_check()
                .await
                .map_err(|e| WardenBuilderError::StoreConnection(e.to_string()))?;
        }

        let service = BruteForceProtectionService::with_event_logger(
            self.store.store,
            self.logger,
            self.config,
        )
        .map_err(|e| WardenBuilderError::InvalidConfiguration(e.to_string()))?;

        tracing::debug!(
            enabled = service.is_enabled(),
            max_attempts = service.config().max_attempts,
            ip_block_threshold = service.config().ip_block_threshold,
            "Brute force protection service built"
        );

        Ok(service)
    }
}
