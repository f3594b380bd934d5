//! Tests for the warden builder pattern

use std::sync::Arc;

use async_trait::async_trait;
use warden::{
    BruteForceProtectionConfig, EventBus, EventError, SecurityEvent, SecurityEventLogger,
    StoreFailurePolicy, WardenBuilder, WardenBuilderError,
};

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_with_memory_store() {
    let warden = WardenBuilder::new()
        .with_memory_store()
        .check_store_on_build(true)
        .build()
        .await
        .expect("Failed to build service");

    assert!(warden.is_enabled());
    assert_eq!(warden.config().max_attempts, 5);
    warden.health_check().await.expect("Health check failed");
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_with_custom_config() {
    let warden = WardenBuilder::new()
        .with_memory_store()
        .with_config(
            BruteForceProtectionConfig::default()
                .with_max_attempts(3)
                .with_store_failure_policy(StoreFailurePolicy::FailClosed),
        )
        .build()
        .await
        .expect("Failed to build service");

    assert_eq!(warden.config().max_attempts, 3);
    assert_eq!(
        warden.config().store_failure_policy,
        StoreFailurePolicy::FailClosed
    );
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_config_before_store() {
    // Configuration may be supplied before the store is chosen
    let warden = WardenBuilder::new()
        .with_config(BruteForceProtectionConfig::disabled())
        .with_memory_store()
        .build()
        .await
        .expect("Failed to build service");

    assert!(!warden.is_enabled());
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_rejects_invalid_config() {
    let result = WardenBuilder::new()
        .with_memory_store()
        .with_config(BruteForceProtectionConfig::default().with_captcha_threshold(0))
        .build()
        .await;

    assert!(matches!(
        result,
        Err(WardenBuilderError::InvalidConfiguration(_))
    ));
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_with_shared_store() {
    let store = Arc::new(warden::MemoryAttemptStore::new());

    let first = WardenBuilder::new()
        .with_store(store.clone())
        .build()
        .await
        .unwrap();
    let second = WardenBuilder::new()
        .with_store(store.clone())
        .build()
        .await
        .unwrap();

    // Two service instances over one store enforce one policy
    for _ in 0..4 {
        first
            .evaluate_login_attempt("a@b.com", "1.2.3.4", "", false)
            .await
            .unwrap();
    }
    let decision = second
        .evaluate_login_attempt("a@b.com", "5.6.7.8", "", false)
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert!(decision.lockout_until.is_some());
}

struct CountingLogger {
    count: std::sync::atomic::AtomicUsize,
}

#[async_trait]
impl SecurityEventLogger for CountingLogger {
    async fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), EventError> {
        self.count.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(feature = "memory")]
#[tokio::test]
async fn test_builder_with_event_bus() {
    let logger = Arc::new(CountingLogger {
        count: std::sync::atomic::AtomicUsize::new(0),
    });
    let bus = EventBus::new();
    bus.register(logger.clone()).await;

    let warden = WardenBuilder::new()
        .with_memory_store()
        .with_event_logger(Arc::new(bus))
        .build()
        .await
        .unwrap();

    warden
        .evaluate_login_attempt("a@b.com", "1.2.3.4", "", false)
        .await
        .unwrap();
    warden
        .evaluate_login_attempt("a@b.com", "1.2.3.4", "", true)
        .await
        .unwrap();

    assert_eq!(logger.count.load(std::sync::atomic::Ordering::SeqCst), 2);
}
