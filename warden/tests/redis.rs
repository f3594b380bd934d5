//! Policy tests against a real Redis server
#![cfg(feature = "redis")]

use chrono::Duration;
use testcontainers_modules::testcontainers::runners::AsyncRunner;
use warden::{AttemptStore, BruteForceProtectionConfig, RedisAttemptStore, WardenBuilder};

#[tokio::test]
async fn test_redis_store_semantics() {
    let container = testcontainers_modules::redis::Redis::default()
        .start()
        .await
        .unwrap();
    let host_port = container.get_host_port_ipv4(6379).await.unwrap();
    let store = RedisAttemptStore::from_url(&format!("redis://127.0.0.1:{host_port}")).unwrap();

    store.health_check().await.unwrap();

    assert_eq!(store.incr("login_attempts:a@b.com").await.unwrap(), 1);
    assert_eq!(store.incr("login_attempts:a@b.com").await.unwrap(), 2);
    store.expire("login_attempts:a@b.com", 900).await.unwrap();
    assert_eq!(
        store.get("login_attempts:a@b.com").await.unwrap().as_deref(),
        Some("2")
    );

    store.setex("lockout:a@b.com", 60, "1700000000000").await.unwrap();
    store.incr("ip_attempts:1.2.3.4").await.unwrap();
    store.incr("ip_attempts:5.6.7.8").await.unwrap();
    assert_eq!(
        store.keys("ip_attempts:*").await.unwrap(),
        vec!["ip_attempts:1.2.3.4", "ip_attempts:5.6.7.8"]
    );

    store.expire("ip_attempts:1.2.3.4", 0).await.unwrap();
    assert!(store.get("ip_attempts:1.2.3.4").await.unwrap().is_none());

    store.del("lockout:a@b.com").await.unwrap();
    store.del("lockout:a@b.com").await.unwrap();
    assert!(store.get("lockout:a@b.com").await.unwrap().is_none());
}

#[tokio::test]
async fn test_redis_lockout_and_block() {
    let container = testcontainers_modules::redis::Redis::default()
        .start()
        .await
        .unwrap();
    let host_port = container.get_host_port_ipv4(6379).await.unwrap();

    let warden = WardenBuilder::new()
        .with_redis(&format!("redis://127.0.0.1:{host_port}"))
        .await
        .expect("Failed to connect to Redis")
        .with_config(
            BruteForceProtectionConfig::default()
                .with_max_attempts(3)
                .with_ip_block_threshold(5),
        )
        .build()
        .await
        .expect("Failed to build service");

    for expected_remaining in [2, 1] {
        let decision = warden
            .evaluate_login_attempt("a@b.com", "1.2.3.4", "", false)
            .await
            .unwrap();
        assert!(decision.allowed);
        assert_eq!(decision.remaining_attempts, expected_remaining);
    }

    let decision = warden
        .evaluate_login_attempt("a@b.com", "1.2.3.4", "", false)
        .await
        .unwrap();
    assert!(!decision.allowed);
    assert!(decision.lockout_until.is_some());

    for user in ["b@b.com", "c@b.com"] {
        warden
            .evaluate_login_attempt(user, "1.2.3.4", "", false)
            .await
            .unwrap();
    }
    assert!(warden.is_address_blocked("1.2.3.4").await.unwrap().blocked);

    let metrics = warden.get_security_metrics().await.unwrap();
    assert_eq!(metrics.blocked_addresses, 1);
    assert_eq!(metrics.locked_identifiers, 1);

    assert!(warden.unblock_address("1.2.3.4").await.unwrap());
    warden
        .block_address("9.9.9.9", "manual", Duration::minutes(5))
        .await
        .unwrap();
    assert!(warden.is_address_blocked("9.9.9.9").await.unwrap().blocked);
}
