use std::{fmt, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::EventError;

/// Kind of security decision being recorded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SecurityEventType {
    /// A login succeeded and the identifier's counters were cleared
    LoginSuccess,
    /// A login failed below every threshold
    LoginFailure,
    /// An identifier was locked out
    AccountLocked,
    /// A client address was blocked, by threshold or by an administrator
    AddressBlocked,
    /// An administrator lifted an address block
    AddressUnblocked,
    /// An administrator cleared an identifier's failures and lockout
    AttemptsReset,
}

impl fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoginSuccess => write!(f, "login_success"),
            Self::LoginFailure => write!(f, "login_failure"),
            Self::AccountLocked => write!(f, "account_locked"),
            Self::AddressBlocked => write!(f, "address_blocked"),
            Self::AddressUnblocked => write!(f, "address_unblocked"),
            Self::AttemptsReset => write!(f, "attempts_reset"),
        }
    }
}

/// Severity of a security event, ordered from least to most severe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Medium => write!(f, "medium"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

/// An audit record of one policy decision or administrative action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub event_type: SecurityEventType,
    pub severity: Severity,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Whether the event denied access
    pub blocked: bool,
}

impl SecurityEvent {
    pub fn new(event_type: SecurityEventType, severity: Severity) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            severity,
            ip_address: None,
            user_agent: None,
            details: serde_json::Value::Null,
            timestamp: Utc::now(),
            blocked: false,
        }
    }

    pub fn with_ip_address(mut self, ip_address: impl Into<String>) -> Self {
        self.ip_address = Some(ip_address.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        let user_agent = user_agent.into();
        if !user_agent.is_empty() {
            self.user_agent = Some(user_agent);
        }
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_blocked(mut self, blocked: bool) -> Self {
        self.blocked = blocked;
        self
    }
}

/// A sink for security events
///
/// The brute force protection service awaits the logger for every decision but
/// never lets a logger error change the decision: errors are reported through
/// `tracing` and dropped.
///
/// # Examples
///
/// ```
/// # use warden_core::{SecurityEvent, SecurityEventLogger, error::EventError};
/// # use async_trait::async_trait;
/// struct MyLogger;
///
/// #[async_trait]
/// impl SecurityEventLogger for MyLogger {
///     async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), EventError> {
///         // Ship the event somewhere...
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait SecurityEventLogger: Send + Sync + 'static {
    async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), EventError>;
}

/// Logger that writes security events as `tracing` events.
///
/// Low severity maps to `DEBUG`, medium to `INFO`, high to `WARN` and critical to `ERROR`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventLogger;

#[async_trait]
impl SecurityEventLogger for TracingEventLogger {
    async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), EventError> {
        let ip_address = event.ip_address.as_deref().unwrap_or("-");
        let user_agent = event.user_agent.as_deref().unwrap_or("-");

        match event.severity {
            Severity::Low => tracing::debug!(
                event_id = %event.id,
                event_type = %event.event_type,
                ip_address,
                user_agent,
                blocked = event.blocked,
                details = %event.details,
                "Security event"
            ),
            Severity::Medium => tracing::info!(
                event_id = %event.id,
                event_type = %event.event_type,
                ip_address,
                user_agent,
                blocked = event.blocked,
                details = %event.details,
                "Security event"
            ),
            Severity::High => tracing::warn!(
                event_id = %event.id,
                event_type = %event.event_type,
                ip_address,
                user_agent,
                blocked = event.blocked,
                details = %event.details,
                "Security event"
            ),
            Severity::Critical => tracing::error!(
                event_id = %event.id,
                event_type = %event.event_type,
                ip_address,
                user_agent,
                blocked = event.blocked,
                details = %event.details,
                "Security event"
            ),
        }

        Ok(())
    }
}

/// Logger that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventLogger;

#[async_trait]
impl SecurityEventLogger for NoopEventLogger {
    async fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// Event bus that fans security events out to several loggers
///
/// Loggers are called in registration order. The first logger error stops the
/// fan-out and is returned.
///
/// # Examples
///
/// ```
/// # use std::sync::Arc;
/// # use warden_core::{EventBus, NoopEventLogger, TracingEventLogger};
/// # async fn example() {
/// let event_bus = EventBus::default();
/// event_bus.register(Arc::new(TracingEventLogger)).await;
/// event_bus.register(Arc::new(NoopEventLogger)).await;
/// # }
/// ```
#[derive(Clone)]
pub struct EventBus {
    handlers: Arc<RwLock<Vec<Arc<dyn SecurityEventLogger>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self {
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a logger with the event bus
    pub async fn register(&self, handler: Arc<dyn SecurityEventLogger>) {
        self.handlers.write().await.push(handler);
    }

    /// Number of registered loggers
    pub async fn len(&self) -> usize {
        self.handlers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.handlers.read().await.is_empty()
    }

    /// Emit an event to all registered loggers
    pub async fn emit(&self, event: &SecurityEvent) -> Result<(), EventError> {
        for handler in self.handlers.read().await.iter() {
            handler.log_security_event(event).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl SecurityEventLogger for EventBus {
    async fn log_security_event(&self, event: &SecurityEvent) -> Result<(), EventError> {
        self.emit(event).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLogger {
        call_count: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecurityEventLogger for CountingLogger {
        async fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), EventError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct ErroringLogger;

    #[async_trait]
    impl SecurityEventLogger for ErroringLogger {
        async fn log_security_event(&self, _event: &SecurityEvent) -> Result<(), EventError> {
            Err(EventError::HandlerError("sink offline".into()))
        }
    }

    fn sample_event() -> SecurityEvent {
        SecurityEvent::new(SecurityEventType::LoginFailure, Severity::Medium)
            .with_ip_address("1.2.3.4")
            .with_user_agent("curl/8.0")
            .with_details(serde_json::json!({ "identifier": "a@b.com", "failed_attempts": 1 }))
    }

    #[tokio::test]
    async fn test_event_bus_empty() {
        let event_bus = EventBus::default();
        assert!(event_bus.is_empty().await);
        event_bus
            .emit(&sample_event())
            .await
            .expect("Failed to emit event");
    }

    #[tokio::test]
    async fn test_event_bus_multiple_handlers() {
        let event_bus = EventBus::default();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        event_bus
            .register(Arc::new(CountingLogger {
                call_count: count1.clone(),
            }))
            .await;
        event_bus
            .register(Arc::new(CountingLogger {
                call_count: count2.clone(),
            }))
            .await;
        assert_eq!(event_bus.len().await, 2);

        event_bus
            .log_security_event(&sample_event())
            .await
            .expect("Failed to emit event");

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_event_bus_error_propagation() {
        let event_bus = EventBus::default();
        let count = Arc::new(AtomicUsize::new(0));
        event_bus.register(Arc::new(ErroringLogger)).await;
        event_bus
            .register(Arc::new(CountingLogger {
                call_count: count.clone(),
            }))
            .await;

        let result = event_bus.emit(&sample_event()).await;
        assert!(matches!(result, Err(EventError::HandlerError(_))));
        // Fan-out stops at the first failing logger
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_tracing_logger_accepts_all_severities() {
        let logger = TracingEventLogger;
        for severity in [
            Severity::Low,
            Severity::Medium,
            Severity::High,
            Severity::Critical,
        ] {
            let event = SecurityEvent::new(SecurityEventType::AddressBlocked, severity);
            logger.log_security_event(&event).await.unwrap();
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = sample_event().with_blocked(true);
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["type"], "login_failure");
        assert_eq!(value["severity"], "medium");
        assert_eq!(value["ip_address"], "1.2.3.4");
        assert_eq!(value["user_agent"], "curl/8.0");
        assert_eq!(value["blocked"], true);
        assert_eq!(value["details"]["identifier"], "a@b.com");
    }

    #[test]
    fn test_empty_user_agent_is_dropped() {
        let event = SecurityEvent::new(SecurityEventType::LoginSuccess, Severity::Low)
            .with_user_agent("");
        assert!(event.user_agent.is_none());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Low < Severity::Medium);
        assert!(Severity::High < Severity::Critical);
    }
}
