use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode, header},
    middleware::Next,
    response::Response,
};
use warden::{AttemptStore, BruteForceProtectionService, LoginDecision};

use crate::{error::ApiError, types::ConnectionInfo};

/// Largest login body the guard buffers.
const MAX_BODY_BYTES: usize = 64 * 1024;

pub const ATTEMPTS_REMAINING_HEADER: HeaderName =
    HeaderName::from_static("x-login-attempts-remaining");
pub const CAPTCHA_REQUIRED_HEADER: HeaderName = HeaderName::from_static("x-captcha-required");

/// Middleware state guarding a login route.
///
/// The guard reads the identifier from a field of the JSON request body, then:
///
/// 1. Refuses the request with 429 if the client address is blocked
/// 2. Refuses the request with 423 if the identifier is locked out
/// 3. Runs the login handler
/// 4. Reports a 401 response as a failed attempt and a 2xx response as a
///    successful one, attaching `x-login-attempts-remaining` and
///    `x-captcha-required` headers. If that attempt triggers a lockout or block,
///    the handler's response is replaced by the refusal.
///
/// Requests that are not JSON, or whose body lacks the identifier field, pass
/// through untouched.
///
/// The client address is the peer address from `ConnectInfo`. Behind a reverse
/// proxy that sets `X-Forwarded-For`, enable
/// [`trust_forwarded_for`](Self::trust_forwarded_for) so the first entry of that
/// header is used instead. Never enable it when clients can reach the service
/// directly: they could then pick the address their failures are counted against.
///
/// # Example
///
/// ```rust,ignore
/// use warden_axum::{LoginGuard, login_guard};
///
/// let guard = LoginGuard::new(warden.clone(), "email");
///
/// let app = Router::new()
///     .route("/login", post(login_handler))
///     .route_layer(axum::middleware::from_fn_with_state(guard, login_guard::<MemoryAttemptStore>));
/// ```
pub struct LoginGuard<S: AttemptStore> {
    service: Arc<BruteForceProtectionService<S>>,
    identifier_field: String,
    trust_forwarded_for: bool,
}

impl<S: AttemptStore> Clone for LoginGuard<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
            identifier_field: self.identifier_field.clone(),
            trust_forwarded_for: self.trust_forwarded_for,
        }
    }
}

impl<S: AttemptStore> LoginGuard<S> {
    /// `identifier_field` is the JSON field naming the account, e.g. `"email"`.
    pub fn new(service: Arc<BruteForceProtectionService<S>>, identifier_field: &str) -> Self {
        Self {
            service,
            identifier_field: identifier_field.to_string(),
            trust_forwarded_for: false,
        }
    }

    /// Take the client address from `X-Forwarded-For`. Off by default.
    pub fn trust_forwarded_for(mut self, trust: bool) -> Self {
        self.trust_forwarded_for = trust;
        self
    }
}

pub async fn login_guard<S>(
    State(guard): State<LoginGuard<S>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError>
where
    S: AttemptStore,
{
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    if !is_json {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| ApiError::BadRequest(format!("Failed to read request body: {e}")))?;

    let identifier = serde_json::from_slice::<serde_json::Value>(&bytes)
        .ok()
        .and_then(|v| v.get(&guard.identifier_field).cloned())
        .and_then(|v| v.as_str().map(|s| s.to_string()));

    let Some(identifier) = identifier else {
        tracing::debug!(
            field = %guard.identifier_field,
            "Login request without identifier, skipping protection"
        );
        let request = Request::from_parts(parts, Body::from(bytes));
        return Ok(next.run(request).await);
    };

    let connection = ConnectionInfo::from_parts(&mut parts, guard.trust_forwarded_for)
        .await
        .map_err(|(_, message)| ApiError::BadRequest(message.to_string()))?;
    let address = connection.address();
    let user_agent = connection.user_agent();

    if let Some(decision) = guard.service.check_attempt(&identifier, address).await? {
        return Err(ApiError::from_denied(&decision));
    }

    let request = Request::from_parts(parts, Body::from(bytes));
    let mut response = next.run(request).await;

    let succeeded = match response.status() {
        StatusCode::UNAUTHORIZED => false,
        status if status.is_success() => true,
        _ => return Ok(response),
    };

    let decision = guard
        .service
        .evaluate_login_attempt(&identifier, address, user_agent, succeeded)
        .await?;

    if !decision.allowed {
        return Err(ApiError::from_denied(&decision));
    }

    apply_decision_headers(&mut response, &decision);
    Ok(response)
}

fn apply_decision_headers(response: &mut Response, decision: &LoginDecision) {
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&decision.remaining_attempts.to_string()) {
        headers.insert(ATTEMPTS_REMAINING_HEADER, value);
    }
    headers.insert(
        CAPTCHA_REQUIRED_HEADER,
        HeaderValue::from_static(if decision.requires_captcha {
            "true"
        } else {
            "false"
        }),
    );
}
