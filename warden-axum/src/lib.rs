//! # Warden Axum Integration
//!
//! This crate connects the warden login protection service to Axum
//! applications.
//!
//! ## Features
//!
//! - **Login guard**: middleware for a login route that refuses blocked addresses
//!   and locked accounts, and records every credential check
//! - **Admin routes**: status, metrics, and manual overrides for operators
//! - **Connection info**: extractor for the client address and user agent
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use axum::{Router, routing::post, http::StatusCode};
//! use warden::{MemoryAttemptStore, WardenBuilder};
//! use warden_axum::{LoginGuard, admin_routes, login_guard};
//!
//! #[tokio::main]
//! async fn main() {
//!     let warden = Arc::new(
//!         WardenBuilder::new()
//!             .with_memory_store()
//!             .build()
//!             .await
//!             .unwrap(),
//!     );
//!
//!     let guard = LoginGuard::new(warden.clone(), "email");
//!
//!     let app = Router::new()
//!         .route("/login", post(login_handler))
//!         .route_layer(axum::middleware::from_fn_with_state(guard, login_guard::<MemoryAttemptStore>))
//!         .nest("/admin/security", admin_routes(warden));
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(
//!         listener,
//!         app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
//!     )
//!     .await
//!     .unwrap();
//! }
//!
//! async fn login_handler() -> StatusCode {
//!     // Verify the credentials; answer 401 on failure
//!     StatusCode::UNAUTHORIZED
//! }
//! ```
//!
//! The admin routes carry no authentication of their own. Mount them behind
//! whatever protects your operator endpoints.

mod error;
mod extractors;
mod middleware;
mod routes;
mod types;

pub use error::{ApiError, Result};
pub use middleware::{ATTEMPTS_REMAINING_HEADER, CAPTCHA_REQUIRED_HEADER, LoginGuard, login_guard};
pub use routes::{AdminState, create_admin_router};
pub use types::{
    BlockAddressRequest, BlockAddressResponse, ConnectionInfo, HealthResponse, MessageResponse,
    UnblockAddressResponse,
};

use axum::Router;
use std::sync::Arc;
use warden::{AttemptStore, BruteForceProtectionService};

/// Create the security admin routes.
///
/// | Method | Path | Operation |
/// |---|---|---|
/// | `GET` | `/health` | Store health check |
/// | `GET` | `/metrics` | Counts of blocks, lockouts and failure counters |
/// | `GET` | `/identifiers/{identifier}` | Identifier status |
/// | `DELETE` | `/identifiers/{identifier}/attempts` | Clear failures and lockout |
/// | `GET` | `/addresses/{address}` | Address status |
/// | `POST` | `/addresses/{address}/block` | Block an address (`{reason, duration_secs}`) |
/// | `DELETE` | `/addresses/{address}/block` | Lift a block |
///
/// # Example
///
/// ```rust,ignore
/// let app = Router::new().nest("/admin/security", warden_axum::admin_routes(warden));
/// ```
pub fn admin_routes<S>(service: Arc<BruteForceProtectionService<S>>) -> Router
where
    S: AttemptStore,
{
    create_admin_router(service)
}
