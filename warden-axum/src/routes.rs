use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::Duration;
use warden::{AttemptStore, BruteForceProtectionService};

use crate::{
    error::{ApiError, Result},
    types::*,
};

pub struct AdminState<S: AttemptStore> {
    pub service: Arc<BruteForceProtectionService<S>>,
}

impl<S: AttemptStore> Clone for AdminState<S> {
    fn clone(&self) -> Self {
        Self {
            service: self.service.clone(),
        }
    }
}

pub fn create_admin_router<S>(service: Arc<BruteForceProtectionService<S>>) -> Router
where
    S: AttemptStore,
{
    let state = AdminState { service };

    Router::new()
        .route("/health", get(health_handler::<S>))
        .route("/metrics", get(metrics_handler::<S>))
        .route("/identifiers/{identifier}", get(identifier_status_handler::<S>))
        .route(
            "/identifiers/{identifier}/attempts",
            delete(reset_attempts_handler::<S>),
        )
        .route("/addresses/{address}", get(address_status_handler::<S>))
        .route(
            "/addresses/{address}/block",
            post(block_address_handler::<S>).delete(unblock_address_handler::<S>),
        )
        .with_state(state)
}

async fn health_handler<S>(State(state): State<AdminState<S>>) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    state.service.health_check().await?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    }))
}

async fn metrics_handler<S>(State(state): State<AdminState<S>>) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    let metrics = state.service.get_security_metrics().await?;
    Ok(Json(metrics))
}

async fn identifier_status_handler<S>(
    State(state): State<AdminState<S>>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    let status = state.service.get_identifier_status(&identifier).await?;
    Ok(Json(status))
}

async fn reset_attempts_handler<S>(
    State(state): State<AdminState<S>>,
    Path(identifier): Path<String>,
) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    state.service.reset_identifier_attempts(&identifier).await?;

    Ok(Json(MessageResponse {
        message: format!("Login attempts for {identifier} have been reset"),
    }))
}

async fn address_status_handler<S>(
    State(state): State<AdminState<S>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    let status = state.service.get_address_status(&address).await?;
    Ok(Json(status))
}

async fn block_address_handler<S>(
    State(state): State<AdminState<S>>,
    Path(address): Path<String>,
    Json(request): Json<BlockAddressRequest>,
) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    let seconds = i64::try_from(request.duration_secs)
        .ok()
        .and_then(Duration::try_seconds)
        .ok_or_else(|| ApiError::BadRequest("duration_secs is out of range".to_string()))?;

    let record = state
        .service
        .block_address(&address, &request.reason, seconds)
        .await?;

    Ok(Json(BlockAddressResponse {
        address,
        reason: record.reason,
        until: record.until,
    }))
}

async fn unblock_address_handler<S>(
    State(state): State<AdminState<S>>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse>
where
    S: AttemptStore,
{
    let was_blocked = state.service.unblock_address(&address).await?;
    Ok(Json(UnblockAddressResponse {
        address,
        was_blocked,
    }))
}
