//! HTTP routes.

use axum::extract::{Query, State};
use axum::http::HeaderMap;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use snapworth_common::Currency;
use snapworth_fx::{MetricsSnapshot, ProviderStatus, RateSource, RefreshReport};
use tracing::{info, warn};

use crate::auth::verify_bearer;
use crate::error::ApiError;
use crate::state::{AppState, ServiceHealth};

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/rates", get(get_rate))
        .route("/api/rates/providers", get(providers))
        .route("/metrics", get(metrics))
        .route("/api/cron/refresh-rates", post(refresh_rates))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: ServiceHealth,
    pub providers_available: usize,
    pub providers_total: usize,
    pub uptime_secs: i64,
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let providers = state.resolver.aggregator().provider_status();
    Json(HealthResponse {
        status: ServiceHealth::from_providers(&providers),
        providers_available: providers.iter().filter(|p| p.available).count(),
        providers_total: providers.len(),
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Debug, Deserialize)]
pub struct RateQuery {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RateResponse {
    pub from: Currency,
    pub to: Currency,
    pub rate: Decimal,
    pub source: RateSource,
}

async fn get_rate(
    State(state): State<AppState>,
    Query(query): Query<RateQuery>,
) -> Result<Json<RateResponse>, ApiError> {
    let from = Currency::parse(&query.from)?;
    let to = Currency::parse(&query.to)?;

    let resolved = state.resolver.resolve(&from, &to).await?;

    Ok(Json(RateResponse {
        from,
        to,
        rate: resolved.rate,
        source: resolved.source,
    }))
}

async fn providers(State(state): State<AppState>) -> Json<Vec<ProviderStatus>> {
    Json(state.resolver.aggregator().provider_status())
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.resolver.metrics().snapshot())
}

async fn refresh_rates(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<RefreshReport>, ApiError> {
    let authorized = state
        .cron_secret
        .as_deref()
        .is_some_and(|secret| verify_bearer(&headers, secret));
    if !authorized {
        warn!("Rejected refresh trigger");
        return Err(ApiError::Unauthorized);
    }

    info!("Refresh triggered over HTTP");
    let report = state.refresh.run().await?;
    Ok(Json(report))
}
