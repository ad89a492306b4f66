//! HTTP error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use snapworth_common::{CurrencyCodeError, MoneyError};
use snapworth_fx::FxError;
use thiserror::Error;

/// Errors surfaced by the HTTP layer.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidCurrency(#[from] CurrencyCodeError),

    #[error("missing or invalid bearer token")]
    Unauthorized,

    #[error(transparent)]
    Fx(#[from] FxError),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCurrency(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Fx(FxError::InvalidCurrency(_)) => StatusCode::BAD_REQUEST,
            ApiError::Fx(FxError::RateUnavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Fx(FxError::AllRatesFailed { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Fx(FxError::AllProvidersFailed { .. }) => StatusCode::BAD_GATEWAY,
            ApiError::Fx(FxError::Money(MoneyError::Overflow(_))) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Fx(FxError::Money(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::InvalidCurrency(_) | ApiError::Fx(FxError::InvalidCurrency(_)) => {
                "INVALID_CURRENCY"
            }
            ApiError::Unauthorized => "UNAUTHORIZED",
            ApiError::Fx(FxError::RateUnavailable(_)) => "RATE_UNAVAILABLE",
            ApiError::Fx(FxError::AllRatesFailed { .. }) => "ALL_RATES_FAILED",
            ApiError::Fx(FxError::AllProvidersFailed { .. }) => "ALL_PROVIDERS_FAILED",
            ApiError::Fx(FxError::Money(MoneyError::Overflow(_))) => "AMOUNT_OVERFLOW",
            ApiError::Fx(FxError::Money(_)) => "INTERNAL",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiErrorResponse {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
