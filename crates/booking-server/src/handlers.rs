//! HTTP Handlers

use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
};
use booking_payments::InitiatePayment;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateway: String,
}

#[derive(Debug, Serialize)]
pub struct InitiateResponse {
    pub payment_url: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub message: &'static str,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateway: state.payments.gateway_name().to_string(),
    })
}

/// Create a pending payment and return the gateway checkout URL
pub async fn initiate_payment(
    State(state): State<AppState>,
    payload: Result<Json<InitiatePayment>, JsonRejection>,
) -> ApiResult<Json<InitiateResponse>> {
    let Json(request) = payload.map_err(|e| ApiError::Validation(e.body_text()))?;

    let initiated = state
        .payments
        .initiate(request)
        .await
        .map_err(ApiError::initiation)?;

    Ok(Json(InitiateResponse {
        payment_url: initiated.payment_url,
    }))
}

/// Check the payment with the gateway and record the outcome
pub async fn verify_payment(
    State(state): State<AppState>,
    Path(booking_reference): Path<String>,
) -> ApiResult<Json<VerifyResponse>> {
    let verification = state
        .payments
        .verify(&booking_reference)
        .await
        .map_err(ApiError::verification)?;

    Ok(Json(VerifyResponse {
        message: verification.message(),
    }))
}
