//! API Error Responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use booking_payments::PaymentError;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// API error type
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    #[error("Invalid booking reference")]
    NotFound,

    #[error("A payment already exists for booking {0}")]
    Conflict(String),

    #[error("Failed to initiate payment")]
    InitiationFailed,

    #[error("Failed to verify payment")]
    VerificationFailed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Map an error raised while initiating a payment
    pub fn initiation(err: PaymentError) -> Self {
        match err {
            PaymentError::Gateway(_) | PaymentError::NotInitiated(_) => Self::InitiationFailed,
            other => Self::common(other),
        }
    }

    /// Map an error raised while verifying a payment
    pub fn verification(err: PaymentError) -> Self {
        match err {
            PaymentError::Gateway(_) | PaymentError::NotInitiated(_) => Self::VerificationFailed,
            other => Self::common(other),
        }
    }

    fn common(err: PaymentError) -> Self {
        match err {
            PaymentError::Validation(msg) => Self::Validation(msg),
            PaymentError::NotFound(_) => Self::NotFound,
            PaymentError::DuplicateReference(reference) => Self::Conflict(reference),
            other => Self::Internal(other.to_string()),
        }
    }

    const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::InitiationFailed | Self::VerificationFailed => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    const fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound => "PAYMENT_NOT_FOUND",
            Self::Conflict(_) => "DUPLICATE_BOOKING_REFERENCE",
            Self::InitiationFailed => "INITIATION_FAILED",
            Self::VerificationFailed => "VERIFICATION_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let message = if let Self::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal API error");
            "An error occurred processing your request.".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: message,
            code: self.error_code().to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
