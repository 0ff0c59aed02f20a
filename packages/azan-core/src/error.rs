//! Centralized error types for the Azan core library.
//!
//! This module provides a unified error handling system that:
//! - Defines structured error types using `thiserror`
//! - Maps errors to appropriate HTTP status codes
//! - Implements `IntoResponse` for automatic JSON error responses
//!
//! Collaborator-level errors (location lookup, playback) are handled where they
//! occur and never reach this type. Calculation failures reach it through the
//! scheduler tick when no earlier table can stand in.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::prayer::CalcError;

/// Application-wide error type for the Azan daemon.
#[derive(Debug, Error, Serialize)]
#[serde(tag = "type", content = "details")]
pub enum AzanError {
    /// No time-table has been computed yet.
    #[error("Time-table unavailable: {0}")]
    TimeTableUnavailable(String),

    /// Prayer time computation failed and there is no earlier table to reuse.
    #[error("Time-table computation failed: {0}")]
    Calculation(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid or missing settings).
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl AzanError {
    /// Returns a machine-readable error code for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::TimeTableUnavailable(_) => "time_table_unavailable",
            Self::Calculation(_) => "calculation_failed",
            Self::Internal(_) => "internal_error",
            Self::Configuration(_) => "configuration_error",
        }
    }

    /// Maps the error to an appropriate HTTP status code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::TimeTableUnavailable(_) | Self::Configuration(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Calculation(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Convenient Result alias for application-wide operations.
pub type AzanResult<T> = Result<T, AzanError>;

/// JSON response body for error responses.
#[derive(Serialize)]
struct ErrorResponse {
    error: &'static str,
    message: String,
    status: u16,
}

impl IntoResponse for AzanError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<CalcError> for AzanError {
    fn from(err: CalcError) -> Self {
        Self::Calculation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prayer::PrayerName;

    #[test]
    fn time_table_unavailable_maps_to_503() {
        let err = AzanError::TimeTableUnavailable("first computation pending".into());
        assert_eq!(err.code(), "time_table_unavailable");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn calc_error_converts_with_message() {
        let err: AzanError = CalcError::SunNeverReaches {
            prayer: PrayerName::Isha,
        }
        .into();
        assert_eq!(err.code(), "calculation_failed");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("Isha"));
    }

    #[tokio::test]
    async fn error_response_carries_code_and_status() {
        let response = AzanError::Configuration("players is empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "configuration_error");
        assert_eq!(json["status"], 503);
    }
}
