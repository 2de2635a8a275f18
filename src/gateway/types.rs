//! API Response types and error codes
//!
//! - `ApiResponse<T>`: Unified response wrapper
//! - `ApiError`: handler error, rendered as an `ApiResponse` with an HTTP status
//! - `ValidatedJson<T>`: JSON body extractor that runs `validator` rules
//! - `error_codes`: Standard error code constants

use axum::{
    Json,
    extract::{FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Serialize, de::DeserializeOwned};
use validator::Validate;

use crate::store::{StoreError, TxError};
use crate::token::TokenError;
use crate::user_auth::AuthError;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified API response wrapper
///
/// All API responses follow this structure:
/// - code: 0 = success, non-zero = error code
/// - msg: short message description
/// - data: actual data (success) or null (error)
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub code: i32,
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: error_codes::SUCCESS,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }

    pub fn error(code: i32, msg: impl Into<String>) -> ApiResponse<()> {
        ApiResponse {
            code,
            msg: msg.into(),
            data: None,
        }
    }
}

// ============================================================================
// Handler Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

pub type ApiResult<T> = Result<(StatusCode, Json<ApiResponse<T>>), ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::OK, Json(ApiResponse::success(data))))
}

pub fn created<T>(data: T) -> ApiResult<T> {
    Ok((StatusCode::CREATED, Json(ApiResponse::success(data))))
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::INVALID_PARAMETER, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, error_codes::AUTH_FAILED, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            error_codes::INTERNAL_ERROR,
            msg,
        )
    }

    pub fn into_err<T>(self) -> Result<T, Self> {
        Err(self)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiResponse::<()>::error(self.code, self.msg));
        (self.status, body).into_response()
    }
}

impl From<&StoreError> for ApiError {
    fn from(e: &StoreError) -> Self {
        let status = StatusCode::from_u16(e.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        match e {
            StoreError::NotFound { .. } => Self::new(status, error_codes::NOT_FOUND, e.to_string()),
            StoreError::Duplicate { .. } => {
                Self::new(status, error_codes::DUPLICATE, e.to_string())
            }
            StoreError::InsufficientFunds { .. } => {
                Self::new(status, error_codes::INSUFFICIENT_BALANCE, e.to_string())
            }
            StoreError::InvalidRequest(_) => {
                Self::new(status, error_codes::INVALID_PARAMETER, e.to_string())
            }
            StoreError::Unavailable(_) => Self::new(
                status,
                error_codes::SERVICE_UNAVAILABLE,
                "service unavailable",
            ),
            StoreError::Database(_) => Self::new(status, error_codes::INTERNAL_ERROR, "internal error"),
        }
    }
}

impl From<TxError> for ApiError {
    fn from(e: TxError) -> Self {
        if let Some(cause) = e.rejection() {
            let api = ApiError::from(cause);
            if api.status.is_server_error() {
                tracing::error!(error = %e, code = e.code(), "request failed");
            }
            return api;
        }

        tracing::error!(error = %e, code = e.code(), "transaction failed");
        let status =
            StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let code = if status == StatusCode::SERVICE_UNAVAILABLE {
            error_codes::SERVICE_UNAVAILABLE
        } else {
            error_codes::INTERNAL_ERROR
        };
        Self::new(status, code, e.code())
    }
}

impl From<TokenError> for ApiError {
    fn from(e: TokenError) -> Self {
        match e {
            TokenError::Invalid | TokenError::Expired => ApiError::unauthorized(e.to_string()),
            _ => {
                tracing::error!(error = %e, "token issue failed");
                ApiError::internal("internal error")
            }
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials => ApiError::unauthorized(e.to_string()),
            AuthError::Store(tx) => tx.into(),
            AuthError::Token(token) => token.into(),
            AuthError::Password(p) => {
                tracing::error!(error = %p, "password check failed");
                ApiError::internal("internal error")
            }
        }
    }
}

// ============================================================================
// Validated JSON Body
// ============================================================================

/// JSON body that passed its `validator` rules; any failure is a 400
#[derive(Debug)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value): Json<T> = Json::from_request(req, state)
            .await
            .map_err(|e| ApiError::bad_request(format!("Invalid JSON: {}", e.body_text())))?;

        value
            .validate()
            .map_err(|e| ApiError::bad_request(e.to_string()))?;

        Ok(ValidatedJson(value))
    }
}

// ============================================================================
// Error Codes
// ============================================================================

/// Standard API error codes
pub mod error_codes {
    // Success
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const INVALID_PARAMETER: i32 = 1001;
    pub const INSUFFICIENT_BALANCE: i32 = 1002;
    pub const CURRENCY_MISMATCH: i32 = 1003;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;
    pub const AUTH_FAILED: i32 = 2002;

    // Resource errors (4xxx)
    pub const NOT_FOUND: i32 = 4004;
    pub const DUPLICATE: i32 = 4009;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
    pub const SERVICE_UNAVAILABLE: i32 = 5001;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_step_errors_keep_client_status() {
        let e: ApiError = TxError::StepFailed(StoreError::account_not_found(7)).into();
        assert_eq!(e.status, StatusCode::NOT_FOUND);
        assert_eq!(e.code, error_codes::NOT_FOUND);

        let e: ApiError = TxError::StepFailed(StoreError::InsufficientFunds {
            account_id: 1,
            balance: 5,
            amount: 10,
        })
        .into();
        assert_eq!(e.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(e.code, error_codes::INSUFFICIENT_BALANCE);

        let e: ApiError = TxError::StepFailed(StoreError::Duplicate {
            entity: "user",
            key: "alice".into(),
        })
        .into();
        assert_eq!(e.status, StatusCode::FORBIDDEN);

        // a unique key refused at commit leaves nothing written
        let e: ApiError = TxError::CommitFailed(StoreError::Duplicate {
            entity: "account",
            key: "alice/USD".into(),
        })
        .into();
        assert_eq!(e.status, StatusCode::FORBIDDEN);
        assert_eq!(e.code, error_codes::DUPLICATE);
    }

    #[test]
    fn test_infrastructure_errors_hide_details() {
        let e: ApiError = TxError::CommitFailed(StoreError::Unavailable("db gone".into())).into();
        assert_eq!(e.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(e.msg, "COMMIT_FAILED");

        let e: ApiError = TxError::TimedOut(Duration::from_millis(10)).into();
        assert_eq!(e.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(e.code, error_codes::SERVICE_UNAVAILABLE);

        let e: ApiError = TxError::StepFailed(StoreError::Unavailable("db gone".into())).into();
        assert!(!e.msg.contains("db gone"));
    }

    #[test]
    fn test_auth_errors() {
        let e: ApiError = AuthError::InvalidCredentials.into();
        assert_eq!(e.status, StatusCode::UNAUTHORIZED);

        let e: ApiError = TokenError::Expired.into();
        assert_eq!(e.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_response_envelope() {
        let json = serde_json::to_value(ApiResponse::success(42)).unwrap();
        assert_eq!(json["code"], 0);
        assert_eq!(json["data"], 42);

        let json = serde_json::to_value(ApiResponse::<()>::error(1001, "bad")).unwrap();
        assert_eq!(json["msg"], "bad");
        assert!(json.get("data").is_none());
    }
}
