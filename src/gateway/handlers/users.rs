//! User registration and login handlers

use std::sync::Arc;

use axum::extract::State;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use super::super::state::AppState;
use super::super::types::{ApiResult, ValidatedJson, created, ok};
use crate::models::User;
use crate::store::TxBackend;
use crate::user_auth::{LoginResponse, RegisterUser};

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(length(min = 3, max = 64), custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 128))]
    pub full_name: String,
    #[validate(email)]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginUserRequest {
    #[validate(length(min = 3, max = 64), custom(function = "validate_username"))]
    pub username: String,
    #[validate(length(min = 6, max = 128))]
    pub password: String,
}

/// Lowercase letters, digits and underscore only
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let valid = username
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("username_charset"))
    }
}

/// Register a new user
///
/// POST /api/v1/users
pub async fn create_user<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> ApiResult<User> {
    let user = state
        .users
        .register(RegisterUser {
            username: req.username,
            password: req.password,
            full_name: req.full_name,
            email: req.email,
        })
        .await?;
    created(user)
}

/// Login user and issue an access token
///
/// POST /api/v1/users/login
pub async fn login_user<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    ValidatedJson(req): ValidatedJson<LoginUserRequest>,
) -> ApiResult<LoginResponse> {
    let resp = state.users.login(&req.username, &req.password).await?;
    ok(resp)
}
