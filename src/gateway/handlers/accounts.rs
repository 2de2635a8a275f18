//! Account handlers

use std::sync::Arc;

use axum::{
    Extension,
    extract::{Path, State},
};
use serde::Deserialize;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ValidatedJson, created, ok};
use crate::core_types::AccountId;
use crate::currency::Currency;
use crate::models::{Account, CreateAccountParams};
use crate::store::TxBackend;
use crate::token::Payload;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateAccountRequest {
    pub currency: Currency,
}

/// Open an account in `currency` for the authenticated user
///
/// POST /api/v1/accounts
pub async fn create_account<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    Extension(auth): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<CreateAccountRequest>,
) -> ApiResult<Account> {
    let account = state
        .store
        .create_account(CreateAccountParams {
            owner: auth.username,
            balance: 0,
            currency: req.currency,
        })
        .await?;
    created(account)
}

/// Read one account; only its owner may see it
///
/// GET /api/v1/accounts/{id}
pub async fn get_account<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    Extension(auth): Extension<Payload>,
    Path(id): Path<AccountId>,
) -> ApiResult<Account> {
    if id < 1 {
        return ApiError::bad_request("account id must be positive").into_err();
    }

    let account = state.store.get_account(id).await?;
    if account.owner != auth.username {
        return ApiError::unauthorized("account doesn't belong to the authenticated user")
            .into_err();
    }
    ok(account)
}
