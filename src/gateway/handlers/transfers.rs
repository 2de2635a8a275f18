//! Transfer handler
//!
//! Caller-side checks run before the transaction opens; the store still
//! re-validates amount and distinct accounts inside it.

use std::sync::Arc;

use axum::{Extension, extract::State, http::StatusCode};
use serde::Deserialize;
use validator::Validate;

use super::super::state::AppState;
use super::super::types::{ApiError, ApiResult, ValidatedJson, created, error_codes};
use crate::core_types::{AccountId, Amount};
use crate::currency::Currency;
use crate::models::Account;
use crate::store::{Store, TransferRequest, TransferResult, TxBackend};
use crate::token::Payload;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransferRequest {
    #[validate(range(min = 1))]
    pub from_account_id: AccountId,
    #[validate(range(min = 1))]
    pub to_account_id: AccountId,
    #[validate(range(min = 1))]
    pub amount: Amount,
    pub currency: Currency,
}

/// Create transfer endpoint
///
/// POST /api/v1/transfers
pub async fn create_transfer<B: TxBackend>(
    State(state): State<Arc<AppState<B>>>,
    Extension(auth): Extension<Payload>,
    ValidatedJson(req): ValidatedJson<CreateTransferRequest>,
) -> ApiResult<TransferResult> {
    let transfer = prepare_transfer(&state.store, &auth.username, &req).await?;
    let result = state.store.transfer(transfer).await?;
    created(result)
}

/// Authorize a transfer request against current account state
///
/// Order: source exists and matches currency, source owned by `username`,
/// destination exists and matches currency.
pub async fn prepare_transfer<B: TxBackend>(
    store: &Store<B>,
    username: &str,
    req: &CreateTransferRequest,
) -> Result<TransferRequest, ApiError> {
    let from = valid_account(store, req.from_account_id, req.currency).await?;
    if from.owner != username {
        return ApiError::unauthorized("from account doesn't belong to the authenticated user")
            .into_err();
    }
    valid_account(store, req.to_account_id, req.currency).await?;

    Ok(TransferRequest::new(
        req.from_account_id,
        req.to_account_id,
        req.amount,
    ))
}

async fn valid_account<B: TxBackend>(
    store: &Store<B>,
    id: AccountId,
    currency: Currency,
) -> Result<Account, ApiError> {
    let account = store.get_account(id).await?;
    if account.currency != currency {
        return ApiError::new(
            StatusCode::BAD_REQUEST,
            error_codes::CURRENCY_MISMATCH,
            format!(
                "account [{}] currency mismatch: {} vs {}",
                id, account.currency, currency
            ),
        )
        .into_err();
    }
    Ok(account)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CreateAccountParams, CreateUserParams};
    use crate::store::MemoryBackend;

    async fn open(store: &Store<MemoryBackend>, owner: &str, currency: Currency) -> Account {
        if store.get_user(owner).await.is_err() {
            store
                .create_user(CreateUserParams {
                    username: owner.into(),
                    hashed_password: "h".into(),
                    full_name: owner.into(),
                    email: format!("{}@example.com", owner),
                })
                .await
                .unwrap();
        }
        store
            .create_account(CreateAccountParams {
                owner: owner.into(),
                balance: 100,
                currency,
            })
            .await
            .unwrap()
    }

    fn req(from: &Account, to: AccountId, currency: Currency) -> CreateTransferRequest {
        CreateTransferRequest {
            from_account_id: from.id,
            to_account_id: to,
            amount: 10,
            currency,
        }
    }

    #[tokio::test]
    async fn test_prepare_ok() {
        let store = Store::new(MemoryBackend::new());
        let from = open(&store, "alice", Currency::Usd).await;
        let to = open(&store, "bob", Currency::Usd).await;

        let t = prepare_transfer(&store, "alice", &req(&from, to.id, Currency::Usd))
            .await
            .unwrap();
        assert_eq!(t, TransferRequest::new(from.id, to.id, 10));
    }

    #[tokio::test]
    async fn test_prepare_rejects_non_owner() {
        let store = Store::new(MemoryBackend::new());
        let from = open(&store, "alice", Currency::Usd).await;
        let to = open(&store, "bob", Currency::Usd).await;

        let err = prepare_transfer(&store, "bob", &req(&from, to.id, Currency::Usd))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_prepare_missing_accounts() {
        let store = Store::new(MemoryBackend::new());
        let from = open(&store, "alice", Currency::Usd).await;

        let err = prepare_transfer(&store, "alice", &req(&from, from.id + 99, Currency::Usd))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);

        let mut missing_from = req(&from, from.id, Currency::Usd);
        missing_from.from_account_id = from.id + 99;
        let err = prepare_transfer(&store, "alice", &missing_from)
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_prepare_currency_mismatch() {
        let store = Store::new(MemoryBackend::new());
        let from = open(&store, "alice", Currency::Usd).await;
        let to = open(&store, "bob", Currency::Eur).await;

        // source side
        let err = prepare_transfer(&store, "alice", &req(&from, to.id, Currency::Eur))
            .await
            .unwrap_err();
        assert_eq!(err.code, error_codes::CURRENCY_MISMATCH);

        // destination side
        let err = prepare_transfer(&store, "alice", &req(&from, to.id, Currency::Usd))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, error_codes::CURRENCY_MISMATCH);
    }

    #[test]
    fn test_body_validation() {
        let bad = CreateTransferRequest {
            from_account_id: 1,
            to_account_id: 2,
            amount: 0,
            currency: Currency::Usd,
        };
        assert!(bad.validate().is_err());
    }
}
