//! Transfer use case
//!
//! One orchestrated transaction per transfer:
//!
//! 1. lock both account rows, lowest id first
//! 2. insert the transfer row
//! 3. insert the debit entry (-amount) for the source
//! 4. insert the credit entry (+amount) for the destination
//! 5. apply both balance changes and return the updated rows
//!
//! Taking the row locks in a fixed global order (ascending id) is what keeps
//! concurrent A→B and B→A transfers from deadlocking. Any failure aborts the
//! remaining steps and the orchestrator rolls everything back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::{StoreError, TxError};
use super::repository::{LedgerRepository, TxBackend};
use super::state::TransferPhase;
use super::tx::Store;
use crate::core_types::{AccountId, Amount};
use crate::models::{Account, CreateEntryParams, CreateTransferParams, Entry, Transfer};

/// Already-authorized transfer input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Amount,
}

impl TransferRequest {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Amount) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// Checks the core relies on regardless of what the caller validated
    pub fn validate(&self) -> Result<(), StoreError> {
        if self.amount <= 0 {
            return Err(StoreError::InvalidRequest(
                "transfer amount must be positive".into(),
            ));
        }
        if self.from_account_id == self.to_account_id {
            return Err(StoreError::InvalidRequest(
                "source and destination accounts must differ".into(),
            ));
        }
        Ok(())
    }

    /// Both account ids in global lock order
    pub fn lock_order(&self) -> [AccountId; 2] {
        if self.from_account_id < self.to_account_id {
            [self.from_account_id, self.to_account_id]
        } else {
            [self.to_account_id, self.from_account_id]
        }
    }
}

/// Everything a committed transfer wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_account: Account,
    pub to_account: Account,
    pub from_entry: Entry,
    pub to_entry: Entry,
}

impl<B: TxBackend> Store<B> {
    /// Move `req.amount` from one account to another, all or nothing
    pub async fn transfer(&self, req: TransferRequest) -> Result<TransferResult, TxError> {
        let allow_overdraft = self.options().allow_overdraft;

        let outcome = self
            .exec_tx(move |tx| Box::pin(transfer_tx(tx, req, allow_overdraft)))
            .await;

        match &outcome {
            Ok(result) => info!(
                transfer_id = result.transfer.id,
                from = req.from_account_id,
                to = req.to_account_id,
                amount = req.amount,
                phase = %TransferPhase::Committed,
                "Transfer committed"
            ),
            Err(e) => warn!(
                from = req.from_account_id,
                to = req.to_account_id,
                amount = req.amount,
                phase = %TransferPhase::after_error(e),
                error = %e,
                "Transfer aborted"
            ),
        }

        outcome
    }
}

/// Unit of work for one transfer, run against a transaction-scoped repository
async fn transfer_tx<R>(
    repo: &mut R,
    req: TransferRequest,
    allow_overdraft: bool,
) -> Result<TransferResult, StoreError>
where
    R: LedgerRepository + ?Sized,
{
    req.validate()?;
    debug!(from = req.from_account_id, to = req.to_account_id, phase = %TransferPhase::Started);

    let [first, second] = req.lock_order();
    let first = repo.get_account_for_update(first).await?;
    let second = repo.get_account_for_update(second).await?;

    let source = if first.id == req.from_account_id {
        &first
    } else {
        &second
    };
    if !allow_overdraft && source.balance < req.amount {
        return Err(StoreError::InsufficientFunds {
            account_id: source.id,
            balance: source.balance,
            amount: req.amount,
        });
    }

    let transfer = repo
        .create_transfer(CreateTransferParams {
            from_account_id: req.from_account_id,
            to_account_id: req.to_account_id,
            amount: req.amount,
        })
        .await?;

    let from_entry = repo
        .create_entry(CreateEntryParams {
            account_id: req.from_account_id,
            amount: -req.amount,
        })
        .await?;

    let to_entry = repo
        .create_entry(CreateEntryParams {
            account_id: req.to_account_id,
            amount: req.amount,
        })
        .await?;

    debug!(transfer_id = transfer.id, phase = %TransferPhase::RecordsCreated);

    let from_account = repo
        .add_account_balance(req.from_account_id, -req.amount)
        .await?;
    let to_account = repo
        .add_account_balance(req.to_account_id, req.amount)
        .await?;

    debug!(transfer_id = transfer.id, phase = %TransferPhase::BalancesApplied);

    Ok(TransferResult {
        transfer,
        from_account,
        to_account,
        from_entry,
        to_entry,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_direction_independent() {
        assert_eq!(TransferRequest::new(3, 9, 1).lock_order(), [3, 9]);
        assert_eq!(TransferRequest::new(9, 3, 1).lock_order(), [3, 9]);
    }

    #[test]
    fn test_validate_rejects_non_positive_amount() {
        assert!(TransferRequest::new(1, 2, 0).validate().is_err());
        assert!(TransferRequest::new(1, 2, -5).validate().is_err());
        assert!(TransferRequest::new(1, 2, 1).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_same_account() {
        let err = TransferRequest::new(4, 4, 10).validate().unwrap_err();
        assert!(matches!(err, StoreError::InvalidRequest(_)));
    }
}
