//! Transaction orchestrator
//!
//! [`Store::exec_tx`] runs a unit of work against a repository scoped to one
//! transaction and turns its outcome into commit or rollback. The store
//! itself is stateless between calls; concurrent callers coordinate only
//! through the backend's row locks.

use std::time::Duration;

use futures::future::BoxFuture;
use tracing::{debug, error, warn};

use super::error::{StoreError, TxError};
use super::repository::{LedgerRepository, TxBackend};
use crate::core_types::AccountId;
use crate::models::{Account, CreateAccountParams, CreateUserParams, Entry, Transfer, User};

/// Knobs for orchestrated transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoreOptions {
    /// Let a transfer take the source balance below zero
    pub allow_overdraft: bool,
    /// Upper bound on one orchestrated transaction, begin to commit
    pub tx_timeout: Option<Duration>,
}

/// Entry point to the store: orchestrator plus the composite operations
/// built on it (see `transfer.rs`).
pub struct Store<B: TxBackend> {
    backend: B,
    options: StoreOptions,
}

impl<B: TxBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self::with_options(backend, StoreOptions::default())
    }

    pub fn with_options(backend: B, options: StoreOptions) -> Self {
        Self { backend, options }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> StoreOptions {
        self.options
    }

    /// Run `work` inside a single transaction.
    ///
    /// `work` is called exactly once with a repository bound to the open
    /// transaction. `Ok` commits, `Err` rolls back. Nested calls open an
    /// independent transaction; there is no reentrancy.
    ///
    /// Captured state must be owned (`move`), since the returned future may
    /// borrow only the repository.
    pub async fn exec_tx<T, F>(&self, work: F) -> Result<T, TxError>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut B::Tx) -> BoxFuture<'r, Result<T, StoreError>> + Send,
    {
        match self.options.tx_timeout {
            Some(limit) => match tokio::time::timeout(limit, self.run(work)).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    // the in-flight Tx was dropped with the future: rolled back
                    warn!(timeout_ms = limit.as_millis() as u64, "transaction timed out");
                    Err(TxError::TimedOut(limit))
                }
            },
            None => self.run(work).await,
        }
    }

    async fn run<T, F>(&self, work: F) -> Result<T, TxError>
    where
        T: Send,
        F: for<'r> FnOnce(&'r mut B::Tx) -> BoxFuture<'r, Result<T, StoreError>> + Send,
    {
        let mut tx = self.backend.begin().await.map_err(|e| {
            error!(error = %e, "failed to begin transaction");
            TxError::BeginFailed(e)
        })?;

        match work(&mut tx).await {
            Ok(value) => {
                self.backend.commit(tx).await.map_err(|e| {
                    error!(error = %e, "commit failed");
                    TxError::CommitFailed(e)
                })?;
                Ok(value)
            }
            Err(original) => match self.backend.rollback(tx).await {
                Ok(()) => {
                    debug!(error = %original, "transaction rolled back");
                    Err(TxError::StepFailed(original))
                }
                Err(rollback) => {
                    error!(
                        error = %original,
                        rollback_error = %rollback,
                        "rollback failed"
                    );
                    Err(TxError::RollbackFailed { original, rollback })
                }
            },
        }
    }

    // === Single-statement helpers used by the caller layer ===

    pub async fn create_user(&self, params: CreateUserParams) -> Result<User, TxError> {
        self.exec_tx(move |tx| Box::pin(async move { tx.create_user(params).await }))
            .await
    }

    pub async fn get_user(&self, username: &str) -> Result<User, TxError> {
        let username = username.to_string();
        self.exec_tx(move |tx| Box::pin(async move { tx.get_user(&username).await }))
            .await
    }

    pub async fn create_account(&self, params: CreateAccountParams) -> Result<Account, TxError> {
        self.exec_tx(move |tx| Box::pin(async move { tx.create_account(params).await }))
            .await
    }

    /// Read one account; a missing row is `StepFailed(NotFound)`
    pub async fn get_account(&self, id: AccountId) -> Result<Account, TxError> {
        self.exec_tx(move |tx| Box::pin(async move { tx.get_account(id).await }))
            .await
    }

    pub async fn list_entries(&self, account_id: AccountId) -> Result<Vec<Entry>, TxError> {
        self.exec_tx(move |tx| Box::pin(async move { tx.list_entries(account_id).await }))
            .await
    }

    pub async fn list_transfers(&self, account_id: AccountId) -> Result<Vec<Transfer>, TxError> {
        self.exec_tx(move |tx| Box::pin(async move { tx.list_transfers(account_id).await }))
            .await
    }
}
