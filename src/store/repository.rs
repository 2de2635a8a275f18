//! Record repository and transaction backend seams
//!
//! A [`TxBackend`] hands out open transactions. Each transaction is itself a
//! [`LedgerRepository`]: every statement issued through it runs on that
//! transaction's connection and nowhere else.

use async_trait::async_trait;

use super::error::StoreError;
use crate::core_types::{AccountId, Amount};
use crate::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, Transfer, User,
};

/// Single-row CRUD statements. No cross-statement guarantees on its own.
#[async_trait]
pub trait LedgerRepository: Send {
    async fn create_user(&mut self, params: CreateUserParams) -> Result<User, StoreError>;

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError>;

    async fn create_account(&mut self, params: CreateAccountParams)
    -> Result<Account, StoreError>;

    /// Plain read, no lock taken
    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// Read and hold an exclusive row lock until the transaction ends.
    ///
    /// The lock must not conflict with the key-share locks taken by foreign
    /// key checks when entries/transfers referencing the row are inserted.
    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError>;

    /// `balance = balance + delta`, returning the updated row.
    ///
    /// Writes no entry. Only the transfer unit of work calls this, paired
    /// with the entries it records; anything else would leave the balance
    /// out of step with the ledger.
    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Amount,
    ) -> Result<Account, StoreError>;

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError>;

    /// Entries of one account, oldest first
    async fn list_entries(&mut self, account_id: AccountId) -> Result<Vec<Entry>, StoreError>;

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError>;

    /// Transfers where the account is source or destination, oldest first
    async fn list_transfers(&mut self, account_id: AccountId)
    -> Result<Vec<Transfer>, StoreError>;
}

/// Source of transactions. Implementations hold the shared pool.
///
/// Dropping a `Tx` without calling `commit` or `rollback` must roll it back.
#[async_trait]
pub trait TxBackend: Send + Sync + 'static {
    type Tx: LedgerRepository + Send + 'static;

    /// Acquire a connection and begin a transaction on it
    async fn begin(&self) -> Result<Self::Tx, StoreError>;

    async fn commit(&self, tx: Self::Tx) -> Result<(), StoreError>;

    async fn rollback(&self, tx: Self::Tx) -> Result<(), StoreError>;
}
