//! In-memory backend
//!
//! Models the parts of PostgreSQL the transfer path relies on:
//! - writes are staged per transaction and published atomically on commit
//! - `get_account_for_update` and `add_account_balance` take an exclusive
//!   per-row lock held until commit/rollback/drop (so a bad lock order
//!   deadlocks here exactly as it would in the database)
//! - ids come from shared sequences that are not rolled back
//! - unique keys are checked again at commit, so the later of two
//!   concurrent inserts of one key is refused
//!
//! Fault injection ([`FailPoint`], `fail_begin`/`fail_commit`/`fail_rollback`)
//! lets tests break a transaction at any statement.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};
use tracing::debug;

use super::error::StoreError;
use super::repository::{LedgerRepository, TxBackend};
use crate::core_types::{AccountId, Amount};
use crate::models::{
    Account, CreateAccountParams, CreateEntryParams, CreateTransferParams, CreateUserParams,
    Entry, Transfer, User,
};

/// Repository operation, used to address fault injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoOp {
    CreateUser,
    GetUser,
    CreateAccount,
    GetAccount,
    LockAccount,
    AddAccountBalance,
    CreateEntry,
    ListEntries,
    CreateTransfer,
    ListTransfers,
}

/// Fail the `occurrence`-th call (1-based) of `op` within a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailPoint {
    pub op: RepoOp,
    pub occurrence: usize,
}

impl FailPoint {
    pub fn new(op: RepoOp, occurrence: usize) -> Self {
        Self { op, occurrence }
    }
}

/// Committed rows, cloned out for inspection
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshot {
    pub users: Vec<User>,
    pub accounts: Vec<Account>,
    pub entries: Vec<Entry>,
    pub transfers: Vec<Transfer>,
}

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    accounts: BTreeMap<AccountId, Account>,
    entries: Vec<Entry>,
    transfers: Vec<Transfer>,
    account_seq: i64,
    entry_seq: i64,
    transfer_seq: i64,
}

#[derive(Default)]
struct Faults {
    fail_point: Option<FailPoint>,
    fail_begin: bool,
    fail_commit: bool,
    fail_rollback: bool,
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<AccountId, Arc<RowLock<()>>>>,
    faults: Mutex<Faults>,
}

impl Shared {
    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn faults(&self) -> MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn row_lock(&self, id: AccountId) -> Arc<RowLock<()>> {
        let mut locks = self.row_locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(id).or_default().clone()
    }
}

/// Process-local store with the same transactional contract as [`super::PgBackend`]
#[derive(Clone, Default)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or clear) a statement failure for transactions begun afterwards
    pub fn set_fail_point(&self, fail_point: Option<FailPoint>) {
        self.shared.faults().fail_point = fail_point;
    }

    pub fn fail_begin(&self, enabled: bool) {
        self.shared.faults().fail_begin = enabled;
    }

    pub fn fail_commit(&self, enabled: bool) {
        self.shared.faults().fail_commit = enabled;
    }

    pub fn fail_rollback(&self, enabled: bool) {
        self.shared.faults().fail_rollback = enabled;
    }

    pub fn snapshot(&self) -> MemorySnapshot {
        let tables = self.shared.tables();
        MemorySnapshot {
            users: tables.users.values().cloned().collect(),
            accounts: tables.accounts.values().cloned().collect(),
            entries: tables.entries.clone(),
            transfers: tables.transfers.clone(),
        }
    }
}

#[async_trait]
impl TxBackend for MemoryBackend {
    type Tx = MemoryTx;

    async fn begin(&self) -> Result<MemoryTx, StoreError> {
        let fail_point = {
            let faults = self.shared.faults();
            if faults.fail_begin {
                return Err(StoreError::Unavailable("injected begin failure".into()));
            }
            faults.fail_point
        };

        Ok(MemoryTx {
            shared: self.shared.clone(),
            fail_point,
            calls: HashMap::new(),
            locks: BTreeMap::new(),
            balance_deltas: BTreeMap::new(),
            new_users: Vec::new(),
            new_accounts: Vec::new(),
            new_entries: Vec::new(),
            new_transfers: Vec::new(),
        })
    }

    async fn commit(&self, tx: MemoryTx) -> Result<(), StoreError> {
        if self.shared.faults().fail_commit {
            return Err(StoreError::Unavailable("injected commit failure".into()));
        }

        {
            let mut tables = self.shared.tables();
            // another transaction may have published the same key since ours was staged
            tx.check_unique(&tables)?;
            for user in tx.new_users.iter().cloned() {
                tables.users.insert(user.username.clone(), user);
            }
            for account in tx.new_accounts.iter().cloned() {
                tables.accounts.insert(account.id, account);
            }
            for (id, delta) in &tx.balance_deltas {
                if let Some(account) = tables.accounts.get_mut(id) {
                    account.balance += delta;
                }
            }
            tables.entries.extend(tx.new_entries.iter().cloned());
            tables.transfers.extend(tx.new_transfers.iter().cloned());
        }

        debug!(
            entries = tx.new_entries.len(),
            transfers = tx.new_transfers.len(),
            "memory tx committed"
        );
        // row locks are released when `tx` drops here
        Ok(())
    }

    async fn rollback(&self, tx: MemoryTx) -> Result<(), StoreError> {
        drop(tx);
        if self.shared.faults().fail_rollback {
            return Err(StoreError::Unavailable("injected rollback failure".into()));
        }
        Ok(())
    }
}

/// Open in-memory transaction: staged writes plus held row locks
pub struct MemoryTx {
    shared: Arc<Shared>,
    fail_point: Option<FailPoint>,
    calls: HashMap<RepoOp, usize>,
    locks: BTreeMap<AccountId, OwnedMutexGuard<()>>,
    balance_deltas: BTreeMap<AccountId, Amount>,
    new_users: Vec<User>,
    new_accounts: Vec<Account>,
    new_entries: Vec<Entry>,
    new_transfers: Vec<Transfer>,
}

impl MemoryTx {
    fn check_fault(&mut self, op: RepoOp) -> Result<(), StoreError> {
        let count = self.calls.entry(op).or_insert(0);
        *count += 1;
        match self.fail_point {
            Some(fp) if fp.op == op && fp.occurrence == *count => Err(StoreError::Unavailable(
                format!("injected failure at {:?} #{}", op, count),
            )),
            _ => Ok(()),
        }
    }

    /// Account as seen by this transaction: committed row or own insert,
    /// plus own staged balance delta
    fn visible_account(&self, id: AccountId) -> Option<Account> {
        let base = self
            .new_accounts
            .iter()
            .find(|a| a.id == id)
            .cloned()
            .or_else(|| self.shared.tables().accounts.get(&id).cloned());

        base.map(|mut account| {
            account.balance += self.balance_deltas.get(&id).copied().unwrap_or(0);
            account
        })
    }

    /// Staged users and accounts against committed unique keys
    fn check_unique(&self, tables: &Tables) -> Result<(), StoreError> {
        for user in &self.new_users {
            if tables.users.contains_key(&user.username) {
                return Err(StoreError::Duplicate {
                    entity: "user",
                    key: user.username.clone(),
                });
            }
            if tables.users.values().any(|u| u.email == user.email) {
                return Err(StoreError::Duplicate {
                    entity: "user",
                    key: user.email.clone(),
                });
            }
        }
        for account in &self.new_accounts {
            let taken = tables
                .accounts
                .values()
                .any(|a| a.owner == account.owner && a.currency == account.currency);
            if taken {
                return Err(StoreError::Duplicate {
                    entity: "account",
                    key: format!("{}/{}", account.owner, account.currency),
                });
            }
        }
        Ok(())
    }

    fn account_exists(&self, id: AccountId) -> bool {
        self.new_accounts.iter().any(|a| a.id == id)
            || self.shared.tables().accounts.contains_key(&id)
    }

    fn user_exists(&self, username: &str) -> bool {
        self.new_users.iter().any(|u| u.username == username)
            || self.shared.tables().users.contains_key(username)
    }

    async fn lock_row(&mut self, id: AccountId) {
        if self.locks.contains_key(&id) {
            return;
        }
        let lock = self.shared.row_lock(id);
        let guard = lock.lock_owned().await;
        self.locks.insert(id, guard);
    }
}

#[async_trait]
impl LedgerRepository for MemoryTx {
    async fn create_user(&mut self, params: CreateUserParams) -> Result<User, StoreError> {
        self.check_fault(RepoOp::CreateUser)?;
        if self.user_exists(&params.username) {
            return Err(StoreError::Duplicate {
                entity: "user",
                key: params.username,
            });
        }
        let email_taken = self.new_users.iter().any(|u| u.email == params.email)
            || self
                .shared
                .tables()
                .users
                .values()
                .any(|u| u.email == params.email);
        if email_taken {
            return Err(StoreError::Duplicate {
                entity: "user",
                key: params.email,
            });
        }

        let now = Utc::now();
        let user = User {
            username: params.username,
            hashed_password: params.hashed_password,
            full_name: params.full_name,
            email: params.email,
            password_changed_at: chrono::DateTime::<Utc>::MIN_UTC,
            created_at: now,
        };
        self.new_users.push(user.clone());
        Ok(user)
    }

    async fn get_user(&mut self, username: &str) -> Result<User, StoreError> {
        self.check_fault(RepoOp::GetUser)?;
        self.new_users
            .iter()
            .find(|u| u.username == username)
            .cloned()
            .or_else(|| self.shared.tables().users.get(username).cloned())
            .ok_or_else(|| StoreError::user_not_found(username))
    }

    async fn create_account(
        &mut self,
        params: CreateAccountParams,
    ) -> Result<Account, StoreError> {
        self.check_fault(RepoOp::CreateAccount)?;
        if !self.user_exists(&params.owner) {
            return Err(StoreError::InvalidRequest(format!(
                "owner {} does not exist",
                params.owner
            )));
        }
        let duplicate = self
            .new_accounts
            .iter()
            .chain(self.shared.tables().accounts.values())
            .any(|a| a.owner == params.owner && a.currency == params.currency);
        if duplicate {
            return Err(StoreError::Duplicate {
                entity: "account",
                key: format!("{}/{}", params.owner, params.currency),
            });
        }

        let id = {
            let mut tables = self.shared.tables();
            tables.account_seq += 1;
            tables.account_seq
        };
        let account = Account {
            id,
            owner: params.owner,
            balance: params.balance,
            currency: params.currency,
            created_at: Utc::now(),
        };
        self.new_accounts.push(account.clone());
        Ok(account)
    }

    async fn get_account(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.check_fault(RepoOp::GetAccount)?;
        self.visible_account(id)
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn get_account_for_update(&mut self, id: AccountId) -> Result<Account, StoreError> {
        self.check_fault(RepoOp::LockAccount)?;
        if !self.account_exists(id) {
            return Err(StoreError::account_not_found(id));
        }
        self.lock_row(id).await;
        self.visible_account(id)
            .ok_or_else(|| StoreError::account_not_found(id))
    }

    async fn add_account_balance(
        &mut self,
        id: AccountId,
        delta: Amount,
    ) -> Result<Account, StoreError> {
        self.check_fault(RepoOp::AddAccountBalance)?;
        if !self.account_exists(id) {
            return Err(StoreError::account_not_found(id));
        }
        // UPDATE locks the row implicitly
        self.lock_row(id).await;

        let mut account = self
            .visible_account(id)
            .ok_or_else(|| StoreError::account_not_found(id))?;
        account.balance = account
            .balance
            .checked_add(delta)
            .ok_or_else(|| StoreError::InvalidRequest(format!("balance overflow on {}", id)))?;
        *self.balance_deltas.entry(id).or_insert(0) += delta;
        Ok(account)
    }

    async fn create_entry(&mut self, params: CreateEntryParams) -> Result<Entry, StoreError> {
        self.check_fault(RepoOp::CreateEntry)?;
        if !self.account_exists(params.account_id) {
            return Err(StoreError::account_not_found(params.account_id));
        }

        let id = {
            let mut tables = self.shared.tables();
            tables.entry_seq += 1;
            tables.entry_seq
        };
        let entry = Entry {
            id,
            account_id: params.account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.new_entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_entries(&mut self, account_id: AccountId) -> Result<Vec<Entry>, StoreError> {
        self.check_fault(RepoOp::ListEntries)?;
        let mut entries: Vec<Entry> = self
            .shared
            .tables()
            .entries
            .iter()
            .chain(self.new_entries.iter())
            .filter(|e| e.account_id == account_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.id);
        Ok(entries)
    }

    async fn create_transfer(
        &mut self,
        params: CreateTransferParams,
    ) -> Result<Transfer, StoreError> {
        self.check_fault(RepoOp::CreateTransfer)?;
        if params.amount <= 0 {
            return Err(StoreError::InvalidRequest(
                "transfer amount must be positive".into(),
            ));
        }
        for id in [params.from_account_id, params.to_account_id] {
            if !self.account_exists(id) {
                return Err(StoreError::account_not_found(id));
            }
        }

        let id = {
            let mut tables = self.shared.tables();
            tables.transfer_seq += 1;
            tables.transfer_seq
        };
        let transfer = Transfer {
            id,
            from_account_id: params.from_account_id,
            to_account_id: params.to_account_id,
            amount: params.amount,
            created_at: Utc::now(),
        };
        self.new_transfers.push(transfer.clone());
        Ok(transfer)
    }

    async fn list_transfers(
        &mut self,
        account_id: AccountId,
    ) -> Result<Vec<Transfer>, StoreError> {
        self.check_fault(RepoOp::ListTransfers)?;
        let mut transfers: Vec<Transfer> = self
            .shared
            .tables()
            .transfers
            .iter()
            .chain(self.new_transfers.iter())
            .filter(|t| t.from_account_id == account_id || t.to_account_id == account_id)
            .cloned()
            .collect();
        transfers.sort_by_key(|t| t.id);
        Ok(transfers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;

    async fn seed(backend: &MemoryBackend) -> (Account, Account) {
        let mut tx = backend.begin().await.unwrap();
        tx.create_user(CreateUserParams {
            username: "alice".into(),
            hashed_password: "x".into(),
            full_name: "Alice".into(),
            email: "alice@example.com".into(),
        })
        .await
        .unwrap();
        let usd = tx
            .create_account(CreateAccountParams {
                owner: "alice".into(),
                balance: 100,
                currency: Currency::Usd,
            })
            .await
            .unwrap();
        let eur = tx
            .create_account(CreateAccountParams {
                owner: "alice".into(),
                balance: 50,
                currency: Currency::Eur,
            })
            .await
            .unwrap();
        backend.commit(tx).await.unwrap();
        (usd, eur)
    }

    #[tokio::test]
    async fn test_staged_writes_invisible_until_commit() {
        let backend = MemoryBackend::new();
        let (usd, _) = seed(&backend).await;

        let mut writer = backend.begin().await.unwrap();
        let updated = writer.add_account_balance(usd.id, 25).await.unwrap();
        assert_eq!(updated.balance, 125);

        let mut reader = backend.begin().await.unwrap();
        assert_eq!(reader.get_account(usd.id).await.unwrap().balance, 100);

        backend.commit(writer).await.unwrap();
        assert_eq!(reader.get_account(usd.id).await.unwrap().balance, 125);
    }

    #[tokio::test]
    async fn test_dropped_tx_discards_writes_and_releases_lock() {
        let backend = MemoryBackend::new();
        let (usd, _) = seed(&backend).await;

        {
            let mut tx = backend.begin().await.unwrap();
            tx.get_account_for_update(usd.id).await.unwrap();
            tx.add_account_balance(usd.id, -40).await.unwrap();
        }

        let mut tx = backend.begin().await.unwrap();
        let account = tokio::time::timeout(
            std::time::Duration::from_secs(1),
            tx.get_account_for_update(usd.id),
        )
        .await
        .expect("row lock should be free")
        .unwrap();
        assert_eq!(account.balance, 100);
    }

    #[tokio::test]
    async fn test_fail_point_hits_nth_call() {
        let backend = MemoryBackend::new();
        let (usd, eur) = seed(&backend).await;
        backend.set_fail_point(Some(FailPoint::new(RepoOp::CreateEntry, 2)));

        let mut tx = backend.begin().await.unwrap();
        assert!(
            tx.create_entry(CreateEntryParams {
                account_id: usd.id,
                amount: -1
            })
            .await
            .is_ok()
        );
        let err = tx
            .create_entry(CreateEntryParams {
                account_id: eur.id,
                amount: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_duplicate_owner_currency_rejected() {
        let backend = MemoryBackend::new();
        seed(&backend).await;

        let mut tx = backend.begin().await.unwrap();
        let err = tx
            .create_account(CreateAccountParams {
                owner: "alice".into(),
                balance: 0,
                currency: Currency::Usd,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "account", .. }));
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_account_refused_at_commit() {
        let backend = MemoryBackend::new();
        seed(&backend).await;
        let params = || CreateAccountParams {
            owner: "alice".into(),
            balance: 0,
            currency: Currency::Bdt,
        };

        let mut first = backend.begin().await.unwrap();
        let mut second = backend.begin().await.unwrap();
        first.create_account(params()).await.unwrap();
        second.create_account(params()).await.unwrap();

        backend.commit(first).await.unwrap();
        let err = backend.commit(second).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { entity: "account", .. }));

        let bdt = backend
            .snapshot()
            .accounts
            .into_iter()
            .filter(|a| a.owner == "alice" && a.currency == Currency::Bdt)
            .count();
        assert_eq!(bdt, 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_user_refused_at_commit() {
        let backend = MemoryBackend::new();
        let user = |username: &str, email: &str| CreateUserParams {
            username: username.into(),
            hashed_password: "x".into(),
            full_name: "Bob".into(),
            email: email.into(),
        };

        let mut first = backend.begin().await.unwrap();
        let mut same_name = backend.begin().await.unwrap();
        let mut same_email = backend.begin().await.unwrap();
        first.create_user(user("bob", "bob@example.com")).await.unwrap();
        same_name.create_user(user("bob", "other@example.com")).await.unwrap();
        same_email.create_user(user("robert", "bob@example.com")).await.unwrap();

        backend.commit(first).await.unwrap();
        assert!(matches!(
            backend.commit(same_name).await,
            Err(StoreError::Duplicate { entity: "user", .. })
        ));
        assert!(matches!(
            backend.commit(same_email).await,
            Err(StoreError::Duplicate { entity: "user", .. })
        ));

        let users = backend.snapshot().users;
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].email, "bob@example.com");
    }

    #[tokio::test]
    async fn test_sequences_not_rolled_back() {
        let backend = MemoryBackend::new();
        let (usd, _) = seed(&backend).await;

        let mut tx = backend.begin().await.unwrap();
        let first = tx
            .create_entry(CreateEntryParams {
                account_id: usd.id,
                amount: 5,
            })
            .await
            .unwrap();
        backend.rollback(tx).await.unwrap();

        let mut tx = backend.begin().await.unwrap();
        let second = tx
            .create_entry(CreateEntryParams {
                account_id: usd.id,
                amount: 5,
            })
            .await
            .unwrap();
        assert!(second.id > first.id);
        backend.commit(tx).await.unwrap();
        assert_eq!(backend.snapshot().entries.len(), 1);
    }
}
