//! Core types used throughout the system
//!
//! Type aliases for row identities and money amounts. They carry meaning
//! at API boundaries and keep the column types (`BIGINT`) in one place.

/// Account ID - `accounts.id`, assigned by the store on insert.
///
/// # Ordering:
/// Account IDs define the global lock order for transfers. Two accounts are
/// always locked lowest ID first, whichever one is the source.
pub type AccountId = i64;

/// Ledger entry ID - `entries.id`
pub type EntryId = i64;

/// Transfer ID - `transfers.id`
pub type TransferId = i64;

/// Amount in minor currency units (cents, paisa).
///
/// Balances and entry amounts are signed; a transfer amount is always > 0.
pub type Amount = i64;
