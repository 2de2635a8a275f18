//! Simple Bank - Accounts, Ledger Entries and Atomic Transfers
//!
//! Moves money between accounts over PostgreSQL with all-or-nothing
//! consistency and deadlock-free row locking.
//!
//! # Modules
//!
//! - [`core_types`] - Id and amount aliases
//! - [`currency`] - Supported currencies
//! - [`models`] - User, Account, Entry and Transfer rows
//! - [`store`] - Transaction orchestrator, repositories and the transfer use case
//! - [`token`] - Access token issue/verify
//! - [`user_auth`] - Registration and login
//! - [`gateway`] - HTTP API
//! - [`config`] / [`logging`] / [`db`] - Process plumbing

// Core types - must be first!
pub mod core_types;

pub mod currency;
pub mod models;
pub mod store;

pub mod token;
pub mod user_auth;

pub mod gateway;

pub mod config;
pub mod db;
pub mod logging;

// Convenient re-exports at crate root
pub use core_types::{AccountId, Amount, EntryId, TransferId};
pub use currency::Currency;
pub use models::{Account, Entry, Transfer, User};
pub use store::{
    MemoryBackend, PgBackend, Store, StoreError, StoreOptions, TransferRequest, TransferResult,
    TxError,
};
