//! Transactional store
//!
//! Moves money between accounts with all-or-nothing consistency.
//!
//! # Layers
//!
//! - [`repository`]: `LedgerRepository` (single statements) and `TxBackend`
//!   (begin/commit/rollback) seams
//! - [`postgres`] / [`memory`]: backends
//! - [`tx`]: `Store::exec_tx`, the transaction orchestrator
//! - [`transfer`]: `Store::transfer`, the composite use case
//!
//! # Safety Invariants
//!
//! 1. **Scoped repository**: a unit of work only sees the repository bound to
//!    its own transaction, so it cannot issue statements outside it
//! 2. **Binary outcome**: commit on `Ok`, rollback on `Err`, never both
//! 3. **Fixed lock order**: transfer locks account rows by ascending id
//! 4. **No retry here**: every failure is reported; retry policy is the caller's

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod state;
pub mod transfer;
pub mod tx;


// Re-exports for convenience
pub use error::{StoreError, TxError};
pub use memory::{FailPoint, MemoryBackend, MemorySnapshot, MemoryTx, RepoOp};
pub use postgres::{PgBackend, PgTx};
pub use repository::{LedgerRepository, TxBackend};
pub use state::TransferPhase;
pub use transfer::{TransferRequest, TransferResult};
pub use tx::{Store, StoreOptions};
