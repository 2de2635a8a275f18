//! Transfer attempt phases
//!
//! ```text
//! STARTED → RECORDS_CREATED → BALANCES_APPLIED → COMMITTED
//!    ↓             ↓                  ↓
//!  FAILED ─────────┴──────────────────┴─→ ROLLED_BACK
//! ```
//!
//! There is no partial-success terminal state. Phases are not persisted;
//! they label the structured log lines of one attempt.

use std::fmt;

use super::error::TxError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferPhase {
    /// Transaction open, account rows being locked
    Started,
    /// Transfer row and both entries inserted
    RecordsCreated,
    /// Both balances updated, awaiting commit
    BalancesApplied,
    /// Terminal: all writes visible
    Committed,
    /// A step failed and the rollback could not be confirmed
    Failed,
    /// Terminal: no write from the attempt is visible
    RolledBack,
}

impl TransferPhase {
    /// Terminal phase reached by an attempt that ended with `err`
    pub fn after_error(err: &TxError) -> Self {
        // dropped transactions are rolled back by the backend
        if err.rejection().is_some() || matches!(err, TxError::TimedOut(_)) {
            TransferPhase::RolledBack
        } else {
            TransferPhase::Failed
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TransferPhase::Started => "STARTED",
            TransferPhase::RecordsCreated => "RECORDS_CREATED",
            TransferPhase::BalancesApplied => "BALANCES_APPLIED",
            TransferPhase::Committed => "COMMITTED",
            TransferPhase::Failed => "FAILED",
            TransferPhase::RolledBack => "ROLLED_BACK",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
