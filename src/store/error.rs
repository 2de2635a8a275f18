//! Store Error Types
//!
//! `StoreError` is what a single repository call can fail with.
//! `TxError` is what an orchestrated transaction reports to its caller.

use std::time::Duration;

use thiserror::Error;

/// Failure of one repository statement
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} already exists: {key}")]
    Duplicate { entity: &'static str, key: String },

    #[error("Insufficient funds in account {account_id}: balance {balance}, requested {amount}")]
    InsufficientFunds {
        account_id: i64,
        balance: i64,
        amount: i64,
    },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl StoreError {
    pub fn account_not_found(id: i64) -> Self {
        StoreError::NotFound {
            entity: "account",
            key: id.to_string(),
        }
    }

    pub fn user_not_found(username: &str) -> Self {
        StoreError::NotFound {
            entity: "user",
            key: username.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            StoreError::NotFound { .. } => "NOT_FOUND",
            StoreError::Duplicate { .. } => "DUPLICATE",
            StoreError::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            StoreError::InvalidRequest(_) => "INVALID_REQUEST",
            StoreError::Unavailable(_) => "STORE_UNAVAILABLE",
            StoreError::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self {
            StoreError::NotFound { .. } => 404,
            StoreError::Duplicate { .. } => 403,
            StoreError::InvalidRequest(_) => 400,
            StoreError::InsufficientFunds { .. } => 422,
            StoreError::Unavailable(_) => 503,
            StoreError::Database(_) => 500,
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Duplicate {
                    entity: "row",
                    key: db_err.constraint().unwrap_or("unique").to_string(),
                };
            }
            if db_err.is_foreign_key_violation() || db_err.is_check_violation() {
                return StoreError::InvalidRequest(db_err.message().to_string());
            }
        }
        StoreError::Database(e)
    }
}

/// Outcome of an orchestrated transaction that did not commit cleanly
#[derive(Error, Debug)]
pub enum TxError {
    /// No transaction could be opened; nothing ran
    #[error("Failed to begin transaction: {0}")]
    BeginFailed(#[source] StoreError),

    /// A statement inside the unit of work failed and was rolled back
    #[error("Transaction step failed: {0}")]
    StepFailed(#[source] StoreError),

    /// The unit of work failed and so did the rollback
    #[error("Rollback failed: {rollback} (original error: {original})")]
    RollbackFailed {
        #[source]
        original: StoreError,
        rollback: StoreError,
    },

    /// All steps ran but the commit was not acknowledged; durability unknown
    #[error("Commit failed: {0}")]
    CommitFailed(#[source] StoreError),

    /// Deadline elapsed; the open transaction was dropped and rolled back
    #[error("Transaction timed out after {0:?}")]
    TimedOut(Duration),
}

impl TxError {
    /// Store error that rejected the work outright, leaving nothing written.
    ///
    /// A failed step that rolled back cleanly, or a commit refused by a
    /// unique key. Any other failure has no client-facing cause.
    pub fn rejection(&self) -> Option<&StoreError> {
        match self {
            TxError::StepFailed(e) => Some(e),
            TxError::CommitFailed(e @ StoreError::Duplicate { .. }) => Some(e),
            _ => None,
        }
    }

    /// Get the error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            TxError::BeginFailed(_) => "BEGIN_FAILED",
            TxError::StepFailed(e) => e.code(),
            TxError::RollbackFailed { .. } => "ROLLBACK_FAILED",
            TxError::CommitFailed(e @ StoreError::Duplicate { .. }) => e.code(),
            TxError::CommitFailed(_) => "COMMIT_FAILED",
            TxError::TimedOut(_) => "TIMED_OUT",
        }
    }

    /// Get HTTP status code suggestion
    pub fn http_status(&self) -> u16 {
        match self.rejection() {
            Some(e) => e.http_status(),
            None if matches!(self, TxError::BeginFailed(_) | TxError::TimedOut(_)) => 503,
            None => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_error_codes_pass_through() {
        let err = TxError::StepFailed(StoreError::account_not_found(7));
        assert_eq!(err.code(), "NOT_FOUND");
        assert_eq!(err.http_status(), 404);
        assert!(err.rejection().is_some_and(StoreError::is_not_found));
    }

    #[test]
    fn test_rollback_failed_reports_both_causes() {
        let err = TxError::RollbackFailed {
            original: StoreError::InvalidRequest("amount must be positive".into()),
            rollback: StoreError::Unavailable("connection reset".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("connection reset"));
        assert!(msg.contains("amount must be positive"));
        assert_eq!(err.http_status(), 500);
        assert!(err.rejection().is_none());
    }

    #[test]
    fn test_refused_commit_reports_duplicate() {
        let err = TxError::CommitFailed(StoreError::Duplicate {
            entity: "account",
            key: "alice/USD".into(),
        });
        assert_eq!(err.code(), "DUPLICATE");
        assert_eq!(err.http_status(), 403);

        let err = TxError::CommitFailed(StoreError::Unavailable("io".into()));
        assert_eq!(err.code(), "COMMIT_FAILED");
        assert!(err.rejection().is_none());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(
            TxError::BeginFailed(StoreError::Unavailable("pool".into())).http_status(),
            503
        );
        assert_eq!(
            TxError::CommitFailed(StoreError::Unavailable("io".into())).http_status(),
            500
        );
        assert_eq!(
            TxError::StepFailed(StoreError::InsufficientFunds {
                account_id: 1,
                balance: 10,
                amount: 20
            })
            .http_status(),
            422
        );
        assert_eq!(TxError::TimedOut(Duration::from_secs(1)).code(), "TIMED_OUT");
    }

    #[test]
    fn test_display() {
        let err = StoreError::user_not_found("alice");
        assert_eq!(err.to_string(), "user not found: alice");
    }
}
