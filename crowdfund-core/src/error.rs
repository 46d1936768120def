//! Error types for the crowdfunding engine
//!
//! Every failure an external client can observe carries a stable numeric
//! [`ErrorCode`]. Infrastructure failures (storage, serialization, config)
//! all surface as [`ErrorCode::Internal`].

use crate::types::{AccountId, Amount};
use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Stable numeric error identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ErrorCode {
    /// Caller is not the campaign owner or the administrator
    OwnerOnly = 100,
    /// Campaign, contribution, milestone or update does not exist
    NotFound = 102,
    /// Amount or fee rate outside the accepted range
    InvalidAmount = 103,
    /// Deadline is not in the future (create) or has passed (contribute)
    DeadlinePassed = 104,
    /// Campaign raised less than its goal
    GoalNotReached = 105,
    /// Funds were already claimed
    AlreadyClaimed = 106,
    /// Deadline has not been reached yet
    DeadlineNotPassed = 107,
    /// Campaign met its goal, refunds do not apply
    CampaignSuccessful = 108,
    /// Value transfer failed
    LedgerError = 109,
    /// Storage, serialization or configuration failure
    Internal = 500,
}

impl ErrorCode {
    /// Numeric value
    pub fn as_u32(self) -> u32 {
        self as u32
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u32())
    }
}

/// Value transfer failures reported by a [`crate::ledger::Ledger`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    /// Source account cannot cover the transfer
    #[error("insufficient funds in {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        /// Debited account
        account: AccountId,
        /// Requested amount
        needed: Amount,
        /// Current balance
        available: Amount,
    },

    /// Account is frozen and cannot send or receive
    #[error("account {0} is frozen")]
    AccountFrozen(AccountId),

    /// Credit would overflow the destination balance
    #[error("balance overflow on {0}")]
    Overflow(AccountId),
}

/// Engine errors
#[derive(Error, Debug)]
pub enum Error {
    /// Caller lacks ownership or administrator rights
    #[error("Owner only: {0}")]
    OwnerOnly(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Deadline already passed
    #[error("Deadline passed: deadline {deadline}, height {height}")]
    DeadlinePassed {
        /// Absolute deadline height
        deadline: u64,
        /// Height at evaluation
        height: u64,
    },

    /// Deadline not reached
    #[error("Deadline not passed: deadline {deadline}, height {height}")]
    DeadlineNotPassed {
        /// Absolute deadline height
        deadline: u64,
        /// Height at evaluation
        height: u64,
    },

    /// Goal not reached
    #[error("Goal not reached: raised {raised} of {goal}")]
    GoalNotReached {
        /// Amount raised
        raised: Amount,
        /// Campaign goal
        goal: Amount,
    },

    /// Funds already claimed
    #[error("Campaign {0} already claimed")]
    AlreadyClaimed(u64),

    /// Refund requested on a successful campaign
    #[error("Campaign {0} reached its goal")]
    CampaignSuccessful(u64),

    /// Value transfer failed
    #[error("Ledger error: {0}")]
    Ledger(#[from] TransferError),

    /// Storage error (RocksDB or in-memory backend)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable code surfaced to callers
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::OwnerOnly(_) => ErrorCode::OwnerOnly,
            Error::NotFound(_) => ErrorCode::NotFound,
            Error::InvalidAmount(_) => ErrorCode::InvalidAmount,
            Error::DeadlinePassed { .. } => ErrorCode::DeadlinePassed,
            Error::DeadlineNotPassed { .. } => ErrorCode::DeadlineNotPassed,
            Error::GoalNotReached { .. } => ErrorCode::GoalNotReached,
            Error::AlreadyClaimed(_) => ErrorCode::AlreadyClaimed,
            Error::CampaignSuccessful(_) => ErrorCode::CampaignSuccessful,
            Error::Ledger(_) => ErrorCode::LedgerError,
            Error::Storage(_)
            | Error::Serialization(_)
            | Error::Concurrency(_)
            | Error::Config(_)
            | Error::Io(_) => ErrorCode::Internal,
        }
    }

    /// True for failures caused by caller input or campaign phase
    pub fn is_rejection(&self) -> bool {
        !matches!(self.code(), ErrorCode::Internal)
    }
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}
