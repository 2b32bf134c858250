//! # Reward Economy Error Types
//!
//! All errors that can occur in the reward economy.
//!
//! Business conditions (quota reached, voucher count not priced, pool closed)
//! are ordinary values of [`RewardError`]; nothing in the engine panics on
//! them. A malformed configuration is only ever reported by the loader.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Configuration lookups and load-time validation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No pool with this id is configured.
    #[error("unknown pool: {0}")]
    UnknownPool(String),

    /// No activity with this id is configured.
    #[error("unknown activity: {0}")]
    UnknownActivity(String),

    /// The configuration file is malformed.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Request arguments the engine refuses before touching any state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Draw count must be at least one.
    #[error("draw count must be positive")]
    NonPositiveCount,

    /// The pool has no price for this count and automatic pricing is off.
    #[error("draw count {count} has no price in this pool")]
    CountNotPriced {
        /// The rejected draw count.
        count: u32,
    },

    /// More draws than one request may carry.
    #[error("draw count {count} exceeds the maximum of {max}")]
    CountTooLarge {
        /// The rejected draw count.
        count: u32,
        /// Largest accepted count.
        max: u32,
    },

    /// Subject ids must be non-empty.
    #[error("subject id must not be empty")]
    EmptySubject,
}

/// Errors that can occur in the reward economy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    /// Unknown id or invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Rejected request arguments.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The current quota window has no room for this request.
    #[error("quota exceeded: {used} of {limit} used, requested {requested}")]
    QuotaExceeded {
        /// Configured limit per window.
        limit: u32,
        /// Usage already committed in the current window.
        used: u32,
        /// Units requested.
        requested: u32,
    },

    /// The pool or activity opens later.
    #[error("not active until {starts_at}")]
    NotYetActive {
        /// Opening time.
        starts_at: DateTime<Utc>,
    },

    /// The pool or activity has closed.
    #[error("expired at {ended_at}")]
    Expired {
        /// Closing time.
        ended_at: DateTime<Utc>,
    },

    /// The caller's wallet does not cover the final cost.
    #[error("insufficient balance: need {required}, have {available}")]
    InsufficientBalance {
        /// Final cost after vouchers.
        required: u64,
        /// Balance supplied by the caller.
        available: u64,
    },

    /// Weighted selection from a table with no entries.
    #[error("cannot select from an empty table")]
    EmptyTable,

    /// A once-per-day activity was already claimed today.
    #[error("activity {activity} already claimed today")]
    AlreadyClaimed {
        /// The activity id.
        activity: String,
    },

    /// The activity is configured but switched off.
    #[error("activity disabled: {0}")]
    ActivityDisabled(String),

    /// Arithmetic overflow in a cost calculation.
    #[error("arithmetic overflow in economic calculation")]
    ArithmeticOverflow,

    /// Opaque failure reported by the storage collaborator.
    #[error("storage error: {0}")]
    Storage(String),
}

impl RewardError {
    /// Wraps a storage-side failure.
    #[must_use]
    pub fn storage(reason: impl std::fmt::Display) -> Self {
        Self::Storage(reason.to_string())
    }

    /// Returns true for conditions the caller can fix by waiting or changing
    /// the request (as opposed to configuration or storage faults).
    #[must_use]
    pub const fn is_business_rejection(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::QuotaExceeded { .. }
                | Self::NotYetActive { .. }
                | Self::Expired { .. }
                | Self::InsufficientBalance { .. }
                | Self::AlreadyClaimed { .. }
                | Self::ActivityDisabled(_)
        )
    }
}

/// Result type for reward economy operations.
pub type RewardResult<T> = Result<T, RewardError>;
