//! Error types for deal operations.
//!
//! Three families cover everything the library can reject:
//!
//! - [`ValidationError`]: bad user input, recoverable by re-prompting.
//! - [`TransitionError`]: a lifecycle event the deal cannot accept right now.
//! - [`StoreError`]: persistence failures, fatal for the current operation only.
//!
//! [`DealError`] wraps all three and carries a stable [`DealErrorCode`].

use crate::lifecycle::DealEvent;
use crate::models::{DealId, DealStatus, UserId};
use crate::session::DialogStep;

/// Stable error codes for front ends that map errors to replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum DealErrorCode {
    /// Input failed validation
    Validation = 1000,
    /// Deal does not exist
    NotFound = 2000,
    /// Actor is not allowed to trigger the event
    ForbiddenRole = 2001,
    /// Event is not valid in the deal's current status
    InvalidState = 2002,
    /// Generic storage failure
    Storage = 3000,
    /// Record lock could not be acquired in time
    LockTimeout = 3001,
    /// Record could not be encoded or decoded
    Serialization = 3002,
}

/// Rejected user input. Nothing was written.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("amount must be a number, got {0:?}")]
    NotANumber(String),

    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(String),

    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("user {0} has no registered wallet")]
    WalletRequired(UserId),

    #[error("invalid deal id {0:?}")]
    MalformedDealId(String),

    #[error("unknown category {0:?}")]
    UnknownCategory(String),

    #[error("input not expected while waiting for {step}")]
    UnexpectedInput {
        /// Step the session was at when the input arrived
        step: DialogStep,
    },
}

/// Kind of lifecycle rejection, in check order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransitionErrorKind {
    NotFound,
    ForbiddenRole,
    InvalidState,
}

impl TransitionErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::ForbiddenRole => "forbidden-role",
            Self::InvalidState => "invalid-state",
        }
    }
}

/// A lifecycle event the deal refused. No mutation happened.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("deal {0} not found")]
    NotFound(DealId),

    #[error("user {actor} is not allowed to {event} deal {deal_id}")]
    ForbiddenRole {
        deal_id: DealId,
        event: DealEvent,
        actor: UserId,
    },

    #[error("cannot {event} deal {deal_id} while it is {status}")]
    InvalidState {
        deal_id: DealId,
        event: DealEvent,
        status: DealStatus,
    },
}

impl TransitionError {
    pub fn kind(&self) -> TransitionErrorKind {
        match self {
            Self::NotFound(_) => TransitionErrorKind::NotFound,
            Self::ForbiddenRole { .. } => TransitionErrorKind::ForbiddenRole,
            Self::InvalidState { .. } => TransitionErrorKind::InvalidState,
        }
    }
}

/// Persistence failure.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("timed out after {waited_ms}ms waiting for lock on {record}")]
    LockTimeout { record: String, waited_ms: u64 },

    #[error("corrupt record {record}: {reason}")]
    Corrupt { record: String, reason: String },

    #[error("could not allocate a unique deal id after {attempts} attempts")]
    IdCollision { attempts: usize },
}

impl StoreError {
    /// Returns true if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::LockTimeout { .. } | Self::IdCollision { .. }
        )
    }
}

/// Any error surfaced by the deal engine.
#[derive(thiserror::Error, Debug)]
pub enum DealError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl DealError {
    pub fn code(&self) -> DealErrorCode {
        match self {
            Self::Validation(_) => DealErrorCode::Validation,
            Self::Transition(e) => match e.kind() {
                TransitionErrorKind::NotFound => DealErrorCode::NotFound,
                TransitionErrorKind::ForbiddenRole => DealErrorCode::ForbiddenRole,
                TransitionErrorKind::InvalidState => DealErrorCode::InvalidState,
            },
            Self::Store(StoreError::LockTimeout { .. }) => DealErrorCode::LockTimeout,
            Self::Store(StoreError::Serialization(_)) => DealErrorCode::Serialization,
            Self::Store(_) => DealErrorCode::Storage,
        }
    }

    /// Returns true if this error is potentially recoverable by retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Store(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Returns a suggested retry delay in milliseconds, if applicable.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::Store(StoreError::LockTimeout { .. }) => Some(100),
            Self::Store(StoreError::Io(_)) => Some(500),
            _ => None,
        }
    }

    /// The lifecycle rejection, if this is one.
    pub fn transition_kind(&self) -> Option<TransitionErrorKind> {
        match self {
            Self::Transition(e) => Some(e.kind()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DealError {
    fn from(err: std::io::Error) -> Self {
        Self::Store(StoreError::Io(err))
    }
}

impl From<serde_json::Error> for DealError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(StoreError::Serialization(err))
    }
}

pub type Result<T> = std::result::Result<T, DealError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = DealError::from(StoreError::LockTimeout {
            record: "deals/abc".to_string(),
            waited_ms: 5000,
        });
        assert_eq!(err.code(), DealErrorCode::LockTimeout);
        assert!(err.is_retryable());
        assert_eq!(err.retry_after_ms(), Some(100));

        let err = DealError::from(ValidationError::EmptyField("wallet address"));
        assert_eq!(err.code(), DealErrorCode::Validation);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_transition_kinds() {
        let id = DealId::from_token_bytes(&[0xab; 8]);
        let err = TransitionError::InvalidState {
            deal_id: id.clone(),
            event: DealEvent::Join,
            status: DealStatus::WaitingPayment,
        };
        assert_eq!(err.kind(), TransitionErrorKind::InvalidState);
        assert_eq!(err.kind().as_str(), "invalid-state");
        assert!(err.to_string().contains("waiting_payment"));

        let err = DealError::from(TransitionError::NotFound(id));
        assert_eq!(err.code(), DealErrorCode::NotFound);
        assert_eq!(err.transition_kind(), Some(TransitionErrorKind::NotFound));
    }

    #[test]
    fn test_error_display() {
        let err = ValidationError::UnexpectedInput {
            step: DialogStep::EnterAmount,
        };
        assert!(err.to_string().contains("enter_amount"));

        let err = DealError::from(ValidationError::NotANumber("abc".to_string()));
        assert!(err.to_string().contains("\"abc\""));
    }
}
