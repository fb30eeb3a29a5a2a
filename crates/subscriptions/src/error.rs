//! Typed failures of the subscription domain
//!
//! Every operation returns one of these; nothing is silently swallowed.
//! Only `Transient` is safe to retry - re-issuing a create after
//! `AlreadyPending` is a caller bug, not a transient condition.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum SubscriptionError {
    /// Plan-change request id unknown
    #[error("Plan-change request not found: {0}")]
    RequestNotFound(Uuid),

    /// Requested plan id not in the catalog
    #[error("Plan not found: {0}")]
    PlanNotFound(Uuid),

    /// Tenant already has an open plan-change request
    #[error("Tenant {0} already has a pending plan-change request")]
    AlreadyPending(Uuid),

    /// Requested plan equals current plan outside of trial
    #[error("Requested plan is the tenant's current plan")]
    NoOpChange,

    /// Attempted transition out of a terminal state (double review,
    /// double cancel, cancel after review)
    #[error("Request is no longer pending; its decision is final")]
    InvalidTransition,

    /// Caller lacks the required role or does not own the request
    #[error("Not authorized to perform this action")]
    Unauthorized,

    /// Tenant has no active subscription, so a "change" is meaningless
    #[error("Tenant {0} has no active subscription")]
    NoSubscription(Uuid),

    /// Record already exists where at most one is allowed
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller-supplied data failed validation
    #[error("Validation error: {0}")]
    Validation(String),

    /// Persistence-layer failure, safe to retry
    #[error("Transient storage error: {0}")]
    Transient(String),

    /// Database error that is not known to be retryable
    #[error("Database error: {0}")]
    Database(String),
}

impl SubscriptionError {
    /// Whether the caller may retry the same call with unchanged arguments.
    pub fn is_transient(&self) -> bool {
        matches!(self, SubscriptionError::Transient(_))
    }
}

impl From<sqlx::Error> for SubscriptionError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
                SubscriptionError::Transient(e.to_string())
            }
            _ => SubscriptionError::Database(e.to_string()),
        }
    }
}

pub type SubscriptionResult<T> = Result<T, SubscriptionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_is_retryable() {
        assert!(SubscriptionError::Transient("pool timeout".into()).is_transient());
        assert!(!SubscriptionError::AlreadyPending(Uuid::new_v4()).is_transient());
        assert!(!SubscriptionError::InvalidTransition.is_transient());
        assert!(!SubscriptionError::Database("syntax".into()).is_transient());
    }
}
