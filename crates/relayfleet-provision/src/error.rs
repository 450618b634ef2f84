//! Error taxonomy for provisioning requests
//!
//! The external caller sees a small closed set of short messages; full
//! detail (store errors, rule text, phase) stays in the logs.

use relayfleet_alloc::AllocError;
use sea_orm::DbErr;
use thiserror::Error;

/// Why a provisioning request failed
#[derive(Debug, Error)]
pub enum ProvisionError {
    /// Structural input problem, caught before a transaction was opened.
    /// Recoverable: the caller corrects the input and re-issues.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A business rule, quota or admission check rejected the request.
    /// Terminal for this request.
    #[error("business rule violated: {0}")]
    BusinessRule(String),

    /// An optimistic-concurrency version check lost a race.
    /// Recoverable: re-issuing the request reads a fresh version.
    #[error("concurrent update conflict")]
    Conflict,

    /// Unique-key collisions exhausted the generation attempt bound.
    /// Recoverable by re-issuing the request.
    #[error("allocation collision, generation attempts exhausted")]
    Collision,

    /// The store failed; detail is logged, the caller sees a generic message
    #[error("infrastructure failure: {0}")]
    Infrastructure(#[from] DbErr),
}

impl ProvisionError {
    /// The message shown to the external caller.
    ///
    /// Validation and business-rule messages are written to be user-safe;
    /// everything else collapses to a generic line.
    pub fn user_message(&self) -> String {
        match self {
            ProvisionError::Validation(msg) => msg.clone(),
            ProvisionError::BusinessRule(msg) => msg.clone(),
            ProvisionError::Conflict => "the account changed concurrently, please retry".to_string(),
            ProvisionError::Collision => "could not allocate a unique address, please retry".to_string(),
            ProvisionError::Infrastructure(_) => "operation failed".to_string(),
        }
    }

    /// Whether re-issuing the same request can succeed without changes
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProvisionError::Conflict | ProvisionError::Collision)
    }
}

impl From<AllocError> for ProvisionError {
    fn from(err: AllocError) -> Self {
        match err {
            AllocError::FeatureDisabled => {
                ProvisionError::BusinessRule("the node does not offer this tunnel kind".to_string())
            }
            AllocError::PrefixForbidden => {
                ProvisionError::BusinessRule("the domain prefix is not allowed on this node".to_string())
            }
            AllocError::PortsExhausted => {
                ProvisionError::BusinessRule("the node has no free port".to_string())
            }
            AllocError::RuleViolation(detail) => {
                tracing::debug!(%detail, "allocation rule rejected the request");
                ProvisionError::BusinessRule("the allocation is not permitted".to_string())
            }
            AllocError::Collision { attempts } => {
                tracing::warn!(attempts, "prefix generation exhausted its attempt bound");
                ProvisionError::Collision
            }
            AllocError::Db(err) => ProvisionError::Infrastructure(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conflict_and_collision_are_retryable() {
        assert!(ProvisionError::Conflict.is_retryable());
        assert!(ProvisionError::Collision.is_retryable());
        assert!(!ProvisionError::Validation("bad ip".into()).is_retryable());
        assert!(!ProvisionError::BusinessRule("no balance".into()).is_retryable());
    }

    #[test]
    fn infrastructure_detail_never_reaches_the_user() {
        let err = ProvisionError::Infrastructure(DbErr::Custom(
            "connection refused to 10.0.0.5:5432".to_string(),
        ));
        assert_eq!(err.user_message(), "operation failed");
    }

    #[test]
    fn rule_detail_is_replaced_by_a_generic_message() {
        let err = ProvisionError::from(AllocError::RuleViolation(
            "tenant acme reached the node's tunnel limit of 3".to_string(),
        ));
        assert_eq!(err.user_message(), "the allocation is not permitted");
    }
}
