use carecoop_storage::StorageError;
use carecoop_types::{Address, BlockHeight};
use thiserror::Error;

use crate::proposal::ProposalStatus;

/// Errors that can occur in governance operations.
///
/// Every variant aborts the operation that produced it; nothing is written.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GovernanceError {
    #[error("Not authorized: {0}")]
    NotAuthorized(String),

    #[error("Not a member: {0}")]
    NotMember(Address),

    #[error("Already a member: {0}")]
    AlreadyMember(Address),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(u64),

    #[error("Proposal already exists: {0}")]
    ProposalAlreadyExists(u64),

    #[error("Invalid category: {0}")]
    InvalidCategory(String),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidStateTransition {
        from: ProposalStatus,
        to: ProposalStatus,
    },

    #[error("Proposal {0} is not in the required status")]
    ProposalNotActive(u64),

    #[error("Insufficient balance: have {balance}, need {required}")]
    InsufficientThreshold { balance: u128, required: u128 },

    #[error("Already sponsored")]
    AlreadySponsored,

    #[error("Already voted")]
    AlreadyVoted,

    #[error("Invalid vote: {0}")]
    InvalidVote(String),

    #[error("Invalid voting power")]
    InvalidVotingPower,

    #[error("Quorum not met: {actual} < {required}")]
    QuorumNotMet { actual: u64, required: u64 },

    #[error("Voting has not ended: current height {current}, ends at {end}")]
    VotingNotEnded {
        current: BlockHeight,
        end: BlockHeight,
    },

    #[error("Voting duration must be greater than zero")]
    InvalidDuration,

    #[error("Invalid delegate: {0}")]
    InvalidDelegate(String),

    #[error("Delegation cycle detected")]
    DelegationCycle,

    #[error("Invalid voting mechanism: {0}")]
    InvalidVotingMechanism(String),

    #[error("Sensitive information access denied")]
    SensitiveInfoAccessDenied,

    #[error("Proposal {0} does not contain sensitive information")]
    ProposalNotSensitive(u64),

    #[error("Viewer already authorized: {0}")]
    AlreadyAuthorized(Address),

    #[error("Viewer not authorized: {0}")]
    ViewerNotAuthorized(Address),

    #[error("Capacity exceeded: {what} is limited to {cap}")]
    CapacityExceeded { what: &'static str, cap: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GovernanceError::InvalidCategory("snacks".to_string());
        assert!(err.to_string().contains("snacks"));
    }

    #[test]
    fn test_quorum_error() {
        let err = GovernanceError::QuorumNotMet { actual: 3, required: 10 };
        assert!(err.to_string().contains('3'));
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_transition_error_names_both_states() {
        let err = GovernanceError::InvalidStateTransition {
            from: ProposalStatus::Executed,
            to: ProposalStatus::Cancelled,
        };
        let msg = err.to_string();
        assert!(msg.contains("Executed"));
        assert!(msg.contains("Cancelled"));
    }

    #[test]
    fn test_storage_error_converts() {
        let err: GovernanceError = StorageError::Io("gone".to_string()).into();
        assert!(matches!(err, GovernanceError::Storage(_)));
    }
}
