//! CareCoop Governance - cooperative decision making.
//!
//! This crate provides:
//! - Proposal lifecycle with sponsorship gating and sensitive-info redaction
//! - Voting with simple-majority, quadratic and role-weighted power
//! - Liquid delegation with cycle protection
//! - An admin-gated membership registry
//!
//! All state lives in a [`carecoop_storage::Ledger`]; every operation either
//! commits one write batch or changes nothing.

pub mod bounded;
pub mod config;
pub mod delegation;
pub mod engine;
pub mod error;
pub mod locks;
pub mod membership;
pub mod power;
pub mod proposal;
pub mod store;
pub mod voting;

pub use bounded::BoundedSet;
pub use config::{AdminConfig, GovernanceConfig};
pub use delegation::{Delegation, DelegationResolver};
pub use engine::Governance;
pub use error::GovernanceError;
pub use membership::{MemberRecord, MembershipRegistry, RoleId};
pub use power::{integer_sqrt, VotingMechanism, VotingPowerCalculator};
pub use proposal::{Proposal, ProposalCategory, ProposalDraft, ProposalLifecycle, ProposalStatus, ProposalUpdate};
pub use voting::{
    FinalizeOutcome, PrivacyLevel, Vote, VoteDirection, VotingEngine, VotingProposal, VotingProposalParams,
    VotingStatus,
};
