//! Governance configuration.
//!
//! The defaults are the compatibility constants every deployment shares;
//! changing them changes the observable rules of the cooperative.

use carecoop_types::Address;
use serde::{Deserialize, Serialize};

use crate::error::GovernanceError;

/// Minimum balance to create a proposal.
pub const SUBMISSION_THRESHOLD: u64 = 100;
/// Minimum balance to sponsor a proposal.
pub const SPONSORSHIP_THRESHOLD: u64 = 500;
/// Sponsor count (proposer included) that activates a pending proposal.
pub const ACTIVATION_SPONSOR_COUNT: usize = 5;
/// Maximum hops followed along a delegation chain.
pub const MAX_DELEGATION_HOPS: usize = 50;
pub const MAX_MEMBER_ROLES: usize = 5;
pub const MAX_AUTHORIZED_VIEWERS: usize = 50;
pub const MAX_SPONSORS: usize = 10;
/// Maximum ids returned by a listing accessor.
pub const MAX_LIST_RESULTS: usize = 49;
pub const REDACTED_DESCRIPTION: &str = "[REDACTED - Sensitive Information]";

/// Rules of the governance engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub submission_threshold: u64,
    pub sponsorship_threshold: u64,
    pub activation_sponsor_count: usize,
    pub max_delegation_hops: usize,
    pub max_member_roles: usize,
    pub max_authorized_viewers: usize,
    pub max_sponsors: usize,
    pub max_list_results: usize,
    /// Description shown to readers without sensitive access
    pub redaction_placeholder: String,
    /// Identity the voting engine acts under when it settles a linked
    /// lifecycle proposal. Only this identity may mark proposals passed or
    /// rejected.
    pub voting_engine: Address,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            submission_threshold: SUBMISSION_THRESHOLD,
            sponsorship_threshold: SPONSORSHIP_THRESHOLD,
            activation_sponsor_count: ACTIVATION_SPONSOR_COUNT,
            max_delegation_hops: MAX_DELEGATION_HOPS,
            max_member_roles: MAX_MEMBER_ROLES,
            max_authorized_viewers: MAX_AUTHORIZED_VIEWERS,
            max_sponsors: MAX_SPONSORS,
            max_list_results: MAX_LIST_RESULTS,
            redaction_placeholder: REDACTED_DESCRIPTION.to_string(),
            voting_engine: Address::system(1),
        }
    }
}

impl GovernanceConfig {
    /// Validate configuration.
    pub fn validate(&self) -> Result<(), GovernanceError> {
        if self.activation_sponsor_count == 0 {
            return Err(GovernanceError::InvalidParameter(
                "activation_sponsor_count cannot be 0".to_string(),
            ));
        }
        if self.activation_sponsor_count > self.max_sponsors {
            return Err(GovernanceError::InvalidParameter(format!(
                "activation_sponsor_count {} exceeds max_sponsors {}",
                self.activation_sponsor_count, self.max_sponsors
            )));
        }
        for (name, value) in [
            ("max_delegation_hops", self.max_delegation_hops),
            ("max_member_roles", self.max_member_roles),
            ("max_authorized_viewers", self.max_authorized_viewers),
            ("max_list_results", self.max_list_results),
        ] {
            if value == 0 {
                return Err(GovernanceError::InvalidParameter(format!("{} cannot be 0", name)));
            }
        }
        if self.voting_engine.is_zero() {
            return Err(GovernanceError::InvalidParameter(
                "voting_engine identity cannot be the zero address".to_string(),
            ));
        }
        Ok(())
    }
}

/// Initial admin of the membership registry.
///
/// Injected at construction; only consulted when the ledger holds no admin
/// yet. After that the persisted admin is authoritative and changes only
/// through `transfer_admin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminConfig {
    pub admin: Address,
}

impl AdminConfig {
    pub fn new(admin: Address) -> Self {
        Self { admin }
    }
}
