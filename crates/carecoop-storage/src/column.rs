/// Column families for organized governance state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Column {
    /// Metadata: key → value (id counters, admin identity)
    Metadata,
    /// Members: address → MemberRecord
    Members,
    /// Base voting power: address → u64
    VotingPower,
    /// Delegations: delegator → DelegationRecord
    Delegations,
    /// Lifecycle proposals: proposal_id → Proposal
    Proposals,
    /// Authorized viewers: proposal_id → viewer set
    Viewers,
    /// Voting proposals: voting_id → VotingProposal
    VotingProposals,
    /// Votes: (voting_id, effective voter) → Vote
    Votes,
}

impl Column {
    pub fn name(&self) -> &'static str {
        match self {
            Column::Metadata => "metadata",
            Column::Members => "members",
            Column::VotingPower => "voting_power",
            Column::Delegations => "delegations",
            Column::Proposals => "proposals",
            Column::Viewers => "viewers",
            Column::VotingProposals => "voting_proposals",
            Column::Votes => "votes",
        }
    }

    pub fn all() -> [Column; 8] {
        [
            Column::Metadata,
            Column::Members,
            Column::VotingPower,
            Column::Delegations,
            Column::Proposals,
            Column::Viewers,
            Column::VotingProposals,
            Column::Votes,
        ]
    }

    pub fn from_name(name: &str) -> Option<Column> {
        Self::all().into_iter().find(|c| c.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_names_are_unique() {
        let mut names: Vec<_> = Column::all().iter().map(|c| c.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Column::all().len());
    }

    #[test]
    fn test_from_name() {
        assert_eq!(Column::from_name("votes"), Some(Column::Votes));
        assert_eq!(Column::from_name("headers"), None);
    }
}
