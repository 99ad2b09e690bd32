//! Output formatting utilities.
//!
//! Pretty printing for CLI commands.

use carecoop_governance::{
    FinalizeOutcome, MemberRecord, Proposal, ProposalStatus, Vote, VotingProposal, VotingStatus,
};
use carecoop_types::Address;
use colored::Colorize;
use serde::Serialize;
use tabled::{Table, Tabled};

/// Print success message.
pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

/// Print error message.
pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

/// Print warning message.
pub fn print_warning(msg: &str) {
    println!("{}", format!("⚠ {}", msg).yellow());
}

/// Print info message.
pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

/// Print any record as pretty JSON.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn colored_status(status: ProposalStatus) -> String {
    let s = status.as_str();
    match status {
        ProposalStatus::Passed | ProposalStatus::Executed => s.green().to_string(),
        ProposalStatus::Rejected | ProposalStatus::Cancelled => s.red().to_string(),
        ProposalStatus::Active => s.bright_cyan().to_string(),
        ProposalStatus::Draft | ProposalStatus::Pending => s.yellow().to_string(),
    }
}

fn colored_voting_status(status: VotingStatus) -> String {
    let s = status.as_str();
    match status {
        VotingStatus::Passed => s.green().to_string(),
        VotingStatus::Failed | VotingStatus::Expired => s.red().to_string(),
        VotingStatus::Active => s.bright_cyan().to_string(),
    }
}

/// Print a lifecycle proposal.
pub fn print_proposal(proposal: &Proposal) {
    println!("{}", format!("Proposal #{}", proposal.id).bold());
    println!("{}", "=".repeat(50));
    println!("Title:       {}", proposal.title);
    println!("Category:    {}", proposal.category);
    println!("Status:      {}", colored_status(proposal.status));
    println!("Proposer:    {}", proposal.proposer.to_string().bright_cyan());
    println!("Created at:  {}", proposal.created_at);
    println!("Updated at:  {}", proposal.last_updated);
    if let Some(link) = &proposal.link {
        println!("Link:        {}", link);
    }
    println!("Sensitive:   {}", if proposal.contains_sensitive_info { "yes" } else { "no" });
    println!("Sponsors:    {}", proposal.sponsors.len().to_string().bright_yellow());
    for sponsor in &proposal.sponsors {
        println!("  - {}", sponsor);
    }
    println!();
    println!("{}", proposal.description);
    if let Some(params) = &proposal.execution_params {
        println!();
        println!("Execution params: {}", params);
    }
}

/// Print lifecycle proposals as a table.
pub fn print_proposal_table(proposals: &[Proposal]) {
    #[derive(Tabled)]
    struct ProposalRow {
        id: u64,
        title: String,
        category: String,
        status: String,
        sponsors: usize,
        proposer: String,
    }

    if proposals.is_empty() {
        print_info("No proposals found");
        return;
    }

    let rows: Vec<ProposalRow> = proposals
        .iter()
        .map(|p| ProposalRow {
            id: p.id,
            title: p.title.clone(),
            category: p.category.to_string(),
            status: p.status.to_string(),
            sponsors: p.sponsors.len(),
            proposer: p.proposer.short(),
        })
        .collect();

    println!("{}", Table::new(rows));
}

/// Print a voting proposal with its tallies.
pub fn print_voting_proposal(proposal: &VotingProposal) {
    println!("{}", format!("Vote #{}", proposal.id).bold());
    println!("{}", "=".repeat(50));
    println!("Title:       {}", proposal.title);
    println!("Mechanism:   {}", proposal.mechanism);
    println!("Privacy:     {}", proposal.privacy);
    println!("Status:      {}", colored_voting_status(proposal.status));
    println!("Creator:     {}", proposal.creator.to_string().bright_cyan());
    println!("Window:      [{}, {})", proposal.start_height, proposal.end_height);
    println!("Quorum:      {}", proposal.quorum_requirement);
    if let Some(lifecycle_id) = proposal.lifecycle_id {
        println!("Settles:     proposal #{}", lifecycle_id);
    }
    if !proposal.role_weights.is_empty() {
        let weights: Vec<String> = proposal
            .role_weights
            .iter()
            .map(|(role, weight)| format!("{}={}", role, weight))
            .collect();
        println!("Weights:     {}", weights.join(", "));
    }
    println!(
        "Tally:       for {} / against {} / abstain {}",
        proposal.votes_for.to_string().green(),
        proposal.votes_against.to_string().red(),
        proposal.votes_abstain.to_string().yellow()
    );
    if !proposal.description.is_empty() {
        println!();
        println!("{}", proposal.description);
    }
}

/// Print voting proposals as a table.
pub fn print_voting_table(proposals: &[VotingProposal]) {
    #[derive(Tabled)]
    struct VotingRow {
        id: u64,
        title: String,
        mechanism: String,
        status: String,
        ends: u64,
        votes: u64,
    }

    if proposals.is_empty() {
        print_info("No voting proposals found");
        return;
    }

    let rows: Vec<VotingRow> = proposals
        .iter()
        .map(|p| VotingRow {
            id: p.id,
            title: p.title.clone(),
            mechanism: p.mechanism.to_string(),
            status: p.status.to_string(),
            ends: p.end_height,
            votes: p.total_votes(),
        })
        .collect();

    println!("{}", Table::new(rows));
}

pub fn print_vote(vote: &Vote) {
    println!("Voter:      {}", vote.voter.to_string().bright_cyan());
    if vote.cast_by != vote.voter {
        println!("Cast by:    {}", vote.cast_by);
    }
    println!("Direction:  {}", vote.direction);
    println!("Power:      {}", vote.power.to_string().bright_yellow());
    println!("Height:     {}", vote.cast_at);
}

pub fn print_outcome(outcome: &FinalizeOutcome) {
    println!("{}", format!("Vote #{} finalized", outcome.id).bold());
    println!("Result:     {}", colored_voting_status(outcome.status));
    println!(
        "Tally:      for {} / against {} / abstain {}",
        outcome.votes_for, outcome.votes_against, outcome.votes_abstain
    );
    if let Some(err) = outcome.quorum_error() {
        print_warning(&err.to_string());
    }
    if let Some(status) = outcome.lifecycle_status {
        println!("Linked proposal is now {}", colored_status(status));
    }
}

pub fn print_member(member: &Address, record: &MemberRecord, power: u64) {
    println!("{}", "Member".bold());
    println!("{}", "=".repeat(50));
    println!("Address:    {}", member.to_string().bright_cyan());
    println!("Hex:        {:x}", member);
    let roles: Vec<&str> = record.roles.iter().map(String::as_str).collect();
    println!("Roles:      {}", if roles.is_empty() { "-".to_string() } else { roles.join(", ") });
    println!("Power:      {}", power.to_string().bright_yellow());
    println!("Joined at:  {}", record.joined_at);
}

/// Print a list of identities, one per line.
pub fn print_addresses(title: &str, addresses: &[Address]) {
    println!("{} ({})", title.bold(), addresses.len());
    for address in addresses {
        println!("  - {}", address);
    }
}
