//! CLI command implementations.
//!
//! Every command opens the ledger in `data_dir`, runs one governance
//! operation as the `--as` identity at `--height`, and exits.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use carecoop_core::ManualClock;
use carecoop_governance::{
    Governance, PrivacyLevel, Proposal, ProposalCategory, ProposalDraft, ProposalStatus, ProposalUpdate,
    VoteDirection, VotingMechanism, VotingProposal, VotingProposalParams, VotingStatus,
};
use carecoop_storage::FileLedger;
use carecoop_types::{Address, BlockHeight};
use clap::{Parser, Subcommand};

use crate::config::{parse_identity, CliConfig};
use crate::output::*;

/// Main CLI.
#[derive(Parser)]
#[command(name = "carecoop")]
#[command(about = "CareCoop cooperative governance")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Config file (defaults to ./carecoop.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Identity to act as: a coop1/0x address or a label
    #[arg(long = "as", global = true, env = "CARECOOP_IDENTITY", default_value = "admin")]
    pub identity: String,

    /// Block height the command executes at
    #[arg(long, global = true, env = "CARECOOP_HEIGHT", default_value_t = 0)]
    pub height: BlockHeight,

    /// Log level filter, overrides [logging] level
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Print records as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Membership registry
    #[command(subcommand)]
    Member(MemberCommands),

    /// Registry admin
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Vote delegation
    #[command(subcommand)]
    Delegate(DelegateCommands),

    /// Proposal lifecycle
    #[command(subcommand)]
    Proposal(ProposalCommands),

    /// Voting proposals and ballots
    #[command(subcommand)]
    Vote(VoteCommands),

    /// Configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

/// Member commands.
#[derive(Subcommand)]
pub enum MemberCommands {
    /// Register a member (admin only)
    Register {
        member: String,
        /// Role, repeatable
        #[arg(short, long = "role")]
        roles: Vec<String>,
        /// Base voting power for quadratic votes
        #[arg(short, long, default_value_t = 0)]
        power: u64,
    },
    /// Replace a member's roles (admin only)
    Roles {
        member: String,
        #[arg(short, long = "role")]
        roles: Vec<String>,
    },
    /// Set a member's base voting power (admin only)
    Power { member: String, power: u64 },
    /// Show a member
    Show { member: String },
}

/// Admin commands.
#[derive(Subcommand)]
pub enum AdminCommands {
    /// Show the current admin
    Show,
    /// Hand the admin role to another identity
    Transfer { new_admin: String },
}

/// Delegation commands.
#[derive(Subcommand)]
pub enum DelegateCommands {
    /// Delegate your vote
    Set { to: String },
    /// Stop delegating
    Remove,
    /// Show a member's delegate and effective voter
    Show { member: String },
    /// List members delegating to a member
    Delegators { member: String },
}

/// Proposal commands.
#[derive(Subcommand)]
pub enum ProposalCommands {
    /// Create a draft proposal
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        link: Option<String>,
        #[arg(long, default_value = "other")]
        category: String,
        /// Mark the proposal as containing sensitive information
        #[arg(long)]
        sensitive: bool,
        #[arg(long)]
        params: Option<String>,
    },
    /// Submit a draft for sponsorship
    Submit { id: u64 },
    /// Sponsor a pending proposal
    Sponsor { id: u64 },
    /// Edit a draft
    Update {
        id: u64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        link: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        params: Option<String>,
    },
    /// Cancel a proposal
    Cancel { id: u64 },
    /// Execute a passed proposal
    Execute { id: u64 },
    /// Mark an active proposal passed (voting engine identity only)
    MarkPassed { id: u64 },
    /// Mark an active proposal rejected (voting engine identity only)
    MarkRejected { id: u64 },
    /// Show a proposal
    Show { id: u64 },
    /// List proposals
    List {
        #[arg(long)]
        status: Option<String>,
        #[arg(long)]
        category: Option<String>,
        /// Proposals this identity proposed or sponsored
        #[arg(long)]
        member: Option<String>,
    },
    /// Authorize a viewer for a sensitive proposal
    Authorize { id: u64, viewer: String },
    /// Revoke a viewer's authorization
    Revoke { id: u64, viewer: String },
    /// List authorized viewers
    Viewers { id: u64 },
    /// Check whether an identity can see a proposal's sensitive content
    Access { id: u64, viewer: String },
}

/// Voting commands.
#[derive(Subcommand)]
pub enum VoteCommands {
    /// Open a vote
    Create {
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        /// simple-majority, quadratic or role-weighted
        #[arg(long, default_value = "simple-majority")]
        mechanism: String,
        /// public or private
        #[arg(long, default_value = "public")]
        privacy: String,
        /// Voting period in blocks
        #[arg(long)]
        duration: u64,
        #[arg(long, default_value_t = 0)]
        quorum: u64,
        /// Role weight as role=weight, repeatable
        #[arg(long = "weight")]
        weights: Vec<String>,
        /// Lifecycle proposal settled by this vote
        #[arg(long)]
        proposal: Option<u64>,
    },
    /// Cast a ballot: for, against or abstain
    Cast { id: u64, direction: String },
    /// Settle a vote whose period has ended
    Finalize { id: u64 },
    /// Show a voting proposal
    Show { id: u64 },
    /// Show the ballot recorded for a voter
    Get { id: u64, voter: String },
    /// Whether a member's effective voter has voted
    HasVoted { id: u64, member: String },
    /// List voting proposals
    List {
        #[arg(long, default_value = "active")]
        status: String,
    },
}

/// Configuration commands.
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,
    /// Write the default configuration to a file
    Init {
        #[arg(default_value = crate::config::DEFAULT_CONFIG_FILE)]
        path: PathBuf,
    },
}

fn parse_weights(weights: &[String]) -> anyhow::Result<BTreeMap<String, u64>> {
    weights
        .iter()
        .map(|entry| {
            let (role, weight) = entry
                .split_once('=')
                .ok_or_else(|| anyhow::anyhow!("weight '{}' must look like role=weight", entry))?;
            let weight: u64 = weight
                .trim()
                .parse()
                .map_err(|e| anyhow::anyhow!("invalid weight in '{}': {}", entry, e))?;
            Ok((role.trim().to_string(), weight))
        })
        .collect()
}

fn open(config: &CliConfig, height: BlockHeight) -> anyhow::Result<Governance> {
    let ledger = FileLedger::open(&config.data_dir)?;
    let governance = Governance::new(
        Arc::new(ledger),
        config.governance.clone(),
        config.admin_config()?,
        Arc::new(config.token_balances()?),
        Arc::new(ManualClock::new(height)),
    )?;
    Ok(governance)
}

fn load_proposals(governance: &Governance, caller: &Address, ids: &[u64]) -> anyhow::Result<Vec<Proposal>> {
    ids.iter()
        .map(|id| Ok(governance.lifecycle().get(caller, *id)?))
        .collect()
}

fn load_votes(governance: &Governance, ids: &[u64]) -> anyhow::Result<Vec<VotingProposal>> {
    ids.iter()
        .map(|id| Ok(governance.voting().get_proposal(*id)?))
        .collect()
}

/// Execute a parsed command.
pub fn execute(cli: Cli, config: CliConfig) -> anyhow::Result<()> {
    if let Commands::Config(cmd) = &cli.command {
        return execute_config(cmd, &config);
    }

    let caller = parse_identity(&cli.identity)?;
    let governance = open(&config, cli.height)?;
    let ctx = governance.context(caller);
    tracing::debug!(caller = %caller, height = ctx.height, "Executing command");

    match cli.command {
        Commands::Member(cmd) => {
            let registry = governance.registry();
            match cmd {
                MemberCommands::Register { member, roles, power } => {
                    let member = parse_identity(&member)?;
                    registry.register_member(&ctx, member, roles, power)?;
                    print_success(&format!("Registered {}", member));
                }
                MemberCommands::Roles { member, roles } => {
                    let member = parse_identity(&member)?;
                    registry.update_roles(&ctx, member, roles)?;
                    print_success(&format!("Updated roles of {}", member));
                }
                MemberCommands::Power { member, power } => {
                    let member = parse_identity(&member)?;
                    registry.update_voting_power(&ctx, member, power)?;
                    print_success(&format!("Voting power of {} set to {}", member, power));
                }
                MemberCommands::Show { member } => {
                    let member = parse_identity(&member)?;
                    match registry.get_member(&member)? {
                        Some(record) if cli.json => print_json(&record)?,
                        Some(record) => print_member(&member, &record, registry.get_voting_power(&member)?),
                        None => print_warning(&format!("{} is not a member", member)),
                    }
                }
            }
        }

        Commands::Admin(cmd) => match cmd {
            AdminCommands::Show => {
                let admin = governance.registry().admin()?;
                println!("{}", admin);
            }
            AdminCommands::Transfer { new_admin } => {
                let new_admin = parse_identity(&new_admin)?;
                governance.registry().transfer_admin(&ctx, new_admin)?;
                print_success(&format!("Admin transferred to {}", new_admin));
            }
        },

        Commands::Delegate(cmd) => {
            let delegation = governance.delegation();
            match cmd {
                DelegateCommands::Set { to } => {
                    let to = parse_identity(&to)?;
                    delegation.set_delegation(&ctx, to)?;
                    print_success(&format!("Delegated to {}", to));
                }
                DelegateCommands::Remove => {
                    delegation.remove_delegation(&ctx)?;
                    print_success("Delegation removed");
                }
                DelegateCommands::Show { member } => {
                    let member = parse_identity(&member)?;
                    match delegation.get_delegation(&member)? {
                        Some(delegate) => println!("Delegate:        {}", delegate),
                        None => println!("Delegate:        -"),
                    }
                    println!("Effective voter: {}", delegation.resolve(&member)?);
                }
                DelegateCommands::Delegators { member } => {
                    let member = parse_identity(&member)?;
                    print_addresses("Delegators", &delegation.get_delegators(&member)?);
                }
            }
        }

        Commands::Proposal(cmd) => execute_proposal(cmd, &governance, &ctx, cli.json)?,

        Commands::Vote(cmd) => execute_vote(cmd, &governance, &ctx, cli.json)?,

        Commands::Config(_) => {}
    }

    Ok(())
}

fn execute_proposal(
    cmd: ProposalCommands,
    governance: &Governance,
    ctx: &carecoop_core::CallContext,
    json: bool,
) -> anyhow::Result<()> {
    let lifecycle = governance.lifecycle();

    match cmd {
        ProposalCommands::Create {
            title,
            description,
            link,
            category,
            sensitive,
            params,
        } => {
            let draft = ProposalDraft {
                title,
                description,
                link,
                category: category.parse()?,
                contains_sensitive_info: sensitive,
                execution_params: params,
            };
            let id = lifecycle.create(ctx, draft)?;
            print_success(&format!("Created proposal #{}", id));
        }
        ProposalCommands::Submit { id } => {
            lifecycle.submit(ctx, id)?;
            print_success(&format!("Submitted proposal #{}", id));
        }
        ProposalCommands::Sponsor { id } => {
            let status = lifecycle.sponsor(ctx, id)?;
            print_success(&format!("Sponsored proposal #{}", id));
            if status == ProposalStatus::Active {
                print_info("Proposal is active");
            }
        }
        ProposalCommands::Update {
            id,
            title,
            description,
            link,
            category,
            params,
        } => {
            let update = ProposalUpdate {
                title,
                description,
                link,
                category: category.map(|c| c.parse::<ProposalCategory>()).transpose()?,
                execution_params: params,
            };
            lifecycle.update(ctx, id, update)?;
            print_success(&format!("Updated proposal #{}", id));
        }
        ProposalCommands::Cancel { id } => {
            lifecycle.cancel(ctx, id)?;
            print_success(&format!("Cancelled proposal #{}", id));
        }
        ProposalCommands::Execute { id } => {
            lifecycle.execute(ctx, id)?;
            print_success(&format!("Executed proposal #{}", id));
        }
        ProposalCommands::MarkPassed { id } => {
            lifecycle.mark_passed(ctx, id)?;
            print_success(&format!("Proposal #{} passed", id));
        }
        ProposalCommands::MarkRejected { id } => {
            lifecycle.mark_rejected(ctx, id)?;
            print_success(&format!("Proposal #{} rejected", id));
        }
        ProposalCommands::Show { id } => {
            let proposal = lifecycle.get(&ctx.caller, id)?;
            if json {
                print_json(&proposal)?;
            } else {
                print_proposal(&proposal);
            }
        }
        ProposalCommands::List {
            status,
            category,
            member,
        } => {
            let ids = match (status, category, member) {
                (Some(status), None, None) => lifecycle.list_by_status(status.parse()?)?,
                (None, Some(category), None) => lifecycle.list_by_category(category.parse()?)?,
                (None, None, Some(member)) => lifecycle.list_for_member(&parse_identity(&member)?)?,
                (None, None, None) => lifecycle.list_for_member(&ctx.caller)?,
                _ => anyhow::bail!("use at most one of --status, --category, --member"),
            };
            let proposals = load_proposals(governance, &ctx.caller, &ids)?;
            if json {
                print_json(&proposals)?;
            } else {
                print_proposal_table(&proposals);
            }
        }
        ProposalCommands::Authorize { id, viewer } => {
            let viewer = parse_identity(&viewer)?;
            lifecycle.authorize_viewer(ctx, id, viewer)?;
            print_success(&format!("{} may view proposal #{}", viewer, id));
        }
        ProposalCommands::Revoke { id, viewer } => {
            let viewer = parse_identity(&viewer)?;
            lifecycle.revoke_authorization(ctx, id, viewer)?;
            print_success(&format!("Revoked {} on proposal #{}", viewer, id));
        }
        ProposalCommands::Viewers { id } => {
            print_addresses("Authorized viewers", &lifecycle.get_authorized_viewers(&ctx.caller, id)?);
        }
        ProposalCommands::Access { id, viewer } => {
            let viewer = parse_identity(&viewer)?;
            let allowed = lifecycle.check_sensitive_access(id, &viewer)?;
            println!("{}", allowed);
        }
    }

    Ok(())
}

fn execute_vote(
    cmd: VoteCommands,
    governance: &Governance,
    ctx: &carecoop_core::CallContext,
    json: bool,
) -> anyhow::Result<()> {
    let voting = governance.voting();

    match cmd {
        VoteCommands::Create {
            title,
            description,
            mechanism,
            privacy,
            duration,
            quorum,
            weights,
            proposal,
        } => {
            let params = VotingProposalParams {
                title,
                description,
                mechanism: mechanism.parse::<VotingMechanism>()?,
                privacy: privacy.parse::<PrivacyLevel>()?,
                duration,
                quorum_requirement: quorum,
                role_weights: parse_weights(&weights)?,
                lifecycle_id: proposal,
            };
            let id = voting.create_proposal(ctx, params)?;
            print_success(&format!("Opened vote #{}", id));
        }
        VoteCommands::Cast { id, direction } => {
            let vote = voting.cast_vote(ctx, id, direction.parse::<VoteDirection>()?)?;
            print_success(&format!("Voted {} on #{} with power {}", vote.direction, id, vote.power));
        }
        VoteCommands::Finalize { id } => {
            let outcome = voting.finalize(ctx, id)?;
            if json {
                print_json(&outcome)?;
            } else {
                print_outcome(&outcome);
            }
        }
        VoteCommands::Show { id } => {
            let proposal = voting.get_proposal(id)?;
            if json {
                print_json(&proposal)?;
            } else {
                print_voting_proposal(&proposal);
            }
        }
        VoteCommands::Get { id, voter } => {
            let voter = parse_identity(&voter)?;
            match voting.get_vote(&ctx.caller, id, &voter)? {
                Some(vote) if json => print_json(&vote)?,
                Some(vote) => print_vote(&vote),
                None => print_info(&format!("{} has no ballot on #{}", voter, id)),
            }
        }
        VoteCommands::HasVoted { id, member } => {
            let member = parse_identity(&member)?;
            println!("{}", voting.has_voted(id, &member)?);
        }
        VoteCommands::List { status } => {
            let ids = voting.list_by_status(status.parse::<VotingStatus>()?)?;
            let proposals = load_votes(governance, &ids)?;
            if json {
                print_json(&proposals)?;
            } else {
                print_voting_table(&proposals);
            }
        }
    }

    Ok(())
}

fn execute_config(cmd: &ConfigCommands, config: &CliConfig) -> anyhow::Result<()> {
    match cmd {
        ConfigCommands::Show => {
            print!("{}", toml::to_string_pretty(config)?);
        }
        ConfigCommands::Init { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            CliConfig::default().to_file(path)?;
            print_success(&format!("Wrote {}", path.display()));
        }
    }
    Ok(())
}
