//! The proposal/vote/tally state machine.
//!
//! # Lifecycle
//!
//! ```text
//!   Idle --start_proposal--> Active --tally_votes--> Tallied
//!    ^                         |                        |
//!    +------end_voting_period--+------------------------+
//! ```
//!
//! Exactly one proposal may be active at a time. Votes are keyed by agent,
//! so each eligible agent votes at most once per proposal. A tally is
//! computed once, when the vote duration has elapsed, and the outcome is
//! returned to the caller exactly once. The caller distributes rewards and
//! applies the rule change before calling
//! [`GovernanceEngine::end_voting_period`], which discards the votes but
//! keeps the last proposal readable.
//!
//! Rejections are typed ([`GovernanceRejection`]) but are not failures of
//! the round: the orchestrator maps them to a `false` success flag.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use agora_types::{
    AgentId, GovernancePhase, GovernanceRule, Proposal, ProposalId, Vote, VoteOutcome,
};

/// Weight of a vote when no reputation weighting applies.
pub const DEFAULT_VOTE_WEIGHT: f64 = 1.0;

// ---------------------------------------------------------------------------
// Rejections
// ---------------------------------------------------------------------------

/// Why a governance call was refused. The engine state is unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceRejection {
    /// A proposal is already active or awaiting `end_voting_period`.
    #[error("proposal {0} is still in progress")]
    ProposalInProgress(ProposalId),

    /// There is no active proposal to vote on.
    #[error("no active proposal (phase {0:?})")]
    NoActiveProposal(GovernancePhase),

    /// The agent is not in the eligible-voter set.
    #[error("agent {0} is not eligible to vote")]
    NotEligible(AgentId),

    /// The agent has already voted on the active proposal.
    #[error("agent {0} has already voted")]
    AlreadyVoted(AgentId),
}

// ---------------------------------------------------------------------------
// TallyResult
// ---------------------------------------------------------------------------

/// The one-time scoring of a completed vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TallyResult {
    /// The proposal that was tallied.
    pub proposal: Proposal,
    /// `Passed` iff `yes_weight > no_weight`.
    pub outcome: VoteOutcome,
    /// Summed weight of yes votes.
    pub yes_weight: f64,
    /// Summed weight of no votes.
    pub no_weight: f64,
    /// Every vote counted, keyed by voter.
    pub votes: BTreeMap<AgentId, Vote>,
}

impl TallyResult {
    /// Voters whose choice matched the outcome, in ascending ID order.
    ///
    /// For a passed proposal these are the yes-voters, for a failed one
    /// the no-voters.
    pub fn winning_voters(&self) -> Vec<AgentId> {
        let winning_choice = self.outcome.is_passed();
        self.votes
            .iter()
            .filter(|(_, vote)| vote.choice == winning_choice)
            .map(|(id, _)| *id)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// GovernanceEngine
// ---------------------------------------------------------------------------

/// Owns the single active-proposal slot and its vote collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceEngine {
    /// Rounds a proposal stays open before it can be tallied.
    vote_duration: u64,
    /// Current lifecycle phase.
    phase: GovernancePhase,
    /// The proposal in `Active` or `Tallied`, if any.
    proposal: Option<Proposal>,
    /// Votes on the current proposal.
    votes: BTreeMap<AgentId, Vote>,
    /// Agents allowed to vote.
    eligible: BTreeSet<AgentId>,
    /// Sequence number for the next proposal.
    next_id: u64,
    /// Most recent proposal, kept after `end_voting_period`.
    last_proposal: Option<Proposal>,
}

impl GovernanceEngine {
    /// Create an idle engine with the given vote duration and voter roll.
    pub fn new(vote_duration: u64, eligible: impl IntoIterator<Item = AgentId>) -> Self {
        Self {
            vote_duration,
            phase: GovernancePhase::Idle,
            proposal: None,
            votes: BTreeMap::new(),
            eligible: eligible.into_iter().collect(),
            next_id: 1,
            last_proposal: None,
        }
    }

    /// Current lifecycle phase.
    pub const fn phase(&self) -> GovernancePhase {
        self.phase
    }

    /// The proposal currently `Active` or `Tallied`.
    pub const fn active_proposal(&self) -> Option<&Proposal> {
        self.proposal.as_ref()
    }

    /// The most recently started proposal, readable after the voting
    /// period has ended.
    pub const fn proposal_details(&self) -> Option<&Proposal> {
        self.last_proposal.as_ref()
    }

    /// Votes recorded on the current proposal.
    pub const fn votes(&self) -> &BTreeMap<AgentId, Vote> {
        &self.votes
    }

    /// Configured vote duration in rounds.
    pub const fn vote_duration(&self) -> u64 {
        self.vote_duration
    }

    /// Whether the agent may vote.
    pub fn is_eligible(&self, agent_id: AgentId) -> bool {
        self.eligible.contains(&agent_id)
    }

    /// Open a new proposal. Valid only while `Idle`.
    ///
    /// # Errors
    ///
    /// Returns [`GovernanceRejection::ProposalInProgress`] while a proposal
    /// is `Active` or `Tallied`.
    pub fn start_proposal(
        &mut self,
        proposer: AgentId,
        rule: GovernanceRule,
        value: f64,
        current_step: u64,
    ) -> Result<ProposalId, GovernanceRejection> {
        if let Some(current) = &self.proposal {
            return Err(GovernanceRejection::ProposalInProgress(current.id));
        }

        let id = ProposalId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);

        let proposal = Proposal {
            id,
            proposer,
            rule,
            value,
            start_step: current_step,
        };
        self.votes.clear();
        self.proposal = Some(proposal);
        self.last_proposal = Some(proposal);
        self.phase = GovernancePhase::Active;

        info!(
            proposal_id = %id,
            proposer = %proposer,
            rule = rule.as_str(),
            value,
            step = current_step,
            "proposal started"
        );
        Ok(id)
    }

    /// Record a vote on the active proposal.
    ///
    /// # Errors
    ///
    /// Rejects the vote, leaving any earlier vote in place, when no proposal
    /// is `Active`, the agent is not eligible, or the agent already voted.
    pub fn cast_vote(
        &mut self,
        agent_id: AgentId,
        choice: bool,
        weight: f64,
    ) -> Result<(), GovernanceRejection> {
        if self.phase != GovernancePhase::Active {
            return Err(GovernanceRejection::NoActiveProposal(self.phase));
        }
        if !self.eligible.contains(&agent_id) {
            return Err(GovernanceRejection::NotEligible(agent_id));
        }
        if self.votes.contains_key(&agent_id) {
            return Err(GovernanceRejection::AlreadyVoted(agent_id));
        }

        self.votes.insert(agent_id, Vote { choice, weight });
        debug!(agent = %agent_id, choice, weight, "vote cast");
        Ok(())
    }

    /// Tally the active proposal once its vote duration has elapsed.
    ///
    /// Returns `None` unless the engine is `Active` and
    /// `current_step >= start_step + vote_duration`. The outcome is returned
    /// at most once per proposal; later calls return `None` until
    /// [`end_voting_period`](Self::end_voting_period).
    pub fn tally_votes(&mut self, current_step: u64) -> Option<TallyResult> {
        if self.phase != GovernancePhase::Active {
            return None;
        }
        let proposal = self.proposal?;
        let closes_at = proposal.start_step.saturating_add(self.vote_duration);
        if current_step < closes_at {
            return None;
        }

        let (yes_weight, no_weight) =
            self.votes
                .values()
                .fold((0.0_f64, 0.0_f64), |(yes, no), vote| {
                    if vote.choice {
                        (yes + vote.weight, no)
                    } else {
                        (yes, no + vote.weight)
                    }
                });
        let outcome = if yes_weight > no_weight {
            VoteOutcome::Passed
        } else {
            VoteOutcome::Failed
        };
        self.phase = GovernancePhase::Tallied;

        info!(
            proposal_id = %proposal.id,
            outcome = outcome.as_str(),
            yes_weight,
            no_weight,
            voters = self.votes.len(),
            step = current_step,
            "proposal tallied"
        );
        Some(TallyResult {
            proposal,
            outcome,
            yes_weight,
            no_weight,
            votes: self.votes.clone(),
        })
    }

    /// Close the voting period and return to `Idle`.
    ///
    /// Valid from `Tallied` or `Active` (a forced close). A no-op from
    /// `Idle`. Returns whether a period was closed.
    pub fn end_voting_period(&mut self) -> bool {
        if self.phase == GovernancePhase::Idle {
            return false;
        }
        let closed = self.proposal.take();
        self.votes.clear();
        self.phase = GovernancePhase::Idle;
        if let Some(proposal) = closed {
            info!(proposal_id = %proposal.id, "voting period ended");
        }
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
