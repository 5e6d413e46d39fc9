//! The round orchestrator.
//!
//! One round runs in five phases:
//!
//! 1. **Snapshot** -- capture every agent's record valued at the opening price.
//! 2. **Actions** -- dispatch each agent's action in ascending [`AgentId`]
//!    order. Each action mutates the shared market immediately, so later
//!    agents see the price moves of earlier ones.
//! 3. **Rewards** -- capture a second snapshot at the current price and
//!    score the difference.
//! 4. **Governance** -- tally the active proposal if its vote has closed,
//!    apply a passed rule, pay proposer and voter bonuses, and close the
//!    voting period.
//! 5. **Bookkeeping** -- cross-check the ledger against the state deltas,
//!    log every agent record, and advance the clock.
//!
//! The round is synchronous and single-threaded. Rejected actions are not
//! errors: they surface as a `false` success flag.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::{debug, info, warn};

use agora_agents::{
    AgentDelta, AgentError, AgentStore, Fill, GovernanceEngine, Market, NetWorthSnapshot,
    RoundRewards, TallyResult, VotingPowerMode, governance_bonuses,
};
use agora_ledger::{ConservationResult, Ledger};
use agora_types::{
    Action, AgentId, GovernanceEventKind, GovernanceRule, ProposalId, TradeKind,
};

use crate::clock::{ClockError, SimulationClock};
use crate::config::ValueRange;
use crate::logger::SimulationLogger;

/// Reputation granted for successfully starting a proposal.
pub const PROPOSE_REPUTATION_BONUS: f64 = 0.05;
/// Reputation granted for successfully casting a vote.
pub const VOTE_REPUTATION_BONUS: f64 = 0.02;

/// Mixing constant for per-round RNG seeds.
const ROUND_SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

/// Tolerance when comparing ledger flows with `f64` state deltas.
const LEDGER_TOLERANCE: f64 = 1e-6;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors that abort a round.
#[derive(Debug, thiserror::Error)]
pub enum RoundError {
    /// The action map and the roster disagree, or an agent record is
    /// inconsistent.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// The clock could not advance.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Every piece of mutable state in one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeState {
    /// Seed the episode was created from; per-round RNGs derive from it.
    pub episode_seed: u64,
    /// Round counter.
    pub clock: SimulationClock,
    /// Agent records.
    pub agents: AgentStore,
    /// Price and tax.
    pub market: Market,
    /// Proposal and vote state.
    pub governance: GovernanceEngine,
    /// Trade ledger.
    pub ledger: Ledger,
}

/// Parameters that stay fixed for an episode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoundParams {
    /// Range proposed tax rates are drawn from.
    pub proposal_tax_range: ValueRange,
    /// How vote weights follow reputation.
    pub voting_mode: VotingPowerMode,
}

/// What one round produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    /// The step number the round ran as.
    pub step: u64,
    /// Rewards for every agent.
    pub rewards: RoundRewards,
    /// Whether each agent's action took effect.
    pub success: BTreeMap<AgentId, bool>,
    /// The tally, if a vote closed this round.
    pub tally: Option<TallyResult>,
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Mutable view handed to each action handler.
struct ActionContext<'a> {
    state: &'a mut EpisodeState,
    params: &'a RoundParams,
    rng: &'a mut StdRng,
    logger: &'a dyn SimulationLogger,
    step: u64,
}

/// Runs one action for one agent. `Ok(false)` means the action was rejected.
type ActionHandler = fn(&mut ActionContext<'_>, AgentId) -> Result<bool, RoundError>;

/// Map an action to its handler.
const fn handler_for(action: Action) -> ActionHandler {
    match action {
        Action::Hold | Action::Reserved => handle_hold,
        Action::Buy => handle_buy,
        Action::Sell => handle_sell,
        Action::Propose => handle_propose,
        Action::VoteYes => handle_vote_yes,
        Action::VoteNo => handle_vote_no,
    }
}

#[allow(clippy::unnecessary_wraps)]
const fn handle_hold(
    _ctx: &mut ActionContext<'_>,
    _agent_id: AgentId,
) -> Result<bool, RoundError> {
    Ok(true)
}

fn handle_buy(ctx: &mut ActionContext<'_>, agent_id: AgentId) -> Result<bool, RoundError> {
    let agent = ctx.state.agents.get_mut(agent_id)?;
    let Some(fill) = ctx.state.market.apply_buy(agent) else {
        return Ok(false);
    };
    agent.voting_power = ctx.params.voting_mode.voting_power(agent.reputation);
    record_fill(ctx, agent_id, &fill);
    Ok(true)
}

fn handle_sell(ctx: &mut ActionContext<'_>, agent_id: AgentId) -> Result<bool, RoundError> {
    let agent = ctx.state.agents.get_mut(agent_id)?;
    let Some(fill) = ctx.state.market.apply_sell(agent) else {
        return Ok(false);
    };
    agent.voting_power = ctx.params.voting_mode.voting_power(agent.reputation);
    record_fill(ctx, agent_id, &fill);
    Ok(true)
}

fn handle_propose(ctx: &mut ActionContext<'_>, agent_id: AgentId) -> Result<bool, RoundError> {
    let range = ctx.params.proposal_tax_range;
    let value = ctx.rng.random_range(range.min..=range.max);

    match ctx
        .state
        .governance
        .start_proposal(agent_id, GovernanceRule::TaxRate, value, ctx.step)
    {
        Ok(proposal_id) => {
            grant_reputation(ctx, agent_id, PROPOSE_REPUTATION_BONUS)?;
            ctx.logger.log_governance_event(
                GovernanceEventKind::ProposalStarted,
                Some(agent_id),
                json!({
                    "proposal_id": proposal_id.into_inner(),
                    "rule": GovernanceRule::TaxRate.as_str(),
                    "value": value,
                    "start_step": ctx.step,
                }),
            );
            Ok(true)
        }
        Err(rejection) => {
            debug!(agent = %agent_id, %rejection, "proposal rejected");
            Ok(false)
        }
    }
}

fn handle_vote_yes(ctx: &mut ActionContext<'_>, agent_id: AgentId) -> Result<bool, RoundError> {
    handle_vote(ctx, agent_id, true)
}

fn handle_vote_no(ctx: &mut ActionContext<'_>, agent_id: AgentId) -> Result<bool, RoundError> {
    handle_vote(ctx, agent_id, false)
}

fn handle_vote(
    ctx: &mut ActionContext<'_>,
    agent_id: AgentId,
    choice: bool,
) -> Result<bool, RoundError> {
    let weight = ctx.state.agents.get(agent_id)?.voting_power;
    let proposal_id = ctx.state.governance.active_proposal().map(|p| p.id);

    match ctx.state.governance.cast_vote(agent_id, choice, weight) {
        Ok(()) => {
            grant_reputation(ctx, agent_id, VOTE_REPUTATION_BONUS)?;
            ctx.logger.log_governance_event(
                GovernanceEventKind::VoteCast,
                Some(agent_id),
                json!({
                    "proposal_id": proposal_id.map(ProposalId::into_inner),
                    "choice": choice,
                    "weight": weight,
                }),
            );
            Ok(true)
        }
        Err(rejection) => {
            debug!(agent = %agent_id, %rejection, "vote rejected");
            Ok(false)
        }
    }
}

/// Book a fill in the ledger and notify the logger.
///
/// The trade has already settled, so an amount the ledger cannot represent
/// is reported as an anomaly and the fill stands.
fn record_fill(ctx: &mut ActionContext<'_>, agent_id: AgentId, fill: &Fill) {
    let booked = match fill.kind {
        TradeKind::Buy => ctx.state.ledger.record_buy(ctx.step, agent_id, fill.price),
        TradeKind::Sell => ctx
            .state
            .ledger
            .record_sell(ctx.step, agent_id, fill.price, fill.tax),
    };
    if let Err(error) = booked {
        warn!(
            step = ctx.step,
            agent = %agent_id,
            action = fill.kind.as_str(),
            price = fill.price,
            %error,
            "trade not recorded in ledger"
        );
    }
    debug!(
        agent = %agent_id,
        action = fill.kind.as_str(),
        price = fill.price,
        new_price = fill.new_price,
        "trade filled"
    );
    ctx.logger.log_transaction(agent_id, fill.kind, fill.price, 1);
}

/// Add reputation and re-derive voting power.
fn grant_reputation(ctx: &mut ActionContext<'_>, agent_id: AgentId, amount: f64) -> Result<(), RoundError> {
    apply_reputation(&mut ctx.state.agents, ctx.params.voting_mode, agent_id, amount)
}

fn apply_reputation(
    agents: &mut AgentStore,
    mode: VotingPowerMode,
    agent_id: AgentId,
    amount: f64,
) -> Result<(), RoundError> {
    agents.apply_delta(agent_id, &AgentDelta::reputation(amount))?;
    let agent = agents.get_mut(agent_id)?;
    agent.voting_power = mode.voting_power(agent.reputation);
    Ok(())
}

/// RNG for one round, derived from the episode seed and step.
pub fn round_rng(episode_seed: u64, step: u64) -> StdRng {
    StdRng::seed_from_u64(episode_seed ^ step.wrapping_add(1).wrapping_mul(ROUND_SEED_MIX))
}

// ---------------------------------------------------------------------------
// Round
// ---------------------------------------------------------------------------

/// Run one round.
///
/// Agents missing from `actions` hold. The round is rejected before any
/// mutation if `actions` names an agent that is not on the roster.
///
/// # Errors
///
/// Returns [`RoundError`] for an unknown agent or clock overflow.
pub fn run_round(
    state: &mut EpisodeState,
    actions: &BTreeMap<AgentId, Action>,
    params: &RoundParams,
    logger: &dyn SimulationLogger,
) -> Result<RoundOutcome, RoundError> {
    if let Some(unknown) = actions.keys().find(|id| !state.agents.contains(**id)) {
        return Err(AgentError::AgentNotFound(*unknown).into());
    }

    let step = state.clock.step();
    let mut rng = round_rng(state.episode_seed, step);

    // Phase 1: snapshot at the opening price.
    let before = NetWorthSnapshot::capture(&state.agents, state.market.price());

    // Phase 2: actions in ascending agent order.
    let roster: Vec<AgentId> = state.agents.ids().collect();
    let mut success = BTreeMap::new();
    {
        let mut ctx = ActionContext {
            state: &mut *state,
            params,
            rng: &mut rng,
            logger,
            step,
        };
        for agent_id in roster {
            let action = actions.get(&agent_id).copied().unwrap_or(Action::Hold);
            let succeeded = handler_for(action)(&mut ctx, agent_id)?;
            ctx.state.agents.get_mut(agent_id)?.last_action = Some(action);
            success.insert(agent_id, succeeded);
        }
    }

    // Phase 3: score the action phase.
    let after = NetWorthSnapshot::capture(&state.agents, state.market.price());
    let mut rewards = RoundRewards::between(&before, &after);

    // Phase 4: governance.
    let tally = state.governance.tally_votes(step);
    if let Some(result) = &tally {
        settle_tally(state, params, logger, result, &mut rewards)?;
    }

    // Phase 5: bookkeeping.
    cross_check_ledger(state, &before, &after, step);
    for (agent_id, agent) in state.agents.iter() {
        logger.log_agent_state(agent_id, agent);
    }
    state.clock.advance()?;

    debug!(
        step,
        price = state.market.price(),
        tax_rate = state.market.tax_rate(),
        "round complete"
    );
    Ok(RoundOutcome {
        step,
        rewards,
        success,
        tally,
    })
}

/// Apply a tally: rule change, bonuses, events, and the end of the period.
fn settle_tally(
    state: &mut EpisodeState,
    params: &RoundParams,
    logger: &dyn SimulationLogger,
    result: &TallyResult,
    rewards: &mut RoundRewards,
) -> Result<(), RoundError> {
    let proposal = result.proposal;
    logger.log_governance_event(
        GovernanceEventKind::ProposalTallied,
        Some(proposal.proposer),
        json!({
            "proposal_id": proposal.id.into_inner(),
            "outcome": result.outcome.as_str(),
            "yes_weight": result.yes_weight,
            "no_weight": result.no_weight,
            "voters": result.votes.len(),
        }),
    );

    if result.outcome.is_passed() {
        match proposal.rule {
            GovernanceRule::TaxRate => {
                let previous = state.market.tax_rate();
                match state.market.set_tax_rate(proposal.value) {
                    Ok(()) => {
                        info!(
                            proposal_id = %proposal.id,
                            previous,
                            tax_rate = proposal.value,
                            "tax rate changed by vote"
                        );
                        logger.log_governance_event(
                            GovernanceEventKind::RuleApplied,
                            Some(proposal.proposer),
                            json!({
                                "proposal_id": proposal.id.into_inner(),
                                "rule": proposal.rule.as_str(),
                                "previous": previous,
                                "value": proposal.value,
                            }),
                        );
                    }
                    Err(err) => {
                        warn!(proposal_id = %proposal.id, %err, "passed proposal could not be applied");
                    }
                }
            }
        }
    }

    for bonus in governance_bonuses(result) {
        rewards.add_governance(bonus.agent_id, bonus.reward);
        apply_reputation(&mut state.agents, params.voting_mode, bonus.agent_id, bonus.reputation)?;
    }

    state.governance.end_voting_period();
    logger.log_governance_event(
        GovernanceEventKind::VotingPeriodEnded,
        None,
        json!({ "proposal_id": proposal.id.into_inner() }),
    );
    Ok(())
}

/// Compare each agent's ledger flows with its action-phase state delta.
fn cross_check_ledger(
    state: &EpisodeState,
    before: &NetWorthSnapshot,
    after: &NetWorthSnapshot,
    step: u64,
) {
    if let ConservationResult::Anomaly(anomaly) = state.ledger.verify_conservation(step) {
        warn!(step, %anomaly, "ledger conservation check failed");
    }

    let flows = state.ledger.agent_flows(step);
    for (agent_id, now) in &after.states {
        let Some(then) = before.states.get(agent_id) else {
            continue;
        };
        let (cash_flow, asset_flow) = flows.get(agent_id).copied().unwrap_or((0.0, 0.0));
        let cash_delta = now.cash - then.cash;
        let asset_delta = f64::from(now.assets) - f64::from(then.assets);
        if (cash_delta - cash_flow).abs() > LEDGER_TOLERANCE
            || (asset_delta - asset_flow).abs() > LEDGER_TOLERANCE
        {
            warn!(
                step,
                agent = %agent_id,
                cash_delta,
                cash_flow,
                asset_delta,
                asset_flow,
                "agent state disagrees with ledger"
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use agora_agents::StartingState;
    use agora_types::{GovernancePhase, MarketState, VoteOutcome};

    use super::*;
    use crate::logger::{LogRecord, NullLogger, RecordingLogger};

    fn state(agents: u32, vote_duration: u64) -> EpisodeState {
        state_with(agents, vote_duration, VotingPowerMode::Reputation, 100.0)
    }

    fn state_with(
        agents: u32,
        vote_duration: u64,
        mode: VotingPowerMode,
        price: f64,
    ) -> EpisodeState {
        let roster = AgentId::roster(agents);
        EpisodeState {
            episode_seed: 7,
            clock: SimulationClock::new(100).unwrap(),
            agents: AgentStore::initialize(&roster, &StartingState::default(), mode).unwrap(),
            market: Market::new(MarketState {
                price,
                tax_rate: 0.1,
                volatility_factor: 1.01,
            })
            .unwrap(),
            governance: GovernanceEngine::new(vote_duration, roster),
            ledger: Ledger::new(),
        }
    }

    fn params() -> RoundParams {
        RoundParams {
            proposal_tax_range: ValueRange::new(0.05, 0.15),
            voting_mode: VotingPowerMode::Reputation,
        }
    }

    fn a(n: u32) -> AgentId {
        AgentId::new(n)
    }

    #[test]
    fn buy_round_matches_scenario() {
        let mut state = state(1, 10);
        let actions = BTreeMap::from([(a(0), Action::Buy)]);

        let outcome = run_round(&mut state, &actions, &params(), &NullLogger).unwrap();

        let agent = state.agents.get(a(0)).unwrap();
        assert!((agent.cash - 900.0).abs() < 1e-9);
        assert_eq!(agent.assets, 1);
        assert!((agent.reputation - 1.01).abs() < 1e-9);
        assert!((agent.voting_power - 1.01).abs() < 1e-9);
        assert_eq!(agent.last_action, Some(Action::Buy));
        assert!((state.market.price() - 101.0).abs() < 1e-9);
        assert_eq!(outcome.success.get(&a(0)), Some(&true));
        assert_eq!(state.clock.step(), 1);

        // Net worth 900 + 101 - 1000 = 1, plus 0.01 * 10 reputation.
        assert!((outcome.rewards.total_for(a(0)) - 1.1).abs() < 1e-9);
    }

    #[test]
    fn later_agents_see_earlier_price_moves() {
        let mut state = state(2, 10);
        let actions = BTreeMap::from([(a(0), Action::Buy), (a(1), Action::Buy)]);
        let logger = RecordingLogger::new();

        run_round(&mut state, &actions, &params(), &logger).unwrap();

        let prices: Vec<f64> = logger
            .records()
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::Transaction { price, .. } => Some(price),
                _ => None,
            })
            .collect();
        assert_eq!(prices.len(), 2);
        assert!((prices.first().copied().unwrap() - 100.0).abs() < 1e-9);
        assert!((prices.get(1).copied().unwrap() - 101.0).abs() < 1e-9);
        assert!((state.agents.get(a(1)).unwrap().cash - 899.0).abs() < 1e-9);
    }

    #[test]
    fn rejected_sell_is_a_false_flag_not_an_error() {
        let mut state = state(1, 10);
        let actions = BTreeMap::from([(a(0), Action::Sell)]);
        let outcome = run_round(&mut state, &actions, &params(), &NullLogger).unwrap();
        assert_eq!(outcome.success.get(&a(0)), Some(&false));
        assert!(outcome.rewards.total_for(a(0)).abs() < 1e-9);
        assert!(state.ledger.is_empty());
    }

    #[test]
    fn unknown_agent_aborts_before_mutation() {
        let mut state = state(2, 10);
        let before = state.clone();
        let actions = BTreeMap::from([(a(0), Action::Buy), (a(9), Action::Buy)]);

        let result = run_round(&mut state, &actions, &params(), &NullLogger);

        assert!(matches!(
            result,
            Err(RoundError::Agent {
                source: AgentError::AgentNotFound(id)
            }) if id == a(9)
        ));
        assert_eq!(state, before);
    }

    #[test]
    fn missing_agents_hold() {
        let mut state = state(3, 10);
        let actions = BTreeMap::from([(a(1), Action::Buy)]);
        let outcome = run_round(&mut state, &actions, &params(), &NullLogger).unwrap();
        assert_eq!(state.agents.get(a(0)).unwrap().last_action, Some(Action::Hold));
        assert_eq!(outcome.success.len(), 3);
    }

    #[test]
    fn proposal_and_second_proposal_in_same_round() {
        let mut state = state(2, 10);
        let actions = BTreeMap::from([(a(0), Action::Propose), (a(1), Action::Propose)]);
        let outcome = run_round(&mut state, &actions, &params(), &NullLogger).unwrap();

        assert_eq!(outcome.success.get(&a(0)), Some(&true));
        assert_eq!(outcome.success.get(&a(1)), Some(&false));
        assert_eq!(state.governance.phase(), GovernancePhase::Active);
        let value = state.governance.active_proposal().unwrap().value;
        assert!(params().proposal_tax_range.contains(value));
        assert!((state.agents.get(a(0)).unwrap().reputation - 1.05).abs() < 1e-9);
        assert!((state.agents.get(a(1)).unwrap().reputation - 1.0).abs() < 1e-9);
    }

    #[test]
    fn full_governance_cycle_pays_bonuses_and_changes_tax() {
        let mut state = state(3, 1);
        let logger = RecordingLogger::new();

        // Round 0: agent 0 proposes, agents 1 and 2 vote yes and no.
        let round0 = BTreeMap::from([
            (a(0), Action::Propose),
            (a(1), Action::VoteYes),
            (a(2), Action::VoteNo),
        ]);
        let first = run_round(&mut state, &round0, &params(), &logger).unwrap();
        assert!(first.tally.is_none());
        let proposed = state.governance.active_proposal().unwrap().value;

        // Round 1: agent 0 votes yes; the vote closes at step 1.
        let round1 = BTreeMap::from([(a(0), Action::VoteYes)]);
        let second = run_round(&mut state, &round1, &params(), &logger).unwrap();

        let tally = second.tally.unwrap();
        assert_eq!(tally.outcome, VoteOutcome::Passed);
        assert!((state.market.tax_rate() - proposed).abs() < f64::EPSILON);
        assert_eq!(state.governance.phase(), GovernancePhase::Idle);

        // Proposer: +50 as proposer, +10 as winning voter, +0.02 * 10 for voting.
        assert!((second.rewards.total_for(a(0)) - 60.2).abs() < 1e-9);
        // Agent 1 voted with the winners last round.
        assert!((second.rewards.total_for(a(1)) - 10.0).abs() < 1e-9);
        assert!(second.rewards.total_for(a(2)).abs() < 1e-9);

        // Reputation: 1 + 0.05 + 0.02 + 0.25 + 0.1.
        let proposer = state.agents.get(a(0)).unwrap();
        assert!((proposer.reputation - 1.42).abs() < 1e-9);
        assert!((proposer.voting_power - 1.42).abs() < 1e-9);

        let kinds: Vec<GovernanceEventKind> = logger
            .records()
            .into_iter()
            .filter_map(|r| match r {
                LogRecord::GovernanceEvent { kind, .. } => Some(kind),
                _ => None,
            })
            .collect();
        assert_eq!(
            kinds,
            vec![
                GovernanceEventKind::ProposalStarted,
                GovernanceEventKind::VoteCast,
                GovernanceEventKind::VoteCast,
                GovernanceEventKind::VoteCast,
                GovernanceEventKind::ProposalTallied,
                GovernanceEventKind::RuleApplied,
                GovernanceEventKind::VotingPeriodEnded,
            ]
        );
    }

    #[test]
    fn failed_proposal_keeps_tax_and_pays_no_voters() {
        let mut state = state(2, 1);
        let round0 = BTreeMap::from([(a(0), Action::Propose), (a(1), Action::VoteNo)]);
        run_round(&mut state, &round0, &params(), &NullLogger).unwrap();
        let second = run_round(&mut state, &BTreeMap::new(), &params(), &NullLogger).unwrap();

        assert_eq!(second.tally.map(|t| t.outcome), Some(VoteOutcome::Failed));
        assert!((state.market.tax_rate() - 0.1).abs() < f64::EPSILON);
        assert!((second.rewards.total_for(a(0)) - 50.0).abs() < 1e-9);
        assert!((second.rewards.total_for(a(1)) - 10.0).abs() < 1e-9);
    }

    #[test]
    fn trades_are_booked_in_the_ledger() {
        let mut state = state(2, 10);
        state.agents.get_mut(a(1)).unwrap().assets = 1;
        let actions = BTreeMap::from([(a(0), Action::Buy), (a(1), Action::Sell)]);
        run_round(&mut state, &actions, &params(), &NullLogger).unwrap();

        assert_eq!(state.ledger.entries_for_round(0).len(), 5);
        assert!(state.ledger.verify_conservation(0).is_balanced());
        let flows = state.ledger.agent_flows(0);
        let (cash, assets) = flows.get(&a(1)).copied().unwrap();
        assert!((cash - 101.0 * 0.9).abs() < 1e-6);
        assert!((assets + 1.0).abs() < 1e-9);
    }

    #[test]
    fn buy_above_decimal_range_still_settles() {
        let mut state = state_with(2, 10, VotingPowerMode::Reputation, 1e29);
        for agent in [a(0), a(1)] {
            state.agents.get_mut(agent).unwrap().cash = 1e31;
        }
        let actions = BTreeMap::from([(a(0), Action::Buy), (a(1), Action::Buy)]);
        let logger = RecordingLogger::new();

        let outcome = run_round(&mut state, &actions, &params(), &logger).unwrap();

        assert_eq!(outcome.success.get(&a(0)), Some(&true));
        assert_eq!(outcome.success.get(&a(1)), Some(&true));
        assert_eq!(state.agents.get(a(0)).unwrap().assets, 1);
        assert_eq!(state.agents.get(a(1)).unwrap().assets, 1);
        assert!(state.market.price() > 1e29);
        assert_eq!(state.clock.step(), 1);
        assert!(state.ledger.is_empty());
        let trades = logger
            .records()
            .iter()
            .filter(|r| matches!(r, LogRecord::Transaction { .. }))
            .count();
        assert_eq!(trades, 2);
    }

    #[test]
    fn sell_below_decimal_precision_still_settles() {
        let mut state = state_with(2, 10, VotingPowerMode::Reputation, 1e-30);
        for agent in [a(0), a(1)] {
            state.agents.get_mut(agent).unwrap().assets = 5;
        }
        let actions = BTreeMap::from([(a(0), Action::Sell), (a(1), Action::Sell)]);

        let outcome = run_round(&mut state, &actions, &params(), &NullLogger).unwrap();

        assert_eq!(outcome.success.get(&a(0)), Some(&true));
        assert_eq!(outcome.success.get(&a(1)), Some(&true));
        assert_eq!(state.agents.get(a(0)).unwrap().assets, 4);
        assert_eq!(state.agents.get(a(1)).unwrap().assets, 4);
        assert!(state.market.price() < 1e-30);
        assert_eq!(state.clock.step(), 1);
        assert!(state.ledger.verify_conservation(0).is_balanced());
    }

    #[test]
    fn flat_votes_weigh_one_regardless_of_reputation() {
        let flat = RoundParams {
            proposal_tax_range: ValueRange::new(0.05, 0.15),
            voting_mode: VotingPowerMode::Flat,
        };
        let mut state = state_with(2, 2, VotingPowerMode::Flat, 100.0);
        state.agents.get_mut(a(1)).unwrap().reputation = 2.0;

        // Round 0: agent 0 proposes while agent 1 trades.
        let round0 = BTreeMap::from([(a(0), Action::Propose), (a(1), Action::Buy)]);
        run_round(&mut state, &round0, &flat, &NullLogger).unwrap();
        assert!((state.agents.get(a(1)).unwrap().voting_power - 1.0).abs() < f64::EPSILON);

        // Round 1: agent 1 votes with reputation above 2.
        let round1 = BTreeMap::from([(a(1), Action::VoteYes)]);
        run_round(&mut state, &round1, &flat, &NullLogger).unwrap();
        let vote = state.governance.votes().get(&a(1)).copied().unwrap();
        assert!((vote.weight - 1.0).abs() < f64::EPSILON);
        assert!((state.agents.get(a(1)).unwrap().voting_power - 1.0).abs() < f64::EPSILON);

        // Round 2: the tally pays governance bonuses.
        let last = run_round(&mut state, &BTreeMap::new(), &flat, &NullLogger).unwrap();
        let tally = last.tally.unwrap();
        assert!((tally.yes_weight - 1.0).abs() < f64::EPSILON);
        let voter = state.agents.get(a(1)).unwrap();
        assert!(voter.reputation > 2.0);
        assert!((voter.voting_power - 1.0).abs() < f64::EPSILON);
        let proposer = state.agents.get(a(0)).unwrap();
        assert!((proposer.voting_power - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn every_agent_state_is_logged_each_round() {
        let mut state = state(4, 10);
        let logger = RecordingLogger::new();
        run_round(&mut state, &BTreeMap::new(), &params(), &logger).unwrap();
        let states = logger
            .records()
            .iter()
            .filter(|r| matches!(r, LogRecord::AgentState { .. }))
            .count();
        assert_eq!(states, 4);
    }

    #[test]
    fn round_rng_depends_on_seed_and_step() {
        let x: u64 = round_rng(1, 0).random();
        let y: u64 = round_rng(1, 0).random();
        let z: u64 = round_rng(1, 1).random();
        assert_eq!(x, y);
        assert_ne!(x, z);
    }
}
