//! The reset/step environment surface.
//!
//! [`Environment`] is the only contract a training harness needs:
//! `reset` starts an episode and returns the first observations, `step`
//! runs one round and returns observations, rewards, and the episode
//! status. [`EconomyEnv`] implements it over the round orchestrator.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use tracing::info;

use agora_agents::{
    AgentError, AgentStore, GovernanceEngine, Market, MarketError, RoundRewards, TallyResult,
    observe_all,
};
use agora_ledger::Ledger;
use agora_types::{
    ACTION_COUNT, Action, AgentId, GovernancePhase, MarketState, OBSERVATION_LEN, Observation,
};

use crate::clock::{ClockError, SimulationClock};
use crate::config::{ConfigError, SimulationConfig, ValueRange};
use crate::logger::SimulationLogger;
use crate::round::{self, EpisodeState, RoundError, RoundParams};

/// Observations keyed by agent.
pub type Observations = BTreeMap<AgentId, Observation>;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors returned by [`Environment`] calls.
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    /// `step` was called before the first `reset`.
    #[error("environment has not been reset")]
    NotReset,

    /// `step` was called after the episode reached `max_steps`.
    #[error("episode finished at step {step}; call reset")]
    EpisodeFinished {
        /// Step the episode ended at.
        step: u64,
    },

    /// An action code outside the action table.
    #[error("invalid action code {code} for {agent_id}")]
    InvalidActionCode {
        /// Agent that submitted the code.
        agent_id: AgentId,
        /// The rejected code.
        code: u8,
    },

    /// The roster and the caller disagree.
    #[error("agent error: {source}")]
    Agent {
        /// The underlying agent error.
        #[from]
        source: AgentError,
    },

    /// The configuration failed validation.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Sampled market parameters were out of domain.
    #[error("market error: {source}")]
    Market {
        /// The underlying market error.
        #[from]
        source: MarketError,
    },

    /// The episode clock could not be created.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// The round aborted.
    #[error("round error: {source}")]
    Round {
        /// The underlying round error.
        #[from]
        source: RoundError,
    },
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Episode parameters chosen by `reset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResetInfo {
    /// Seed the episode was created from.
    pub episode_seed: u64,
    /// Sampled opening market.
    pub market: MarketState,
}

/// Diagnostics for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct StepInfo {
    /// Step count after the round.
    pub step: u64,
    /// Whether each agent's action took effect.
    pub success: BTreeMap<AgentId, bool>,
    /// Reward components per agent.
    pub rewards: RoundRewards,
    /// The tally, if a vote closed this round.
    pub tally: Option<TallyResult>,
    /// Price after the round.
    pub price: f64,
    /// Tax rate after the round.
    pub tax_rate: f64,
}

/// Everything `step` returns.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    /// Next observation for every agent.
    pub observations: Observations,
    /// Total reward for every agent.
    pub rewards: BTreeMap<AgentId, f64>,
    /// The episode ended naturally. Always false in this economy.
    pub terminated: bool,
    /// The episode hit its step limit.
    pub truncated: bool,
    /// Round diagnostics.
    pub info: StepInfo,
}

impl StepResult {
    /// Whether the episode is over.
    pub const fn is_done(&self) -> bool {
        self.terminated || self.truncated
    }
}

// ---------------------------------------------------------------------------
// Environment
// ---------------------------------------------------------------------------

/// Multi-agent reset/step contract.
pub trait Environment {
    /// Start a new episode. With `None`, the seed comes from the
    /// environment's master RNG.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError`] if the episode cannot be built.
    fn reset(&mut self, seed: Option<u64>) -> Result<(Observations, ResetInfo), EnvError>;

    /// Run one round with one action code per agent. Missing agents hold.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::NotReset`] before the first reset,
    /// [`EnvError::EpisodeFinished`] once the episode is done,
    /// [`EnvError::InvalidActionCode`] for a code outside `0..=6`, and
    /// [`EnvError::Agent`] for an agent not on the roster.
    fn step(&mut self, actions: &BTreeMap<AgentId, u8>) -> Result<StepResult, EnvError>;
}

/// The artificial economy.
pub struct EconomyEnv {
    config: SimulationConfig,
    params: RoundParams,
    roster: Vec<AgentId>,
    logger: Arc<dyn SimulationLogger>,
    master_rng: StdRng,
    episode: Option<EpisodeState>,
}

impl EconomyEnv {
    /// Build an environment. No episode exists until [`Environment::reset`].
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::Config`] if the configuration is invalid.
    pub fn new(
        config: SimulationConfig,
        logger: Arc<dyn SimulationLogger>,
    ) -> Result<Self, EnvError> {
        config.validate()?;
        let params = RoundParams {
            proposal_tax_range: config.governance.proposal_tax_range,
            voting_mode: config.voting_power_mode(),
        };
        Ok(Self {
            roster: AgentId::roster(config.world.num_agents),
            master_rng: StdRng::seed_from_u64(config.world.seed),
            params,
            config,
            logger,
            episode: None,
        })
    }

    /// The validated configuration.
    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Agents in processing order.
    pub fn roster(&self) -> &[AgentId] {
        &self.roster
    }

    /// The current episode, if `reset` has been called.
    pub const fn episode(&self) -> Option<&EpisodeState> {
        self.episode.as_ref()
    }

    pub(crate) fn install(&mut self, episode: EpisodeState) {
        self.episode = Some(episode);
    }

    /// Observations for the current episode.
    ///
    /// # Errors
    ///
    /// Returns [`EnvError::NotReset`] before the first reset.
    pub fn observe(&self) -> Result<Observations, EnvError> {
        let episode = self.episode.as_ref().ok_or(EnvError::NotReset)?;
        Ok(observe_all(&episode.agents, episode.market.state()))
    }

    /// Length of each observation vector.
    pub const fn observation_len() -> usize {
        OBSERVATION_LEN
    }

    /// Number of action codes.
    pub const fn action_count() -> usize {
        ACTION_COUNT
    }

    fn decode_actions(
        &self,
        actions: &BTreeMap<AgentId, u8>,
    ) -> Result<BTreeMap<AgentId, Action>, EnvError> {
        actions
            .iter()
            .map(|(&agent_id, &code)| {
                if self.roster.binary_search(&agent_id).is_err() {
                    return Err(AgentError::AgentNotFound(agent_id).into());
                }
                Action::from_code(code)
                    .map(|action| (agent_id, action))
                    .ok_or(EnvError::InvalidActionCode { agent_id, code })
            })
            .collect()
    }
}

fn sample(rng: &mut StdRng, range: ValueRange) -> f64 {
    rng.random_range(range.min..=range.max)
}

impl Environment for EconomyEnv {
    fn reset(&mut self, seed: Option<u64>) -> Result<(Observations, ResetInfo), EnvError> {
        let episode_seed = seed.unwrap_or_else(|| self.master_rng.random());
        let mut rng = StdRng::seed_from_u64(episode_seed);
        let market_state = MarketState {
            price: sample(&mut rng, self.config.market.price_range),
            tax_rate: sample(&mut rng, self.config.market.tax_range),
            volatility_factor: sample(&mut rng, self.config.market.volatility_range),
        };

        let episode = EpisodeState {
            episode_seed,
            clock: SimulationClock::new(self.config.world.max_steps)?,
            agents: AgentStore::initialize(
                &self.roster,
                &self.config.starting_state(),
                self.params.voting_mode,
            )?,
            market: Market::new(market_state)?,
            governance: GovernanceEngine::new(
                self.config.governance.vote_duration_steps,
                self.roster.iter().copied(),
            ),
            ledger: Ledger::new(),
        };
        let observations = observe_all(&episode.agents, episode.market.state());
        self.episode = Some(episode);

        info!(
            episode_seed,
            agents = self.config.world.num_agents,
            price = market_state.price,
            tax_rate = market_state.tax_rate,
            volatility_factor = market_state.volatility_factor,
            "episode reset"
        );
        self.logger.log_simulation_run(
            self.config.world.num_agents,
            json!({
                "episode_seed": episode_seed,
                "price": market_state.price,
                "tax_rate": market_state.tax_rate,
                "volatility_factor": market_state.volatility_factor,
                "max_steps": self.config.world.max_steps,
                "vote_duration_steps": self.config.governance.vote_duration_steps,
                "weighted_votes": self.config.governance.weighted_votes,
            }),
        );

        Ok((
            observations,
            ResetInfo {
                episode_seed,
                market: market_state,
            },
        ))
    }

    fn step(&mut self, actions: &BTreeMap<AgentId, u8>) -> Result<StepResult, EnvError> {
        let clock = self.episode.as_ref().ok_or(EnvError::NotReset)?.clock;
        if clock.is_finished() {
            return Err(EnvError::EpisodeFinished { step: clock.step() });
        }
        let decoded = self.decode_actions(actions)?;
        let episode = self.episode.as_mut().ok_or(EnvError::NotReset)?;

        let outcome = round::run_round(episode, &decoded, &self.params, self.logger.as_ref())?;

        let truncated = episode.clock.is_finished();
        if truncated {
            info!(step = episode.clock.step(), "episode reached max_steps");
        }
        Ok(StepResult {
            observations: observe_all(&episode.agents, episode.market.state()),
            rewards: outcome.rewards.totals(),
            terminated: false,
            truncated,
            info: StepInfo {
                step: episode.clock.step(),
                success: outcome.success,
                rewards: outcome.rewards,
                tally: outcome.tally,
                price: episode.market.price(),
                tax_rate: episode.market.tax_rate(),
            },
        })
    }
}

impl fmt::Debug for EconomyEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EconomyEnv")
            .field("config", &self.config)
            .field("roster", &self.roster.len())
            .field("episode", &self.episode)
            .finish_non_exhaustive()
    }
}

/// State dump used by the `render` option.
impl fmt::Display for EconomyEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(episode) = &self.episode else {
            return write!(f, "economy (not reset)");
        };
        let market = episode.market.state();
        writeln!(
            f,
            "step {}/{} | price {:.2} | tax {:.3} | volatility {:.3}",
            episode.clock.step(),
            episode.clock.max_steps(),
            market.price,
            market.tax_rate,
            market.volatility_factor,
        )?;
        match (episode.governance.phase(), episode.governance.active_proposal()) {
            (GovernancePhase::Active, Some(proposal)) => writeln!(
                f,
                "governance: {} by {} sets {} to {:.3} ({} votes)",
                proposal.id,
                proposal.proposer,
                proposal.rule.as_str(),
                proposal.value,
                episode.governance.votes().len(),
            )?,
            (phase, _) => writeln!(f, "governance: {phase:?}")?,
        }
        for (agent_id, agent) in episode.agents.iter() {
            writeln!(
                f,
                "  {agent_id}: cash {:.2} | assets {} | tokens {} | reputation {:.2} | trades {} | last {}",
                agent.cash,
                agent.assets,
                agent.tokens,
                agent.reputation,
                agent.total_trades,
                agent.last_action.map_or("-", Action::label),
            )?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
