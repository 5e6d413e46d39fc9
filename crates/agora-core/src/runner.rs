//! Episode loop.
//!
//! [`run_episode`] resets the environment, asks the action source for
//! actions every round, steps until the episode is done, and reports a
//! summary. A [`RoundCallback`] sees every round as it completes.

use std::collections::BTreeMap;

use tracing::info;

use agora_types::AgentId;

use crate::env::{EconomyEnv, EnvError, Environment, StepResult};
use crate::policy::{ActionSource, PolicyError};

/// Errors that can occur while running an episode.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// The environment rejected a call.
    #[error("environment error: {source}")]
    Env {
        /// The underlying environment error.
        #[from]
        source: EnvError,
    },

    /// The action source failed.
    #[error("policy error: {source}")]
    Policy {
        /// The underlying policy error.
        #[from]
        source: PolicyError,
    },
}

/// Summary of one finished episode.
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeResult {
    /// Seed the episode ran with.
    pub episode_seed: u64,
    /// Rounds executed.
    pub rounds: u64,
    /// Sum of each agent's rewards.
    pub cumulative_rewards: BTreeMap<AgentId, f64>,
    /// Price at the end of the episode.
    pub final_price: f64,
    /// Tax rate at the end of the episode.
    pub final_tax_rate: f64,
    /// Proposals that passed.
    pub proposals_passed: u32,
    /// Proposals that failed.
    pub proposals_failed: u32,
}

/// Called after each round completes.
pub trait RoundCallback {
    /// Called with the round's result and the environment after the round.
    fn on_round(&mut self, result: &StepResult, env: &EconomyEnv);
}

/// A callback that does nothing.
pub struct NoOpCallback;

impl RoundCallback for NoOpCallback {
    fn on_round(&mut self, _result: &StepResult, _env: &EconomyEnv) {}
}

/// Run one episode to completion.
///
/// # Errors
///
/// Returns [`RunnerError`] if the environment or the action source fails.
pub fn run_episode(
    env: &mut EconomyEnv,
    seed: Option<u64>,
    policy: &mut dyn ActionSource,
    callback: &mut dyn RoundCallback,
) -> Result<EpisodeResult, RunnerError> {
    let (mut observations, reset) = env.reset(seed)?;

    let mut cumulative_rewards: BTreeMap<AgentId, f64> =
        observations.keys().map(|&id| (id, 0.0)).collect();
    let mut rounds: u64 = 0;
    let mut proposals_passed: u32 = 0;
    let mut proposals_failed: u32 = 0;

    let (final_price, final_tax_rate) = loop {
        let actions = policy.choose_actions(rounds, &observations)?;
        let result = env.step(&actions)?;
        rounds = rounds.saturating_add(1);

        for (agent_id, reward) in &result.rewards {
            *cumulative_rewards.entry(*agent_id).or_insert(0.0) += reward;
        }
        if let Some(tally) = &result.info.tally {
            if tally.outcome.is_passed() {
                proposals_passed = proposals_passed.saturating_add(1);
            } else {
                proposals_failed = proposals_failed.saturating_add(1);
            }
        }
        callback.on_round(&result, env);

        if result.is_done() {
            break (result.info.price, result.info.tax_rate);
        }
        observations = result.observations;
    };

    Ok(EpisodeResult {
        episode_seed: reset.episode_seed,
        rounds,
        cumulative_rewards,
        final_price,
        final_tax_rate,
        proposals_passed,
        proposals_failed,
    })
}

/// Log an episode summary.
pub fn log_episode_end(episode: u32, result: &EpisodeResult) {
    let total_reward: f64 = result.cumulative_rewards.values().sum();
    info!(
        episode,
        episode_seed = result.episode_seed,
        rounds = result.rounds,
        final_price = result.final_price,
        final_tax_rate = result.final_tax_rate,
        proposals_passed = result.proposals_passed,
        proposals_failed = result.proposals_failed,
        total_reward,
        "Episode ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::logger::NullLogger;
    use crate::policy::{HoldPolicy, RandomPolicy};

    fn env(agents: u32, max_steps: u64) -> EconomyEnv {
        let mut config = SimulationConfig::default();
        config.world.num_agents = agents;
        config.world.max_steps = max_steps;
        EconomyEnv::new(config, Arc::new(NullLogger)).unwrap()
    }

    struct Counter(u64);

    impl RoundCallback for Counter {
        fn on_round(&mut self, _result: &StepResult, _env: &EconomyEnv) {
            self.0 = self.0.saturating_add(1);
        }
    }

    #[test]
    fn hold_episode_runs_full_length_with_zero_reward() {
        let mut env = env(3, 12);
        let mut counter = Counter(0);
        let result = run_episode(&mut env, Some(1), &mut HoldPolicy, &mut counter).unwrap();
        assert_eq!(result.rounds, 12);
        assert_eq!(counter.0, 12);
        assert!(result.cumulative_rewards.values().all(|r| r.abs() < 1e-12));
        assert_eq!(result.proposals_passed, 0);
        assert_eq!(result.proposals_failed, 0);
    }

    #[test]
    fn random_episode_reaches_governance() {
        let mut env = env(6, 120);
        let result = run_episode(
            &mut env,
            Some(17),
            &mut RandomPolicy::new(17),
            &mut NoOpCallback,
        )
        .unwrap();
        assert_eq!(result.rounds, 120);
        assert!(result.proposals_passed.saturating_add(result.proposals_failed) > 0);
        assert!(result.final_price > 0.0);
        log_episode_end(0, &result);
    }

    #[test]
    fn final_market_matches_the_last_round() {
        let mut env = env(5, 30);
        let result = run_episode(
            &mut env,
            Some(3),
            &mut RandomPolicy::new(3),
            &mut NoOpCallback,
        )
        .unwrap();
        let market = env.episode().unwrap().market;
        assert!((result.final_price - market.price()).abs() < f64::EPSILON);
        assert!((result.final_tax_rate - market.tax_rate()).abs() < f64::EPSILON);
    }

    #[test]
    fn episodes_are_reproducible() {
        let run = || {
            let mut env = env(4, 40);
            run_episode(
                &mut env,
                Some(99),
                &mut RandomPolicy::new(5),
                &mut NoOpCallback,
            )
            .unwrap()
        };
        assert_eq!(run(), run());
    }
}
