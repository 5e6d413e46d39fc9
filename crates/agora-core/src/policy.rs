//! Action sources for driving the environment.
//!
//! An [`ActionSource`] turns observations into one action code per agent.
//! Learned policies live outside this workspace; the two here exist to run
//! and test episodes end to end.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use agora_types::{ACTION_COUNT, Action, AgentId, Observation};

/// Errors an action source can report.
#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    /// The source could not produce actions for this round.
    #[error("policy error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

/// Chooses actions for every agent each round.
pub trait ActionSource {
    /// Return one action code per agent. Agents left out hold.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError`] if no actions can be produced.
    fn choose_actions(
        &mut self,
        step: u64,
        observations: &BTreeMap<AgentId, Observation>,
    ) -> Result<BTreeMap<AgentId, u8>, PolicyError>;
}

/// Every agent holds every round.
#[derive(Debug, Clone, Copy, Default)]
pub struct HoldPolicy;

impl ActionSource for HoldPolicy {
    fn choose_actions(
        &mut self,
        _step: u64,
        observations: &BTreeMap<AgentId, Observation>,
    ) -> Result<BTreeMap<AgentId, u8>, PolicyError> {
        Ok(observations
            .keys()
            .map(|&agent_id| (agent_id, Action::Hold.code()))
            .collect())
    }
}

/// Uniformly random action codes from a seeded generator.
#[derive(Debug, Clone)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    /// Create a policy whose choices are fixed by `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl ActionSource for RandomPolicy {
    fn choose_actions(
        &mut self,
        _step: u64,
        observations: &BTreeMap<AgentId, Observation>,
    ) -> Result<BTreeMap<AgentId, u8>, PolicyError> {
        observations
            .keys()
            .map(|&agent_id| {
                let index = self.rng.random_range(0..ACTION_COUNT);
                let code = Action::ALL
                    .get(index)
                    .map(|action| action.code())
                    .ok_or_else(|| PolicyError::Internal {
                        message: format!("action index {index} out of range"),
                    })?;
                Ok((agent_id, code))
            })
            .collect()
    }
}
