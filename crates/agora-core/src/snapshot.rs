//! Serializable episode snapshots.
//!
//! An [`EnvSnapshot`] holds everything a round reads or writes, so
//! restoring one and replaying the same actions reproduces the same
//! states, rewards, and proposal ids.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use agora_agents::{AgentStore, GovernanceEngine, Market, MarketError};
use agora_ledger::Ledger;
use agora_types::{AgentId, AgentState, MarketState};

use crate::clock::SimulationClock;
use crate::env::EconomyEnv;
use crate::round::EpisodeState;

/// Errors that can occur when taking or restoring a snapshot.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// There is no episode to snapshot.
    #[error("environment has not been reset")]
    NotReset,

    /// The snapshot was taken from a different roster.
    #[error("snapshot roster of {found} agents does not match environment roster of {expected}")]
    RosterMismatch {
        /// Agents in the environment.
        expected: usize,
        /// Agents in the snapshot.
        found: usize,
    },

    /// The stored market state is out of domain.
    #[error("invalid market in snapshot: {source}")]
    Market {
        /// The underlying market error.
        #[from]
        source: MarketError,
    },

    /// JSON encoding or decoding failed.
    #[error("snapshot JSON error: {source}")]
    Json {
        /// The underlying serde error.
        #[from]
        source: serde_json::Error,
    },
}

/// Complete state of one episode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvSnapshot {
    /// Seed the episode was created from.
    pub episode_seed: u64,
    /// Round counter.
    pub clock: SimulationClock,
    /// Every agent record.
    pub agents: BTreeMap<AgentId, AgentState>,
    /// Price, tax, and volatility.
    pub market: MarketState,
    /// Phase, proposal, votes, and proposal counter.
    pub governance: GovernanceEngine,
    /// Trade ledger.
    pub ledger: Ledger,
}

impl EnvSnapshot {
    /// Capture an episode.
    pub fn capture(episode: &EpisodeState) -> Self {
        Self {
            episode_seed: episode.episode_seed,
            clock: episode.clock,
            agents: episode.agents.snapshot(),
            market: *episode.market.state(),
            governance: episode.governance.clone(),
            ledger: episode.ledger.clone(),
        }
    }

    /// Encode as JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if serialization fails.
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Json`] if the input is not a snapshot.
    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }

    fn into_episode(self) -> Result<EpisodeState, SnapshotError> {
        Ok(EpisodeState {
            episode_seed: self.episode_seed,
            clock: self.clock,
            agents: AgentStore::from_states(self.agents),
            market: Market::new(self.market)?,
            governance: self.governance,
            ledger: self.ledger,
        })
    }
}

impl EconomyEnv {
    /// Snapshot the current episode.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotReset`] before the first reset.
    pub fn snapshot(&self) -> Result<EnvSnapshot, SnapshotError> {
        self.episode()
            .map(EnvSnapshot::capture)
            .ok_or(SnapshotError::NotReset)
    }

    /// Replace the current episode with a snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::RosterMismatch`] if the snapshot's agents
    /// are not exactly this environment's roster, or
    /// [`SnapshotError::Market`] if the stored market is invalid.
    pub fn restore(&mut self, snapshot: EnvSnapshot) -> Result<(), SnapshotError> {
        if !snapshot.agents.keys().eq(self.roster().iter()) {
            return Err(SnapshotError::RosterMismatch {
                expected: self.roster().len(),
                found: snapshot.agents.len(),
            });
        }
        let step = snapshot.clock.step();
        let episode_seed = snapshot.episode_seed;
        self.install(snapshot.into_episode()?);
        info!(episode_seed, step, "episode restored from snapshot");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::SimulationConfig;
    use crate::env::Environment;
    use crate::logger::NullLogger;

    fn env(agents: u32) -> EconomyEnv {
        let mut config = SimulationConfig::default();
        config.world.num_agents = agents;
        EconomyEnv::new(config, Arc::new(NullLogger)).unwrap()
    }

    #[test]
    fn snapshot_before_reset_fails() {
        assert!(matches!(env(2).snapshot(), Err(SnapshotError::NotReset)));
    }

    #[test]
    fn json_round_trip_preserves_snapshot() {
        let mut env = env(3);
        env.reset(Some(4)).unwrap();
        env.step(&BTreeMap::from([(AgentId::new(0), 1), (AgentId::new(1), 3)]))
            .unwrap();

        let snapshot = env.snapshot().unwrap();
        let decoded = EnvSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
    }

    #[test]
    fn restore_rejects_other_roster() {
        let mut small = env(2);
        small.reset(Some(1)).unwrap();
        let snapshot = small.snapshot().unwrap();

        let mut large = env(3);
        let result = large.restore(snapshot);
        assert!(matches!(
            result,
            Err(SnapshotError::RosterMismatch {
                expected: 3,
                found: 2
            })
        ));
    }

    #[test]
    fn restore_rejects_invalid_market() {
        let mut env = env(2);
        env.reset(Some(1)).unwrap();
        let mut snapshot = env.snapshot().unwrap();
        snapshot.market.price = -1.0;
        assert!(matches!(
            env.restore(snapshot),
            Err(SnapshotError::Market { .. })
        ));
    }

    #[test]
    fn restore_works_without_prior_reset() {
        let mut source = env(2);
        source.reset(Some(8)).unwrap();
        let snapshot = source.snapshot().unwrap();

        let mut target = env(2);
        target.restore(snapshot.clone()).unwrap();
        assert_eq!(target.snapshot().unwrap(), snapshot);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            EnvSnapshot::from_json("{\"episode_seed\": 1}"),
            Err(SnapshotError::Json { .. })
        ));
    }
}
