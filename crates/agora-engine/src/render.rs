//! Round callback that logs a state dump after every round.
//!
//! Enabled with `run.render: true`. The dump is the environment's
//! `Display` output: step and market line, governance phase, and one
//! line per agent.

use agora_core::env::{EconomyEnv, StepResult};
use agora_core::runner::RoundCallback;
use tracing::{debug, info};

/// Callback that renders the environment after each round.
pub struct RenderCallback {
    enabled: bool,
    rounds_seen: u64,
}

impl RenderCallback {
    /// Create a callback. When `enabled` is false, rounds are only counted.
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            rounds_seen: 0,
        }
    }

    /// Rounds observed across every episode so far.
    pub const fn rounds_seen(&self) -> u64 {
        self.rounds_seen
    }
}

impl RoundCallback for RenderCallback {
    fn on_round(&mut self, result: &StepResult, env: &EconomyEnv) {
        self.rounds_seen = self.rounds_seen.saturating_add(1);
        if !self.enabled {
            return;
        }
        info!(step = result.info.step, "\n{env}");
        if let Some(tally) = &result.info.tally {
            debug!(
                step = result.info.step,
                passed = tally.outcome.is_passed(),
                "Proposal tallied"
            );
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use agora_core::config::SimulationConfig;
    use agora_core::logger::NullLogger;
    use agora_core::policy::HoldPolicy;
    use agora_core::runner::run_episode;

    use super::*;

    #[test]
    fn counts_rounds_across_episodes() {
        let mut config = SimulationConfig::default();
        config.world.num_agents = 2;
        config.world.max_steps = 3;
        let mut env = EconomyEnv::new(config, Arc::new(NullLogger)).unwrap();
        let mut callback = RenderCallback::new(true);

        run_episode(&mut env, Some(1), &mut HoldPolicy, &mut callback).unwrap();
        run_episode(&mut env, Some(2), &mut HoldPolicy, &mut callback).unwrap();

        assert_eq!(callback.rounds_seen(), 6);
    }
}
