//! Engine binary for the Agora simulation.
//!
//! Loads configuration, wires the telemetry writer into the environment,
//! and plays the configured number of episodes with a seeded random
//! policy.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `agora-config.yaml` (or `AGORA_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Open the telemetry sink and spawn the batched writer
//! 4. Build the environment
//! 5. Run the episodes on a blocking thread
//! 6. Flush telemetry and log the result

mod error;
mod render;

use std::path::PathBuf;
use std::sync::Arc;

use agora_core::config::{CONFIG_PATH_ENV, DEFAULT_CONFIG_FILE, SimulationConfig};
use agora_core::env::EconomyEnv;
use agora_core::policy::RandomPolicy;
use agora_core::runner::{self, EpisodeResult, RoundCallback, RunnerError};
use agora_telemetry::{BatchedLogger, LogSink};
use agora_types::RunId;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::render::RenderCallback;

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration, environment setup, an episode, or
/// the telemetry shutdown fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config_path = config_path();
    let (config, found) = load_config(&config_path)?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!("agora-engine starting");
    if !found {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    info!(
        seed = config.world.seed,
        num_agents = config.world.num_agents,
        max_steps = config.world.max_steps,
        episodes = config.run.episodes,
        sink = ?config.logging.sink,
        "Configuration loaded"
    );

    // 3. Telemetry.
    let sink = LogSink::from_config(&config.logging).await;
    info!(sink = sink.name(), "Telemetry sink ready");
    let (logger, handle) = BatchedLogger::spawn(sink, config.logging.batch_size, RunId::new());
    let run_id = logger.run_id();

    // 4. Environment.
    let episodes = config.run.episodes;
    let render = config.run.render;
    let policy_seed = config.world.seed;
    let mut env = EconomyEnv::new(config, Arc::new(logger))?;
    info!(%run_id, "Environment initialized");

    // 5. Run the episodes. Rounds are synchronous, so they stay off the
    //    async workers that drive the telemetry writer.
    let outcome = tokio::task::spawn_blocking(move || {
        let mut callback = RenderCallback::new(render);
        run_episodes(&mut env, episodes, policy_seed, &mut callback)
            .map(|results| (results, callback.rounds_seen()))
    })
    .await
    .map_err(EngineError::from)?;

    // 6. Flush telemetry whether or not the episodes succeeded.
    let stats = handle.shutdown().await.map_err(EngineError::from)?;
    let (results, rounds) = outcome.map_err(EngineError::from)?;

    info!(
        %run_id,
        episodes = results.len(),
        rounds,
        rows_written = stats.rows_written,
        rows_dropped = stats.rows_dropped,
        "agora-engine shutdown complete"
    );

    Ok(())
}

/// Resolve the config file location from `AGORA_CONFIG`, falling back to
/// `agora-config.yaml` in the working directory.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_PATH_ENV)
        .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), PathBuf::from)
}

/// Load the simulation configuration.
///
/// A missing file yields the defaults; the returned flag says whether the
/// file was found.
fn load_config(path: &std::path::Path) -> Result<(SimulationConfig, bool), EngineError> {
    if path.exists() {
        let config = SimulationConfig::from_file(path)?;
        Ok((config, true))
    } else {
        let mut config = SimulationConfig::default();
        config.logging.apply_env_overrides();
        Ok((config, false))
    }
}

/// Play `episodes` episodes back to back, logging a summary after each.
fn run_episodes(
    env: &mut EconomyEnv,
    episodes: u32,
    policy_seed: u64,
    callback: &mut dyn RoundCallback,
) -> Result<Vec<EpisodeResult>, RunnerError> {
    let mut policy = RandomPolicy::new(policy_seed);
    let mut results = Vec::new();
    for episode in 0..episodes {
        let result = runner::run_episode(env, None, &mut policy, callback)?;
        runner::log_episode_end(episode, &result);
        results.push(result);
    }
    Ok(results)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use agora_core::logger::NullLogger;
    use agora_core::runner::NoOpCallback;

    use super::*;

    #[test]
    fn missing_config_file_uses_defaults() {
        let path =
            std::env::temp_dir().join(format!("agora-missing-{}.yaml", uuid::Uuid::new_v4()));
        let (config, found) = load_config(&path).unwrap();
        assert!(!found);
        assert_eq!(config.world, SimulationConfig::default().world);
    }

    #[test]
    fn config_file_is_read_when_present() {
        let path =
            std::env::temp_dir().join(format!("agora-config-{}.yaml", uuid::Uuid::new_v4()));
        std::fs::write(&path, "world:\n  num_agents: 7\nrun:\n  episodes: 2\n").unwrap();
        let (config, found) = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert!(found);
        assert_eq!(config.world.num_agents, 7);
        assert_eq!(config.run.episodes, 2);
    }

    #[test]
    fn episodes_get_distinct_seeds() {
        let mut config = SimulationConfig::default();
        config.world.num_agents = 3;
        config.world.max_steps = 5;
        let mut env = EconomyEnv::new(config, Arc::new(NullLogger)).unwrap();

        let results = run_episodes(&mut env, 3, 9, &mut NoOpCallback).unwrap();

        assert_eq!(results.len(), 3);
        assert!(results.iter().all(|r| r.rounds == 5));
        assert_ne!(results[0].episode_seed, results[1].episode_seed);
    }
}
