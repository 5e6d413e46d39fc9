//! Configuration, round orchestration, and the environment loop for the
//! Agora simulation.
//!
//! # Modules
//!
//! - [`clock`] -- Episode step counter bounded by `max_steps`.
//! - [`config`] -- Configuration loading from `agora-config.yaml` into
//!   strongly-typed structs.
//! - [`logger`] -- [`SimulationLogger`] trait and in-process implementations.
//! - [`round`] -- The five-phase round: snapshot, actions, rewards,
//!   governance, bookkeeping.
//! - [`env`] -- [`Environment`] trait and [`EconomyEnv`].
//! - [`snapshot`] -- Serializable episode snapshots for replay.
//! - [`policy`] -- [`ActionSource`] trait with hold and random policies.
//! - [`runner`] -- Episode loop with per-round callbacks.
//!
//! [`SimulationLogger`]: logger::SimulationLogger
//! [`Environment`]: env::Environment
//! [`EconomyEnv`]: env::EconomyEnv
//! [`ActionSource`]: policy::ActionSource

pub mod clock;
pub mod config;
pub mod env;
pub mod logger;
pub mod policy;
pub mod round;
pub mod runner;
pub mod snapshot;
