//! Episode clock for the Agora simulation.
//!
//! The clock counts completed rounds. It starts at 0 on reset and is
//! advanced once at the end of every round; the episode is over when the
//! step count reaches `max_steps`.

use serde::{Deserialize, Serialize};

/// Errors that can occur during clock operations.
#[derive(Debug, thiserror::Error)]
pub enum ClockError {
    /// Step counter would overflow.
    #[error("step counter overflow: cannot advance beyond u64::MAX")]
    StepOverflow,

    /// Episodes must allow at least one round.
    #[error("max_steps must be at least 1")]
    ZeroLength,
}

/// Round counter bounded by the episode length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationClock {
    /// Completed rounds in this episode.
    step: u64,
    /// Rounds per episode.
    max_steps: u64,
}

impl SimulationClock {
    /// Create a clock at step 0.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::ZeroLength`] if `max_steps` is 0.
    pub const fn new(max_steps: u64) -> Result<Self, ClockError> {
        if max_steps == 0 {
            return Err(ClockError::ZeroLength);
        }
        Ok(Self { step: 0, max_steps })
    }

    /// Advance by one round. Returns the new step number.
    ///
    /// # Errors
    ///
    /// Returns [`ClockError::StepOverflow`] if the counter would exceed
    /// `u64::MAX`.
    pub fn advance(&mut self) -> Result<u64, ClockError> {
        self.step = self.step.checked_add(1).ok_or(ClockError::StepOverflow)?;
        Ok(self.step)
    }

    /// Return the current step number.
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Return the configured episode length.
    pub const fn max_steps(&self) -> u64 {
        self.max_steps
    }

    /// Whether the episode has run its full length.
    pub const fn is_finished(&self) -> bool {
        self.step >= self.max_steps
    }
}
