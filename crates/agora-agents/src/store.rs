//! The per-agent record store.
//!
//! [`AgentStore`] owns every [`AgentState`] for the current episode. It
//! performs no implicit clamping: callers guard their own preconditions
//! before mutating. Iteration is always in ascending [`AgentId`] order,
//! which is the order the round orchestrator clears actions in.

use std::collections::BTreeMap;

use agora_types::{Action, AgentId, AgentState};

use crate::config::{StartingState, VotingPowerMode};
use crate::error::AgentError;

/// A partial, additive update to an agent record.
///
/// Zero-valued fields leave the record unchanged. `last_action` replaces
/// the stored value only when it is `Some`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AgentDelta {
    /// Change in cash.
    pub cash: f64,
    /// Change in asset units.
    pub assets: i64,
    /// Change in reputation.
    pub reputation: f64,
    /// Change in tokens.
    pub tokens: i64,
    /// Change in voting power.
    pub voting_power: f64,
    /// Additional completed trades.
    pub trades: u32,
    /// Action to record as the most recent one.
    pub last_action: Option<Action>,
}

impl AgentDelta {
    /// A delta that only changes reputation.
    pub fn reputation(amount: f64) -> Self {
        Self {
            reputation: amount,
            ..Self::default()
        }
    }
}

/// Owns the economic record of every agent on the roster.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentStore {
    states: BTreeMap<AgentId, AgentState>,
}

impl AgentStore {
    /// Populate every agent with the canonical starting state.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::DuplicateAgent`] if an ID appears twice.
    pub fn initialize(
        agent_ids: &[AgentId],
        starting: &StartingState,
        mode: VotingPowerMode,
    ) -> Result<Self, AgentError> {
        let mut states = BTreeMap::new();
        for &id in agent_ids {
            if states.insert(id, starting.agent_state(mode)).is_some() {
                return Err(AgentError::DuplicateAgent(id));
            }
        }
        Ok(Self { states })
    }

    /// Rebuild a store from previously captured records.
    pub const fn from_states(states: BTreeMap<AgentId, AgentState>) -> Self {
        Self { states }
    }

    /// Read an agent's record.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for IDs not on the roster.
    pub fn get(&self, agent_id: AgentId) -> Result<&AgentState, AgentError> {
        self.states
            .get(&agent_id)
            .ok_or(AgentError::AgentNotFound(agent_id))
    }

    /// Borrow an agent's record mutably.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for IDs not on the roster.
    pub fn get_mut(&mut self, agent_id: AgentId) -> Result<&mut AgentState, AgentError> {
        self.states
            .get_mut(&agent_id)
            .ok_or(AgentError::AgentNotFound(agent_id))
    }

    /// Replace an agent's record wholesale.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for IDs not on the roster; the
    /// store never grows through `set`.
    pub fn set(&mut self, agent_id: AgentId, state: AgentState) -> Result<(), AgentError> {
        let slot = self.get_mut(agent_id)?;
        *slot = state;
        Ok(())
    }

    /// Apply an additive update to an agent's record.
    ///
    /// The update is atomic: if any integer field would leave its range the
    /// record is left untouched.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::AgentNotFound`] for unknown IDs, or
    /// [`AgentError::ArithmeticOverflow`] if `assets` or `tokens` would leave
    /// the `u32` range.
    pub fn apply_delta(&mut self, agent_id: AgentId, delta: &AgentDelta) -> Result<(), AgentError> {
        let state = self.get_mut(agent_id)?;

        let assets = offset_u32(state.assets, delta.assets).ok_or(
            AgentError::ArithmeticOverflow {
                agent_id,
                field: "assets",
            },
        )?;
        let tokens = offset_u32(state.tokens, delta.tokens).ok_or(
            AgentError::ArithmeticOverflow {
                agent_id,
                field: "tokens",
            },
        )?;
        let total_trades = state.total_trades.checked_add(delta.trades).ok_or(
            AgentError::ArithmeticOverflow {
                agent_id,
                field: "total_trades",
            },
        )?;

        state.cash += delta.cash;
        state.assets = assets;
        state.reputation += delta.reputation;
        state.tokens = tokens;
        state.voting_power += delta.voting_power;
        state.total_trades = total_trades;
        if delta.last_action.is_some() {
            state.last_action = delta.last_action;
        }
        Ok(())
    }

    /// Re-derive every agent's voting power from its reputation.
    pub fn sync_voting_power(&mut self, mode: VotingPowerMode) {
        for state in self.states.values_mut() {
            state.voting_power = mode.voting_power(state.reputation);
        }
    }

    /// Whether the agent is on the roster.
    pub fn contains(&self, agent_id: AgentId) -> bool {
        self.states.contains_key(&agent_id)
    }

    /// Roster IDs in ascending order.
    pub fn ids(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.states.keys().copied()
    }

    /// Iterate `(id, record)` pairs in ascending ID order.
    pub fn iter(&self) -> impl Iterator<Item = (AgentId, &AgentState)> {
        self.states.iter().map(|(id, state)| (*id, state))
    }

    /// Borrow the underlying map.
    pub const fn states(&self) -> &BTreeMap<AgentId, AgentState> {
        &self.states
    }

    /// Copy every record, for snapshots and before/after comparisons.
    pub fn snapshot(&self) -> BTreeMap<AgentId, AgentState> {
        self.states.clone()
    }

    /// Number of agents on the roster.
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether the roster is empty.
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Apply a signed offset to an unsigned counter, `None` if out of range.
fn offset_u32(value: u32, offset: i64) -> Option<u32> {
    let shifted = i64::from(value).checked_add(offset)?;
    u32::try_from(shifted).ok()
}
