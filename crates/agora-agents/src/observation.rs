//! Projection of agent and market state into observation vectors.

use std::collections::BTreeMap;

use agora_types::{AgentId, AgentState, MarketState, Observation};

use crate::store::AgentStore;

/// Build one agent's observation from its record and the market.
pub fn observe(agent: &AgentState, market: &MarketState) -> Observation {
    Observation::new(
        agent.cash,
        f64::from(agent.assets),
        f64::from(agent.tokens),
        market.price,
        agent.reputation,
        market.tax_rate,
    )
}

/// Observations for every agent on the roster.
pub fn observe_all(store: &AgentStore, market: &MarketState) -> BTreeMap<AgentId, Observation> {
    store
        .iter()
        .map(|(id, state)| (id, observe(state, market)))
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{StartingState, VotingPowerMode};

    #[test]
    fn observation_follows_contract_order() {
        let agent = StartingState::default().agent_state(VotingPowerMode::Reputation);
        let market = MarketState {
            price: 88.0,
            tax_rate: 0.05,
            volatility_factor: 1.02,
        };
        let obs = observe(&agent, &market);
        let expected = [1000.0, 0.0, 100.0, 88.0, 1.0, 0.05];
        for (got, want) in obs.0.iter().zip(expected) {
            assert!((got - want).abs() < f64::EPSILON);
        }
    }

    #[test]
    fn observe_all_covers_roster() {
        let store = AgentStore::initialize(
            &AgentId::roster(3),
            &StartingState::default(),
            VotingPowerMode::Flat,
        )
        .unwrap();
        let market = MarketState {
            price: 100.0,
            tax_rate: 0.1,
            volatility_factor: 1.01,
        };
        let all = observe_all(&store, &market);
        assert_eq!(all.len(), 3);
        assert!((all.get(&AgentId::new(2)).unwrap().price() - 100.0).abs() < f64::EPSILON);
    }
}
