//! The fixed-length observation vector handed to policies each round.
//!
//! Layout: `[cash, assets, tokens, price, reputation, tax_rate]`. The order
//! is a contract with trained policies and must not change. Values are raw;
//! no normalization is applied.

use serde::{Deserialize, Serialize};

/// Number of features in an [`Observation`].
pub const OBSERVATION_LEN: usize = 6;

/// One agent's view of its own record and the market.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation(pub [f64; OBSERVATION_LEN]);

impl Observation {
    /// Assemble an observation in contract order.
    pub const fn new(
        cash: f64,
        assets: f64,
        tokens: f64,
        price: f64,
        reputation: f64,
        tax_rate: f64,
    ) -> Self {
        Self([cash, assets, tokens, price, reputation, tax_rate])
    }

    /// The raw feature vector.
    pub const fn as_array(&self) -> &[f64; OBSERVATION_LEN] {
        &self.0
    }

    /// Cash balance.
    pub const fn cash(&self) -> f64 {
        let [cash, ..] = self.0;
        cash
    }

    /// Asset units held.
    pub const fn assets(&self) -> f64 {
        let [_, assets, ..] = self.0;
        assets
    }

    /// Token balance.
    pub const fn tokens(&self) -> f64 {
        let [_, _, tokens, ..] = self.0;
        tokens
    }

    /// Market price.
    pub const fn price(&self) -> f64 {
        let [_, _, _, price, ..] = self.0;
        price
    }

    /// Reputation score.
    pub const fn reputation(&self) -> f64 {
        let [.., reputation, _] = self.0;
        reputation
    }

    /// Market tax rate.
    pub const fn tax_rate(&self) -> f64 {
        let [.., tax_rate] = self.0;
        tax_rate
    }
}

impl From<Observation> for Vec<f64> {
    fn from(obs: Observation) -> Self {
        obs.0.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_follow_contract_order() {
        let obs = Observation::new(1000.0, 2.0, 100.0, 95.5, 1.2, 0.1);
        assert_eq!(obs.as_array().len(), OBSERVATION_LEN);
        assert!((obs.cash() - 1000.0).abs() < f64::EPSILON);
        assert!((obs.assets() - 2.0).abs() < f64::EPSILON);
        assert!((obs.tokens() - 100.0).abs() < f64::EPSILON);
        assert!((obs.price() - 95.5).abs() < f64::EPSILON);
        assert!((obs.reputation() - 1.2).abs() < f64::EPSILON);
        assert!((obs.tax_rate() - 0.1).abs() < f64::EPSILON);
    }

    #[test]
    fn serializes_as_flat_array() {
        let obs = Observation::new(1.0, 2.0, 3.0, 4.0, 5.0, 6.0);
        let json = serde_json::to_string(&obs).unwrap_or_default();
        assert_eq!(json, "[1.0,2.0,3.0,4.0,5.0,6.0]");
    }
}
