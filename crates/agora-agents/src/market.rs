//! The market model: a single floating price, a sale tax, and a
//! multiplicative price impact per trade.
//!
//! Every trade moves the price by one `volatility_factor` step: buys
//! multiply it, sells divide it. Repeated buy/sell pairs therefore revert
//! to the starting price. The price is never otherwise bounded; agents are
//! cash-constrained, which limits how far buys can push it.

use agora_types::{AgentState, MarketState, TradeKind};
use tracing::debug;

/// Reputation granted to an agent for every successful trade.
pub const REPUTATION_PER_TRADE: f64 = 0.01;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised when market parameters fall outside their domain.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MarketError {
    /// The price must be finite and strictly positive.
    #[error("invalid price {0}: must be finite and > 0")]
    InvalidPrice(f64),

    /// The tax rate must lie in `[0, 1]`.
    #[error("invalid tax rate {0}: must be within [0, 1]")]
    InvalidTaxRate(f64),

    /// The volatility factor must be finite and strictly above 1.
    #[error("invalid volatility factor {0}: must be finite and > 1")]
    InvalidVolatility(f64),
}

// ---------------------------------------------------------------------------
// Fill
// ---------------------------------------------------------------------------

/// The result of one successful trade.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fill {
    /// Side of the trade.
    pub kind: TradeKind,
    /// Price the unit changed hands at (before impact).
    pub price: f64,
    /// Tax withheld from a sale; zero for buys.
    pub tax: f64,
    /// Cash the agent paid (buy) or received net of tax (sell).
    pub cash: f64,
    /// Market price after the trade's impact.
    pub new_price: f64,
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

/// Owns the process-wide [`MarketState`] and applies trades against it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Market {
    state: MarketState,
}

impl Market {
    /// Create a market, validating every parameter.
    ///
    /// # Errors
    ///
    /// Returns a [`MarketError`] naming the first out-of-domain parameter.
    pub fn new(state: MarketState) -> Result<Self, MarketError> {
        validate_price(state.price)?;
        validate_tax_rate(state.tax_rate)?;
        if !state.volatility_factor.is_finite() || state.volatility_factor <= 1.0 {
            return Err(MarketError::InvalidVolatility(state.volatility_factor));
        }
        Ok(Self { state })
    }

    /// Current market parameters.
    pub const fn state(&self) -> &MarketState {
        &self.state
    }

    /// Current asset price.
    pub const fn price(&self) -> f64 {
        self.state.price
    }

    /// Current sale tax rate.
    pub const fn tax_rate(&self) -> f64 {
        self.state.tax_rate
    }

    /// Buy one unit for `agent` at the current price.
    ///
    /// Succeeds only if the agent can pay the full price. On failure
    /// neither the agent nor the market is touched.
    pub fn apply_buy(&mut self, agent: &mut AgentState) -> Option<Fill> {
        let price = self.state.price;
        if agent.cash < price {
            debug!(cash = agent.cash, price, "buy rejected: insufficient cash");
            return None;
        }
        let total_trades = agent.total_trades.checked_add(1)?;
        let assets = agent.assets.checked_add(1)?;

        agent.cash -= price;
        agent.assets = assets;
        agent.total_trades = total_trades;
        agent.reputation += REPUTATION_PER_TRADE;
        self.state.price = price * self.state.volatility_factor;

        Some(Fill {
            kind: TradeKind::Buy,
            price,
            tax: 0.0,
            cash: price,
            new_price: self.state.price,
        })
    }

    /// Sell one unit from `agent` at the current price, net of tax.
    ///
    /// Succeeds only if the agent holds at least one unit. On failure
    /// neither the agent nor the market is touched.
    pub fn apply_sell(&mut self, agent: &mut AgentState) -> Option<Fill> {
        let Some(assets) = agent.assets.checked_sub(1) else {
            debug!("sell rejected: no assets held");
            return None;
        };
        let total_trades = agent.total_trades.checked_add(1)?;
        let price = self.state.price;
        let earnings = price * (1.0 - self.state.tax_rate);

        agent.cash += earnings;
        agent.assets = assets;
        agent.total_trades = total_trades;
        agent.reputation += REPUTATION_PER_TRADE;
        self.state.price = price * (1.0 / self.state.volatility_factor);

        Some(Fill {
            kind: TradeKind::Sell,
            price,
            tax: price - earnings,
            cash: earnings,
            new_price: self.state.price,
        })
    }

    /// Replace the sale tax rate. Only passed governance proposals call this.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::InvalidTaxRate`] outside `[0, 1]`, leaving the
    /// current rate in place.
    pub fn set_tax_rate(&mut self, value: f64) -> Result<(), MarketError> {
        validate_tax_rate(value)?;
        self.state.tax_rate = value;
        Ok(())
    }
}

fn validate_price(price: f64) -> Result<(), MarketError> {
    if price.is_finite() && price > 0.0 {
        Ok(())
    } else {
        Err(MarketError::InvalidPrice(price))
    }
}

fn validate_tax_rate(rate: f64) -> Result<(), MarketError> {
    if (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(MarketError::InvalidTaxRate(rate))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::config::{StartingState, VotingPowerMode};

    fn market(price: f64, tax_rate: f64, volatility_factor: f64) -> Market {
        Market::new(MarketState {
            price,
            tax_rate,
            volatility_factor,
        })
        .unwrap()
    }

    fn agent() -> AgentState {
        StartingState::default().agent_state(VotingPowerMode::Reputation)
    }

    #[test]
    fn buy_scenario() {
        let mut market = market(100.0, 0.1, 1.01);
        let mut agent = agent();

        let fill = market.apply_buy(&mut agent).unwrap();

        assert!((agent.cash - 900.0).abs() < 1e-9);
        assert_eq!(agent.assets, 1);
        assert_eq!(agent.total_trades, 1);
        assert!((agent.reputation - 1.01).abs() < 1e-9);
        assert!((market.price() - 101.0).abs() < 1e-9);
        assert!((fill.price - 100.0).abs() < 1e-9);
        assert!((fill.new_price - 101.0).abs() < 1e-9);
        assert_eq!(fill.kind, TradeKind::Buy);
    }

    #[test]
    fn buy_with_insufficient_cash_changes_nothing() {
        let mut market = market(100.0, 0.1, 1.01);
        let mut agent = agent();
        agent.cash = 99.99;
        let before_agent = agent;
        let before_market = market;

        assert!(market.apply_buy(&mut agent).is_none());
        assert_eq!(agent, before_agent);
        assert_eq!(market, before_market);
    }

    #[test]
    fn buy_with_exact_cash_succeeds() {
        let mut market = market(100.0, 0.0, 1.01);
        let mut agent = agent();
        agent.cash = 100.0;
        assert!(market.apply_buy(&mut agent).is_some());
        assert!(agent.cash.abs() < 1e-9);
    }

    #[test]
    fn sell_pays_net_of_tax_and_lowers_price() {
        let mut market = market(100.0, 0.1, 1.25);
        let mut agent = agent();
        agent.assets = 2;

        let fill = market.apply_sell(&mut agent).unwrap();

        assert!((agent.cash - 1090.0).abs() < 1e-9);
        assert_eq!(agent.assets, 1);
        assert_eq!(agent.total_trades, 1);
        assert!((fill.tax - 10.0).abs() < 1e-9);
        assert!((fill.cash - 90.0).abs() < 1e-9);
        assert!((market.price() - 80.0).abs() < 1e-9);
    }

    #[test]
    fn sell_without_assets_changes_nothing() {
        let mut market = market(100.0, 0.1, 1.01);
        let mut agent = agent();
        let before_agent = agent;

        assert!(market.apply_sell(&mut agent).is_none());
        assert_eq!(agent, before_agent);
        assert!((market.price() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn buy_then_sell_reverts_price() {
        let mut market = market(120.0, 0.05, 1.03);
        let mut agent = agent();
        market.apply_buy(&mut agent).unwrap();
        market.apply_sell(&mut agent).unwrap();
        assert!((market.price() - 120.0).abs() < 1e-9);
    }

    #[test]
    fn set_tax_rate_validates_domain() {
        let mut market = market(100.0, 0.1, 1.01);
        market.set_tax_rate(0.2).unwrap();
        assert!((market.tax_rate() - 0.2).abs() < f64::EPSILON);

        assert!(matches!(
            market.set_tax_rate(1.5),
            Err(MarketError::InvalidTaxRate(_))
        ));
        assert!((market.tax_rate() - 0.2).abs() < f64::EPSILON);
    }

    #[test]
    fn new_rejects_out_of_domain_parameters() {
        let bad_price = MarketState {
            price: 0.0,
            tax_rate: 0.1,
            volatility_factor: 1.01,
        };
        assert!(matches!(Market::new(bad_price), Err(MarketError::InvalidPrice(_))));

        let bad_volatility = MarketState {
            price: 10.0,
            tax_rate: 0.1,
            volatility_factor: 1.0,
        };
        assert!(matches!(
            Market::new(bad_volatility),
            Err(MarketError::InvalidVolatility(_))
        ));
    }
}
