//! Shared type definitions for the Agora economy simulation.
//!
//! This crate is the single source of truth for the value types that flow
//! between the engine, the logging collaborator, and any training harness.
//! Types that the dashboard consumes are exported to `TypeScript` via
//! `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Agent, proposal, and run identifiers
//! - [`enums`] -- Action codes and governance/trade enumerations
//! - [`structs`] -- Agent, market, proposal, and vote records
//! - [`observation`] -- The fixed-length observation vector

pub mod enums;
pub mod ids;
pub mod observation;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{
    ACTION_COUNT, Action, GovernanceEventKind, GovernancePhase, GovernanceRule, TradeKind,
    VoteOutcome,
};
pub use ids::{AgentId, ProposalId, RunId};
pub use observation::{OBSERVATION_LEN, Observation};
pub use structs::{AgentState, MarketState, Proposal, Vote};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation for dashboard-facing types.

    #[test]
    fn export_bindings() {
        use ts_rs::TS;

        let _ = crate::ids::AgentId::export_all();
        let _ = crate::ids::ProposalId::export_all();
        let _ = crate::ids::RunId::export_all();

        let _ = crate::enums::Action::export_all();
        let _ = crate::enums::GovernanceRule::export_all();
        let _ = crate::enums::VoteOutcome::export_all();
        let _ = crate::enums::GovernancePhase::export_all();
        let _ = crate::enums::TradeKind::export_all();

        let _ = crate::structs::AgentState::export_all();
        let _ = crate::structs::MarketState::export_all();
        let _ = crate::structs::Proposal::export_all();
        let _ = crate::structs::Vote::export_all();
    }
}
