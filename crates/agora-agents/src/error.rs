//! Error types for the agora-agents crate.
//!
//! Rejected actions (insufficient cash, duplicate votes, ...) are not errors:
//! they are reported as `None` or [`GovernanceRejection`] values by the
//! market and governance engine. The errors here indicate that the caller
//! and the store disagree about the roster, which aborts the round.
//!
//! [`GovernanceRejection`]: crate::governance::GovernanceRejection

use agora_types::AgentId;

/// Errors that can occur during agent state operations.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    /// Agent with the given ID is not on the roster.
    #[error("agent not found: {0}")]
    AgentNotFound(AgentId),

    /// The same agent ID was supplied twice when building the roster.
    #[error("duplicate agent id: {0}")]
    DuplicateAgent(AgentId),

    /// An integer field would leave its representable range.
    #[error("arithmetic overflow updating {field} of {agent_id}")]
    ArithmeticOverflow {
        /// The agent being updated.
        agent_id: AgentId,
        /// The field that overflowed.
        field: &'static str,
    },
}
