//! Type-safe identifier wrappers.
//!
//! Agents and proposals use dense integer identifiers so that their ordering
//! is numeric and reproducible: the round orchestrator clears actions in
//! ascending [`AgentId`] order, and replaying a snapshot must hand out the
//! same [`ProposalId`] values. Only [`RunId`], which tags telemetry rows for
//! one engine process, is a UUID.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

define_id! {
    /// Unique identifier for one engine process, attached to telemetry rows.
    RunId
}

/// Identifier of an agent on the simulation roster.
///
/// Displayed as `agent_<n>`. Ordering is by the numeric index, so
/// `agent_2` sorts before `agent_10`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct AgentId(pub u32);

impl AgentId {
    /// Create an identifier from a roster index.
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Return the roster index.
    pub const fn index(self) -> u32 {
        self.0
    }

    /// Build the roster `agent_0 .. agent_{count-1}`.
    pub fn roster(count: u32) -> Vec<Self> {
        (0..count).map(Self).collect()
    }
}

impl core::fmt::Display for AgentId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "agent_{}", self.0)
    }
}

/// Identifier of a governance proposal.
///
/// Assigned sequentially by the governance engine, starting at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProposalId(pub u64);

impl ProposalId {
    /// Return the raw sequence number.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ProposalId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "proposal_{}", self.0)
    }
}
