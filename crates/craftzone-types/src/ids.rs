//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every entity the tracker indexes (agents, zones, fixtures, structures,
//! deferred craft operations) has a strongly-typed ID so they cannot be
//! mixed up at compile time. The tracker never owns the simulation objects
//! behind these IDs; it is a pure index over them.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
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

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for a tracked agent (a connected player).
    AgentId
}

define_id! {
    /// Unique identifier for a capability zone (one governing authorization).
    ZoneId
}

define_id! {
    /// Unique identifier for a fixture contributing a level to a zone.
    FixtureId
}

define_id! {
    /// Unique identifier for any structure returned by the spatial query.
    StructureId
}

define_id! {
    /// Unique identifier for a deferred craft operation held by an agent.
    OperationId
}

impl From<FixtureId> for StructureId {
    fn from(id: FixtureId) -> Self {
        Self(id.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_distinct_types() {
        let agent = AgentId::new();
        let zone = ZoneId::new();
        assert_ne!(agent.into_inner(), Uuid::nil());
        assert_ne!(zone.into_inner(), Uuid::nil());
    }

    #[test]
    fn fixture_converts_to_structure_with_same_uuid() {
        let fixture = FixtureId::new();
        let structure = StructureId::from(fixture);
        assert_eq!(structure.into_inner(), fixture.into_inner());
    }

    #[test]
    fn id_serializes_as_bare_uuid() {
        let id = ZoneId::new();
        let json = serde_json::to_string(&id).ok();
        assert_eq!(json, Some(format!("\"{}\"", id.into_inner())));
    }
}
