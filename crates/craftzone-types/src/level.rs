//! Capability levels and the tier flags published alongside them.
//!
//! A level is a plain non-negative integer: `0` means no capability, and
//! higher values unlock progressively more recipes. The host additionally
//! exposes one flag per tier so that clients can render the current bench
//! tier without reading the numeric level.

use serde::{Deserialize, Serialize};

/// A capability (craft) level. `0` means no capability.
pub type Level = u32;

/// Level reported when an agent has no zones and no direct bonus.
pub const NO_CAPABILITY: Level = 0;

/// Highest level with a dedicated tier flag.
pub const MAX_TIER: Level = 3;

/// Tier flags derived from a capability level.
///
/// Exactly the flag matching the level is set; levels outside `1..=3`
/// clear all three.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityFlags {
    /// Level is exactly 1.
    pub tier1: bool,
    /// Level is exactly 2.
    pub tier2: bool,
    /// Level is exactly 3.
    pub tier3: bool,
}

impl CapabilityFlags {
    /// Derive the tier flags for `level`.
    pub const fn from_level(level: Level) -> Self {
        Self {
            tier1: level == 1,
            tier2: level == 2,
            tier3: level == MAX_TIER,
        }
    }

    /// Whether any tier flag is set.
    pub const fn any(self) -> bool {
        self.tier1 || self.tier2 || self.tier3
    }
}
