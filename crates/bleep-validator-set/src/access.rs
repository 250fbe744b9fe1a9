// ACCESS CONTROL
// Role checks performed at the entry of every operation
//
// SAFETY INVARIANTS:
// 1. Each operation names exactly one capability it requires
// 2. A capability is held by exactly one identity at a time, except
//    Validator which is held by every current member of the pending set
// 3. A failed check returns Unauthorized before any state is touched

use crate::error::{Result, ValidatorSetError};
use crate::types::Address;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Proposes set changes, tunes the report window, transfers ownership.
    Owner,

    /// Finalizes pending changes (the consensus engine's identity).
    System,

    /// The relay front currently linked to a relayed set.
    LinkedFront,

    /// The relayed set currently linked behind a relay front.
    LinkedBack,

    /// Any member of the pending validator set.
    Validator,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Owner => "owner",
            Capability::System => "system",
            Capability::LinkedFront => "linked-front",
            Capability::LinkedBack => "linked-back",
            Capability::Validator => "validator",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check that `caller` is the identity holding `capability`.
pub fn require(capability: Capability, caller: Address, holder: Address) -> Result<()> {
    if caller == holder {
        Ok(())
    } else {
        Err(deny(capability, caller))
    }
}

/// Build (and log) the rejection for a caller lacking `capability`.
pub fn deny(capability: Capability, caller: Address) -> ValidatorSetError {
    warn!("Rejected call from {}: {} capability required", caller, capability);
    ValidatorSetError::Unauthorized {
        caller,
        required: capability,
    }
}
