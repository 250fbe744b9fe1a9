// VALIDATOR SET INTERFACES
// The consensus-facing view and the owner-facing governance surface
//
// SAFETY: the consensus engine only ever talks to a ValidatorSetView; the
// contract behind it (standalone set or relay front) can change without the
// engine's configuration changing.

use crate::error::Result;
use crate::events::EventLog;
use crate::registry::Status;
use crate::state_machine::PendingMutation;
use crate::types::{Address, CallContext};

/// What the consensus engine reads and calls.
pub trait ValidatorSetView: Send + Sync {
    /// Address the consensus engine is configured with.
    fn address(&self) -> Address;

    /// Validators in force for block production.
    fn get_validators(&self) -> Vec<Address>;

    fn get_pending(&self) -> Vec<Address>;

    /// Promote the pending set. Only the system identity may call this.
    fn finalize_change(&self, ctx: &CallContext) -> Result<()>;

    fn report_benign(&self, ctx: &CallContext, validator: Address, block_number: u64) -> Result<()>;

    fn report_malicious(
        &self,
        ctx: &CallContext,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()>;

    /// Log carrying this contract's change proposals.
    fn events(&self) -> &EventLog;
}

/// What the owner operates.
pub trait ValidatorSetGovernance: Send + Sync {
    fn owner(&self) -> Address;

    fn finalized(&self) -> bool;

    fn recent_blocks(&self) -> u64;

    fn pending_change(&self) -> Option<PendingMutation>;

    fn get_status(&self, address: &Address) -> Status;

    fn get_pending(&self) -> Vec<Address>;

    fn add_validator(&self, ctx: &CallContext, validator: Address) -> Result<()>;

    fn remove_validator(&self, ctx: &CallContext, validator: Address) -> Result<()>;

    fn set_owner(&self, ctx: &CallContext, new_owner: Address) -> Result<()>;

    fn set_recent_blocks(&self, ctx: &CallContext, window: u64) -> Result<()>;

    /// Log carrying finalizations, reports and ownership changes.
    fn events(&self) -> &EventLog;
}
