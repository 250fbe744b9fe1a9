// OWNED VALIDATOR SET
// Standalone contract: the owner proposes, the system identity finalizes,
// and change proposals are announced on the set's own event log.
//
// SAFETY INVARIANTS:
// 1. Every public operation is all-or-nothing: the next state is computed
//    first and only committed once every check (and delivery) succeeded
// 2. Events are emitted after the state they describe is committed
// 3. The system identity is fixed at construction

use crate::access::{require, Capability};
use crate::error::Result;
use crate::events::{EventLog, ValidatorSetEvent};
use crate::registry::Status;
use crate::state_machine::{PendingMutation, SetParams, ValidatorSetState};
use crate::types::{Address, CallContext};
use crate::view::{ValidatorSetGovernance, ValidatorSetView};
use log::info;
use parking_lot::RwLock;

#[derive(Debug, Clone, Copy)]
pub(crate) enum Proposal {
    Add(Address),
    Remove(Address),
}

/// State and log shared by the standalone and relayed contracts.
#[derive(Debug)]
pub(crate) struct SetCore {
    state: RwLock<ValidatorSetState>,
    events: EventLog,
}

impl SetCore {
    pub(crate) fn new(owner: Address, initial: &[Address], params: SetParams) -> Result<Self> {
        Ok(SetCore {
            state: RwLock::new(ValidatorSetState::new(owner, initial, params)?),
            events: EventLog::new(),
        })
    }

    pub(crate) fn events(&self) -> &EventLog {
        &self.events
    }

    pub(crate) fn snapshot(&self) -> ValidatorSetState {
        self.state.read().clone()
    }

    pub(crate) fn validators(&self) -> Vec<Address> {
        self.state.read().validators().to_vec()
    }

    pub(crate) fn pending(&self) -> Vec<Address> {
        self.state.read().pending().to_vec()
    }

    pub(crate) fn status(&self, address: &Address) -> Status {
        self.state.read().status(address)
    }

    pub(crate) fn owner(&self) -> Address {
        self.state.read().owner()
    }

    pub(crate) fn finalized(&self) -> bool {
        self.state.read().finalized()
    }

    pub(crate) fn recent_blocks(&self) -> u64 {
        self.state.read().recent_blocks()
    }

    pub(crate) fn pending_change(&self) -> Option<PendingMutation> {
        self.state.read().pending_change()
    }

    /// Stage a change and hand the proposed set to `deliver` before committing.
    ///
    /// A failing `deliver` discards the staged change.
    pub(crate) fn propose<F>(&self, ctx: &CallContext, proposal: Proposal, deliver: F) -> Result<Vec<Address>>
    where
        F: FnOnce(&[Address]) -> Result<()>,
    {
        let mut state = self.state.write();
        let mut next = state.clone();
        let proposed = match proposal {
            Proposal::Add(validator) => next.propose_add(ctx.caller, validator)?,
            Proposal::Remove(validator) => next.propose_remove(ctx.caller, validator)?,
        };
        deliver(&proposed)?;
        *state = next;
        Ok(proposed)
    }

    /// Finalize the pending change. The finalizing capability is the caller's job.
    pub(crate) fn finalize(&self, ctx: &CallContext) -> Result<()> {
        let current_set = self.commit()?;
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::ChangeFinalized { current_set },
        );
        Ok(())
    }

    /// Finalize without announcing. Returns the new current set.
    pub(crate) fn commit(&self) -> Result<Vec<Address>> {
        self.state.write().finalize()
    }

    pub(crate) fn report(
        &self,
        ctx: &CallContext,
        reporter: Address,
        reported: Address,
        block_number: u64,
        proof: Option<&[u8]>,
    ) -> Result<()> {
        self.state
            .read()
            .check_report(reporter, reported, block_number, ctx.block_number)?;

        let malicious = proof.is_some();
        info!(
            "{} reported {} misbehaviour by {} at block {}",
            reporter,
            if malicious { "malicious" } else { "benign" },
            reported,
            block_number
        );
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::Report {
                reporter,
                reported,
                malicious,
                block_number,
                proof: proof.map(<[u8]>::to_vec).unwrap_or_default(),
            },
        );
        Ok(())
    }

    pub(crate) fn set_owner(&self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        let old = self.state.write().set_owner(ctx.caller, new_owner)?;
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::OwnerChanged {
                old,
                current: new_owner,
            },
        );
        Ok(())
    }

    pub(crate) fn set_recent_blocks(&self, ctx: &CallContext, window: u64) -> Result<()> {
        self.state.write().set_recent_blocks(ctx.caller, window)
    }
}

/// Validator set finalized directly by the system identity.
#[derive(Debug)]
pub struct OwnedSet {
    address: Address,
    system: Address,
    core: SetCore,
}

impl OwnedSet {
    pub fn new(
        address: Address,
        owner: Address,
        system: Address,
        initial: &[Address],
        params: SetParams,
    ) -> Result<Self> {
        Ok(OwnedSet {
            address,
            system,
            core: SetCore::new(owner, initial, params)?,
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn system(&self) -> Address {
        self.system
    }

    /// Copy of the full governance state.
    pub fn snapshot(&self) -> ValidatorSetState {
        self.core.snapshot()
    }
}

impl ValidatorSetView for OwnedSet {
    fn address(&self) -> Address {
        self.address
    }

    fn get_validators(&self) -> Vec<Address> {
        self.core.validators()
    }

    fn get_pending(&self) -> Vec<Address> {
        self.core.pending()
    }

    fn finalize_change(&self, ctx: &CallContext) -> Result<()> {
        require(Capability::System, ctx.caller, self.system)?;
        self.core.finalize(ctx)
    }

    fn report_benign(&self, ctx: &CallContext, validator: Address, block_number: u64) -> Result<()> {
        self.core.report(ctx, ctx.caller, validator, block_number, None)
    }

    fn report_malicious(
        &self,
        ctx: &CallContext,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()> {
        self.core
            .report(ctx, ctx.caller, validator, block_number, Some(proof))
    }

    fn events(&self) -> &EventLog {
        self.core.events()
    }
}

impl ValidatorSetGovernance for OwnedSet {
    fn owner(&self) -> Address {
        self.core.owner()
    }

    fn finalized(&self) -> bool {
        self.core.finalized()
    }

    fn recent_blocks(&self) -> u64 {
        self.core.recent_blocks()
    }

    fn pending_change(&self) -> Option<PendingMutation> {
        self.core.pending_change()
    }

    fn get_status(&self, address: &Address) -> Status {
        self.core.status(address)
    }

    fn get_pending(&self) -> Vec<Address> {
        self.core.pending()
    }

    fn add_validator(&self, ctx: &CallContext, validator: Address) -> Result<()> {
        let proposed_set = self.core.propose(ctx, Proposal::Add(validator), |_| Ok(()))?;
        self.announce(ctx, proposed_set);
        Ok(())
    }

    fn remove_validator(&self, ctx: &CallContext, validator: Address) -> Result<()> {
        let proposed_set = self
            .core
            .propose(ctx, Proposal::Remove(validator), |_| Ok(()))?;
        self.announce(ctx, proposed_set);
        Ok(())
    }

    fn set_owner(&self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        self.core.set_owner(ctx, new_owner)
    }

    fn set_recent_blocks(&self, ctx: &CallContext, window: u64) -> Result<()> {
        self.core.set_recent_blocks(ctx, window)
    }

    fn events(&self) -> &EventLog {
        self.core.events()
    }
}

impl OwnedSet {
    fn announce(&self, ctx: &CallContext, proposed_set: Vec<Address>) {
        self.core.events().emit(
            ctx.block_number,
            ValidatorSetEvent::ChangeProposed {
                parent_hash: ctx.parent_hash,
                proposed_set,
            },
        );
    }
}
