// OUTER / INNER DELEGATION
// A consensus-facing outer set that owns the finalization state of the pair,
// in front of an inner set that owns membership
//
// SAFETY INVARIANTS:
// 1. finalized() is answered by the outer alone; it drops to false whenever
//    the linked inner announces a change and rises only on finalize_change
// 2. Only the system identity finalizes, and only through the outer
// 3. ChangeProposed and ChangeFinalized land on the outer's log; reports and
//    ownership changes of the inner land on the inner's log
// 4. The outer's flag lock is never held while calling into the inner, since
//    the inner holds its state lock while announcing to the outer

use crate::access::{require, Capability};
use crate::error::{Result, ValidatorSetError};
use crate::events::{EventLog, ValidatorSetEvent};
use crate::relay::{RelayFront, RelaySet, RelayedBackend};
use crate::types::{Address, BlockHash, CallContext};
use crate::view::ValidatorSetView;
use log::info;
use parking_lot::RwLock;
use std::sync::Arc;

/// Outer half of an outer/inner pair.
pub struct OuterSet {
    relay: RelaySet,
    finalized: RwLock<bool>,
}

impl OuterSet {
    /// Create an unlinked outer set. Link it with [`OuterSet::set_inner`].
    pub fn new(address: Address, owner: Address, system: Address) -> Self {
        OuterSet {
            relay: RelaySet::new(address, owner, system),
            finalized: RwLock::new(false),
        }
    }

    pub fn finalized(&self) -> bool {
        *self.finalized.read()
    }

    pub fn owner(&self) -> Address {
        self.relay.owner()
    }

    pub fn system(&self) -> Address {
        self.relay.system()
    }

    /// Address of the linked inner set, or the zero address.
    pub fn inner(&self) -> Address {
        self.relay.relayed()
    }

    /// Link the inner set. The outer adopts the inner's finalization state.
    pub fn set_inner<B: RelayedBackend + 'static>(&self, ctx: &CallContext, inner: Arc<B>) -> Result<()> {
        let finalized = inner.finalized();
        self.relay.set_relayed(ctx, inner)?;
        *self.finalized.write() = finalized;
        Ok(())
    }

    pub fn set_owner(&self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        self.relay.set_owner(ctx, new_owner)
    }
}

impl RelayFront for OuterSet {
    fn address(&self) -> Address {
        RelayFront::address(&self.relay)
    }

    fn initiate_change(&self, ctx: &CallContext, parent_hash: BlockHash, new_set: &[Address]) -> Result<()> {
        self.relay.initiate_change(ctx, parent_hash, new_set)?;
        *self.finalized.write() = false;
        Ok(())
    }
}

impl ValidatorSetView for OuterSet {
    fn address(&self) -> Address {
        ValidatorSetView::address(&self.relay)
    }

    fn get_validators(&self) -> Vec<Address> {
        self.relay.get_validators()
    }

    fn get_pending(&self) -> Vec<Address> {
        self.relay.get_pending()
    }

    fn finalize_change(&self, ctx: &CallContext) -> Result<()> {
        require(Capability::System, ctx.caller, self.relay.system())?;
        {
            let mut finalized = self.finalized.write();
            if *finalized {
                return Err(ValidatorSetError::NoPendingChange);
            }
            *finalized = true;
        }

        if let Err(e) = self.relay.finalize_change(ctx) {
            *self.finalized.write() = false;
            return Err(e);
        }

        let current_set = self.relay.get_validators();
        info!(
            "Outer set {} finalized {} validators",
            ValidatorSetView::address(&self.relay),
            current_set.len()
        );
        self.events()
            .emit(ctx.block_number, ValidatorSetEvent::ChangeFinalized { current_set });
        Ok(())
    }

    fn report_benign(&self, ctx: &CallContext, validator: Address, block_number: u64) -> Result<()> {
        self.relay.report_benign(ctx, validator, block_number)
    }

    fn report_malicious(
        &self,
        ctx: &CallContext,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()> {
        self.relay
            .report_malicious(ctx, validator, block_number, proof)
    }

    fn events(&self) -> &EventLog {
        ValidatorSetView::events(&self.relay)
    }
}
