// RELAY / DELEGATION ADAPTER
// A stable-address front forwarding to a replaceable back that holds the
// real validator set state machine
//
// SAFETY INVARIANTS:
// 1. Every consensus-facing read on the front is answered by the currently
//    linked back
// 2. The back accepts finalize and relayed reports only from its declared front
// 3. The front accepts change proposals only from its linked back
// 4. Each side's link is guarded by that side's own owner
// 5. The front holds the back strongly, the back holds the front weakly,
//    so relinking never leaks a cycle
// 6. Cross-contract calls never re-enter the caller (front -> back for
//    finalize/reports, back -> front for proposals)

use crate::access::{deny, require, Capability};
use crate::error::{Result, ValidatorSetError};
use crate::events::{EventLog, ValidatorSetEvent};
use crate::owned_set::{Proposal, SetCore};
use crate::registry::Status;
use crate::state_machine::{PendingMutation, SetParams, ValidatorSetState};
use crate::types::{Address, BlockHash, CallContext};
use crate::view::{ValidatorSetGovernance, ValidatorSetView};
use log::{info, warn};
use parking_lot::RwLock;
use std::sync::{Arc, Weak};

/// Surface a relay front forwards to.
#[cfg_attr(test, mockall::automock)]
pub trait RelayedBackend: Send + Sync {
    fn address(&self) -> Address;

    fn get_validators(&self) -> Vec<Address>;

    fn get_pending(&self) -> Vec<Address>;

    /// Whether the back has no change awaiting finalization.
    fn finalized(&self) -> bool;

    /// `ctx.caller` is the forwarding front.
    fn finalize_change(&self, ctx: &CallContext) -> Result<()>;

    fn relay_report_benign(
        &self,
        ctx: &CallContext,
        reporter: Address,
        validator: Address,
        block_number: u64,
    ) -> Result<()>;

    fn relay_report_malicious(
        &self,
        ctx: &CallContext,
        reporter: Address,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()>;
}

/// Surface a relayed set announces its proposals to.
#[cfg_attr(test, mockall::automock)]
pub trait RelayFront: Send + Sync {
    fn address(&self) -> Address;

    /// `ctx.caller` is the announcing back.
    fn initiate_change(&self, ctx: &CallContext, parent_hash: BlockHash, new_set: &[Address]) -> Result<()>;
}

/// Consensus-facing front with a fixed address.
pub struct RelaySet {
    address: Address,
    system: Address,
    owner: RwLock<Address>,
    relayed: RwLock<Option<Arc<dyn RelayedBackend>>>,
    events: EventLog,
}

impl RelaySet {
    /// Create an unlinked front. Link it with [`RelaySet::set_relayed`].
    pub fn new(address: Address, owner: Address, system: Address) -> Self {
        RelaySet {
            address,
            system,
            owner: RwLock::new(owner),
            relayed: RwLock::new(None),
            events: EventLog::new(),
        }
    }

    pub fn system(&self) -> Address {
        self.system
    }

    pub fn owner(&self) -> Address {
        *self.owner.read()
    }

    /// Address of the linked back, or the zero address when unlinked.
    pub fn relayed(&self) -> Address {
        self.relayed
            .read()
            .as_ref()
            .map(|backend| backend.address())
            .unwrap_or(Address::ZERO)
    }

    /// Point the front at a new back.
    pub fn set_relayed<B: RelayedBackend + 'static>(&self, ctx: &CallContext, backend: Arc<B>) -> Result<()> {
        require(Capability::Owner, ctx.caller, self.owner())?;

        let current = backend.address();
        let old = {
            let mut relayed = self.relayed.write();
            let old = relayed
                .as_ref()
                .map(|b| b.address())
                .unwrap_or(Address::ZERO);
            *relayed = Some(backend);
            old
        };

        info!("Relay {} now forwards to {} (was {})", self.address, current, old);
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::RelayLinkChanged { old, current },
        );
        Ok(())
    }

    pub fn set_owner(&self, ctx: &CallContext, new_owner: Address) -> Result<()> {
        let old = {
            let mut owner = self.owner.write();
            require(Capability::Owner, ctx.caller, *owner)?;
            std::mem::replace(&mut *owner, new_owner)
        };
        info!("Relay {} ownership transferred from {} to {}", self.address, old, new_owner);
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::OwnerChanged {
                old,
                current: new_owner,
            },
        );
        Ok(())
    }

    fn backend(&self) -> Result<Arc<dyn RelayedBackend>> {
        self.relayed
            .read()
            .clone()
            .ok_or(ValidatorSetError::RelayNotLinked)
    }

    /// Context for a call the front makes to its back.
    fn forward(&self, ctx: &CallContext) -> CallContext {
        ctx.with_caller(self.address)
    }
}

impl RelayFront for RelaySet {
    fn address(&self) -> Address {
        self.address
    }

    fn initiate_change(&self, ctx: &CallContext, parent_hash: BlockHash, new_set: &[Address]) -> Result<()> {
        let linked = self
            .relayed
            .read()
            .as_ref()
            .map(|backend| backend.address())
            .ok_or_else(|| deny(Capability::LinkedBack, ctx.caller))?;
        require(Capability::LinkedBack, ctx.caller, linked)?;

        info!(
            "Relay {} announcing change to {} validators",
            self.address,
            new_set.len()
        );
        self.events.emit(
            ctx.block_number,
            ValidatorSetEvent::ChangeProposed {
                parent_hash,
                proposed_set: new_set.to_vec(),
            },
        );
        Ok(())
    }
}

impl ValidatorSetView for RelaySet {
    fn address(&self) -> Address {
        self.address
    }

    fn get_validators(&self) -> Vec<Address> {
        match self.backend() {
            Ok(backend) => backend.get_validators(),
            Err(_) => {
                warn!("Relay {} queried with no relayed set linked", self.address);
                Vec::new()
            }
        }
    }

    fn get_pending(&self) -> Vec<Address> {
        match self.backend() {
            Ok(backend) => backend.get_pending(),
            Err(_) => {
                warn!("Relay {} queried for pending set with no relayed set linked", self.address);
                Vec::new()
            }
        }
    }

    fn finalize_change(&self, ctx: &CallContext) -> Result<()> {
        require(Capability::System, ctx.caller, self.system)?;
        self.backend()?.finalize_change(&self.forward(ctx))
    }

    fn report_benign(&self, ctx: &CallContext, validator: Address, block_number: u64) -> Result<()> {
        self.backend()?
            .relay_report_benign(&self.forward(ctx), ctx.caller, validator, block_number)
    }

    fn report_malicious(
        &self,
        ctx: &CallContext,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()> {
        self.backend()?.relay_report_malicious(
            &self.forward(ctx),
            ctx.caller,
            validator,
            block_number,
            proof,
        )
    }

    fn events(&self) -> &EventLog {
        &self.events
    }
}

struct RelayBinding {
    address: Address,
    front: Option<Weak<dyn RelayFront>>,
}

/// Back holding the validator set, reachable through a relay front.
///
/// An inner set (see [`RelayedOwnedSet::new_inner`]) leaves the
/// `ChangeFinalized` announcement to its front, which owns the finalization
/// state of the pair.
pub struct RelayedOwnedSet {
    address: Address,
    relay: RwLock<RelayBinding>,
    core: SetCore,
    announces_finalization: bool,
}

impl RelayedOwnedSet {
    /// Create an unlinked back. Link it with [`RelayedOwnedSet::set_relay`].
    pub fn new(address: Address, owner: Address, initial: &[Address], params: SetParams) -> Result<Self> {
        Self::build(address, owner, initial, params, true)
    }

    /// Create an unlinked inner set, to sit behind an [`OuterSet`](crate::outer_set::OuterSet).
    pub fn new_inner(address: Address, owner: Address, initial: &[Address], params: SetParams) -> Result<Self> {
        Self::build(address, owner, initial, params, false)
    }

    fn build(
        address: Address,
        owner: Address,
        initial: &[Address],
        params: SetParams,
        announces_finalization: bool,
    ) -> Result<Self> {
        Ok(RelayedOwnedSet {
            address,
            relay: RwLock::new(RelayBinding {
                address: Address::ZERO,
                front: None,
            }),
            core: SetCore::new(owner, initial, params)?,
            announces_finalization,
        })
    }

    /// False for an inner set.
    pub fn announces_finalization(&self) -> bool {
        self.announces_finalization
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Address of the declared front, or the zero address.
    pub fn relay(&self) -> Address {
        self.relay.read().address
    }

    pub fn snapshot(&self) -> ValidatorSetState {
        self.core.snapshot()
    }

    /// Declare which front may finalize and relay reports.
    pub fn set_relay<F: RelayFront + 'static>(&self, ctx: &CallContext, front: &Arc<F>) -> Result<()> {
        require(Capability::Owner, ctx.caller, self.core.owner())?;

        let address = front.address();
        let weak: Weak<F> = Arc::downgrade(front);
        let weak: Weak<dyn RelayFront> = weak;
        *self.relay.write() = RelayBinding {
            address,
            front: Some(weak),
        };
        info!("Relayed set {} now answers to relay {}", self.address, address);
        Ok(())
    }

    /// Drop the front link. Finalization is impossible until relinked.
    pub fn clear_relay(&self, ctx: &CallContext) -> Result<()> {
        require(Capability::Owner, ctx.caller, self.core.owner())?;
        *self.relay.write() = RelayBinding {
            address: Address::ZERO,
            front: None,
        };
        info!("Relayed set {} unlinked from its relay", self.address);
        Ok(())
    }

    fn require_front(&self, ctx: &CallContext) -> Result<()> {
        let relay = self.relay();
        if relay.is_zero() {
            return Err(deny(Capability::LinkedFront, ctx.caller));
        }
        require(Capability::LinkedFront, ctx.caller, relay)
    }

    fn front(&self) -> Result<Arc<dyn RelayFront>> {
        self.relay
            .read()
            .front
            .as_ref()
            .and_then(Weak::upgrade)
            .ok_or(ValidatorSetError::RelayNotLinked)
    }

    fn deliver(&self, ctx: &CallContext, proposed: &[Address]) -> Result<()> {
        self.front()?
            .initiate_change(&ctx.with_caller(self.address), ctx.parent_hash, proposed)
    }
}

impl RelayedBackend for RelayedOwnedSet {
    fn address(&self) -> Address {
        self.address
    }

    fn get_validators(&self) -> Vec<Address> {
        self.core.validators()
    }

    fn get_pending(&self) -> Vec<Address> {
        self.core.pending()
    }

    fn finalized(&self) -> bool {
        self.core.finalized()
    }

    fn finalize_change(&self, ctx: &CallContext) -> Result<()> {
        self.require_front(ctx)?;
        if self.announces_finalization {
            self.core.finalize(ctx)
        } else {
            self.core.commit().map(|_| ())
        }
    }

    fn relay_report_benign(
        &self,
        ctx: &CallContext,
        reporter: Address,
        validator: Address,
        block_number: u64,
    ) -> Result<()> {
        self.require_front(ctx)?;
        self.core.report(ctx, reporter, validator, block_number, None)
    }

    fn relay_report_malicious(
        &self,
        ctx: &CallContext,
        reporter: Address,
        validator: Address,
        block_number: u64,
        proof: &[u8],
    ) -> Result<()> {
        self.require_front(ctx)?;
        self.core
            .report(ctx, reporter, validator, block_number, Some(proof))
    }
}

impl ValidatorSetGovernance for RelayedOwnedSet {
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
        self.core
            .propose(ctx, Proposal::Add(validator), |proposed| self.deliver(ctx, proposed))?;
        Ok(())
    }

    fn remove_validator(&self, ctx: &CallContext, validator: Address) -> Result<()> {
        self.core
            .propose(ctx, Proposal::Remove(validator), |proposed| self.deliver(ctx, proposed))?;
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
