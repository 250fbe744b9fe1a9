// VALIDATOR SET STATE MACHINE
// Current/pending set duality with one owner-proposed change per epoch
//
// SAFETY INVARIANTS:
// 1. At most one PendingMutation is outstanding at any time
// 2. add/remove and finalize strictly alternate (Idle -> ChangePending -> Idle)
// 3. The pending status map is authoritative for every membership decision
// 4. current == pending after every successful finalize
// 5. A rejected call never mutates state: all checks precede all writes
// 6. The initial set itself is pending until the first finalize

use crate::access::{deny, require, Capability};
use crate::error::{Result, ValidatorSetError};
use crate::registry::{AddressRegistry, RemovedIndexPolicy, Status};
use crate::types::Address;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

/// Blocks a misbehaviour report may look back by default.
pub const DEFAULT_RECENT_BLOCKS: u64 = 20;

/// The single outstanding change awaiting finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "validator", rename_all = "snake_case")]
pub enum PendingMutation {
    /// The construction-time set has not been finalized yet.
    Genesis,
    Add(Address),
    Remove(Address),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EpochPhase {
    Idle,
    ChangePending,
}

/// Tunables fixed at construction (recent_blocks stays owner-adjustable).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetParams {
    pub recent_blocks: u64,
    pub removed_index: RemovedIndexPolicy,
}

impl Default for SetParams {
    fn default() -> Self {
        SetParams {
            recent_blocks: DEFAULT_RECENT_BLOCKS,
            removed_index: RemovedIndexPolicy::default(),
        }
    }
}

/// Governance state of one validator set.
///
/// Capability checks for Owner and Validator happen here; the finalizing
/// identity differs between the standalone and relayed contracts, so
/// [`ValidatorSetState::finalize`] expects its caller to be checked already.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSetState {
    owner: Address,
    current: Vec<Address>,
    pending: AddressRegistry,
    pending_change: Option<PendingMutation>,
    recent_blocks: u64,
}

impl ValidatorSetState {
    pub fn new(owner: Address, initial: &[Address], params: SetParams) -> Result<Self> {
        let pending = AddressRegistry::from_addresses(initial, params.removed_index)?;
        info!(
            "Validator set created with {} validators (owner {})",
            pending.len(),
            owner
        );

        Ok(ValidatorSetState {
            owner,
            current: pending.to_vec(),
            pending,
            pending_change: Some(PendingMutation::Genesis),
            recent_blocks: params.recent_blocks,
        })
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn validators(&self) -> &[Address] {
        &self.current
    }

    pub fn pending(&self) -> &[Address] {
        self.pending.as_slice()
    }

    pub fn status(&self, address: &Address) -> Status {
        self.pending.status(address)
    }

    pub fn is_validator(&self, address: &Address) -> bool {
        self.pending.contains(address)
    }

    pub fn pending_change(&self) -> Option<PendingMutation> {
        self.pending_change
    }

    pub fn finalized(&self) -> bool {
        self.pending_change.is_none()
    }

    pub fn phase(&self) -> EpochPhase {
        match self.pending_change {
            Some(_) => EpochPhase::ChangePending,
            None => EpochPhase::Idle,
        }
    }

    pub fn recent_blocks(&self) -> u64 {
        self.recent_blocks
    }

    /// Stage `validator` for addition. Returns the full proposed set.
    pub fn propose_add(&mut self, caller: Address, validator: Address) -> Result<Vec<Address>> {
        require(Capability::Owner, caller, self.owner)?;
        if self.pending.contains(&validator) {
            return Err(ValidatorSetError::DuplicateValidator(validator));
        }
        self.ensure_idle()?;

        let index = self.pending.insert(validator)?;
        self.pending_change = Some(PendingMutation::Add(validator));
        info!("Proposed adding validator {} at index {}", validator, index);
        Ok(self.pending.to_vec())
    }

    /// Stage `validator` for removal. Returns the full proposed set.
    pub fn propose_remove(&mut self, caller: Address, validator: Address) -> Result<Vec<Address>> {
        require(Capability::Owner, caller, self.owner)?;
        if !self.pending.contains(&validator) {
            return Err(ValidatorSetError::NotAMember(validator));
        }
        self.ensure_idle()?;

        let index = self.pending.remove(&validator)?;
        self.pending_change = Some(PendingMutation::Remove(validator));
        info!("Proposed removing validator {} from index {}", validator, index);
        Ok(self.pending.to_vec())
    }

    /// Promote the pending set to current. Returns the new current set.
    ///
    /// SAFETY: the caller's finalizing capability must already be verified.
    pub fn finalize(&mut self) -> Result<Vec<Address>> {
        let change = self.pending_change.ok_or(ValidatorSetError::NoPendingChange)?;

        self.current = self.pending.to_vec();
        self.pending_change = None;
        info!(
            "Finalized {:?}: {} validators now current",
            change,
            self.current.len()
        );
        Ok(self.current.clone())
    }

    /// Validate a misbehaviour report made in `current_block`.
    ///
    /// Order of checks: reporter membership, recency, reported membership.
    /// A `block_number` ahead of `current_block` counts as distance zero.
    pub fn check_report(
        &self,
        reporter: Address,
        reported: Address,
        block_number: u64,
        current_block: u64,
    ) -> Result<()> {
        if !self.pending.contains(&reporter) {
            return Err(deny(Capability::Validator, reporter));
        }

        if current_block.saturating_sub(block_number) > self.recent_blocks {
            warn!(
                "Ignoring stale report from {} about block {} (current {}, window {})",
                reporter, block_number, current_block, self.recent_blocks
            );
            return Err(ValidatorSetError::StaleReport {
                block_number,
                current_block,
                window: self.recent_blocks,
            });
        }

        if !self.pending.contains(&reported) {
            return Err(ValidatorSetError::UnknownValidator(reported));
        }

        debug!("Accepted report from {} about {}", reporter, reported);
        Ok(())
    }

    /// Transfer ownership. Returns the previous owner.
    pub fn set_owner(&mut self, caller: Address, new_owner: Address) -> Result<Address> {
        require(Capability::Owner, caller, self.owner)?;
        let old = self.owner;
        self.owner = new_owner;
        info!("Ownership transferred from {} to {}", old, new_owner);
        Ok(old)
    }

    pub fn set_recent_blocks(&mut self, caller: Address, window: u64) -> Result<()> {
        require(Capability::Owner, caller, self.owner)?;
        self.recent_blocks = window;
        info!("Report recency window set to {} blocks", window);
        Ok(())
    }

    fn ensure_idle(&self) -> Result<()> {
        match self.pending_change {
            None => Ok(()),
            Some(_) => Err(ValidatorSetError::ChangeAlreadyPending),
        }
    }
}
