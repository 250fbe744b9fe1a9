// ADDRESS REGISTRY
// Ordered identity list with O(1) membership and index lookup
//
// SAFETY INVARIANTS:
// 1. Every identity appears at most once in the ordered list
// 2. status(a).is_member == true  <=>  a is in the list
// 3. For members, status(a).index is a's position in the list
// 4. Removal is swap-with-last-and-shrink: only the moved entry's index changes
// 5. A removed identity keeps its last index unless the policy resets it

use crate::error::{Result, ValidatorSetError};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Membership record for one identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Status {
    pub is_member: bool,
    pub index: usize,
}

/// What happens to a removed identity's recorded index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovedIndexPolicy {
    /// Keep the index the identity had when it was removed. An identity
    /// removed from the last slot records index 0, since its slot is gone.
    #[default]
    Retain,

    /// Zero the index on every removal.
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRegistry {
    entries: Vec<Address>,
    status: HashMap<Address, Status>,
    removed_index: RemovedIndexPolicy,
}

impl AddressRegistry {
    pub fn new(removed_index: RemovedIndexPolicy) -> Self {
        AddressRegistry {
            entries: Vec::new(),
            status: HashMap::new(),
            removed_index,
        }
    }

    /// Build a registry holding `addresses` in order.
    ///
    /// Fails on the first repeated identity.
    pub fn from_addresses(addresses: &[Address], removed_index: RemovedIndexPolicy) -> Result<Self> {
        let mut registry = AddressRegistry::new(removed_index);
        for address in addresses {
            registry.insert(*address)?;
        }
        Ok(registry)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn as_slice(&self) -> &[Address] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<Address> {
        self.entries.clone()
    }

    pub fn get(&self, index: usize) -> Option<&Address> {
        self.entries.get(index)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.status(address).is_member
    }

    /// Status of `address`. Identities never seen report `(false, 0)`.
    pub fn status(&self, address: &Address) -> Status {
        self.status.get(address).copied().unwrap_or_default()
    }

    pub fn removed_index_policy(&self) -> RemovedIndexPolicy {
        self.removed_index
    }

    /// Append `address`, returning its index.
    pub fn insert(&mut self, address: Address) -> Result<usize> {
        if self.contains(&address) {
            return Err(ValidatorSetError::DuplicateValidator(address));
        }

        let index = self.entries.len();
        self.entries.push(address);
        self.status.insert(
            address,
            Status {
                is_member: true,
                index,
            },
        );
        Ok(index)
    }

    /// Remove `address` by moving the last entry into its slot.
    ///
    /// Returns the index the identity occupied.
    pub fn remove(&mut self, address: &Address) -> Result<usize> {
        let status = self.status(address);
        if !status.is_member {
            return Err(ValidatorSetError::NotAMember(*address));
        }

        let index = status.index;
        self.entries.swap_remove(index);
        let was_last = index == self.entries.len();
        if let Some(moved) = self.entries.get(index).copied() {
            if let Some(moved_status) = self.status.get_mut(&moved) {
                moved_status.index = index;
            }
        }

        let retained_index = match self.removed_index {
            RemovedIndexPolicy::Retain if was_last => 0,
            RemovedIndexPolicy::Retain => index,
            RemovedIndexPolicy::Reset => 0,
        };
        self.status.insert(
            *address,
            Status {
                is_member: false,
                index: retained_index,
            },
        );
        Ok(index)
    }
}
