// RELAY LINK AUTHORIZATION TESTS
// Either side of a relay link may point at any account, not only at a
// deployed contract. These tests link plain accounts and drive the
// link-guarded entry points directly from them.

mod common;

use bleep_validator_set::{
    Address, BlockHash, CallContext, Capability, RelayFront, RelaySet, RelayedBackend,
    RelayedOwnedSet, Result, SetParams, ValidatorSetError, ValidatorSetEvent,
    ValidatorSetGovernance, ValidatorSetView,
};
use common::*;
use parking_lot::Mutex;
use proptest::prelude::*;
use std::sync::Arc;

/// An externally owned account standing in for either side of a link.
struct ExternalAccount {
    address: Address,
    announced: Mutex<Vec<(Address, Vec<Address>)>>,
}

impl ExternalAccount {
    fn new(address: Address) -> Arc<Self> {
        Arc::new(ExternalAccount {
            address,
            announced: Mutex::new(Vec::new()),
        })
    }
}

impl RelayFront for ExternalAccount {
    fn address(&self) -> Address {
        self.address
    }

    fn initiate_change(&self, ctx: &CallContext, _parent_hash: BlockHash, new_set: &[Address]) -> Result<()> {
        self.announced.lock().push((ctx.caller, new_set.to_vec()));
        Ok(())
    }
}

impl RelayedBackend for ExternalAccount {
    fn address(&self) -> Address {
        self.address
    }

    fn get_validators(&self) -> Vec<Address> {
        Vec::new()
    }

    fn get_pending(&self) -> Vec<Address> {
        Vec::new()
    }

    fn finalized(&self) -> bool {
        true
    }

    fn finalize_change(&self, _ctx: &CallContext) -> Result<()> {
        Ok(())
    }

    fn relay_report_benign(&self, _: &CallContext, _: Address, _: Address, _: u64) -> Result<()> {
        Ok(())
    }

    fn relay_report_malicious(&self, _: &CallContext, _: Address, _: Address, _: u64, _: &[u8]) -> Result<()> {
        Ok(())
    }
}

fn ctx(caller: Address, block: u64) -> CallContext {
    CallContext::new(caller, block, BlockHash([block as u8; 32]))
}

fn back() -> RelayedOwnedSet {
    init_logging();
    RelayedOwnedSet::new(
        Address::from_low_u64_be(0x1000),
        account(OWNER),
        &initial_validators(),
        SetParams::default(),
    )
    .unwrap()
}

fn front() -> RelaySet {
    init_logging();
    RelaySet::new(Address::from_low_u64_be(0x1001), account(OWNER), account(SYSTEM))
}

// ============================================================================
// BACK: setRelay to an account
// ============================================================================

#[test]
fn test_linked_account_finalizes_back() {
    let back = back();
    let relay = ExternalAccount::new(account(0));
    back.set_relay(&ctx(account(OWNER), 1), &relay).unwrap();
    assert_eq!(back.relay(), account(0));

    assert!(matches!(
        RelayedBackend::finalize_change(&back, &ctx(account(1), 2)),
        Err(ValidatorSetError::Unauthorized { required: Capability::LinkedFront, .. })
    ));
    RelayedBackend::finalize_change(&back, &ctx(account(0), 3)).unwrap();
    assert!(RelayedBackend::finalized(&back));
}

#[test]
fn test_linked_account_receives_proposals() {
    let back = back();
    let relay = ExternalAccount::new(account(0));
    back.set_relay(&ctx(account(OWNER), 1), &relay).unwrap();
    RelayedBackend::finalize_change(&back, &ctx(account(0), 2)).unwrap();

    back.add_validator(&ctx(account(OWNER), 3), account(3)).unwrap();

    let announced = relay.announced.lock().clone();
    let mut proposed = initial_validators();
    proposed.push(account(3));
    assert_eq!(announced, vec![(back.address(), proposed)]);
}

#[test]
fn test_linked_account_relays_reports() {
    let back = back();
    let relay = ExternalAccount::new(account(0));
    back.set_relay(&ctx(account(OWNER), 1), &relay).unwrap();

    back.relay_report_benign(&ctx(account(0), 5), account(1), account(2), 4)
        .unwrap();
    assert_eq!(
        ValidatorSetGovernance::events(&back).since(0),
        vec![ValidatorSetEvent::Report {
            reporter: account(1),
            reported: account(2),
            malicious: false,
            block_number: 4,
            proof: Vec::new(),
        }]
    );

    // the relayed reporter must still be a validator
    assert!(matches!(
        back.relay_report_benign(&ctx(account(0), 6), account(7), account(2), 5),
        Err(ValidatorSetError::Unauthorized { required: Capability::Validator, .. })
    ));
}

#[test]
fn test_only_owner_sets_relay() {
    let back = back();
    let relay = ExternalAccount::new(account(1));
    assert!(matches!(
        back.set_relay(&ctx(account(1), 1), &relay),
        Err(ValidatorSetError::Unauthorized { required: Capability::Owner, .. })
    ));
    assert!(back.relay().is_zero());
}

#[test]
fn test_unlinked_back_rejects_everyone() {
    let back = back();
    assert!(matches!(
        RelayedBackend::finalize_change(&back, &ctx(Address::ZERO, 1)),
        Err(ValidatorSetError::Unauthorized { required: Capability::LinkedFront, .. })
    ));
}

// ============================================================================
// FRONT: setRelayed to an account
// ============================================================================

#[test]
fn test_linked_account_initiates_change_on_front() {
    let front = front();
    let relayed = ExternalAccount::new(account(0));
    front.set_relayed(&ctx(account(OWNER), 1), relayed).unwrap();
    assert_eq!(front.relayed(), account(0));

    let set = vec![account(4)];
    assert!(matches!(
        front.initiate_change(&ctx(account(1), 2), BlockHash::ZERO, &set),
        Err(ValidatorSetError::Unauthorized { required: Capability::LinkedBack, .. })
    ));

    let parent = BlockHash([3u8; 32]);
    front
        .initiate_change(&ctx(account(0), 3), parent, &set)
        .unwrap();
    assert_eq!(
        ValidatorSetView::events(&front).since(1),
        vec![ValidatorSetEvent::ChangeProposed {
            parent_hash: parent,
            proposed_set: set,
        }]
    );
}

#[test]
fn test_only_owner_sets_relayed() {
    let front = front();
    assert!(matches!(
        front.set_relayed(&ctx(account(1), 1), ExternalAccount::new(account(1))),
        Err(ValidatorSetError::Unauthorized { required: Capability::Owner, .. })
    ));
    assert!(front.relayed().is_zero());
    assert!(ValidatorSetView::events(&front).is_empty());
}

proptest! {
    #[test]
    fn prop_only_linked_back_may_initiate(linked in 1u64..1000, caller in 1u64..1000) {
        let front = front();
        let linked = Address::from_low_u64_be(linked);
        let caller = Address::from_low_u64_be(caller);
        front.set_relayed(&ctx(account(OWNER), 1), ExternalAccount::new(linked)).unwrap();

        let result = front.initiate_change(&ctx(caller, 2), BlockHash::ZERO, &[]);
        prop_assert_eq!(result.is_ok(), caller == linked);
    }

    #[test]
    fn prop_only_linked_front_may_finalize(linked in 1u64..1000, caller in 1u64..1000) {
        let back = back();
        let linked = Address::from_low_u64_be(linked);
        let caller = Address::from_low_u64_be(caller);
        back.set_relay(&ctx(account(OWNER), 1), &ExternalAccount::new(linked)).unwrap();

        let result = RelayedBackend::finalize_change(&back, &ctx(caller, 2));
        prop_assert_eq!(result.is_ok(), caller == linked);
    }
}
