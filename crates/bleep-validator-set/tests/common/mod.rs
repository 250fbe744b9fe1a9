// Shared harness for the validator set integration suites
#![allow(dead_code)]

use bleep_validator_set::{
    Address, CallContext, Deployment, LocalChain, OuterSet, RelaySet, RelayedOwnedSet,
    RemovedIndexPolicy, Topology, ValidatorSetConfig, ValidatorSetEvent, ValidatorSetGovernance,
    ValidatorSetView,
};
use std::sync::Arc;

pub const OWNER: u64 = 0;
pub const SYSTEM: u64 = 9;

/// Deterministic test account `n`.
pub fn account(n: u64) -> Address {
    Address::from_low_u64_be(0xacc0_0000 + n)
}

pub fn initial_validators() -> Vec<Address> {
    vec![account(0), account(1), account(2)]
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn config(relayed: bool) -> ValidatorSetConfig {
    topology_config(if relayed { Topology::Relayed } else { Topology::Standalone })
}

pub fn topology_config(topology: Topology) -> ValidatorSetConfig {
    let mut config = ValidatorSetConfig::new(account(OWNER), account(SYSTEM), initial_validators());
    config.topology = topology;
    config
}

/// A deployment plus the chain every call is mined on.
pub struct Harness {
    pub chain: LocalChain,
    pub deployment: Deployment,
}

impl Harness {
    pub fn deploy(config: ValidatorSetConfig) -> Self {
        init_logging();
        let mut chain = LocalChain::new();
        let deployment = Deployment::deploy(&config, &mut chain).unwrap();
        Harness { chain, deployment }
    }

    pub fn standalone() -> Self {
        Self::deploy(config(false))
    }

    pub fn relayed() -> Self {
        Self::deploy(config(true))
    }

    pub fn outer() -> Self {
        Self::deploy(topology_config(Topology::Outer))
    }

    pub fn with_policy(relayed: bool, policy: RemovedIndexPolicy) -> Self {
        let mut config = config(relayed);
        config.removed_index = policy;
        Self::deploy(config)
    }

    /// Deployed and with the genesis set already finalized.
    pub fn finalized(relayed: bool) -> Self {
        let mut harness = Self::deploy(config(relayed));
        harness.finalize().unwrap();
        harness
    }

    pub fn view(&self) -> &dyn ValidatorSetView {
        self.deployment.view()
    }

    pub fn governance(&self) -> &dyn ValidatorSetGovernance {
        self.deployment.governance()
    }

    /// Context for a transaction from account `n`.
    pub fn tx(&mut self, n: u64) -> CallContext {
        self.chain.transact(account(n))
    }

    pub fn finalize(&mut self) -> bleep_validator_set::Result<()> {
        let ctx = self.tx(SYSTEM);
        self.deployment.view().finalize_change(&ctx)
    }

    pub fn add(&mut self, from: u64, validator: Address) -> bleep_validator_set::Result<()> {
        let ctx = self.tx(from);
        self.deployment.governance().add_validator(&ctx, validator)
    }

    pub fn remove(&mut self, from: u64, validator: Address) -> bleep_validator_set::Result<()> {
        let ctx = self.tx(from);
        self.deployment.governance().remove_validator(&ctx, validator)
    }

    pub fn report_benign(&mut self, from: u64, validator: Address, block: u64) -> bleep_validator_set::Result<()> {
        let ctx = self.tx(from);
        self.deployment.view().report_benign(&ctx, validator, block)
    }

    pub fn report_malicious(
        &mut self,
        from: u64,
        validator: Address,
        block: u64,
        proof: &[u8],
    ) -> bleep_validator_set::Result<()> {
        let ctx = self.tx(from);
        self.deployment
            .view()
            .report_malicious(&ctx, validator, block, proof)
    }

    /// Cursors into every event log, for use with [`Harness::events_since`].
    pub fn cursors(&self) -> Vec<usize> {
        self.deployment
            .event_logs()
            .into_iter()
            .map(|(_, log)| log.len())
            .collect()
    }

    /// Events appended to any log after `cursors`, in log order.
    pub fn events_since(&self, cursors: &[usize]) -> Vec<ValidatorSetEvent> {
        self.deployment
            .event_logs()
            .into_iter()
            .zip(cursors)
            .flat_map(|((_, log), cursor)| log.since(*cursor))
            .collect()
    }

    /// Front and back of a relayed deployment.
    pub fn relay_pair(&self) -> (Arc<RelaySet>, Arc<RelayedOwnedSet>) {
        match &self.deployment {
            Deployment::Relayed { front, back } => (Arc::clone(front), Arc::clone(back)),
            _ => panic!("deployment has no relay pair"),
        }
    }

    /// Outer and inner set of an outer deployment.
    pub fn outer_pair(&self) -> (Arc<OuterSet>, Arc<RelayedOwnedSet>) {
        match &self.deployment {
            Deployment::Outer { outer, inner } => (Arc::clone(outer), Arc::clone(inner)),
            _ => panic!("deployment has no outer set"),
        }
    }

    /// Proposal events are announced on the consensus-facing contract.
    pub fn proposals(&self) -> Vec<ValidatorSetEvent> {
        self.view()
            .events()
            .since(0)
            .into_iter()
            .filter(|e| matches!(e, ValidatorSetEvent::ChangeProposed { .. }))
            .collect()
    }
}
