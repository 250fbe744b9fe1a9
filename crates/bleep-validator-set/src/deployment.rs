// DEPLOYMENT
// Wires a standalone set, a linked relay front/back pair, or an outer/inner
// pair from config

use crate::chain::LocalChain;
use crate::error::Result;
use crate::events::EventLog;
use crate::owned_set::OwnedSet;
use crate::outer_set::OuterSet;
use crate::relay::{RelaySet, RelayedOwnedSet};
use crate::settings::{Topology, ValidatorSetConfig};
use crate::view::{ValidatorSetGovernance, ValidatorSetView};
use log::info;
use std::sync::Arc;

pub enum Deployment {
    Standalone(Arc<OwnedSet>),
    Relayed {
        front: Arc<RelaySet>,
        back: Arc<RelayedOwnedSet>,
    },
    Outer {
        outer: Arc<OuterSet>,
        inner: Arc<RelayedOwnedSet>,
    },
}

impl Deployment {
    /// Deploy according to `config`. Links between contracts are set by the
    /// owner in two transactions mined on `chain`.
    pub fn deploy(config: &ValidatorSetConfig, chain: &mut LocalChain) -> Result<Self> {
        match config.topology {
            Topology::Standalone => {
                let set = OwnedSet::new(
                    config.set_address,
                    config.owner,
                    config.system,
                    &config.initial_validators,
                    config.params(),
                )?;
                info!("Deployed standalone validator set at {}", config.set_address);
                Ok(Deployment::Standalone(Arc::new(set)))
            }
            Topology::Relayed => Self::deploy_relayed(config, chain),
            Topology::Outer => Self::deploy_outer(config, chain),
        }
    }

    fn deploy_relayed(config: &ValidatorSetConfig, chain: &mut LocalChain) -> Result<Self> {
        let front = Arc::new(RelaySet::new(config.relay_address, config.owner, config.system));
        let back = Arc::new(RelayedOwnedSet::new(
            config.set_address,
            config.owner,
            &config.initial_validators,
            config.params(),
        )?);

        front.set_relayed(&chain.transact(config.owner), Arc::clone(&back))?;
        back.set_relay(&chain.transact(config.owner), &front)?;
        info!(
            "Deployed relay {} in front of validator set {}",
            config.relay_address, config.set_address
        );
        Ok(Deployment::Relayed { front, back })
    }

    fn deploy_outer(config: &ValidatorSetConfig, chain: &mut LocalChain) -> Result<Self> {
        let outer = Arc::new(OuterSet::new(config.relay_address, config.owner, config.system));
        let inner = Arc::new(RelayedOwnedSet::new_inner(
            config.set_address,
            config.owner,
            &config.initial_validators,
            config.params(),
        )?);

        outer.set_inner(&chain.transact(config.owner), Arc::clone(&inner))?;
        inner.set_relay(&chain.transact(config.owner), &outer)?;
        info!(
            "Deployed outer set {} finalizing for inner set {}",
            config.relay_address, config.set_address
        );
        Ok(Deployment::Outer { outer, inner })
    }

    /// What the consensus engine talks to.
    pub fn view(&self) -> &dyn ValidatorSetView {
        match self {
            Deployment::Standalone(set) => set.as_ref(),
            Deployment::Relayed { front, .. } => front.as_ref(),
            Deployment::Outer { outer, .. } => outer.as_ref(),
        }
    }

    /// What the owner talks to.
    pub fn governance(&self) -> &dyn ValidatorSetGovernance {
        match self {
            Deployment::Standalone(set) => set.as_ref(),
            Deployment::Relayed { back, .. } => back.as_ref(),
            Deployment::Outer { inner, .. } => inner.as_ref(),
        }
    }

    /// Every event log in the deployment, labelled by contract role.
    pub fn event_logs(&self) -> Vec<(&'static str, &EventLog)> {
        match self {
            Deployment::Standalone(set) => vec![("set", ValidatorSetView::events(set.as_ref()))],
            Deployment::Relayed { front, back } => vec![
                ("relay", ValidatorSetView::events(front.as_ref())),
                ("set", ValidatorSetGovernance::events(back.as_ref())),
            ],
            Deployment::Outer { outer, inner } => vec![
                ("outer", ValidatorSetView::events(outer.as_ref())),
                ("set", ValidatorSetGovernance::events(inner.as_ref())),
            ],
        }
    }

    /// Whether finalization state lives on a contract other than the governed set.
    pub fn is_relayed(&self) -> bool {
        !matches!(self, Deployment::Standalone(_))
    }

    pub fn topology(&self) -> Topology {
        match self {
            Deployment::Standalone(_) => Topology::Standalone,
            Deployment::Relayed { .. } => Topology::Relayed,
            Deployment::Outer { .. } => Topology::Outer,
        }
    }

    /// Whether the deployment has no change awaiting finalization, as seen
    /// by the contract that owns that state.
    pub fn finalized(&self) -> bool {
        match self {
            Deployment::Outer { outer, .. } => outer.finalized(),
            _ => self.governance().finalized(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ValidatorSetEvent;
    use crate::types::Address;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[test]
    fn test_relayed_deployment_is_linked_both_ways() {
        let mut config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1), addr(2)]);
        config.topology = Topology::Relayed;
        let mut chain = LocalChain::new();

        let deployment = Deployment::deploy(&config, &mut chain).unwrap();
        let Deployment::Relayed { front, back } = &deployment else {
            panic!("expected relayed deployment");
        };

        assert_eq!(front.relayed(), config.set_address);
        assert_eq!(back.relay(), config.relay_address);
        assert_eq!(chain.height(), 2);
        assert_eq!(
            front.events().since(0),
            vec![ValidatorSetEvent::RelayLinkChanged {
                old: Address::ZERO,
                current: config.set_address,
            }]
        );
        assert_eq!(deployment.view().get_validators(), vec![addr(1), addr(2)]);
    }

    #[test]
    fn test_standalone_deployment_shares_one_contract() {
        let config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1)]);
        let mut chain = LocalChain::new();

        let deployment = Deployment::deploy(&config, &mut chain).unwrap();
        assert!(!deployment.is_relayed());
        assert_eq!(deployment.view().address(), config.set_address);
        assert_eq!(deployment.event_logs().len(), 1);
        assert_eq!(deployment.topology(), Topology::Standalone);
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_outer_deployment_finalizes_on_outer() {
        let mut config = ValidatorSetConfig::new(addr(1), addr(9), vec![addr(1), addr(2)]);
        config.topology = Topology::Outer;
        let mut chain = LocalChain::new();

        let deployment = Deployment::deploy(&config, &mut chain).unwrap();
        let Deployment::Outer { outer, inner } = &deployment else {
            panic!("expected outer deployment");
        };
        assert_eq!(outer.inner(), config.set_address);
        assert_eq!(inner.relay(), config.relay_address);
        assert!(!inner.announces_finalization());
        assert!(!deployment.finalized());

        deployment
            .view()
            .finalize_change(&chain.transact(addr(9)))
            .unwrap();
        assert!(deployment.finalized());

        let labels: Vec<_> = deployment.event_logs().into_iter().map(|(label, _)| label).collect();
        assert_eq!(labels, vec!["outer", "set"]);
        assert!(matches!(
            outer.events().all().last().map(|r| &r.event),
            Some(ValidatorSetEvent::ChangeFinalized { .. })
        ));
        assert!(ValidatorSetGovernance::events(inner.as_ref()).is_empty());
    }
}
