// PROOF-OF-AUTHORITY VALIDATOR SET GOVERNANCE
// Owner-governed validator set with two-phase (propose/finalize) changes,
// misbehaviour reporting and an optional relay front with a stable address,
// or an outer set that takes over finalization for an inner set
pub mod types;
pub mod error;
pub mod access;
pub mod registry;
pub mod events;
pub mod state_machine;
pub mod chain;
pub mod view;
pub mod owned_set;
pub mod relay;
pub mod outer_set;
pub mod settings;
pub mod deployment;

pub use types::{Address, BlockHash, CallContext, ParseHexError};
pub use error::{Result, ValidatorSetError};
pub use access::Capability;
pub use registry::{AddressRegistry, RemovedIndexPolicy, Status};
pub use events::{EventLog, EventRecord, ValidatorSetEvent};
pub use state_machine::{EpochPhase, PendingMutation, SetParams, ValidatorSetState, DEFAULT_RECENT_BLOCKS};
pub use chain::LocalChain;
pub use view::{ValidatorSetGovernance, ValidatorSetView};
pub use owned_set::OwnedSet;
pub use relay::{RelayFront, RelaySet, RelayedBackend, RelayedOwnedSet};
pub use outer_set::OuterSet;
pub use settings::{ConfigError, Topology, ValidatorSetConfig};
pub use deployment::Deployment;
