// DEPLOYMENT CONFIGURATION
// File + environment driven description of a validator set deployment
//
// Sources, later overriding earlier:
//   1. the config file (TOML, JSON or YAML, chosen by extension)
//   2. BLEEP_VALSET__<FIELD> environment variables
//      (initial_validators is a comma separated list)

use crate::registry::RemovedIndexPolicy;
use crate::state_machine::{SetParams, DEFAULT_RECENT_BLOCKS};
use crate::types::Address;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub const ENV_PREFIX: &str = "BLEEP_VALSET";

/// Default address of the standalone set or the relayed back.
pub const DEFAULT_SET_ADDRESS: u64 = 0x1000;

/// Default address of the relay front or the outer set.
pub const DEFAULT_RELAY_ADDRESS: u64 = 0x1001;

/// Contracts a deployment is made of.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// One set at `set_address`.
    #[default]
    Standalone,

    /// Relay front at `relay_address`, relayed set at `set_address`.
    Relayed,

    /// Outer set at `relay_address` owning finalization, inner set at
    /// `set_address`.
    Outer,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Source(#[from] ::config::ConfigError),

    #[error("initial validator set is empty")]
    EmptyValidatorSet,

    #[error("initial validator {0} is listed more than once")]
    DuplicateValidator(Address),

    #[error("system address must not be zero")]
    ZeroSystem,

    #[error("set and relay addresses must differ")]
    AddressCollision,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSetConfig {
    pub owner: Address,
    pub system: Address,
    pub initial_validators: Vec<Address>,

    #[serde(default = "default_recent_blocks")]
    pub recent_blocks: u64,

    #[serde(default)]
    pub removed_index: RemovedIndexPolicy,

    #[serde(default)]
    pub topology: Topology,

    #[serde(default = "default_set_address")]
    pub set_address: Address,

    #[serde(default = "default_relay_address")]
    pub relay_address: Address,
}

fn default_recent_blocks() -> u64 {
    DEFAULT_RECENT_BLOCKS
}

fn default_set_address() -> Address {
    Address::from_low_u64_be(DEFAULT_SET_ADDRESS)
}

fn default_relay_address() -> Address {
    Address::from_low_u64_be(DEFAULT_RELAY_ADDRESS)
}

impl ValidatorSetConfig {
    pub fn new(owner: Address, system: Address, initial_validators: Vec<Address>) -> Self {
        ValidatorSetConfig {
            owner,
            system,
            initial_validators,
            recent_blocks: DEFAULT_RECENT_BLOCKS,
            removed_index: RemovedIndexPolicy::default(),
            topology: Topology::Standalone,
            set_address: default_set_address(),
            relay_address: default_relay_address(),
        }
    }

    /// Load from `path` plus environment overrides, then validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(
                ::config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("initial_validators"),
            )
            .build()?;

        let config: ValidatorSetConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_validators.is_empty() {
            return Err(ConfigError::EmptyValidatorSet);
        }

        let mut seen = HashSet::new();
        for validator in &self.initial_validators {
            if !seen.insert(*validator) {
                return Err(ConfigError::DuplicateValidator(*validator));
            }
        }

        if self.system.is_zero() {
            return Err(ConfigError::ZeroSystem);
        }
        if self.topology != Topology::Standalone && self.set_address == self.relay_address {
            return Err(ConfigError::AddressCollision);
        }
        Ok(())
    }

    pub fn params(&self) -> SetParams {
        SetParams {
            recent_blocks: self.recent_blocks,
            removed_index: self.removed_index,
        }
    }
}
