// VALIDATOR SET ERRORS
// Every rejection is terminal for the call that triggered it and leaves the
// contract state exactly as it was before the call.

use crate::access::Capability;
use crate::types::Address;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidatorSetError {
    #[error("{caller} lacks the {required} capability")]
    Unauthorized {
        caller: Address,
        required: Capability,
    },

    #[error("validator {0} is already in the set")]
    DuplicateValidator(Address),

    #[error("{0} is not a validator")]
    NotAMember(Address),

    #[error("a validator set change is already pending finalization")]
    ChangeAlreadyPending,

    #[error("no validator set change is pending")]
    NoPendingChange,

    #[error("report for block {block_number} is older than {window} blocks at block {current_block}")]
    StaleReport {
        block_number: u64,
        current_block: u64,
        window: u64,
    },

    #[error("reported identity {0} is not a validator")]
    UnknownValidator(Address),

    #[error("no relayed validator set is linked")]
    RelayNotLinked,
}

impl ValidatorSetError {
    /// Short machine-readable tag, used in logs and by the admin tool.
    pub fn kind(&self) -> &'static str {
        match self {
            ValidatorSetError::Unauthorized { .. } => "unauthorized",
            ValidatorSetError::DuplicateValidator(_) => "duplicate_validator",
            ValidatorSetError::NotAMember(_) => "not_a_member",
            ValidatorSetError::ChangeAlreadyPending => "change_already_pending",
            ValidatorSetError::NoPendingChange => "no_pending_change",
            ValidatorSetError::StaleReport { .. } => "stale_report",
            ValidatorSetError::UnknownValidator(_) => "unknown_validator",
            ValidatorSetError::RelayNotLinked => "relay_not_linked",
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidatorSetError>;
