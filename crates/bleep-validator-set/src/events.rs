// VALIDATOR SET NOTIFICATIONS
// Append-only per-contract event log with live fan-out to subscribers
//
// SAFETY INVARIANTS:
// 1. Events are appended only after the emitting call has committed
// 2. Records are never reordered or removed
// 3. A lagging or absent subscriber never blocks or fails the emitting call

use crate::types::{Address, BlockHash};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffered records per subscriber before the oldest are dropped.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ValidatorSetEvent {
    /// A change was proposed; the consensus engine should schedule finalization.
    ChangeProposed {
        parent_hash: BlockHash,
        proposed_set: Vec<Address>,
    },

    /// The pending set became the current set.
    ChangeFinalized { current_set: Vec<Address> },

    /// A validator reported misbehaviour by another validator.
    Report {
        reporter: Address,
        reported: Address,
        malicious: bool,
        block_number: u64,
        #[serde(with = "hex::serde")]
        proof: Vec<u8>,
    },

    OwnerChanged { old: Address, current: Address },

    RelayLinkChanged { old: Address, current: Address },
}

impl ValidatorSetEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ValidatorSetEvent::ChangeProposed { .. } => "ChangeProposed",
            ValidatorSetEvent::ChangeFinalized { .. } => "ChangeFinalized",
            ValidatorSetEvent::Report { .. } => "Report",
            ValidatorSetEvent::OwnerChanged { .. } => "OwnerChanged",
            ValidatorSetEvent::RelayLinkChanged { .. } => "RelayLinkChanged",
        }
    }
}

/// An event together with the block it was emitted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "block")]
    pub block_number: u64,
    #[serde(flatten)]
    pub event: ValidatorSetEvent,
}

pub struct EventLog {
    records: RwLock<Vec<EventRecord>>,
    sender: broadcast::Sender<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        EventLog {
            records: RwLock::new(Vec::new()),
            sender,
        }
    }

    pub(crate) fn emit(&self, block_number: u64, event: ValidatorSetEvent) {
        let record = EventRecord { block_number, event };
        self.records.write().push(record.clone());
        // No subscribers is not an error.
        let _ = self.sender.send(record);
    }

    /// Number of records so far. Doubles as a cursor for [`EventLog::since`].
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    pub fn all(&self) -> Vec<EventRecord> {
        self.records.read().clone()
    }

    /// Events appended after `cursor`.
    pub fn since(&self, cursor: usize) -> Vec<ValidatorSetEvent> {
        self.records
            .read()
            .iter()
            .skip(cursor)
            .map(|r| r.event.clone())
            .collect()
    }

    /// Receive every record emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLog").field("len", &self.len()).finish()
    }
}
