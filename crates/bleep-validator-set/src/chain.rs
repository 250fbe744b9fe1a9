// LOCAL CHAIN CLOCK
// Deterministic block heights and hashes for driving the contracts locally
//
// Every transaction is mined into its own block, so a call made with
// `transact` executes at `height() + 1` and sees the current tip as its
// parent. Hashes are Keccak-256 over (parent hash || height).

use crate::types::{Address, BlockHash, CallContext};
use sha3::{Digest, Keccak256};

const GENESIS_SEED: &[u8] = b"bleep-validator-set/genesis";

#[derive(Debug, Clone)]
pub struct LocalChain {
    hashes: Vec<BlockHash>,
}

impl LocalChain {
    pub fn new() -> Self {
        let genesis = BlockHash(Keccak256::digest(GENESIS_SEED).into());
        LocalChain {
            hashes: vec![genesis],
        }
    }

    /// Height of the latest block.
    pub fn height(&self) -> u64 {
        (self.hashes.len() - 1) as u64
    }

    pub fn tip_hash(&self) -> BlockHash {
        self.hashes[self.hashes.len() - 1]
    }

    pub fn block_hash(&self, height: u64) -> Option<BlockHash> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.hashes.get(h))
            .copied()
    }

    /// Append one block and return its height.
    pub fn mine(&mut self) -> u64 {
        let height = self.height() + 1;
        let mut hasher = Keccak256::new();
        hasher.update(self.tip_hash().as_bytes());
        hasher.update(height.to_be_bytes());
        self.hashes.push(BlockHash(hasher.finalize().into()));
        height
    }

    pub fn mine_blocks(&mut self, count: u64) -> u64 {
        for _ in 0..count {
            self.mine();
        }
        self.height()
    }

    /// Context for a transaction from `caller`, mined into a fresh block.
    pub fn transact(&mut self, caller: Address) -> CallContext {
        let parent_hash = self.tip_hash();
        let block_number = self.mine();
        CallContext::new(caller, block_number, parent_hash)
    }
}

impl Default for LocalChain {
    fn default() -> Self {
        Self::new()
    }
}
