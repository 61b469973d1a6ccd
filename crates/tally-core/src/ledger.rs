use crate::constants::{GENESIS_PREVIOUS_HASH, GENESIS_PROOF};
use crate::{block_hash, pow, unix_now, Block, Transaction};
use thiserror::Error;
use tracing::{debug, info};

/// Why a candidate chain failed validation, with the index of the offending
/// block where one exists.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain is empty")]
    Empty,
    #[error("block {index} does not link to the hash of its predecessor")]
    BrokenLink { index: u64 },
    #[error("block {index} carries a proof that fails the difficulty predicate")]
    InvalidProof { index: u64 },
}

/// The chain and its pending transaction pool. All mutation of either goes
/// through this type; callers that share a `Ledger` across tasks wrap it in
/// a `Mutex` so appends and replacements serialize.
#[derive(Debug)]
pub struct Ledger {
    chain: Vec<Block>,
    pending: Vec<Transaction>,
}

impl Ledger {
    /// A fresh ledger holding only the genesis block. Genesis carries the
    /// caller-fixed sentinel link and proof; it is never validated against a
    /// predecessor.
    pub fn new() -> Self {
        let mut ledger = Self {
            chain: Vec::new(),
            pending: Vec::new(),
        };
        ledger.new_block(GENESIS_PROOF, Some(GENESIS_PREVIOUS_HASH.to_string()));
        ledger
    }

    /// Queue a transaction for the next sealed block. Returns the index of
    /// the block that will contain it.
    pub fn new_transaction(&mut self, sender: String, recipient: String, amount: u64) -> u64 {
        self.pending.push(Transaction {
            sender,
            recipient,
            amount,
        });
        debug!(pending = self.pending.len(), "transaction queued");
        self.last_block().index + 1
    }

    /// Seal the pending pool into a new block and append it. The pool is
    /// moved into the block, leaving it empty; the two effects are a single
    /// operation under the caller's lock. When `previous_hash` is `None` the
    /// link is computed from the current tip.
    pub fn new_block(&mut self, proof: u64, previous_hash: Option<String>) -> &Block {
        let previous_hash =
            previous_hash.unwrap_or_else(|| block_hash(self.chain.last().expect("chain is never empty")));
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: unix_now(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash,
        };
        info!(index = block.index, txs = block.transactions.len(), "block sealed");
        self.chain.push(block);
        self.last_block()
    }

    pub fn last_block(&self) -> &Block {
        self.chain
            .last()
            .expect("ledger always holds at least the genesis block")
    }

    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn pending(&self) -> &[Transaction] {
        &self.pending
    }

    /// Walk a candidate chain front to back and check every adjacent pair:
    /// hash linkage first, then the proof predicate. The genesis entry is
    /// taken as-is.
    pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
        let mut last = chain.first().ok_or(ChainError::Empty)?;
        for block in &chain[1..] {
            if block.previous_hash != block_hash(last) {
                return Err(ChainError::BrokenLink { index: block.index });
            }
            if !pow::valid_proof(last.proof, block.proof) {
                return Err(ChainError::InvalidProof { index: block.index });
            }
            last = block;
        }
        Ok(())
    }

    pub fn is_chain_valid(chain: &[Block]) -> bool {
        Self::validate_chain(chain).is_ok()
    }

    /// Swap in `candidate` iff it is strictly longer than the current chain
    /// and valid. Called with the same lock as the append path, so the
    /// length check here is against the live chain even if it grew since the
    /// candidate was fetched. The pending pool is left untouched.
    pub fn replace_chain(&mut self, candidate: Vec<Block>) -> bool {
        if candidate.len() <= self.chain.len() {
            return false;
        }
        match Self::validate_chain(&candidate) {
            Ok(()) => {
                info!(
                    old_len = self.chain.len(),
                    new_len = candidate.len(),
                    "chain replaced"
                );
                self.chain = candidate;
                true
            }
            Err(err) => {
                debug!(%err, "candidate chain rejected");
                false
            }
        }
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}
