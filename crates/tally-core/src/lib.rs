use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod constants;
pub mod ledger;
pub mod mine;
pub mod resolve;

pub use ledger::{ChainError, Ledger};
pub use resolve::{PeerChain, PeerFetch, PeerSet, ResolutionOutcome};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub sender: String,
    pub recipient: String,
    pub amount: u64,
}

/// A sealed ledger entry. Field names are the wire contract between nodes
/// and feed the canonical hash; renaming any of them forks the network.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: u64,
    pub transactions: Vec<Transaction>,
    pub proof: u64,
    pub previous_hash: String,
}

/// Canonical encoding of a block: JSON with keys sorted and no whitespace.
/// Two structurally equal blocks produce identical bytes regardless of how
/// they were constructed, which is what makes `block_hash` portable across
/// independently built nodes.
pub fn canonical_block_json(block: &Block) -> String {
    let value = serde_json::to_value(block).expect("block serializes to JSON");
    value.to_string()
}

/// Hex SHA-256 digest of the canonical block encoding.
pub fn block_hash(block: &Block) -> String {
    let digest = Sha256::digest(canonical_block_json(block).as_bytes());
    hex::encode(digest)
}

pub(crate) fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_secs()
}

pub mod pow {
    use crate::constants::DIFFICULTY_PREFIX;
    use sha2::{Digest, Sha256};
    use std::sync::atomic::{AtomicBool, Ordering};

    fn guess_digest(last_proof: u64, proof: u64) -> String {
        // Decimal concatenation, no separator.
        let guess = format!("{last_proof}{proof}");
        hex::encode(Sha256::digest(guess.as_bytes()))
    }

    /// A proof is valid when the digest of `{last_proof}{proof}` starts with
    /// the difficulty prefix. Binds each block's work to its predecessor's.
    pub fn valid_proof(last_proof: u64, proof: u64) -> bool {
        guess_digest(last_proof, proof).starts_with(DIFFICULTY_PREFIX)
    }

    /// Brute-force the lowest proof valid against `last_proof`. Unbounded;
    /// termination relies on the digest distribution being uniform.
    pub fn proof_of_work(last_proof: u64) -> u64 {
        let mut proof = 0u64;
        while !valid_proof(last_proof, proof) {
            proof += 1;
        }
        proof
    }

    /// Same search, but polls `cancel` each candidate so a shutdown or a
    /// chain replacement can abandon a stale attempt. `None` means cancelled.
    pub fn proof_of_work_cancellable(last_proof: u64, cancel: &AtomicBool) -> Option<u64> {
        let mut proof = 0u64;
        loop {
            if cancel.load(Ordering::Relaxed) {
                return None;
            }
            if valid_proof(last_proof, proof) {
                return Some(proof);
            }
            proof += 1;
        }
    }
}
