pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;

/// Leading `'0'` characters required of a valid proof digest.
pub const DIFFICULTY_PREFIX: &str = "0000";

/// Sentinel predecessor link for the genesis block. Never recomputed.
pub const GENESIS_PREVIOUS_HASH: &str = "1";
pub const GENESIS_PROOF: u64 = 100;

/// Flat reward credited to a node for sealing a block.
pub const MINING_REWARD: u64 = 1;
/// Sender recorded on reward transactions to mark newly issued funds.
pub const REWARD_SENDER: &str = "0";
