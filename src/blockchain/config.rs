/// Difficulty carried by the genesis block.
pub const INITIAL_DIFFICULTY: u32 = 3;

/// Target time between blocks, in milliseconds.
pub const MINE_RATE: i64 = 1000;

/// Balance of a wallet that has never appeared on chain.
pub const STARTING_BALANCE: u64 = 1000;

/// Amount credited to a miner by a reward transaction.
pub const MINING_REWARD: u64 = 50;

/// Input address shared by every reward transaction.
pub const REWARD_INPUT_ADDRESS: &str = "*authorized-reward*";

pub const GENESIS_TIMESTAMP: i64 = 1;
pub const GENESIS_LAST_HASH: &str = "-";
pub const GENESIS_HASH: &str = "genesis-hash";
