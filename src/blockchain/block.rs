use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::config::{
    GENESIS_HASH, GENESIS_LAST_HASH, GENESIS_TIMESTAMP, INITIAL_DIFFICULTY, MINE_RATE,
};
use super::crypto::hash_serialized;
use super::transaction::Transaction;

/// Represents a block in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Block {
    /// Unix time in milliseconds when the block was mined
    pub timestamp: i64,

    /// Hash of the previous block
    pub last_hash: String,

    /// Hash of this block's other fields
    pub hash: String,

    /// Transactions included in this block
    pub data: Vec<Transaction>,

    /// Proof of work
    pub nonce: u64,

    /// Leading zero hex digits the hash must carry
    pub difficulty: u32,
}

impl Block {
    /// The hard-coded first block of every chain
    pub fn genesis() -> Self {
        Block {
            timestamp: GENESIS_TIMESTAMP,
            last_hash: GENESIS_LAST_HASH.to_string(),
            hash: GENESIS_HASH.to_string(),
            data: Vec::new(),
            nonce: 0,
            difficulty: INITIAL_DIFFICULTY,
        }
    }

    /// Mines a block carrying `data` on top of `last_block`.
    ///
    /// The timestamp and difficulty are refreshed on every attempt, so the
    /// difficulty of the returned block reflects how long the search took.
    ///
    /// # Arguments
    ///
    /// * `last_block` - The current tip of the chain
    /// * `data` - The transactions to include in the block
    ///
    /// # Returns
    ///
    /// A block whose hash meets its difficulty
    pub fn mine_block(last_block: &Block, data: Vec<Transaction>) -> Self {
        // Fields that do not change between attempts are serialized once
        let last_hash_json = Value::from(last_block.hash.as_str()).to_string();
        let data_json = serde_json::json!(data).to_string();
        let mut nonce: u64 = 0;

        loop {
            let timestamp = Utc::now().timestamp_millis();
            let difficulty = Self::adjust_difficulty(last_block, timestamp);
            let hash = hash_serialized(vec![
                Value::from(timestamp).to_string(),
                last_hash_json.clone(),
                Value::from(difficulty).to_string(),
                Value::from(nonce).to_string(),
                data_json.clone(),
            ]);

            if leading_zeros(&hash) >= difficulty {
                return Block {
                    timestamp,
                    last_hash: last_block.hash.clone(),
                    hash,
                    data,
                    nonce,
                    difficulty,
                };
            }

            nonce = nonce.wrapping_add(1);
        }
    }

    /// Difficulty for a block mined at `timestamp` on top of `original_block`.
    ///
    /// Goes down by one when the gap exceeds `MINE_RATE` and up by one
    /// otherwise, never below 1. Peer blocks may carry any timestamp, so the
    /// gap saturates instead of overflowing.
    ///
    /// # Arguments
    ///
    /// * `original_block` - The block being built upon
    /// * `timestamp` - The candidate block's timestamp in milliseconds
    ///
    /// # Returns
    ///
    /// The difficulty the candidate block must meet
    pub fn adjust_difficulty(original_block: &Block, timestamp: i64) -> u32 {
        let difficulty = original_block.difficulty;

        if timestamp.saturating_sub(original_block.timestamp) > MINE_RATE {
            return difficulty.saturating_sub(1).max(1);
        }

        difficulty.saturating_add(1)
    }

    /// Recomputes the hash from the block's fields
    pub fn calculate_hash(&self) -> String {
        crate::crypto_hash!(
            self.timestamp,
            self.last_hash,
            self.difficulty,
            self.nonce,
            self.data
        )
    }

    /// Whether the stored hash satisfies the block's own difficulty
    pub fn meets_difficulty(&self) -> bool {
        leading_zeros(&self.hash) >= self.difficulty
    }
}

/// Number of leading `'0'` hex digits in `hash`
pub fn leading_zeros(hash: &str) -> u32 {
    hash.chars().take_while(|c| *c == '0').count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::wallet::Wallet;

    fn sample_block() -> Block {
        Block {
            timestamp: 2000,
            last_hash: "foo-hash".to_string(),
            hash: "bar-hash".to_string(),
            data: Vec::new(),
            nonce: 1,
            difficulty: 3,
        }
    }

    #[test]
    fn test_genesis_block() {
        let genesis = Block::genesis();

        assert_eq!(genesis, Block::genesis());
        assert_eq!(genesis.timestamp, GENESIS_TIMESTAMP);
        assert_eq!(genesis.last_hash, "-");
        assert_eq!(genesis.hash, "genesis-hash");
        assert_eq!(genesis.nonce, 0);
        assert_eq!(genesis.difficulty, INITIAL_DIFFICULTY);
        assert!(genesis.data.is_empty());
    }

    #[test]
    fn test_mine_block() {
        let last_block = Block::genesis();
        let data = vec![Transaction::reward(&Wallet::new())];
        let mined = Block::mine_block(&last_block, data.clone());

        assert_eq!(mined.last_hash, last_block.hash);
        assert_eq!(mined.data, data);
        assert!(mined.timestamp > last_block.timestamp);
        assert_eq!(mined.hash, mined.calculate_hash());
        assert!(mined.meets_difficulty());
        assert_eq!(
            &mined.hash[..mined.difficulty as usize],
            "0".repeat(mined.difficulty as usize)
        );
    }

    #[test]
    fn test_mined_hash_matches_canonical_hash() {
        let mined = Block::mine_block(&Block::genesis(), Vec::new());
        let expected = crate::crypto_hash!(
            mined.timestamp,
            mined.last_hash,
            mined.difficulty,
            mined.nonce,
            mined.data
        );

        assert_eq!(mined.hash, expected);
    }

    #[test]
    fn test_mined_difficulty_moves_by_one() {
        let last_block = sample_block();
        let mined = Block::mine_block(&last_block, Vec::new());

        let possible = [last_block.difficulty + 1, last_block.difficulty - 1];
        assert!(possible.contains(&mined.difficulty));
    }

    #[test]
    fn test_adjust_difficulty_raises_for_quick_blocks() {
        let block = sample_block();

        assert_eq!(
            Block::adjust_difficulty(&block, block.timestamp + MINE_RATE - 100),
            block.difficulty + 1
        );
    }

    #[test]
    fn test_adjust_difficulty_lowers_for_slow_blocks() {
        let block = sample_block();

        assert_eq!(
            Block::adjust_difficulty(&block, block.timestamp + MINE_RATE + 100),
            block.difficulty - 1
        );
    }

    #[test]
    fn test_adjust_difficulty_floor() {
        let mut block = sample_block();
        block.difficulty = 1;
        assert_eq!(Block::adjust_difficulty(&block, block.timestamp + MINE_RATE * 10), 1);

        block.difficulty = 0;
        assert_eq!(Block::adjust_difficulty(&block, block.timestamp + MINE_RATE * 10), 1);
    }

    #[test]
    fn test_adjust_difficulty_with_extreme_timestamps() {
        let mut block = sample_block();

        block.timestamp = i64::MIN;
        assert_eq!(
            Block::adjust_difficulty(&block, Utc::now().timestamp_millis()),
            block.difficulty - 1
        );

        block.timestamp = i64::MAX;
        assert_eq!(Block::adjust_difficulty(&block, i64::MIN), block.difficulty + 1);

        block.difficulty = u32::MAX;
        assert_eq!(Block::adjust_difficulty(&block, i64::MIN), u32::MAX);
    }

    #[test]
    fn test_calculate_hash_detects_tampering() {
        let mined = Block::mine_block(&Block::genesis(), Vec::new());

        let mut tampered = mined.clone();
        tampered.nonce += 1;
        assert_ne!(tampered.calculate_hash(), mined.hash);

        let mut tampered = mined.clone();
        tampered.data.push(Transaction::reward(&Wallet::new()));
        assert_ne!(tampered.calculate_hash(), mined.hash);
    }

    #[test]
    fn test_leading_zeros() {
        assert_eq!(leading_zeros("000abc"), 3);
        assert_eq!(leading_zeros("abc000"), 0);
        assert_eq!(leading_zeros(""), 0);
    }
}
