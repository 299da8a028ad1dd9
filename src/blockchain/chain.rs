use log::{error, info};
use std::collections::HashSet;
use thiserror::Error;

use super::block::Block;
use super::crypto::Address;
use super::transaction::{Transaction, TransactionError};
use super::wallet::Wallet;

/// Structural problems that make a chain invalid
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChainError {
    #[error("Invalid chain: does not start with the genesis block")]
    MissingGenesis,

    #[error("Invalid chain: block {index} hash does not match its contents")]
    HashMismatch { index: usize },

    #[error("Invalid chain: block {index} does not link to the previous block hash")]
    BrokenLink { index: usize },

    #[error("Invalid chain: block {index} jumps difficulty from {previous} to {difficulty}")]
    DifficultyJump {
        index: usize,
        previous: u32,
        difficulty: u32,
    },

    #[error("Invalid chain: block {index} hash does not meet difficulty {difficulty}")]
    InsufficientWork { index: usize, difficulty: u32 },
}

/// Problems with the transactions carried by an otherwise well-formed chain
#[derive(Debug, Error)]
pub enum TransactionDataError {
    #[error("Invalid transaction data: block {block} has more than one reward transaction")]
    MultipleRewards { block: usize },

    #[error("Invalid transaction data: block {block} has an invalid reward: {source}")]
    InvalidReward {
        block: usize,
        source: TransactionError,
    },

    #[error("Invalid transaction data: block {block}: {source}")]
    InvalidTransaction {
        block: usize,
        source: TransactionError,
    },

    #[error("Invalid transaction data: block {block} transaction {id} declares input {declared}, sender balance is {balance}")]
    InvalidInputAmount {
        block: usize,
        id: String,
        declared: u64,
        balance: u64,
    },

    #[error("Invalid transaction data: block {block} has more than one transfer from {sender}")]
    DuplicateSender { block: usize, sender: Address },

    #[error("Invalid transaction data: transaction {id} appears more than once")]
    DuplicateTransaction { id: String },
}

/// Reasons an incoming chain is not adopted
#[derive(Debug, Error)]
pub enum ReplaceChainError {
    #[error("The incoming chain must be longer: {incoming} blocks against {current}")]
    NotLonger { current: usize, incoming: usize },

    #[error(transparent)]
    InvalidChain(#[from] ChainError),

    #[error(transparent)]
    InvalidTransactionData(#[from] TransactionDataError),
}

/// Represents the blockchain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blockchain {
    /// The chain of blocks, never empty
    chain: Vec<Block>,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new()
    }
}

impl Blockchain {
    /// Creates a new blockchain holding only the genesis block
    pub fn new() -> Self {
        Blockchain {
            chain: vec![Block::genesis()],
        }
    }

    /// Gets the blocks, genesis first
    pub fn chain(&self) -> &[Block] {
        &self.chain
    }

    /// Gets the number of blocks, genesis included
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Gets the last block in the chain
    pub fn last_block(&self) -> &Block {
        &self.chain[self.chain.len() - 1]
    }

    /// Mines a block carrying `data` on top of the last block and appends it
    ///
    /// # Arguments
    ///
    /// * `data` - The transactions to include in the block
    ///
    /// # Returns
    ///
    /// The newly appended block
    pub fn add_block(&mut self, data: Vec<Transaction>) -> &Block {
        let block = Block::mine_block(self.last_block(), data);

        info!(
            "Mined block {} with nonce {} at difficulty {}",
            block.hash, block.nonce, block.difficulty
        );

        self.chain.push(block);
        self.last_block()
    }

    /// Checks genesis, hashes, linkage, difficulty steps and proof of work
    ///
    /// # Arguments
    ///
    /// * `chain` - The blocks to check, genesis first
    ///
    /// # Returns
    ///
    /// The first structural problem found, if any
    pub fn validate_chain(chain: &[Block]) -> Result<(), ChainError> {
        // Every chain must start from the same genesis block
        match chain.first() {
            Some(first) if *first == Block::genesis() => {}
            _ => return Err(ChainError::MissingGenesis),
        }

        for (index, pair) in chain.windows(2).enumerate() {
            let (previous, block) = (&pair[0], &pair[1]);
            let index = index + 1;

            if block.last_hash != previous.hash {
                return Err(ChainError::BrokenLink { index });
            }

            if block.hash != block.calculate_hash() {
                return Err(ChainError::HashMismatch { index });
            }

            // Difficulty may only move one step per block
            if block.difficulty.abs_diff(previous.difficulty) > 1 {
                return Err(ChainError::DifficultyJump {
                    index,
                    previous: previous.difficulty,
                    difficulty: block.difficulty,
                });
            }

            if !block.meets_difficulty() {
                return Err(ChainError::InsufficientWork {
                    index,
                    difficulty: block.difficulty,
                });
            }
        }

        Ok(())
    }

    /// Logging form of [`Blockchain::validate_chain`]
    pub fn is_valid_chain(chain: &[Block]) -> bool {
        match Self::validate_chain(chain) {
            Ok(()) => true,
            Err(err) => {
                error!("{}", err);
                false
            }
        }
    }

    /// Checks every transaction of every non-genesis block in `chain`.
    ///
    /// Each block may hold one valid reward. Transfers must be valid on their
    /// own and spend exactly the sender's balance as replayed from the blocks
    /// before theirs, one transfer per sender per block. No transaction id may
    /// repeat anywhere in the chain.
    pub fn validate_transaction_data(chain: &[Block]) -> Result<(), TransactionDataError> {
        let mut transaction_ids: HashSet<&str> = HashSet::new();

        for (index, block) in chain.iter().enumerate().skip(1) {
            let mut reward_count = 0;
            let mut senders: HashSet<&Address> = HashSet::new();

            for transaction in &block.data {
                if !transaction_ids.insert(transaction.id()) {
                    return Err(TransactionDataError::DuplicateTransaction {
                        id: transaction.id().to_string(),
                    });
                }

                match transaction {
                    Transaction::Reward(reward) => {
                        reward_count += 1;
                        if reward_count > 1 {
                            return Err(TransactionDataError::MultipleRewards { block: index });
                        }

                        reward
                            .validate()
                            .map_err(|source| TransactionDataError::InvalidReward {
                                block: index,
                                source,
                            })?;
                    }
                    Transaction::Transfer(transfer) => {
                        transfer.validate().map_err(|source| {
                            TransactionDataError::InvalidTransaction {
                                block: index,
                                source,
                            }
                        })?;

                        let sender = &transfer.input.address;
                        if !senders.insert(sender) {
                            return Err(TransactionDataError::DuplicateSender {
                                block: index,
                                sender: sender.clone(),
                            });
                        }

                        // The input must spend the balance recorded before this block
                        let balance = Wallet::calculate_balance(&chain[..index], sender);
                        if transfer.input.amount != balance {
                            return Err(TransactionDataError::InvalidInputAmount {
                                block: index,
                                id: transfer.id.clone(),
                                declared: transfer.input.amount,
                                balance,
                            });
                        }
                    }
                }
            }
        }

        Ok(())
    }

    /// Logging form of [`Blockchain::validate_transaction_data`]
    pub fn valid_transaction_data(chain: &[Block]) -> bool {
        match Self::validate_transaction_data(chain) {
            Ok(()) => true,
            Err(err) => {
                error!("{}", err);
                false
            }
        }
    }

    /// Adopts `new_chain` if it is strictly longer and valid.
    ///
    /// Transaction data is only checked when `validate_transactions` is set.
    /// A rejected chain leaves the current one untouched.
    ///
    /// # Arguments
    ///
    /// * `new_chain` - The candidate chain
    /// * `validate_transactions` - Whether to also run the transaction data checks
    ///
    /// # Returns
    ///
    /// `Ok(())` when the chain was replaced, the rejection reason otherwise
    pub fn replace_chain(
        &mut self,
        new_chain: Vec<Block>,
        validate_transactions: bool,
    ) -> Result<(), ReplaceChainError> {
        self.replace_chain_with(new_chain, validate_transactions, |_| {})
    }

    /// Same as [`Blockchain::replace_chain`], running `on_success` with the
    /// adopted chain once it is in place.
    pub fn replace_chain_with<F>(
        &mut self,
        new_chain: Vec<Block>,
        validate_transactions: bool,
        on_success: F,
    ) -> Result<(), ReplaceChainError>
    where
        F: FnOnce(&[Block]),
    {
        if let Err(err) = self.check_replacement(&new_chain, validate_transactions) {
            error!("Rejected incoming chain: {}", err);
            return Err(err);
        }

        info!("Replacing chain with {} blocks", new_chain.len());
        self.chain = new_chain;
        on_success(&self.chain);

        Ok(())
    }

    fn check_replacement(
        &self,
        new_chain: &[Block],
        validate_transactions: bool,
    ) -> Result<(), ReplaceChainError> {
        if new_chain.len() <= self.chain.len() {
            return Err(ReplaceChainError::NotLonger {
                current: self.chain.len(),
                incoming: new_chain.len(),
            });
        }

        Self::validate_chain(new_chain)?;

        if validate_transactions {
            Self::validate_transaction_data(new_chain)?;
        }

        Ok(())
    }
}
