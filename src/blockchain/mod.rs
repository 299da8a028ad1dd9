// Blockchain module
//
// This module contains the ledger core:
// - Block structure, mining and difficulty retargeting
// - Blockchain structure, validation and fork choice
// - Transactions and rewards
// - Wallets and balance replay
// - The pending transaction pool
// - Hashing and signing utilities

pub mod block;
pub mod chain;
pub mod config;
pub mod crypto;
pub mod pool;
pub mod transaction;
pub mod wallet;

// Re-export main components for easier access
pub use block::Block;
pub use chain::{Blockchain, ChainError, ReplaceChainError, TransactionDataError};
pub use crypto::{Address, DigitalSignature, KeyPair};
pub use pool::TransactionPool;
pub use transaction::{Transaction, TransactionError};
pub use wallet::Wallet;
