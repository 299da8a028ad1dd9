use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::blockchain::{
    Address, Block, Blockchain, ReplaceChainError, Transaction, TransactionError,
    TransactionPool, Wallet,
};

/// Address and replayed balance of the node wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletInfo {
    pub address: Address,
    pub balance: u64,
}

/// State owned by one node: its chain, pending pool and wallet.
///
/// Every mutation goes through `&mut self`, so callers sharing a node
/// serialize mining and chain replacement behind a single lock.
#[derive(Debug, Default)]
pub struct Node {
    blockchain: Blockchain,
    pool: TransactionPool,
    wallet: Wallet,
}

impl Node {
    /// Creates a node holding only the genesis block and an empty pool
    ///
    /// # Arguments
    ///
    /// * `wallet` - The wallet that signs transfers and collects mining rewards
    pub fn new(wallet: Wallet) -> Self {
        Node {
            blockchain: Blockchain::new(),
            pool: TransactionPool::new(),
            wallet,
        }
    }

    /// Gets the local chain
    pub fn blockchain(&self) -> &Blockchain {
        &self.blockchain
    }

    /// Gets the pending transactions
    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn pool_mut(&mut self) -> &mut TransactionPool {
        &mut self.pool
    }

    /// Gets the node wallet
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Sends `amount` to `recipient` from the node wallet.
    ///
    /// A transfer already pending from this wallet is extended rather than a
    /// second one created from the same balance.
    ///
    /// # Arguments
    ///
    /// * `recipient` - The recipient's address
    /// * `amount` - The amount to send
    ///
    /// # Returns
    ///
    /// The pooled transaction, or the error that kept it out of the pool
    pub fn transact(
        &mut self,
        recipient: Address,
        amount: u64,
    ) -> Result<Transaction, TransactionError> {
        let transaction = match self.pool.existing_transaction(self.wallet.public_key()) {
            Some(existing) => {
                let mut transaction = existing.clone();
                transaction.update(&self.wallet, recipient, amount)?;
                transaction
            }
            None => self.wallet.create_transaction(
                recipient,
                amount,
                Some(self.blockchain.chain()),
            )?,
        };

        self.pool.set_transaction(transaction.clone());
        Ok(transaction)
    }

    /// Mines the pooled transactions plus a reward for the node wallet
    ///
    /// Only transactions that still hold against the current chain are
    /// mined; the pool is emptied afterwards either way.
    ///
    /// # Returns
    ///
    /// The new block
    pub fn mine_transactions(&mut self) -> Block {
        // Select transfers that fit on the current chain, then add our own reward
        let mut transactions: Vec<Transaction> = self
            .pool
            .valid_transactions(self.blockchain.chain())
            .into_iter()
            .filter(|transaction| !transaction.is_reward())
            .collect();
        transactions.push(Transaction::reward(&self.wallet));

        let block = self.blockchain.add_block(transactions).clone();
        self.pool.clear();

        info!(
            "Mined {} transactions into block {}",
            block.data.len(),
            block.hash
        );
        block
    }

    /// Adopts a chain received from a peer when it is longer and fully valid,
    /// then drops the pooled transactions it already contains.
    pub fn receive_chain(&mut self, chain: Vec<Block>) -> Result<(), ReplaceChainError> {
        let pool = &mut self.pool;
        self.blockchain
            .replace_chain_with(chain, true, |adopted| {
                pool.clear_blockchain_transactions(adopted)
            })
    }

    /// Replaces the pending transactions with a snapshot from a peer
    pub fn receive_pool(&mut self, transaction_map: HashMap<String, Transaction>) {
        info!(
            "Replacing transaction pool with {} transactions",
            transaction_map.len()
        );
        self.pool.set_map(transaction_map);
    }

    /// Gets the node wallet address with its balance replayed from the chain
    pub fn wallet_info(&self) -> WalletInfo {
        let address = self.wallet.public_key().clone();
        let balance = Wallet::calculate_balance(self.blockchain.chain(), &address);

        WalletInfo { address, balance }
    }
}
