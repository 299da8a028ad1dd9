use log::warn;
use std::collections::{HashMap, HashSet};

use super::block::Block;
use super::crypto::Address;
use super::transaction::Transaction;
use super::wallet::Wallet;

/// Transactions waiting to be mined, keyed by transaction id
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    transaction_map: HashMap<String, Transaction>,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `transaction`, replacing any pooled transaction with the same id
    pub fn set_transaction(&mut self, transaction: Transaction) {
        self.transaction_map
            .insert(transaction.id().to_string(), transaction);
    }

    /// Replaces the whole pool with a snapshot received from a peer
    pub fn set_map(&mut self, transaction_map: HashMap<String, Transaction>) {
        self.transaction_map = transaction_map;
    }

    /// Gets the pending transactions keyed by id
    pub fn transaction_map(&self) -> &HashMap<String, Transaction> {
        &self.transaction_map
    }

    pub fn len(&self) -> usize {
        self.transaction_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_map.is_empty()
    }

    /// The pending transfer sent by `input_address`, if there is one
    pub fn existing_transaction(&self, input_address: &Address) -> Option<&Transaction> {
        self.transaction_map
            .values()
            .find(|transaction| transaction.sender() == Some(input_address))
    }

    /// Selects the pooled transactions that can go into the next block on `chain`
    ///
    /// Invalid transactions are dropped, as are transfers whose input no longer
    /// matches the sender balance replayed from `chain`. At most one reward and
    /// one transfer per sender are kept, so the selection passes
    /// [`Blockchain::validate_transaction_data`](super::chain::Blockchain::validate_transaction_data)
    /// once mined.
    ///
    /// # Arguments
    ///
    /// * `chain` - The chain the next block will extend
    ///
    /// # Returns
    ///
    /// The transactions to mine
    pub fn valid_transactions(&self, chain: &[Block]) -> Vec<Transaction> {
        let mut reward_taken = false;
        let mut senders: HashSet<&Address> = HashSet::new();

        self.transaction_map
            .values()
            .filter(|&transaction| {
                if !transaction.valid_transaction() {
                    return false;
                }

                match transaction {
                    Transaction::Reward(reward) => {
                        if reward_taken {
                            warn!("Dropping extra reward transaction {}", reward.id);
                            return false;
                        }
                        reward_taken = true;
                        true
                    }
                    Transaction::Transfer(transfer) => {
                        let sender = &transfer.input.address;

                        let balance = Wallet::calculate_balance(chain, sender);
                        if transfer.input.amount != balance {
                            warn!(
                                "Dropping stale transaction {}: input {} but sender balance is {}",
                                transfer.id, transfer.input.amount, balance
                            );
                            return false;
                        }

                        if !senders.insert(sender) {
                            warn!(
                                "Dropping transaction {}: {} already has a transfer selected",
                                transfer.id, sender
                            );
                            return false;
                        }

                        true
                    }
                }
            })
            .cloned()
            .collect()
    }

    /// Empties the pool after its contents were mined
    pub fn clear(&mut self) {
        self.transaction_map.clear();
    }

    /// Drops every pooled transaction already recorded in `chain`
    pub fn clear_blockchain_transactions(&mut self, chain: &[Block]) {
        let mined: HashSet<&str> = chain
            .iter()
            .skip(1)
            .flat_map(|block| block.data.iter().map(Transaction::id))
            .collect();

        self.transaction_map.retain(|id, _| !mined.contains(id.as_str()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::chain::Blockchain;

    fn transfer(amount: u64) -> (Wallet, Transaction) {
        let mut sender = Wallet::new();
        let transaction = sender
            .create_transaction(Address::from("fake-recipient"), amount, None)
            .unwrap();
        (sender, transaction)
    }

    #[test]
    fn test_set_transaction() {
        let mut pool = TransactionPool::new();
        let (_, transaction) = transfer(50);

        pool.set_transaction(transaction.clone());

        assert_eq!(pool.transaction_map()[transaction.id()], transaction);
    }

    #[test]
    fn test_set_transaction_upserts_by_id() {
        let mut pool = TransactionPool::new();
        let (sender, mut transaction) = transfer(50);
        pool.set_transaction(transaction.clone());

        transaction
            .update(&sender, Address::from("next-recipient"), 20)
            .unwrap();
        pool.set_transaction(transaction.clone());

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.transaction_map()[transaction.id()], transaction);
    }

    #[test]
    fn test_existing_transaction() {
        let mut pool = TransactionPool::new();
        let (sender, transaction) = transfer(50);
        pool.set_transaction(transaction.clone());
        pool.set_transaction(Transaction::reward(&sender));

        assert_eq!(
            pool.existing_transaction(sender.public_key()),
            Some(&transaction)
        );
        assert!(pool
            .existing_transaction(Wallet::new().public_key())
            .is_none());
    }

    #[test]
    fn test_valid_transactions() {
        let mut pool = TransactionPool::new();
        let mut valid = Vec::new();

        for i in 0..10 {
            let (_, mut transaction) = transfer(30);

            match i % 3 {
                0 => {
                    if let Transaction::Transfer(transfer) = &mut transaction {
                        transfer.input.amount = 999_999;
                    }
                }
                1 => {
                    if let Transaction::Transfer(transfer) = &mut transaction {
                        transfer.input.signature = Wallet::new().sign("foo").unwrap();
                    }
                }
                _ => valid.push(transaction.clone()),
            }

            pool.set_transaction(transaction);
        }

        let mut result = pool.valid_transactions(Blockchain::new().chain());
        result.sort_by(|a, b| a.id().cmp(b.id()));
        valid.sort_by(|a, b| a.id().cmp(b.id()));

        assert_eq!(result, valid);
    }

    #[test]
    fn test_valid_transactions_keeps_one_reward() {
        let mut pool = TransactionPool::new();
        let miner = Wallet::new();
        pool.set_transaction(Transaction::reward(&miner));
        pool.set_transaction(Transaction::reward(&miner));
        let (_, transaction) = transfer(10);
        pool.set_transaction(transaction);

        let result = pool.valid_transactions(Blockchain::new().chain());

        assert_eq!(result.len(), 2);
        assert_eq!(result.iter().filter(|t| t.is_reward()).count(), 1);
    }

    #[test]
    fn test_valid_transactions_drops_stale_input() {
        let mut pool = TransactionPool::new();
        let mut blockchain = Blockchain::new();
        let (sender, stale) = transfer(10);
        pool.set_transaction(stale.clone());

        blockchain.add_block(vec![Transaction::reward(&sender)]);

        assert_eq!(pool.valid_transactions(&blockchain.chain()[..1]), vec![stale]);
        assert!(pool.valid_transactions(blockchain.chain()).is_empty());
    }

    #[test]
    fn test_valid_transactions_keeps_one_transfer_per_sender() {
        let mut pool = TransactionPool::new();
        let mut sender = Wallet::new();
        for recipient in ["foo-recipient", "bar-recipient"] {
            let transaction = sender
                .create_transaction(Address::from(recipient), 10, None)
                .unwrap();
            pool.set_transaction(transaction);
        }

        let result = pool.valid_transactions(Blockchain::new().chain());

        assert_eq!(pool.len(), 2);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].sender(), Some(sender.public_key()));
    }

    #[test]
    fn test_clear() {
        let mut pool = TransactionPool::new();
        let (_, transaction) = transfer(10);
        pool.set_transaction(transaction);

        pool.clear();

        assert!(pool.is_empty());
    }

    #[test]
    fn test_clear_blockchain_transactions() {
        let mut pool = TransactionPool::new();
        let mut blockchain = Blockchain::new();
        let mut expected = HashMap::new();

        for i in 0..6 {
            let (sender, transaction) = transfer(10);
            pool.set_transaction(transaction.clone());

            if i % 2 == 0 {
                blockchain.add_block(vec![transaction, Transaction::reward(&sender)]);
            } else {
                expected.insert(transaction.id().to_string(), transaction);
            }
        }

        pool.clear_blockchain_transactions(blockchain.chain());

        assert_eq!(pool.transaction_map(), &expected);
    }

    #[test]
    fn test_set_map() {
        let mut pool = TransactionPool::new();
        let (_, stale) = transfer(10);
        pool.set_transaction(stale);

        let (_, incoming) = transfer(20);
        let mut map = HashMap::new();
        map.insert(incoming.id().to_string(), incoming);
        pool.set_map(map.clone());

        assert_eq!(pool.transaction_map(), &map);
    }
}
