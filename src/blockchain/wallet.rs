use serde::Serialize;

use super::block::Block;
use super::config::STARTING_BALANCE;
use super::crypto::{Address, CryptoError, DigitalSignature, KeyPair};
use super::transaction::{Transaction, TransactionError};

/// A key pair together with the last balance computed for it.
///
/// The balance is a cache; the chain is the source of truth and
/// [`Wallet::calculate_balance`] recomputes it on demand.
#[derive(Debug, Clone)]
pub struct Wallet {
    pub balance: u64,
    key_pair: KeyPair,
}

impl Default for Wallet {
    fn default() -> Self {
        Self::new()
    }
}

impl Wallet {
    /// Creates a wallet with a fresh key pair and the starting balance
    pub fn new() -> Self {
        Self::from_key_pair(KeyPair::generate())
    }

    /// Wraps an existing key pair with the starting balance
    pub fn from_key_pair(key_pair: KeyPair) -> Self {
        Wallet {
            balance: STARTING_BALANCE,
            key_pair,
        }
    }

    /// Restores a wallet from a hex-encoded secret key
    ///
    /// # Arguments
    ///
    /// * `secret_key_hex` - The 32-byte ed25519 secret key as hex
    ///
    /// # Returns
    ///
    /// A wallet with the starting balance, or a decoding error
    pub fn from_secret_key_hex(secret_key_hex: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(secret_key_hex.trim())
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        Ok(Self::from_key_pair(KeyPair::from_secret_key(&bytes)?))
    }

    /// The wallet's address, which is its encoded public key
    pub fn public_key(&self) -> &Address {
        self.key_pair.address()
    }

    /// Gets the underlying key pair
    pub fn key_pair(&self) -> &KeyPair {
        &self.key_pair
    }

    /// Signs the canonical hash of `data` with the wallet key
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<DigitalSignature, CryptoError> {
        self.key_pair.sign(data)
    }

    /// Creates a signed transfer to `recipient`.
    ///
    /// # Arguments
    ///
    /// * `recipient` - The recipient's address
    /// * `amount` - The amount to send
    /// * `chain` - When given, the cached balance is first refreshed from it
    ///
    /// # Returns
    ///
    /// The signed transaction, or `InsufficientBalance` when `amount` exceeds
    /// the balance
    pub fn create_transaction(
        &mut self,
        recipient: Address,
        amount: u64,
        chain: Option<&[Block]>,
    ) -> Result<Transaction, TransactionError> {
        if let Some(chain) = chain {
            self.balance = Self::calculate_balance(chain, self.public_key());
        }

        Transaction::new(self, recipient, amount)
    }

    /// Replays `chain` from the newest block back to find the balance of `address`.
    ///
    /// Outputs to `address` are summed block by block. The first block in which
    /// `address` spent ends the walk: the change output of that spend already
    /// holds everything older, so the sum is returned as is. A wallet that never
    /// spent gets `STARTING_BALANCE` on top of what it received.
    pub fn calculate_balance(chain: &[Block], address: &Address) -> u64 {
        let mut total: u64 = 0;

        for block in chain.iter().skip(1).rev() {
            let mut block_output_total: u64 = 0;
            let mut conducted = false;

            for transaction in &block.data {
                if let Some(amount) = transaction.output_map().get(address) {
                    block_output_total = block_output_total.saturating_add(*amount);
                }

                if transaction.sender() == Some(address) {
                    conducted = true;
                }
            }

            total = total.saturating_add(block_output_total);

            if conducted {
                return total;
            }
        }

        STARTING_BALANCE.saturating_add(total)
    }
}
