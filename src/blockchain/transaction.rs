use chrono::Utc;
use log::error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use super::config::{MINING_REWARD, REWARD_INPUT_ADDRESS};
use super::crypto::{verify_signature, Address, CryptoError, DigitalSignature};
use super::wallet::Wallet;

/// Amount owed to each recipient of a transaction, keyed by address
pub type OutputMap = BTreeMap<Address, u64>;

/// Errors that can occur during transaction operations
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("Amount exceeds balance: requested {amount}, available {balance}")]
    InsufficientBalance { amount: u64, balance: u64 },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),

    #[error("Invalid transaction {id}: outputs total {actual}, input declares {expected}")]
    OutputTotalMismatch { id: String, expected: u64, actual: u64 },

    #[error("Invalid signature on transaction {id}")]
    InvalidSignature { id: String },

    #[error("Invalid reward transaction {id}: {reason}")]
    InvalidReward { id: String, reason: String },

    #[error("Transaction {0} is a reward and cannot be updated")]
    NotATransfer(String),

    #[error("Crypto error: {0}")]
    CryptoError(#[from] CryptoError),
}

/// Input of a signed transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInput {
    /// Unix time in milliseconds when the output map was last signed
    pub timestamp: i64,

    /// Sender balance the transfer spends from
    pub amount: u64,

    /// Sender public key
    pub address: Address,

    /// Signature over the output map
    pub signature: DigitalSignature,
}

/// Input of a reward transaction; there is no signer behind it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardInput {
    pub address: Address,
}

impl Default for RewardInput {
    fn default() -> Self {
        RewardInput {
            address: Address::from(REWARD_INPUT_ADDRESS),
        }
    }
}

/// A signed transfer from one wallet to one or more recipients.
///
/// The sender's remaining balance is carried as its own entry in the output
/// map, so the outputs always add up to `input.amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transfer {
    pub id: String,
    pub input: TransactionInput,
    pub output_map: OutputMap,
}

/// A miner credit created once per mined block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub id: String,
    pub input: RewardInput,
    pub output_map: OutputMap,
}

/// Represents a transaction in the blockchain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Transaction {
    Transfer(Transfer),
    Reward(Reward),
}

fn output_total(output_map: &OutputMap) -> Option<u64> {
    output_map
        .values()
        .try_fold(0u64, |total, amount| total.checked_add(*amount))
}

impl Transfer {
    /// Builds and signs a transfer of `amount` from `sender_wallet` to `recipient`.
    ///
    /// Spends from the wallet's cached balance; callers that need the balance
    /// replayed from chain history go through [`Wallet::create_transaction`].
    ///
    /// # Arguments
    ///
    /// * `sender_wallet` - The wallet paying for the transfer
    /// * `recipient` - The recipient's address
    /// * `amount` - The amount to send
    ///
    /// # Returns
    ///
    /// The signed transfer, with the sender's change as its own output
    pub fn new(
        sender_wallet: &Wallet,
        recipient: Address,
        amount: u64,
    ) -> Result<Self, TransactionError> {
        let balance = sender_wallet.balance;

        if amount == 0 {
            return Err(TransactionError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        if amount > balance {
            return Err(TransactionError::InsufficientBalance { amount, balance });
        }

        if &recipient == sender_wallet.public_key() {
            return Err(TransactionError::InvalidRecipient(
                "Recipient must differ from the sender".to_string(),
            ));
        }

        // The change output keeps the outputs summing to the input amount
        let mut output_map = OutputMap::new();
        output_map.insert(recipient, amount);
        output_map.insert(sender_wallet.public_key().clone(), balance - amount);

        let input = Self::sign_input(sender_wallet, balance, &output_map)?;

        Ok(Transfer {
            id: Uuid::new_v4().to_string(),
            input,
            output_map,
        })
    }

    /// Moves `amount` from the sender's change output to `recipient` and re-signs.
    pub fn update(
        &mut self,
        sender_wallet: &Wallet,
        recipient: Address,
        amount: u64,
    ) -> Result<(), TransactionError> {
        let sender = sender_wallet.public_key();
        let change = self.output_map.get(sender).copied().unwrap_or(0);

        if amount == 0 {
            return Err(TransactionError::InvalidAmount(
                "Amount must be positive".to_string(),
            ));
        }

        if amount > change {
            return Err(TransactionError::InsufficientBalance {
                amount,
                balance: change,
            });
        }

        if &recipient == sender {
            return Err(TransactionError::InvalidRecipient(
                "Recipient must differ from the sender".to_string(),
            ));
        }

        *self.output_map.entry(recipient).or_insert(0) += amount;
        self.output_map.insert(sender.clone(), change - amount);

        self.input = Self::sign_input(sender_wallet, self.input.amount, &self.output_map)?;
        Ok(())
    }

    fn sign_input(
        sender_wallet: &Wallet,
        amount: u64,
        output_map: &OutputMap,
    ) -> Result<TransactionInput, TransactionError> {
        Ok(TransactionInput {
            timestamp: Utc::now().timestamp_millis(),
            amount,
            address: sender_wallet.public_key().clone(),
            signature: sender_wallet.sign(output_map)?,
        })
    }

    /// Checks that the outputs add up to the input and the signature holds.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let expected = self.input.amount;
        match output_total(&self.output_map) {
            Some(actual) if actual == expected => {}
            actual => {
                return Err(TransactionError::OutputTotalMismatch {
                    id: self.id.clone(),
                    expected,
                    actual: actual.unwrap_or(u64::MAX),
                })
            }
        }

        if !verify_signature(&self.input.address, &self.output_map, &self.input.signature) {
            return Err(TransactionError::InvalidSignature {
                id: self.id.clone(),
            });
        }

        Ok(())
    }
}

impl Reward {
    pub fn new(miner_wallet: &Wallet) -> Self {
        let mut output_map = OutputMap::new();
        output_map.insert(miner_wallet.public_key().clone(), MINING_REWARD);

        Reward {
            id: Uuid::new_v4().to_string(),
            input: RewardInput::default(),
            output_map,
        }
    }

    /// Checks the reward input marker and that it pays exactly one `MINING_REWARD`.
    pub fn validate(&self) -> Result<(), TransactionError> {
        let invalid = |reason: &str| TransactionError::InvalidReward {
            id: self.id.clone(),
            reason: reason.to_string(),
        };

        if self.input.address.0 != REWARD_INPUT_ADDRESS {
            return Err(invalid("input address is not the reward marker"));
        }

        let mut outputs = self.output_map.values();
        match (outputs.next(), outputs.next()) {
            (Some(&MINING_REWARD), None) => Ok(()),
            (Some(_), None) => Err(invalid("reward amount does not match the mining reward")),
            _ => Err(invalid("reward must have exactly one output")),
        }
    }
}

impl Transaction {
    /// Creates a signed transfer; see [`Transfer::new`]
    pub fn new(
        sender_wallet: &Wallet,
        recipient: Address,
        amount: u64,
    ) -> Result<Self, TransactionError> {
        Transfer::new(sender_wallet, recipient, amount).map(Transaction::Transfer)
    }

    /// Creates the reward transaction crediting `miner_wallet`
    pub fn reward(miner_wallet: &Wallet) -> Self {
        Transaction::Reward(Reward::new(miner_wallet))
    }

    /// Gets the transaction id
    pub fn id(&self) -> &str {
        match self {
            Transaction::Transfer(transfer) => &transfer.id,
            Transaction::Reward(reward) => &reward.id,
        }
    }

    /// Gets the amounts owed to each recipient
    pub fn output_map(&self) -> &OutputMap {
        match self {
            Transaction::Transfer(transfer) => &transfer.output_map,
            Transaction::Reward(reward) => &reward.output_map,
        }
    }

    /// Sender address, `None` for rewards
    pub fn sender(&self) -> Option<&Address> {
        match self {
            Transaction::Transfer(transfer) => Some(&transfer.input.address),
            Transaction::Reward(_) => None,
        }
    }

    /// Checks if this is a mining reward
    pub fn is_reward(&self) -> bool {
        matches!(self, Transaction::Reward(_))
    }

    /// Moves `amount` of the change output to `recipient`; see [`Transfer::update`]
    pub fn update(
        &mut self,
        sender_wallet: &Wallet,
        recipient: Address,
        amount: u64,
    ) -> Result<(), TransactionError> {
        match self {
            Transaction::Transfer(transfer) => transfer.update(sender_wallet, recipient, amount),
            Transaction::Reward(reward) => Err(TransactionError::NotATransfer(reward.id.clone())),
        }
    }

    /// Validates the transaction
    ///
    /// # Returns
    ///
    /// `Ok(())` if the transaction is valid, the first problem found otherwise
    pub fn validate(&self) -> Result<(), TransactionError> {
        match self {
            Transaction::Transfer(transfer) => transfer.validate(),
            Transaction::Reward(reward) => reward.validate(),
        }
    }

    /// Logging form of [`Transaction::validate`]
    pub fn valid_transaction(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(err) => {
                error!("{}", err);
                false
            }
        }
    }
}
