use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

use std::fmt;
use std::str::FromStr;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Decoding error: {0}")]
    DecodingError(String),
}

/// Hashes any number of values into a hex SHA-256 digest.
///
/// Each value is serialized to JSON, the serialized forms are sorted and
/// joined with a single space before hashing, so the digest does not depend
/// on the order the values are passed in.
pub fn crypto_hash<I>(inputs: I) -> String
where
    I: IntoIterator<Item = Value>,
{
    hash_serialized(inputs.into_iter().map(|value| value.to_string()).collect())
}

/// Same as [`crypto_hash`] for values that are already serialized to JSON.
pub fn hash_serialized(mut parts: Vec<String>) -> String {
    parts.sort();

    let mut hasher = Sha256::new();
    hasher.update(parts.join(" ").as_bytes());
    hex::encode(hasher.finalize())
}

/// Variadic form of [`crypto_hash`]: `crypto_hash!(timestamp, last_hash, data)`.
#[macro_export]
macro_rules! crypto_hash {
    ($($input:expr),+ $(,)?) => {
        $crate::blockchain::crypto::crypto_hash([$(::serde_json::json!($input)),+])
    };
}

/// Represents a wallet address (public key in base58 format)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    /// Creates a new address from a public key
    pub fn from_public_key(public_key: &VerifyingKey) -> Self {
        Address(bs58::encode(public_key.as_bytes()).into_string())
    }

    /// Converts the address to a public key
    pub fn to_public_key(&self) -> Result<VerifyingKey, CryptoError> {
        let bytes = bs58::decode(&self.0)
            .into_vec()
            .map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidPublicKey("Invalid public key length".to_string())
        })?;

        VerifyingKey::from_bytes(&key_bytes).map_err(|e| CryptoError::InvalidPublicKey(e.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Address {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(CryptoError::DecodingError("empty address".to_string()));
        }

        Ok(Address(s.to_string()))
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Address(s.to_string())
    }
}

/// A hex-encoded ed25519 signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalSignature(pub String);

impl DigitalSignature {
    pub fn from_signature(signature: &Signature) -> Self {
        DigitalSignature(hex::encode(signature.to_bytes()))
    }

    pub fn to_signature(&self) -> Result<Signature, CryptoError> {
        let bytes = hex::decode(&self.0).map_err(|e| CryptoError::DecodingError(e.to_string()))?;

        let signature_bytes: [u8; 64] = bytes.try_into().map_err(|_| {
            CryptoError::InvalidSignature("Invalid signature length".to_string())
        })?;

        Ok(Signature::from_bytes(&signature_bytes))
    }
}

/// An ed25519 key pair and the address derived from it
#[derive(Debug, Clone)]
pub struct KeyPair {
    signing_key: SigningKey,
    address: Address,
}

impl KeyPair {
    /// Creates a new random key pair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let address = Address::from_public_key(&signing_key.verifying_key());

        KeyPair { signing_key, address }
    }

    /// Restores a key pair from a raw ed25519 secret key
    ///
    /// # Arguments
    ///
    /// * `secret_key_bytes` - The 32 secret key bytes
    ///
    /// # Returns
    ///
    /// The key pair, or `InvalidPrivateKey` when the length is wrong
    pub fn from_secret_key(secret_key_bytes: &[u8]) -> Result<Self, CryptoError> {
        let bytes_array: [u8; 32] = secret_key_bytes.try_into().map_err(|_| {
            CryptoError::InvalidPrivateKey("Invalid private key length".to_string())
        })?;

        let signing_key = SigningKey::from_bytes(&bytes_array);
        let address = Address::from_public_key(&signing_key.verifying_key());

        Ok(KeyPair { signing_key, address })
    }

    /// Gets the address derived from the public key
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Signs the canonical hash of `data`
    pub fn sign<T: Serialize + ?Sized>(&self, data: &T) -> Result<DigitalSignature, CryptoError> {
        let digest = crypto_hash([serde_json::to_value(data)?]);
        let signature = self.signing_key.sign(digest.as_bytes());
        Ok(DigitalSignature::from_signature(&signature))
    }
}

/// Checks `signature` over the canonical hash of `data` against `public_key`.
///
/// Malformed keys or signatures verify as `false`.
pub fn verify_signature<T: Serialize + ?Sized>(
    public_key: &Address,
    data: &T,
    signature: &DigitalSignature,
) -> bool {
    let verifying_key = match public_key.to_public_key() {
        Ok(key) => key,
        Err(_) => return false,
    };
    let signature = match signature.to_signature() {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let value = match serde_json::to_value(data) {
        Ok(value) => value,
        Err(_) => return false,
    };

    let digest = crypto_hash([value]);
    verifying_key.verify(digest.as_bytes(), &signature).is_ok()
}
