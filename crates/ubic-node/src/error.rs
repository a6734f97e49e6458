// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - NODE ERRORS
//
// CommitError: why a candidate block was refused. Nothing is applied when a
// commit fails, so every variant leaves the node state untouched.
// StoreError: sled / bincode failures in the state database.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use ubic_core::{ChainError, TxId, ValidationError};
use ubic_crypto::CryptoError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitError {
    /// Header does not extend the best header (link or height)
    Chain(ChainError),
    /// Issuer is not the validator for the header timestamp
    WrongIssuer,
    BadIssuerSignature,
    MerkleMismatch,
    TimestampNotIncreasing,
    /// header.payout differs from the fees collected by the block
    PayoutMismatch,
    UbiReceiverCountMismatch,
    /// First transaction of the block that failed validation or application
    Transaction { tx_id: TxId, error: ValidationError },
    Signing(CryptoError),
}

impl std::fmt::Display for CommitError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            CommitError::Chain(e) => write!(f, "Chain: {}", e),
            CommitError::WrongIssuer => write!(f, "Issuer is not the validator for this slot"),
            CommitError::BadIssuerSignature => write!(f, "Bad issuer signature"),
            CommitError::MerkleMismatch => write!(f, "Merkle root does not match transactions"),
            CommitError::TimestampNotIncreasing => {
                write!(f, "Header timestamp does not advance past the best header")
            }
            CommitError::PayoutMismatch => write!(f, "Payout does not equal collected fees"),
            CommitError::UbiReceiverCountMismatch => write!(f, "UBI receiver count mismatch"),
            CommitError::Transaction { tx_id, error } => {
                write!(f, "Transaction {}: {}", hex::encode(tx_id), error)
            }
            CommitError::Signing(e) => write!(f, "Signing: {}", e),
        }
    }
}

impl std::error::Error for CommitError {}

impl From<ChainError> for CommitError {
    fn from(e: ChainError) -> Self {
        CommitError::Chain(e)
    }
}

impl From<CryptoError> for CommitError {
    fn from(e: CryptoError) -> Self {
        CommitError::Signing(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Sled(String),
    Codec(String),
    /// Persisted records do not rebuild into a consistent state
    Corrupt(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StoreError::Sled(msg) => write!(f, "Database error: {}", msg),
            StoreError::Codec(msg) => write!(f, "Encoding error: {}", msg),
            StoreError::Corrupt(msg) => write!(f, "Corrupt state: {}", msg),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<sled::Error> for StoreError {
    fn from(e: sled::Error) -> Self {
        StoreError::Sled(e.to_string())
    }
}

impl From<bincode::Error> for StoreError {
    fn from(e: bincode::Error) -> Self {
        StoreError::Codec(e.to_string())
    }
}
