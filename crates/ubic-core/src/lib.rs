// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - CORE MODULE
//
// Ledger primitives for an identity-weighted UBI chain:
// - multi-currency Amount with checked arithmetic
// - typed scripts and transactions (tx id = SHA3-256, payload-free)
// - Account Ledger, Certificate Trust Store, UBI accrual
// - block headers and the best-chain header store
// - node configuration and protocol parameters
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod account;
pub mod amount;
pub mod cert_store;
pub mod certificate;
pub mod chain;
pub mod config;
pub mod effects;
pub mod error;
pub mod ledger;
pub mod script;
pub mod transaction;
pub mod ubi;

pub use account::Account;
pub use amount::{Amount, AmountError, CurrencyId};
pub use cert_store::CertStore;
pub use certificate::{Certificate, StatusEntry, TrustChain};
pub use chain::{Block, BlockHeader, ChainError, ChainStore};
pub use config::{ConsensusParams, NodeConfig, ProtocolParams};
pub use effects::{Credit, Debit, Effects};
pub use error::ValidationError;
pub use ledger::Ledger;
pub use script::{
    CertType, DeactivateCertificateScript, InputScript, OutputScript, RawScript, ScriptType, Vote,
    VoteAction,
};
pub use transaction::{Transaction, TxId, TxIn, TxOut};
pub use ubi::{UbiCache, UbiRates};

/// Validation context: the header a transaction is validated against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaderContext {
    /// Height of the block that will carry the transaction
    pub height: u64,
    pub timestamp: u64,
}
