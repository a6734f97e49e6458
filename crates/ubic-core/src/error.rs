// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - VALIDATION ERRORS
//
// Every rejection a transaction can meet, from script decoding through pool
// admission to effect application. All variants are local and recoverable:
// the offending transaction is dropped, no store is left half-mutated.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::AmountError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Input nonce differs from the account / delegate / certificate nonce
    StaleNonce { expected: u64, got: u64 },
    InsufficientFunds,
    BadSignature,
    UnknownScriptType(u8),
    CertificateNotTrusted,
    CertificateAlreadyLinked,
    CertificateNotFound,
    NotEligibleValidator,
    MalformedPayload(String),
    NegativeBalance,
    /// Source account already has a transaction waiting in the pool
    AccountBusy,
    DuplicateTransaction,
    PoolFull,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ValidationError::StaleNonce { expected, got } => {
                write!(f, "Stale nonce: expected {}, got {}", expected, got)
            }
            ValidationError::InsufficientFunds => write!(f, "Insufficient funds"),
            ValidationError::BadSignature => write!(f, "Bad signature"),
            ValidationError::UnknownScriptType(t) => write!(f, "Unknown script type {}", t),
            ValidationError::CertificateNotTrusted => write!(f, "Certificate not trusted"),
            ValidationError::CertificateAlreadyLinked => {
                write!(f, "Certificate already linked to an account")
            }
            ValidationError::CertificateNotFound => write!(f, "Certificate not found"),
            ValidationError::NotEligibleValidator => write!(f, "Not an eligible validator"),
            ValidationError::MalformedPayload(msg) => write!(f, "Malformed payload: {}", msg),
            ValidationError::NegativeBalance => write!(f, "Operation would make a balance negative"),
            ValidationError::AccountBusy => {
                write!(f, "Account already has a pending transaction")
            }
            ValidationError::DuplicateTransaction => write!(f, "Transaction already in pool"),
            ValidationError::PoolFull => write!(f, "Transaction pool is full"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<AmountError> for ValidationError {
    fn from(e: AmountError) -> Self {
        match e {
            AmountError::NegativeBalance => ValidationError::NegativeBalance,
            AmountError::Overflow => ValidationError::MalformedPayload("amount overflow".to_string()),
        }
    }
}

impl ValidationError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        ValidationError::MalformedPayload(msg.into())
    }
}
