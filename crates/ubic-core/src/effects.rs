// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - EFFECTS
//
// The complete, pre-validated state change of one transaction. Validation
// produces an Effects value against a snapshot; each store applies the part it
// owns and re-checks the expected nonces, so effects computed against a stale
// snapshot are discarded instead of force-applied.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::Amount;
use crate::script::{CertType, Vote};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Debit {
    pub link: Vec<u8>,
    pub amount: Amount,
    pub expected_nonce: u64,
    /// Outstanding UBI settled into the balance before the debit
    pub ubi_settlement: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Credit {
    pub link: Vec<u8>,
    pub spending_key: Vec<u8>,
    pub amount: Amount,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum Effects {
    /// Debit inputs, credit outputs; `fee` goes to the block issuer
    Transfer {
        debits: Vec<Debit>,
        credits: Vec<Credit>,
        fee: Amount,
    },
    /// Apply a ballot to the delegate/vote store
    Vote {
        voter: Vec<u8>,
        expected_nonce: u64,
        vote: Vote,
    },
    /// Bind a document-signing certificate to the receiving account
    BindIdentity {
        cert_id: Vec<u8>,
        receiver: Vec<u8>,
        spending_key: Vec<u8>,
        height: u64,
    },
    DeactivateCertificate {
        cert_type: CertType,
        cert_id: Vec<u8>,
        expected_nonce: u64,
        height: u64,
    },
}

impl Effects {
    /// Transaction fee (zero for everything but transfers)
    pub fn fee(&self) -> Amount {
        match self {
            Effects::Transfer { fee, .. } => fee.clone(),
            _ => Amount::new(),
        }
    }
}
