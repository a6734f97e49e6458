use crate::amount::Amount;
use serde::{Deserialize, Serialize};

/// Ledger entry, keyed by the address link of its spending script.
///
/// `balance` holds explicit funds only. UBI owed to an identity-bound account
/// is derived on read from the certificate status history; `ubi_debit` is the
/// part of it already settled into `balance`.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Account {
    pub nonce: u64,
    pub balance: Amount,
    pub ubi_debit: Amount,
    /// Public key whose hash is this account's address link.
    /// Recorded the first time the account is credited.
    #[serde(default)]
    pub spending_key: Option<Vec<u8>>,
    /// Bound document-signing certificate id
    #[serde(default)]
    pub identity_link: Option<Vec<u8>>,
    #[serde(default)]
    pub identity_linked_at_height: u64,
}

impl Account {
    pub fn is_identity_bound(&self) -> bool {
        self.identity_link.is_some()
    }
}
