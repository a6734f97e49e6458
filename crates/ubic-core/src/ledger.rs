// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - ACCOUNT LEDGER (AddressStore)
//
// Key-value store of accounts keyed by address link, plus the reverse index
// certificate id -> bound account that makes identity binding one-shot.
//
// `apply` is the only mutator. It stages every touched account in a scratch
// map and writes back only if the whole effect succeeds, so a failed apply
// leaves the ledger untouched. Reads hand out copies.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::account::Account;
use crate::amount::{Amount, CurrencyId};
use crate::cert_store::CertStore;
use crate::effects::Effects;
use crate::error::ValidationError;
use log::debug;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::BTreeMap;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    /// BTreeMap: deterministic iteration for state roots and persistence
    accounts: BTreeMap<Vec<u8>, Account>,
    /// DSC id -> address link of the account it is bound to
    linked_certificates: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted accounts; the certificate link index is derived
    pub fn from_accounts<I: IntoIterator<Item = (Vec<u8>, Account)>>(accounts: I) -> Self {
        let mut ledger = Self::new();
        for (link, account) in accounts {
            if let Some(cert_id) = &account.identity_link {
                ledger
                    .linked_certificates
                    .insert(cert_id.clone(), link.clone());
            }
            ledger.accounts.insert(link, account);
        }
        ledger
    }

    /// Snapshot copy of an account
    pub fn get_account(&self, link: &[u8]) -> Option<Account> {
        self.accounts.get(link).cloned()
    }

    pub fn contains(&self, link: &[u8]) -> bool {
        self.accounts.contains_key(link)
    }

    pub fn accounts(&self) -> impl Iterator<Item = (&Vec<u8>, &Account)> {
        self.accounts.iter()
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Address link of the account bound to `cert_id`, if any
    pub fn linked_account(&self, cert_id: &[u8]) -> Option<&Vec<u8>> {
        self.linked_certificates.get(cert_id)
    }

    /// Genesis allocation: credit an account outside of transaction flow
    pub fn credit_genesis(
        &mut self,
        spending_key: &[u8],
        amount: &Amount,
    ) -> Result<Vec<u8>, ValidationError> {
        let link = ubic_crypto::address_link(spending_key);
        let account = self.accounts.entry(link.clone()).or_default();
        account.balance = account.balance.checked_add(amount)?;
        if account.spending_key.is_none() {
            account.spending_key = Some(spending_key.to_vec());
        }
        Ok(link)
    }

    /// Apply the ledger part of a validated effect atomically.
    ///
    /// Vote and certificate effects do not touch accounts and are accepted
    /// as no-ops here.
    pub fn apply(&mut self, effects: &Effects) -> Result<(), ValidationError> {
        match effects {
            Effects::Transfer {
                debits, credits, ..
            } => {
                let mut staged: BTreeMap<Vec<u8>, Account> = BTreeMap::new();

                for debit in debits {
                    let mut account = match staged.remove(&debit.link) {
                        Some(a) => a,
                        None => self
                            .get_account(&debit.link)
                            .ok_or(ValidationError::InsufficientFunds)?,
                    };
                    if account.nonce != debit.expected_nonce {
                        return Err(ValidationError::StaleNonce {
                            expected: account.nonce,
                            got: debit.expected_nonce,
                        });
                    }
                    account.balance = account.balance.checked_add(&debit.ubi_settlement)?;
                    account.ubi_debit = account.ubi_debit.checked_add(&debit.ubi_settlement)?;
                    account.balance = account
                        .balance
                        .checked_sub(&debit.amount)
                        .map_err(|_| ValidationError::InsufficientFunds)?;
                    account.nonce += 1;
                    staged.insert(debit.link.clone(), account);
                }

                for credit in credits {
                    let mut account = match staged.remove(&credit.link) {
                        Some(a) => a,
                        None => self.get_account(&credit.link).unwrap_or_default(),
                    };
                    account.balance = account.balance.checked_add(&credit.amount)?;
                    if account.spending_key.is_none() {
                        account.spending_key = Some(credit.spending_key.clone());
                    }
                    staged.insert(credit.link.clone(), account);
                }

                debug!(
                    "Ledger: applied transfer ({} debits, {} credits)",
                    debits.len(),
                    credits.len()
                );
                self.accounts.extend(staged);
                Ok(())
            }
            Effects::BindIdentity {
                cert_id,
                receiver,
                spending_key,
                height,
            } => {
                if self.linked_certificates.contains_key(cert_id) {
                    return Err(ValidationError::CertificateAlreadyLinked);
                }
                let mut account = self.get_account(receiver).unwrap_or_default();
                if account.identity_link.is_some() {
                    return Err(ValidationError::CertificateAlreadyLinked);
                }
                account.identity_link = Some(cert_id.clone());
                account.identity_linked_at_height = *height;
                if account.spending_key.is_none() {
                    account.spending_key = Some(spending_key.clone());
                }

                debug!(
                    "Ledger: bound certificate {} to {} at height {}",
                    ubic_crypto::short_hex(cert_id, 16),
                    ubic_crypto::short_hex(receiver, 16),
                    height
                );
                self.linked_certificates
                    .insert(cert_id.clone(), receiver.clone());
                self.accounts.insert(receiver.clone(), account);
                Ok(())
            }
            Effects::Vote { .. } | Effects::DeactivateCertificate { .. } => Ok(()),
        }
    }

    /// Identity-bound accounts whose certificate chain (DSC, CSCA, root) is
    /// active at `height`, counted per certificate currency
    pub fn count_ubi_receivers(&self, certs: &CertStore, height: u64) -> BTreeMap<CurrencyId, u32> {
        let mut counts = BTreeMap::new();
        for cert_id in self.linked_certificates.keys() {
            if let Some(chain) = certs.trust_chain(cert_id) {
                if chain.is_active_at(height) {
                    *counts.entry(chain.dsc.currency).or_insert(0u32) += 1;
                }
            }
        }
        counts
    }

    /// SHA3-256 over (link, nonce, balance, ubi_debit) in key order
    pub fn state_root(&self) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        for (link, account) in &self.accounts {
            hasher.update(link);
            hasher.update(account.nonce.to_le_bytes());
            for (currency, quantity) in account.balance.iter() {
                hasher.update([currency]);
                hasher.update(quantity.to_le_bytes());
            }
            hasher.update([0xff]);
            for (currency, quantity) in account.ubi_debit.iter() {
                hasher.update([currency]);
                hasher.update(quantity.to_le_bytes());
            }
        }
        hasher.finalize().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::{Credit, Debit};

    fn ledger_with(link: &[u8], balance: Amount, nonce: u64) -> Ledger {
        let account = Account {
            nonce,
            balance,
            spending_key: Some(vec![1; 32]),
            ..Account::default()
        };
        Ledger::from_accounts(vec![(link.to_vec(), account)])
    }

    fn transfer(from: &[u8], to: &[u8], amount: u64, nonce: u64) -> Effects {
        Effects::Transfer {
            debits: vec![Debit {
                link: from.to_vec(),
                amount: Amount::single(0, amount),
                expected_nonce: nonce,
                ubi_settlement: Amount::new(),
            }],
            credits: vec![Credit {
                link: to.to_vec(),
                spending_key: vec![2; 32],
                amount: Amount::single(0, amount),
            }],
            fee: Amount::new(),
        }
    }

    #[test]
    fn test_transfer_moves_funds_and_bumps_nonce() {
        let mut ledger = ledger_with(b"A", Amount::single(0, 100), 5);
        ledger.apply(&transfer(b"A", b"B", 60, 5)).unwrap();

        let a = ledger.get_account(b"A").unwrap();
        assert_eq!(a.balance, Amount::single(0, 40));
        assert_eq!(a.nonce, 6);
        let b = ledger.get_account(b"B").unwrap();
        assert_eq!(b.balance, Amount::single(0, 60));
        assert_eq!(b.spending_key, Some(vec![2; 32]));
        assert_eq!(b.nonce, 0);
    }

    #[test]
    fn test_stale_nonce_leaves_ledger_untouched() {
        let mut ledger = ledger_with(b"A", Amount::single(0, 100), 5);
        let before = ledger.clone();
        assert_eq!(
            ledger.apply(&transfer(b"A", b"B", 60, 4)).unwrap_err(),
            ValidationError::StaleNonce {
                expected: 5,
                got: 4
            }
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_overdraft_is_insufficient_funds() {
        let mut ledger = ledger_with(b"A", Amount::single(0, 10), 0);
        let before = ledger.clone();
        assert_eq!(
            ledger.apply(&transfer(b"A", b"B", 11, 0)).unwrap_err(),
            ValidationError::InsufficientFunds
        );
        assert_eq!(ledger, before);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let ledger = ledger_with(b"A", Amount::single(0, 10), 0);
        let mut copy = ledger.get_account(b"A").unwrap();
        copy.balance = Amount::single(0, 999);
        assert_eq!(
            ledger.get_account(b"A").unwrap().balance,
            Amount::single(0, 10)
        );
    }

    #[test]
    fn test_ubi_settlement_moves_into_balance() {
        let mut ledger = ledger_with(b"A", Amount::single(0, 10), 0);
        let effects = Effects::Transfer {
            debits: vec![Debit {
                link: b"A".to_vec(),
                amount: Amount::single(0, 25),
                expected_nonce: 0,
                ubi_settlement: Amount::single(0, 20),
            }],
            credits: vec![],
            fee: Amount::single(0, 25),
        };
        ledger.apply(&effects).unwrap();
        let a = ledger.get_account(b"A").unwrap();
        assert_eq!(a.balance, Amount::single(0, 5));
        assert_eq!(a.ubi_debit, Amount::single(0, 20));
    }

    #[test]
    fn test_identity_binding_is_one_shot() {
        let mut ledger = Ledger::new();
        let bind = |receiver: &[u8]| Effects::BindIdentity {
            cert_id: b"dsc-1".to_vec(),
            receiver: receiver.to_vec(),
            spending_key: vec![3; 32],
            height: 1000,
        };
        ledger.apply(&bind(b"C")).unwrap();
        let c = ledger.get_account(b"C").unwrap();
        assert_eq!(c.identity_link, Some(b"dsc-1".to_vec()));
        assert_eq!(c.identity_linked_at_height, 1000);
        assert_eq!(ledger.linked_account(b"dsc-1"), Some(&b"C".to_vec()));

        assert_eq!(
            ledger.apply(&bind(b"D")).unwrap_err(),
            ValidationError::CertificateAlreadyLinked
        );
        assert!(!ledger.contains(b"D"));
    }

    #[test]
    fn test_from_accounts_rebuilds_link_index() {
        let account = Account {
            identity_link: Some(b"dsc-9".to_vec()),
            ..Account::default()
        };
        let ledger = Ledger::from_accounts(vec![(b"E".to_vec(), account)]);
        assert_eq!(ledger.linked_account(b"dsc-9"), Some(&b"E".to_vec()));
    }

    #[test]
    fn test_ubi_receivers_follow_issuer_status() {
        use crate::certificate::Certificate;
        use crate::script::CertType;
        use ubic_crypto::generate_keypair_from_seed;

        let root_keys = generate_keypair_from_seed(&[1; 32]).unwrap();
        let csca_keys = generate_keypair_from_seed(&[2; 32]).unwrap();
        let dsc_keys = generate_keypair_from_seed(&[3; 32]).unwrap();
        let root = Certificate::root(root_keys.public_key.clone(), 4, 0);
        let csca = Certificate::issue(
            CertType::Csca,
            csca_keys.public_key.clone(),
            &root,
            &root_keys,
            4,
            0,
        )
        .unwrap();
        let dsc = Certificate::issue(
            CertType::Dsc,
            dsc_keys.public_key.clone(),
            &csca,
            &csca_keys,
            4,
            0,
        )
        .unwrap();
        let mut certs = CertStore::new();
        certs.add_root(root).unwrap();
        certs.trust_csca(csca.clone(), 0).unwrap();
        certs.trust_dsc(dsc.clone(), 0).unwrap();

        let mut ledger = Ledger::new();
        ledger
            .apply(&Effects::BindIdentity {
                cert_id: dsc.id.clone(),
                receiver: b"C".to_vec(),
                spending_key: vec![3; 32],
                height: 1000,
            })
            .unwrap();
        certs.deactivate(CertType::Csca, &csca.id, 1500).unwrap();

        assert_eq!(ledger.count_ubi_receivers(&certs, 1499).get(&4), Some(&1));
        assert!(ledger.count_ubi_receivers(&certs, 1600).is_empty());
    }

    #[test]
    fn test_state_root_tracks_balances() {
        let a = ledger_with(b"A", Amount::single(0, 10), 0);
        let b = ledger_with(b"A", Amount::single(0, 11), 0);
        assert_ne!(a.state_root(), b.state_root());
        assert_eq!(a.state_root(), a.clone().state_root());
    }
}
