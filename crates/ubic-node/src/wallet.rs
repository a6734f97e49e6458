use crate::builder::{BuildError, Wallet};
use std::collections::BTreeMap;
use ubic_core::{OutputScript, RawScript};
use ubic_crypto::{generate_keypair, KeyPair};

/// In-memory key store for tests, tooling and single-operator nodes.
/// Keys live only as long as the wallet; `KeyPair` wipes its secret on drop.
#[derive(Default)]
pub struct MemoryWallet {
    keys: BTreeMap<Vec<u8>, KeyPair>,
}

impl MemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, keys: KeyPair) -> Vec<u8> {
        let public_key = keys.public_key.clone();
        self.keys.insert(public_key.clone(), keys);
        public_key
    }

    /// Create and store a fresh random key pair
    pub fn generate(&mut self) -> Vec<u8> {
        self.insert(generate_keypair())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl Wallet for MemoryWallet {
    fn public_keys(&self) -> Vec<Vec<u8>> {
        self.keys.keys().cloned().collect()
    }

    fn is_mine(&self, script: &RawScript) -> bool {
        match OutputScript::decode(script) {
            Ok(OutputScript::PayToKeyHash { public_key }) => self.keys.contains_key(&public_key),
            _ => false,
        }
    }

    fn sign(&self, public_key: &[u8], message: &[u8]) -> Result<Vec<u8>, BuildError> {
        let keys = self.keys.get(public_key).ok_or(BuildError::NotMine)?;
        keys.sign(message).map_err(BuildError::Signing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubic_core::script::pay_to_key;
    use ubic_crypto::{generate_keypair_from_seed, verify_signature};

    #[test]
    fn test_is_mine_and_sign() {
        let mut wallet = MemoryWallet::new();
        let mine = wallet.insert(generate_keypair_from_seed(&[1; 32]).unwrap());
        let other = generate_keypair_from_seed(&[2; 32]).unwrap();

        assert!(wallet.is_mine(&pay_to_key(&mine)));
        assert!(!wallet.is_mine(&pay_to_key(&other.public_key)));

        let sig = wallet.sign(&mine, b"msg").unwrap();
        assert!(verify_signature(b"msg", &sig, &mine));
        assert_eq!(
            wallet.sign(&other.public_key, b"msg").unwrap_err(),
            BuildError::NotMine
        );
    }
}
