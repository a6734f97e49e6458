// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - CERTIFICATE RECORD
//
// One record type for all three tiers. Non-root certificates carry the
// issuer's signature over their signing message; roots are trust anchors
// installed from configuration. Revocation history lives in `status_list`,
// ordered by block height and never truncated.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::CurrencyId;
use crate::script::CertType;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use ubic_crypto::{CryptoError, KeyPair};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusEntry {
    pub block_height: u64,
    pub active: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub id: Vec<u8>,
    pub cert_type: CertType,
    pub public_key: Vec<u8>,
    /// Id of the issuing certificate (empty for roots)
    pub issuer_id: Vec<u8>,
    pub issuer_signature: Vec<u8>,
    pub currency: CurrencyId,
    /// Unix seconds; 0 = never expires
    pub expiration_date: u64,
    /// Anti-replay counter for deactivation transactions
    pub nonce: u64,
    pub active: bool,
    pub status_list: Vec<StatusEntry>,
}

impl Certificate {
    /// Message an issuer signs; also the preimage of the certificate id
    pub fn signing_message(
        cert_type: CertType,
        public_key: &[u8],
        issuer_id: &[u8],
        currency: CurrencyId,
        expiration_date: u64,
    ) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update(b"ubic-cert-v1");
        hasher.update([cert_type.tag()]);
        hasher.update((public_key.len() as u64).to_le_bytes());
        hasher.update(public_key);
        hasher.update((issuer_id.len() as u64).to_le_bytes());
        hasher.update(issuer_id);
        hasher.update([currency]);
        hasher.update(expiration_date.to_le_bytes());
        hasher.finalize().to_vec()
    }

    pub fn derive_id(signing_message: &[u8]) -> Vec<u8> {
        Sha3_256::digest(signing_message).to_vec()
    }

    /// Trust anchor with no issuer signature
    pub fn root(public_key: Vec<u8>, currency: CurrencyId, expiration_date: u64) -> Self {
        let msg = Self::signing_message(CertType::Root, &public_key, &[], currency, expiration_date);
        Self {
            id: Self::derive_id(&msg),
            cert_type: CertType::Root,
            public_key,
            issuer_id: Vec::new(),
            issuer_signature: Vec::new(),
            currency,
            expiration_date,
            nonce: 0,
            active: true,
            status_list: Vec::new(),
        }
    }

    /// Issue a CSCA (issuer = root) or DSC (issuer = CSCA) signed with the
    /// issuer's key pair
    pub fn issue(
        cert_type: CertType,
        public_key: Vec<u8>,
        issuer: &Certificate,
        issuer_keys: &KeyPair,
        currency: CurrencyId,
        expiration_date: u64,
    ) -> Result<Self, CryptoError> {
        let msg = Self::signing_message(cert_type, &public_key, &issuer.id, currency, expiration_date);
        let issuer_signature = issuer_keys.sign(&msg)?;
        Ok(Self {
            id: Self::derive_id(&msg),
            cert_type,
            public_key,
            issuer_id: issuer.id.clone(),
            issuer_signature,
            currency,
            expiration_date,
            nonce: 0,
            active: true,
            status_list: Vec::new(),
        })
    }

    pub fn own_signing_message(&self) -> Vec<u8> {
        Self::signing_message(
            self.cert_type,
            &self.public_key,
            &self.issuer_id,
            self.currency,
            self.expiration_date,
        )
    }

    /// Id matches the certificate contents
    pub fn id_is_consistent(&self) -> bool {
        self.id == Self::derive_id(&self.own_signing_message())
    }

    /// Issuer signature verifies under `issuer_public_key`
    pub fn verify_issued_by(&self, issuer_public_key: &[u8]) -> bool {
        ubic_crypto::verify_signature(
            &self.own_signing_message(),
            &self.issuer_signature,
            issuer_public_key,
        )
    }

    /// Active/inactive state in force at `height`: the status entry with the
    /// greatest height <= `height` wins; before the first entry the certificate
    /// is active since issuance.
    pub fn is_active_at(&self, height: u64) -> bool {
        let idx = self
            .status_list
            .partition_point(|e| e.block_height <= height);
        if idx == 0 {
            true
        } else {
            self.status_list[idx - 1].active
        }
    }

    pub fn is_expired(&self, timestamp: u64) -> bool {
        self.expiration_date != 0 && timestamp >= self.expiration_date
    }

    /// Record a status transition at `height`, keeping the list height-ordered.
    /// Entries at an equal height keep insertion order (last one wins).
    pub fn push_status(&mut self, height: u64, active: bool) {
        let idx = self
            .status_list
            .partition_point(|e| e.block_height <= height);
        self.status_list.insert(
            idx,
            StatusEntry {
                block_height: height,
                active,
            },
        );
        self.active = match self.status_list.last() {
            Some(last) => last.active,
            None => true,
        };
    }
}

/// A DSC together with the certificates that issued it. The effective status
/// at a height is active only while every link is active at that height.
#[derive(Debug, Clone, Copy)]
pub struct TrustChain<'a> {
    pub dsc: &'a Certificate,
    pub csca: Option<&'a Certificate>,
    pub root: Option<&'a Certificate>,
}

impl<'a> TrustChain<'a> {
    pub fn new(dsc: &'a Certificate, csca: &'a Certificate, root: &'a Certificate) -> Self {
        Self {
            dsc,
            csca: Some(csca),
            root: Some(root),
        }
    }

    /// A certificate whose issuers are not tracked
    pub fn standalone(dsc: &'a Certificate) -> Self {
        Self {
            dsc,
            csca: None,
            root: None,
        }
    }

    pub fn links(&self) -> impl Iterator<Item = &'a Certificate> {
        std::iter::once(self.dsc).chain(self.csca).chain(self.root)
    }

    pub fn is_active_at(&self, height: u64) -> bool {
        self.links().all(|c| c.is_active_at(height))
    }

    /// Status list lengths of (dsc, csca, root)
    pub fn status_lens(&self) -> [usize; 3] {
        let len = |c: Option<&Certificate>| c.map_or(0, |c| c.status_list.len());
        [self.dsc.status_list.len(), len(self.csca), len(self.root)]
    }
}
