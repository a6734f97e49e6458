// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - BLOCK HEADERS & CHAIN STORE
//
// Header hash = SHA3-256 over every header field except the issuer signature.
// The issuer signs that hash. Vote transactions ride in the header; ordinary
// transactions are committed to through the merkle root of their ids.
//
// ChainStore keeps a single linear best chain. Fork choice belongs to the
// block-sync collaborator, so `connect` only accepts the direct successor of
// the current best header.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::amount::{Amount, CurrencyId};
use crate::transaction::{Transaction, TxId};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use std::collections::{BTreeMap, HashMap};
use ubic_crypto::{CryptoError, KeyPair};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub previous_header_hash: Vec<u8>,
    pub merkle_root_hash: Vec<u8>,
    pub block_height: u64,
    pub timestamp: u64,
    pub issuer_pub_key: Vec<u8>,
    pub issuer_signature: Vec<u8>,
    /// Total fees paid to the issuer
    pub payout: Amount,
    pub payout_remainder: Amount,
    /// Identity-bound accounts with an active certificate, per currency
    pub ubi_receiver_count: BTreeMap<CurrencyId, u32>,
    pub votes: Vec<Transaction>,
}

fn hash_amount(hasher: &mut Sha3_256, amount: &Amount) {
    hasher.update((amount.iter().count() as u64).to_le_bytes());
    for (currency, quantity) in amount.iter() {
        hasher.update([currency]);
        hasher.update(quantity.to_le_bytes());
    }
}

impl BlockHeader {
    /// Content hash: all fields EXCEPT the issuer signature
    pub fn hash(&self) -> Vec<u8> {
        let mut hasher = Sha3_256::new();
        hasher.update((self.previous_header_hash.len() as u64).to_le_bytes());
        hasher.update(&self.previous_header_hash);
        hasher.update((self.merkle_root_hash.len() as u64).to_le_bytes());
        hasher.update(&self.merkle_root_hash);
        hasher.update(self.block_height.to_le_bytes());
        hasher.update(self.timestamp.to_le_bytes());
        hasher.update((self.issuer_pub_key.len() as u64).to_le_bytes());
        hasher.update(&self.issuer_pub_key);
        hash_amount(&mut hasher, &self.payout);
        hash_amount(&mut hasher, &self.payout_remainder);
        hasher.update((self.ubi_receiver_count.len() as u64).to_le_bytes());
        for (currency, count) in &self.ubi_receiver_count {
            hasher.update([*currency]);
            hasher.update(count.to_le_bytes());
        }
        hasher.update((self.votes.len() as u64).to_le_bytes());
        for vote in &self.votes {
            hasher.update(vote.tx_id());
        }
        hasher.finalize().to_vec()
    }

    pub fn hash_hex(&self) -> String {
        hex::encode(self.hash())
    }

    /// Set issuer key and signature from a key pair
    pub fn sign_with(&mut self, keys: &KeyPair) -> Result<(), CryptoError> {
        self.issuer_pub_key = keys.public_key.clone();
        self.issuer_signature = keys.sign(&self.hash())?;
        Ok(())
    }

    pub fn verify_signature(&self) -> bool {
        if self.issuer_signature.is_empty() || self.issuer_pub_key.is_empty() {
            return false;
        }
        ubic_crypto::verify_signature(&self.hash(), &self.issuer_signature, &self.issuer_pub_key)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn compute_merkle_root(&self) -> Vec<u8> {
        let ids: Vec<TxId> = self.transactions.iter().map(|t| t.tx_id()).collect();
        merkle_root(&ids)
    }
}

/// Binary merkle root over transaction ids; an odd node is paired with
/// itself. Empty list hashes to SHA3-256 of nothing.
pub fn merkle_root(ids: &[TxId]) -> Vec<u8> {
    if ids.is_empty() {
        return Sha3_256::digest(b"").to_vec();
    }
    let mut level: Vec<Vec<u8>> = ids.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let mut hasher = Sha3_256::new();
                hasher.update(&pair[0]);
                hasher.update(pair.get(1).unwrap_or(&pair[0]));
                hasher.finalize().to_vec()
            })
            .collect();
    }
    level.swap_remove(0)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// previous_header_hash does not point at the best header
    BadLink,
    BadHeight { expected: u64, got: u64 },
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ChainError::BadLink => write!(f, "Header does not extend the best header"),
            ChainError::BadHeight { expected, got } => {
                write!(f, "Header height {} (expected {})", got, expected)
            }
        }
    }
}

impl std::error::Error for ChainError {}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainStore {
    /// Index = block height
    headers: Vec<BlockHeader>,
    by_hash: HashMap<Vec<u8>, u64>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted headers; they must form a contiguous chain
    /// starting at height 0
    pub fn from_headers<I: IntoIterator<Item = BlockHeader>>(headers: I) -> Result<Self, ChainError> {
        let mut store = Self::new();
        for header in headers {
            store.connect(header)?;
        }
        Ok(store)
    }

    pub fn best_header(&self) -> Option<&BlockHeader> {
        self.headers.last()
    }

    pub fn header_at(&self, height: u64) -> Option<&BlockHeader> {
        self.headers.get(height as usize)
    }

    pub fn header_by_hash(&self, hash: &[u8]) -> Option<&BlockHeader> {
        self.by_hash.get(hash).and_then(|h| self.header_at(*h))
    }

    /// Height the next block will carry
    pub fn next_height(&self) -> u64 {
        self.headers.len() as u64
    }

    /// Hash the next header must link to (empty before genesis)
    pub fn tip_hash(&self) -> Vec<u8> {
        self.best_header().map(|h| h.hash()).unwrap_or_default()
    }

    pub fn headers(&self) -> impl Iterator<Item = &BlockHeader> {
        self.headers.iter()
    }

    /// Check that `header` directly extends the best header
    pub fn check_extends(&self, header: &BlockHeader) -> Result<(), ChainError> {
        let expected = self.next_height();
        if header.block_height != expected {
            return Err(ChainError::BadHeight {
                expected,
                got: header.block_height,
            });
        }
        if header.previous_header_hash != self.tip_hash() {
            return Err(ChainError::BadLink);
        }
        Ok(())
    }

    pub fn connect(&mut self, header: BlockHeader) -> Result<(), ChainError> {
        self.check_extends(&header)?;
        self.by_hash.insert(header.hash(), header.block_height);
        self.headers.push(header);
        Ok(())
    }
}
