// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - STATE DATABASE
//
// sled embedded database for the persisted node state.
// One tree per record kind, values encoded with bincode:
//   accounts      address link           -> Account
//   certificates  type tag ‖ certificate id -> Certificate
//   delegates     public key             -> Delegate
//   headers       height (big-endian)    -> BlockHeader
//   metadata      format version, header count
// A save is one cross-tree transaction, so a crash never leaves a mix of old
// and new records.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::error::StoreError;
use log::info;
use serde::{Deserialize, Serialize};
use sled::{Db, Tree};
use std::path::Path;
use ubic_consensus::Delegate;
use ubic_core::{Account, BlockHeader, Certificate};

const TREE_ACCOUNTS: &str = "accounts";
const TREE_CERTIFICATES: &str = "certificates";
const TREE_DELEGATES: &str = "delegates";
const TREE_HEADERS: &str = "headers";
const TREE_META: &str = "metadata";

const META_FORMAT_VERSION: &[u8] = b"format_version";
const META_HEADER_COUNT: &[u8] = b"header_count";
const FORMAT_VERSION: u32 = 1;

/// Everything the node persists. Derived indexes (certificate link index,
/// active delegate set, header hash index) are rebuilt on load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub accounts: Vec<(Vec<u8>, Account)>,
    pub certificates: Vec<Certificate>,
    pub delegates: Vec<Delegate>,
    pub headers: Vec<BlockHeader>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseStats {
    pub accounts_count: usize,
    pub certificates_count: usize,
    pub delegates_count: usize,
    pub headers_count: usize,
    pub size_on_disk: u64,
}

pub struct StateDb {
    db: Db,
}

fn certificate_key(cert: &Certificate) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + cert.id.len());
    key.push(cert.cert_type.tag());
    key.extend_from_slice(&cert.id);
    key
}

fn encode_all<T: Serialize>(
    entries: impl Iterator<Item = (Vec<u8>, T)>,
) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
    entries
        .map(|(key, value)| Ok((key, bincode::serialize(&value)?)))
        .collect()
}

fn decode_tree<T: serde::de::DeserializeOwned>(tree: &Tree) -> Result<Vec<(Vec<u8>, T)>, StoreError> {
    let mut out = Vec::with_capacity(tree.len());
    for item in tree.iter() {
        let (key, value) = item?;
        out.push((key.to_vec(), bincode::deserialize(&value)?));
    }
    Ok(out)
}

impl StateDb {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        info!("State database opened at {}", path.as_ref().display());
        Ok(Self { db })
    }

    fn tree(&self, name: &str) -> Result<Tree, StoreError> {
        Ok(self.db.open_tree(name)?)
    }

    /// First run: nothing saved yet
    pub fn is_empty(&self) -> bool {
        self.tree(TREE_META)
            .ok()
            .and_then(|t| t.get(META_HEADER_COUNT).ok().flatten())
            .is_none()
    }

    /// Persist a complete snapshot atomically.
    ///
    /// Records are never deleted by the node (accounts, certificates and
    /// delegates only change, headers only grow), so a save upserts.
    pub fn save(&self, snapshot: &StateSnapshot) -> Result<(), StoreError> {
        use sled::Transactional;

        let accounts = self.tree(TREE_ACCOUNTS)?;
        let certificates = self.tree(TREE_CERTIFICATES)?;
        let delegates = self.tree(TREE_DELEGATES)?;
        let headers = self.tree(TREE_HEADERS)?;
        let meta = self.tree(TREE_META)?;

        // Encode outside the transaction, which may be retried
        let account_entries = encode_all(
            snapshot
                .accounts
                .iter()
                .map(|(link, account)| (link.clone(), account)),
        )?;
        let certificate_entries =
            encode_all(snapshot.certificates.iter().map(|c| (certificate_key(c), c)))?;
        let delegate_entries =
            encode_all(snapshot.delegates.iter().map(|d| (d.public_key.clone(), d)))?;
        let header_entries = encode_all(
            snapshot
                .headers
                .iter()
                .map(|h| (h.block_height.to_be_bytes().to_vec(), h)),
        )?;
        let header_count = snapshot.headers.len() as u64;

        (&accounts, &certificates, &delegates, &headers, &meta)
            .transaction(|(tx_accounts, tx_certs, tx_delegates, tx_headers, tx_meta)| {
                for (key, value) in &account_entries {
                    tx_accounts.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &certificate_entries {
                    tx_certs.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &delegate_entries {
                    tx_delegates.insert(key.as_slice(), value.as_slice())?;
                }
                for (key, value) in &header_entries {
                    tx_headers.insert(key.as_slice(), value.as_slice())?;
                }
                tx_meta.insert(META_FORMAT_VERSION, &FORMAT_VERSION.to_le_bytes() as &[u8])?;
                tx_meta.insert(META_HEADER_COUNT, &header_count.to_le_bytes() as &[u8])?;
                Ok(())
            })
            .map_err(|e: sled::transaction::TransactionError<()>| {
                StoreError::Sled(format!("Atomic save failed: {:?}", e))
            })?;

        self.db.flush()?;
        Ok(())
    }

    pub fn load(&self) -> Result<StateSnapshot, StoreError> {
        let meta = self.tree(TREE_META)?;
        if let Some(raw) = meta.get(META_FORMAT_VERSION)? {
            let version = <[u8; 4]>::try_from(raw.as_ref())
                .map(u32::from_le_bytes)
                .map_err(|_| StoreError::Corrupt("format version".to_string()))?;
            if version != FORMAT_VERSION {
                return Err(StoreError::Corrupt(format!(
                    "unsupported format version {}",
                    version
                )));
            }
        }

        let accounts = decode_tree::<Account>(&self.tree(TREE_ACCOUNTS)?)?;
        let certificates = decode_tree::<Certificate>(&self.tree(TREE_CERTIFICATES)?)?
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        let delegates = decode_tree::<Delegate>(&self.tree(TREE_DELEGATES)?)?
            .into_iter()
            .map(|(_, d)| d)
            .collect();
        // Big-endian height keys iterate in chain order
        let headers: Vec<BlockHeader> = decode_tree::<BlockHeader>(&self.tree(TREE_HEADERS)?)?
            .into_iter()
            .map(|(_, h)| h)
            .collect();

        Ok(StateSnapshot {
            accounts,
            certificates,
            delegates,
            headers,
        })
    }

    pub fn flush(&self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn stats(&self) -> DatabaseStats {
        let count = |name: &str| self.tree(name).map(|t| t.len()).unwrap_or(0);
        DatabaseStats {
            accounts_count: count(TREE_ACCOUNTS),
            certificates_count: count(TREE_CERTIFICATES),
            delegates_count: count(TREE_DELEGATES),
            headers_count: count(TREE_HEADERS),
            size_on_disk: self.db.size_on_disk().unwrap_or(0),
        }
    }
}
