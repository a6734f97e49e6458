// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - TRANSACTION POOL
//
// Pending transactions waiting for a block.
// - full validation on admission, nothing stored on failure
// - duplicate id detection
// - at most one pending transaction per source (address link, delegate key
//   or certificate id)
// - confirmed entries evicted on commit, survivors re-validated
// - expiry releases the pending slot of transactions that never confirm
// Entries are kept in arrival order; block assembly decides inclusion order.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::validator::validate;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ubic_consensus::VoteStore;
use ubic_core::config::PoolConfig;
use ubic_core::{
    CertStore, Effects, HeaderContext, Ledger, ProtocolParams, Transaction, TxId, ValidationError,
};

#[derive(Debug, Clone)]
pub struct PoolEntry {
    pub tx: Transaction,
    pub tx_id: TxId,
    /// Effects computed at admission; recomputed on every re-validation
    pub effects: Effects,
    pub received_at: u64,
    seq: u64,
}

impl PoolEntry {
    fn sources(&self) -> impl Iterator<Item = &Vec<u8>> {
        self.tx.tx_ins.iter().map(|i| &i.in_address)
    }
}

#[derive(Debug, Clone)]
pub struct TxPool {
    config: PoolConfig,

    /// Transactions indexed by id
    transactions: HashMap<TxId, PoolEntry>,

    /// Arrival order: seq -> tx id
    arrival: BTreeMap<u64, TxId>,

    /// Source reference -> the one pending tx occupying it
    by_source: HashMap<Vec<u8>, TxId>,

    next_seq: u64,

    /// Statistics
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_expired: u64,
    pub total_confirmed: u64,
    /// Dropped because they stopped validating after a commit
    pub total_invalidated: u64,
}

impl TxPool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            config,
            transactions: HashMap::new(),
            arrival: BTreeMap::new(),
            by_source: HashMap::new(),
            next_seq: 0,
            total_received: 0,
            total_accepted: 0,
            total_rejected: 0,
            total_expired: 0,
            total_confirmed: 0,
            total_invalidated: 0,
        }
    }

    /// Validate and enqueue. Returns the tx id on success; on failure the
    /// pool is unchanged apart from the counters.
    #[allow(clippy::too_many_arguments)]
    pub fn admit(
        &mut self,
        tx: Transaction,
        ledger: &Ledger,
        certs: &CertStore,
        votes: &VoteStore,
        header: &HeaderContext,
        params: &ProtocolParams,
        now: u64,
    ) -> Result<TxId, ValidationError> {
        self.total_received += 1;
        match self.try_admit(tx, ledger, certs, votes, header, params, now) {
            Ok(tx_id) => {
                self.total_accepted += 1;
                Ok(tx_id)
            }
            Err(e) => {
                self.total_rejected += 1;
                debug!("Pool: rejected transaction ({})", e);
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn try_admit(
        &mut self,
        tx: Transaction,
        ledger: &Ledger,
        certs: &CertStore,
        votes: &VoteStore,
        header: &HeaderContext,
        params: &ProtocolParams,
        now: u64,
    ) -> Result<TxId, ValidationError> {
        let tx_id = tx.tx_id();
        if self.transactions.contains_key(&tx_id) {
            return Err(ValidationError::DuplicateTransaction);
        }
        if tx
            .tx_ins
            .iter()
            .any(|i| self.by_source.contains_key(&i.in_address))
        {
            return Err(ValidationError::AccountBusy);
        }
        if self.transactions.len() >= self.config.max_size {
            return Err(ValidationError::PoolFull);
        }

        let effects = validate(&tx, ledger, certs, votes, header, params)?;

        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = PoolEntry {
            tx,
            tx_id: tx_id.clone(),
            effects,
            received_at: now,
            seq,
        };
        for source in entry.sources() {
            self.by_source.insert(source.clone(), tx_id.clone());
        }
        self.arrival.insert(seq, tx_id.clone());
        self.transactions.insert(tx_id.clone(), entry);

        debug!("Pool: admitted {} ({} pending)", hex::encode(&tx_id), self.len());
        Ok(tx_id)
    }

    pub fn get(&self, tx_id: &[u8]) -> Option<&PoolEntry> {
        self.transactions.get(tx_id)
    }

    pub fn contains(&self, tx_id: &[u8]) -> bool {
        self.transactions.contains_key(tx_id)
    }

    /// Pending transaction occupying `source`, if any
    pub fn pending_for_source(&self, source: &[u8]) -> Option<&PoolEntry> {
        self.by_source
            .get(source)
            .and_then(|id| self.transactions.get(id))
    }

    /// Pending entries in arrival order
    pub fn pending(&self) -> Vec<&PoolEntry> {
        self.arrival
            .values()
            .filter_map(|id| self.transactions.get(id))
            .collect()
    }

    fn remove(&mut self, tx_id: &[u8]) -> Option<PoolEntry> {
        let entry = self.transactions.remove(tx_id)?;
        self.arrival.remove(&entry.seq);
        for source in entry.sources() {
            if self.by_source.get(source).map(|id| id.as_slice()) == Some(tx_id) {
                self.by_source.remove(source);
            }
        }
        Some(entry)
    }

    /// Evict transactions included in a committed block
    pub fn remove_confirmed<'a, I: IntoIterator<Item = &'a TxId>>(&mut self, tx_ids: I) -> usize {
        let mut count = 0;
        for id in tx_ids {
            if self.remove(id).is_some() {
                count += 1;
            }
        }
        self.total_confirmed += count as u64;
        count
    }

    /// Re-run validation for every pending entry against new state; entries
    /// that no longer validate are dropped and returned with their error.
    pub fn revalidate(
        &mut self,
        ledger: &Ledger,
        certs: &CertStore,
        votes: &VoteStore,
        header: &HeaderContext,
        params: &ProtocolParams,
    ) -> Vec<(TxId, ValidationError)> {
        let ids: Vec<TxId> = self.arrival.values().cloned().collect();
        let mut dropped = Vec::new();
        for id in ids {
            let outcome = match self.transactions.get(&id) {
                Some(entry) => validate(&entry.tx, ledger, certs, votes, header, params),
                None => continue,
            };
            match outcome {
                Ok(effects) => {
                    if let Some(entry) = self.transactions.get_mut(&id) {
                        entry.effects = effects;
                    }
                }
                Err(e) => {
                    debug!("Pool: dropping {} ({})", hex::encode(&id), e);
                    self.remove(&id);
                    dropped.push((id, e));
                }
            }
        }
        self.total_invalidated += dropped.len() as u64;
        dropped
    }

    /// Drop entries older than the configured expiry, releasing their slots
    pub fn release_expired(&mut self, now: u64) -> usize {
        let expiry = self.config.pending_expiry_secs;
        let expired: Vec<TxId> = self
            .transactions
            .values()
            .filter(|e| now.saturating_sub(e.received_at) > expiry)
            .map(|e| e.tx_id.clone())
            .collect();

        let count = expired.len();
        for id in expired {
            self.remove(&id);
        }
        self.total_expired += count as u64;
        count
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            size: self.transactions.len(),
            total_received: self.total_received,
            total_accepted: self.total_accepted,
            total_rejected: self.total_rejected,
            total_expired: self.total_expired,
            total_confirmed: self.total_confirmed,
            total_invalidated: self.total_invalidated,
            busy_sources: self.by_source.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStats {
    pub size: usize,
    pub total_received: u64,
    pub total_accepted: u64,
    pub total_rejected: u64,
    pub total_expired: u64,
    pub total_confirmed: u64,
    pub total_invalidated: u64,
    pub busy_sources: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ubic_core::script::pay_to_key;
    use ubic_core::{Amount, ConsensusParams, RawScript, ScriptType, TxIn, TxOut, UbiRates};
    use ubic_crypto::{generate_keypair_from_seed, KeyPair};

    struct State {
        ledger: Ledger,
        certs: CertStore,
        votes: VoteStore,
        params: ProtocolParams,
    }

    const HEADER: HeaderContext = HeaderContext {
        height: 1,
        timestamp: 100,
    };

    fn keys(tag: u8) -> KeyPair {
        generate_keypair_from_seed(&[tag; 32]).unwrap()
    }

    fn state(funded: &[&KeyPair]) -> State {
        let mut ledger = Ledger::new();
        for k in funded {
            ledger
                .credit_genesis(&k.public_key, &Amount::single(0, 100))
                .unwrap();
        }
        State {
            ledger,
            certs: CertStore::new(),
            votes: VoteStore::new(ConsensusParams::default()),
            params: ProtocolParams {
                network_id: 1,
                root_authority_public_key: vec![0; 32],
                ubi_rates: UbiRates::default(),
                consensus: ConsensusParams::default(),
            },
        }
    }

    fn payment(from: &KeyPair, to: &KeyPair, amount: u64, nonce: u64) -> Transaction {
        let mut tx = Transaction {
            network: 1,
            tx_ins: vec![TxIn {
                in_address: from.address_link(),
                script: RawScript::new(ScriptType::PayToKeyHash, Vec::new()),
                amount: Amount::single(0, amount),
                nonce,
            }],
            tx_outs: vec![TxOut {
                script: pay_to_key(&to.public_key),
                amount: Amount::single(0, amount),
            }],
        };
        tx.tx_ins[0].script.payload = from.sign(&tx.tx_id()).unwrap();
        tx
    }

    fn admit(pool: &mut TxPool, s: &State, tx: Transaction, now: u64) -> Result<TxId, ValidationError> {
        pool.admit(tx, &s.ledger, &s.certs, &s.votes, &HEADER, &s.params, now)
    }

    #[test]
    fn test_admit_transaction() {
        let (a, b) = (keys(1), keys(2));
        let s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());

        let id = admit(&mut pool, &s, payment(&a, &b, 10, 0), 0).unwrap();
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&id));
        assert!(pool.pending_for_source(&a.address_link()).is_some());
    }

    #[test]
    fn test_duplicate_rejection() {
        let (a, b) = (keys(1), keys(2));
        let s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());
        let tx = payment(&a, &b, 10, 0);

        admit(&mut pool, &s, tx.clone(), 0).unwrap();
        assert_eq!(
            admit(&mut pool, &s, tx, 0).unwrap_err(),
            ValidationError::DuplicateTransaction
        );
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn test_second_pending_from_same_account_is_busy() {
        let (a, b) = (keys(1), keys(2));
        let s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());

        admit(&mut pool, &s, payment(&a, &b, 10, 0), 0).unwrap();
        assert_eq!(
            admit(&mut pool, &s, payment(&a, &b, 20, 0), 0).unwrap_err(),
            ValidationError::AccountBusy
        );
    }

    #[test]
    fn test_invalid_transaction_not_stored() {
        let (a, b) = (keys(1), keys(2));
        let s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());

        assert_eq!(
            admit(&mut pool, &s, payment(&a, &b, 500, 0), 0).unwrap_err(),
            ValidationError::InsufficientFunds
        );
        assert!(pool.is_empty());
        assert!(pool.pending_for_source(&a.address_link()).is_none());
        let stats = pool.stats();
        assert_eq!(stats.total_received, 1);
        assert_eq!(stats.total_rejected, 1);
    }

    #[test]
    fn test_pool_full() {
        let (a, b, c) = (keys(1), keys(2), keys(3));
        let s = state(&[&a, &b]);
        let mut pool = TxPool::new(PoolConfig {
            max_size: 1,
            pending_expiry_secs: 60,
        });

        admit(&mut pool, &s, payment(&a, &c, 10, 0), 0).unwrap();
        assert_eq!(
            admit(&mut pool, &s, payment(&b, &c, 10, 0), 0).unwrap_err(),
            ValidationError::PoolFull
        );
    }

    #[test]
    fn test_pending_keeps_arrival_order() {
        let (a, b, c) = (keys(1), keys(2), keys(3));
        let s = state(&[&a, &b, &c]);
        let mut pool = TxPool::new(PoolConfig::default());

        let first = admit(&mut pool, &s, payment(&c, &a, 5, 0), 0).unwrap();
        let second = admit(&mut pool, &s, payment(&a, &b, 50, 0), 1).unwrap();
        let third = admit(&mut pool, &s, payment(&b, &c, 1, 0), 2).unwrap();

        let ids: Vec<&TxId> = pool.pending().iter().map(|e| &e.tx_id).collect();
        assert_eq!(ids, vec![&first, &second, &third]);
    }

    #[test]
    fn test_remove_confirmed_frees_slot() {
        let (a, b) = (keys(1), keys(2));
        let mut s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());

        let id = admit(&mut pool, &s, payment(&a, &b, 10, 0), 0).unwrap();
        let effects = pool.get(&id).unwrap().effects.clone();
        s.ledger.apply(&effects).unwrap();

        assert_eq!(pool.remove_confirmed([&id]), 1);
        assert!(pool.is_empty());
        admit(&mut pool, &s, payment(&a, &b, 10, 1), 0).unwrap();
        assert_eq!(pool.stats().total_confirmed, 1);
    }

    #[test]
    fn test_revalidate_drops_stale_entries() {
        let (a, b) = (keys(1), keys(2));
        let mut s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig::default());

        let id = admit(&mut pool, &s, payment(&a, &b, 10, 0), 0).unwrap();
        // The same nonce is consumed by a transaction that never went through this pool
        let competing = payment(&a, &b, 20, 0);
        let effects = validate(&competing, &s.ledger, &s.certs, &s.votes, &HEADER, &s.params).unwrap();
        s.ledger.apply(&effects).unwrap();

        let dropped = pool.revalidate(&s.ledger, &s.certs, &s.votes, &HEADER, &s.params);
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, id);
        assert!(matches!(dropped[0].1, ValidationError::StaleNonce { .. }));
        assert!(pool.is_empty());
        assert_eq!(pool.stats().busy_sources, 0);
    }

    #[test]
    fn test_release_expired() {
        let (a, b) = (keys(1), keys(2));
        let s = state(&[&a]);
        let mut pool = TxPool::new(PoolConfig {
            max_size: 10,
            pending_expiry_secs: 60,
        });

        admit(&mut pool, &s, payment(&a, &b, 10, 0), 1_000).unwrap();
        assert_eq!(pool.release_expired(1_060), 0);
        assert_eq!(pool.release_expired(1_061), 1);
        assert!(pool.is_empty());
        assert_eq!(pool.stats().total_expired, 1);
        // Slot is free again
        admit(&mut pool, &s, payment(&a, &b, 10, 0), 1_062).unwrap();
    }
}
