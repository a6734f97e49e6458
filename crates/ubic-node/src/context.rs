// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - NODE CONTEXT
//
// Owns every store of a running node and is the only mutation entry point:
//   admit(tx)            validate against a consistent snapshot, enqueue
//   commit_block(block)  verify header, apply votes then transactions on
//                        working copies, swap in only if all succeed
//
// Each store sits behind its own lock. Locks are always taken in the order
// pool -> ledger -> certs -> votes -> chain -> ubi cache, so readers never
// observe a half-applied block and writers never deadlock.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::db::StateSnapshot;
use crate::error::{CommitError, StoreError};
use crate::tx_pool::{PoolStats, TxPool};
use crate::validator::validate;
use log::{debug, info, warn};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use ubic_consensus::{Delegate, VoteStore};
use ubic_core::config::PoolConfig;
use ubic_core::{
    Account, Amount, AmountError, Block, BlockHeader, CertStore, CertType, Certificate,
    ChainStore, Credit, CurrencyId, Effects, HeaderContext, Ledger, NodeConfig, ProtocolParams,
    ScriptType, Transaction, TxId, UbiCache, ValidationError,
};
use ubic_crypto::{address_link, short_hex, KeyPair};

/// Lock helpers that recover the inner value instead of cascading a panic
/// from a poisoned lock.
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| {
        warn!("Mutex was poisoned, recovering");
        poisoned.into_inner()
    })
}

fn safe_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn safe_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(|poisoned| {
        warn!("RwLock was poisoned, recovering");
        poisoned.into_inner()
    })
}

/// UBI position of one account at the next block height, together with the
/// account record it was computed from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UbiStatus {
    pub account: Account,
    pub height: u64,
    pub settled: Amount,
    pub payable: Amount,
    /// balance + payable
    pub available: Amount,
}

/// Working copies a block is applied to before being swapped in
struct Working {
    ledger: Ledger,
    certs: CertStore,
    votes: VoteStore,
}

impl Working {
    fn new(ledger: &Ledger, certs: &CertStore, votes: &VoteStore) -> Self {
        Self {
            ledger: ledger.clone(),
            certs: certs.clone(),
            votes: votes.clone(),
        }
    }

    /// Validate and apply one transaction; returns its fee.
    /// Every effect kind touches exactly one store, so a failure leaves
    /// the working copies as they were.
    fn apply(
        &mut self,
        tx: &Transaction,
        header: &HeaderContext,
        params: &ProtocolParams,
        block_hash: &[u8],
    ) -> Result<Amount, ValidationError> {
        let effects = validate(tx, &self.ledger, &self.certs, &self.votes, header, params)?;
        self.ledger.apply(&effects)?;
        self.certs.apply(&effects)?;
        self.votes.apply(&effects, block_hash)?;
        Ok(effects.fee())
    }

    fn credit_issuer(&mut self, issuer_pub_key: &[u8], fees: &Amount) -> Result<(), ValidationError> {
        if !fees.is_positive() {
            return Ok(());
        }
        self.ledger.apply(&Effects::Transfer {
            debits: Vec::new(),
            credits: vec![Credit {
                link: address_link(issuer_pub_key),
                spending_key: issuer_pub_key.to_vec(),
                amount: fees.clone(),
            }],
            fee: Amount::new(),
        })
    }
}

fn is_vote(tx: &Transaction) -> bool {
    tx.script_type() == Ok(ScriptType::Vote)
}

pub struct NodeContext {
    params: ProtocolParams,
    pool: Mutex<TxPool>,
    ledger: RwLock<Ledger>,
    certs: RwLock<CertStore>,
    votes: RwLock<VoteStore>,
    chain: RwLock<ChainStore>,
    ubi_cache: Mutex<UbiCache>,
}

impl NodeContext {
    fn from_parts(
        params: ProtocolParams,
        pool_config: PoolConfig,
        ledger: Ledger,
        certs: CertStore,
        votes: VoteStore,
        chain: ChainStore,
    ) -> Self {
        Self {
            params,
            pool: Mutex::new(TxPool::new(pool_config)),
            ledger: RwLock::new(ledger),
            certs: RwLock::new(certs),
            votes: RwLock::new(votes),
            chain: RwLock::new(chain),
            ubi_cache: Mutex::new(UbiCache::new()),
        }
    }

    /// Empty state: no accounts, certificates, delegates or headers
    pub fn new(params: ProtocolParams, pool_config: PoolConfig) -> Self {
        let votes = VoteStore::new(params.consensus.clone());
        Self::from_parts(
            params,
            pool_config,
            Ledger::new(),
            CertStore::new(),
            votes,
            ChainStore::new(),
        )
    }

    /// Genesis state from configuration: delegates, root anchors, allocations
    pub fn from_config(config: &NodeConfig) -> Result<Self, String> {
        config.validate()?;
        let params = config.protocol_params()?;

        let mut votes = VoteStore::new(params.consensus.clone());
        for key in config.genesis_delegate_keys()? {
            votes.register_genesis_delegate(key);
        }

        let mut certs = CertStore::new();
        for root in &config.root_certificates {
            let public_key = hex::decode(&root.public_key)
                .map_err(|e| format!("root_certificates.public_key: {}", e))?;
            certs
                .add_root(Certificate::root(public_key, root.currency, root.expiration_date))
                .map_err(|e| format!("root certificate: {}", e))?;
        }

        let mut ledger = Ledger::new();
        for account in &config.genesis_accounts {
            let public_key = hex::decode(&account.public_key)
                .map_err(|e| format!("genesis_accounts.public_key: {}", e))?;
            ledger
                .credit_genesis(&public_key, &Amount::single(account.currency, account.amount))
                .map_err(|e| format!("genesis account: {}", e))?;
        }

        info!(
            "Genesis state: {} delegates, {} roots, {} accounts",
            votes.active_delegates().len(),
            config.root_certificates.len(),
            ledger.len()
        );
        Ok(Self::from_parts(
            params,
            config.pool.clone(),
            ledger,
            certs,
            votes,
            ChainStore::new(),
        ))
    }

    /// Rebuild from persisted records; derived indexes are recomputed
    pub fn from_snapshot(
        params: ProtocolParams,
        pool_config: PoolConfig,
        snapshot: StateSnapshot,
    ) -> Result<Self, StoreError> {
        let chain = ChainStore::from_headers(snapshot.headers)
            .map_err(|e| StoreError::Corrupt(format!("headers: {}", e)))?;
        let votes = VoteStore::from_delegates(params.consensus.clone(), snapshot.delegates);
        Ok(Self::from_parts(
            params,
            pool_config,
            Ledger::from_accounts(snapshot.accounts),
            CertStore::from_certificates(snapshot.certificates),
            votes,
            chain,
        ))
    }

    /// Consistent copy of all persisted state
    pub fn snapshot(&self) -> StateSnapshot {
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let votes = safe_read(&self.votes);
        let chain = safe_read(&self.chain);
        StateSnapshot {
            accounts: ledger
                .accounts()
                .map(|(link, account)| (link.clone(), account.clone()))
                .collect(),
            certificates: certs.all().cloned().collect(),
            delegates: votes.delegates().cloned().collect(),
            headers: chain.headers().cloned().collect(),
        }
    }

    pub fn params(&self) -> &ProtocolParams {
        &self.params
    }

    // ─────────────────────────────────────────────────────────────────
    // MUTATIONS
    // ─────────────────────────────────────────────────────────────────

    /// Validate `tx` for the next block and add it to the pool.
    /// Expired entries are released first so their slots are reusable.
    pub fn admit(&self, tx: Transaction, now: u64) -> Result<TxId, ValidationError> {
        let mut pool = safe_lock(&self.pool);
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let votes = safe_read(&self.votes);
        let chain = safe_read(&self.chain);

        let released = pool.release_expired(now);
        if released > 0 {
            debug!("Pool: released {} expired transactions", released);
        }
        let header = HeaderContext {
            height: chain.next_height(),
            timestamp: now,
        };
        pool.admit(tx, &ledger, &certs, &votes, &header, &self.params, now)
    }

    /// Onboard a country-signing certificate issued by a known root
    pub fn trust_csca(&self, cert: Certificate) -> Result<(), ValidationError> {
        let mut certs = safe_write(&self.certs);
        let height = safe_read(&self.chain).next_height();
        certs.trust_csca(cert, height)
    }

    /// Onboard a document-signing certificate issued by a known CSCA
    pub fn trust_dsc(&self, cert: Certificate) -> Result<(), ValidationError> {
        let mut certs = safe_write(&self.certs);
        let height = safe_read(&self.chain).next_height();
        certs.trust_dsc(cert, height)
    }

    pub fn add_root(&self, cert: Certificate) -> Result<(), ValidationError> {
        safe_write(&self.certs).add_root(cert)
    }

    /// Verify and apply a block that extends the best header.
    /// On any failure no store is modified.
    pub fn commit_block(&self, block: &Block) -> Result<(), CommitError> {
        let mut pool = safe_lock(&self.pool);
        let mut ledger = safe_write(&self.ledger);
        let mut certs = safe_write(&self.certs);
        let mut votes = safe_write(&self.votes);
        let mut chain = safe_write(&self.chain);

        let working = match self.execute_block(block, &ledger, &certs, &votes, &chain) {
            Ok(w) => w,
            Err(e) => {
                warn!(
                    "Rejected block {} at height {}: {}",
                    short_hex(&block.header.hash(), 16),
                    block.header.block_height,
                    e
                );
                return Err(e);
            }
        };

        chain.connect(block.header.clone())?;
        *ledger = working.ledger;
        *certs = working.certs;
        *votes = working.votes;

        let confirmed: Vec<TxId> = block
            .header
            .votes
            .iter()
            .chain(&block.transactions)
            .map(|tx| tx.tx_id())
            .collect();
        pool.remove_confirmed(&confirmed);
        let next = HeaderContext {
            height: chain.next_height(),
            timestamp: block.header.timestamp,
        };
        let dropped = pool.revalidate(&ledger, &certs, &votes, &next, &self.params);

        info!(
            "Committed block {} at height {} ({} txs, {} votes, {} pool entries dropped)",
            short_hex(&block.header.hash(), 16),
            block.header.block_height,
            block.transactions.len(),
            block.header.votes.len(),
            dropped.len()
        );
        Ok(())
    }

    fn execute_block(
        &self,
        block: &Block,
        ledger: &Ledger,
        certs: &CertStore,
        votes: &VoteStore,
        chain: &ChainStore,
    ) -> Result<Working, CommitError> {
        let header = &block.header;
        chain.check_extends(header)?;
        if let Some(best) = chain.best_header() {
            if header.timestamp <= best.timestamp {
                return Err(CommitError::TimestampNotIncreasing);
            }
        }
        if votes.validator_for_timestamp(header.timestamp) != Some(header.issuer_pub_key.as_slice()) {
            return Err(CommitError::WrongIssuer);
        }
        if !header.verify_signature() {
            return Err(CommitError::BadIssuerSignature);
        }
        if header.merkle_root_hash != block.compute_merkle_root() {
            return Err(CommitError::MerkleMismatch);
        }

        let ctx = HeaderContext {
            height: header.block_height,
            timestamp: header.timestamp,
        };
        let block_hash = header.hash();
        let mut working = Working::new(ledger, certs, votes);
        let reject = |tx: &Transaction, error: ValidationError| CommitError::Transaction {
            tx_id: tx.tx_id(),
            error,
        };

        for tx in &header.votes {
            if !is_vote(tx) {
                return Err(reject(tx, ValidationError::malformed("non-vote transaction in header")));
            }
            working
                .apply(tx, &ctx, &self.params, &block_hash)
                .map_err(|e| reject(tx, e))?;
        }

        let mut fees = Amount::new();
        for tx in &block.transactions {
            if is_vote(tx) {
                return Err(reject(tx, ValidationError::malformed("vote transaction in block body")));
            }
            let fee = working
                .apply(tx, &ctx, &self.params, &block_hash)
                .map_err(|e| reject(tx, e))?;
            fees = fees.checked_add(&fee).map_err(|e| reject(tx, e.into()))?;
        }

        if header.payout != fees {
            return Err(CommitError::PayoutMismatch);
        }
        working
            .credit_issuer(&header.issuer_pub_key, &fees)
            .map_err(|_| CommitError::PayoutMismatch)?;

        let counts = working
            .ledger
            .count_ubi_receivers(&working.certs, header.block_height);
        if header.ubi_receiver_count != counts {
            return Err(CommitError::UbiReceiverCountMismatch);
        }
        Ok(working)
    }

    /// Build and sign the next block from the pool, in arrival order.
    ///
    /// Candidates are dry-run on working copies; those that no longer apply
    /// are skipped. The node state is not modified: the returned block still
    /// has to go through `commit_block`.
    pub fn assemble_block(&self, issuer: &KeyPair, timestamp: u64) -> Result<Block, CommitError> {
        let pool = safe_lock(&self.pool);
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let votes = safe_read(&self.votes);
        let chain = safe_read(&self.chain);

        let height = chain.next_height();
        let ctx = HeaderContext { height, timestamp };
        let mut working = Working::new(&ledger, &certs, &votes);

        let mut header_votes = Vec::new();
        let mut transactions = Vec::new();
        let mut fees = Amount::new();
        for entry in pool.pending() {
            // The block hash is not known yet; it only labels the voter's last vote
            match working.apply(&entry.tx, &ctx, &self.params, &[]) {
                Ok(fee) if is_vote(&entry.tx) => {
                    debug_assert!(fee.is_zero());
                    header_votes.push(entry.tx.clone());
                }
                Ok(fee) => {
                    fees = fees.checked_add(&fee).map_err(|e| CommitError::Transaction {
                        tx_id: entry.tx_id.clone(),
                        error: e.into(),
                    })?;
                    transactions.push(entry.tx.clone());
                }
                Err(e) => debug!("Assembly: skipping {} ({})", short_hex(&entry.tx_id, 16), e),
            }
        }

        working
            .credit_issuer(&issuer.public_key, &fees)
            .map_err(|_| CommitError::PayoutMismatch)?;
        let ubi_receiver_count = working.ledger.count_ubi_receivers(&working.certs, height);

        let mut block = Block {
            header: BlockHeader {
                previous_header_hash: chain.tip_hash(),
                merkle_root_hash: Vec::new(),
                block_height: height,
                timestamp,
                issuer_pub_key: issuer.public_key.clone(),
                issuer_signature: Vec::new(),
                payout: fees,
                payout_remainder: Amount::new(),
                ubi_receiver_count,
                votes: header_votes,
            },
            transactions,
        };
        block.header.merkle_root_hash = block.compute_merkle_root();
        block.header.sign_with(issuer)?;
        Ok(block)
    }

    // ─────────────────────────────────────────────────────────────────
    // QUERIES (copies, never references into the stores)
    // ─────────────────────────────────────────────────────────────────

    pub fn best_header(&self) -> Option<BlockHeader> {
        safe_read(&self.chain).best_header().cloned()
    }

    pub fn header_at(&self, height: u64) -> Option<BlockHeader> {
        safe_read(&self.chain).header_at(height).cloned()
    }

    pub fn header_by_hash(&self, hash: &[u8]) -> Option<BlockHeader> {
        safe_read(&self.chain).header_by_hash(hash).cloned()
    }

    pub fn next_height(&self) -> u64 {
        safe_read(&self.chain).next_height()
    }

    pub fn account(&self, link: &[u8]) -> Option<Account> {
        safe_read(&self.ledger).get_account(link)
    }

    pub fn account_count(&self) -> usize {
        safe_read(&self.ledger).len()
    }

    /// Settled / payable UBI and spendable funds as of the next block
    pub fn ubi_status(&self, link: &[u8]) -> Result<Option<UbiStatus>, AmountError> {
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let chain = safe_read(&self.chain);

        let account = match ledger.get_account(link) {
            Some(a) => a,
            None => return Ok(None),
        };
        let height = chain.next_height();
        let trust_chain = account
            .identity_link
            .as_deref()
            .and_then(|id| certs.trust_chain(id));
        let settled = safe_lock(&self.ubi_cache).settled_ubi(
            link,
            &account,
            height,
            trust_chain.as_ref(),
            &self.params.ubi_rates,
        )?;
        let payable = settled.saturating_sub(&account.ubi_debit);
        let available = account.balance.checked_add(&payable)?;
        Ok(Some(UbiStatus {
            account,
            height,
            settled,
            payable,
            available,
        }))
    }

    /// Identity-bound accounts with an active certificate at the next height
    pub fn ubi_receivers(&self) -> BTreeMap<CurrencyId, u32> {
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let chain = safe_read(&self.chain);
        ledger.count_ubi_receivers(&certs, chain.next_height())
    }

    pub fn certificate(&self, cert_type: CertType, id: &[u8]) -> Option<Certificate> {
        safe_read(&self.certs).get(cert_type, id).cloned()
    }

    pub fn certificates(&self, cert_type: CertType) -> Vec<Certificate> {
        safe_read(&self.certs).list(cert_type).cloned().collect()
    }

    pub fn delegate(&self, public_key: &[u8]) -> Option<Delegate> {
        safe_read(&self.votes).delegate(public_key).cloned()
    }

    pub fn delegates(&self) -> Vec<Delegate> {
        safe_read(&self.votes).delegates().cloned().collect()
    }

    pub fn active_delegates(&self) -> Vec<Vec<u8>> {
        safe_read(&self.votes).active_delegates().to_vec()
    }

    pub fn validator_for_timestamp(&self, timestamp: u64) -> Option<Vec<u8>> {
        safe_read(&self.votes)
            .validator_for_timestamp(timestamp)
            .map(|k| k.to_vec())
    }

    pub fn pending_transactions(&self) -> Vec<Transaction> {
        safe_lock(&self.pool)
            .pending()
            .into_iter()
            .map(|e| e.tx.clone())
            .collect()
    }

    pub fn pool_stats(&self) -> PoolStats {
        safe_lock(&self.pool).stats()
    }

    /// Read-only access to the stores for collaborators that need more than
    /// the copying queries above (transaction builders). The closure runs
    /// under read locks, so it sees one consistent state.
    pub fn with_state<R>(&self, f: impl FnOnce(&Ledger, &CertStore, &VoteStore, u64) -> R) -> R {
        let ledger = safe_read(&self.ledger);
        let certs = safe_read(&self.certs);
        let votes = safe_read(&self.votes);
        let chain = safe_read(&self.chain);
        f(&ledger, &certs, &votes, chain.next_height())
    }
}
