// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROPERTY-BASED TESTS - ubic-node
//
// Pool admission: one pending transaction per source account, arrival order
// preserved, counters consistent, expiry frees every slot.
// Run: cargo test --release -p ubic-node --test prop_pool
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use proptest::prelude::*;
use std::collections::HashSet;
use ubic_consensus::VoteStore;
use ubic_core::config::PoolConfig;
use ubic_core::script::pay_to_key;
use ubic_core::{
    Amount, CertStore, ConsensusParams, HeaderContext, InputScript, Ledger, ProtocolParams,
    RawScript, ScriptType, Transaction, TxIn, TxOut, UbiRates,
};
use ubic_crypto::{generate_keypair_from_seed, KeyPair};
use ubic_node::TxPool;

const NET: u8 = 5;

fn senders() -> Vec<KeyPair> {
    (1..=4u8)
        .map(|tag| generate_keypair_from_seed(&[tag; 32]).unwrap())
        .collect()
}

fn setup(senders: &[KeyPair]) -> (Ledger, CertStore, VoteStore, ProtocolParams) {
    let mut ledger = Ledger::new();
    for keys in senders {
        ledger
            .credit_genesis(&keys.public_key, &Amount::single(0, 100))
            .unwrap();
    }
    let consensus = ConsensusParams {
        active_delegate_count: 3,
        slot_duration_secs: 10,
    };
    let params = ProtocolParams {
        network_id: NET,
        root_authority_public_key: vec![0; 32],
        ubi_rates: UbiRates::default(),
        consensus: consensus.clone(),
    };
    (ledger, CertStore::new(), VoteStore::new(consensus), params)
}

fn payment(from: &KeyPair, spend: u64, send: u64) -> Transaction {
    let mut tx = Transaction {
        network: NET,
        tx_ins: vec![TxIn {
            in_address: from.address_link(),
            script: RawScript::new(ScriptType::PayToKeyHash, Vec::new()),
            amount: Amount::single(0, spend),
            nonce: 0,
        }],
        tx_outs: vec![TxOut {
            script: pay_to_key(&[9; 32]),
            amount: Amount::single(0, send),
        }],
    };
    let signature = from.sign(&tx.tx_id()).unwrap();
    tx.tx_ins[0].script = InputScript::PayToKeyHash { signature }.encode().unwrap();
    tx
}

/// Submissions as (sender index, spend, fee, arrival offset)
fn arb_submissions() -> impl Strategy<Value = Vec<(usize, u64, u64, u64)>> {
    proptest::collection::vec((0usize..4, 1u64..150, 0u64..5, 0u64..30), 0..24)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_one_pending_per_source(submissions in arb_submissions()) {
        let keys = senders();
        let (ledger, certs, votes, params) = setup(&keys);
        let mut pool = TxPool::new(PoolConfig {
            max_size: 3,
            pending_expiry_secs: 600,
        });
        let header = HeaderContext { height: 0, timestamp: 0 };

        let mut admitted = Vec::new();
        for (idx, spend, fee, at) in &submissions {
            let send = spend.saturating_sub(*fee);
            let tx = payment(&keys[*idx], *spend, send);
            if let Ok(id) = pool.admit(tx, &ledger, &certs, &votes, &header, &params, *at) {
                admitted.push(id);
            }
        }

        let stats = pool.stats();
        prop_assert_eq!(stats.total_received, submissions.len() as u64);
        prop_assert_eq!(stats.total_accepted + stats.total_rejected, stats.total_received);
        prop_assert!(pool.len() <= 3);

        let pending = pool.pending();
        let order: Vec<_> = pending.iter().map(|e| e.tx_id.clone()).collect();
        prop_assert_eq!(order, admitted);

        let mut sources = HashSet::new();
        for entry in &pending {
            for txin in &entry.tx.tx_ins {
                prop_assert!(sources.insert(txin.in_address.clone()));
            }
        }
    }

    #[test]
    fn prop_expiry_frees_every_slot(submissions in arb_submissions()) {
        let keys = senders();
        let (ledger, certs, votes, params) = setup(&keys);
        let mut pool = TxPool::new(PoolConfig {
            max_size: 100,
            pending_expiry_secs: 60,
        });
        let header = HeaderContext { height: 0, timestamp: 0 };

        for (idx, spend, fee, at) in &submissions {
            let send = spend.saturating_sub(*fee);
            let _ = pool.admit(payment(&keys[*idx], *spend, send), &ledger, &certs, &votes, &header, &params, *at);
        }
        let before = pool.len();
        let released = pool.release_expired(1_000);
        prop_assert_eq!(released, before);
        prop_assert!(pool.is_empty());
        prop_assert_eq!(pool.stats().busy_sources, 0);
    }
}
