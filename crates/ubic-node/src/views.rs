// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - READ-ONLY VIEWS
//
// Serialisable snapshots of node state for API layers and tooling. Byte
// strings are hex-encoded, amounts keep their currency map. Views are copies:
// building one never holds a lock past the query that fed it.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::context::NodeContext;
use crate::tx_pool::PoolStats;
use serde::Serialize;
use std::collections::BTreeMap;
use ubic_consensus::Delegate;
use ubic_core::{
    Amount, AmountError, BlockHeader, Certificate, CurrencyId, InputScript, OutputScript,
    Transaction, VoteAction,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddressView {
    pub address: String,
    pub nonce: u64,
    pub balance: Amount,
    pub amount_with_ubi: Amount,
    pub ubi_debit: Amount,
    pub settled_ubi: Amount,
    pub identity_link: Option<String>,
    pub identity_linked_at_height: Option<u64>,
}

/// Built from a single ledger read so balance and UBI figures agree
pub fn address_view(ctx: &NodeContext, link: &[u8]) -> Result<Option<AddressView>, AmountError> {
    let ubi = match ctx.ubi_status(link)? {
        Some(s) => s,
        None => return Ok(None),
    };
    let account = ubi.account;
    Ok(Some(AddressView {
        address: hex::encode(link),
        nonce: account.nonce,
        amount_with_ubi: ubi.available,
        settled_ubi: ubi.settled,
        identity_linked_at_height: account
            .identity_link
            .as_ref()
            .map(|_| account.identity_linked_at_height),
        identity_link: account.identity_link.as_ref().map(hex::encode),
        balance: account.balance,
        ubi_debit: account.ubi_debit,
    }))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteView {
    pub action: String,
    pub from: String,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DelegateView {
    pub public_key: String,
    pub nonce: u64,
    pub total_vote: u64,
    pub vote_count: u64,
    pub unvote_count: u64,
    pub active: bool,
    /// Scheduled issuer for the queried timestamp
    pub current_validator: bool,
    pub block_hash_last_vote: String,
    pub votes: Vec<VoteView>,
}

fn action_name(action: VoteAction) -> String {
    match action {
        VoteAction::Vote => "vote".to_string(),
        VoteAction::Unvote => "unvote".to_string(),
    }
}

fn delegate_to_view(d: &Delegate, active: &[Vec<u8>], current: Option<&[u8]>) -> DelegateView {
    DelegateView {
        public_key: hex::encode(&d.public_key),
        nonce: d.nonce,
        total_vote: d.total_vote,
        vote_count: d.vote_count,
        unvote_count: d.unvote_count,
        active: active.contains(&d.public_key),
        current_validator: current == Some(d.public_key.as_slice()),
        block_hash_last_vote: hex::encode(&d.block_hash_last_vote),
        votes: d
            .votes
            .iter()
            .map(|v| VoteView {
                action: action_name(v.action),
                from: hex::encode(&v.from_pub_key),
                nonce: v.nonce,
            })
            .collect(),
    }
}

/// Every delegate, active ones first in rank order
pub fn delegate_views(ctx: &NodeContext, timestamp: u64) -> Vec<DelegateView> {
    let active = ctx.active_delegates();
    let current = ctx.validator_for_timestamp(timestamp);
    let mut delegates = ctx.delegates();
    delegates.sort_by_key(|d| {
        active
            .iter()
            .position(|k| *k == d.public_key)
            .unwrap_or(usize::MAX)
    });
    delegates
        .iter()
        .map(|d| delegate_to_view(d, &active, current.as_deref()))
        .collect()
}

pub fn delegate_view(ctx: &NodeContext, public_key: &[u8], timestamp: u64) -> Option<DelegateView> {
    let delegate = ctx.delegate(public_key)?;
    let active = ctx.active_delegates();
    let current = ctx.validator_for_timestamp(timestamp);
    Some(delegate_to_view(&delegate, &active, current.as_deref()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusView {
    pub block_height: u64,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CertificateView {
    pub id: String,
    pub cert_type: String,
    pub public_key: String,
    pub issuer_id: String,
    pub currency: CurrencyId,
    pub expiration_date: u64,
    pub nonce: u64,
    pub active: bool,
    pub status_list: Vec<StatusView>,
}

impl From<&Certificate> for CertificateView {
    fn from(c: &Certificate) -> Self {
        Self {
            id: hex::encode(&c.id),
            cert_type: c.cert_type.to_string(),
            public_key: hex::encode(&c.public_key),
            issuer_id: hex::encode(&c.issuer_id),
            currency: c.currency,
            expiration_date: c.expiration_date,
            nonce: c.nonce,
            active: c.active,
            status_list: c
                .status_list
                .iter()
                .map(|s| StatusView {
                    block_height: s.block_height,
                    active: s.active,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxInView {
    pub in_address: String,
    pub script_type: String,
    pub amount: Amount,
    pub nonce: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TxOutView {
    pub script_type: String,
    /// Receiver public key, or the vote target
    pub receiver: String,
    pub amount: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionView {
    pub tx_id: String,
    pub network: u8,
    pub inputs: Vec<TxInView>,
    pub outputs: Vec<TxOutView>,
    /// None when the outputs exceed the inputs
    pub fee: Option<Amount>,
}

fn script_name(tag: u8, input: Option<&InputScript>) -> String {
    match input {
        Some(InputScript::PayToKeyHash { .. }) => "pay_to_key_hash".to_string(),
        Some(InputScript::Vote { .. }) => "vote".to_string(),
        Some(InputScript::RegisterPassport { .. }) => "register_passport".to_string(),
        Some(InputScript::DeactivateCertificate(s)) => {
            format!("deactivate_certificate({})", s.cert_type)
        }
        None => format!("unknown({})", tag),
    }
}

impl From<&Transaction> for TransactionView {
    fn from(tx: &Transaction) -> Self {
        Self {
            tx_id: tx.tx_id_hex(),
            network: tx.network,
            inputs: tx
                .tx_ins
                .iter()
                .map(|i| TxInView {
                    in_address: hex::encode(&i.in_address),
                    script_type: script_name(
                        i.script.script_type,
                        InputScript::decode(&i.script).ok().as_ref(),
                    ),
                    amount: i.amount.clone(),
                    nonce: i.nonce,
                })
                .collect(),
            outputs: tx
                .tx_outs
                .iter()
                .map(|o| {
                    let (script_type, receiver) = match OutputScript::decode(&o.script) {
                        Ok(OutputScript::PayToKeyHash { public_key }) => {
                            ("pay_to_key_hash".to_string(), hex::encode(public_key))
                        }
                        Ok(OutputScript::Vote(v)) => {
                            (action_name(v.action), hex::encode(v.target_pub_key))
                        }
                        Err(_) => (format!("unknown({})", o.script.script_type), String::new()),
                    };
                    TxOutView {
                        script_type,
                        receiver,
                        amount: o.amount.clone(),
                    }
                })
                .collect(),
            fee: tx.fee().ok(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockView {
    pub hash: String,
    pub previous_hash: String,
    pub height: u64,
    pub timestamp: u64,
    pub issuer: String,
    pub payout: Amount,
    pub ubi_receiver_count: BTreeMap<CurrencyId, u32>,
    pub votes: Vec<TransactionView>,
}

impl From<&BlockHeader> for BlockView {
    fn from(h: &BlockHeader) -> Self {
        Self {
            hash: h.hash_hex(),
            previous_hash: hex::encode(&h.previous_header_hash),
            height: h.block_height,
            timestamp: h.timestamp,
            issuer: hex::encode(&h.issuer_pub_key),
            payout: h.payout.clone(),
            ubi_receiver_count: h.ubi_receiver_count.clone(),
            votes: h.votes.iter().map(TransactionView::from).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexView {
    pub network_id: u8,
    pub best_block: Option<BlockView>,
    pub next_height: u64,
    pub accounts: usize,
    pub active_delegates: usize,
    pub pool: PoolStats,
    pub ubi_receivers: BTreeMap<CurrencyId, u32>,
}

pub fn index_view(ctx: &NodeContext) -> IndexView {
    IndexView {
        network_id: ctx.params().network_id,
        best_block: ctx.best_header().as_ref().map(BlockView::from),
        next_height: ctx.next_height(),
        accounts: ctx.account_count(),
        active_delegates: ctx.active_delegates().len(),
        pool: ctx.pool_stats(),
        ubi_receivers: ctx.ubi_receivers(),
    }
}
