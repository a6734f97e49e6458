// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - DELEGATE / VOTE STORE
//
// Vote tallies per delegate, the derived active set, and the issuer schedule.
//
// Rules:
//   - only active delegates may cast ballots
//   - VOTE for an unknown key nominates it as a new delegate
//   - a voter holds at most one outstanding vote per target
//   - UNVOTE requires an outstanding vote from the same voter
//   - the active set is recomputed after every applied ballot
// Replay protection is the voter nonce, checked again at apply time.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use crate::delegate::Delegate;
use crate::schedule::{issuer_index, rank_delegates};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ubic_core::{ConsensusParams, Effects, ValidationError, Vote, VoteAction};
use ubic_crypto::short_hex;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteStore {
    params: ConsensusParams,
    delegates: BTreeMap<Vec<u8>, Delegate>,
    /// Derived: ranked public keys of the active set
    active: Vec<Vec<u8>>,
}

impl VoteStore {
    pub fn new(params: ConsensusParams) -> Self {
        Self {
            params,
            delegates: BTreeMap::new(),
            active: Vec::new(),
        }
    }

    /// Rebuild from persisted delegate records; the active set is derived
    pub fn from_delegates<I: IntoIterator<Item = Delegate>>(params: ConsensusParams, delegates: I) -> Self {
        let mut store = Self::new(params);
        for d in delegates {
            store.delegates.insert(d.public_key.clone(), d);
        }
        store.recompute_active();
        store
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    /// Seed a delegate with weight 1 so the network has issuers at height 0
    pub fn register_genesis_delegate(&mut self, public_key: Vec<u8>) {
        let delegate = self
            .delegates
            .entry(public_key.clone())
            .or_insert_with(|| Delegate::new(public_key));
        if delegate.total_vote == 0 {
            delegate.total_vote = 1;
        }
        self.recompute_active();
    }

    pub fn delegate(&self, public_key: &[u8]) -> Option<&Delegate> {
        self.delegates.get(public_key)
    }

    pub fn delegates(&self) -> impl Iterator<Item = &Delegate> {
        self.delegates.values()
    }

    fn recompute_active(&mut self) {
        self.active = rank_delegates(self.delegates.values(), self.params.active_delegate_count);
    }

    /// Ranked active set (top-N by weight, key ascending on ties)
    pub fn active_delegates(&self) -> &[Vec<u8>] {
        &self.active
    }

    pub fn is_active(&self, public_key: &[u8]) -> bool {
        self.active.iter().any(|k| k == public_key)
    }

    /// The single active delegate allowed to issue the block at `timestamp`
    pub fn validator_for_timestamp(&self, timestamp: u64) -> Option<&[u8]> {
        issuer_index(timestamp, self.params.slot_duration_secs, self.active.len())
            .map(|i| self.active[i].as_slice())
    }

    /// Ballot rules against current state (no nonce or signature checks)
    pub fn check_vote(&self, voter: &[u8], vote: &Vote) -> Result<(), ValidationError> {
        if !self.is_active(voter) {
            return Err(ValidationError::NotEligibleValidator);
        }
        let outstanding = self
            .delegates
            .get(&vote.target_pub_key)
            .map(|d| d.net_votes_from(voter))
            .unwrap_or(0);
        match vote.action {
            VoteAction::Vote if outstanding > 0 => Err(ValidationError::NotEligibleValidator),
            VoteAction::Unvote if outstanding == 0 => Err(ValidationError::NotEligibleValidator),
            _ => Ok(()),
        }
    }

    /// Apply the vote part of a validated effect. `block_hash` is recorded as
    /// the voter's last-voted block.
    pub fn apply(&mut self, effects: &Effects, block_hash: &[u8]) -> Result<(), ValidationError> {
        let (voter, expected_nonce, vote) = match effects {
            Effects::Vote {
                voter,
                expected_nonce,
                vote,
            } => (voter, *expected_nonce, vote),
            _ => return Ok(()),
        };

        let current = self
            .delegates
            .get(voter)
            .ok_or(ValidationError::NotEligibleValidator)?
            .nonce;
        if current != expected_nonce {
            return Err(ValidationError::StaleNonce {
                expected: current,
                got: expected_nonce,
            });
        }
        self.check_vote(voter, vote)?;

        self.delegates
            .entry(vote.target_pub_key.clone())
            .or_insert_with(|| Delegate::new(vote.target_pub_key.clone()))
            .receive(vote.clone());

        if let Some(d) = self.delegates.get_mut(voter) {
            d.nonce += 1;
            d.block_hash_last_vote = block_hash.to_vec();
        }

        self.recompute_active();
        debug!(
            "Votes: {:?} {} -> {} (active set {})",
            vote.action,
            short_hex(voter, 12),
            short_hex(&vote.target_pub_key, 12),
            self.active.len()
        );
        Ok(())
    }
}
