use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use ubic_core::{Vote, VoteAction};

/// Delegate record: block-production candidate ranked by received votes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Delegate {
    pub public_key: Vec<u8>,
    /// Anti-replay counter for vote transactions signed by this delegate
    pub nonce: u64,
    /// Current vote weight (genesis seed + outstanding votes)
    pub total_vote: u64,
    pub vote_count: u64,
    pub unvote_count: u64,
    /// Ballots received, in application order (audit history)
    pub votes: Vec<Vote>,
    /// Outstanding votes per voter, maintained by `receive`
    pub outstanding_votes: BTreeMap<Vec<u8>, u64>,
    /// Hash of the last block in which this delegate cast a vote
    pub block_hash_last_vote: Vec<u8>,
}

impl Delegate {
    pub fn new(public_key: Vec<u8>) -> Self {
        Self {
            public_key,
            nonce: 0,
            total_vote: 0,
            vote_count: 0,
            unvote_count: 0,
            votes: Vec::new(),
            outstanding_votes: BTreeMap::new(),
            block_hash_last_vote: Vec::new(),
        }
    }

    /// Outstanding votes from `voter`
    pub fn net_votes_from(&self, voter: &[u8]) -> u64 {
        self.outstanding_votes.get(voter).copied().unwrap_or(0)
    }

    /// Record a received ballot and adjust the weight
    pub fn receive(&mut self, vote: Vote) {
        match vote.action {
            VoteAction::Vote => {
                self.vote_count += 1;
                self.total_vote = self.total_vote.saturating_add(1);
                *self
                    .outstanding_votes
                    .entry(vote.from_pub_key.clone())
                    .or_insert(0) += 1;
            }
            VoteAction::Unvote => {
                self.unvote_count += 1;
                self.total_vote = self.total_vote.saturating_sub(1);
                if let Some(count) = self.outstanding_votes.get_mut(&vote.from_pub_key) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        self.outstanding_votes.remove(&vote.from_pub_key);
                    }
                }
            }
        }
        self.votes.push(vote);
    }
}
