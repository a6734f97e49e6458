// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - DELEGATED CONSENSUS
//
// Delegates are elected by votes cast by the current active delegates. The
// top-N by vote weight form the active set, and block issuance rotates over
// that set one slot at a time. Every node derives the same set and the same
// schedule from the same vote history.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod delegate;
pub mod schedule;
pub mod vote_store;

pub use delegate::Delegate;
pub use vote_store::VoteStore;
