// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// UBIC - NODE
//
// Transaction validation, the pending pool, block assembly and commit over
// the core stores, sled persistence, and transaction builders for wallets.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod builder;
pub mod context;
pub mod db;
pub mod error;
pub mod logger;
pub mod tx_pool;
pub mod validator;
pub mod views;
pub mod wallet;

pub use builder::{BuildError, PassportReader, PaymentRequest, Wallet};
pub use context::{NodeContext, UbiStatus};
pub use db::{StateDb, StateSnapshot};
pub use error::{CommitError, StoreError};
pub use tx_pool::{PoolEntry, PoolStats, TxPool};
pub use validator::{deactivation_message, validate};
pub use wallet::MemoryWallet;
