//! # cinder-chain
//!
//! The blockchain coordinator for the Cinder simulator.
//!
//! This crate owns the authoritative state and wires the other components
//! together:
//! - Lifecycle (start, pause/resume, stop) and the two mining modes
//! - The serialized block-commit pipeline
//! - Snapshot/revert time travel over the whole chain state
//! - The simulated clock and its adjustment
//! - Event fan-out and per-transaction completion channels

mod blockchain;
mod clock;
mod config;
mod error;
mod events;
mod managers;
mod snapshots;

pub use blockchain::{Blockchain, Phase};
pub use clock::SimClock;
pub use config::{ChainConfig, InitialAccount};
pub use error::{ChainError, ChainResult};
pub use events::{ChainEvent, EventBus, TxWatchers};
pub use managers::{
    AccountManager, BlockLogsManager, BlockManager, ReceiptManager, TransactionManager,
};
pub use snapshots::{Snapshot, SnapshotStack};

pub use cinder_miner::MINE_ALL;
