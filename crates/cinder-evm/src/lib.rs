//! # cinder-evm
//!
//! Transaction execution for the Cinder simulator.
//!
//! This crate pins down the executor interface the blockchain core runs
//! against:
//! - [`AccountState`]: the mutable world-state view over the state trie
//! - [`BlockEnv`]: the block context a transaction executes in
//! - [`Evm`]: the executor itself, with skip switches and a per-step hook
//!
//! The executor implements native value transfers with full gas accounting.
//! Bytecode interpretation is intentionally out of scope; the interface is
//! shaped so a full interpreter can slot in behind it.

mod error;
mod evm;
mod state;

pub use error::{EvmError, EvmResult, VmError};
pub use evm::{BlockEnv, Evm, EvmStep, ExecOptions, ExecOutcome, GetBlockFn, Hardfork};
pub use state::AccountState;
