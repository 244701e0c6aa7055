//! Chain configuration.

use cinder_types::{Address, Gas, U256};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default block gas ceiling.
pub const DEFAULT_GAS_LIMIT: Gas = 6_721_975;

/// Default chain id.
pub const DEFAULT_CHAIN_ID: u64 = 1337;

/// An account committed into the genesis state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialAccount {
    pub address: Address,
    pub balance: U256,
    #[serde(default)]
    pub nonce: u64,
}

/// Complete chain configuration.
///
/// `coinbase` is required; everything else has a sensible default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Persistent store location. `None` runs on the in-memory backend.
    #[serde(default)]
    pub db_path: Option<PathBuf>,
    /// Accounts committed at genesis.
    #[serde(default)]
    pub initial_accounts: Vec<InitialAccount>,
    /// EVM rule-set identifier.
    #[serde(default = "default_hardfork")]
    pub hardfork: String,
    /// Disable the contract-code size cap.
    #[serde(default)]
    pub allow_unlimited_contract_size: bool,
    /// Block gas ceiling.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: Gas,
    /// Unix seconds seeding the genesis timestamp and the clock adjustment.
    #[serde(default)]
    pub time: Option<i64>,
    /// Seconds between blocks; `<= 0` or absent means instant mining.
    #[serde(default)]
    pub block_time: f64,
    /// Account receiving block fees.
    pub coinbase: Address,
    /// Chain id handed to the executor.
    #[serde(default = "default_chain_id")]
    pub chain_id: u64,
    /// Fire per-transaction completion before broadcasting the block.
    #[serde(default)]
    pub legacy_instamine: bool,
    /// Attach the transaction hash to surfaced VM errors.
    #[serde(default)]
    pub vm_errors_on_rpc_response: bool,
}

fn default_hardfork() -> String {
    "muirGlacier".to_string()
}

fn default_gas_limit() -> Gas {
    DEFAULT_GAS_LIMIT
}

fn default_chain_id() -> u64 {
    DEFAULT_CHAIN_ID
}

impl ChainConfig {
    /// Defaults with the given coinbase.
    pub fn new(coinbase: Address) -> Self {
        Self {
            db_path: None,
            initial_accounts: Vec::new(),
            hardfork: default_hardfork(),
            allow_unlimited_contract_size: false,
            gas_limit: default_gas_limit(),
            time: None,
            block_time: 0.0,
            coinbase,
            chain_id: default_chain_id(),
            legacy_instamine: false,
            vm_errors_on_rpc_response: false,
        }
    }

    /// Instant mining is in effect when no positive block time is set.
    pub fn instant_mining(&self) -> bool {
        self.block_time <= 0.0
    }
}
