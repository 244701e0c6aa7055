//! Shared builders for integration tests.

use cinder_chain::{Blockchain, ChainConfig, ChainEvent, InitialAccount};
use cinder_types::{Address, Block, Transaction, UnsignedTransaction, U256};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Genesis timestamp used across scenarios: 2020-01-01T00:00:00Z.
pub const GENESIS_TIME: i64 = 1_577_836_800;

/// Default funding for generated accounts.
pub const FUNDING: u64 = 10_000_000;

/// Deterministic secret key from a fill byte.
pub fn secret(fill: u8) -> libsecp256k1::SecretKey {
    libsecp256k1::SecretKey::parse(&[fill; 32]).expect("non-zero fill bytes are valid keys")
}

/// Address controlled by `key`.
pub fn address_for(key: &libsecp256k1::SecretKey) -> Address {
    cinder_types::address_of(&libsecp256k1::PublicKey::from_secret_key(key))
}

/// A signed 21k-gas value transfer to a fixed sink address.
pub fn transfer(nonce: u64, value: u64, key: &libsecp256k1::SecretKey) -> Transaction {
    transfer_with_gas(nonce, value, 1, 21_000, key)
}

/// A signed value transfer with explicit gas price and limit.
pub fn transfer_with_gas(
    nonce: u64,
    value: u64,
    gas_price: u64,
    gas_limit: u64,
    key: &libsecp256k1::SecretKey,
) -> Transaction {
    UnsignedTransaction {
        nonce,
        gas_price: U256::from(gas_price),
        gas_limit,
        to: Some(Address::repeat_byte(0xee)),
        value: U256::from(value),
        data: Vec::new(),
    }
    .sign(key)
}

/// A chain configuration with `GENESIS_TIME` and the given funded keys.
pub fn config_for(keys: &[&libsecp256k1::SecretKey]) -> ChainConfig {
    let mut config = ChainConfig::new(Address::repeat_byte(0xc0));
    config.time = Some(GENESIS_TIME);
    config.initial_accounts = keys
        .iter()
        .map(|key| InitialAccount {
            address: address_for(key),
            balance: U256::from(FUNDING),
            nonce: 0,
        })
        .collect();
    config
}

/// Start an instant-mining chain with the given funded keys.
pub async fn funded_chain(keys: &[&libsecp256k1::SecretKey]) -> Arc<Blockchain> {
    Blockchain::start(config_for(keys)).await.expect("chain starts")
}

/// Await the next committed block, skipping unrelated events.
pub async fn next_block(events: &mut broadcast::Receiver<ChainEvent>) -> Arc<Block> {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await.expect("event bus stays open") {
                ChainEvent::Block(block) => return block,
                _ => continue,
            }
        }
    })
    .await
    .expect("a block should have been committed")
}

/// Assert no block lands within `window`.
pub async fn assert_no_block(events: &mut broadcast::Receiver<ChainEvent>, window: Duration) {
    let waited = tokio::time::timeout(window, async {
        loop {
            match events.recv().await {
                Ok(ChainEvent::Block(block)) => return block,
                Ok(_) => {}
                Err(_) => std::future::pending::<()>().await,
            }
        }
    })
    .await;
    assert!(waited.is_err(), "unexpected block was committed");
}
