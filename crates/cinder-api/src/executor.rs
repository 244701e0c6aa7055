//! The dispatch executor.

use crate::{ApiError, ApiResult};
use cinder_chain::Blockchain;
use cinder_types::Transaction;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

/// The declared method set of the blockchain's public surface. Dispatch
/// never resolves names outside this list.
const METHODS: &[&str] = &[
    "isMining",
    "mine",
    "pause",
    "resume",
    "snapshot",
    "revert",
    "increaseTime",
    "setTime",
    "queueTransaction",
    "simulateTransaction",
    "stop",
];

/// Whitelisted dispatch into a [`Blockchain`].
pub struct Executor {
    chain: Arc<Blockchain>,
}

impl Executor {
    pub fn new(chain: Arc<Blockchain>) -> Self {
        Self { chain }
    }

    /// Execute `method` with positional `params`.
    ///
    /// The method value must be a string, must not be `"constructor"`, and
    /// must be one of the declared methods; otherwise dispatch fails with
    /// `Invalid or unsupported method: <name>`.
    pub async fn execute(&self, method: &Value, params: &Value) -> ApiResult<Value> {
        let name = method
            .as_str()
            .ok_or_else(|| ApiError::InvalidMethod(method.to_string()))?;
        if name == "constructor" || !METHODS.contains(&name) {
            return Err(ApiError::InvalidMethod(name.to_string()));
        }
        debug!(method = name, "Dispatching");

        match name {
            "isMining" => Ok(json!(self.chain.is_mining())),
            "mine" => {
                let max_transactions = opt_param(params, 0)
                    .map(as_i64)
                    .transpose()?
                    .unwrap_or(cinder_chain::MINE_ALL);
                let timestamp = opt_param(params, 1).map(as_u64).transpose()?;
                let block = self.chain.mine(max_transactions, timestamp).await?;
                Ok(json!({
                    "number": block.number(),
                    "hash": hex_of(block.hash()),
                }))
            }
            "pause" => {
                self.chain.pause();
                Ok(Value::Null)
            }
            "resume" => {
                // an optional thread-count parameter is reserved and ignored
                self.chain.resume();
                Ok(Value::Null)
            }
            "snapshot" => Ok(json!(self.chain.snapshot())),
            "revert" => {
                let id = match opt_param(params, 0) {
                    None | Some(Value::Null) => return Err(ApiError::InvalidSnapshotId),
                    Some(value) => as_u64(value)?,
                };
                Ok(json!(self.chain.revert(id).await?))
            }
            "increaseTime" => {
                let seconds = as_i64(require_param(params, 0, "seconds")?)?;
                Ok(json!(self.chain.increase_time(seconds)))
            }
            "setTime" => {
                let time = as_i64(require_param(params, 0, "time")?)?;
                Ok(json!(self.chain.set_time(time)))
            }
            "queueTransaction" => {
                let tx = decode_raw_tx(require_param(params, 0, "raw transaction")?)?;
                let hash = self.chain.queue_transaction(tx).await?;
                Ok(json!(hex_of(hash)))
            }
            "simulateTransaction" => {
                let tx = decode_raw_tx(require_param(params, 0, "raw transaction")?)?;
                let parent = match opt_param(params, 1) {
                    Some(value) => {
                        let number = as_u64(value)?;
                        self.chain
                            .get_block_by_number(number)?
                            .ok_or_else(|| {
                                ApiError::InvalidParams(format!("unknown block {number}"))
                            })?
                            .header
                    }
                    None => self.chain.latest_block().header.clone(),
                };
                let mut pending = parent.clone();
                pending.parent_hash = parent.hash();
                pending.number += 1;
                pending.timestamp = self.chain.current_time();

                let outcome =
                    self.chain
                        .simulate_transaction(&tx, &parent, &pending, None)?;
                Ok(json!({
                    "status": outcome.status,
                    "gasUsed": outcome.gas_used,
                    "contractAddress": outcome.contract_address.map(hex_of),
                    "error": outcome.error.map(|err| err.to_string()),
                }))
            }
            "stop" => {
                self.chain.stop().await;
                Ok(Value::Null)
            }
            _ => unreachable!("name was checked against the declared set"),
        }
    }
}

fn opt_param(params: &Value, index: usize) -> Option<&Value> {
    params.as_array().and_then(|array| array.get(index))
}

fn require_param<'a>(params: &'a Value, index: usize, what: &str) -> ApiResult<&'a Value> {
    opt_param(params, index)
        .filter(|value| !value.is_null())
        .ok_or_else(|| ApiError::InvalidParams(format!("missing {what}")))
}

fn as_u64(value: &Value) -> ApiResult<u64> {
    if let Some(number) = value.as_u64() {
        return Ok(number);
    }
    if let Some(text) = value.as_str() {
        let digits = text.strip_prefix("0x").unwrap_or(text);
        let radix = if text.starts_with("0x") { 16 } else { 10 };
        if let Ok(number) = u64::from_str_radix(digits, radix) {
            return Ok(number);
        }
    }
    Err(ApiError::InvalidParams(format!("expected quantity, got {value}")))
}

fn as_i64(value: &Value) -> ApiResult<i64> {
    value
        .as_i64()
        .ok_or_else(|| ApiError::InvalidParams(format!("expected integer, got {value}")))
}

fn decode_raw_tx(value: &Value) -> ApiResult<Transaction> {
    let text = value
        .as_str()
        .ok_or_else(|| ApiError::InvalidParams("raw transaction must be a hex string".into()))?;
    let bytes = hex::decode(text.strip_prefix("0x").unwrap_or(text))
        .map_err(|err| ApiError::InvalidParams(format!("bad hex: {err}")))?;
    rlp::decode(&bytes).map_err(|err| ApiError::InvalidParams(format!("bad transaction: {err}")))
}

fn hex_of(hash: impl AsRef<[u8]>) -> String {
    format!("0x{}", hex::encode(hash.as_ref()))
}
