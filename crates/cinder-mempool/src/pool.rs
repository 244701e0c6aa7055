//! Transaction pool implementation.

use crate::{MempoolError, MempoolResult, DEFAULT_MAX_TRANSACTIONS};
use cinder_evm::AccountState;
use cinder_types::{Address, Transaction, H256};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of pooled transactions.
    pub max_transactions: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_transactions: DEFAULT_MAX_TRANSACTIONS,
        }
    }
}

/// A pooled transaction with its arrival sequence number.
#[derive(Debug, Clone)]
pub struct PooledTransaction {
    pub tx: Transaction,
    /// Monotonic arrival counter, used for price ties.
    pub arrival: u64,
}

/// One sender's executable run, nonce-ascending.
#[derive(Debug, Clone)]
pub struct SenderQueue {
    pub sender: Address,
    pub transactions: Vec<PooledTransaction>,
}

struct PoolInner {
    /// Pending transactions per sender, keyed by nonce.
    by_sender: HashMap<Address, BTreeMap<u64, PooledTransaction>>,
    /// Hash index into `by_sender`.
    by_hash: HashMap<H256, (Address, u64)>,
    arrival_seq: u64,
}

impl PoolInner {
    fn len(&self) -> usize {
        self.by_hash.len()
    }
}

/// The pending-transaction pool.
///
/// A transaction is *executable* when its nonce continues the unbroken run
/// starting at its sender's account nonce; the rest are future transactions
/// waiting for the gap to close. The pool signals `drain` whenever the
/// executable set becomes non-empty, and again when consumption leaves
/// executables behind.
pub struct TxPool {
    config: PoolConfig,
    state: Arc<Mutex<AccountState>>,
    inner: Mutex<PoolInner>,
    drain: Notify,
}

impl TxPool {
    pub fn new(config: PoolConfig, state: Arc<Mutex<AccountState>>) -> Self {
        Self {
            config,
            state,
            inner: Mutex::new(PoolInner {
                by_sender: HashMap::new(),
                by_hash: HashMap::new(),
                arrival_seq: 0,
            }),
            drain: Notify::new(),
        }
    }

    /// The notification fired when executables become available.
    pub fn drain_signal(&self) -> &Notify {
        &self.drain
    }

    /// Number of pooled transactions.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.inner.lock().by_hash.contains_key(hash)
    }

    /// Admit a transaction. Returns its hash.
    pub fn push(&self, tx: Transaction) -> MempoolResult<H256> {
        let hash = tx.hash();
        let sender = tx.from();

        let account = self.state.lock().account_or_default(&sender)?;
        if tx.nonce < account.nonce {
            return Err(MempoolError::NonceTooLow {
                expected: account.nonce,
                actual: tx.nonce,
            });
        }
        if account.balance < tx.upfront_cost() {
            return Err(MempoolError::InsufficientFunds {
                balance: account.balance,
                required: tx.upfront_cost(),
            });
        }

        let mut inner = self.inner.lock();
        if inner.by_hash.contains_key(&hash) {
            return Err(MempoolError::AlreadyKnown(hash));
        }

        let replacing = inner
            .by_sender
            .get(&sender)
            .and_then(|queue| queue.get(&tx.nonce))
            .map(|pooled| (pooled.tx.hash(), pooled.tx.gas_price));
        match replacing {
            Some((_, pooled_price)) if tx.gas_price <= pooled_price => {
                return Err(MempoolError::ReplacementUnderpriced {
                    pooled: pooled_price,
                    offered: tx.gas_price,
                });
            }
            Some((old_hash, _)) => {
                inner.by_hash.remove(&old_hash);
            }
            None => {
                if inner.len() >= self.config.max_transactions {
                    return Err(MempoolError::Full {
                        count: inner.len(),
                        max: self.config.max_transactions,
                    });
                }
            }
        }

        let arrival = inner.arrival_seq;
        inner.arrival_seq += 1;
        inner.by_hash.insert(hash, (sender, tx.nonce));
        let nonce = tx.nonce;
        inner
            .by_sender
            .entry(sender)
            .or_default()
            .insert(nonce, PooledTransaction { tx, arrival });

        let executable = nonce_run_contains(
            inner.by_sender.get(&sender).expect("just inserted"),
            account.nonce,
            nonce,
        );
        drop(inner);

        debug!(tx = ?hash, ?sender, nonce, executable, "Transaction pooled");
        if executable {
            self.drain.notify_one();
        }
        Ok(hash)
    }

    /// Per-sender executable runs: for each sender, the unbroken nonce run
    /// starting at the account nonce.
    pub fn executables(&self) -> Vec<SenderQueue> {
        let state = self.state.lock();
        let inner = self.inner.lock();
        let mut queues = Vec::new();
        for (sender, queue) in &inner.by_sender {
            let start = match state.nonce(sender) {
                Ok(nonce) => nonce,
                Err(_) => continue,
            };
            let mut run = Vec::new();
            let mut expected = start;
            while let Some(pooled) = queue.get(&expected) {
                run.push(pooled.clone());
                expected += 1;
            }
            if !run.is_empty() {
                queues.push(SenderQueue {
                    sender: *sender,
                    transactions: run,
                });
            }
        }
        queues
    }

    /// Whether any transaction is currently executable.
    pub fn has_executables(&self) -> bool {
        !self.executables().is_empty()
    }

    /// Drop consumed transactions after a block lands. Re-signals `drain`
    /// when executables remain.
    pub fn remove_confirmed(&self, hashes: impl IntoIterator<Item = H256>) {
        let mut inner = self.inner.lock();
        for hash in hashes {
            if let Some((sender, nonce)) = inner.by_hash.remove(&hash) {
                if let Some(queue) = inner.by_sender.get_mut(&sender) {
                    queue.remove(&nonce);
                    if queue.is_empty() {
                        inner.by_sender.remove(&sender);
                    }
                }
            }
        }
        drop(inner);

        if self.has_executables() {
            self.drain.notify_one();
        }
    }

    /// Drop every pooled transaction.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.by_sender.clear();
        inner.by_hash.clear();
    }
}

/// Whether `nonce` sits inside the unbroken run starting at `start`.
fn nonce_run_contains(queue: &BTreeMap<u64, PooledTransaction>, start: u64, nonce: u64) -> bool {
    if nonce < start {
        return false;
    }
    (start..=nonce).all(|n| queue.contains_key(&n))
}
