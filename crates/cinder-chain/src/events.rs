//! Event fan-out and per-transaction completion channels.

use cinder_evm::{EvmStep, VmError};
use cinder_types::{Block, BlockLogs, H256};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, oneshot};

/// The closed set of observable chain events.
#[derive(Debug, Clone)]
pub enum ChainEvent {
    Started,
    Paused,
    Resumed,
    Stopped,
    /// A transaction was accepted into the pool.
    PendingTransaction(H256),
    /// A block was committed.
    Block(Arc<Block>),
    /// A block's log record was committed.
    BlockLogs(Arc<BlockLogs>),
    /// One executor step.
    Step(EvmStep),
}

/// Broadcast bus carrying [`ChainEvent`]s to any number of subscribers.
pub struct EventBus {
    sender: broadcast::Sender<ChainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Nobody listening is not an error.
    pub fn emit(&self, event: ChainEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Per-transaction one-shot completion channels keyed by hash.
///
/// Completion carries the hash; failure carries the VM error that skipped
/// the transaction during mining.
#[derive(Default)]
pub struct TxWatchers {
    inner: Mutex<HashMap<H256, Vec<oneshot::Sender<Result<H256, VmError>>>>>,
}

impl TxWatchers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in a transaction's fate.
    pub fn watch(&self, hash: H256) -> oneshot::Receiver<Result<H256, VmError>> {
        let (sender, receiver) = oneshot::channel();
        self.inner.lock().entry(hash).or_default().push(sender);
        receiver
    }

    /// Resolve all watchers of `hash` with successful inclusion.
    pub fn complete(&self, hash: H256) {
        self.resolve(hash, Ok(hash));
    }

    /// Resolve all watchers of `hash` with a mining failure.
    pub fn fail(&self, hash: H256, error: VmError) {
        self.resolve(hash, Err(error));
    }

    fn resolve(&self, hash: H256, result: Result<H256, VmError>) {
        if let Some(watchers) = self.inner.lock().remove(&hash) {
            for watcher in watchers {
                let _ = watcher.send(result.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bus_delivers_to_subscribers() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.emit(ChainEvent::Started);

        assert!(matches!(first.recv().await.unwrap(), ChainEvent::Started));
        assert!(matches!(second.recv().await.unwrap(), ChainEvent::Started));
    }

    #[tokio::test]
    async fn watcher_resolves_on_completion() {
        let watchers = TxWatchers::new();
        let hash = H256::repeat_byte(0x01);
        let receiver = watchers.watch(hash);

        watchers.complete(hash);
        assert_eq!(receiver.await.unwrap(), Ok(hash));
    }

    #[tokio::test]
    async fn watcher_resolves_on_failure() {
        let watchers = TxWatchers::new();
        let hash = H256::repeat_byte(0x02);
        let receiver = watchers.watch(hash);

        watchers.fail(
            hash,
            VmError::NonceMismatch {
                expected: 1,
                actual: 0,
            },
        );
        assert!(matches!(
            receiver.await.unwrap(),
            Err(VmError::NonceMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn unrelated_hashes_stay_pending() {
        let watchers = TxWatchers::new();
        let mut receiver = watchers.watch(H256::repeat_byte(0x03));
        watchers.complete(H256::repeat_byte(0x04));
        assert!(receiver.try_recv().is_err());
    }
}
