//! Snapshot stack for chain-wide time travel.

use cinder_types::H256;
use parking_lot::Mutex;

/// A revert target: the chain tip, the state root and the clock adjustment
/// captured when the snapshot was taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub block_hash: H256,
    pub state_root: H256,
    pub time_offset: i64,
}

/// Ordered stack of snapshots. A snapshot's ordinal is one plus its index.
///
/// The stack grows without bound; snapshots cost three words plus two
/// hashes each and are dropped wholesale on revert, so no cap is imposed.
#[derive(Default)]
pub struct SnapshotStack {
    stack: Mutex<Vec<Snapshot>>,
}

impl SnapshotStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a snapshot, returning its 1-based ordinal.
    pub fn push(&self, snapshot: Snapshot) -> u64 {
        let mut stack = self.stack.lock();
        stack.push(snapshot);
        stack.len() as u64
    }

    /// Truncate the stack at `ordinal` and return the snapshot it named.
    ///
    /// `None` when the ordinal is zero or beyond the stack: out-of-range
    /// reverts report `false` rather than failing.
    pub fn take_from(&self, ordinal: u64) -> Option<Snapshot> {
        if ordinal == 0 {
            return None;
        }
        let index = (ordinal - 1) as usize;
        let mut stack = self.stack.lock();
        if index >= stack.len() {
            return None;
        }
        let mut removed = stack.split_off(index);
        Some(removed.swap_remove(0))
    }

    pub fn len(&self) -> usize {
        self.stack.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(fill: u8) -> Snapshot {
        Snapshot {
            block_hash: H256::repeat_byte(fill),
            state_root: H256::repeat_byte(fill),
            time_offset: fill as i64,
        }
    }

    #[test]
    fn ordinals_are_one_based() {
        let stack = SnapshotStack::new();
        assert_eq!(stack.push(snapshot(1)), 1);
        assert_eq!(stack.push(snapshot(2)), 2);
        assert_eq!(stack.push(snapshot(3)), 3);
    }

    #[test]
    fn take_from_truncates_above() {
        let stack = SnapshotStack::new();
        stack.push(snapshot(1));
        stack.push(snapshot(2));
        stack.push(snapshot(3));

        let taken = stack.take_from(2).unwrap();
        assert_eq!(taken, snapshot(2));
        assert_eq!(stack.len(), 1);

        // ordinal 2 is gone now
        assert_eq!(stack.take_from(2), None);
    }

    #[test]
    fn out_of_range_ordinals_return_none() {
        let stack = SnapshotStack::new();
        assert_eq!(stack.take_from(0), None);
        assert_eq!(stack.take_from(1), None);

        stack.push(snapshot(1));
        assert_eq!(stack.take_from(5), None);
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn ordinals_restart_after_truncation() {
        let stack = SnapshotStack::new();
        stack.push(snapshot(1));
        stack.push(snapshot(2));
        stack.take_from(1).unwrap();
        assert_eq!(stack.push(snapshot(3)), 1);
    }
}
