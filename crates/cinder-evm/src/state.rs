//! World-state view over the state trie.

use crate::{EvmError, EvmResult};
use cinder_storage::WriteBatch;
use cinder_trie::MerkleTrie;
use cinder_types::{keccak, Account, Address, H256, U256};

/// Mutable account state backed by the Merkle-Patricia trie.
///
/// Accounts are keyed by the keccak of their address, so the trie shape
/// leaks nothing about address distribution. Checkpoints nest and delegate
/// to the trie's savepoints.
pub struct AccountState {
    trie: MerkleTrie,
}

impl AccountState {
    pub fn new(trie: MerkleTrie) -> Self {
        Self { trie }
    }

    /// Current state root.
    pub fn root(&self) -> H256 {
        self.trie.root()
    }

    /// Look up an account, if present.
    pub fn get_account(&self, address: &Address) -> EvmResult<Option<Account>> {
        match self.trie.get(trie_key(address).as_bytes())? {
            Some(encoded) => Ok(Some(
                rlp::decode(&encoded).map_err(EvmError::CorruptAccount)?,
            )),
            None => Ok(None),
        }
    }

    /// Look up an account, defaulting to an empty one.
    pub fn account_or_default(&self, address: &Address) -> EvmResult<Account> {
        Ok(self.get_account(address)?.unwrap_or_default())
    }

    /// Write an account record.
    pub fn put_account(&mut self, address: &Address, account: &Account) -> EvmResult<()> {
        self.trie
            .insert(trie_key(address).as_bytes(), rlp::encode(account).to_vec())?;
        Ok(())
    }

    /// Remove an account record. Returns whether it existed.
    pub fn remove_account(&mut self, address: &Address) -> EvmResult<bool> {
        Ok(self.trie.remove(trie_key(address).as_bytes())?)
    }

    pub fn balance(&self, address: &Address) -> EvmResult<U256> {
        Ok(self.account_or_default(address)?.balance)
    }

    pub fn nonce(&self, address: &Address) -> EvmResult<u64> {
        Ok(self.account_or_default(address)?.nonce)
    }

    /// Credit `amount` to an account, creating it if absent.
    pub fn add_balance(&mut self, address: &Address, amount: U256) -> EvmResult<()> {
        let mut account = self.account_or_default(address)?;
        account.balance = account.balance.saturating_add(amount);
        self.put_account(address, &account)
    }

    /// Open a nestable savepoint.
    pub fn checkpoint(&mut self) {
        self.trie.checkpoint();
    }

    /// Keep everything since the most recent savepoint.
    pub fn commit_checkpoint(&mut self) -> EvmResult<()> {
        Ok(self.trie.commit_checkpoint()?)
    }

    /// Drop everything since the most recent savepoint.
    pub fn revert_checkpoint(&mut self) -> EvmResult<()> {
        Ok(self.trie.revert_checkpoint()?)
    }

    /// Number of open savepoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.trie.checkpoint_depth()
    }

    /// Repoint the state at a previously committed root.
    ///
    /// Fails while a savepoint is open; revert callers must quiesce first.
    pub fn set_state_root(&mut self, root: H256) -> EvmResult<()> {
        Ok(self.trie.set_root(root)?)
    }

    /// Fold pending trie nodes into `batch`.
    pub fn commit(&mut self, batch: &mut WriteBatch) -> EvmResult<()> {
        Ok(self.trie.commit(batch)?)
    }
}

fn trie_key(address: &Address) -> H256 {
    keccak(address.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_storage::MemoryDatabase;
    use std::sync::Arc;

    fn fresh() -> AccountState {
        AccountState::new(MerkleTrie::empty(Arc::new(MemoryDatabase::new())))
    }

    #[test]
    fn put_and_get_account() {
        let mut state = fresh();
        let address = Address::repeat_byte(0xaa);
        assert_eq!(state.get_account(&address).unwrap(), None);

        let account = Account::new(U256::from(100u64), 0);
        state.put_account(&address, &account).unwrap();
        assert_eq!(state.get_account(&address).unwrap(), Some(account));
        assert_eq!(state.balance(&address).unwrap(), U256::from(100u64));
        assert_eq!(state.nonce(&address).unwrap(), 0);
    }

    #[test]
    fn missing_account_defaults_to_empty() {
        let state = fresh();
        let account = state
            .account_or_default(&Address::repeat_byte(0x01))
            .unwrap();
        assert_eq!(account.balance, U256::zero());
        assert_eq!(account.nonce, 0);
    }

    #[test]
    fn savepoint_revert_undoes_writes() {
        let mut state = fresh();
        let address = Address::repeat_byte(0xbb);
        state
            .put_account(&address, &Account::new(U256::from(1u64), 0))
            .unwrap();
        let root = state.root();

        state.checkpoint();
        state.add_balance(&address, U256::from(9u64)).unwrap();
        assert_eq!(state.balance(&address).unwrap(), U256::from(10u64));

        state.revert_checkpoint().unwrap();
        assert_eq!(state.root(), root);
        assert_eq!(state.balance(&address).unwrap(), U256::from(1u64));
    }

    #[test]
    fn deterministic_root_for_same_accounts() {
        let mut a = fresh();
        let mut b = fresh();
        let one = Address::repeat_byte(0x01);
        let two = Address::repeat_byte(0x02);

        a.put_account(&one, &Account::new(U256::from(5u64), 1)).unwrap();
        a.put_account(&two, &Account::new(U256::from(7u64), 2)).unwrap();
        b.put_account(&two, &Account::new(U256::from(7u64), 2)).unwrap();
        b.put_account(&one, &Account::new(U256::from(5u64), 1)).unwrap();

        assert_eq!(a.root(), b.root());
    }
}
