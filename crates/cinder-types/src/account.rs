//! Account state record.

use crate::{H256, U256, EMPTY_CODE_HASH, EMPTY_TRIE_ROOT};
use rlp_derive::{RlpDecodable, RlpEncodable};

/// An account as stored in the state trie.
#[derive(Debug, Clone, PartialEq, Eq, RlpEncodable, RlpDecodable)]
pub struct Account {
    /// Number of transactions sent from this account.
    pub nonce: u64,
    /// Balance in wei.
    pub balance: U256,
    /// Root of the account's storage trie.
    pub storage_root: H256,
    /// Hash of the account's code.
    pub code_hash: H256,
}

impl Account {
    /// Create a fresh account with the given balance and nonce.
    pub fn new(balance: U256, nonce: u64) -> Self {
        Self {
            nonce,
            balance,
            storage_root: EMPTY_TRIE_ROOT,
            code_hash: EMPTY_CODE_HASH,
        }
    }

    /// Check whether the account holds code.
    pub fn has_code(&self) -> bool {
        self.code_hash != EMPTY_CODE_HASH
    }
}

impl Default for Account {
    fn default() -> Self {
        Self::new(U256::zero(), 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn account_rlp_round_trip() {
        let account = Account::new(U256::from(1_000_000u64), 7);
        let encoded = rlp::encode(&account);
        let decoded: Account = rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, account);
    }

    #[test]
    fn fresh_account_has_empty_roots() {
        let account = Account::default();
        assert_eq!(account.storage_root, EMPTY_TRIE_ROOT);
        assert!(!account.has_code());
    }
}
