//! # cinder-types
//!
//! Core chain types for the Cinder simulator.
//!
//! This crate provides:
//! - Account, transaction, block, receipt and log structures
//! - RLP encodings used for persistence and hashing
//! - Keccak-256 helpers and the canonical empty-root constants
//! - Sender recovery for signed transactions

mod account;
mod block;
mod error;
mod receipt;
mod transaction;

pub use account::Account;
pub use block::{Block, BlockHeader};
pub use error::{TypesError, TypesResult};
pub use receipt::{BlockLogs, Log, LogEntry, Receipt};
pub use transaction::{address_of, StoredTransaction, Transaction, UnsignedTransaction};

use sha3::{Digest, Keccak256};

/// 20-byte account address.
pub type Address = primitive_types::H160;

/// 32-byte hash.
pub type H256 = primitive_types::H256;

/// 256-bit unsigned integer.
pub type U256 = primitive_types::U256;

/// Gas amount.
pub type Gas = u64;

/// Root hash of an empty Merkle-Patricia trie: `keccak256(rlp(""))`.
pub const EMPTY_TRIE_ROOT: H256 = primitive_types::H256(hex_literal(
    "56e81f171bcc55a6ff8345e692c0f86e5b48e01b996cadc001622fb5e363b421",
));

/// Hash of empty account code: `keccak256("")`.
pub const EMPTY_CODE_HASH: H256 = primitive_types::H256(hex_literal(
    "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
));

/// Compute the Keccak-256 digest of `data`.
pub fn keccak(data: impl AsRef<[u8]>) -> H256 {
    H256::from_slice(Keccak256::digest(data.as_ref()).as_slice())
}

/// Decode a 64-character hex string into 32 bytes at compile time.
const fn hex_literal(s: &str) -> [u8; 32] {
    const fn nibble(b: u8) -> u8 {
        match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => b - b'a' + 10,
            b'A'..=b'F' => b - b'A' + 10,
            _ => panic!("invalid hex digit"),
        }
    }
    let bytes = s.as_bytes();
    assert!(bytes.len() == 64);
    let mut out = [0u8; 32];
    let mut i = 0;
    while i < 32 {
        out[i] = (nibble(bytes[2 * i]) << 4) | nibble(bytes[2 * i + 1]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_constants_match_keccak() {
        assert_eq!(keccak(rlp::NULL_RLP), EMPTY_TRIE_ROOT);
        assert_eq!(keccak([]), EMPTY_CODE_HASH);
    }

    #[test]
    fn keccak_known_vector() {
        // keccak256("hello") from the reference implementation
        assert_eq!(
            hex::encode(keccak(b"hello")),
            "1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }
}
