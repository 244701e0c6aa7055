//! Signed transactions and their persisted form.

use crate::{keccak, Address, Gas, TypesError, TypesResult, H256, U256};
use once_cell::sync::Lazy;
use rlp::{DecoderError, Rlp, RlpStream};
use sha3::{Digest, Keccak256};

static SECP256K1_N: Lazy<U256> = Lazy::new(|| {
    U256::from_big_endian(
        &hex::decode("fffffffffffffffffffffffffffffffebaaedce6af48a03bbfd25e8cd0364141")
            .expect("static curve order"),
    )
});

static SECP256K1_HALF_N: Lazy<U256> = Lazy::new(|| *SECP256K1_N / 2);

/// Transaction fields prior to signing.
#[derive(Debug, Clone, Default)]
pub struct UnsignedTransaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: Gas,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
}

impl UnsignedTransaction {
    /// Hash signed by the sender: `keccak256(rlp([nonce, gasPrice, gasLimit, to, value, data]))`.
    pub fn sig_hash(&self) -> H256 {
        let mut stream = RlpStream::new_list(6);
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit);
        match &self.to {
            Some(addr) => stream.append(addr),
            None => stream.append_empty_data(),
        }
        .append(&self.value)
        .append(&self.data);
        keccak(stream.out())
    }

    /// Sign with `secret`, producing a transaction whose sender is the
    /// address derived from the secret key.
    pub fn sign(self, secret: &libsecp256k1::SecretKey) -> Transaction {
        let digest = self.sig_hash();
        let message = libsecp256k1::Message::parse_slice(digest.as_bytes())
            .expect("32-byte digest is a valid message");
        let (signature, recovery_id) = libsecp256k1::sign(&message, secret);
        let from = address_of(&libsecp256k1::PublicKey::from_secret_key(secret));
        Transaction {
            nonce: self.nonce,
            gas_price: self.gas_price,
            gas_limit: self.gas_limit,
            to: self.to,
            value: self.value,
            data: self.data,
            v: 27 + recovery_id.serialize() as u64,
            r: U256::from_big_endian(&signature.r.b32()),
            s: U256::from_big_endian(&signature.s.b32()),
            from,
        }
    }
}

/// A signed transaction.
///
/// The sender address is recovered from the signature when the transaction
/// is constructed or decoded, and cached for the transaction's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas_limit: Gas,
    pub to: Option<Address>,
    pub value: U256,
    pub data: Vec<u8>,
    pub v: u64,
    pub r: U256,
    pub s: U256,
    from: Address,
}

impl Transaction {
    /// Build a transaction from already-signed fields, recovering the sender.
    #[allow(clippy::too_many_arguments)]
    pub fn from_signed(
        nonce: u64,
        gas_price: U256,
        gas_limit: Gas,
        to: Option<Address>,
        value: U256,
        data: Vec<u8>,
        v: u64,
        r: U256,
        s: U256,
    ) -> TypesResult<Self> {
        let unsigned = UnsignedTransaction {
            nonce,
            gas_price,
            gas_limit,
            to,
            value,
            data,
        };
        let from = recover_sender(&unsigned.sig_hash(), v, &r, &s)
            .ok_or(TypesError::InvalidSignature)?;
        Ok(Self {
            nonce: unsigned.nonce,
            gas_price: unsigned.gas_price,
            gas_limit: unsigned.gas_limit,
            to: unsigned.to,
            value: unsigned.value,
            data: unsigned.data,
            v,
            r,
            s,
            from,
        })
    }

    /// Sender address recovered from the signature.
    pub fn from(&self) -> Address {
        self.from
    }

    /// Transaction hash: `keccak256(rlp(tx))`.
    pub fn hash(&self) -> H256 {
        keccak(rlp::encode(self))
    }

    /// Maximum wei the sender must hold for this transaction to be valid:
    /// `value + gas_limit * gas_price`.
    pub fn upfront_cost(&self) -> U256 {
        self.value
            .saturating_add(self.gas_price.saturating_mul(U256::from(self.gas_limit)))
    }

    fn append_raw_fields(&self, stream: &mut RlpStream) {
        stream
            .append(&self.nonce)
            .append(&self.gas_price)
            .append(&self.gas_limit);
        match &self.to {
            Some(addr) => stream.append(addr),
            None => stream.append_empty_data(),
        }
        .append(&self.value)
        .append(&self.data)
        .append(&self.v)
        .append(&self.r)
        .append(&self.s);
    }

    fn decode_raw_fields(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        let to_item = rlp.at(3)?;
        let to = if to_item.is_empty() {
            None
        } else {
            Some(to_item.as_val()?)
        };
        let unsigned = UnsignedTransaction {
            nonce: rlp.val_at(0)?,
            gas_price: rlp.val_at(1)?,
            gas_limit: rlp.val_at(2)?,
            to,
            value: rlp.val_at(4)?,
            data: rlp.val_at(5)?,
        };
        let v: u64 = rlp.val_at(6)?;
        let r: U256 = rlp.val_at(7)?;
        let s: U256 = rlp.val_at(8)?;
        let from = recover_sender(&unsigned.sig_hash(), v, &r, &s)
            .ok_or(DecoderError::Custom("signature does not recover"))?;
        Ok(Self {
            nonce: unsigned.nonce,
            gas_price: unsigned.gas_price,
            gas_limit: unsigned.gas_limit,
            to: unsigned.to,
            value: unsigned.value,
            data: unsigned.data,
            v,
            r,
            s,
            from,
        })
    }
}

impl rlp::Encodable for Transaction {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(9);
        self.append_raw_fields(stream);
    }
}

impl rlp::Decodable for Transaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 9 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Self::decode_raw_fields(rlp)
    }
}

/// A transaction as persisted once included in a block: the raw signed
/// fields followed by its block context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredTransaction {
    pub tx: Transaction,
    pub block_hash: H256,
    pub block_number: u64,
    pub index: u64,
}

impl rlp::Encodable for StoredTransaction {
    fn rlp_append(&self, stream: &mut RlpStream) {
        stream.begin_list(12);
        self.tx.append_raw_fields(stream);
        stream
            .append(&self.block_hash)
            .append(&self.block_number)
            .append(&self.index);
    }
}

impl rlp::Decodable for StoredTransaction {
    fn decode(rlp: &Rlp<'_>) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 12 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            tx: Transaction::decode_raw_fields(rlp)?,
            block_hash: rlp.val_at(9)?,
            block_number: rlp.val_at(10)?,
            index: rlp.val_at(11)?,
        })
    }
}

/// Address for a public key: the low 20 bytes of the keccak of the
/// uncompressed point.
pub fn address_of(public: &libsecp256k1::PublicKey) -> Address {
    let serialized = public.serialize();
    debug_assert_eq!(serialized[0], 4);
    Address::from_slice(&Keccak256::digest(&serialized[1..])[12..])
}

/// Recover the signing address, rejecting out-of-range or malleable
/// signatures the way geth's `ValidateSignatureValues` does.
fn recover_sender(sig_hash: &H256, v: u64, r: &U256, s: &U256) -> Option<Address> {
    if v != 27 && v != 28 {
        return None;
    }
    if r.is_zero() || s.is_zero() {
        return None;
    }
    if r >= &*SECP256K1_N || s > &*SECP256K1_HALF_N {
        return None;
    }
    let mut buf = [0u8; 32];
    r.to_big_endian(&mut buf);
    let mut r_scalar = libsecp256k1::curve::Scalar([0; 8]);
    let _ = r_scalar.set_b32(&buf);
    s.to_big_endian(&mut buf);
    let mut s_scalar = libsecp256k1::curve::Scalar([0; 8]);
    let _ = s_scalar.set_b32(&buf);
    let signature = libsecp256k1::Signature {
        r: r_scalar,
        s: s_scalar,
    };
    let message = libsecp256k1::Message::parse_slice(sig_hash.as_bytes()).ok()?;
    let recovery_id = libsecp256k1::RecoveryId::parse((v - 27) as u8).ok()?;
    let public = libsecp256k1::recover(&message, &signature, &recovery_id).ok()?;
    Some(address_of(&public))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_secret(fill: u8) -> libsecp256k1::SecretKey {
        libsecp256k1::SecretKey::parse(&[fill; 32]).unwrap()
    }

    fn transfer(nonce: u64, secret: &libsecp256k1::SecretKey) -> Transaction {
        UnsignedTransaction {
            nonce,
            gas_price: U256::one(),
            gas_limit: 21_000,
            to: Some(Address::repeat_byte(0xbb)),
            value: U256::from(10u64),
            data: Vec::new(),
        }
        .sign(secret)
    }

    #[test]
    fn sign_and_recover_round_trip() {
        let secret = test_secret(0x11);
        let tx = transfer(0, &secret);
        let expected = address_of(&libsecp256k1::PublicKey::from_secret_key(&secret));
        assert_eq!(tx.from(), expected);

        let rebuilt = Transaction::from_signed(
            tx.nonce,
            tx.gas_price,
            tx.gas_limit,
            tx.to,
            tx.value,
            tx.data.clone(),
            tx.v,
            tx.r,
            tx.s,
        )
        .unwrap();
        assert_eq!(rebuilt.from(), expected);
    }

    #[test]
    fn rlp_round_trip_preserves_encoding() {
        let tx = transfer(3, &test_secret(0x22));
        let encoded = rlp::encode(&tx);
        let decoded: Transaction = rlp::decode(&encoded).unwrap();
        assert_eq!(rlp::encode(&decoded), encoded);
        assert_eq!(decoded, tx);
        assert_eq!(decoded.hash(), tx.hash());
    }

    #[test]
    fn contract_creation_has_empty_to() {
        let secret = test_secret(0x33);
        let tx = UnsignedTransaction {
            nonce: 0,
            gas_price: U256::one(),
            gas_limit: 100_000,
            to: None,
            value: U256::zero(),
            data: vec![0x60, 0x00],
        }
        .sign(&secret);
        let decoded: Transaction = rlp::decode(&rlp::encode(&tx)).unwrap();
        assert_eq!(decoded.to, None);
    }

    #[test]
    fn stored_transaction_round_trip() {
        let tx = transfer(1, &test_secret(0x44));
        let stored = StoredTransaction {
            tx: tx.clone(),
            block_hash: H256::repeat_byte(0xab),
            block_number: 42,
            index: 3,
        };
        let decoded: StoredTransaction = rlp::decode(&rlp::encode(&stored)).unwrap();
        assert_eq!(decoded, stored);
        assert_eq!(decoded.tx.from(), tx.from());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let tx = transfer(0, &test_secret(0x55));
        let err = Transaction::from_signed(
            tx.nonce,
            tx.gas_price,
            tx.gas_limit,
            tx.to,
            // changing a signed field shifts the recovered address or fails
            tx.value + U256::one(),
            tx.data.clone(),
            0, // invalid v
            tx.r,
            tx.s,
        );
        assert!(matches!(err, Err(TypesError::InvalidSignature)));
    }

    #[test]
    fn upfront_cost_covers_value_and_gas() {
        let tx = transfer(0, &test_secret(0x66));
        assert_eq!(tx.upfront_cost(), U256::from(10u64 + 21_000));
    }
}
