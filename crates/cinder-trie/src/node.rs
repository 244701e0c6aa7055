//! Trie node model and its RLP encoding.

use crate::nibbles::{hex_prefix_decode, hex_prefix_encode};
use cinder_types::H256;
use rlp::{DecoderError, Rlp, RlpStream};

/// A Merkle-Patricia trie node.
///
/// Children are always referenced by the keccak of their encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Terminal node carrying the remaining path and a value.
    Leaf { path: Vec<u8>, value: Vec<u8> },
    /// Shared-prefix node pointing at a single child.
    Extension { path: Vec<u8>, child: H256 },
    /// Sixteen-way fan-out with an optional value for keys ending here.
    Branch {
        children: Box<[Option<H256>; 16]>,
        value: Option<Vec<u8>>,
    },
}

impl Node {
    pub fn branch() -> (Box<[Option<H256>; 16]>, Option<Vec<u8>>) {
        (Box::new([None; 16]), None)
    }

    /// RLP-encode the node.
    pub fn encode(&self) -> Vec<u8> {
        let mut stream = RlpStream::new();
        match self {
            Node::Leaf { path, value } => {
                stream.begin_list(2);
                stream.append(&hex_prefix_encode(path, true));
                stream.append(value);
            }
            Node::Extension { path, child } => {
                stream.begin_list(2);
                stream.append(&hex_prefix_encode(path, false));
                stream.append(child);
            }
            Node::Branch { children, value } => {
                stream.begin_list(17);
                for child in children.iter() {
                    match child {
                        Some(hash) => stream.append(hash),
                        None => stream.append_empty_data(),
                    };
                }
                match value {
                    Some(value) => stream.append(value),
                    None => stream.append_empty_data(),
                };
            }
        }
        stream.out().to_vec()
    }

    /// Decode a node from its RLP encoding.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecoderError> {
        let rlp = Rlp::new(bytes);
        match rlp.item_count()? {
            2 => {
                let encoded_path: Vec<u8> = rlp.val_at(0)?;
                let (path, is_leaf) = hex_prefix_decode(&encoded_path)
                    .ok_or(DecoderError::Custom("empty hex-prefix path"))?;
                if is_leaf {
                    Ok(Node::Leaf {
                        path,
                        value: rlp.val_at(1)?,
                    })
                } else {
                    Ok(Node::Extension {
                        path,
                        child: rlp.val_at(1)?,
                    })
                }
            }
            17 => {
                let mut children = Box::new([None; 16]);
                for (index, slot) in children.iter_mut().enumerate() {
                    let item = rlp.at(index)?;
                    if !item.is_empty() {
                        *slot = Some(item.as_val()?);
                    }
                }
                let value_item = rlp.at(16)?;
                let value = if value_item.is_empty() {
                    None
                } else {
                    Some(value_item.as_val()?)
                };
                Ok(Node::Branch { children, value })
            }
            n => Err(DecoderError::Custom(if n == 0 {
                "empty trie node"
            } else {
                "unexpected trie node arity"
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaf_round_trip() {
        let node = Node::Leaf {
            path: vec![1, 2, 3],
            value: b"value".to_vec(),
        };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }

    #[test]
    fn extension_round_trip() {
        let node = Node::Extension {
            path: vec![0, 0x0f],
            child: H256::repeat_byte(0x42),
        };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }

    #[test]
    fn branch_round_trip() {
        let (mut children, _) = Node::branch();
        children[3] = Some(H256::repeat_byte(0x03));
        children[0x0f] = Some(H256::repeat_byte(0x0f));
        let node = Node::Branch {
            children,
            value: Some(b"here".to_vec()),
        };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }

    #[test]
    fn branch_without_value_round_trip() {
        let (mut children, value) = Node::branch();
        children[0] = Some(H256::repeat_byte(0x01));
        let node = Node::Branch { children, value };
        assert_eq!(Node::decode(&node.encode()).unwrap(), node);
    }
}
