//! The checkpointable trie itself.

use crate::error::{TrieError, TrieResult};
use crate::nibbles::{common_prefix_len, to_nibbles};
use crate::node::Node;
use cinder_storage::{ColumnFamily, Storage, WriteBatch};
use cinder_types::{keccak, H256, EMPTY_TRIE_ROOT};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// A nestable savepoint over the trie.
struct Checkpoint {
    root: H256,
    overlay_mark: usize,
}

/// Merkle-Patricia trie over the `TrieNodes` keyspace.
pub struct MerkleTrie {
    storage: Arc<dyn Storage>,
    root: H256,
    /// Nodes written since the last commit, keyed by node hash.
    overlay: HashMap<H256, Vec<u8>>,
    /// First-insertion order of overlay nodes, for checkpoint truncation.
    overlay_log: Vec<H256>,
    checkpoints: Vec<Checkpoint>,
}

impl MerkleTrie {
    /// Create an empty trie.
    pub fn empty(storage: Arc<dyn Storage>) -> Self {
        Self::with_root(storage, EMPTY_TRIE_ROOT)
    }

    /// Open a trie at a previously committed root.
    pub fn with_root(storage: Arc<dyn Storage>, root: H256) -> Self {
        Self {
            storage,
            root,
            overlay: HashMap::new(),
            overlay_log: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    /// Current root hash.
    pub fn root(&self) -> H256 {
        self.root
    }

    /// Number of open checkpoints.
    pub fn checkpoint_depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Repoint the trie at `root`.
    ///
    /// Fails while any checkpoint is open: a repoint would invalidate the
    /// roots the checkpoints would restore.
    pub fn set_root(&mut self, root: H256) -> TrieResult<()> {
        if !self.checkpoints.is_empty() {
            return Err(TrieError::CheckpointOpen(self.checkpoints.len()));
        }
        trace!(root = ?root, "Trie root repointed");
        self.root = root;
        Ok(())
    }

    /// Push a savepoint capturing the current root.
    pub fn checkpoint(&mut self) {
        self.checkpoints.push(Checkpoint {
            root: self.root,
            overlay_mark: self.overlay_log.len(),
        });
    }

    /// Discard the most recent savepoint, keeping all changes since.
    pub fn commit_checkpoint(&mut self) -> TrieResult<()> {
        self.checkpoints.pop().ok_or(TrieError::NoCheckpoint)?;
        Ok(())
    }

    /// Restore the most recent savepoint, dropping all changes since.
    pub fn revert_checkpoint(&mut self) -> TrieResult<()> {
        let checkpoint = self.checkpoints.pop().ok_or(TrieError::NoCheckpoint)?;
        for hash in self.overlay_log.drain(checkpoint.overlay_mark..) {
            self.overlay.remove(&hash);
        }
        self.root = checkpoint.root;
        Ok(())
    }

    /// Fold every overlay node into `batch` and clear the overlay.
    ///
    /// The caller owns atomicity: the nodes land in storage when the batch
    /// is written, typically together with the block that references them.
    pub fn commit(&mut self, batch: &mut WriteBatch) -> TrieResult<()> {
        if !self.checkpoints.is_empty() {
            return Err(TrieError::CheckpointOpen(self.checkpoints.len()));
        }
        for (hash, encoded) in self.overlay.drain() {
            batch.put(ColumnFamily::TrieNodes, hash.as_bytes(), encoded);
        }
        self.overlay_log.clear();
        Ok(())
    }

    /// Look up the value stored under `key`.
    pub fn get(&self, key: &[u8]) -> TrieResult<Option<Vec<u8>>> {
        if self.root == EMPTY_TRIE_ROOT {
            return Ok(None);
        }
        self.lookup(self.root, &to_nibbles(key))
    }

    pub fn contains(&self, key: &[u8]) -> TrieResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert `value` under `key`, replacing any existing value.
    pub fn insert(&mut self, key: &[u8], value: Vec<u8>) -> TrieResult<()> {
        let nibbles = to_nibbles(key);
        let new_root = if self.root == EMPTY_TRIE_ROOT {
            self.store_node(Node::Leaf {
                path: nibbles,
                value,
            })?
        } else {
            let node = self.insert_at(self.root, &nibbles, value)?;
            self.store_node(node)?
        };
        self.root = new_root;
        Ok(())
    }

    /// Remove `key`. Returns whether it was present.
    pub fn remove(&mut self, key: &[u8]) -> TrieResult<bool> {
        if self.root == EMPTY_TRIE_ROOT {
            return Ok(false);
        }
        match self.remove_at(self.root, &to_nibbles(key))? {
            Removed::NotFound => Ok(false),
            Removed::Gone => {
                self.root = EMPTY_TRIE_ROOT;
                Ok(true)
            }
            Removed::Node(node) => {
                self.root = self.store_node(node)?;
                Ok(true)
            }
        }
    }

    fn lookup(&self, hash: H256, path: &[u8]) -> TrieResult<Option<Vec<u8>>> {
        match self.load_node(&hash)? {
            Node::Leaf {
                path: leaf_path,
                value,
            } => Ok(if leaf_path == path { Some(value) } else { None }),
            Node::Extension {
                path: ext_path,
                child,
            } => {
                if path.len() >= ext_path.len() && path[..ext_path.len()] == ext_path[..] {
                    self.lookup(child, &path[ext_path.len()..])
                } else {
                    Ok(None)
                }
            }
            Node::Branch { children, value } => match path.split_first() {
                None => Ok(value),
                Some((index, rest)) => match children[*index as usize] {
                    Some(child) => self.lookup(child, rest),
                    None => Ok(None),
                },
            },
        }
    }

    fn insert_at(&mut self, hash: H256, path: &[u8], value: Vec<u8>) -> TrieResult<Node> {
        match self.load_node(&hash)? {
            Node::Leaf {
                path: leaf_path,
                value: leaf_value,
            } => {
                if leaf_path == path {
                    return Ok(Node::Leaf {
                        path: leaf_path,
                        value,
                    });
                }
                let common = common_prefix_len(&leaf_path, path);
                let (mut children, mut branch_value) = Node::branch();
                match leaf_path[common..].split_first() {
                    None => branch_value = Some(leaf_value),
                    Some((index, rest)) => {
                        children[*index as usize] = Some(self.store_node(Node::Leaf {
                            path: rest.to_vec(),
                            value: leaf_value,
                        })?);
                    }
                }
                match path[common..].split_first() {
                    None => branch_value = Some(value),
                    Some((index, rest)) => {
                        children[*index as usize] = Some(self.store_node(Node::Leaf {
                            path: rest.to_vec(),
                            value,
                        })?);
                    }
                }
                let branch = Node::Branch {
                    children,
                    value: branch_value,
                };
                self.wrap_prefix(&path[..common], branch)
            }
            Node::Extension {
                path: ext_path,
                child,
            } => {
                let common = common_prefix_len(&ext_path, path);
                if common == ext_path.len() {
                    let new_child = self.insert_at(child, &path[common..], value)?;
                    let child_hash = self.store_node(new_child)?;
                    return Ok(Node::Extension {
                        path: ext_path,
                        child: child_hash,
                    });
                }
                // split the extension at the divergence point
                let (mut children, mut branch_value) = Node::branch();
                let (ext_index, ext_rest) = ext_path[common..]
                    .split_first()
                    .expect("divergence inside the extension path");
                children[*ext_index as usize] = if ext_rest.is_empty() {
                    Some(child)
                } else {
                    Some(self.store_node(Node::Extension {
                        path: ext_rest.to_vec(),
                        child,
                    })?)
                };
                match path[common..].split_first() {
                    None => branch_value = Some(value),
                    Some((index, rest)) => {
                        children[*index as usize] = Some(self.store_node(Node::Leaf {
                            path: rest.to_vec(),
                            value,
                        })?);
                    }
                }
                let branch = Node::Branch {
                    children,
                    value: branch_value,
                };
                self.wrap_prefix(&path[..common], branch)
            }
            Node::Branch {
                mut children,
                value: branch_value,
            } => match path.split_first() {
                None => Ok(Node::Branch {
                    children,
                    value: Some(value),
                }),
                Some((index, rest)) => {
                    let slot = *index as usize;
                    let new_child = match children[slot] {
                        Some(child) => self.insert_at(child, rest, value)?,
                        None => Node::Leaf {
                            path: rest.to_vec(),
                            value,
                        },
                    };
                    children[slot] = Some(self.store_node(new_child)?);
                    Ok(Node::Branch {
                        children,
                        value: branch_value,
                    })
                }
            },
        }
    }

    fn remove_at(&mut self, hash: H256, path: &[u8]) -> TrieResult<Removed> {
        match self.load_node(&hash)? {
            Node::Leaf {
                path: leaf_path, ..
            } => Ok(if leaf_path == path {
                Removed::Gone
            } else {
                Removed::NotFound
            }),
            Node::Extension {
                path: ext_path,
                child,
            } => {
                if path.len() < ext_path.len() || path[..ext_path.len()] != ext_path[..] {
                    return Ok(Removed::NotFound);
                }
                match self.remove_at(child, &path[ext_path.len()..])? {
                    Removed::NotFound => Ok(Removed::NotFound),
                    Removed::Gone => Ok(Removed::Gone),
                    Removed::Node(node) => Ok(Removed::Node(self.graft(ext_path, node)?)),
                }
            }
            Node::Branch {
                mut children,
                value,
            } => match path.split_first() {
                None => {
                    if value.is_none() {
                        return Ok(Removed::NotFound);
                    }
                    self.collapse_branch(children, None)
                }
                Some((index, rest)) => {
                    let slot = *index as usize;
                    let Some(child) = children[slot] else {
                        return Ok(Removed::NotFound);
                    };
                    match self.remove_at(child, rest)? {
                        Removed::NotFound => return Ok(Removed::NotFound),
                        Removed::Gone => children[slot] = None,
                        Removed::Node(node) => children[slot] = Some(self.store_node(node)?),
                    }
                    self.collapse_branch(children, value)
                }
            },
        }
    }

    /// Restore the branch invariant after a removal: a branch must keep at
    /// least two referents (children or value), otherwise it folds into its
    /// remaining content.
    fn collapse_branch(
        &mut self,
        children: Box<[Option<H256>; 16]>,
        value: Option<Vec<u8>>,
    ) -> TrieResult<Removed> {
        let child_count = children.iter().filter(|c| c.is_some()).count();
        match (child_count, value) {
            (0, None) => Ok(Removed::Gone),
            (0, Some(value)) => Ok(Removed::Node(Node::Leaf {
                path: Vec::new(),
                value,
            })),
            (1, None) => {
                let (index, child) = children
                    .iter()
                    .enumerate()
                    .find_map(|(i, c)| c.map(|hash| (i as u8, hash)))
                    .expect("exactly one child");
                let merged = match self.load_node(&child)? {
                    Node::Leaf { mut path, value } => {
                        path.insert(0, index);
                        Node::Leaf { path, value }
                    }
                    Node::Extension { mut path, child } => {
                        path.insert(0, index);
                        Node::Extension { path, child }
                    }
                    Node::Branch { .. } => Node::Extension {
                        path: vec![index],
                        child,
                    },
                };
                Ok(Removed::Node(merged))
            }
            (_, value) => Ok(Removed::Node(Node::Branch { children, value })),
        }
    }

    /// Prepend an extension path onto a replacement subtree.
    fn graft(&mut self, prefix: Vec<u8>, node: Node) -> TrieResult<Node> {
        Ok(match node {
            Node::Leaf { path, value } => Node::Leaf {
                path: join_paths(prefix, path),
                value,
            },
            Node::Extension { path, child } => Node::Extension {
                path: join_paths(prefix, path),
                child,
            },
            branch @ Node::Branch { .. } => {
                let child = self.store_node(branch)?;
                Node::Extension {
                    path: prefix,
                    child,
                }
            }
        })
    }

    /// Wrap `node` in an extension for `prefix`, or return it unchanged when
    /// the prefix is empty.
    fn wrap_prefix(&mut self, prefix: &[u8], node: Node) -> TrieResult<Node> {
        if prefix.is_empty() {
            return Ok(node);
        }
        let child = self.store_node(node)?;
        Ok(Node::Extension {
            path: prefix.to_vec(),
            child,
        })
    }

    fn load_node(&self, hash: &H256) -> TrieResult<Node> {
        let encoded = match self.overlay.get(hash) {
            Some(encoded) => encoded.clone(),
            None => self
                .storage
                .get(ColumnFamily::TrieNodes, hash.as_bytes())?
                .ok_or(TrieError::MissingNode(*hash))?,
        };
        Node::decode(&encoded).map_err(|err| TrieError::CorruptNode {
            hash: *hash,
            reason: err.to_string(),
        })
    }

    fn store_node(&mut self, node: Node) -> TrieResult<H256> {
        let encoded = node.encode();
        let hash = keccak(&encoded);
        if self.overlay.insert(hash, encoded).is_none() {
            self.overlay_log.push(hash);
        }
        Ok(hash)
    }
}

enum Removed {
    /// The key was absent; nothing changed.
    NotFound,
    /// The subtree now consists of this node.
    Node(Node),
    /// The subtree vanished entirely.
    Gone,
}

fn join_paths(mut prefix: Vec<u8>, suffix: Vec<u8>) -> Vec<u8> {
    prefix.extend(suffix);
    prefix
}
