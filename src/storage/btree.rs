//! B+ tree index for QuillDB
//!
//! A persistent B+ tree mapping 32-bit primary keys to lists of record
//! offsets in the table's data file. Leaves hold offset lists so that a
//! rewrite pass can tolerate duplicate keys, even though INSERT refuses
//! to create them. The tree has no in-place delete or update; the table
//! store rebuilds it from the data file instead.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const ORDER: usize = 4;

/// B+ tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    /// Internal node with keys and child pointers
    Internal {
        keys: Vec<i32>,
        children: Vec<Box<Node>>,
    },
    /// Leaf node with keys and, per key, the offsets mapped to it
    Leaf {
        keys: Vec<i32>,
        offsets: Vec<Vec<u32>>,
    },
}

/// Primary-key index over one table's data file.
///
/// The whole tree is serialized to its file on `save`; `open` on that
/// file yields an equivalent map.
#[derive(Debug, Serialize, Deserialize)]
pub struct BPlusTree {
    /// Root node
    root: Option<Box<Node>>,
    /// Number of key-to-offset mappings
    entries: usize,
    /// Backing file
    #[serde(skip)]
    path: PathBuf,
}

impl BPlusTree {
    /// Create a new empty tree backed by `path`. Nothing touches disk
    /// until `save`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            root: None,
            entries: 0,
            path: path.into(),
        }
    }

    /// Load the tree from its file, or initialize empty if the file is
    /// absent.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self::new(path));
        }
        let bytes = fs::read(&path)?;
        let (mut tree, _) =
            bincode::serde::decode_from_slice::<BPlusTree, _>(&bytes, bincode::config::standard())
                .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        tree.path = path;
        Ok(tree)
    }

    /// Flush the tree to its file.
    pub fn save(&self) -> Result<()> {
        self.save_to(&self.path)
    }

    /// Flush the tree to an arbitrary path (used by the rebuild swap).
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| Error::CorruptIndex(e.to_string()))?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a key-to-offset mapping. An existing key gains another offset
    /// rather than a second leaf slot.
    pub fn insert(&mut self, key: i32, offset: u32) {
        let Some(mut root) = self.root.take() else {
            self.root = Some(Box::new(Node::Leaf {
                keys: vec![key],
                offsets: vec![vec![offset]],
            }));
            self.entries = 1;
            return;
        };

        if let Some((split, mid_key)) = insert_recursive(&mut root, key, offset) {
            // Root split, grow a new root above it
            self.root = Some(Box::new(Node::Internal {
                keys: vec![mid_key],
                children: vec![root, split],
            }));
        } else {
            self.root = Some(root);
        }
        self.entries += 1;
    }

    /// Look up the offsets mapped to `key`; empty when absent.
    pub fn search(&self, key: i32) -> Vec<u32> {
        let mut node = match &self.root {
            Some(root) => root.as_ref(),
            None => return Vec::new(),
        };
        loop {
            match node {
                Node::Leaf { keys, offsets } => {
                    return match keys.binary_search(&key) {
                        Ok(pos) => offsets[pos].clone(),
                        Err(_) => Vec::new(),
                    };
                }
                Node::Internal { keys, children } => {
                    let pos = match keys.binary_search(&key) {
                        Ok(p) => p + 1,
                        Err(p) => p,
                    };
                    node = &children[pos];
                }
            }
        }
    }

    /// Check whether `key` is present
    pub fn contains(&self, key: i32) -> bool {
        !self.search(key).is_empty()
    }

    /// All keys in ascending order.
    pub fn keys(&self) -> Vec<i32> {
        let mut out = Vec::with_capacity(self.entries);
        if let Some(root) = &self.root {
            collect_keys(root, &mut out);
        }
        out
    }

    /// Number of key-to-offset mappings in the tree
    pub fn len(&self) -> usize {
        self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

fn insert_recursive(node: &mut Node, key: i32, offset: u32) -> Option<(Box<Node>, i32)> {
    match node {
        Node::Leaf { keys, offsets } => {
            match keys.binary_search(&key) {
                Ok(pos) => {
                    offsets[pos].push(offset);
                    return None;
                }
                Err(pos) => {
                    keys.insert(pos, key);
                    offsets.insert(pos, vec![offset]);
                }
            }

            if keys.len() > ORDER {
                let mid = keys.len() / 2;
                let split_keys = keys.split_off(mid);
                let split_offsets = offsets.split_off(mid);
                let mid_key = split_keys[0];
                return Some((
                    Box::new(Node::Leaf {
                        keys: split_keys,
                        offsets: split_offsets,
                    }),
                    mid_key,
                ));
            }
            None
        }
        Node::Internal { keys, children } => {
            let pos = match keys.binary_search(&key) {
                Ok(p) => p + 1,
                Err(p) => p,
            };
            if let Some((split, mid_key)) = insert_recursive(&mut children[pos], key, offset) {
                keys.insert(pos, mid_key);
                children.insert(pos + 1, split);

                if keys.len() > ORDER {
                    let mid = keys.len() / 2;
                    let mid_key = keys[mid];
                    let split_keys = keys.split_off(mid + 1);
                    keys.pop(); // mid_key moves up, not right
                    let split_children = children.split_off(mid + 1);
                    return Some((
                        Box::new(Node::Internal {
                            keys: split_keys,
                            children: split_children,
                        }),
                        mid_key,
                    ));
                }
            }
            None
        }
    }
}

fn collect_keys(node: &Node, out: &mut Vec<i32>) {
    match node {
        Node::Leaf { keys, .. } => out.extend_from_slice(keys),
        Node::Internal { children, .. } => {
            for child in children {
                collect_keys(child, out);
            }
        }
    }
}
