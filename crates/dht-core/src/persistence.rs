//! On-disk persistence collaborator contract (spec §6.3). The core treats
//! this as an opaque external collaborator — callers supply any
//! `PersistenceBackend`; the core only ever round-trips the two named blobs.
//!
//! The blob format itself (what [`encode_nodetree`]/[`encode_hashtable`]
//! produce) is `bincode`, the universal choice across this workspace for
//! internal, Rust-to-Rust wire/storage formats (as opposed to the
//! transport framer's hand-rolled layout, which is shared with a non-Rust
//! peer implementation and so is never a serde derive).

use crate::messaging::ValueEntry;
use crate::node::Node;
use async_trait::async_trait;
use dht_crypto::Id;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const NODETREE_KEY: &str = "nodetree";
pub const HASHTABLE_KEY: &str = "hashtable";

/// Flat snapshot of every record in a [`crate::routing::RoutingTree`]
/// (spec §6.3: "preserves all fields listed in §3 except the Node liveness
/// state machine"). Rebuilding re-inserts each record through
/// `RoutingTree::add`, which re-derives the tree's split structure from
/// scratch rather than persisting the shape of the tree itself.
#[derive(Serialize, Deserialize)]
struct PersistedNodeTree {
    nodes: Vec<Node>,
}

pub fn encode_nodetree(nodes: &[Node]) -> anyhow::Result<Vec<u8>> {
    Ok(bincode::serialize(&PersistedNodeTree { nodes: nodes.to_vec() })?)
}

/// Decodes a nodetree blob, reinitialising every record's liveness state
/// (spec §6.3) since a node that looked `verified` on disk tells us nothing
/// about whether it still is.
pub fn decode_nodetree(blob: &[u8]) -> anyhow::Result<Vec<Node>> {
    let persisted: PersistedNodeTree = bincode::deserialize(blob)?;
    let mut nodes = persisted.nodes;
    for node in &mut nodes {
        node.reinitialise_liveness();
    }
    Ok(nodes)
}

#[derive(Serialize, Deserialize)]
struct PersistedHashtable {
    entries: Vec<(Id, ValueEntry)>,
}

pub fn encode_hashtable(entries: Vec<(Id, ValueEntry)>) -> anyhow::Result<Vec<u8>> {
    Ok(bincode::serialize(&PersistedHashtable { entries })?)
}

pub fn decode_hashtable(blob: &[u8]) -> anyhow::Result<Vec<(Id, ValueEntry)>> {
    let persisted: PersistedHashtable = bincode::deserialize(blob)?;
    Ok(persisted.entries)
}

/// Object-safe storage collaborator: opaque `store`/`fetch` over named blobs.
/// Implementors choose the serialization; the core only guarantees the blob
/// round-trips every field in spec §3 except Node liveness, which is
/// reinitialised on load (`Node::reinitialise_liveness`).
#[async_trait]
pub trait PersistenceBackend: Send + Sync {
    async fn store(&self, key: &str, blob: Vec<u8>) -> anyhow::Result<()>;
    async fn fetch(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>>;
}

/// Discards everything; used where no persistence is configured (tests, or
/// an ephemeral node).
pub struct NullPersistence;

#[async_trait]
impl PersistenceBackend for NullPersistence {
    async fn store(&self, _key: &str, _blob: Vec<u8>) -> anyhow::Result<()> {
        Ok(())
    }

    async fn fetch(&self, _key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(None)
    }
}

/// One blob per key, stored as a flat file under `dir`.
pub struct FilesystemPersistence {
    dir: PathBuf,
}

impl FilesystemPersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FilesystemPersistence { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.blob"))
    }
}

#[async_trait]
impl PersistenceBackend for FilesystemPersistence {
    async fn store(&self, key: &str, blob: Vec<u8>) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path_for(key), blob).await?;
        Ok(())
    }

    async fn fetch(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
