//! Durable term graph with transactions
//!
//! Layout of a store directory:
//! 1. `graph.snapshot`: bincode image of all nodes and edges at the last checkpoint
//! 2. `graph.wal`: length-prefixed bincode entries for transactions committed since
//!
//! Opening a store loads the snapshot, replays committed transactions from the
//! WAL and checkpoints the result, so every session starts on an empty WAL. A
//! transaction is only written to the WAL at commit, as one batch terminated
//! by a `CommitTx` marker, so a torn tail never yields half a transaction.

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use crate::{Edge, EdgeId, GraphStore, NodeId, PropertyValue, StoreError, TermNode, TERM};

const WAL_FILE: &str = "graph.wal";
const SNAPSHOT_FILE: &str = "graph.snapshot";

fn encode_err(e: bincode::Error) -> StoreError {
    StoreError::Encode(e.to_string())
}

// ============================================================================
// Write-Ahead Log
// ============================================================================

/// Write-ahead log for crash recovery
pub struct WriteAheadLog {
    file: Mutex<File>,
    path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WalEntry {
    BeginTx {
        tx_id: u64,
        timestamp: i64,
    },
    CreateNode {
        tx_id: u64,
        node_id: NodeId,
        key: String,
    },
    SetProperty {
        tx_id: u64,
        node_id: NodeId,
        key: String,
        value: PropertyValue,
    },
    CreateEdge {
        tx_id: u64,
        edge: Edge,
    },
    CommitTx {
        tx_id: u64,
    },
}

impl WalEntry {
    fn tx_id(&self) -> u64 {
        match self {
            WalEntry::BeginTx { tx_id, .. }
            | WalEntry::CreateNode { tx_id, .. }
            | WalEntry::SetProperty { tx_id, .. }
            | WalEntry::CreateEdge { tx_id, .. }
            | WalEntry::CommitTx { tx_id } => *tx_id,
        }
    }
}

impl WriteAheadLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;

        Ok(Self {
            file: Mutex::new(file),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append entries as one write and sync once.
    pub fn append_all(&self, entries: &[WalEntry]) -> Result<u64, StoreError> {
        let mut buf = Vec::new();
        for entry in entries {
            let data = bincode::serialize(entry).map_err(encode_err)?;
            buf.extend_from_slice(&(data.len() as u32).to_le_bytes());
            buf.extend_from_slice(&data);
        }

        let mut file = self.file.lock();
        file.write_all(&buf)?;
        file.sync_data()?;

        Ok(buf.len() as u64)
    }

    /// Replay every complete entry in order. A truncated final record ends the
    /// replay and is cut from the file, so later appends start on a record boundary.
    pub fn replay<F: FnMut(WalEntry) -> Result<(), StoreError>>(
        &self,
        mut handler: F,
    ) -> Result<(), StoreError> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut complete: u64 = 0;

        loop {
            let mut len_bytes = [0u8; 4];
            match file.read_exact(&mut len_bytes) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }

            let len = u32::from_le_bytes(len_bytes) as usize;
            let mut data = vec![0u8; len];
            match file.read_exact(&mut data) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    tracing::warn!(
                        path = %self.path.display(),
                        offset = complete,
                        "dropping torn record at end of WAL"
                    );
                    file.set_len(complete)?;
                    file.sync_data()?;
                    break;
                }
                Err(e) => return Err(e.into()),
            }

            let entry: WalEntry = bincode::deserialize(&data).map_err(encode_err)?;
            handler(entry)?;
            complete += 4 + len as u64;
        }

        Ok(())
    }

    /// Truncate WAL after checkpoint
    pub fn truncate(&self) -> std::io::Result<()> {
        let mut file = self.file.lock();
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.sync_data()?;
        Ok(())
    }
}

// ============================================================================
// Committed Graph State
// ============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    next_node_id: NodeId,
    next_edge_id: EdgeId,
    nodes: Vec<TermNode>,
    edges: Vec<Edge>,
}

#[derive(Debug, Default)]
struct GraphState {
    nodes: BTreeMap<NodeId, TermNode>,
    key_index: HashMap<String, NodeId>,
    edges: BTreeMap<EdgeId, Edge>,
    outgoing: HashMap<NodeId, Vec<EdgeId>>,
}

impl GraphState {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut state = Self::default();
        for node in snapshot.nodes {
            state.insert_node(node.id, &node.key);
            if let Some(slot) = state.nodes.get_mut(&node.id) {
                slot.properties = node.properties;
            }
        }
        for edge in snapshot.edges {
            state.insert_edge(edge);
        }
        state
    }

    fn to_snapshot(&self, next_node_id: NodeId, next_edge_id: EdgeId) -> Snapshot {
        Snapshot {
            next_node_id,
            next_edge_id,
            nodes: self.nodes.values().cloned().collect(),
            edges: self.edges.values().cloned().collect(),
        }
    }

    fn insert_node(&mut self, id: NodeId, key: &str) {
        self.key_index.insert(key.to_string(), id);
        self.nodes.entry(id).or_insert_with(|| TermNode {
            id,
            key: key.to_string(),
            properties: BTreeMap::new(),
        });
    }

    fn has_property(&self, node: NodeId, key: &str) -> bool {
        self.nodes
            .get(&node)
            .map(|n| n.properties.contains_key(key))
            .unwrap_or(false)
    }

    fn set_property_if_absent(&mut self, node: NodeId, key: &str, value: PropertyValue) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.properties.entry(key.to_string()).or_insert(value);
        }
    }

    fn has_edge(&self, from: NodeId, to: NodeId, label: &str) -> bool {
        self.outgoing_edges(from)
            .any(|edge| edge.same_triple(from, to, label))
    }

    fn insert_edge(&mut self, edge: Edge) -> bool {
        if self.has_edge(edge.from, edge.to, &edge.label) {
            return false;
        }
        self.outgoing.entry(edge.from).or_default().push(edge.id);
        self.edges.insert(edge.id, edge);
        true
    }

    fn outgoing_edges(&self, node: NodeId) -> impl Iterator<Item = &Edge> {
        self.outgoing
            .get(&node)
            .into_iter()
            .flatten()
            .filter_map(|id| self.edges.get(id))
    }

    fn apply(&mut self, entry: WalEntry) {
        match entry {
            WalEntry::CreateNode { node_id, key, .. } => self.insert_node(node_id, &key),
            WalEntry::SetProperty {
                node_id, key, value, ..
            } => self.set_property_if_absent(node_id, &key, value),
            WalEntry::CreateEdge { edge, .. } => {
                self.insert_edge(edge);
            }
            WalEntry::BeginTx { .. } | WalEntry::CommitTx { .. } => {}
        }
    }

    fn max_ids(&self) -> (NodeId, EdgeId) {
        let node = self.nodes.keys().next_back().map(|id| id + 1).unwrap_or(0);
        let edge = self.edges.keys().next_back().map(|id| id + 1).unwrap_or(0);
        (node, edge)
    }
}

// ============================================================================
// Transaction
// ============================================================================

/// Transaction state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

#[derive(Debug, Clone)]
enum PendingWrite {
    CreateNode {
        id: NodeId,
        key: String,
    },
    SetProperty {
        node: NodeId,
        key: String,
        value: PropertyValue,
    },
    CreateEdge(Edge),
}

/// A unit of work against a [`TermStore`]. Nothing is visible to other
/// readers until it is committed.
#[derive(Debug)]
pub struct Transaction {
    pub id: u64,
    pub state: TxState,
    writes: Vec<PendingWrite>,
    new_nodes: HashMap<String, NodeId>,
    new_props: HashSet<(NodeId, String)>,
    new_edges: Vec<Edge>,
}

impl Transaction {
    fn new(id: u64) -> Self {
        Self {
            id,
            state: TxState::Active,
            writes: Vec::new(),
            new_nodes: HashMap::new(),
            new_props: HashSet::new(),
            new_edges: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    fn ensure_active(&self) -> Result<(), StoreError> {
        if self.state == TxState::Active {
            Ok(())
        } else {
            Err(StoreError::TxNotActive(self.id))
        }
    }

    fn created_node(&self, node: NodeId) -> bool {
        self.new_nodes.values().any(|id| *id == node)
    }
}

/// What a commit actually changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub nodes_created: usize,
    pub properties_set: usize,
    pub edges_created: usize,
    /// Edges dropped at commit because an identical triple already existed.
    pub edges_skipped: usize,
}

// ============================================================================
// Term Store
// ============================================================================

/// Embedded, WAL-backed term graph.
pub struct TermStore {
    dir: Option<PathBuf>,
    wal: Option<WriteAheadLog>,
    state: RwLock<GraphState>,
    next_tx_id: AtomicU64,
    next_node_id: AtomicU64,
    next_edge_id: AtomicU64,
    closed: AtomicBool,
}

impl TermStore {
    /// Open (or create) a store in `dir`, recovering committed transactions.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir)?;

        let snapshot_path = dir.join(SNAPSHOT_FILE);
        let snapshot = if snapshot_path.exists() {
            let bytes = fs::read(&snapshot_path)?;
            bincode::deserialize::<Snapshot>(&bytes).map_err(encode_err)?
        } else {
            Snapshot::default()
        };
        let (snap_next_node, snap_next_edge) = (snapshot.next_node_id, snapshot.next_edge_id);

        let wal = WriteAheadLog::open(&dir.join(WAL_FILE))?;
        let mut state = GraphState::from_snapshot(snapshot);
        let (replayed, max_tx_id) = Self::recover(&wal, &mut state)?;

        let (max_node, max_edge) = state.max_ids();
        let store = Self {
            dir: Some(dir.to_path_buf()),
            wal: Some(wal),
            state: RwLock::new(state),
            next_tx_id: AtomicU64::new(max_tx_id + 1),
            next_node_id: AtomicU64::new(max_node.max(snap_next_node)),
            next_edge_id: AtomicU64::new(max_edge.max(snap_next_edge)),
            closed: AtomicBool::new(false),
        };
        // Fold the recovered state into a fresh snapshot so leftovers of
        // uncommitted transactions never meet this session's entries.
        store.checkpoint()?;

        tracing::info!(
            dir = %dir.display(),
            nodes = store.node_count(),
            edges = store.edge_count(),
            replayed_transactions = replayed,
            "opened term store"
        );

        Ok(store)
    }

    /// A store with no files behind it.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            wal: None,
            state: RwLock::new(GraphState::default()),
            next_tx_id: AtomicU64::new(1),
            next_node_id: AtomicU64::new(0),
            next_edge_id: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Apply committed transactions from the WAL, in commit order. Returns the
    /// number applied and the highest transaction id seen, committed or not.
    fn recover(wal: &WriteAheadLog, state: &mut GraphState) -> Result<(usize, u64), StoreError> {
        let mut open_txs: HashMap<u64, Vec<WalEntry>> = HashMap::new();
        let mut committed: Vec<Vec<WalEntry>> = Vec::new();
        let mut max_tx_id = 0;

        wal.replay(|entry| {
            max_tx_id = max_tx_id.max(entry.tx_id());
            match entry {
                WalEntry::CommitTx { tx_id } => {
                    if let Some(entries) = open_txs.remove(&tx_id) {
                        committed.push(entries);
                    }
                }
                other => open_txs.entry(other.tx_id()).or_default().push(other),
            }
            Ok(())
        })?;

        if !open_txs.is_empty() {
            tracing::warn!(
                uncommitted = open_txs.len(),
                "discarding uncommitted transactions found in WAL"
            );
        }

        let count = committed.len();
        for entries in committed {
            for entry in entries {
                state.apply(entry);
            }
        }
        Ok((count, max_tx_id))
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::SeqCst) {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }

    fn node_known(&self, tx: &Transaction, node: NodeId) -> bool {
        tx.created_node(node) || self.state.read().nodes.contains_key(&node)
    }

    /// Write a snapshot and truncate the WAL. No-op for in-memory stores.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let (Some(dir), Some(wal)) = (self.dir.as_ref(), self.wal.as_ref()) else {
            return Ok(());
        };

        // Commits need the write lock, so nothing lands in the WAL between
        // the snapshot and the truncate.
        let state = self.state.read();
        let snapshot = state.to_snapshot(
            self.next_node_id.load(Ordering::SeqCst),
            self.next_edge_id.load(Ordering::SeqCst),
        );
        let data = bincode::serialize(&snapshot).map_err(encode_err)?;

        let path = dir.join(SNAPSHOT_FILE);
        let tmp = path.with_extension("snapshot.tmp");
        {
            let mut f = File::create(&tmp)?;
            f.write_all(&data)?;
            f.sync_all()?;
        }
        fs::rename(&tmp, &path)?;
        wal.truncate()?;

        tracing::debug!(
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "checkpointed term store"
        );
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    // ========================================================================
    // Read Operations
    // ========================================================================

    pub fn node_count(&self) -> usize {
        self.state.read().nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.state.read().edges.len()
    }

    pub fn node_by_key(&self, key: &str) -> Option<TermNode> {
        let state = self.state.read();
        let id = state.key_index.get(key)?;
        state.nodes.get(id).cloned()
    }

    pub fn node(&self, id: NodeId) -> Option<TermNode> {
        self.state.read().nodes.get(&id).cloned()
    }

    pub fn outgoing(&self, id: NodeId) -> Vec<Edge> {
        self.state.read().outgoing_edges(id).cloned().collect()
    }

    /// Edges between two keys, in creation order.
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<Edge> {
        let state = self.state.read();
        let (Some(from), Some(to)) = (state.key_index.get(from), state.key_index.get(to)) else {
            return Vec::new();
        };
        state
            .outgoing_edges(*from)
            .filter(|e| e.to == *to)
            .cloned()
            .collect()
    }

    /// Render the committed graph as JSON (keys instead of internal ids).
    pub fn to_json(&self) -> serde_json::Value {
        let state = self.state.read();
        let key_of = |id: &NodeId| {
            state
                .nodes
                .get(id)
                .map(|n| n.key.clone())
                .unwrap_or_default()
        };

        let nodes: Vec<serde_json::Value> = state
            .nodes
            .values()
            .map(|node| {
                let properties: serde_json::Map<String, serde_json::Value> = node
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect();
                serde_json::json!({
                    "key": node.key,
                    "labels": [TERM],
                    "properties": properties,
                })
            })
            .collect();

        let edges: Vec<serde_json::Value> = state
            .edges
            .values()
            .map(|edge| {
                serde_json::json!({
                    "from": key_of(&edge.from),
                    "to": key_of(&edge.to),
                    "kind": edge.kind,
                    "semanticLabel": edge.label,
                    "strength": edge.strength,
                })
            })
            .collect();

        serde_json::json!({ "nodes": nodes, "edges": edges })
    }

    pub fn export_json(&self, path: &Path) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| StoreError::Encode(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}

impl GraphStore for TermStore {
    fn begin(&self) -> Result<Transaction, StoreError> {
        self.ensure_open()?;
        let tx_id = self.next_tx_id.fetch_add(1, Ordering::SeqCst);
        Ok(Transaction::new(tx_id))
    }

    fn upsert_node(&self, tx: &mut Transaction, key: &str) -> Result<NodeId, StoreError> {
        tx.ensure_active()?;
        if key.trim().is_empty() {
            return Err(StoreError::EmptyKey);
        }

        if let Some(id) = tx.new_nodes.get(key) {
            return Ok(*id);
        }
        if let Some(id) = self.state.read().key_index.get(key) {
            return Ok(*id);
        }

        let id = self.next_node_id.fetch_add(1, Ordering::SeqCst);
        tx.new_nodes.insert(key.to_string(), id);
        tx.writes.push(PendingWrite::CreateNode {
            id,
            key: key.to_string(),
        });
        Ok(id)
    }

    fn set_property_if_absent(
        &self,
        tx: &mut Transaction,
        node: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<bool, StoreError> {
        tx.ensure_active()?;
        if !self.node_known(tx, node) {
            return Err(StoreError::UnknownNode(node));
        }

        let slot = (node, key.to_string());
        if tx.new_props.contains(&slot) || self.state.read().has_property(node, key) {
            return Ok(false);
        }

        tx.new_props.insert(slot);
        tx.writes.push(PendingWrite::SetProperty {
            node,
            key: key.to_string(),
            value,
        });
        Ok(true)
    }

    fn edges(&self, tx: &Transaction, node: NodeId) -> Result<Vec<Edge>, StoreError> {
        let mut edges = self.outgoing(node);
        edges.extend(tx.new_edges.iter().filter(|e| e.from == node).cloned());
        Ok(edges)
    }

    fn create_edge(
        &self,
        tx: &mut Transaction,
        from: NodeId,
        to: NodeId,
        kind: &str,
        label: &str,
        strength: f64,
    ) -> Result<EdgeId, StoreError> {
        tx.ensure_active()?;
        for node in [from, to] {
            if !self.node_known(tx, node) {
                return Err(StoreError::UnknownNode(node));
            }
        }

        let edge = Edge {
            id: self.next_edge_id.fetch_add(1, Ordering::SeqCst),
            from,
            to,
            kind: kind.to_string(),
            label: label.to_string(),
            strength,
        };
        let id = edge.id;
        tx.new_edges.push(edge.clone());
        tx.writes.push(PendingWrite::CreateEdge(edge));
        Ok(id)
    }

    fn commit(&self, mut tx: Transaction) -> Result<CommitSummary, StoreError> {
        self.ensure_open()?;
        tx.ensure_active()?;

        let mut state = self.state.write();

        for (key, id) in &tx.new_nodes {
            if let Some(existing) = state.key_index.get(key) {
                if existing != id {
                    return Err(StoreError::UniqueViolation { key: key.clone() });
                }
            }
        }

        let mut summary = CommitSummary::default();
        let mut triples: HashSet<(NodeId, NodeId, String)> = HashSet::new();
        let mut entries = vec![WalEntry::BeginTx {
            tx_id: tx.id,
            timestamp: chrono::Utc::now().timestamp(),
        }];

        for write in tx.writes.drain(..) {
            match write {
                PendingWrite::CreateNode { id, key } => {
                    summary.nodes_created += 1;
                    entries.push(WalEntry::CreateNode {
                        tx_id: tx.id,
                        node_id: id,
                        key,
                    });
                }
                PendingWrite::SetProperty { node, key, value } => {
                    if state.has_property(node, &key) {
                        continue;
                    }
                    summary.properties_set += 1;
                    entries.push(WalEntry::SetProperty {
                        tx_id: tx.id,
                        node_id: node,
                        key,
                        value,
                    });
                }
                PendingWrite::CreateEdge(edge) => {
                    let fresh = triples.insert((edge.from, edge.to, edge.label.clone()));
                    if !fresh || state.has_edge(edge.from, edge.to, &edge.label) {
                        summary.edges_skipped += 1;
                        continue;
                    }
                    summary.edges_created += 1;
                    entries.push(WalEntry::CreateEdge { tx_id: tx.id, edge });
                }
            }
        }
        entries.push(WalEntry::CommitTx { tx_id: tx.id });

        if let Some(wal) = &self.wal {
            wal.append_all(&entries)?;
        }
        for entry in entries {
            state.apply(entry);
        }

        tx.state = TxState::Committed;
        tracing::trace!(tx_id = tx.id, ?summary, "committed transaction");
        Ok(summary)
    }

    fn rollback(&self, mut tx: Transaction) -> Result<(), StoreError> {
        tx.ensure_active()?;
        tx.state = TxState::RolledBack;
        tracing::debug!(tx_id = tx.id, discarded = tx.writes.len(), "rolled back transaction");
        Ok(())
    }

    fn close(&self) -> Result<(), StoreError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.checkpoint()?;
        tracing::info!(
            nodes = self.node_count(),
            edges = self.edge_count(),
            "closed term store"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_torn_wal_tail_is_ignored() {
        let dir = tempdir().unwrap();
        {
            let store = TermStore::open(dir.path()).unwrap();
            let mut tx = store.begin().unwrap();
            store.upsert_node(&mut tx, "alpha").unwrap();
            store.commit(tx).unwrap();
        }

        // Simulate a crash in the middle of writing the next record.
        let mut f = OpenOptions::new()
            .append(true)
            .open(dir.path().join(WAL_FILE))
            .unwrap();
        f.write_all(&64u32.to_le_bytes()).unwrap();
        f.write_all(&[1, 2, 3]).unwrap();
        drop(f);

        {
            let store = TermStore::open(dir.path()).unwrap();
            assert!(store.node_by_key("alpha").is_some());
            let mut tx = store.begin().unwrap();
            store.upsert_node(&mut tx, "beta").unwrap();
            store.commit(tx).unwrap();
            // Dropped without close again.
        }

        let store = TermStore::open(dir.path()).unwrap();
        assert!(store.node_by_key("alpha").is_some());
        assert!(store.node_by_key("beta").is_some());
    }

    #[test]
    fn test_torn_tail_is_cut_from_the_wal() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(WAL_FILE);
        let wal = WriteAheadLog::open(&path).unwrap();
        let written = wal
            .append_all(&[WalEntry::CommitTx { tx_id: 1 }])
            .unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&64u32.to_le_bytes()).unwrap();
            f.write_all(&[1, 2, 3]).unwrap();
        }

        let mut entries = 0;
        wal.replay(|_| {
            entries += 1;
            Ok(())
        })
        .unwrap();
        assert_eq!(entries, 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), written);
    }

    #[test]
    fn test_leftover_uncommitted_entries_do_not_join_new_transactions() {
        let dir = tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join(WAL_FILE)).unwrap();
        wal.append_all(&[
            WalEntry::BeginTx {
                tx_id: 1,
                timestamp: 0,
            },
            WalEntry::CreateNode {
                tx_id: 1,
                node_id: 0,
                key: "ghost".to_string(),
            },
        ])
        .unwrap();
        drop(wal);

        {
            let store = TermStore::open(dir.path()).unwrap();
            let mut tx = store.begin().unwrap();
            assert!(tx.id > 1);
            store.upsert_node(&mut tx, "real").unwrap();
            store.commit(tx).unwrap();
            // Dropped without close: the commit lives only in the WAL.
        }

        let store = TermStore::open(dir.path()).unwrap();
        assert!(store.node_by_key("ghost").is_none());
        assert!(store.node_by_key("real").is_some());
        assert_eq!(store.node_count(), 1);
    }

    #[test]
    fn test_uncommitted_batch_is_discarded() {
        let dir = tempdir().unwrap();
        let wal = WriteAheadLog::open(&dir.path().join(WAL_FILE)).unwrap();
        wal.append_all(&[
            WalEntry::BeginTx {
                tx_id: 7,
                timestamp: 0,
            },
            WalEntry::CreateNode {
                tx_id: 7,
                node_id: 0,
                key: "ghost".to_string(),
            },
        ])
        .unwrap();
        drop(wal);

        let store = TermStore::open(dir.path()).unwrap();
        assert!(store.node_by_key("ghost").is_none());
        assert_eq!(store.node_count(), 0);
    }
}
