//! Lexigraph term graph store
//!
//! An embedded graph of terms connected by labeled, weighted edges:
//!
//! ```text
//! ┌──────────────┐  NEIGHBOR {semanticLabel, strength}  ┌──────────────┐
//! │ TERM "alpha" │ ───────────────────────────────────► │ TERM "beta"  │
//! │ numTokens=1  │                                      │              │
//! │ frequency=.. │                                      │              │
//! └──────────────┘                                      └──────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Unique keys**: one node per term key (enforced again at commit)
//! - **First write wins**: properties are only ever set if absent
//! - **Idempotent edges**: at most one edge per (source, target, label)
//! - **Atomic**: a transaction's writes are committed as a unit, or not at all
//! - **Durable**: committed transactions are replayed from the WAL on reopen

pub mod persistence;

#[cfg(test)]
mod tests;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use persistence::{CommitSummary, TermStore, Transaction, TxState, WalEntry, WriteAheadLog};

pub type NodeId = u64;
pub type EdgeId = u64;

/// Label carried by every node in the graph.
pub const TERM: &str = "TERM";
/// Relationship kind of every similarity edge.
pub const NEIGHBOR: &str = "NEIGHBOR";

// ============================================================================
// Graph Entities
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl PropertyValue {
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            PropertyValue::Int(v) => serde_json::json!(v),
            PropertyValue::Float(v) => serde_json::json!(v),
            PropertyValue::Text(v) => serde_json::json!(v),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Float(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Float(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Text(v.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermNode {
    pub id: NodeId,
    pub key: String,
    pub properties: BTreeMap<String, PropertyValue>,
}

impl TermNode {
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub from: NodeId,
    pub to: NodeId,
    pub kind: String,
    pub label: String,
    pub strength: f64,
}

impl Edge {
    /// Identity used for idempotent edge creation.
    pub fn same_triple(&self, from: NodeId, to: NodeId, label: &str) -> bool {
        self.from == from && self.to == to && self.label == label
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encode(String),
    #[error("transaction {0} is not active")]
    TxNotActive(u64),
    #[error("unknown node {0}")]
    UnknownNode(NodeId),
    #[error("node key must not be empty")]
    EmptyKey,
    #[error("unique constraint violated for key {key:?}")]
    UniqueViolation { key: String },
    #[error("store is closed")]
    Closed,
}

// ============================================================================
// Store Contract
// ============================================================================

/// Operations the graph writer needs from a store.
///
/// Every mutation is scoped to a [`Transaction`]; reads through a transaction
/// see its own pending writes.
pub trait GraphStore: Send + Sync + 'static {
    fn begin(&self) -> Result<Transaction, StoreError>;

    /// Return the node for `key`, creating it if it does not exist.
    fn upsert_node(&self, tx: &mut Transaction, key: &str) -> Result<NodeId, StoreError>;

    /// Set a property only if the node does not have it yet. Returns whether it was set.
    fn set_property_if_absent(
        &self,
        tx: &mut Transaction,
        node: NodeId,
        key: &str,
        value: PropertyValue,
    ) -> Result<bool, StoreError>;

    /// Outgoing edges of `node`, including edges pending in `tx`.
    fn edges(&self, tx: &Transaction, node: NodeId) -> Result<Vec<Edge>, StoreError>;

    fn create_edge(
        &self,
        tx: &mut Transaction,
        from: NodeId,
        to: NodeId,
        kind: &str,
        label: &str,
        strength: f64,
    ) -> Result<EdgeId, StoreError>;

    fn commit(&self, tx: Transaction) -> Result<CommitSummary, StoreError>;

    fn rollback(&self, tx: Transaction) -> Result<(), StoreError>;

    /// Flush and release resources. Calling it more than once is a no-op.
    fn close(&self) -> Result<(), StoreError>;
}
