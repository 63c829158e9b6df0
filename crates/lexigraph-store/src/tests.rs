//! Store tests: transactions, idempotence, recovery

use super::*;
use tempfile::tempdir;

/// Helper: commit one target node with a single labeled edge
fn link(store: &TermStore, from: &str, to: &str, label: &str, strength: f64) -> CommitSummary {
    let mut tx = store.begin().unwrap();
    let a = store.upsert_node(&mut tx, from).unwrap();
    let b = store.upsert_node(&mut tx, to).unwrap();
    let exists = store
        .edges(&tx, a)
        .unwrap()
        .iter()
        .any(|e| e.same_triple(a, b, label));
    if !exists {
        store
            .create_edge(&mut tx, a, b, NEIGHBOR, label, strength)
            .unwrap();
    }
    store.commit(tx).unwrap()
}

#[test]
fn test_upsert_is_idempotent_by_key() {
    let store = TermStore::in_memory();

    let mut tx = store.begin().unwrap();
    let first = store.upsert_node(&mut tx, "alpha").unwrap();
    let again = store.upsert_node(&mut tx, "alpha").unwrap();
    assert_eq!(first, again, "same transaction must see its own node");
    store.commit(tx).unwrap();

    let mut tx = store.begin().unwrap();
    let later = store.upsert_node(&mut tx, "alpha").unwrap();
    assert_eq!(first, later);
    let summary = store.commit(tx).unwrap();
    assert_eq!(summary.nodes_created, 0);
    assert_eq!(store.node_count(), 1);
}

#[test]
fn test_empty_key_rejected() {
    let store = TermStore::in_memory();
    let mut tx = store.begin().unwrap();
    assert!(matches!(
        store.upsert_node(&mut tx, "  "),
        Err(StoreError::EmptyKey)
    ));
}

#[test]
fn test_properties_first_write_wins() {
    let store = TermStore::in_memory();

    let mut tx = store.begin().unwrap();
    let node = store.upsert_node(&mut tx, "alpha").unwrap();
    assert!(store
        .set_property_if_absent(&mut tx, node, "frequency", 10i64.into())
        .unwrap());
    assert!(!store
        .set_property_if_absent(&mut tx, node, "frequency", 99i64.into())
        .unwrap());
    store.commit(tx).unwrap();

    let mut tx = store.begin().unwrap();
    assert!(!store
        .set_property_if_absent(&mut tx, node, "frequency", 42i64.into())
        .unwrap());
    store.commit(tx).unwrap();

    let stored = store.node_by_key("alpha").unwrap();
    assert_eq!(stored.property("frequency"), Some(&PropertyValue::Int(10)));
}

#[test]
fn test_edge_triples_are_unique() {
    let store = TermStore::in_memory();

    let first = link(&store, "alpha", "gamma", "x", 0.5);
    assert_eq!(first.edges_created, 1);
    let second = link(&store, "alpha", "gamma", "x", 0.5);
    assert_eq!(second.edges_created, 0);
    let other_label = link(&store, "alpha", "gamma", "y", 0.7);
    assert_eq!(other_label.edges_created, 1);

    let edges = store.edges_between("alpha", "gamma");
    assert_eq!(edges.len(), 2);
    assert_eq!(edges[0].label, "x");
    assert_eq!(edges[1].label, "y");
}

#[test]
fn test_commit_skips_duplicate_edges_from_concurrent_transactions() {
    let store = TermStore::in_memory();

    let mut setup = store.begin().unwrap();
    let a = store.upsert_node(&mut setup, "alpha").unwrap();
    let b = store.upsert_node(&mut setup, "beta").unwrap();
    store.commit(setup).unwrap();

    // Both transactions check for the edge before either commits.
    let mut tx1 = store.begin().unwrap();
    let mut tx2 = store.begin().unwrap();
    store.create_edge(&mut tx1, a, b, NEIGHBOR, "", 0.9).unwrap();
    store.create_edge(&mut tx2, a, b, NEIGHBOR, "", 0.9).unwrap();

    assert_eq!(store.commit(tx1).unwrap().edges_created, 1);
    let late = store.commit(tx2).unwrap();
    assert_eq!(late.edges_created, 0);
    assert_eq!(late.edges_skipped, 1);
    assert_eq!(store.edge_count(), 1);
}

#[test]
fn test_concurrent_node_creation_violates_unique_key() {
    let store = TermStore::in_memory();

    let mut tx1 = store.begin().unwrap();
    let mut tx2 = store.begin().unwrap();
    store.upsert_node(&mut tx1, "alpha").unwrap();
    store.upsert_node(&mut tx2, "alpha").unwrap();

    store.commit(tx1).unwrap();
    let err = store.commit(tx2).unwrap_err();
    assert!(matches!(err, StoreError::UniqueViolation { ref key } if key == "alpha"));
    assert_eq!(store.node_count(), 1);
}

#[test]
fn test_rollback_discards_everything() {
    let store = TermStore::in_memory();

    let mut tx = store.begin().unwrap();
    let a = store.upsert_node(&mut tx, "alpha").unwrap();
    let b = store.upsert_node(&mut tx, "beta").unwrap();
    store.create_edge(&mut tx, a, b, NEIGHBOR, "", 1.0).unwrap();
    store.rollback(tx).unwrap();

    assert_eq!(store.node_count(), 0);
    assert_eq!(store.edge_count(), 0);
}

#[test]
fn test_edge_to_unknown_node_rejected() {
    let store = TermStore::in_memory();
    let mut tx = store.begin().unwrap();
    let a = store.upsert_node(&mut tx, "alpha").unwrap();
    assert!(matches!(
        store.create_edge(&mut tx, a, 999, NEIGHBOR, "", 1.0),
        Err(StoreError::UnknownNode(999))
    ));
}

#[test]
fn test_recovery_replays_committed_only() {
    let dir = tempdir().unwrap();

    {
        let store = TermStore::open(dir.path()).unwrap();
        link(&store, "alpha", "beta", "", 0.9);

        let mut tx = store.begin().unwrap();
        store.upsert_node(&mut tx, "never").unwrap();
        store.rollback(tx).unwrap();
        // Dropped without close: only the WAL holds the data.
    }

    let store = TermStore::open(dir.path()).unwrap();
    assert!(store.node_by_key("alpha").is_some());
    assert!(store.node_by_key("beta").is_some());
    assert!(store.node_by_key("never").is_none());
    assert_eq!(store.edges_between("alpha", "beta").len(), 1);
}

#[test]
fn test_checkpoint_then_more_commits() {
    let dir = tempdir().unwrap();

    {
        let store = TermStore::open(dir.path()).unwrap();
        link(&store, "alpha", "beta", "", 0.9);
        store.checkpoint().unwrap();
        link(&store, "beta", "gamma", "", 0.4);
    }

    let store = TermStore::open(dir.path()).unwrap();
    assert_eq!(store.node_count(), 3);
    assert_eq!(store.edge_count(), 2);

    // Ids allocated after reopen must not collide with recovered ones.
    link(&store, "gamma", "delta", "", 0.1);
    assert_eq!(store.node_count(), 4);
    assert_eq!(store.edge_count(), 3);
}

#[test]
fn test_close_is_idempotent() {
    let dir = tempdir().unwrap();
    let store = TermStore::open(dir.path()).unwrap();
    link(&store, "alpha", "beta", "", 0.9);

    store.close().unwrap();
    store.close().unwrap();
    assert!(store.is_closed());
    assert!(matches!(store.begin(), Err(StoreError::Closed)));

    let reopened = TermStore::open(dir.path()).unwrap();
    assert_eq!(reopened.edge_count(), 1);
}

#[test]
fn test_export_json() {
    let dir = tempdir().unwrap();
    let store = TermStore::in_memory();
    link(&store, "alpha", "beta", "left * right", 0.25);

    let path = dir.path().join("out/graph.json");
    store.export_json(&path).unwrap();

    let value: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(value["nodes"].as_array().unwrap().len(), 2);
    let edge = &value["edges"][0];
    assert_eq!(edge["from"], "alpha");
    assert_eq!(edge["to"], "beta");
    assert_eq!(edge["kind"], NEIGHBOR);
    assert_eq!(edge["semanticLabel"], "left * right");
}
