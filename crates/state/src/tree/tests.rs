// Path: crates/state/src/tree/tests.rs

use super::*;
use crate::store::MemoryTreeStore;
use nomen_types::hash::sha3_256;
use proptest::prelude::*;

fn fresh() -> NameTree<MemoryTreeStore> {
    NameTree::open(MemoryTreeStore::new(), 8).unwrap()
}

fn key(tag: &str) -> Hash {
    sha3_256(tag.as_bytes())
}

#[test]
fn empty_tree_has_zero_root() {
    let mut tree = fresh();
    assert_eq!(tree.root(), Hash::ZERO);
    assert_eq!(tree.get(&key("a")).unwrap(), None);
    // Committing nothing is a no-op.
    assert_eq!(tree.commit().unwrap(), Hash::ZERO);
}

#[test]
fn staged_writes_are_invisible_until_commit() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
    assert_eq!(tree.get(&key("a")).unwrap(), None);
    assert_eq!(tree.get_pending(&key("a")).unwrap(), Some(b"va".to_vec()));

    let root = tree.commit().unwrap();
    assert_ne!(root, Hash::ZERO);
    assert_eq!(tree.get(&key("a")).unwrap(), Some(b"va".to_vec()));
    assert_eq!(tree.staged(), 0);
}

#[test]
fn clear_staging_drops_the_overlay() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
    tree.stage_remove(key("b"));
    tree.clear_staging();
    assert_eq!(tree.staged(), 0);
    assert_eq!(tree.commit().unwrap(), Hash::ZERO);
}

#[test]
fn root_is_insertion_order_independent() {
    let entries: Vec<(Hash, Vec<u8>)> = (0..24)
        .map(|i| (key(&format!("name-{i}")), format!("value-{i}").into_bytes()))
        .collect();

    let mut forward = fresh();
    for (k, v) in &entries {
        forward.stage_insert(*k, v.clone()).unwrap();
    }
    let forward_root = forward.commit().unwrap();

    let mut reverse = fresh();
    for (k, v) in entries.iter().rev() {
        reverse.stage_insert(*k, v.clone()).unwrap();
    }
    // Also split across several commits.
    let mut split = fresh();
    for chunk in entries.chunks(5) {
        for (k, v) in chunk {
            split.stage_insert(*k, v.clone()).unwrap();
        }
        split.commit().unwrap();
    }

    assert_eq!(reverse.commit().unwrap(), forward_root);
    assert_eq!(split.root(), forward_root);
}

#[test]
fn remove_restores_the_prior_root() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
    tree.stage_insert(key("b"), b"vb".to_vec()).unwrap();
    let two_root = tree.commit().unwrap();

    tree.stage_insert(key("c"), b"vc".to_vec()).unwrap();
    let three_root = tree.commit().unwrap();
    assert_ne!(two_root, three_root);

    tree.stage_remove(key("c"));
    assert_eq!(tree.commit().unwrap(), two_root);
    assert_eq!(tree.get(&key("c")).unwrap(), None);
    assert_eq!(tree.get(&key("b")).unwrap(), Some(b"vb".to_vec()));
}

#[test]
fn removing_to_empty_restores_zero_root() {
    let mut tree = fresh();
    for tag in ["a", "b", "c"] {
        tree.stage_insert(key(tag), tag.as_bytes().to_vec()).unwrap();
    }
    tree.commit().unwrap();
    for tag in ["a", "b", "c"] {
        tree.stage_remove(key(tag));
    }
    assert_eq!(tree.commit().unwrap(), Hash::ZERO);
}

#[test]
fn overlay_remove_masks_committed_value() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
    tree.commit().unwrap();
    tree.stage_remove(key("a"));
    assert_eq!(tree.get_pending(&key("a")).unwrap(), None);
    assert_eq!(tree.get(&key("a")).unwrap(), Some(b"va".to_vec()));
}

#[test]
fn membership_proofs_verify() {
    let mut tree = fresh();
    for i in 0..40 {
        tree.stage_insert(key(&format!("n{i}")), format!("v{i}").into_bytes())
            .unwrap();
    }
    let root = tree.commit().unwrap();

    for i in [0, 7, 39] {
        let k = key(&format!("n{i}"));
        let proof = tree.prove(&k, &root).unwrap();
        assert_eq!(
            proof.verify(&root, &k).unwrap(),
            Some(format!("v{i}").into_bytes())
        );
        // Same proof against the wrong key must not verify.
        assert!(proof.verify(&root, &key("other")).is_err());
    }
}

#[test]
fn absence_proofs_verify() {
    let mut tree = fresh();
    for i in 0..10 {
        tree.stage_insert(key(&format!("n{i}")), vec![i as u8]).unwrap();
    }
    let root = tree.commit().unwrap();

    let absent = key("never-inserted");
    let proof = tree.prove(&absent, &root).unwrap();
    assert_eq!(proof.verify(&root, &absent).unwrap(), None);
}

#[test]
fn proof_transports_over_the_wire() {
    use nomen_types::{Decodable, Encodable};

    let mut tree = fresh();
    for i in 0..12 {
        tree.stage_insert(key(&format!("n{i}")), vec![i as u8]).unwrap();
    }
    let root = tree.commit().unwrap();
    let k = key("n3");
    let proof = tree.prove(&k, &root).unwrap();
    let revived = TreeProof::decode(&proof.encode()).unwrap();
    assert_eq!(revived.verify(&root, &k).unwrap(), Some(vec![3u8]));
}

#[test]
fn tampered_proof_fails() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
    tree.stage_insert(key("b"), b"vb".to_vec()).unwrap();
    let root = tree.commit().unwrap();

    let k = key("a");
    let proof = tree.prove(&k, &root).unwrap();
    // Claiming a different value must break the hash chain.
    let forged = TreeProof {
        steps: proof.steps.clone(),
        terminal: ProofTerminal::Found {
            value: b"forged".to_vec(),
        },
    };
    assert!(matches!(
        forged.verify(&root, &k),
        Err(TreeError::ProofDidNotAnchor)
    ));
}

#[test]
fn historical_roots_serve_proofs() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"old".to_vec()).unwrap();
    let old_root = tree.commit().unwrap();

    tree.stage_insert(key("a"), b"new".to_vec()).unwrap();
    tree.stage_insert(key("b"), b"vb".to_vec()).unwrap();
    let new_root = tree.commit().unwrap();
    assert_ne!(old_root, new_root);

    // The old root still proves the old value.
    let proof = tree.prove(&key("a"), &old_root).unwrap();
    assert_eq!(
        proof.verify(&old_root, &key("a")).unwrap(),
        Some(b"old".to_vec())
    );
    // And proves b absent, even though it exists now.
    let proof = tree.prove(&key("b"), &old_root).unwrap();
    assert_eq!(proof.verify(&old_root, &key("b")).unwrap(), None);
}

#[test]
fn retention_window_expires_old_roots() {
    let mut tree = NameTree::open(MemoryTreeStore::new(), 2).unwrap();
    tree.stage_insert(key("a"), b"1".to_vec()).unwrap();
    let first = tree.commit().unwrap();
    tree.stage_insert(key("b"), b"2".to_vec()).unwrap();
    tree.commit().unwrap();
    tree.stage_insert(key("c"), b"3".to_vec()).unwrap();
    tree.commit().unwrap();

    assert!(!tree.is_retained(&first));
    assert!(matches!(
        tree.prove(&key("a"), &first),
        Err(TreeError::UnknownRoot(_))
    ));
}

#[test]
fn inject_rolls_back_to_a_retained_root() {
    let mut tree = fresh();
    tree.stage_insert(key("a"), b"1".to_vec()).unwrap();
    let fork_root = tree.commit().unwrap();
    tree.stage_insert(key("b"), b"2".to_vec()).unwrap();
    let tip_root = tree.commit().unwrap();

    tree.inject(fork_root).unwrap();
    assert_eq!(tree.root(), fork_root);
    assert_eq!(tree.get(&key("b")).unwrap(), None);
    assert_eq!(tree.get(&key("a")).unwrap(), Some(b"1".to_vec()));

    // Rolling forward again is also just an inject while retained.
    tree.inject(tip_root).unwrap();
    assert_eq!(tree.get(&key("b")).unwrap(), Some(b"2".to_vec()));

    assert!(matches!(
        tree.inject(sha3_256(b"unknown")),
        Err(TreeError::UnknownRoot(_))
    ));
}

#[test]
fn oversized_value_is_rejected() {
    let mut tree = fresh();
    let err = tree
        .stage_insert(key("a"), vec![0u8; MAX_VALUE_SIZE + 1])
        .unwrap_err();
    assert!(matches!(err, TreeError::ValueTooLarge { .. }));
}

#[test]
fn reopen_resumes_from_latest_root() {
    let mut store = MemoryTreeStore::new();
    let root = {
        let mut tree = NameTree::open(&mut store, 8).unwrap();
        tree.stage_insert(key("a"), b"va".to_vec()).unwrap();
        tree.commit().unwrap()
    };
    let mut tree = NameTree::open(&mut store, 8).unwrap();
    assert_eq!(tree.root(), root);
    assert_eq!(tree.get(&key("a")).unwrap(), Some(b"va".to_vec()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Inserting a set then removing a subset matches a tree built from
    /// the difference alone, whatever the interleaving.
    #[test]
    fn insert_remove_matches_direct_build(
        keep in proptest::collection::btree_set(0u16..200, 0..24),
        drop in proptest::collection::btree_set(200u16..400, 0..24),
    ) {
        let mut staged = fresh();
        for i in keep.iter().chain(drop.iter()) {
            staged.stage_insert(key(&format!("k{i}")), i.to_le_bytes().to_vec()).unwrap();
        }
        staged.commit().unwrap();
        for i in drop.iter() {
            staged.stage_remove(key(&format!("k{i}")));
        }
        let pruned_root = staged.commit().unwrap();

        let mut direct = fresh();
        for i in keep.iter() {
            direct.stage_insert(key(&format!("k{i}")), i.to_le_bytes().to_vec()).unwrap();
        }
        prop_assert_eq!(direct.commit().unwrap(), pruned_root);
    }

    /// Every key in a random tree both proves present and roundtrips its
    /// proof over the wire.
    #[test]
    fn proofs_hold_for_random_trees(
        keys in proptest::collection::btree_set(0u16..500, 1..32),
    ) {
        use nomen_types::{Decodable, Encodable};

        let mut tree = fresh();
        for i in keys.iter() {
            tree.stage_insert(key(&format!("k{i}")), i.to_le_bytes().to_vec()).unwrap();
        }
        let root = tree.commit().unwrap();
        for i in keys.iter() {
            let k = key(&format!("k{i}"));
            let proof = tree.prove(&k, &root).unwrap();
            let bytes = proof.encode();
            prop_assert_eq!(bytes.len(), proof.encoded_size());
            let revived = TreeProof::decode(&bytes).unwrap();
            prop_assert_eq!(
                revived.verify(&root, &k).unwrap(),
                Some(i.to_le_bytes().to_vec())
            );
        }
    }
}
