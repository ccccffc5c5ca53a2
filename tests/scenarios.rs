//! End-to-end scenarios against a real on-disk file, mirroring the scan
//! behavior a REPL session would observe.

use mysqlite::executor::{exec_insert, exec_select};
use mysqlite::node::NodeType;
use mysqlite::row::Row;
use mysqlite::table::node_max_key;
use mysqlite::{Error, Table};
use tempfile::NamedTempFile;

fn ids(rows: &[Row]) -> Vec<u32> {
    rows.iter().map(|r| r.id).collect()
}

/// Walks every internal node, asserting `key[i] == max_key(child[i])` for
/// every cell including the right child, and collects every leaf's keys in
/// tree order (left to right) to check global ordering and completeness.
fn collect_leaf_keys_and_check_internal_keys(table: &mut Table, page_num: u32, out: &mut Vec<u32>) {
    let page = table.get_page(page_num).unwrap();
    let (node_type, num_keys) = {
        let guard = page.lock().unwrap();
        (guard.node_type().unwrap(), guard.internal_num_keys())
    };
    match node_type {
        NodeType::Leaf => {
            let page = table.get_page(page_num).unwrap();
            let guard = page.lock().unwrap();
            for i in 0..guard.leaf_num_cells() as usize {
                out.push(guard.leaf_key(i));
            }
        }
        NodeType::Internal => {
            for i in 0..num_keys {
                let child = {
                    let page = table.get_page(page_num).unwrap();
                    page.lock().unwrap().internal_child_at(i as usize)
                };
                let stored_key = {
                    let page = table.get_page(page_num).unwrap();
                    page.lock().unwrap().internal_key_at(i as usize)
                };
                let actual_max = node_max_key(table, child).unwrap();
                assert_eq!(stored_key, actual_max, "internal key for child {} out of sync", i);
                collect_leaf_keys_and_check_internal_keys(table, child, out);
            }
            let right_child = {
                let page = table.get_page(page_num).unwrap();
                page.lock().unwrap().internal_right_child()
            };
            collect_leaf_keys_and_check_internal_keys(table, right_child, out);
        }
    }
}

/// Walks the `next_leaf` linked list starting from the leftmost leaf,
/// returning the keys of every leaf visited in link order.
fn collect_leaves_via_next_leaf_chain(table: &mut Table, mut page_num: u32) -> Vec<u32> {
    let mut keys = Vec::new();
    loop {
        let page = table.get_page(page_num).unwrap();
        let (leaf_keys, next): (Vec<u32>, u32) = {
            let guard = page.lock().unwrap();
            ((0..guard.leaf_num_cells() as usize).map(|i| guard.leaf_key(i)).collect(), guard.leaf_next_leaf())
        };
        keys.extend(leaf_keys);
        if next == 0 {
            break;
        }
        page_num = next;
    }
    keys
}

fn leftmost_leaf(table: &mut Table, mut page_num: u32) -> u32 {
    loop {
        let page = table.get_page(page_num).unwrap();
        let (node_type, child0) = {
            let guard = page.lock().unwrap();
            match guard.node_type().unwrap() {
                NodeType::Leaf => return page_num,
                NodeType::Internal => (NodeType::Internal, guard.internal_child_at(0)),
            }
        };
        debug_assert_eq!(node_type, NodeType::Internal);
        page_num = child0;
    }
}

#[test]
fn s1_single_row_round_trips_across_reopen() {
    let f = NamedTempFile::new().unwrap();
    {
        let mut table = Table::open(f.path()).unwrap();
        exec_insert(&mut table, Row::new(1, "user1", "person1@example.com").unwrap()).unwrap();
        table.close().unwrap();
    }
    let mut table = Table::open(f.path()).unwrap();
    let rows = exec_select(&mut table).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, 1);
    assert_eq!(rows[0].username, "user1");
    assert_eq!(rows[0].email, "person1@example.com");
}

#[test]
fn s2_duplicate_insert_is_rejected_and_leaves_original() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    exec_insert(&mut table, Row::new(1, "a", "a@a").unwrap()).unwrap();
    let result = exec_insert(&mut table, Row::new(1, "b", "b@b").unwrap());
    assert!(matches!(result, Err(Error::Duplicate(1))));

    let rows = exec_select(&mut table).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].username, "a");
}

#[test]
fn s3_fourteen_inserts_force_a_leaf_split_and_scan_stays_ordered() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    for id in 1..=14u32 {
        exec_insert(&mut table, Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()).unwrap();
    }
    let rows = exec_select(&mut table).unwrap();
    assert_eq!(ids(&rows), (1..=14).collect::<Vec<_>>());
}

#[test]
fn s4_out_of_order_inserts_come_back_sorted() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    for id in [18, 7, 10, 29, 23, 4, 14] {
        exec_insert(&mut table, Row::new(id, "u", "e@e").unwrap()).unwrap();
    }
    let rows = exec_select(&mut table).unwrap();
    assert_eq!(ids(&rows), vec![4, 7, 10, 14, 18, 23, 29]);
}

#[test]
fn s5_deep_tree_forces_internal_split_and_survives_reopen() {
    let f = NamedTempFile::new().unwrap();
    {
        let mut table = Table::open(f.path()).unwrap();
        for id in 1..=32u32 {
            exec_insert(&mut table, Row::new(id, format!("u{id}"), format!("e{id}@x")).unwrap()).unwrap();
        }
        let rows = exec_select(&mut table).unwrap();
        assert_eq!(ids(&rows), (1..=32).collect::<Vec<_>>());
        table.close().unwrap();
    }
    let mut table = Table::open(f.path()).unwrap();
    let rows = exec_select(&mut table).unwrap();
    assert_eq!(ids(&rows), (1..=32).collect::<Vec<_>>());
}

#[test]
fn s6_max_length_strings_round_trip() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    let username = "u".repeat(32);
    let email = "e".repeat(255);
    exec_insert(&mut table, Row::new(1, username.clone(), email.clone()).unwrap()).unwrap();
    let rows = exec_select(&mut table).unwrap();
    assert_eq!(rows[0].username, username);
    assert_eq!(rows[0].email, email);
}

#[test]
fn node_invariants_hold_across_leaf_and_internal_splits() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    for id in 1..=32u32 {
        exec_insert(&mut table, Row::new(id, format!("u{id}"), format!("e{id}@x")).unwrap()).unwrap();
    }

    let root = table.root_page_num;
    let mut tree_order_keys = Vec::new();
    collect_leaf_keys_and_check_internal_keys(&mut table, root, &mut tree_order_keys);
    assert_eq!(tree_order_keys, (1..=32).collect::<Vec<_>>(), "leaf keys out of order when read via tree descent");

    let leftmost = leftmost_leaf(&mut table, root);
    let chain_keys = collect_leaves_via_next_leaf_chain(&mut table, leftmost);
    assert_eq!(chain_keys, (1..=32).collect::<Vec<_>>(), "next_leaf chain skipped or duplicated a leaf");
}

#[test]
fn s3_dump_shows_a_two_level_tree_split_at_the_boundary() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    for id in 1..=14u32 {
        exec_insert(&mut table, Row::new(id, format!("user{id}"), format!("user{id}@example.com")).unwrap()).unwrap();
    }
    let dump = mysqlite::dump::dump_tree(&mut table, table.root_page_num, 0).unwrap();
    assert!(dump.contains("internal (size 1)"), "expected one root split key, got:\n{dump}");
    assert_eq!(dump.matches("leaf (size 7)").count(), 2, "expected both leaves at the 7/7 split boundary, got:\n{dump}");
}

#[test]
fn page_alignment_holds_after_close() {
    let f = NamedTempFile::new().unwrap();
    let mut table = Table::open(f.path()).unwrap();
    for id in 1..=50u32 {
        exec_insert(&mut table, Row::new(id, "u", "e@e").unwrap()).unwrap();
    }
    table.close().unwrap();
    let len = std::fs::metadata(f.path()).unwrap().len();
    assert_eq!(len % 4096, 0);
}
