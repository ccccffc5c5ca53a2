//! B+ tree search, insert, split and root-creation algorithms.
//!
//! Every function here takes a [`Table`] and a page number rather than an
//! owned node graph: nodes are addressed by page number throughout, and the
//! pager's `Arc<Mutex<Page>>` handles are locked only for the duration of a
//! single read or write.

use crate::errors::Error;
use crate::node::{NodeType, Page, INTERNAL_MAX_CELLS, INVALID_PAGE_NUM, LEAF_LEFT_SPLIT_COUNT, LEAF_MAX_CELLS, LEAF_RIGHT_SPLIT_COUNT};
use crate::row::Row;
use crate::table::{node_max_key, Table};
use tracing::trace;

fn lock(page: &std::sync::Arc<std::sync::Mutex<Page>>) -> Result<std::sync::MutexGuard<'_, Page>, Error> {
    page.lock().map_err(|_| err!(Storage, "page lock poisoned"))
}

/// Binary-searches a leaf's cells for `key`, returning the index of the
/// first cell whose key is `>= key` (an insertion point, not necessarily a
/// match).
pub fn leaf_find_cell(page: &Page, key: u32) -> usize {
    let mut lo = 0usize;
    let mut hi = page.leaf_num_cells() as usize;
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if page.leaf_key(mid) == key {
            return mid;
        }
        if key < page.leaf_key(mid) {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Binary-searches an internal node's keys for the index of the child that
/// should contain `key`.
pub fn internal_find_child_index(page: &Page, key: u32) -> u32 {
    let mut lo = 0u32;
    let mut hi = page.internal_num_keys();
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if page.internal_key_at(mid as usize) >= key {
            hi = mid;
        } else {
            lo = mid + 1;
        }
    }
    lo
}

/// Descends from `page_num` to the leaf that contains (or should contain)
/// `key`, returning its page number.
pub fn find_leaf(table: &mut Table, page_num: u32, key: u32) -> Result<u32, Error> {
    let page = table.get_page(page_num)?;
    let (node_type, child) = {
        let guard = lock(&page)?;
        match guard.node_type()? {
            NodeType::Leaf => return Ok(page_num),
            NodeType::Internal => {
                let idx = internal_find_child_index(&guard, key);
                (NodeType::Internal, guard.internal_child(idx)?)
            }
        }
    };
    debug_assert_eq!(node_type, NodeType::Internal);
    find_leaf(table, child, key)
}

/// Inserts `(key, row)` into the leaf at `page_num`, which must not already
/// be full. Splits are handled by [`leaf_split_and_insert`], called by
/// [`crate::executor::exec_insert`] when the target leaf is full.
pub fn leaf_insert(table: &mut Table, page_num: u32, key: u32, row: &Row) -> Result<(), Error> {
    let page = table.get_page(page_num)?;
    let mut guard = lock(&page)?;
    let num_cells = guard.leaf_num_cells() as usize;
    debug_assert!(num_cells < LEAF_MAX_CELLS);

    let cell_num = leaf_find_cell(&guard, key);
    for i in (cell_num..num_cells).rev() {
        let (a, b) = (i, i + 1);
        let src = guard.leaf_cell(a).to_vec();
        guard.leaf_cell_mut(b).copy_from_slice(&src);
    }
    guard.set_leaf_key(cell_num, key);
    row.serialize(guard.leaf_value_mut(cell_num))?;
    guard.set_leaf_num_cells(num_cells as u32 + 1);
    Ok(())
}

/// Splits a full leaf, inserting `(key, row)` into the correct half, then
/// propagates the new split key up to the parent (creating a new root if
/// the leaf being split was the root).
pub fn leaf_split_and_insert(table: &mut Table, leaf_page_num: u32, key: u32, row: &Row) -> Result<(), Error> {
    let new_page_num = table.pager.get_unused_page_num();
    let new_page = table.get_page(new_page_num)?;
    let old_page = table.get_page(leaf_page_num)?;

    let (old_is_root, old_parent, old_max_key_before) = {
        let guard = lock(&old_page)?;
        (guard.is_root(), guard.parent(), guard.leaf_max_key())
    };

    // Gather all LEAF_MAX_CELLS + 1 cells (old contents plus the new one) in
    // order, then redistribute: left gets LEAF_LEFT_SPLIT_COUNT, right gets
    // the remainder.
    let mut cells: Vec<(u32, Vec<u8>)> = Vec::with_capacity(LEAF_MAX_CELLS + 1);
    {
        let guard = lock(&old_page)?;
        for i in 0..LEAF_MAX_CELLS {
            cells.push((guard.leaf_key(i), guard.leaf_value(i).to_vec()));
        }
    }
    let cell_num = leaf_find_cell(&lock(&old_page)?, key);
    let mut row_buf = vec![0u8; crate::row::SIZE_ROW];
    row.serialize(&mut row_buf)?;
    cells.insert(cell_num, (key, row_buf));

    let (left_cells, right_cells) = cells.split_at(LEAF_LEFT_SPLIT_COUNT);
    debug_assert_eq!(right_cells.len(), LEAF_RIGHT_SPLIT_COUNT);

    let old_next_leaf = lock(&old_page)?.leaf_next_leaf();

    {
        let mut new_guard = lock(&new_page)?;
        new_guard.init_leaf();
        new_guard.set_parent(old_parent);
        new_guard.set_leaf_next_leaf(old_next_leaf);
        for (i, (k, v)) in right_cells.iter().enumerate() {
            new_guard.set_leaf_key(i, *k);
            new_guard.leaf_value_mut(i).copy_from_slice(v);
        }
        new_guard.set_leaf_num_cells(right_cells.len() as u32);
    }
    {
        let mut old_guard = lock(&old_page)?;
        old_guard.set_leaf_next_leaf(new_page_num);
        for (i, (k, v)) in left_cells.iter().enumerate() {
            old_guard.set_leaf_key(i, *k);
            old_guard.leaf_value_mut(i).copy_from_slice(v);
        }
        old_guard.set_leaf_num_cells(left_cells.len() as u32);
    }

    trace!(leaf_page_num, new_page_num, "Split leaf");

    if old_is_root {
        create_new_root(table, new_page_num)?;
    } else {
        let parent = old_parent;
        update_internal_node_key(table, parent, old_max_key_before, left_cells.last().unwrap().0)?;
        internal_insert(table, parent, new_page_num)?;
    }
    Ok(())
}

/// Relocates the current root's contents to a freshly allocated left child,
/// then reinitializes the root page in place as an internal node pointing at
/// that left child and at `right_page_num` (the root's split sibling). The
/// root is only ever split by reference to `table.root_page_num`, so there is
/// no separate "left page" for a caller to supply.
pub fn create_new_root(table: &mut Table, right_page_num: u32) -> Result<(), Error> {
    let root_page_num = table.root_page_num;
    let new_left_page_num = table.pager.get_unused_page_num();

    let root_page = table.get_page(root_page_num)?;
    let new_left_page = table.get_page(new_left_page_num)?;

    // Copy the (full) old root's contents into a new page that becomes the
    // left child, then reinitialize the root page in place as an internal
    // node pointing at both children.
    let root_node_type = {
        let root_guard = lock(&root_page)?;
        let mut left_guard = lock(&new_left_page)?;
        left_guard.data.copy_from_slice(&root_guard.data);
        left_guard.set_is_root(false);
        root_guard.node_type()?
    };

    if root_node_type == NodeType::Internal {
        // Re-parent every child the old root had, since they now live under
        // new_left_page_num instead of root_page_num.
        let num_keys = lock(&new_left_page)?.internal_num_keys();
        for i in 0..num_keys {
            let child_num = lock(&new_left_page)?.internal_child(i)?;
            let child_page = table.get_page(child_num)?;
            lock(&child_page)?.set_parent(new_left_page_num);
        }
        let right_child = lock(&new_left_page)?.internal_child(num_keys)?;
        let right_child_page = table.get_page(right_child)?;
        lock(&right_child_page)?.set_parent(new_left_page_num);
    }

    let left_max_key = node_max_key(table, new_left_page_num)?;

    let root_page = table.get_page(root_page_num)?;
    let mut root_guard = lock(&root_page)?;
    root_guard.init_internal();
    root_guard.set_is_root(true);
    root_guard.set_internal_num_keys(1);
    root_guard.set_internal_child_at(0, new_left_page_num);
    root_guard.set_internal_key_at(0, left_max_key);
    root_guard.set_internal_right_child(right_page_num);
    drop(root_guard);

    let new_left_page = table.get_page(new_left_page_num)?;
    lock(&new_left_page)?.set_parent(root_page_num);
    let right_page = table.get_page(right_page_num)?;
    lock(&right_page)?.set_parent(root_page_num);

    trace!(root_page_num, new_left_page_num, right_page_num, "Created new root");
    Ok(())
}

/// Replaces `old_key` with `new_key` in the parent cell that points at the
/// child whose max key used to be `old_key`.
pub fn update_internal_node_key(table: &mut Table, page_num: u32, old_key: u32, new_key: u32) -> Result<(), Error> {
    let page = table.get_page(page_num)?;
    let mut guard = lock(&page)?;
    let idx = internal_find_child_index(&guard, old_key);
    if (idx as usize) < guard.internal_num_keys() as usize && guard.internal_key_at(idx as usize) == old_key {
        guard.set_internal_key_at(idx as usize, new_key);
    }
    Ok(())
}

/// Inserts a pointer to `child_page_num` into the internal node at
/// `parent_page_num`, splitting it first if it is already full.
pub fn internal_insert(table: &mut Table, parent_page_num: u32, child_page_num: u32) -> Result<(), Error> {
    let child_max_key = node_max_key(table, child_page_num)?;

    let parent_page = table.get_page(parent_page_num)?;
    let num_keys = lock(&parent_page)?.internal_num_keys() as usize;

    if num_keys >= INTERNAL_MAX_CELLS {
        return internal_split_and_insert(table, parent_page_num, child_page_num);
    }

    let right_child = lock(&parent_page)?.internal_right_child();
    debug_assert_ne!(
        right_child, INVALID_PAGE_NUM,
        "internal_insert's parent is always a pre-existing, already-populated internal node"
    );
    let right_child_max_key = node_max_key(table, right_child)?;

    let mut guard = lock(&parent_page)?;
    if child_max_key > right_child_max_key {
        // New child becomes the right child; the old right child gets a
        // regular cell.
        guard.set_internal_child_at(num_keys, right_child);
        guard.set_internal_key_at(num_keys, right_child_max_key);
        guard.set_internal_right_child(child_page_num);
    } else {
        let idx = internal_find_child_index(&guard, child_max_key) as usize;
        for i in (idx..num_keys).rev() {
            let child = guard.internal_child_at(i);
            let key = guard.internal_key_at(i);
            guard.set_internal_child_at(i + 1, child);
            guard.set_internal_key_at(i + 1, key);
        }
        guard.set_internal_child_at(idx, child_page_num);
        guard.set_internal_key_at(idx, child_max_key);
    }
    guard.set_internal_num_keys(num_keys as u32 + 1);
    drop(guard);

    let child_page = table.get_page(child_page_num)?;
    lock(&child_page)?.set_parent(parent_page_num);
    Ok(())
}

/// Splits a full internal node and inserts `child_page_num` into whichever
/// half it belongs, propagating the split up (creating a new root if the
/// node being split was the root).
pub fn internal_split_and_insert(table: &mut Table, old_page_num: u32, new_child_page_num: u32) -> Result<(), Error> {
    let old_page = table.get_page(old_page_num)?;
    let (old_is_root, old_parent) = {
        let guard = lock(&old_page)?;
        (guard.is_root(), guard.parent())
    };
    let old_max_key_before = node_max_key(table, old_page_num)?;

    // Collect every (child, key) cell plus the right child as a uniform key
    // list, insert the new child in max-key order, then split the combined
    // list across old_page_num (left) and a fresh page (right).
    let new_child_max_key = node_max_key(table, new_child_page_num)?;
    let mut entries: Vec<(u32, u32)> = Vec::with_capacity(INTERNAL_MAX_CELLS + 2);
    {
        let guard = lock(&old_page)?;
        for i in 0..guard.internal_num_keys() as usize {
            entries.push((guard.internal_child_at(i), guard.internal_key_at(i)));
        }
        entries.push((guard.internal_right_child(), node_max_key(table, guard.internal_right_child())?));
    }
    let insert_at = entries
        .iter()
        .position(|&(_, k)| k >= new_child_max_key)
        .unwrap_or(entries.len());
    entries.insert(insert_at, (new_child_page_num, new_child_max_key));

    let split_at = entries.len() / 2;
    let (left_entries, right_entries) = entries.split_at(split_at);

    let new_page_num = table.pager.get_unused_page_num();
    let new_page = table.get_page(new_page_num)?;

    {
        let mut new_guard = lock(&new_page)?;
        new_guard.init_internal();
        new_guard.set_parent(old_parent);
        let (right_last, right_rest) = right_entries.split_last().unwrap();
        for (i, &(child, key)) in right_rest.iter().enumerate() {
            new_guard.set_internal_child_at(i, child);
            new_guard.set_internal_key_at(i, key);
        }
        new_guard.set_internal_num_keys(right_rest.len() as u32);
        new_guard.set_internal_right_child(right_last.0);
    }
    {
        let mut old_guard = lock(&old_page)?;
        old_guard.init_internal();
        old_guard.set_parent(old_parent);
        let (left_last, left_rest) = left_entries.split_last().unwrap();
        for (i, &(child, key)) in left_rest.iter().enumerate() {
            old_guard.set_internal_child_at(i, child);
            old_guard.set_internal_key_at(i, key);
        }
        old_guard.set_internal_num_keys(left_rest.len() as u32);
        old_guard.set_internal_right_child(left_last.0);
    }

    for &(child, _) in left_entries.iter() {
        let p = table.get_page(child)?;
        lock(&p)?.set_parent(old_page_num);
    }
    for &(child, _) in right_entries.iter() {
        let p = table.get_page(child)?;
        lock(&p)?.set_parent(new_page_num);
    }

    let old_max_key_after = node_max_key(table, old_page_num)?;

    trace!(old_page_num, new_page_num, "Split internal node");

    if old_is_root {
        create_new_root(table, new_page_num)?;
    } else {
        let parent = old_parent;
        update_internal_node_key(table, parent, old_max_key_before, old_max_key_after)?;
        internal_insert(table, parent, new_page_num)?;
    }
    Ok(())
}
