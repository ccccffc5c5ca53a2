//! Recursive tree-structure printer, used by the `.btree` REPL command.

use crate::errors::Error;
use crate::node::NodeType;
use crate::table::Table;
use std::fmt::Write as _;

/// Renders the tree rooted at `page_num` as indented text: leaves list their
/// keys, internal nodes list each child's subtree followed by its own key,
/// then always recurse into `right_child` — even when `num_keys == 0`, since
/// a freshly-split internal node can still hold a single right child.
pub fn dump_tree(table: &mut Table, page_num: u32, indent: usize) -> Result<String, Error> {
    let mut out = String::new();
    dump_node(table, page_num, indent, &mut out)?;
    Ok(out)
}

fn dump_node(table: &mut Table, page_num: u32, indent: usize, out: &mut String) -> Result<(), Error> {
    let page = table.get_page(page_num)?;
    let (node_type, leaf_keys, num_keys) = {
        let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
        match guard.node_type()? {
            NodeType::Leaf => {
                let keys: Vec<u32> = (0..guard.leaf_num_cells() as usize).map(|i| guard.leaf_key(i)).collect();
                (NodeType::Leaf, keys, 0)
            }
            NodeType::Internal => (NodeType::Internal, Vec::new(), guard.internal_num_keys()),
        }
    };

    match node_type {
        NodeType::Leaf => {
            let _ = writeln!(out, "{}- leaf (size {})", "  ".repeat(indent), leaf_keys.len());
            for key in leaf_keys {
                let _ = writeln!(out, "{}- {}", "  ".repeat(indent + 1), key);
            }
        }
        NodeType::Internal => {
            let _ = writeln!(out, "{}- internal (size {})", "  ".repeat(indent), num_keys);
            for i in 0..num_keys {
                let child = {
                    let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
                    guard.internal_child_at(i as usize)
                };
                dump_node(table, child, indent + 1, out)?;
                let key = {
                    let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
                    guard.internal_key_at(i as usize)
                };
                let _ = writeln!(out, "{}- key {}", "  ".repeat(indent + 1), key);
            }
            let right_child = {
                let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
                guard.internal_right_child()
            };
            if right_child != crate::node::INVALID_PAGE_NUM {
                dump_node(table, right_child, indent + 1, out)?;
            }
        }
    }
    Ok(())
}
