//! The top-level handle binding a pager to a root page.
use crate::errors::Error;
use crate::node::{NodeType, Page};
use crate::pager::Pager;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::info;

/// The root page always lives at page 0.
pub const ROOT_PAGE_NUM: u32 = 0;

pub struct Table {
    pub path: PathBuf,
    pub root_page_num: u32,
    pub pager: Pager,
}

impl Table {
    /// Opens an existing database file or creates a new one. A freshly
    /// created (empty) file is initialized with page 0 as a root leaf.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref().to_path_buf();
        let mut pager = Pager::open(&path)?;

        if pager.num_pages() == 0 {
            let root = pager.get_page(ROOT_PAGE_NUM)?;
            let mut root = root.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
            root.init_leaf();
            root.set_is_root(true);
        }

        info!(path = %path.display(), "Opened table");
        Ok(Table {
            path,
            root_page_num: ROOT_PAGE_NUM,
            pager,
        })
    }

    /// Flushes every resident page and closes the backing file. This is the
    /// only point at which the table's contents are guaranteed durable.
    pub fn close(mut self) -> Result<(), Error> {
        self.pager.close()?;
        info!(path = %self.path.display(), "Closed table");
        Ok(())
    }

    pub fn get_page(&mut self, page_num: u32) -> Result<Arc<Mutex<Page>>, Error> {
        self.pager.get_page(page_num)
    }
}

/// The max key of a node: a leaf's own last key, or — for an internal node —
/// the recursive max key of its rightmost subtree.
pub fn node_max_key(table: &mut Table, page_num: u32) -> Result<u32, Error> {
    let page = table.get_page(page_num)?;
    let (node_type, right_child) = {
        let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
        match guard.node_type()? {
            NodeType::Leaf => return Ok(guard.leaf_max_key()),
            NodeType::Internal => (NodeType::Internal, guard.internal_right_child()),
        }
    };
    debug_assert_eq!(node_type, NodeType::Internal);
    node_max_key(table, right_child)
}
