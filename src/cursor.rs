//! A cursor tracks a position within the table: a leaf page plus a cell
//! index inside it. It is the sole mechanism for both point lookups (insert)
//! and full ordered scans (select).

use crate::btree::{find_leaf, leaf_find_cell};
use crate::errors::Error;
use crate::node::INVALID_PAGE_NUM;
use crate::row::Row;
use crate::table::Table;

pub struct Cursor<'a> {
    pub table: &'a mut Table,
    pub page_num: u32,
    pub cell_num: u32,
    /// True once the cursor has advanced past the last cell of the last leaf.
    pub end_of_table: bool,
}

impl<'a> Cursor<'a> {
    /// Positions a cursor at the start of the table (leftmost cell of the
    /// leftmost leaf), for a full ordered scan.
    pub fn table_start(table: &'a mut Table) -> Result<Self, Error> {
        let root = table.root_page_num;
        let page_num = find_leaf(table, root, 0)?;
        let num_cells = {
            let page = table.get_page(page_num)?;
            page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?.leaf_num_cells()
        };
        Ok(Cursor {
            table,
            page_num,
            cell_num: 0,
            end_of_table: num_cells == 0,
        })
    }

    /// Positions a cursor at the cell where `key` is, or where it should be
    /// inserted if absent.
    pub fn table_find(table: &'a mut Table, key: u32) -> Result<Self, Error> {
        let root = table.root_page_num;
        let page_num = find_leaf(table, root, key)?;
        let cell_num = {
            let page = table.get_page(page_num)?;
            let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
            leaf_find_cell(&guard, key) as u32
        };
        Ok(Cursor {
            table,
            page_num,
            cell_num,
            end_of_table: false,
        })
    }

    /// Whether the cursor's current cell holds an existing key (rather than
    /// just an insertion point).
    pub fn key_matches(&mut self, key: u32) -> Result<bool, Error> {
        let page = self.table.get_page(self.page_num)?;
        let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
        let num_cells = guard.leaf_num_cells();
        Ok(self.cell_num < num_cells && guard.leaf_key(self.cell_num as usize) == key)
    }

    pub fn value(&mut self) -> Result<Row, Error> {
        let page = self.table.get_page(self.page_num)?;
        let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
        Row::deserialize(guard.leaf_value(self.cell_num as usize))
    }

    /// Advances one cell, following `next_leaf` across leaf boundaries and
    /// setting `end_of_table` once there is nowhere left to go.
    pub fn advance(&mut self) -> Result<(), Error> {
        let page = self.table.get_page(self.page_num)?;
        let (num_cells, next_leaf) = {
            let guard = page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?;
            (guard.leaf_num_cells(), guard.leaf_next_leaf())
        };

        self.cell_num += 1;
        if self.cell_num >= num_cells {
            if next_leaf == 0 || next_leaf == INVALID_PAGE_NUM {
                self.end_of_table = true;
            } else {
                self.page_num = next_leaf;
                self.cell_num = 0;
            }
        }
        Ok(())
    }
}
