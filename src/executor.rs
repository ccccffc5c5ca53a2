//! Executes the two supported statements against a table.

use crate::btree::{leaf_insert, leaf_split_and_insert};
use crate::cursor::Cursor;
use crate::errors::Error;
use crate::node::LEAF_MAX_CELLS;
use crate::row::Row;
use crate::table::Table;
use tracing::debug;

/// Inserts `row`, rejecting it if a row with the same id already exists.
///
/// The duplicate check is against the cursor's own landing leaf (the leaf
/// that would actually receive this key), not unconditionally the root page.
pub fn exec_insert(table: &mut Table, row: Row) -> Result<(), Error> {
    let key = row.id;
    let mut cursor = Cursor::table_find(table, key)?;
    if cursor.key_matches(key)? {
        return Err(Error::Duplicate(key));
    }

    let page_num = cursor.page_num;
    let table = cursor.table;

    let num_cells = {
        let page = table.get_page(page_num)?;
        page.lock().map_err(|_| err!(Storage, "page lock poisoned"))?.leaf_num_cells() as usize
    };

    if num_cells >= LEAF_MAX_CELLS {
        leaf_split_and_insert(table, page_num, key, &row)?;
    } else {
        leaf_insert(table, page_num, key, &row)?;
    }
    debug!(key, "Inserted row");
    Ok(())
}

/// Returns every row in the table, in ascending key order.
pub fn exec_select(table: &mut Table) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::new();
    let mut cursor = Cursor::table_start(table)?;
    while !cursor.end_of_table {
        rows.push(cursor.value()?);
        cursor.advance()?;
    }
    Ok(rows)
}
