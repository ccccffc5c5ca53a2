//! Parses a single REPL input line into a [`Command`].

use crate::errors::Error;
use crate::row::Row;

pub enum Command {
    Insert(Row),
    Select,
    Exit,
    Btree,
}

/// Parses one line of input. Unrecognized input is reported as a
/// [`Error::Usage`], not treated as fatal.
pub fn parse(line: &str) -> Result<Command, Error> {
    let line = line.trim();
    if line == ".exit" {
        return Ok(Command::Exit);
    }
    if line == ".btree" {
        return Ok(Command::Btree);
    }
    if line == "select" {
        return Ok(Command::Select);
    }
    if let Some(rest) = line.strip_prefix("insert ") {
        return parse_insert(rest).map(Command::Insert);
    }
    Err(err!(Usage, "unrecognized command: {}", line))
}

fn parse_insert(rest: &str) -> Result<Row, Error> {
    let mut parts = rest.split_whitespace();
    let id = parts
        .next()
        .ok_or_else(|| err!(Usage, "insert requires an id, username, and email"))?;
    let username = parts
        .next()
        .ok_or_else(|| err!(Usage, "insert requires a username"))?;
    let email = parts
        .next()
        .ok_or_else(|| err!(Usage, "insert requires an email"))?;
    if parts.next().is_some() {
        return Err(err!(Usage, "insert takes exactly three arguments"));
    }
    let id: u32 = id.parse().map_err(|_| err!(Usage, "id must be a non-negative integer, got {}", id))?;
    Row::new(id, username, email)
}
