//! Thin REPL binary wiring the storage core to a terminal.
use clap::Parser;
use mysqlite::command::{self, Command};
use mysqlite::executor::{exec_insert, exec_select};
use mysqlite::{dump, Error, Table};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "mysqlite", version = VERSION, about = "Tiny single-table database.")]
struct Cli {
    /// Path to the database file. Created if it doesn't exist.
    db_path: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut table = match Table::open(&cli.db_path) {
        Ok(t) => t,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match repl_loop(&mut table) {
        Ok(()) => match table.close() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("Error: {}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn repl_loop(table: &mut Table) -> Result<(), Error> {
    let mut line = String::new();
    loop {
        print!("mysqlite> ");
        io::stdout().flush()?;
        line.clear();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }

        match command::parse(&line) {
            Ok(Command::Exit) => break,
            Ok(Command::Btree) => {
                print!("{}", dump::dump_tree(table, table.root_page_num, 0)?);
            }
            Ok(Command::Select) => {
                for row in exec_select(table)? {
                    println!("({}, {}, {})", row.id, row.username, row.email);
                }
            }
            Ok(Command::Insert(row)) => match exec_insert(table, row) {
                Ok(()) => println!("Inserted row."),
                Err(Error::Duplicate(id)) => println!("Error: duplicate key '{}'.", id),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => println!("Error: {}", e),
            },
            Err(e) => println!("Error: {}", e),
        }
    }
    Ok(())
}
