//! Interactive shell for a pagedb database file.
//!
//! Usage:
//!   pagedb <db_path> [--page-size N] [--no-write-through] [--sync] [--log-level FILTER]
//!
//! Statements are read one per line from stdin; see `pagedb::shell` for the
//! accepted syntax. `.exit` or end of input closes the database.
//!
//! The page size is recorded in the file header. Reopening a file needs the
//! same `--page-size` it was created with.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::exit;

use clap::Parser;
use pagedb::shell::{Outcome, Shell};
use pagedb::{Config, Database, PAGE_SIZE};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "pagedb", version, about = "Interactive shell for a pagedb file")]
struct Cli {
    #[arg(value_name = "DB", help = "Database file, created if missing")]
    path: PathBuf,

    #[arg(long, default_value_t = PAGE_SIZE, help = "Page size in bytes; an existing file must have been created with the same size")]
    page_size: usize,

    #[arg(long, help = "Only flush on .exit instead of after every change")]
    no_write_through: bool,

    #[arg(long, help = "fsync after every page write")]
    sync: bool,

    #[arg(long, value_name = "FILTER", help = "Log filter, e.g. `debug` or `pagedb=trace`")]
    log_level: Option<String>,
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}': {}", level, e);
            exit(2);
        }),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn prompt() {
    print!("db > ");
    let _ = io::stdout().flush();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    let config = Config::new(&cli.path)
        .page_size(cli.page_size)
        .write_through(!cli.no_write_through)
        .sync_on_write(cli.sync);

    let db = match Database::open(config) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("ERROR: Failed to open database: {}", e);
            exit(1);
        }
    };
    println!("Using database file {}. Type .exit to quit.", cli.path.display());

    let mut shell = Shell::new(db);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        prompt();
        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("ERROR: {}", e);
                break;
            }
            None => {
                println!();
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match shell.execute(&line) {
            Ok(Outcome::Output(text)) => {
                if !text.is_empty() {
                    println!("{}", text);
                }
            }
            Ok(Outcome::Exit) => break,
            Err(e) => println!("Error: {}", e),
        }
    }

    if let Err(e) = shell.close() {
        eprintln!("ERROR: Failed to close database: {}", e);
        exit(1);
    }
    println!("Bye.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_page_size_help_mentions_reopen() {
        let help = Cli::command().render_help().to_string();
        let help = help.split_whitespace().collect::<Vec<_>>().join(" ");
        assert!(help.contains("must have been created with the same size"));

        let cli = Cli::try_parse_from(["pagedb", "x.db", "--page-size", "1024"]).unwrap();
        assert_eq!(cli.page_size, 1024);
    }
}
