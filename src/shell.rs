//! Line-oriented command interpreter.
//!
//! Statements (a trailing `;` is ignored, keywords are case-insensitive):
//! ```text
//! create table <name> (<col> <type>, ...)
//! insert into <name> values (v1, v2, ...)
//! select from <name> [<key>]
//! delete from <name> <key>
//! update <name> set (v1, v2, ...)
//! .exit | .tables | .btree <name> | .stats
//! ```
//! The first column of every table is its integer key.

use thiserror::Error;

use crate::error::StorageError;
use crate::format::format_rows;
use crate::record::{DataType, Row, Schema};
use crate::Database;

/// Errors reported back to the interactive user
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Syntax error: {0}")]
    Syntax(String),

    #[error("Unrecognized command: {0}")]
    Unrecognized(String),
}

type CommandResult<T> = std::result::Result<T, CommandError>;

fn syntax(usage: &str) -> CommandError {
    CommandError::Syntax(format!("use {}", usage))
}

/// A parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Statement {
    CreateTable { name: String, schema: Schema },
    Insert { table: String, values: Vec<String> },
    Select { table: String, key: Option<i32> },
    Delete { table: String, key: i32 },
    Update { table: String, values: Vec<String> },
    Exit,
    Tables,
    BTree(String),
    Stats,
}

/// Parse one input line
pub fn parse(input: &str) -> CommandResult<Statement> {
    let line = input.trim();
    let line = line.strip_suffix(';').unwrap_or(line).trim();

    if line.starts_with('.') {
        return parse_meta(line);
    }

    let (keyword, rest) = split_word(line);
    match keyword.to_ascii_lowercase().as_str() {
        "create" => parse_create(rest),
        "insert" => parse_insert(rest),
        "select" => parse_select(rest),
        "delete" => parse_delete(rest),
        "update" => parse_update(rest),
        _ => Err(CommandError::Unrecognized(line.to_string())),
    }
}

fn parse_meta(line: &str) -> CommandResult<Statement> {
    let (command, rest) = split_word(line);
    match command.to_ascii_lowercase().as_str() {
        ".exit" => Ok(Statement::Exit),
        ".tables" => Ok(Statement::Tables),
        ".stats" => Ok(Statement::Stats),
        ".btree" if !rest.is_empty() => Ok(Statement::BTree(rest.to_string())),
        ".btree" => Err(syntax(".btree <table>")),
        _ => Err(CommandError::Unrecognized(line.to_string())),
    }
}

fn parse_create(rest: &str) -> CommandResult<Statement> {
    const USAGE: &str = "create table <name> (<col> <type>, ...)";

    let (word, rest) = split_word(rest);
    if !word.eq_ignore_ascii_case("table") {
        return Err(syntax(USAGE));
    }
    let open = rest.find('(').ok_or_else(|| syntax(USAGE))?;
    let name = rest[..open].trim();
    if name.is_empty() || name.contains(char::is_whitespace) {
        return Err(syntax(USAGE));
    }

    let body = parenthesized(&rest[open..]).ok_or_else(|| syntax(USAGE))?;
    let mut columns = Vec::new();
    for definition in body.split(',') {
        let parts: Vec<&str> = definition.split_whitespace().collect();
        match parts.as_slice() {
            [column, data_type] => columns.push((column.to_string(), DataType::parse(data_type))),
            _ => return Err(syntax(USAGE)),
        }
    }

    Ok(Statement::CreateTable {
        name: name.to_string(),
        schema: Schema::new(columns)?,
    })
}

fn parse_insert(rest: &str) -> CommandResult<Statement> {
    const USAGE: &str = "insert into <name> values (v1, ...)";

    let (into, rest) = split_word(rest);
    let (table, rest) = split_word(rest);
    let (values_kw, rest) = split_word(rest);
    if !into.eq_ignore_ascii_case("into") || table.is_empty() {
        return Err(syntax(USAGE));
    }

    // "values(1, 'a')" without a space
    let rest = if values_kw.len() > 6
        && values_kw
            .get(..6)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case("values"))
    {
        line_tail(values_kw, rest, 6)
    } else if values_kw.eq_ignore_ascii_case("values") {
        rest.to_string()
    } else {
        return Err(syntax(USAGE));
    };

    let body = parenthesized(&rest).ok_or_else(|| syntax(USAGE))?;
    Ok(Statement::Insert {
        table: table.to_string(),
        values: split_values(body),
    })
}

fn parse_select(rest: &str) -> CommandResult<Statement> {
    const USAGE: &str = "select from <name> [<key>]";

    let words: Vec<&str> = rest.split_whitespace().collect();
    let words = match words.as_slice() {
        ["*", tail @ ..] => tail,
        all => all,
    };
    match words {
        [from, table] if from.eq_ignore_ascii_case("from") => Ok(Statement::Select {
            table: table.to_string(),
            key: None,
        }),
        [from, table, key] if from.eq_ignore_ascii_case("from") => Ok(Statement::Select {
            table: table.to_string(),
            key: Some(parse_key(key)?),
        }),
        _ => Err(syntax(USAGE)),
    }
}

fn parse_delete(rest: &str) -> CommandResult<Statement> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [from, table, key] if from.eq_ignore_ascii_case("from") => Ok(Statement::Delete {
            table: table.to_string(),
            key: parse_key(key)?,
        }),
        _ => Err(syntax("delete from <name> <key>")),
    }
}

fn parse_update(rest: &str) -> CommandResult<Statement> {
    const USAGE: &str = "update <name> set (key, v2, ...)";

    let (table, rest) = split_word(rest);
    let (set, rest) = split_word(rest);
    if table.is_empty() || !set.eq_ignore_ascii_case("set") {
        return Err(syntax(USAGE));
    }
    let body = parenthesized(rest).ok_or_else(|| syntax(USAGE))?;
    Ok(Statement::Update {
        table: table.to_string(),
        values: split_values(body),
    })
}

fn parse_key(literal: &str) -> CommandResult<i32> {
    literal
        .parse()
        .map_err(|_| CommandError::Syntax(format!("'{}' is not an integer key", literal)))
}

/// First whitespace-delimited word and the trimmed remainder
fn split_word(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(char::is_whitespace) {
        Some(at) => (&s[..at], s[at..].trim_start()),
        None => (s, ""),
    }
}

fn line_tail(word: &str, rest: &str, skip: usize) -> String {
    if rest.is_empty() {
        word[skip..].to_string()
    } else {
        format!("{} {}", &word[skip..], rest)
    }
}

/// Contents of a `( ... )` group that spans the whole string
fn parenthesized(s: &str) -> Option<&str> {
    s.trim().strip_prefix('(')?.strip_suffix(')')
}

/// Split a value list on commas outside single quotes, then unquote
fn split_values(body: &str) -> Vec<String> {
    let mut values = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in body.chars() {
        match c {
            '\'' => {
                quoted = !quoted;
                current.push(c);
            }
            ',' if !quoted => values.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    values.push(current);

    values
        .into_iter()
        .map(|v| {
            let v = v.trim();
            v.strip_prefix('\'')
                .and_then(|v| v.strip_suffix('\''))
                .unwrap_or(v)
                .to_string()
        })
        .collect()
}

/// What the REPL should do after a statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Print this text and read the next line
    Output(String),
    /// Close the database and stop
    Exit,
}

/// Interpreter state: the database plus its open tables
pub struct Shell {
    db: Database,
}

impl Shell {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn database(&mut self) -> &mut Database {
        &mut self.db
    }

    /// Parse and run one input line
    pub fn execute(&mut self, input: &str) -> CommandResult<Outcome> {
        let statement = parse(input)?;
        self.run(statement)
    }

    /// Run a parsed statement
    pub fn run(&mut self, statement: Statement) -> CommandResult<Outcome> {
        let output = match statement {
            Statement::Exit => return Ok(Outcome::Exit),

            Statement::CreateTable { name, schema } => {
                self.db.create_table(&name, schema)?;
                format!("Table '{}' created.", name)
            }

            Statement::Insert { table, values } => {
                let table_ref = self.db.open_table(&table)?;
                let row = Row::from_literals(table_ref.schema(), &values)?;
                let key = row.key(table_ref.schema())?;
                table_ref.insert(key, &row)?;
                format!("Inserted into '{}'.", table)
            }

            Statement::Select { table, key: Some(key) } => {
                let table_ref = self.db.open_table(&table)?;
                match table_ref.find(key)? {
                    Some(row) => format_rows(table_ref.schema(), &[row]),
                    None => format!("Key {} not found in '{}'.", key, table),
                }
            }

            Statement::Select { table, key: None } => {
                let table_ref = self.db.open_table(&table)?;
                let rows = table_ref
                    .start()?
                    .map(|entry| entry.map(|(_, row)| row))
                    .collect::<crate::Result<Vec<_>>>()?;
                format_rows(table_ref.schema(), &rows)
            }

            Statement::Delete { table, key } => {
                if self.db.open_table(&table)?.delete(key)? {
                    format!("Deleted key {} from '{}'.", key, table)
                } else {
                    format!("Key {} not found in '{}'.", key, table)
                }
            }

            Statement::Update { table, values } => {
                let table_ref = self.db.open_table(&table)?;
                let row = Row::from_literals(table_ref.schema(), &values)?;
                let key = row.key(table_ref.schema())?;
                if table_ref.update(key, &row)? {
                    format!("Updated key {} in '{}'.", key, table)
                } else {
                    format!("Key {} not found in '{}'.", key, table)
                }
            }

            Statement::Tables => self.db.tables()?.join("\n"),

            Statement::BTree(name) => {
                let tree = self.db.export_tree(&name)?;
                serde_json::to_string_pretty(&tree).map_err(StorageError::from)?
            }

            Statement::Stats => {
                let stats = self.db.stats();
                format!(
                    "page_count: {}\ncached_pages: {}\npage_size: {}\nopen_tables: {}",
                    stats.page_count, stats.cached_pages, stats.page_size, stats.open_tables
                )
            }
        };
        Ok(Outcome::Output(output))
    }

    /// Persist every open table and close the file
    pub fn close(self) -> CommandResult<()> {
        self.db.close()?;
        Ok(())
    }
}
