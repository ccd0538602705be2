//! Pipe-delimited tables and composite-key joins.
//!
//! A table is a text file of rows whose fields are separated by `|`.  Blank
//! lines and lines whose first non-blank character is `#` are ignored.  The
//! first `KEY_FIELDS` fields of a row form its key.

pub mod rules;

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Write};
use std::path::Path;

use log::{debug, warn};

pub const FIELD_SEPARATOR: char = '|';
const COMMENT_PREFIX: char = '#';

/// Number of leading fields that make up a row's key.
pub const KEY_FIELDS: usize = 2;

pub type Key = Vec<String>;

#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    /// Line number in the source, starting at 1.
    pub line: usize,
    pub fields: Vec<String>,
}

impl Row {
    pub fn new(line: usize, fields: Vec<String>) -> io::Result<Row> {
        if fields.len() < KEY_FIELDS {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "line {}: expected at least {} fields, found {}",
                    line,
                    KEY_FIELDS,
                    fields.len()
                ),
            ));
        }
        Ok(Row { line, fields })
    }

    pub fn key(&self) -> Key {
        self.fields[..KEY_FIELDS].to_vec()
    }

    /// Fields following the key.
    pub fn values(&self) -> &[String] {
        &self.fields[KEY_FIELDS..]
    }
}

/// Rows in source order plus an index from key to the first row with that key.
#[derive(Debug, Default)]
pub struct Table {
    rows: Vec<Row>,
    index: HashMap<Key, usize>,
}

impl Table {
    pub fn new() -> Table {
        Table::default()
    }

    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Table> {
        let path = path.as_ref();
        let table = Table::parse(BufReader::new(File::open(path)?))?;
        debug!("{}: {} rows", path.display(), table.len());
        Ok(table)
    }

    pub fn parse<R: BufRead>(reader: R) -> io::Result<Table> {
        let mut table = Table::new();
        for (number, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() || line.trim_start().starts_with(COMMENT_PREFIX) {
                continue;
            }
            let fields = line
                .split(FIELD_SEPARATOR)
                .map(|field| field.trim().to_string())
                .collect();
            table.push(Row::new(number + 1, fields)?);
        }
        Ok(table)
    }

    /// Append a row.  A row whose key is already present is kept but is not
    /// reachable through `lookup`.
    pub fn push(&mut self, row: Row) {
        let key = row.key();
        if let Some(&first) = self.index.get(&key) {
            warn!(
                "line {}: duplicate key {} (first seen on line {})",
                row.line,
                key.join("|"),
                self.rows[first].line
            );
        } else {
            self.index.insert(key, self.rows.len());
        }
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn lookup(&self, key: &[String]) -> Option<&Row> {
        self.index.get(key).map(|&i| &self.rows[i])
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    /// Rows without a match are dropped.
    Inner,
    /// Rows without a match are emitted with only their own fields.
    Left,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub matched: usize,
    pub unmatched: usize,
}

fn write_row<W: Write + ?Sized>(out: &mut W, fields: &[String]) -> io::Result<()> {
    writeln!(out, "{}", fields.join("|"))
}

/// Join every row of `left` with the row of `right` sharing its key.  Joined
/// rows go to `out` as the left fields followed by the right row's non-key
/// fields; each unmatched key is reported on `diag`.
pub fn join<W: Write + ?Sized, E: Write + ?Sized>(
    left: &Table,
    right: &Table,
    kind: JoinKind,
    out: &mut W,
    diag: &mut E,
) -> io::Result<JoinStats> {
    let mut stats = JoinStats::default();
    for row in left.rows() {
        let key = row.key();
        match right.lookup(&key) {
            Some(other) => {
                let mut fields = row.fields.clone();
                fields.extend(other.values().iter().cloned());
                write_row(out, &fields)?;
                stats.matched += 1;
            }
            None => {
                writeln!(diag, "line {}: no match for key {}", row.line, key.join("|"))?;
                if kind == JoinKind::Left {
                    write_row(out, &row.fields)?;
                }
                stats.unmatched += 1;
            }
        }
    }
    debug!(
        "{:?} join: {} matched, {} unmatched",
        kind, stats.matched, stats.unmatched
    );
    Ok(stats)
}
