//! Raw table loading from Eurostat-style tab-separated files

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::ReaderBuilder;
use tracing::debug;

use crate::error::Error;

/// Metadata encoded in the first header cell, e.g. `freq,indic_de,geo\TIME_PERIOD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyHeader {
    pub raw: String,
    pub dimensions: Vec<String>,
}

impl KeyHeader {
    fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            dimensions: raw.split(',').map(|d| d.trim().to_string()).collect(),
        }
    }
}

/// One source line: composite key plus untouched cell strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRow {
    /// 1-based line number in the source file.
    pub line: u64,
    pub key: String,
    pub cells: Vec<String>,
}

/// Loader output before any cleaning or type coercion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub key_header: KeyHeader,
    /// Year headers exactly as written, surrounding whitespace included.
    pub year_headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

/// Load a tab-separated mortality file.
///
/// Fails on the first malformed line; no row is ever skipped.
pub fn load_raw_table(path: impl AsRef<Path>) -> crate::Result<RawTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::io(path, e))?;
    let table = read_raw_table(file)?;
    debug!(
        path = %path.display(),
        rows = table.rows.len(),
        years = table.year_headers.len(),
        dimensions = ?table.key_header.dimensions,
        "Loaded raw table"
    );
    Ok(table)
}

/// Parse tab-separated content from any reader.
pub fn read_raw_table<R: Read>(reader: R) -> crate::Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        // Field counts are checked per row below, with the line number
        .flexible(true)
        .from_reader(reader);

    let mut records = rdr.records();

    let header = match records.next() {
        Some(result) => result.map_err(|e| row_error(&e))?,
        None => {
            return Err(Error::MalformedHeader {
                header: String::new(),
                reason: "file is empty".to_string(),
            })
        }
    };

    if header.len() < 2 {
        return Err(Error::MalformedHeader {
            header: header.iter().collect::<Vec<_>>().join("\t"),
            reason: format!(
                "expected a key column and at least one year column, found {} column(s)",
                header.len()
            ),
        });
    }

    let key_header = KeyHeader::parse(&header[0]);
    let year_headers: Vec<String> = header.iter().skip(1).map(str::to_string).collect();

    let mut rows = Vec::new();
    for result in records {
        let record = result.map_err(|e| row_error(&e))?;
        let line = record.position().map_or(0, |p| p.line());

        if record.len() != header.len() {
            return Err(Error::MalformedRow {
                line,
                reason: format!("expected {} fields, found {}", header.len(), record.len()),
            });
        }

        rows.push(RawRow {
            line,
            key: record[0].to_string(),
            cells: record.iter().skip(1).map(str::to_string).collect(),
        });
    }

    Ok(RawTable {
        key_header,
        year_headers,
        rows,
    })
}

fn row_error(err: &csv::Error) -> Error {
    Error::MalformedRow {
        line: err.position().map_or(0, |p| p.line()),
        reason: err.to_string(),
    }
}
