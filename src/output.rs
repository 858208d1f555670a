//! Output assembly, tabular export and wide-to-long reshaping

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::classify::{Classification, AGGREGATE_CODES};
use crate::error::Error;
use crate::record::{MortalityRecord, MortalityTable};
use crate::regions::RegionSet;

/// Chart labels that win over the region dataset's name.
pub const LABEL_OVERRIDES: [(&str, &str); 1] = [("MK", "Macedonia")];

/// Label shown for a country: an override, else the region name, else the code.
pub fn display_label<'a>(code: &'a str, name: Option<&'a str>) -> &'a str {
    LABEL_OVERRIDES
        .iter()
        .find(|(from, _)| *from == code)
        .map(|(_, label)| *label)
        .or(name)
        .unwrap_or(code)
}

/// Attach severity labels to every record by country code.
///
/// Records that were not classified keep `severity_class = None`.
pub fn assemble(table: &MortalityTable, classification: &Classification) -> MortalityTable {
    let labels: HashMap<&str, f64> = classification
        .bands
        .iter()
        .flat_map(|band| band.members.iter().map(move |m| (m.as_str(), band.label)))
        .collect();

    let records = table
        .records
        .iter()
        .map(|record| MortalityRecord {
            severity_class: labels.get(record.country_code.as_str()).copied(),
            ..record.clone()
        })
        .collect();

    MortalityTable {
        years: table.years.clone(),
        records,
    }
}

/// Build a polars `DataFrame` of the enriched table.
///
/// Columns: `country`, `name` (only with regions), one per year, then the
/// derived metrics and `severity_class`.
pub fn to_dataframe(
    table: &MortalityTable,
    regions: Option<&RegionSet>,
) -> crate::Result<DataFrame> {
    let records = &table.records;
    let mut columns: Vec<Column> = Vec::with_capacity(table.years.len() + 6);

    let codes: Vec<String> = records.iter().map(|r| r.country_code.clone()).collect();
    columns.push(Column::new("country".into(), codes));

    if let Some(regions) = regions {
        let names: Vec<Option<String>> = records
            .iter()
            .map(|r| regions.name_of(&r.country_code).map(str::to_string))
            .collect();
        columns.push(Column::new("name".into(), names));
    }

    for year in &table.years {
        let values: Vec<Option<f64>> = records.iter().map(|r| r.value(year)).collect();
        columns.push(Column::new(year.as_str().into(), values));
    }

    let derived: [(&str, fn(&MortalityRecord) -> Option<f64>); 4] = [
        ("baseline_mean", |r| r.baseline_mean),
        ("increase_absolute", |r| r.increase_absolute),
        ("increase_percent", |r| r.increase_percent),
        ("severity_class", |r| r.severity_class),
    ];
    for (name, field) in derived {
        let values: Vec<Option<f64>> = records.iter().map(field).collect();
        columns.push(Column::new(name.into(), values));
    }

    Ok(DataFrame::new(columns)?)
}

/// Write the frame as CSV with a header row.
///
/// Without a destination nothing is written. Returns whether a file was written.
pub fn export_table(df: &mut DataFrame, dest: Option<&Path>) -> crate::Result<bool> {
    let Some(path) = dest else {
        return Ok(false);
    };

    let mut file = File::create(path).map_err(|e| Error::io(path, e))?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;

    debug!(path = %path.display(), rows = df.height(), "Exported table");
    Ok(true)
}

/// Output files written under a staging name, then moved into place together.
///
/// Staged files that were never committed are removed on drop.
#[derive(Debug, Default)]
pub struct StagedWrites {
    /// (staging path, destination)
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedWrites {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a hidden sibling of `dest` and return it; write there instead.
    ///
    /// The extension is kept so format detection by extension still works.
    pub fn stage(&mut self, dest: &Path) -> PathBuf {
        let file_name = dest
            .file_name()
            .map_or_else(|| "output".to_string(), |n| n.to_string_lossy().into_owned());
        let staging = dest.with_file_name(format!(".partial-{}", file_name));
        self.staged.push((staging.clone(), dest.to_path_buf()));
        staging
    }

    /// Rename every staged file onto its destination, in staging order.
    ///
    /// Renames stay within one directory. A failed rename stops the commit and
    /// the files not yet moved are removed.
    pub fn commit(mut self) -> crate::Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(self.staged.len());
        while !self.staged.is_empty() {
            let (staging, dest) = self.staged.remove(0);
            if let Err(e) = fs::rename(&staging, &dest) {
                remove_staged(&staging);
                return Err(Error::io(&dest, e));
            }
            info!(path = %dest.display(), "Wrote output");
            written.push(dest);
        }
        Ok(written)
    }
}

impl Drop for StagedWrites {
    fn drop(&mut self) {
        for (staging, _) in &self.staged {
            remove_staged(staging);
        }
    }
}

fn remove_staged(path: &Path) {
    match fs::remove_file(path) {
        Err(e) if e.kind() != ErrorKind::NotFound => {
            warn!(path = %path.display(), error = %e, "Could not remove staged output");
        }
        _ => {}
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    Baseline,
    Target,
}

/// One (country, kind, value) row of the long-format comparison table.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub code: String,
    /// Region name when known, otherwise the code
    pub label: String,
    pub kind: ValueKind,
    pub value: f64,
}

/// Reshape baseline and target values into long format.
///
/// Only countries with a target value are kept; aggregates are dropped.
/// Rows are ordered by ascending `increase_percent`, unknown increases last.
pub fn comparison_long_format(
    table: &MortalityTable,
    regions: Option<&RegionSet>,
    target_year: &str,
) -> Vec<LongRow> {
    let mut records: Vec<&MortalityRecord> = table
        .records
        .iter()
        .filter(|r| r.value(target_year).is_some())
        .filter(|r| !AGGREGATE_CODES.contains(&r.country_code.as_str()))
        .collect();

    records.sort_by(|a, b| match (a.increase_percent, b.increase_percent) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });

    let mut rows = Vec::with_capacity(records.len() * 2);
    for record in records {
        let code = record.country_code.as_str();
        let label = display_label(code, regions.and_then(|r| r.name_of(code))).to_string();

        let values = [
            (ValueKind::Baseline, record.baseline_mean),
            (ValueKind::Target, record.value(target_year)),
        ];
        for (kind, value) in values {
            if let Some(value) = value {
                rows.push(LongRow {
                    code: record.country_code.clone(),
                    label: label.clone(),
                    kind,
                    value,
                });
            }
        }
    }

    rows
}
