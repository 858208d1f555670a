//! Field normalization: country codes, Eurostat flags and censored cells

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::error::Error;
use crate::loader::RawTable;
use crate::record::{MortalityRecord, MortalityTable};

/// Prefix of the composite key column for the crude death rate dataset.
pub const DEFAULT_CODE_PREFIX: &str = "A,GDEATHRT_THSP,";

/// Eurostat observation flags that may trail a numeric cell.
pub const FLAG_SUFFIXES: [&str; 7] = ["e", "p", "b", "ep", "bp", "bep", "be"];

/// Censored cell marker, compared after trimming.
const CENSOR_TOKEN: &str = ":";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizerConfig {
    pub code_prefix: String,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            code_prefix: DEFAULT_CODE_PREFIX.to_string(),
        }
    }
}

/// Outcome of cleaning a single cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CellValue {
    Value(f64),
    Censored,
}

impl CellValue {
    pub fn into_option(self) -> Option<f64> {
        match self {
            CellValue::Value(v) => Some(v),
            CellValue::Censored => None,
        }
    }
}

/// Strip the exact key prefix, leaving the country code.
///
/// Returns `None` when the prefix is absent or the remainder is not a single code.
pub fn strip_code_prefix<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    let code = key.strip_prefix(prefix)?.trim();
    if code.is_empty() || code.contains(',') {
        return None;
    }
    Some(code)
}

/// Remove a trailing ` <flags>` annotation if the flags are a known combination.
pub fn strip_flag_suffix(cell: &str) -> &str {
    let cell = cell.trim();
    match cell.rsplit_once(' ') {
        Some((number, flags)) if FLAG_SUFFIXES.contains(&flags) && !number.trim().is_empty() => {
            number.trim()
        }
        _ => cell,
    }
}

/// Clean and parse one cell. `Err` carries the offending text for context.
///
/// Only finite numbers are values; `NaN` and infinities are rejected.
pub fn clean_cell(raw: &str) -> Result<CellValue, String> {
    if raw.trim() == CENSOR_TOKEN {
        return Ok(CellValue::Censored);
    }

    match strip_flag_suffix(raw).parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(CellValue::Value(value)),
        _ => Err(raw.to_string()),
    }
}

pub fn normalize_year_label(label: &str) -> String {
    label.trim().to_string()
}

/// Turn the loader output into typed records.
pub fn normalize_table(raw: &RawTable, config: &NormalizerConfig) -> crate::Result<MortalityTable> {
    let years = normalize_year_labels(&raw.year_headers)?;

    let mut seen = HashSet::new();
    let mut records = Vec::with_capacity(raw.rows.len());

    for row in &raw.rows {
        let code = strip_code_prefix(&row.key, &config.code_prefix).ok_or_else(|| {
            Error::UnrecognizedCode {
                line: row.line,
                raw: row.key.clone(),
                prefix: config.code_prefix.clone(),
            }
        })?;

        if !seen.insert(code.to_string()) {
            return Err(Error::DuplicateCode {
                code: code.to_string(),
            });
        }

        let mut yearly_values = BTreeMap::new();
        for (year, cell) in years.iter().zip(&row.cells) {
            let value = clean_cell(cell).map_err(|raw| Error::UnparseableCell {
                country: code.to_string(),
                year: year.clone(),
                raw,
            })?;
            yearly_values.insert(year.clone(), value.into_option());
        }

        records.push(MortalityRecord::new(code, yearly_values));
    }

    debug!(records = records.len(), years = years.len(), "Normalized table");

    Ok(MortalityTable { years, records })
}

fn normalize_year_labels(headers: &[String]) -> crate::Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut years = Vec::with_capacity(headers.len());

    for header in headers {
        let year = normalize_year_label(header);
        if year.is_empty() {
            return Err(Error::MalformedHeader {
                header: headers.join("\t"),
                reason: "empty year label".to_string(),
            });
        }
        if !seen.insert(year.clone()) {
            return Err(Error::MalformedHeader {
                header: headers.join("\t"),
                reason: format!("duplicate year label {:?}", year),
            });
        }
        years.push(year);
    }

    Ok(years)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;
    use crate::loader::read_raw_table;

    fn raw(content: &str) -> RawTable {
        read_raw_table(content.as_bytes()).unwrap()
    }

    #[test]
    fn test_strip_code_prefix() {
        assert_eq!(strip_code_prefix("A,GDEATHRT_THSP,SE", DEFAULT_CODE_PREFIX), Some("SE"));
        assert_eq!(
            strip_code_prefix("A,GDEATHRT_THSP,EU27_2020", DEFAULT_CODE_PREFIX),
            Some("EU27_2020")
        );
        assert_eq!(strip_code_prefix("A,OTHER,SE", DEFAULT_CODE_PREFIX), None);
        assert_eq!(strip_code_prefix("A,GDEATHRT_THSP,", DEFAULT_CODE_PREFIX), None);
        // The prefix must be at the start, not anywhere in the key
        assert_eq!(strip_code_prefix("X,A,GDEATHRT_THSP,SE", DEFAULT_CODE_PREFIX), None);
    }

    #[test]
    fn test_clean_cell() {
        assert_eq!(clean_cell("10.2 ep"), Ok(CellValue::Value(10.2)));
        assert_eq!(clean_cell("9.8 bep"), Ok(CellValue::Value(9.8)));
        assert_eq!(clean_cell("11.2 p"), Ok(CellValue::Value(11.2)));
        assert_eq!(clean_cell("9.5 "), Ok(CellValue::Value(9.5)));
        assert_eq!(clean_cell(": "), Ok(CellValue::Censored));
        assert!(clean_cell("10.2 x").is_err());
        assert!(clean_cell("").is_err());
        assert!(clean_cell("ep").is_err());
        assert!(clean_cell("NaN").is_err());
        assert!(clean_cell("inf").is_err());
        assert!(clean_cell("-infinity p").is_err());
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        for cell in ["10.2 ep", "9.5", "11.2 p"] {
            let once = clean_cell(cell).unwrap().into_option().unwrap();
            let twice = clean_cell(&once.to_string()).unwrap().into_option().unwrap();
            assert_eq!(once, twice);
        }
        assert_eq!(normalize_year_label(&normalize_year_label(" 2017 ")), "2017");
    }

    #[test]
    fn test_normalize_table() {
        let table = normalize_table(
            &raw("freq,indic_de,geo\\TIME_PERIOD\t2017 \t 2018\t2019  \t2020 \n\
                  A,GDEATHRT_THSP,SE\t9.5 \t9.6 e\t9.4 \t11.2 p\n\
                  A,GDEATHRT_THSP,XK\t: \t: \t: \t: \n"),
            &NormalizerConfig::default(),
        )
        .unwrap();

        assert_eq!(table.years, vec!["2017", "2018", "2019", "2020"]);
        let se = table.get("SE").unwrap();
        assert_eq!(se.value("2018"), Some(9.6));
        assert_eq!(se.value("2020"), Some(11.2));
        assert_eq!(se.baseline_mean, None);

        let xk = table.get("XK").unwrap();
        assert_eq!(xk.yearly_values.len(), 4);
        assert!(xk.yearly_values.values().all(Option::is_none));
    }

    #[test]
    fn test_clean_table_normalizes_to_same_values() {
        let flagged = normalize_table(
            &raw("key\t2019\t2020\nA,GDEATHRT_THSP,SE\t9.4 e\t11.2 p\n"),
            &NormalizerConfig::default(),
        )
        .unwrap();
        let clean = normalize_table(
            &raw("key\t2019\t2020\nA,GDEATHRT_THSP,SE\t9.4\t11.2\n"),
            &NormalizerConfig::default(),
        )
        .unwrap();
        assert_eq!(flagged, clean);
    }

    #[test]
    fn test_unrecognized_prefix() {
        let result = normalize_table(
            &raw("key\t2020\nA,OTHER_IND,SE\t11.2\n"),
            &NormalizerConfig::default(),
        );
        match result {
            Err(Error::UnrecognizedCode { line, raw, .. }) => {
                assert_eq!(line, 2);
                assert_eq!(raw, "A,OTHER_IND,SE");
            }
            other => panic!("expected UnrecognizedCode, got {:?}", other),
        }
    }

    #[test]
    fn test_unparseable_cell_is_not_missing() {
        let result = normalize_table(
            &raw("key\t2020\nA,GDEATHRT_THSP,SE\t11,2\n"),
            &NormalizerConfig::default(),
        );
        match result {
            Err(Error::UnparseableCell { country, year, raw }) => {
                assert_eq!(country, "SE");
                assert_eq!(year, "2020");
                assert_eq!(raw, "11,2");
            }
            other => panic!("expected UnparseableCell, got {:?}", other),
        }
    }

    #[test]
    fn test_non_finite_cell_is_format_error() {
        let err = normalize_table(
            &raw("key\t2019\t2020\nA,GDEATHRT_THSP,SE\t9.4\tNaN p\n"),
            &NormalizerConfig::default(),
        )
        .unwrap_err();

        assert_eq!(err.category(), ErrorCategory::Format);
        match err {
            Error::UnparseableCell { country, year, raw } => {
                assert_eq!(country, "SE");
                assert_eq!(year, "2020");
                assert_eq!(raw, "NaN p");
            }
            other => panic!("expected UnparseableCell, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_codes_rejected() {
        let result = normalize_table(
            &raw("key\t2020\nA,GDEATHRT_THSP,SE\t11.2\nA,GDEATHRT_THSP,SE\t11.3\n"),
            &NormalizerConfig::default(),
        );
        assert!(matches!(result, Err(Error::DuplicateCode { .. })));
    }

    #[test]
    fn test_duplicate_year_after_trim_rejected() {
        let result = normalize_table(
            &raw("key\t2020\t2020 \nA,GDEATHRT_THSP,SE\t11.2\t11.2\n"),
            &NormalizerConfig::default(),
        );
        assert!(matches!(result, Err(Error::MalformedHeader { .. })));
    }

    #[test]
    fn test_custom_prefix() {
        let config = NormalizerConfig {
            code_prefix: "A,DEATHRT,".to_string(),
        };
        let table = normalize_table(&raw("key\t2020\nA,DEATHRT,PL\t12.5\n"), &config).unwrap();
        assert!(table.get("PL").is_some());
    }
}
