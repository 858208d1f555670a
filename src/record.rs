//! Typed mortality records shared by every pipeline stage

use std::collections::BTreeMap;

/// One country or aggregate row of the mortality table.
#[derive(Debug, Clone, PartialEq)]
pub struct MortalityRecord {
    pub country_code: String,
    /// Deaths per 1000 inhabitants by year label; censored cells are `None`.
    pub yearly_values: BTreeMap<String, Option<f64>>,
    pub baseline_mean: Option<f64>,
    pub increase_absolute: Option<f64>,
    pub increase_percent: Option<f64>,
    /// Rounded mean `increase_percent` of the band this record belongs to.
    pub severity_class: Option<f64>,
}

impl MortalityRecord {
    pub fn new(
        country_code: impl Into<String>,
        yearly_values: BTreeMap<String, Option<f64>>,
    ) -> Self {
        Self {
            country_code: country_code.into(),
            yearly_values,
            baseline_mean: None,
            increase_absolute: None,
            increase_percent: None,
            severity_class: None,
        }
    }

    /// Value for a year, flattening both unknown years and censored cells.
    pub fn value(&self, year: &str) -> Option<f64> {
        self.yearly_values.get(year).copied().flatten()
    }
}

/// Ordered year labels plus the records that share them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MortalityTable {
    pub years: Vec<String>,
    pub records: Vec<MortalityRecord>,
}

impl MortalityTable {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, country_code: &str) -> Option<&MortalityRecord> {
        self.records.iter().find(|r| r.country_code == country_code)
    }

    pub fn has_year(&self, year: &str) -> bool {
        self.years.iter().any(|y| y == year)
    }

    /// Records with a defined `increase_percent`, in table order.
    pub fn with_increase(&self) -> impl Iterator<Item = &MortalityRecord> {
        self.records.iter().filter(|r| r.increase_percent.is_some())
    }
}
