//! Baseline and excess mortality metrics

use tracing::debug;

use crate::error::Error;
use crate::record::{MortalityRecord, MortalityTable};

/// Baseline window and target year for the excess computation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeriveConfig {
    pub baseline_years: Vec<String>,
    pub target_year: String,
}

impl Default for DeriveConfig {
    fn default() -> Self {
        Self {
            baseline_years: vec!["2017".to_string(), "2018".to_string(), "2019".to_string()],
            target_year: "2020".to_string(),
        }
    }
}

impl DeriveConfig {
    fn validate(&self, table: &MortalityTable) -> crate::Result<()> {
        if self.baseline_years.is_empty() {
            return Err(Error::UnknownYear {
                year: String::new(),
                available: table.years.join(", "),
            });
        }

        for year in self.baseline_years.iter().chain(std::iter::once(&self.target_year)) {
            if !table.has_year(year) {
                return Err(Error::UnknownYear {
                    year: year.clone(),
                    available: table.years.join(", "),
                });
            }
        }
        Ok(())
    }
}

/// Mean of the values that are present; `None` if there are none.
pub fn mean_of_available(values: impl IntoIterator<Item = Option<f64>>) -> Option<f64> {
    let (sum, count) = values
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));

    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

/// Percentage deviation of `target` from `baseline`; undefined for a zero baseline.
pub fn percent_increase(target: f64, baseline: f64) -> Option<f64> {
    if baseline == 0.0 {
        return None;
    }
    Some((target / (baseline / 100.0)) - 100.0)
}

/// Compute baseline mean, absolute and percentage increase for every record.
///
/// Returns a new table; earlier severity labels are cleared since they depend
/// on the previous metrics.
pub fn derive_metrics(
    table: &MortalityTable,
    config: &DeriveConfig,
) -> crate::Result<MortalityTable> {
    config.validate(table)?;

    let records: Vec<MortalityRecord> = table
        .records
        .iter()
        .map(|record| derive_record(record, config))
        .collect();

    debug!(
        target_year = %config.target_year,
        baseline = ?config.baseline_years,
        with_increase = records.iter().filter(|r| r.increase_percent.is_some()).count(),
        "Derived metrics"
    );

    Ok(MortalityTable {
        years: table.years.clone(),
        records,
    })
}

fn derive_record(record: &MortalityRecord, config: &DeriveConfig) -> MortalityRecord {
    let baseline_mean = mean_of_available(config.baseline_years.iter().map(|y| record.value(y)));
    let target = record.value(&config.target_year);

    let (increase_absolute, increase_percent) = match (target, baseline_mean) {
        (Some(target), Some(baseline)) => {
            (Some(target - baseline), percent_increase(target, baseline))
        }
        _ => (None, None),
    };

    MortalityRecord {
        country_code: record.country_code.clone(),
        yearly_values: record.yearly_values.clone(),
        baseline_mean,
        increase_absolute,
        increase_percent,
        severity_class: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const EPS: f64 = 1e-9;

    fn record(code: &str, values: &[(&str, Option<f64>)]) -> MortalityRecord {
        let values: BTreeMap<String, Option<f64>> = values
            .iter()
            .map(|(y, v)| (y.to_string(), *v))
            .collect();
        MortalityRecord::new(code, values)
    }

    fn table(records: Vec<MortalityRecord>) -> MortalityTable {
        MortalityTable {
            years: ["2017", "2018", "2019", "2020"].iter().map(|y| y.to_string()).collect(),
            records,
        }
    }

    #[test]
    fn test_sweden_scenario() {
        let input = table(vec![record(
            "SE",
            &[
                ("2017", Some(9.5)),
                ("2018", Some(9.6)),
                ("2019", Some(9.4)),
                ("2020", Some(11.2)),
            ],
        )]);

        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        let se = derived.get("SE").unwrap();

        assert!((se.baseline_mean.unwrap() - 9.5).abs() < EPS);
        assert!((se.increase_absolute.unwrap() - 1.7).abs() < EPS);
        assert!((se.increase_percent.unwrap() - 17.894736842105).abs() < 1e-6);
    }

    #[test]
    fn test_percent_formula_matches_ratio() {
        let input = table(vec![
            record(
                "PL",
                &[
                    ("2017", Some(10.6)),
                    ("2018", Some(10.9)),
                    ("2019", Some(10.8)),
                    ("2020", Some(12.6)),
                ],
            ),
            record(
                "CZ",
                &[
                    ("2017", Some(10.5)),
                    ("2018", Some(10.6)),
                    ("2019", Some(10.5)),
                    ("2020", Some(12.2)),
                ],
            ),
        ]);

        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        for r in &derived.records {
            let baseline = r.baseline_mean.unwrap();
            let target = r.value("2020").unwrap();
            let expected = target / baseline * 100.0 - 100.0;
            assert!((r.increase_percent.unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_missing_baseline_values_are_excluded_not_zeroed() {
        let input = table(vec![record(
            "EL",
            &[("2017", Some(11.0)), ("2018", None), ("2019", Some(12.0)), ("2020", Some(12.0))],
        )]);

        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        assert!((derived.records[0].baseline_mean.unwrap() - 11.5).abs() < EPS);
    }

    #[test]
    fn test_all_missing_baseline_propagates() {
        let input = table(vec![record(
            "XK",
            &[("2017", None), ("2018", None), ("2019", None), ("2020", Some(7.0))],
        )]);

        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        let xk = &derived.records[0];
        assert_eq!(xk.baseline_mean, None);
        assert_eq!(xk.increase_absolute, None);
        assert_eq!(xk.increase_percent, None);
    }

    #[test]
    fn test_missing_target_keeps_record() {
        let input = table(vec![record(
            "IE",
            &[("2017", Some(6.3)), ("2018", Some(6.4)), ("2019", Some(6.3)), ("2020", None)],
        )]);

        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        assert_eq!(derived.len(), 1);
        assert!(derived.records[0].baseline_mean.is_some());
        assert_eq!(derived.records[0].increase_absolute, None);
        assert_eq!(derived.records[0].increase_percent, None);
    }

    #[test]
    fn test_zero_baseline_has_no_percentage() {
        assert_eq!(percent_increase(5.0, 0.0), None);

        let input = table(vec![record(
            "ZZ",
            &[("2017", Some(0.0)), ("2018", Some(0.0)), ("2019", Some(0.0)), ("2020", Some(1.0))],
        )]);
        let derived = derive_metrics(&input, &DeriveConfig::default()).unwrap();
        assert_eq!(derived.records[0].increase_absolute, Some(1.0));
        assert_eq!(derived.records[0].increase_percent, None);
    }

    #[test]
    fn test_custom_window() {
        let input = table(vec![record(
            "SE",
            &[("2017", Some(9.0)), ("2018", Some(10.0)), ("2019", Some(9.4)), ("2020", Some(11.2))],
        )]);
        let config = DeriveConfig {
            baseline_years: vec!["2017".to_string(), "2018".to_string()],
            target_year: "2019".to_string(),
        };

        let derived = derive_metrics(&input, &config).unwrap();
        let se = &derived.records[0];
        assert!((se.baseline_mean.unwrap() - 9.5).abs() < EPS);
        assert!((se.increase_absolute.unwrap() - (-0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_year_rejected() {
        let input = table(vec![]);
        let config = DeriveConfig {
            baseline_years: vec!["2016".to_string()],
            target_year: "2020".to_string(),
        };
        assert!(matches!(
            derive_metrics(&input, &config),
            Err(Error::UnknownYear { .. })
        ));

        let config = DeriveConfig {
            baseline_years: vec![],
            target_year: "2020".to_string(),
        };
        assert!(derive_metrics(&input, &config).is_err());
    }
}
