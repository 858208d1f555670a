//! Console reporting of country lookups and band statistics

use crate::classify::Classification;
use crate::record::MortalityTable;

/// Codes printed by default: the EU average and a few reference countries.
pub const DEFAULT_LOOKUPS: [&str; 4] = ["EU27_2020", "SE", "PL", "CZ"];

/// Formatted summary of one country, or `None` if the code is unknown.
pub fn lookup_line(table: &MortalityTable, code: &str, target_year: &str) -> Option<String> {
    let record = table.get(code)?;
    Some(format!(
        "{:<10} baseline {:>6}  {} {:>6}  increase {:>6} ({:>7})  class {}",
        record.country_code,
        fmt_value(record.baseline_mean, 2),
        target_year,
        fmt_value(record.value(target_year), 2),
        fmt_value(record.increase_absolute, 2),
        format!("{}%", fmt_value(record.increase_percent, 2)),
        fmt_value(record.severity_class, 1),
    ))
}

fn fmt_value(value: Option<f64>, precision: usize) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{:.*}", precision, v))
}

/// Print the requested country lookups to stdout
pub fn print_lookups(table: &MortalityTable, codes: &[String], target_year: &str) {
    println!("\n=== Country Lookups ===");
    for code in codes {
        match lookup_line(table, code, target_year) {
            Some(line) => println!("{}", line),
            None => println!("{:<10} not present in the table", code),
        }
    }
}

/// Print band statistics to stdout
pub fn print_band_statistics(table: &MortalityTable, classification: &Classification) {
    let classified = classification.member_count();

    println!("\n=== Severity Bands ===");
    println!("Records in table: {}", table.len());
    println!("Classified countries: {}", classified);
    println!(
        "Within-cluster sum of squares (Inertia): {:.2}",
        classification.model.inertia
    );

    println!("\n  Rank | Label (%) | Members | Countries");
    println!("  -----|-----------|---------|----------");
    for band in &classification.bands {
        let marker = if band.improved { " (improved)" } else { "" };
        println!(
            "  {:4} | {:9.1} | {:7} | {}{}",
            band.rank,
            band.label,
            band.members.len(),
            band.members.join(", "),
            marker
        );
    }

    let unclassified = table.len() - classified.min(table.len());
    if unclassified > 0 {
        println!("\nNo data / not classified: {}", unclassified);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::MortalityRecord;
    use std::collections::BTreeMap;

    #[test]
    fn test_lookup_line() {
        let mut values = BTreeMap::new();
        values.insert("2020".to_string(), Some(11.2));
        let mut se = MortalityRecord::new("SE", values);
        se.baseline_mean = Some(9.5);
        se.increase_absolute = Some(1.7);
        se.increase_percent = Some(17.894736);
        se.severity_class = Some(17.2);

        let table = MortalityTable {
            years: vec!["2020".to_string()],
            records: vec![se, MortalityRecord::new("IE", BTreeMap::new())],
        };

        let line = lookup_line(&table, "SE", "2020").unwrap();
        assert!(line.contains("9.50"));
        assert!(line.contains("11.20"));
        assert!(line.contains("17.89%"));
        assert!(line.contains("class 17.2"));

        let ie = lookup_line(&table, "IE", "2020").unwrap();
        assert!(ie.contains("n/a"));

        assert!(lookup_line(&table, "PL", "2020").is_none());
    }
}
