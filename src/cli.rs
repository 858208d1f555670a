//! Command-line interface definitions and argument parsing

use std::path::PathBuf;

use clap::Parser;

use crate::classify::ClassifierConfig;
use crate::metrics::DeriveConfig;
use crate::normalize::{NormalizerConfig, DEFAULT_CODE_PREFIX};
use crate::pipeline::PipelineConfig;
use crate::report::DEFAULT_LOOKUPS;

/// Excess mortality severity bands for European countries using K-Means
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the Eurostat TSV file (deaths per 1000 inhabitants)
    #[arg(short, long, default_value = "data/mortality_per_1000.tsv")]
    pub input: PathBuf,

    /// Baseline years as a comma-separated list
    /// Example: --baseline-years "2017,2018,2019"
    #[arg(long, default_value = "2017,2018,2019")]
    pub baseline_years: String,

    /// Year compared against the baseline
    #[arg(long, default_value = "2020")]
    pub target_year: String,

    /// Number of K-Means severity bands (the improved band comes on top)
    #[arg(short = 'k', long, default_value = "3")]
    pub clusters: usize,

    /// Maximum iterations for K-Means algorithm
    #[arg(long, default_value = "300")]
    pub max_iters: u64,

    /// Tolerance for K-Means convergence
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Number of K-Means restarts
    #[arg(long, default_value = "10")]
    pub runs: usize,

    /// Seed for K-Means initialization
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Literal prefix of the composite key column before the country code
    #[arg(long, default_value = DEFAULT_CODE_PREFIX)]
    pub code_prefix: String,

    /// GeoJSON file with ISO2 and NAME properties for country names
    #[arg(long)]
    pub regions: Option<PathBuf>,

    /// Output path for the enriched CSV table
    #[arg(long)]
    pub table_out: Option<PathBuf>,

    /// Output path for the baseline vs target bar chart (PNG)
    #[arg(long)]
    pub chart_out: Option<PathBuf>,

    /// Output path for the severity band chart (PNG)
    #[arg(long)]
    pub severity_chart_out: Option<PathBuf>,

    /// Country codes to print, comma-separated
    #[arg(long, value_delimiter = ',', default_values = DEFAULT_LOOKUPS)]
    pub lookup: Vec<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Parse the baseline window
    /// Expected format: "2017,2018,2019"
    pub fn parse_baseline_years(&self) -> anyhow::Result<Vec<String>> {
        let years: Vec<String> = self
            .baseline_years
            .split(',')
            .map(|y| y.trim().to_string())
            .collect();

        if years.iter().any(String::is_empty) {
            anyhow::bail!(
                "Baseline years must be a comma-separated list, got '{}'",
                self.baseline_years
            );
        }

        Ok(years)
    }

    /// Build the pipeline configuration from the parsed arguments
    pub fn pipeline_config(&self) -> anyhow::Result<PipelineConfig> {
        Ok(PipelineConfig {
            input: self.input.clone(),
            normalizer: NormalizerConfig {
                code_prefix: self.code_prefix.clone(),
            },
            derive: DeriveConfig {
                baseline_years: self.parse_baseline_years()?,
                target_year: self.target_year.trim().to_string(),
            },
            classifier: ClassifierConfig {
                n_clusters: self.clusters,
                max_iterations: self.max_iters,
                tolerance: self.tolerance,
                n_runs: self.runs,
                seed: self.seed,
                ..ClassifierConfig::default()
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = Args::parse_from(["excess-mortality"]);

        assert_eq!(args.input, PathBuf::from("data/mortality_per_1000.tsv"));
        assert_eq!(args.clusters, 3);
        assert_eq!(args.lookup, vec!["EU27_2020", "SE", "PL", "CZ"]);
        assert!(args.table_out.is_none());
        assert!(args.chart_out.is_none());

        let config = args.pipeline_config().unwrap();
        assert_eq!(config.derive, DeriveConfig::default());
        assert_eq!(config.normalizer, NormalizerConfig::default());
        assert_eq!(config.classifier, ClassifierConfig::default());
    }

    #[test]
    fn test_parse_baseline_years() {
        let mut args = Args::parse_from([
            "excess-mortality",
            "--baseline-years",
            "2015, 2016,2017",
            "--target-year",
            "2018",
        ]);

        let config = args.pipeline_config().unwrap();
        assert_eq!(config.derive.baseline_years, vec!["2015", "2016", "2017"]);
        assert_eq!(config.derive.target_year, "2018");

        args.baseline_years = "2017,,2019".to_string();
        assert!(args.parse_baseline_years().is_err());
    }

    #[test]
    fn test_outputs_and_lookups() {
        let args = Args::parse_from([
            "excess-mortality",
            "-k",
            "4",
            "--table-out",
            "mortality_table.csv",
            "--lookup",
            "SE,NO",
        ]);

        assert_eq!(args.clusters, 4);
        assert_eq!(args.table_out, Some(PathBuf::from("mortality_table.csv")));
        assert_eq!(args.lookup, vec!["SE", "NO"]);
    }
}
