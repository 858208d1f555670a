//! End-to-end pipeline: load, normalize, derive, classify, assemble, write

use std::path::PathBuf;

use tracing::{debug, info};

use crate::charts::{render_comparison_chart, render_severity_chart, severity_bars, ChartStyle};
use crate::classify::{classify, Classification, ClassifierConfig};
use crate::loader::load_raw_table;
use crate::metrics::{derive_metrics, DeriveConfig};
use crate::normalize::{normalize_table, NormalizerConfig};
use crate::output::{assemble, comparison_long_format, export_table, to_dataframe, StagedWrites};
use crate::record::MortalityTable;
use crate::regions::{join_regions, RegionSet};

/// Everything a single pipeline run needs.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub input: PathBuf,
    pub normalizer: NormalizerConfig,
    pub derive: DeriveConfig,
    pub classifier: ClassifierConfig,
}

impl PipelineConfig {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            normalizer: NormalizerConfig::default(),
            derive: DeriveConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Every source record, enriched with metrics and severity labels
    pub table: MortalityTable,
    pub classification: Classification,
}

/// Run all stages in order. Any failure aborts the whole run.
///
/// Nothing is written here; callers export only after this returns `Ok`.
pub fn run_pipeline(config: &PipelineConfig) -> crate::Result<PipelineOutput> {
    let raw = load_raw_table(&config.input)?;
    info!(rows = raw.rows.len(), "Loaded {}", config.input.display());

    let normalized = normalize_table(&raw, &config.normalizer)?;
    let derived = derive_metrics(&normalized, &config.derive)?;
    let classification = classify(&derived, &config.classifier)?;
    let table = assemble(&derived, &classification);

    info!(
        records = table.len(),
        classified = classification.member_count(),
        bands = classification.bands.len(),
        "Pipeline complete"
    );

    Ok(PipelineOutput {
        table,
        classification,
    })
}

/// Where each optional output goes. `None` skips that output.
#[derive(Debug, Clone, Default)]
pub struct OutputTargets {
    pub table: Option<PathBuf>,
    pub comparison_chart: Option<PathBuf>,
    pub severity_chart: Option<PathBuf>,
}

/// Render every requested output, then move them all into place.
///
/// Outputs are written under staging names first, so a failure in any of
/// them leaves no destination touched. Returns the written paths.
pub fn write_outputs(
    output: &PipelineOutput,
    regions: Option<&RegionSet>,
    targets: &OutputTargets,
    target_year: &str,
) -> crate::Result<Vec<PathBuf>> {
    let joined = regions.map(|regions| join_regions(&output.table, regions));
    if let Some(joined) = &joined {
        debug!(
            rows = joined.rows.len(),
            misses = joined.misses.len(),
            "Joined mortality table with regions"
        );
    }

    let mut staged = StagedWrites::new();

    if let Some(dest) = &targets.table {
        let mut df = to_dataframe(&output.table, regions)?;
        let staging = staged.stage(dest);
        export_table(&mut df, Some(staging.as_path()))?;
    }

    if let Some(dest) = &targets.comparison_chart {
        let rows = comparison_long_format(&output.table, regions, target_year);
        let style = ChartStyle::default().with_title("Mortality per 1000 inhabitants in Europe");
        render_comparison_chart(&rows, &style, &staged.stage(dest))?;
    }

    if let Some(dest) = &targets.severity_chart {
        let bars = severity_bars(&output.table, joined.as_ref());
        let style = ChartStyle::default()
            .with_title(format!("Mortality increase in Europe {}", target_year));
        render_severity_chart(&bars, &output.classification, &style, &staged.stage(dest))?;
    }

    staged.commit()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_tsv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", content).unwrap();
        file
    }

    #[test]
    fn test_run_pipeline_scenario() {
        let file = write_tsv(
            "freq,indic_de,geo\\TIME_PERIOD\t2017 \t2018 \t2019 \t2020 \n\
             A,GDEATHRT_THSP,SE\t9.5\t9.6\t9.4\t11.2\n\
             A,GDEATHRT_THSP,NO\t7.7\t7.6\t7.5\t7.5 p\n\
             A,GDEATHRT_THSP,PL\t10.6\t10.9\t10.8\t12.6 e\n\
             A,GDEATHRT_THSP,DK\t9.2\t9.3\t9.1\t9.3\n\
             A,GDEATHRT_THSP,IE\t6.3\t6.4\t6.3\t: \n",
        );

        let output = run_pipeline(&PipelineConfig::new(file.path())).unwrap();
        assert_eq!(output.table.len(), 5);

        let se = output.table.get("SE").unwrap();
        assert!((se.increase_percent.unwrap() - 17.894736842).abs() < 1e-6);
        assert!(se.severity_class.is_some());

        let no = output.table.get("NO").unwrap();
        assert!(no.increase_percent.unwrap() < 0.0);
        assert!(output.classification.band_of("NO").unwrap().improved);

        let ie = output.table.get("IE").unwrap();
        assert_eq!(ie.severity_class, None);
        assert!(ie.baseline_mean.is_some());
    }

    #[test]
    fn test_run_pipeline_degenerate() {
        let file = write_tsv(
            "key\t2017\t2018\t2019\t2020\n\
             A,GDEATHRT_THSP,SE\t9.5\t9.6\t9.4\t11.2\n\
             A,GDEATHRT_THSP,PL\t10.6\t10.9\t10.8\t12.6\n",
        );

        let result = run_pipeline(&PipelineConfig::new(file.path()));
        assert!(matches!(
            result,
            Err(Error::DegenerateInput {
                available: 2,
                requested: 3
            })
        ));
    }
}
