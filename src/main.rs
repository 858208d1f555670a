//! Excess mortality: severity bands for European countries
//!
//! This is the main entrypoint that orchestrates the pipeline run and
//! the optional table, chart and console outputs.

use anyhow::{Context, Result};
use clap::Parser;
use excess_mortality::{report, run_pipeline, write_outputs, Args, OutputTargets, RegionSet};
use std::time::Instant;
use tracing::info;

fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse();
    init_tracing(args.verbose);

    let start_time = Instant::now();
    let config = args.pipeline_config()?;

    let regions = args
        .regions
        .as_ref()
        .map(RegionSet::from_geojson_path)
        .transpose()
        .context("Failed to load region dataset")?;

    let output = run_pipeline(&config)
        .with_context(|| format!("Pipeline failed for {}", config.input.display()))?;

    report::print_lookups(&output.table, &args.lookup, &config.derive.target_year);
    report::print_band_statistics(&output.table, &output.classification);

    let targets = OutputTargets {
        table: args.table_out.clone(),
        comparison_chart: args.chart_out.clone(),
        severity_chart: args.severity_chart_out.clone(),
    };
    let written = write_outputs(&output, regions.as_ref(), &targets, &config.derive.target_year)
        .context("Failed to write outputs")?;
    for path in &written {
        println!("Saved: {}", path.display());
    }

    info!(
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "Done"
    );
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}
