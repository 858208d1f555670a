//! Excess mortality: severity bands for European countries using K-Means clustering
//!
//! This library cleans Eurostat crude death rate tables, derives excess
//! mortality against a baseline window, and groups countries into ordered
//! severity bands labeled by their mean percentage increase.

pub mod charts;
pub mod classify;
pub mod cli;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod normalize;
pub mod output;
pub mod pipeline;
pub mod record;
pub mod regions;
pub mod report;

// Re-export public items for easier access
pub use classify::{
    classify, fit_kmeans, Classification, ClassifierConfig, KMeansModel, SeverityBand,
};
pub use cli::Args;
pub use error::{Error, ErrorCategory};
pub use loader::{load_raw_table, RawTable};
pub use metrics::{derive_metrics, DeriveConfig};
pub use normalize::{normalize_table, NormalizerConfig};
pub use output::{assemble, comparison_long_format, export_table, to_dataframe};
pub use pipeline::{run_pipeline, write_outputs, OutputTargets, PipelineConfig, PipelineOutput};
pub use record::{MortalityRecord, MortalityTable};
pub use regions::{join_regions, RegionSet};

/// Common result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;
