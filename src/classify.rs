//! Severity classification: 1-D K-Means bands with an explicit "improved" band

use std::collections::BTreeMap;

use linfa::prelude::*;
use linfa_clustering::KMeans;
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::error::Error;
use crate::record::MortalityTable;

/// Eurostat aggregates and non-country codes kept out of the clustering.
pub const AGGREGATE_CODES: [&str; 7] = [
    "EA18",
    "EA19",
    "EU27_2007",
    "EU27_2020",
    "EU28",
    "FX",
    "XK",
];

/// K-Means parameters and candidate filtering for the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierConfig {
    /// Number of K-Means bands, not counting the improved band
    pub n_clusters: usize,
    pub max_iterations: u64,
    pub tolerance: f64,
    /// Independent K-Means restarts; the lowest-inertia run wins
    pub n_runs: usize,
    /// Seed for centroid initialization. Same seed and input, same bands.
    pub seed: u64,
    /// Codes never clustered, even with a defined increase
    pub excluded_codes: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            n_clusters: 3,
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
            seed: 42,
            excluded_codes: AGGREGATE_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ClassifierConfig {
    fn is_excluded(&self, code: &str) -> bool {
        self.excluded_codes.iter().any(|c| c == code)
    }
}

/// Fitted K-Means result over the 1-D increase values
#[derive(Debug, Clone)]
pub struct KMeansModel {
    /// Number of clusters
    pub n_clusters: usize,
    /// Raw cluster index per input point, before the improved override
    pub labels: Array1<usize>,
    /// Cluster centroids, shape (n_clusters, 1)
    pub centroids: Array2<f64>,
    /// Within-cluster sum of squares
    pub inertia: f64,
}

/// One severity class after the override and relabeling steps.
#[derive(Debug, Clone, PartialEq)]
pub struct SeverityBand {
    /// K-Means index, or `n_clusters` for the improved band
    pub cluster: usize,
    /// Position in ascending order of mean
    pub rank: usize,
    /// Mean increase rounded to one decimal; the value written to records
    pub label: f64,
    pub mean: f64,
    pub members: Vec<String>,
    pub improved: bool,
}

/// Bands for every clustered record plus the underlying model.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Ordered by ascending mean
    pub bands: Vec<SeverityBand>,
    pub model: KMeansModel,
}

impl Classification {
    pub fn band_of(&self, country_code: &str) -> Option<&SeverityBand> {
        self.bands
            .iter()
            .find(|band| band.members.iter().any(|m| m == country_code))
    }

    pub fn label_of(&self, country_code: &str) -> Option<f64> {
        self.band_of(country_code).map(|band| band.label)
    }

    pub fn member_count(&self) -> usize {
        self.bands.iter().map(|band| band.members.len()).sum()
    }
}

/// Round to one decimal place.
pub fn round_to_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Fit K-Means on single-valued points.
///
/// # Arguments
/// * `values` - One increase percentage per point
/// * `config` - Cluster count, iteration cap, tolerance, restarts and seed
///
/// # Returns
/// * Fitted `KMeansModel`, or `DegenerateInput` when there are fewer points than clusters
pub fn fit_kmeans(values: &[f64], config: &ClassifierConfig) -> crate::Result<KMeansModel> {
    if config.n_clusters == 0 {
        return Err(Error::InvalidConfig(
            "number of clusters must be at least 1".to_string(),
        ));
    }

    if values.len() < config.n_clusters {
        return Err(Error::DegenerateInput {
            available: values.len(),
            requested: config.n_clusters,
        });
    }

    let n_samples = values.len();
    let features = Array2::from_shape_fn((n_samples, 1), |(i, _)| values[i]);
    let targets: Array1<usize> = Array1::zeros(n_samples); // Unused by K-Means
    let dataset = Dataset::new(features, targets);

    let rng = ChaCha8Rng::seed_from_u64(config.seed);
    let model = KMeans::params_with(config.n_clusters, rng, L2Dist)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .n_runs(config.n_runs)
        .fit(&dataset)?;

    let labels: Array1<usize> = model.predict(&dataset);
    let centroids = model.centroids().clone();
    let inertia = squared_distance_sum(values, &labels, &centroids);

    debug!(
        points = n_samples,
        clusters = config.n_clusters,
        centroids = ?centroids.column(0).to_vec(),
        inertia,
        "Fitted K-Means"
    );

    Ok(KMeansModel {
        n_clusters: config.n_clusters,
        labels,
        centroids,
        inertia,
    })
}

/// Partition records with a defined increase into labeled severity bands.
///
/// Negative increases always land in the improved band, whatever K-Means
/// assigned them. Each band is labeled with its members' rounded mean.
pub fn classify(
    table: &MortalityTable,
    config: &ClassifierConfig,
) -> crate::Result<Classification> {
    let candidates: Vec<(&str, f64)> = table
        .with_increase()
        .filter(|r| !config.is_excluded(&r.country_code))
        .filter_map(|r| r.increase_percent.map(|p| (r.country_code.as_str(), p)))
        .collect();

    let values: Vec<f64> = candidates.iter().map(|&(_, p)| p).collect();
    let model = fit_kmeans(&values, config)?;

    let improved = config.n_clusters;
    let mut grouped: BTreeMap<usize, Vec<(&str, f64)>> = BTreeMap::new();
    for (&(code, value), &label) in candidates.iter().zip(model.labels.iter()) {
        let cluster = if value < 0.0 { improved } else { label };
        grouped.entry(cluster).or_default().push((code, value));
    }

    let mut bands: Vec<SeverityBand> = grouped
        .into_iter()
        .map(|(cluster, members)| {
            let mean = members.iter().map(|&(_, v)| v).sum::<f64>() / members.len() as f64;
            SeverityBand {
                cluster,
                rank: 0,
                label: round_to_tenth(mean),
                mean,
                members: members.iter().map(|&(code, _)| code.to_string()).collect(),
                improved: cluster == improved,
            }
        })
        .collect();

    bands.sort_by(|a, b| a.mean.total_cmp(&b.mean));
    for (rank, band) in bands.iter_mut().enumerate() {
        band.rank = rank;
    }

    info!(
        classified = candidates.len(),
        bands = bands.len(),
        labels = ?bands.iter().map(|b| b.label).collect::<Vec<_>>(),
        "Classified severity bands"
    );

    Ok(Classification { bands, model })
}

/// Squared distance of every value to its assigned centroid, summed.
fn squared_distance_sum(values: &[f64], labels: &Array1<usize>, centroids: &Array2<f64>) -> f64 {
    values
        .iter()
        .zip(labels.iter())
        .map(|(&value, &cluster)| (value - centroids[[cluster, 0]]).powi(2))
        .sum()
}
