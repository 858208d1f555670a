//! Region dataset and the join between regions and mortality records

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::AGGREGATE_CODES;
use crate::error::Error;
use crate::record::{MortalityRecord, MortalityTable};

/// Region-dataset codes that Eurostat spells differently.
pub const CODE_ALIASES: [(&str, &str); 2] = [("GB", "UK"), ("GR", "EL")];

/// A named region with an opaque geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    /// Code in the mortality table vocabulary
    pub code: String,
    pub name: String,
    pub geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    properties: Properties,
    #[serde(default)]
    geometry: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Properties {
    #[serde(rename = "ISO2")]
    iso2: Option<String>,
    #[serde(rename = "NAME")]
    name: Option<String>,
}

/// Map a region-dataset code onto the mortality table vocabulary.
pub fn canonical_code(code: &str) -> &str {
    CODE_ALIASES
        .iter()
        .find(|(from, _)| *from == code)
        .map_or(code, |(_, to)| *to)
}

#[derive(Debug, Clone, Default)]
pub struct RegionSet {
    regions: Vec<Region>,
}

impl RegionSet {
    pub fn new(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    /// Parse a GeoJSON FeatureCollection with `ISO2` and `NAME` properties.
    ///
    /// Features without an `ISO2` code are skipped.
    pub fn from_geojson_str(content: &str) -> crate::Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(content)?;

        let regions: Vec<Region> = collection
            .features
            .into_iter()
            .filter_map(|feature| {
                let code = feature.properties.iso2?;
                let name = feature.properties.name.unwrap_or_else(|| code.clone());
                Some(Region {
                    code: canonical_code(&code).to_string(),
                    name,
                    geometry: feature.geometry,
                })
            })
            .collect();

        debug!(regions = regions.len(), "Parsed region dataset");
        Ok(Self::new(regions))
    }

    pub fn from_geojson_path(path: impl AsRef<Path>) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_geojson_str(&content)
    }

    pub fn get(&self, code: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.code == code)
    }

    pub fn name_of(&self, code: &str) -> Option<&str> {
        self.get(code).map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

/// A code present on only one side of the join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupMiss {
    /// Mortality record without a region
    MissingRegion(String),
    /// Region without a mortality record
    MissingRecord(String),
}

/// One code from either side of the join, with whatever each side knows.
#[derive(Debug, Clone, Copy)]
pub struct JoinedRow<'a> {
    pub code: &'a str,
    pub region: Option<&'a Region>,
    pub record: Option<&'a MortalityRecord>,
}

impl<'a> JoinedRow<'a> {
    pub fn geometry(&self) -> Option<&'a Value> {
        self.region.and_then(|r| r.geometry.as_ref())
    }

    pub fn severity_class(&self) -> Option<f64> {
        self.record.and_then(|r| r.severity_class)
    }

    pub fn increase_absolute(&self) -> Option<f64> {
        self.record.and_then(|r| r.increase_absolute)
    }

    /// True when there is nothing to colour this row by.
    pub fn is_missing_data(&self) -> bool {
        self.severity_class().is_none()
    }
}

#[derive(Debug, Clone)]
pub struct GeoJoin<'a> {
    /// Sorted by code
    pub rows: Vec<JoinedRow<'a>>,
    pub misses: Vec<LookupMiss>,
}

/// Full outer join of regions and country records by code.
///
/// Aggregate codes are left out. Unmatched codes on either side stay in the
/// result with `None` for the missing side and are listed in `misses`.
pub fn join_regions<'a>(table: &'a MortalityTable, regions: &'a RegionSet) -> GeoJoin<'a> {
    let records: HashMap<&str, &MortalityRecord> = table
        .records
        .iter()
        .filter(|r| !AGGREGATE_CODES.contains(&r.country_code.as_str()))
        .map(|r| (r.country_code.as_str(), r))
        .collect();
    let by_code: HashMap<&str, &Region> = regions
        .regions
        .iter()
        .map(|r| (r.code.as_str(), r))
        .collect();

    let codes: BTreeSet<&str> = records.keys().chain(by_code.keys()).copied().collect();

    let mut rows = Vec::with_capacity(codes.len());
    let mut misses = Vec::new();
    for code in codes {
        let region = by_code.get(code).copied();
        let record = records.get(code).copied();

        match (region, record) {
            (None, Some(_)) => misses.push(LookupMiss::MissingRegion(code.to_string())),
            (Some(_), None) => misses.push(LookupMiss::MissingRecord(code.to_string())),
            _ => {}
        }

        rows.push(JoinedRow {
            code,
            region,
            record,
        });
    }

    for miss in &misses {
        warn!(?miss, "Region lookup miss");
    }

    GeoJoin { rows, misses }
}
