//! Reader for the JSON feature database.
//!
//! The file is an array of `{ "location": { "latitude", "longitude" }, "name" }`
//! records in fixed-point degrees. Records without a name are dropped on read,
//! since an unnamed position can never be reported as a feature.

use super::NamedPosition;
use anyhow::Context;
use routeguide_tonic_core::geometry::decode_degrees;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct FeatureRecord {
    location: LocationRecord,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct LocationRecord {
    latitude: i32,
    longitude: i32,
}

/// Reads and parses the feature database at `path`.
pub fn read_feature_db(path: impl AsRef<Path>) -> anyhow::Result<Vec<NamedPosition>> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read feature database {}", path.display()))?;
    parse_feature_db(&raw)
        .with_context(|| format!("failed to parse feature database {}", path.display()))
}

pub fn parse_feature_db(raw: &str) -> anyhow::Result<Vec<NamedPosition>> {
    let records: Vec<FeatureRecord> = serde_json::from_str(raw)?;
    Ok(records
        .into_iter()
        .filter(|record| !record.name.is_empty())
        .map(|record| NamedPosition {
            name: record.name,
            longitude: decode_degrees(record.location.longitude),
            latitude: decode_degrees(record.location.latitude),
        })
        .collect())
}
