//! In-process [`GeoIndex`] backed by a flat list of named positions.
//!
//! Member semantics follow a geo-set store: names are unique, adding a name
//! again moves it, and unnamed records are not indexed. Radius queries scan
//! every position and return matches nearest first.

use super::{GeoIndex, NamedPosition};
use routeguide_tonic_core::{Result, geometry::haversine_degrees};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct MemoryGeoIndex {
    positions: Vec<NamedPosition>,
    by_name: HashMap<String, usize>,
}

impl MemoryGeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: impl IntoIterator<Item = NamedPosition>) -> Self {
        let mut index = Self::new();
        for position in positions {
            index.add(position.name, position.longitude, position.latitude);
        }
        index
    }

    #[cfg(test)]
    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        super::feature_db::parse_feature_db(raw).map(Self::from_positions)
    }

    #[cfg(test)]
    pub fn from_features(
        features: impl IntoIterator<Item = routeguide_tonic_core::proto::Feature>,
    ) -> Self {
        use routeguide_tonic_core::geometry::decode_degrees;

        let mut index = Self::new();
        for feature in features {
            let location = feature.location.unwrap_or_default();
            index.add(
                feature.name,
                decode_degrees(location.longitude),
                decode_degrees(location.latitude),
            );
        }
        index
    }

    /// Adds or moves a named position. Returns `false` for an empty name,
    /// which is not indexed.
    pub fn add(&mut self, name: String, longitude: f64, latitude: f64) -> bool {
        if name.is_empty() {
            return false;
        }

        if let Some(&slot) = self.by_name.get(&name) {
            let existing = &mut self.positions[slot];
            existing.longitude = longitude;
            existing.latitude = latitude;
        } else {
            self.by_name.insert(name.clone(), self.positions.len());
            self.positions.push(NamedPosition {
                name,
                longitude,
                latitude,
            });
        }
        true
    }
}

#[tonic::async_trait]
impl GeoIndex for MemoryGeoIndex {
    async fn radius_query(
        &self,
        center_longitude: f64,
        center_latitude: f64,
        radius_meters: f64,
    ) -> Result<Vec<NamedPosition>> {
        let mut found: Vec<(f64, &NamedPosition)> = self
            .positions
            .iter()
            .map(|position| {
                let distance = haversine_degrees(
                    center_latitude,
                    center_longitude,
                    position.latitude,
                    position.longitude,
                );
                (distance, position)
            })
            .filter(|(distance, _)| *distance <= radius_meters)
            .collect();

        found.sort_by(|(a, _), (b, _)| a.total_cmp(b));

        Ok(found
            .into_iter()
            .map(|(_, position)| position.clone())
            .collect())
    }

    fn len(&self) -> usize {
        self.positions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DB: &str = r#"[
        {
            "location": { "latitude": 407838351, "longitude": -746143763 },
            "name": "Patriots Path, Mendham, NJ 07945, USA"
        },
        {
            "location": { "latitude": 408122808, "longitude": -743999179 },
            "name": "101 New Jersey 10, Whippany, NJ 07981, USA"
        },
        {
            "location": { "latitude": 413628156, "longitude": -749015468 },
            "name": "U.S. 6, Shohola, PA 18458, USA"
        },
        {
            "location": { "latitude": 419999544, "longitude": -740371136 },
            "name": ""
        }
    ]"#;

    #[test]
    fn loads_named_records_only() {
        let index = MemoryGeoIndex::from_json(DB).unwrap();
        assert_eq!(index.len(), 3);
        assert!(!index.is_empty());
    }

    #[test]
    fn re_adding_a_name_moves_it() {
        let mut index = MemoryGeoIndex::new();
        assert!(index.add("a".to_string(), 1.0, 2.0));
        assert!(index.add("a".to_string(), 3.0, 4.0));
        assert!(!index.add(String::new(), 0.0, 0.0));
        assert_eq!(index.len(), 1);
        assert_eq!(index.positions[0].longitude, 3.0);
        assert_eq!(index.positions[0].latitude, 4.0);
    }

    #[tokio::test]
    async fn radius_query_returns_nearest_first() {
        let index = MemoryGeoIndex::from_json(DB).unwrap();
        // Centered on Patriots Path; Whippany is ~18 km away, Shohola ~75 km.
        let found = index
            .radius_query(-74.614_376_3, 40.783_835_1, 100_000.0)
            .await
            .unwrap();
        let names: Vec<_> = found.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "Patriots Path, Mendham, NJ 07945, USA",
                "101 New Jersey 10, Whippany, NJ 07981, USA",
                "U.S. 6, Shohola, PA 18458, USA",
            ]
        );
    }

    #[tokio::test]
    async fn radius_query_excludes_far_positions() {
        let index = MemoryGeoIndex::from_json(DB).unwrap();
        let found = index
            .radius_query(-74.614_376_3, 40.783_835_1, 1_000.0)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found[0].clone().into_feature().location,
            Some(routeguide_tonic_core::proto::Point::new(
                407_838_351,
                -746_143_763
            ))
        );
    }
}
