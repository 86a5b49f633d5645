//! Spatial lookups against the geo-indexed feature store.
//!
//! The store itself sits behind the [`GeoIndex`] trait: a single point-radius
//! query that returns named positions in real-valued degrees. Everything the
//! handlers need on top of that (fixed-point conversion, the "no feature"
//! sentinel, bounding-box queries) lives in [`FeatureLocator`].
//!
//! Two stores are bundled, both bulk-loaded from the JSON feature database
//! ([`feature_db`]) before the server starts:
//!
//! - [`redis_index::RedisGeoIndex`] - an external Redis geo set, selected with
//!   `--geo-store-addr`.
//! - [`memory::MemoryGeoIndex`] - an in-process index for local runs and tests.

pub mod feature_db;
pub mod memory;
pub mod redis_index;

use routeguide_tonic_core::{
    Result,
    geometry::{BoundingBox, decode_degrees, point_from_degrees},
    proto::{Feature, Point},
};
use std::sync::Arc;

/// A named position as reported by the geo store.
#[derive(Clone, Debug, PartialEq)]
pub struct NamedPosition {
    pub name: String,
    pub longitude: f64,
    pub latitude: f64,
}

impl NamedPosition {
    /// Re-encodes the position as a fixed-point [`Feature`].
    pub fn into_feature(self) -> Feature {
        Feature {
            location: Some(point_from_degrees(self.longitude, self.latitude)),
            name: self.name,
        }
    }
}

/// Point-radius queries over a set of named positions.
///
/// Result order is up to the implementation and is passed through to clients
/// untouched.
#[tonic::async_trait]
pub trait GeoIndex: Send + Sync + 'static {
    /// Returns every named position within `radius_meters` of the center.
    async fn radius_query(
        &self,
        center_longitude: f64,
        center_latitude: f64,
        radius_meters: f64,
    ) -> Result<Vec<NamedPosition>>;

    /// Number of named positions held by the store.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Translates RouteGuide geometry into [`GeoIndex`] queries.
#[derive(Clone)]
pub struct FeatureLocator {
    index: Arc<dyn GeoIndex>,
    feature_radius_meters: f64,
}

impl FeatureLocator {
    pub fn new(index: Arc<dyn GeoIndex>, feature_radius_meters: f64) -> Self {
        Self {
            index,
            feature_radius_meters,
        }
    }

    /// Returns the feature at `location`, or the unnamed sentinel.
    ///
    /// The first stored position within the feature radius names the result;
    /// the returned location is always the one that was asked about.
    pub async fn check_feature(&self, location: Point) -> Result<Feature> {
        let found = self
            .index
            .radius_query(
                decode_degrees(location.longitude),
                decode_degrees(location.latitude),
                self.feature_radius_meters,
            )
            .await?;

        Ok(match found.into_iter().next() {
            Some(position) => Feature {
                name: position.name,
                location: Some(location),
            },
            None => Feature::unnamed(location),
        })
    }

    /// Returns the features found within the search circle of `bbox`.
    ///
    /// The circle is centered on the box and has a radius of half its
    /// diagonal, so matches near the corners may be missed and matches just
    /// outside the edges may be included.
    pub async fn features_within(&self, bbox: &BoundingBox) -> Result<Vec<Feature>> {
        let center = bbox.center();
        let found = self
            .index
            .radius_query(
                decode_degrees(center.longitude),
                decode_degrees(center.latitude),
                f64::from(bbox.search_radius_meters()),
            )
            .await?;

        Ok(found.into_iter().map(NamedPosition::into_feature).collect())
    }

    pub fn index(&self) -> &Arc<dyn GeoIndex> {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memory::MemoryGeoIndex;
    use routeguide_tonic_core::proto::Rectangle;

    fn locator() -> FeatureLocator {
        let index = MemoryGeoIndex::from_features([
            Feature {
                name: "Berkshire Valley Management Area Trail, Jefferson, NJ, USA".to_string(),
                location: Some(Point::new(409_146_138, -746_188_906)),
            },
            Feature {
                name: "101 New Jersey 10, Whippany, NJ 07981, USA".to_string(),
                location: Some(Point::new(408_122_808, -743_999_179)),
            },
        ]);
        FeatureLocator::new(Arc::new(index), 10.0)
    }

    #[tokio::test]
    async fn finds_feature_at_exact_point() {
        let location = Point::new(409_146_138, -746_188_906);
        let feature = locator().check_feature(location).await.unwrap();
        assert_eq!(
            feature.name,
            "Berkshire Valley Management Area Trail, Jefferson, NJ, USA"
        );
        assert_eq!(feature.location, Some(location));
    }

    #[tokio::test]
    async fn unknown_point_returns_sentinel_at_requested_location() {
        let location = Point::new(0, 0);
        let feature = locator().check_feature(location).await.unwrap();
        assert!(!feature.is_named());
        assert_eq!(feature.location, Some(location));
    }

    #[tokio::test]
    async fn nearby_point_within_radius_matches() {
        // ~5.5 m north of the stored feature.
        let location = Point::new(409_146_138 + 500, -746_188_906);
        let feature = locator().check_feature(location).await.unwrap();
        assert!(feature.is_named());
        assert_eq!(feature.location, Some(location));
    }

    #[tokio::test]
    async fn point_outside_radius_does_not_match() {
        // ~55 m north of the stored feature.
        let location = Point::new(409_146_138 + 5_000, -746_188_906);
        let feature = locator().check_feature(location).await.unwrap();
        assert!(!feature.is_named());
    }

    #[tokio::test]
    async fn lists_features_inside_rectangle() {
        let rect = Rectangle::new(
            Point::new(400_000_000, -750_000_000),
            Point::new(420_000_000, -730_000_000),
        );
        let features = locator()
            .features_within(&BoundingBox::from_rectangle(&rect))
            .await
            .unwrap();
        assert_eq!(features.len(), 2);
        assert!(features.iter().all(Feature::is_named));
        assert!(
            features
                .iter()
                .any(|f| f.location == Some(Point::new(408_122_808, -743_999_179)))
        );
    }

    #[tokio::test]
    async fn empty_rectangle_lists_nothing() {
        let rect = Rectangle::new(Point::new(0, 0), Point::new(10, 10));
        let features = locator()
            .features_within(&BoundingBox::from_rectangle(&rect))
            .await
            .unwrap();
        assert!(features.is_empty());
    }
}
