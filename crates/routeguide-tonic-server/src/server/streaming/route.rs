use crate::server::{geo::FeatureLocator, telemetry::increment_points_recorded};
use routeguide_tonic_core::{
    Error, Result,
    geometry::haversine_distance_meters,
    proto::{Point, RouteSummary},
};
use std::time::Instant;
use tokio_stream::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tonic::Status;

/// Trip statistics accumulated over one `RecordRoute` call.
///
/// Owned by the call that created it; nothing else sees it until
/// [`finish`](Self::finish) turns it into a [`RouteSummary`]. All counters
/// saturate at `i32::MAX`.
#[derive(Debug)]
pub struct RouteSession {
    point_count: i32,
    feature_count: i32,
    distance: i32,
    previous: Option<Point>,
    started: Instant,
}

impl Default for RouteSession {
    fn default() -> Self {
        Self::starting_at(Instant::now())
    }
}

impl RouteSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn starting_at(started: Instant) -> Self {
        Self {
            point_count: 0,
            feature_count: 0,
            distance: 0,
            previous: None,
            started,
        }
    }

    /// Adds one point to the trip. The first point contributes no distance.
    pub fn record(&mut self, point: Point, on_feature: bool) {
        self.point_count = self.point_count.saturating_add(1);
        if on_feature {
            self.feature_count = self.feature_count.saturating_add(1);
        }
        if let Some(previous) = self.previous {
            self.distance = self
                .distance
                .saturating_add(haversine_distance_meters(&previous, &point));
        }
        self.previous = Some(point);
    }

    pub fn finish(self) -> RouteSummary {
        self.finish_at(Instant::now())
    }

    /// Builds the summary with the elapsed time measured up to `now`, in whole
    /// seconds (truncated).
    pub fn finish_at(self, now: Instant) -> RouteSummary {
        let elapsed = now.saturating_duration_since(self.started).as_secs();
        RouteSummary {
            point_count: self.point_count,
            feature_count: self.feature_count,
            distance: self.distance,
            elapsed_time: i32::try_from(elapsed).unwrap_or(i32::MAX),
        }
    }
}

/// Drives a `RecordRoute` call to completion.
///
/// Each received point is checked against the geo index for a feature and
/// folded into a [`RouteSession`]. The summary is produced only when the client
/// closes its side cleanly.
///
/// # Errors
///
/// - [`Error::RequestCancelled`] if the inbound stream fails (client reset or
///   disconnect). No summary is produced.
/// - [`Error::ServiceShutdown`] if `cancel` fires first.
/// - [`Error::GeoIndex`] if a feature lookup fails.
pub async fn record_route<S>(
    points: S,
    locator: &FeatureLocator,
    cancel: &CancellationToken,
) -> Result<RouteSummary>
where
    S: Stream<Item = core::result::Result<Point, Status>> + Unpin,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(Error::ServiceShutdown),
        summary = accumulate(points, locator) => summary,
    }
}

async fn accumulate<S>(mut points: S, locator: &FeatureLocator) -> Result<RouteSummary>
where
    S: Stream<Item = core::result::Result<Point, Status>> + Unpin,
{
    let mut session = RouteSession::new();

    while let Some(next) = points.next().await {
        let point = next.map_err(|_status| {
            #[cfg(feature = "tracing")]
            tracing::debug!("Inbound route stream failed: {}", _status);
            Error::RequestCancelled
        })?;

        let feature = locator.check_feature(point).await?;
        session.record(point, feature.is_named());
        increment_points_recorded();
    }

    Ok(session.finish())
}
