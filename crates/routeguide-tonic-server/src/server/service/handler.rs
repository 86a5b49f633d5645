//! gRPC entry point for the RouteGuide service.
//!
//! [`RouteGuideService`] implements the generated [`RouteGuide`] trait. Every
//! handler registers with the [`SessionTracker`] first, so calls that arrive
//! during shutdown are refused and calls already running are drained before
//! the process exits.
//!
//! ## Responsibilities
//!
//! - Answer `GetFeature` from the geo index.
//! - Stream `ListFeatures` results through a bounded response channel.
//! - Fold `RecordRoute` points into a summary.
//! - Run `RouteChat` sessions against the shared note registry.

use crate::server::{
    config::ServerConfig,
    geo::{FeatureLocator, GeoIndex},
    notes::NoteRegistry,
    session::SessionTracker,
    streaming::{chat::route_chat, features::feed_features, route::record_route},
    telemetry::{increment_requests, increment_call_errors, record_call_duration},
};
use core::{pin::Pin, time::Duration};
use futures::TryStreamExt;
use routeguide_tonic_core::{
    Error,
    geometry::BoundingBox,
    proto::{Feature, Point, Rectangle, RouteNote, RouteSummary, route_guide_server::RouteGuide},
};
use std::{sync::Arc, time::Instant};
use tokio::sync::mpsc;
use tokio_stream::{Stream, wrappers::ReceiverStream};
use tonic::{Request, Response, Status, Streaming};

const GET_FEATURE: &str = "GetFeature";
const LIST_FEATURES: &str = "ListFeatures";
const RECORD_ROUTE: &str = "RecordRoute";
const ROUTE_CHAT: &str = "RouteChat";

type ResponseStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// RouteGuide service backed by a [`GeoIndex`] and an in-memory note registry.
///
/// Cloning is cheap: clones share the geo index, the note registry and the
/// session tracker.
#[derive(Clone)]
pub struct RouteGuideService {
    config: ServerConfig,
    locator: FeatureLocator,
    notes: Arc<NoteRegistry>,
    sessions: Arc<SessionTracker>,
}

impl RouteGuideService {
    pub fn new(config: ServerConfig, geo: Arc<dyn GeoIndex>) -> Self {
        let locator = FeatureLocator::new(geo, config.feature_radius_meters);
        let sessions = SessionTracker::new(Duration::from_secs(config.shutdown_timeout));

        Self {
            config,
            locator,
            notes: Arc::new(NoteRegistry::new()),
            sessions: Arc::new(sessions),
        }
    }

    /// Refuses new calls, waits for running ones, then cancels stragglers.
    pub async fn shutdown(&self) {
        self.sessions.shutdown().await;
    }

    /// Number of named features the geo index can answer with.
    pub fn feature_count(&self) -> usize {
        self.locator.index().len()
    }

    #[cfg(test)]
    pub fn inflight_calls(&self) -> usize {
        self.sessions.inflight()
    }

    #[cfg(test)]
    pub fn notes(&self) -> &Arc<NoteRegistry> {
        &self.notes
    }
}

/// Logs a failed or cancelled call and counts it. Other calls are unaffected.
fn record_failure(rpc: &'static str, _err: &Error) {
    increment_call_errors(rpc);
    #[cfg(feature = "tracing")]
    tracing::warn!("{} ended: {}", rpc, _err);
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1_000.0
}

#[tonic::async_trait]
impl RouteGuide for RouteGuideService {
    type ListFeaturesStream = ResponseStream<Feature>;
    type RouteChatStream = ResponseStream<RouteNote>;

    /// Returns the feature at the requested point, or an unnamed feature at
    /// that point if there is none.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(rpc = GET_FEATURE)))]
    async fn get_feature(&self, req: Request<Point>) -> Result<Response<Feature>, Status> {
        let start = Instant::now();
        increment_requests(GET_FEATURE);
        let _guard = self.sessions.begin()?;

        let location = req.into_inner();
        match self.locator.check_feature(location).await {
            Ok(feature) => {
                record_call_duration(GET_FEATURE, elapsed_ms(start));
                Ok(Response::new(feature))
            }
            Err(e) => {
                record_failure(GET_FEATURE, &e);
                Err(e.into())
            }
        }
    }

    /// Streams every feature inside the search circle of the rectangle.
    ///
    /// The lookup runs on a spawned task that feeds a bounded channel, so a
    /// slow client applies backpressure instead of buffering the whole result.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(rpc = LIST_FEATURES)))]
    async fn list_features(
        &self,
        req: Request<Rectangle>,
    ) -> Result<Response<Self::ListFeaturesStream>, Status> {
        let start = Instant::now();
        increment_requests(LIST_FEATURES);
        let guard = self.sessions.begin()?;

        let bbox = BoundingBox::from_rectangle(req.get_ref());
        let locator = self.locator.clone();
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<Feature, Status>>(self.config.stream_buffer_size);

        let fut = async move {
            let outcome = tokio::select! {
                biased;
                () = guard.cancelled_on_shutdown().cancelled() => Err(Error::ServiceShutdown),
                sent = feed_features(&locator, bbox, &resp_tx) => sent,
            };

            match outcome {
                Ok(_sent) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Streamed {} features", _sent);
                    record_call_duration(LIST_FEATURES, elapsed_ms(start));
                }
                Err(e) => {
                    if e == Error::ServiceShutdown {
                        let _ = resp_tx.send(Err(e.clone().into())).await;
                    }
                    record_failure(LIST_FEATURES, &e);
                }
            }
            drop(guard);
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("list_features_stream"))
        };

        tokio::spawn(fut);

        Ok(Response::new(Box::pin(ReceiverStream::new(resp_rx))))
    }

    /// Consumes a stream of points and answers with a trip summary once the
    /// client closes its side.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(rpc = RECORD_ROUTE)))]
    async fn record_route(
        &self,
        req: Request<Streaming<Point>>,
    ) -> Result<Response<RouteSummary>, Status> {
        let start = Instant::now();
        increment_requests(RECORD_ROUTE);
        let guard = self.sessions.begin()?;

        let points = req.into_inner();
        match record_route(points, &self.locator, guard.cancelled_on_shutdown()).await {
            Ok(summary) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(
                    "Route of {} points, {} features, {} m",
                    summary.point_count,
                    summary.feature_count,
                    summary.distance
                );
                record_call_duration(RECORD_ROUTE, elapsed_ms(start));
                Ok(Response::new(summary))
            }
            Err(e) => {
                record_failure(RECORD_ROUTE, &e);
                Err(e.into())
            }
        }
    }

    /// Runs one chat session: for each inbound note, replay the notes already
    /// left at its location, then store it.
    #[cfg_attr(feature = "tracing", tracing::instrument(skip_all, fields(rpc = ROUTE_CHAT)))]
    async fn route_chat(
        &self,
        req: Request<Streaming<RouteNote>>,
    ) -> Result<Response<Self::RouteChatStream>, Status> {
        let start = Instant::now();
        increment_requests(ROUTE_CHAT);
        let guard = self.sessions.begin()?;

        let inbound = req.into_inner();
        let notes = Arc::clone(&self.notes);
        let (resp_tx, resp_rx) =
            mpsc::channel::<Result<RouteNote, Status>>(self.config.stream_buffer_size);

        let fut = async move {
            match route_chat(inbound, &notes, &resp_tx, guard.cancelled_on_shutdown()).await {
                Ok(_stored) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Chat closed after {} notes", _stored);
                    record_call_duration(ROUTE_CHAT, elapsed_ms(start));
                }
                Err(e) => {
                    // Best effort: a cancelled client is no longer listening.
                    if e != Error::RequestCancelled {
                        let _ = resp_tx.send(Err(e.clone().into())).await;
                    }
                    record_failure(ROUTE_CHAT, &e);
                }
            }
            drop(guard);
        };
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            fut.instrument(tracing::info_span!("route_chat_stream"))
        };

        tokio::spawn(fut);

        let stream = ReceiverStream::new(resp_rx).inspect_err(|_status| {
            #[cfg(feature = "tracing")]
            tracing::debug!("Chat stream ending with status: {}", _status);
        });

        Ok(Response::new(Box::pin(stream)))
    }
}
