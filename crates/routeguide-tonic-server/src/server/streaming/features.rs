use crate::server::{geo::FeatureLocator, telemetry::increment_features_emitted};
use routeguide_tonic_core::{Error, Result, geometry::BoundingBox, proto::Feature};
use tokio::sync::mpsc;
use tonic::Status;

/// Streams the features found for `bbox` into `resp_tx`.
///
/// Features are forwarded in the order the geo index returned them. A failed
/// lookup is surfaced to the client as a status (best effort) and returned.
///
/// Returns the number of features sent. The response stream completes when
/// the caller drops `resp_tx`.
///
/// # Errors
///
/// - [`Error::GeoIndex`] if the lookup fails.
/// - [`Error::RequestCancelled`] if the client stops listening mid-stream.
pub async fn feed_features(
    locator: &FeatureLocator,
    bbox: BoundingBox,
    resp_tx: &mpsc::Sender<core::result::Result<Feature, Status>>,
) -> Result<usize> {
    let features = match locator.features_within(&bbox).await {
        Ok(features) => features,
        Err(e) => {
            // Best effort: the client may already be gone.
            if let Err(_e) = resp_tx.send(Err(e.clone().into())).await {
                #[cfg(feature = "tracing")]
                tracing::warn!("Failed to forward err: {}", _e);
            }
            return Err(e);
        }
    };

    let mut sent = 0;
    for feature in features {
        if resp_tx.send(Ok(feature)).await.is_err() {
            return Err(Error::RequestCancelled);
        }
        increment_features_emitted();
        sent += 1;
    }

    Ok(sent)
}
