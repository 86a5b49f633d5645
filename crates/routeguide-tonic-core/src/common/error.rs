//! Error types for the RouteGuide service.
//!
//! This module defines the central `Error` enum shared by the server's
//! handlers, the geo index adapters and the session tracker. It implements
//! `From<Error>` for `tonic::Status` so that failures propagate to clients with
//! appropriate status codes.
//!
//! Absence of data is never an error here: an unknown point yields an unnamed
//! feature, an empty rectangle yields an empty stream, and an unseen location
//! yields no prior notes.
//!
//! ## Error Cases
//! - `GeoIndex`: The backing geo store failed to answer a radius query.
//! - `ChannelError`: An internal communication failure between tasks.
//! - `RequestCancelled`: The client cancelled the call mid-flight.
//! - `ServiceShutdown`: A call arrived while the service was shutting down.

use tonic::Status;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for the RouteGuide service.
#[derive(Clone, thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    /// The geo index could not serve a query.
    #[error("Geo index error: {context}")]
    GeoIndex { context: String },

    /// Internal channel send/receive failure (e.g., closed or full channel).
    #[error("Channel error: {context}")]
    ChannelError { context: String },

    /// The client aborted the call.
    #[error("Request cancelled by client")]
    RequestCancelled,

    /// The service is in the process of shutting down.
    #[error("Service is shutting down")]
    ServiceShutdown,
}

impl From<Error> for Status {
    fn from(err: Error) -> Self {
        match err {
            Error::GeoIndex { context } => {
                Status::unavailable(format!("Geo index error: {}", context))
            }
            Error::ChannelError { context } => {
                Status::internal(format!("Channel error: {}", context))
            }
            Error::RequestCancelled => Status::cancelled("Request was cancelled"),
            Error::ServiceShutdown => Status::unavailable("Service is shutting down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn maps_errors_to_status_codes() {
        let geo: Status = Error::GeoIndex {
            context: "connection refused".to_string(),
        }
        .into();
        assert_eq!(geo.code(), Code::Unavailable);
        assert!(geo.message().contains("connection refused"));

        let channel: Status = Error::ChannelError {
            context: "receiver dropped".to_string(),
        }
        .into();
        assert_eq!(channel.code(), Code::Internal);

        let cancelled: Status = Error::RequestCancelled.into();
        assert_eq!(cancelled.code(), Code::Cancelled);

        let shutdown: Status = Error::ServiceShutdown.into();
        assert_eq!(shutdown.code(), Code::Unavailable);
    }
}
