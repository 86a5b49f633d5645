//! gRPC service and message definitions generated from
//! `proto/route_guide.proto`.
//!
//! ## Service
//!
//! - `GetFeature` - unary lookup of the feature at a point.
//! - `ListFeatures` - server-streaming query over a rectangle.
//! - `RecordRoute` - client-streaming route summary.
//! - `RouteChat` - bidirectional chat keyed by location.
//!
//! Coordinates are fixed-point: degrees multiplied by 10^7. See
//! [`crate::geometry`] for the conversions.

tonic::include_proto!("routeguide");

/// Encoded file descriptor set for `route_guide.proto`, used to serve gRPC
/// reflection.
pub const FILE_DESCRIPTOR_SET: &[u8] =
    tonic::include_file_descriptor_set!("routeguide_descriptor");
