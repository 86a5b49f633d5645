//! Shared building blocks for the RouteGuide client and server.
//!
//! - [`proto`] - Generated protobuf messages and gRPC bindings.
//! - [`geometry`] - Fixed-point coordinates, haversine distance and bounding
//!   boxes.
//! - [`types`] - Constants and small helpers on the generated messages.
//! - [`error`] - The service-wide [`Error`] type.

pub mod error;
pub mod geometry;
pub mod proto;
pub mod types;

pub use error::{Error, Result};
