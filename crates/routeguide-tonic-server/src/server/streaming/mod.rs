//! Drivers for the streaming RPCs.
//!
//! Each driver owns the state of exactly one call and is fed by that call's
//! inbound stream, one message at a time. They take plain
//! `Stream<Item = Result<T, Status>>` inputs and `mpsc` outputs, so the same
//! code runs behind `tonic::Streaming` in production and over in-memory
//! streams in tests.
//!
//! - [`features`] - `ListFeatures`: one geo query, streamed out.
//! - [`route`] - `RecordRoute`: trip statistics over a stream of points.
//! - [`chat`] - `RouteChat`: snapshot-then-append over the note registry.

pub mod chat;
pub mod features;
pub mod route;
