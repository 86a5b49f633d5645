pub mod config;
pub mod geo;
pub mod notes;
pub mod service;
pub mod session;
pub mod streaming;
pub mod telemetry;
