use anyhow::bail;
use clap::Parser;
use routeguide_tonic_core::types::DEFAULT_FEATURE_RADIUS_METERS;
use std::path::PathBuf;

const DEFAULT_GEO_STORE_KEY: &str = "route_guide:features";

/// Runtime configuration for the `routeguide-tonic-server` binary.
///
/// All values are parsed from CLI arguments or environment variables (a `.env`
/// file is loaded first), with defaults suitable for local use.
#[derive(Parser, Debug, Clone)]
#[command(
    name = "routeguide-tonic-server",
    version,
    about = "A gRPC service for feature lookup, route recording and location chat"
)]
pub struct CliArgs {
    /// Address to listen on (TCP or Unix socket path; use --uds for Unix
    /// socket).
    ///
    /// Example: "0.0.0.0:10000" or "/tmp/routeguide.sock"
    ///
    /// Environment variable: `SERVER_ADDR`
    #[arg(long, env = "SERVER_ADDR", default_value_t = String::from("0.0.0.0:10000"))]
    pub server_addr: String,

    /// Listen on a Unix socket instead of TCP. If set, `SERVER_ADDR` must be a
    /// file path.
    #[arg(short, long, default_value_t = false)]
    pub uds: bool,

    /// Address of the Redis geo store (`host`, `host:port` or a `redis://`
    /// URL; the port defaults to 6379). When unset, features are served from
    /// an in-process index.
    ///
    /// Environment variable: `GEO_STORE_ADDR`
    #[arg(long, env = "GEO_STORE_ADDR")]
    pub geo_store_addr: Option<String>,

    /// Key of the geo set holding the features in the Redis store.
    ///
    /// Environment variable: `GEO_STORE_KEY`
    #[arg(long, env = "GEO_STORE_KEY", default_value = DEFAULT_GEO_STORE_KEY)]
    pub geo_store_key: String,

    /// JSON feature database bulk-loaded into the geo index before serving.
    ///
    /// Environment variable: `FEATURES_DB`
    #[arg(long, env = "FEATURES_DB", default_value = "data/route_guide_db.json")]
    pub features_db: PathBuf,

    /// Radius in meters within which a stored feature counts as being at the
    /// requested point (`GetFeature`, and feature counting in `RecordRoute`).
    ///
    /// Environment variable: `FEATURE_RADIUS_METERS`
    #[arg(long, env = "FEATURE_RADIUS_METERS", default_value_t = DEFAULT_FEATURE_RADIUS_METERS)]
    pub feature_radius_meters: f64,

    /// Capacity of the outbound buffer of each streaming response.
    ///
    /// Lower values increase backpressure responsiveness; higher values let a
    /// handler run further ahead of a slow client.
    ///
    /// Environment variable: `STREAM_BUFFER_SIZE`
    #[arg(long, env = "STREAM_BUFFER_SIZE", default_value_t = 16)]
    pub stream_buffer_size: usize,

    /// Seconds to wait for in-flight calls to finish on shutdown before they
    /// are cancelled.
    ///
    /// Environment variable: `SHUTDOWN_TIMEOUT`
    #[arg(long, env = "SHUTDOWN_TIMEOUT", default_value_t = 3)]
    pub shutdown_timeout: u64,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub server_addr: String,
    pub uds: bool,
    pub geo_store_addr: Option<String>,
    pub geo_store_key: String,
    pub features_db: PathBuf,
    pub feature_radius_meters: f64,
    pub stream_buffer_size: usize,
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            server_addr: String::from("0.0.0.0:10000"),
            uds: false,
            geo_store_addr: None,
            geo_store_key: DEFAULT_GEO_STORE_KEY.to_string(),
            features_db: PathBuf::from("data/route_guide_db.json"),
            feature_radius_meters: DEFAULT_FEATURE_RADIUS_METERS,
            stream_buffer_size: 16,
            shutdown_timeout: 3,
        }
    }
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        if args.stream_buffer_size == 0 {
            bail!("STREAM_BUFFER_SIZE must be greater than 0");
        }

        if args.geo_store_key.is_empty() {
            bail!("GEO_STORE_KEY must not be empty");
        }

        if !args.feature_radius_meters.is_finite() || args.feature_radius_meters < 0.0 {
            bail!(
                "FEATURE_RADIUS_METERS ({}) must be a finite, non-negative number",
                args.feature_radius_meters
            );
        }

        Ok(Self {
            server_addr: args.server_addr,
            uds: args.uds,
            geo_store_addr: args.geo_store_addr,
            geo_store_key: args.geo_store_key,
            features_db: args.features_db,
            feature_radius_meters: args.feature_radius_meters,
            stream_buffer_size: args.stream_buffer_size,
            shutdown_timeout: args.shutdown_timeout,
        })
    }
}
