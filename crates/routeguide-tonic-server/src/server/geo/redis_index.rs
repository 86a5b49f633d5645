//! [`GeoIndex`] backed by a Redis geo set.
//!
//! Features are bulk-loaded with `GEOADD` and looked up with
//! `GEOSEARCH ... FROMLONLAT ... BYRADIUS ... m WITHCOORD ASC`, so results come
//! back nearest first, as with the in-memory index. Member semantics are those
//! of the geo set: names are unique and re-adding a name moves it.
//!
//! All calls share one multiplexed connection. Any store failure is reported
//! as [`Error::GeoIndex`].

use super::{GeoIndex, NamedPosition};
use anyhow::Context;
use redis::{Client, Cmd, RedisError, RedisResult, Value, aio::MultiplexedConnection};
use routeguide_tonic_core::{Error, Result};

pub const DEFAULT_GEO_STORE_PORT: u16 = 6379;

/// Members per `GEOADD` during a bulk load.
const LOAD_BATCH: usize = 512;

#[derive(Clone)]
pub struct RedisGeoIndex {
    conn: MultiplexedConnection,
    key: String,
    len: usize,
}

impl RedisGeoIndex {
    /// Connects to the store at `addr` and binds to the geo set under `key`.
    ///
    /// `addr` is either a full `redis://` URL or a `host[:port]` pair; the
    /// port defaults to [`DEFAULT_GEO_STORE_PORT`].
    pub async fn connect(addr: &str, key: impl Into<String>) -> anyhow::Result<Self> {
        let url = store_url(addr);
        let client = Client::open(url.as_str())
            .with_context(|| format!("invalid geo store address {url}"))?;
        let conn = client
            .get_multiplexed_async_connection()
            .await
            .with_context(|| format!("failed to connect to geo store at {url}"))?;

        let mut index = Self {
            conn,
            key: key.into(),
            len: 0,
        };
        index.len = index.count().await?;
        Ok(index)
    }

    /// Adds `positions` to the geo set and returns how many names were new.
    ///
    /// Unnamed positions are skipped. Must finish before the index is shared.
    pub async fn bulk_load(
        &mut self,
        positions: impl IntoIterator<Item = NamedPosition>,
    ) -> anyhow::Result<usize> {
        let positions: Vec<NamedPosition> = positions
            .into_iter()
            .filter(|position| !position.name.is_empty())
            .collect();

        let mut added = 0;
        for batch in positions.chunks(LOAD_BATCH) {
            let new: usize = geoadd_cmd(&self.key, batch)
                .query_async(&mut self.conn)
                .await
                .with_context(|| format!("failed to load features into {}", self.key))?;
            added += new;
        }

        self.len = self.count().await?;
        Ok(added)
    }

    async fn count(&mut self) -> anyhow::Result<usize> {
        let len: usize = redis::cmd("ZCARD")
            .arg(&self.key)
            .query_async(&mut self.conn)
            .await
            .with_context(|| format!("failed to count features in {}", self.key))?;
        Ok(len)
    }
}

#[tonic::async_trait]
impl GeoIndex for RedisGeoIndex {
    async fn radius_query(
        &self,
        center_longitude: f64,
        center_latitude: f64,
        radius_meters: f64,
    ) -> Result<Vec<NamedPosition>> {
        let mut conn = self.conn.clone();
        let search = geosearch_cmd(&self.key, center_longitude, center_latitude, radius_meters);
        let reply: Value = search.query_async(&mut conn).await.map_err(geo_error)?;

        parse_positions(&reply).map_err(geo_error)
    }

    fn len(&self) -> usize {
        self.len
    }
}

fn geo_error(err: RedisError) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!("Geo store query failed: {}", err);
    Error::GeoIndex {
        context: err.to_string(),
    }
}

fn store_url(addr: &str) -> String {
    if addr.contains("://") {
        return addr.to_string();
    }
    let has_port = addr
        .rsplit_once(':')
        .is_some_and(|(_, port)| port.parse::<u16>().is_ok());
    if has_port {
        format!("redis://{addr}")
    } else {
        format!("redis://{addr}:{DEFAULT_GEO_STORE_PORT}")
    }
}

fn geoadd_cmd(key: &str, positions: &[NamedPosition]) -> Cmd {
    let mut cmd = redis::cmd("GEOADD");
    cmd.arg(key);
    for position in positions {
        cmd.arg(position.longitude)
            .arg(position.latitude)
            .arg(&position.name);
    }
    cmd
}

fn geosearch_cmd(key: &str, longitude: f64, latitude: f64, radius_meters: f64) -> Cmd {
    let mut cmd = redis::cmd("GEOSEARCH");
    cmd.arg(key)
        .arg("FROMLONLAT")
        .arg(longitude)
        .arg(latitude)
        .arg("BYRADIUS")
        .arg(radius_meters)
        .arg("m")
        .arg("WITHCOORD")
        .arg("ASC");
    cmd
}

/// Decodes a `GEOSEARCH ... WITHCOORD` reply: `[[name, [lon, lat]], ...]`.
fn parse_positions(reply: &Value) -> RedisResult<Vec<NamedPosition>> {
    let rows: Vec<(String, (f64, f64))> = redis::from_redis_value(reply)?;
    Ok(rows
        .into_iter()
        .map(|(name, (longitude, latitude))| NamedPosition {
            name,
            longitude,
            latitude,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bulk(s: &str) -> Value {
        Value::BulkString(s.as_bytes().to_vec())
    }

    fn packed(cmd: &Cmd) -> String {
        String::from_utf8(cmd.get_packed_command()).unwrap()
    }

    #[test]
    fn store_url_fills_in_scheme_and_port() {
        assert_eq!(store_url("localhost"), "redis://localhost:6379");
        assert_eq!(store_url("10.0.0.5:7000"), "redis://10.0.0.5:7000");
        assert_eq!(store_url("redis://cache:6380/2"), "redis://cache:6380/2");
    }

    #[test]
    fn geosearch_passes_longitude_before_latitude() {
        let text = packed(&geosearch_cmd("features", -74.5, 40.25, 10.0));
        let lon = text.find("-74.5").unwrap();
        let lat = text.find("40.25").unwrap();
        assert!(text.contains("GEOSEARCH"));
        assert!(text.contains("FROMLONLAT"));
        assert!(text.contains("BYRADIUS"));
        assert!(text.contains("WITHCOORD"));
        assert!(lon < lat);
    }

    #[test]
    fn geoadd_lists_every_member() {
        let positions = [
            NamedPosition {
                name: "a".to_string(),
                longitude: -74.5,
                latitude: 40.25,
            },
            NamedPosition {
                name: "b".to_string(),
                longitude: -73.5,
                latitude: 41.25,
            },
        ];
        let text = packed(&geoadd_cmd("features", &positions));
        // GEOADD, key, then three arguments per member.
        assert!(text.starts_with("*8\r\n"));
        assert!(text.contains("-73.5"));
        assert!(text.contains("\r\nb\r\n"));
    }

    #[test]
    fn parses_search_reply() {
        let reply = Value::Array(vec![
            Value::Array(vec![
                bulk("Patriots Path, Mendham, NJ 07945, USA"),
                Value::Array(vec![
                    bulk("-74.61437445878982544"),
                    bulk("40.78383436953302706"),
                ]),
            ]),
            Value::Array(vec![
                bulk("101 New Jersey 10, Whippany, NJ 07981, USA"),
                Value::Array(vec![
                    bulk("-74.39991742372512817"),
                    bulk("40.81228141111094506"),
                ]),
            ]),
        ]);

        let positions = parse_positions(&reply).unwrap();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].name, "Patriots Path, Mendham, NJ 07945, USA");
        assert!((positions[0].longitude - -74.614_376_3).abs() < 1e-5);
        assert!((positions[1].latitude - 40.812_280_8).abs() < 1e-5);
    }

    #[test]
    fn empty_reply_is_no_match() {
        assert!(parse_positions(&Value::Array(Vec::new())).unwrap().is_empty());
    }

    #[test]
    fn malformed_reply_maps_to_geo_index_error() {
        let reply = Value::Array(vec![Value::Int(3)]);
        let err = parse_positions(&reply).map_err(geo_error).unwrap_err();
        assert!(matches!(err, Error::GeoIndex { .. }));
    }

    #[tokio::test]
    #[ignore = "requires a Redis server at GEO_STORE_ADDR (default localhost)"]
    async fn round_trips_through_live_store() {
        let addr = std::env::var("GEO_STORE_ADDR").unwrap_or_else(|_| "localhost".to_string());
        let mut index = RedisGeoIndex::connect(&addr, "routeguide:test:features")
            .await
            .unwrap();
        index
            .bulk_load([NamedPosition {
                name: "Patriots Path, Mendham, NJ 07945, USA".to_string(),
                longitude: -74.614_376_3,
                latitude: 40.783_835_1,
            }])
            .await
            .unwrap();

        assert!(index.len() >= 1);
        let found = index
            .radius_query(-74.614_376_3, 40.783_835_1, 10.0)
            .await
            .unwrap();
        assert_eq!(found[0].name, "Patriots Path, Mendham, NJ 07945, USA");
    }
}
