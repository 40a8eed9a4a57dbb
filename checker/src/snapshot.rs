use chrono::{DateTime, TimeZone, Utc};
use tracing::{debug, info};

use crate::decode::{decode_ping, decode_variable};
use crate::errors::{Error, Result};
use crate::model::{
    DeviceTarget, PingStatus, TimestampSource, VariableReading, VariableSnapshot,
};
use crate::transport::{Request, Transport};

pub const DRY_RUN_VALUE: &str = "N/A";

/// Turns one or two variable fetches into a single timestamped snapshot.
///
/// Requests are strictly sequential; nothing is fetched after a failure.
pub struct SnapshotBuilder<'a, T> {
    transport: &'a T,
    target: &'a DeviceTarget,
    api_base: &'a str,
}

impl<'a, T: Transport> SnapshotBuilder<'a, T> {
    pub fn new(transport: &'a T, target: &'a DeviceTarget, api_base: &'a str) -> Self {
        Self {
            transport,
            target,
            api_base,
        }
    }

    pub async fn build(
        &self,
        variable: &str,
        timestamp_variable: Option<&str>,
        dry_run: bool,
    ) -> Result<VariableSnapshot> {
        if dry_run {
            info!(
                "Dry run: not contacting device {} for variable {}",
                self.target.device_id, variable
            );
            let now = Utc::now();
            return Ok(VariableSnapshot {
                reading: VariableReading {
                    name: variable.to_string(),
                    raw_value: DRY_RUN_VALUE.to_string(),
                    fetched_at_local: now,
                    core_info: None,
                },
                timestamp: now,
                timestamp_source: TimestampSource::Local,
            });
        }

        let reading = self.fetch_variable(variable).await?;

        // The value and its timestamp come from two separate round trips, so
        // the device may update between them. The age reported is that of the
        // timestamp actually retrieved; pairing them consistently is the
        // firmware's job.
        let (timestamp, timestamp_source) = match timestamp_variable {
            Some(name) => {
                let stamp = self.fetch_variable(name).await?;
                (
                    parse_epoch_seconds(&stamp.raw_value)?,
                    TimestampSource::RemoteVariable,
                )
            }
            None => (reading.fetched_at_local, TimestampSource::Local),
        };

        debug!(
            "Var:{} Val:{} Timestamp:{} ({:?})",
            reading.name,
            reading.raw_value,
            timestamp.timestamp(),
            timestamp_source
        );

        Ok(VariableSnapshot {
            reading,
            timestamp,
            timestamp_source,
        })
    }

    pub async fn ping(&self) -> Result<PingStatus> {
        let request = Request::put_authorized(
            self.target.url(self.api_base, "ping")?,
            self.target.credential.as_str(),
        );
        let body = self.transport.fetch(&request).await?;
        let status = decode_ping(&body)?;
        debug!("Online:{} Ok:{}", status.online, status.ok);
        Ok(status)
    }

    async fn fetch_variable(&self, name: &str) -> Result<VariableReading> {
        let request = Request::get_with_token(
            self.target.url(self.api_base, name)?,
            self.target.credential.as_str(),
        );
        let body = self.transport.fetch(&request).await?;
        let reading = decode_variable(&body, name, Utc::now())?;

        if let Some(info) = &reading.core_info {
            debug!(
                "DeviceID:{:?} Connected:{:?} LastHeard:{:?} LastHandshakeAt:{:?} ProductID:{:?}",
                info.device_id, info.connected, info.last_heard, info.last_handshake_at, info.product_id
            );
        }

        Ok(reading)
    }
}

/// Parses a base-10 Unix epoch seconds value.
pub fn parse_epoch_seconds(raw: &str) -> Result<DateTime<Utc>> {
    let seconds: i64 = raw
        .trim()
        .parse()
        .map_err(|_| Error::TimestampParse(raw.to_string()))?;

    Utc.timestamp_opt(seconds, 0)
        .single()
        .ok_or_else(|| Error::TimestampParse(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Method;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays canned responses in order and records every request.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<Vec<u8>>>>,
        requests: Mutex<Vec<Request>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<Vec<u8>>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
            }
        }

        fn requests(&self) -> Vec<Request> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn fetch(&self, request: &Request) -> Result<Vec<u8>> {
            self.requests.lock().unwrap().push(request.clone());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::Network("no scripted response".to_string())))
        }
    }

    fn ok(body: &str) -> Result<Vec<u8>> {
        Ok(body.as_bytes().to_vec())
    }

    fn target() -> DeviceTarget {
        DeviceTarget {
            device_id: "dev-1".to_string(),
            product_id: None,
            credential: "secret".to_string(),
        }
    }

    const BASE: &str = "https://api.particle.io/v1/";

    #[test]
    fn test_dry_run_skips_network() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let before = Utc::now();
            let snapshot = builder.build("temp", Some("ts"), true).await.unwrap();

            assert_eq!(snapshot.reading.raw_value, "N/A");
            assert_eq!(snapshot.reading.name, "temp");
            assert_eq!(snapshot.timestamp_source, TimestampSource::Local);
            assert!(snapshot.timestamp >= before);
            assert!(transport.requests().is_empty());
        });
    }

    #[test]
    fn test_local_timestamp() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![ok(r#"{"name":"temp","result":"72"}"#)]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let snapshot = builder.build("temp", None, false).await.unwrap();

            assert_eq!(snapshot.reading.raw_value, "72");
            assert_eq!(snapshot.timestamp_source, TimestampSource::Local);
            assert_eq!(snapshot.timestamp, snapshot.reading.fetched_at_local);

            let requests = transport.requests();
            assert_eq!(requests.len(), 1);
            assert_eq!(requests[0].method, Method::Get);
            assert_eq!(
                requests[0].url.as_str(),
                "https://api.particle.io/v1/devices/dev-1/temp"
            );
            assert_eq!(
                requests[0].query,
                vec![("access_token".to_string(), "secret".to_string())]
            );
            assert_eq!(requests[0].bearer, None);
        });
    }

    #[test]
    fn test_remote_timestamp() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![
                ok(r#"{"name":"temp","result":"72"}"#),
                ok(r#"{"result":"1000000"}"#),
            ]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let snapshot = builder.build("temp", Some("ts"), false).await.unwrap();

            assert_eq!(snapshot.timestamp.timestamp(), 1_000_000);
            assert_eq!(snapshot.timestamp_source, TimestampSource::RemoteVariable);
            assert_eq!(snapshot.reading.name, "temp");

            let requests = transport.requests();
            assert_eq!(requests.len(), 2);
            assert!(requests[0].url.path().ends_with("/temp"));
            assert!(requests[1].url.path().ends_with("/ts"));
        });
    }

    #[test]
    fn test_primary_failure_skips_timestamp_fetch() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![
                Err(Error::Http {
                    url: "u".to_string(),
                    status: 404,
                }),
                ok(r#"{"result":"1000000"}"#),
            ]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let err = builder.build("temp", Some("ts"), false).await.unwrap_err();

            assert!(matches!(err, Error::Http { status: 404, .. }));
            assert_eq!(transport.requests().len(), 1);
        });
    }

    #[test]
    fn test_non_integer_timestamp() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![
                ok(r#"{"name":"temp","result":"72"}"#),
                ok(r#"{"name":"ts","result":"yesterday"}"#),
            ]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let err = builder.build("temp", Some("ts"), false).await.unwrap_err();
            assert!(matches!(err, Error::TimestampParse(ref s) if s == "yesterday"));
        });
    }

    #[test]
    fn test_timestamp_decode_failure() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![
                ok(r#"{"name":"temp","result":"72"}"#),
                ok(r#"{"name":"ts"}"#),
            ]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let err = builder.build("temp", Some("ts"), false).await.unwrap_err();
            assert!(matches!(err, Error::Decode(_)));
        });
    }

    #[test]
    fn test_ping_request() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![ok(r#"{"online":true,"ok":true}"#)]);
            let target = DeviceTarget {
                product_id: Some("77".to_string()),
                ..target()
            };
            let builder = SnapshotBuilder::new(&transport, &target, BASE);

            let status = builder.ping().await.unwrap();
            assert!(status.online && status.ok);

            let requests = transport.requests();
            assert_eq!(requests[0].method, Method::Put);
            assert_eq!(
                requests[0].url.as_str(),
                "https://api.particle.io/v1/products/77/devices/dev-1/ping"
            );
            assert!(requests[0].query.is_empty());
            assert_eq!(requests[0].bearer.as_deref(), Some("secret"));
        });
    }

    #[test]
    fn test_bad_api_base_sends_nothing() {
        tokio_test::block_on(async {
            let transport = ScriptedTransport::new(vec![]);
            let target = target();
            let builder = SnapshotBuilder::new(&transport, &target, "not a url");

            let err = builder.build("temp", None, false).await.unwrap_err();
            assert!(matches!(err, Error::Config(_)));
            assert!(transport.requests().is_empty());
        });
    }

    #[test]
    fn test_parse_epoch_seconds() {
        assert_eq!(parse_epoch_seconds(" 1700000000\n").unwrap().timestamp(), 1_700_000_000);
        assert!(parse_epoch_seconds("17e8").is_err());
        assert!(parse_epoch_seconds("").is_err());
        assert!(parse_epoch_seconds("99999999999999999").is_err());
    }
}
