use std::fmt;
use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use tracing::debug;

use crate::errors::{with_causes, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Put,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Put => f.write_str("PUT"),
        }
    }
}

/// Query parameter Particle accepts the access token in.
pub const TOKEN_PARAM: &str = "access_token";

/// A single request to the device cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// Encoded by the client when sent.
    pub query: Vec<(String, String)>,
    pub bearer: Option<String>,
}

impl Request {
    /// GET authorized by an `access_token` query parameter.
    pub fn get_with_token(url: Url, token: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url,
            query: vec![(TOKEN_PARAM.to_string(), token.into())],
            bearer: None,
        }
    }

    pub fn put_authorized(url: Url, token: impl Into<String>) -> Self {
        Self {
            method: Method::Put,
            url,
            query: Vec::new(),
            bearer: Some(token.into()),
        }
    }

    /// The full URL with the `access_token` value masked, safe to log.
    pub fn redacted_url(&self) -> String {
        let mut url = self.url.clone();
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                let value = if key == TOKEN_PARAM { "REDACTED" } else { value.as_str() };
                pairs.append_pair(key, value);
            }
        }
        url.to_string()
    }
}

/// Performs one request and hands back the body of a 200 response.
///
/// Implementations must not retry and must never return a body for any
/// other status.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>>;
}

/// HTTPS transport backed by `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("particle-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Client(with_causes(&e.without_url())))?;

        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    async fn fetch(&self, request: &Request) -> Result<Vec<u8>> {
        let url = request.redacted_url();
        debug!("{} {}", request.method, url);

        let mut builder = match request.method {
            Method::Get => self.client.get(request.url.clone()),
            Method::Put => self.client.put(request.url.clone()),
        };
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();

        if status != StatusCode::OK {
            // Body is only for diagnostics here; a read failure must not mask the status.
            let body = response.text().await.unwrap_or_default();
            debug!("{} {} returned {}: {}", request.method, url, status, body);
            return Err(Error::Http {
                url,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::BodyRead(with_causes(&e.without_url())))?;

        debug!("Response: {}", String::from_utf8_lossy(&body));
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_redact_token() {
        let request = Request::get_with_token(
            url("https://api.particle.io/v1/devices/abc/temp"),
            "secret",
        );
        assert_eq!(
            request.redacted_url(),
            "https://api.particle.io/v1/devices/abc/temp?access_token=REDACTED"
        );
    }

    #[test]
    fn test_redact_keeps_other_params() {
        let mut request = Request::get_with_token(url("http://host/v1/devices/abc/temp"), "s&t");
        request.query.push(("format".to_string(), "raw value".to_string()));
        assert_eq!(
            request.redacted_url(),
            "http://host/v1/devices/abc/temp?access_token=REDACTED&format=raw+value"
        );
    }

    #[test]
    fn test_put_request_carries_bearer() {
        let request = Request::put_authorized(url("http://host/v1/devices/abc/ping"), "secret");
        assert_eq!(request.method, Method::Put);
        assert_eq!(request.bearer.as_deref(), Some("secret"));
        assert_eq!(request.method.to_string(), "PUT");
        assert_eq!(request.redacted_url(), "http://host/v1/devices/abc/ping");
    }

    #[test]
    fn test_client_builds() {
        assert!(HttpTransport::new(Duration::from_secs(5)).is_ok());
    }
}
