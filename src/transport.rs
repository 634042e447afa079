//! HTTP transport for shipping batches to the bulk-ingest endpoint

use crate::buffer::Batch;
use crate::errors::{Error, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use std::time::Duration;
use tracing::debug;

/// Bulk-ingest URL template; `{token}` is substituted at construction.
pub const ENDPOINT_TEMPLATE: &str = "https://logs-01.loggly.com/bulk/{token}";

/// Request header carrying the comma-joined tag list.
pub const TAG_HEADER: &str = "X-Loggly-Tag";

const CLIENT_USER_AGENT: &str =
    concat!("rust-loggly (version: ", env!("CARGO_PKG_VERSION"), ")");

/// Derive the bulk endpoint for a token.
pub fn endpoint_for_token(token: &str) -> String {
    ENDPOINT_TEMPLATE.replacen("{token}", token, 1)
}

/// Outcome of a delivery attempt that reached the endpoint.
///
/// Non-success statuses are data, not errors: the batch has been handed to
/// the endpoint and will not be retried.
#[derive(Clone, Debug)]
pub struct Delivery {
    pub status: StatusCode,
    /// Diagnostic response body, read only for non-success statuses
    pub body: String,
}

impl Delivery {
    /// Application-level rejection (status >= 400).
    pub fn is_rejection(&self) -> bool {
        self.status.as_u16() >= 400
    }
}

/// The black-box "send bytes, get status" collaborator.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Transmit one batch. `Err` means the request never completed
    /// (connection failure, timeout); status codes come back as `Delivery`.
    async fn send(&self, batch: &Batch) -> Result<Delivery>;
}

/// Transport over reqwest, POSTing newline-joined batches as plain text.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Http)?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, batch: &Batch) -> Result<Delivery> {
        debug!(
            records = batch.records,
            bytes = batch.body.len(),
            endpoint = %self.endpoint,
            "posting batch"
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .header(CONTENT_TYPE, "text/plain")
            .body(batch.body.clone());

        if let Some(tags) = &batch.tags {
            request = request.header(TAG_HEADER, tags.clone());
        }

        let response = request.send().await.map_err(Error::Http)?;
        let status = response.status();

        let body = if status.is_success() {
            String::new()
        } else {
            response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string())
        };

        debug!(status = %status, "endpoint response");

        Ok(Delivery { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header, headers, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn batch(body: &[u8], records: usize, tags: Option<&str>) -> Batch {
        Batch {
            body: body.to_vec(),
            records,
            tags: tags.map(str::to_string),
        }
    }

    #[test]
    fn test_endpoint_for_token() {
        assert_eq!(
            endpoint_for_token("abc-123"),
            "https://logs-01.loggly.com/bulk/abc-123"
        );
    }

    #[tokio::test]
    async fn test_send_posts_body_and_headers() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/bulk/tok"))
            .and(header("Content-Type", "text/plain"))
            .and(header(
                "User-Agent",
                concat!("rust-loggly (version: ", env!("CARGO_PKG_VERSION"), ")"),
            ))
            .and(headers(TAG_HEADER, vec!["a", "b"]))
            .and(body_bytes(b"one\ntwo".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            format!("{}/bulk/tok", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        let delivery = transport
            .send(&batch(b"one\ntwo", 2, Some("a,b")))
            .await
            .unwrap();

        assert_eq!(delivery.status, StatusCode::OK);
        assert!(!delivery.is_rejection());
        assert!(delivery.body.is_empty());
    }

    #[tokio::test]
    async fn test_send_omits_tag_header_without_tags() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(
            format!("{}/bulk/tok", server.uri()),
            Duration::from_secs(5),
        )
        .unwrap();

        transport.send(&batch(b"one", 1, None)).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(!requests[0].headers.contains_key(TAG_HEADER));
    }

    #[tokio::test]
    async fn test_error_status_is_delivery_not_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("ingest overloaded"))
            .mount(&server)
            .await;

        let transport =
            HttpTransport::new(server.uri(), Duration::from_secs(5)).unwrap();

        let delivery = transport.send(&batch(b"one", 1, None)).await.unwrap();
        assert!(delivery.is_rejection());
        assert_eq!(delivery.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(delivery.body, "ingest overloaded");
    }

    #[tokio::test]
    async fn test_connection_failure_is_error() {
        // Nothing listens on port 1
        let transport = HttpTransport::new(
            "http://127.0.0.1:1/bulk/tok".to_string(),
            Duration::from_secs(1),
        )
        .unwrap();

        let err = transport.send(&batch(b"one", 1, None)).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
