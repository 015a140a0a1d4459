use anyhow::Result;
use futures::future::BoxFuture;
use headers::HeaderMap;
use http::StatusCode;
use std::time::Duration;
use url::Url;

/// A fully resolved call handed to the transport. The query string is
/// already merged into `url` and the timeouts are whatever the service
/// was configured with at submission time; the transport is expected
/// to honor them.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub method: http::Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
}

/// What the transport yields when the call itself went through,
/// whatever the status code.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// The seam to the actual network layer.
///
/// The dispatcher only needs "perform this exchange, eventually yield
/// a response or an error". Cancelling an in-flight exchange happens
/// by dropping the returned future.
pub trait Transport: std::fmt::Debug + Send + Sync + 'static {
    fn execute(&self, exchange: Exchange) -> BoxFuture<'static, Result<RawResponse>>;
}

/// The default transport, backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// The connect timeout is a client-level setting in reqwest, so it
    /// is fixed when the transport is built. The read timeout is
    /// applied per request from the exchange.
    pub fn new(connect_timeout: Duration) -> Result<Self> {
        let client = reqwest::ClientBuilder::new()
            .gzip(true)
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(ReqwestTransport { client })
    }
}

impl Transport for ReqwestTransport {
    fn execute(&self, exchange: Exchange) -> BoxFuture<'static, Result<RawResponse>> {
        let client = self.client.clone();
        Box::pin(async move {
            let mut request = client
                .request(exchange.method, exchange.url.as_str())
                .headers(exchange.headers)
                .timeout(exchange.read_timeout);
            if !exchange.body.is_empty() {
                request = request.body(exchange.body);
            }
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?.to_vec();
            Ok(RawResponse { status, body })
        })
    }
}
