use crate::dispatcher::Dispatcher;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::{Callback, Method, Outcome, RequestError, Task};
use anyhow::Result;
use derive_builder::Builder;
use headers::HeaderMap;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use url::Url;

const DEFAULT_MAX_CONCURRENT: usize = 6;
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(30_000);
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(20_000);

/// The convenience surface over [`Dispatcher`]: per-method calls with
/// defaulted headers, query parameters, and body, plus the
/// runtime-tunable service configuration.
pub struct Service {
    dispatcher: Dispatcher,
    timeouts: Mutex<Timeouts>,
}

#[derive(Debug, Clone, Copy)]
struct Timeouts {
    connect: Duration,
    read: Duration,
}

/// A dispatcher bundled with its configuration. Built via
/// `ServiceBuilder::default()`; unset fields fall back to the service
/// defaults (6 concurrent calls, 30s connect / 20s read timeout,
/// debug logging on, reqwest transport).
#[derive(Builder, Debug)]
#[builder(build_fn(skip))]
#[builder(setter(into))]
#[builder(name = "ServiceBuilder")]
pub struct ServiceBuilderInternal {
    max_concurrent: usize,
    connect_timeout: Duration,
    read_timeout: Duration,
    debug_logging: bool,
    transport: Option<Arc<dyn Transport>>,
}

impl ServiceBuilder {
    pub fn build(&mut self) -> Result<Service> {
        let max_concurrent = self.max_concurrent.unwrap_or(DEFAULT_MAX_CONCURRENT);
        let connect = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let read = self.read_timeout.unwrap_or(DEFAULT_READ_TIMEOUT);
        let debug_logging = self.debug_logging.unwrap_or(true);

        let transport = match self.transport.clone().unwrap_or(None) {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(connect)?),
        };

        Ok(Service {
            dispatcher: Dispatcher::new(transport, max_concurrent, debug_logging),
            timeouts: Mutex::new(Timeouts { connect, read }),
        })
    }
}

impl Service {
    /// HTTP GET without headers or query parameters.
    pub fn get<C>(&self, url: &str, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(
            Method::Get,
            url,
            HeaderMap::new(),
            &HashMap::new(),
            Vec::new(),
            callback,
        )
    }

    /// HTTP GET with headers and query parameters.
    pub fn get_with<C>(
        &self,
        url: &str,
        headers: HeaderMap,
        parameters: &HashMap<String, String>,
        callback: C,
    ) where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(Method::Get, url, headers, parameters, Vec::new(), callback)
    }

    /// HTTP POST carrying `body`.
    pub fn post<C>(&self, url: &str, body: impl Into<Vec<u8>>, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(
            Method::Post,
            url,
            HeaderMap::new(),
            &HashMap::new(),
            body.into(),
            callback,
        )
    }

    /// HTTP POST with headers, query parameters and body.
    pub fn post_with<C>(
        &self,
        url: &str,
        headers: HeaderMap,
        parameters: &HashMap<String, String>,
        body: impl Into<Vec<u8>>,
        callback: C,
    ) where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(Method::Post, url, headers, parameters, body.into(), callback)
    }

    /// HTTP PUT carrying `body`.
    pub fn put<C>(&self, url: &str, body: impl Into<Vec<u8>>, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(
            Method::Put,
            url,
            HeaderMap::new(),
            &HashMap::new(),
            body.into(),
            callback,
        )
    }

    /// HTTP PUT with headers, query parameters and body.
    pub fn put_with<C>(
        &self,
        url: &str,
        headers: HeaderMap,
        parameters: &HashMap<String, String>,
        body: impl Into<Vec<u8>>,
        callback: C,
    ) where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(Method::Put, url, headers, parameters, body.into(), callback)
    }

    /// HTTP DELETE without headers or query parameters.
    pub fn delete<C>(&self, url: &str, callback: C)
    where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(
            Method::Delete,
            url,
            HeaderMap::new(),
            &HashMap::new(),
            Vec::new(),
            callback,
        )
    }

    /// HTTP DELETE with headers and query parameters.
    pub fn delete_with<C>(
        &self,
        url: &str,
        headers: HeaderMap,
        parameters: &HashMap<String, String>,
        callback: C,
    ) where
        C: FnOnce(Outcome) + Send + 'static,
    {
        self.request(Method::Delete, url, headers, parameters, Vec::new(), callback)
    }

    /// The canonical submit path every convenience method funnels
    /// into.
    ///
    /// Never returns an error: a URL that does not parse is reported
    /// through the callback like any other transport-level failure, so
    /// each submission still ends in exactly one callback.
    pub fn request<C>(
        &self,
        method: Method,
        url: &str,
        headers: HeaderMap,
        parameters: &HashMap<String, String>,
        body: Vec<u8>,
        callback: C,
    ) where
        C: FnOnce(Outcome) + Send + 'static,
    {
        let callback: Callback = Box::new(callback);
        let url = match Url::parse(url) {
            Ok(url) => url,
            Err(e) => {
                callback(Err(RequestError::Transport(e.into())));
                return;
            }
        };
        let timeouts = *self.timeouts();
        self.dispatcher.submit(Task::new(
            method,
            url,
            headers,
            parameters,
            body,
            timeouts.connect,
            timeouts.read,
            callback,
        ));
    }

    /// Cancels every queued and in-flight request.
    pub fn clear_all(&self) {
        self.dispatcher.clear_all()
    }

    /// Cancels every queued request that has not started yet.
    pub fn clear_backlog(&self) {
        self.dispatcher.clear_backlog()
    }

    /// Cancels every currently executing request.
    pub fn clear_in_flight(&self) {
        self.dispatcher.clear_in_flight()
    }

    pub fn active_count(&self) -> usize {
        self.dispatcher.active_count()
    }

    pub fn max_concurrent(&self) -> usize {
        self.dispatcher.max_concurrent()
    }

    pub fn set_max_concurrent(&self, max_concurrent: usize) {
        self.dispatcher.set_max_concurrent(max_concurrent)
    }

    pub fn set_debug_logging(&self, enabled: bool) {
        self.dispatcher.set_debug_logging(enabled)
    }

    /// Forwarded opaquely inside every future exchange; honoring it is
    /// the transport's job. The default transport fixes its connect
    /// timeout when it is built.
    pub fn set_connect_timeout(&self, timeout: Duration) {
        self.timeouts().connect = timeout;
    }

    /// Forwarded opaquely inside every future exchange; the default
    /// transport applies it per request.
    pub fn set_read_timeout(&self, timeout: Duration) {
        self.timeouts().read = timeout;
    }

    pub fn connect_timeout(&self) -> Duration {
        self.timeouts().connect
    }

    pub fn read_timeout(&self) -> Duration {
        self.timeouts().read
    }

    fn timeouts(&self) -> MutexGuard<Timeouts> {
        self.timeouts.lock().unwrap_or_else(|e| e.into_inner())
    }
}
