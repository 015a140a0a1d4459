use crate::{transport::Exchange, uri};
use anyhow::anyhow;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use url::Url;

/// Identity of a submitted task, used for in-flight bookkeeping and
/// cancellation.
pub type TaskId = u64;

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// What a task's callback receives: the response body on a plain 200,
/// a [`RequestError`] for everything else.
pub type Outcome = Result<Vec<u8>, RequestError>;

/// One-shot completion callback bound to every task. Being `FnOnce`,
/// it cannot fire twice; the dispatcher guarantees it fires once.
pub type Callback = Box<dyn FnOnce(Outcome) + Send + 'static>;

/// The HTTP methods the dispatcher submits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub(crate) fn as_http(self) -> http::Method {
        match self {
            Method::Get => http::Method::GET,
            Method::Post => http::Method::POST,
            Method::Put => http::Method::PUT,
            Method::Delete => http::Method::DELETE,
        }
    }
}

impl TryFrom<&str> for Method {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_ref() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            _ => Err(anyhow!(
                "Only `get`, `post`, `put` and `delete` allowed, got {}",
                value
            )),
        }
    }
}

impl Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_http())
    }
}

/// A single queued or executing request, bound to its callback.
///
/// The query parameters are resolved into the URL here, at creation
/// time, so the exchange handed to the transport is final.
pub struct Task {
    pub(crate) id: TaskId,
    pub(crate) exchange: Exchange,
    pub(crate) callback: Callback,
}

impl Task {
    pub fn new(
        method: Method,
        url: Url,
        headers: headers::HeaderMap,
        parameters: &HashMap<String, String>,
        body: Vec<u8>,
        connect_timeout: Duration,
        read_timeout: Duration,
        callback: Callback,
    ) -> Self {
        let mut url = url;
        uri::append_query(&mut url, parameters);
        Task {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            exchange: Exchange {
                method: method.as_http(),
                url,
                headers,
                body,
                connect_timeout,
                read_timeout,
            },
            callback,
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn url(&self) -> &Url {
        &self.exchange.url
    }
}

impl Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} (task {})",
            self.exchange.method, self.exchange.url, self.id
        )
    }
}

/// Terminal failure delivered through a task's callback. None of these
/// are retried; each task gets exactly one of them or a success.
#[derive(Debug)]
pub enum RequestError {
    /// Connection, DNS, I/O, or timeout failure below the HTTP layer
    Transport(anyhow::Error),
    /// The call completed, but with a status other than 200
    HttpStatus {
        code: http::StatusCode,
        reason: String,
    },
    /// The task was still queued when the backlog was cleared
    CancelledBeforeExecution,
    /// The task was executing when in-flight requests were cleared
    CancelledMidExecution,
}

impl Display for RequestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RequestError::Transport(e) => write!(f, "transport failure: {}", e),
            RequestError::HttpStatus { code, reason } => {
                write!(f, "bad response: {} - {}", code.as_u16(), reason)
            }
            RequestError::CancelledBeforeExecution => {
                write!(f, "cancelled request before execution")
            }
            RequestError::CancelledMidExecution => write!(f, "cancelled request mid execution"),
        }
    }
}

impl std::error::Error for RequestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RequestError::Transport(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_method_from_str() {
        assert!(matches!(Method::try_from("get"), Ok(Method::Get)));
        assert!(matches!(Method::try_from("POST"), Ok(Method::Post)));
        assert!(matches!(Method::try_from("Put"), Ok(Method::Put)));
        assert!(matches!(Method::try_from("delete"), Ok(Method::Delete)));
        assert!(matches!(Method::try_from("head"), Err(_)));
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            RequestError::HttpStatus {
                code: http::StatusCode::NOT_FOUND,
                reason: "Not Found".to_string(),
            }
            .to_string(),
            "bad response: 404 - Not Found"
        );
        assert_eq!(
            RequestError::CancelledBeforeExecution.to_string(),
            "cancelled request before execution"
        );
        assert_eq!(
            RequestError::CancelledMidExecution.to_string(),
            "cancelled request mid execution"
        );
    }

    #[test]
    fn test_task_resolves_query_at_creation() {
        let mut parameters = HashMap::new();
        parameters.insert("q".to_string(), "x".to_string());
        let task = Task::new(
            Method::Get,
            Url::parse("http://example.com").unwrap(),
            headers::HeaderMap::new(),
            &parameters,
            Vec::new(),
            Duration::from_secs(30),
            Duration::from_secs(20),
            Box::new(|_| {}),
        );
        assert_eq!(task.url().query(), Some("q=x"));
    }

    #[test]
    fn test_task_ids_are_unique() {
        let build = || {
            Task::new(
                Method::Get,
                Url::parse("http://example.com").unwrap(),
                headers::HeaderMap::new(),
                &HashMap::new(),
                Vec::new(),
                Duration::from_secs(30),
                Duration::from_secs(20),
                Box::new(|_| {}),
            )
        };
        assert_ne!(build().id(), build().id());
    }
}
