//! Request logging middleware.
//!
//! Every call runs inside a `cos_request` span carrying the bucket host, the
//! object path, the kind and size of the request body and whether image
//! processing rules ride along. The `x-cos-request-id` of the answer is
//! recorded on the span, so events logged further down can be matched with
//! the service logs. Bodies are never read.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::HeaderMap;
use tower::{Layer, Service};
use tracing::{Instrument, Span, debug, field, info, info_span, warn};

use crate::{Body, Error, Request, Response, Result};

/// Headers whose values never reach the logs.
const REDACTED_HEADERS: [&str; 2] = ["authorization", "x-cos-security-token"];

const PIC_OPERATIONS_HEADER: &str = "pic-operations";

/// Layer that wraps a service in [`Logging`].
///
/// # Example
///
/// ```ignore
/// use stowage::middleware::LoggingLayer;
/// use tower::ServiceBuilder;
///
/// let service = ServiceBuilder::new()
///     .layer(LoggingLayer::debug())
///     .service(transport);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingLayer {
    level: LogLevel,
}

/// Detail of the request events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    /// Also log the request headers, secrets redacted.
    Debug,
    /// Summary only.
    #[default]
    Info,
}

impl LoggingLayer {
    /// Summary logging.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Logging with request headers.
    #[must_use]
    pub fn debug() -> Self {
        Self {
            level: LogLevel::Debug,
        }
    }

    /// Level used by services built from this layer.
    #[must_use]
    pub const fn level(&self) -> LogLevel {
        self.level
    }
}

impl<S> Layer<S> for LoggingLayer {
    type Service = Logging<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Logging {
            inner,
            level: self.level,
        }
    }
}

/// Service that logs each call and its outcome.
#[derive(Debug, Clone)]
pub struct Logging<S> {
    inner: S,
    level: LogLevel,
}

/// Request body as seen by the logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Payload {
    None,
    Buffered,
    Streaming,
}

impl Payload {
    const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Buffered => "buffered",
            Self::Streaming => "streaming",
        }
    }
}

/// What gets logged about a request, taken before it is handed over.
#[derive(Debug)]
struct RequestFacts {
    host: String,
    path: String,
    payload: Payload,
    length: Option<u64>,
    pic_operations: bool,
}

impl RequestFacts {
    fn of(request: &Request) -> Self {
        let url = request.url();
        let payload = match request.body() {
            Body::Empty => Payload::None,
            Body::Full(_) => Payload::Buffered,
            Body::Stream(..) => Payload::Streaming,
        };
        Self {
            host: url.host_str().unwrap_or_default().to_string(),
            path: url.path().to_string(),
            payload,
            length: request.body().len(),
            pic_operations: request.headers().contains_key(PIC_OPERATIONS_HEADER),
        }
    }
}

/// Header names and values, with secrets masked.
fn redacted(headers: &HeaderMap) -> Vec<(&str, &str)> {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if REDACTED_HEADERS.contains(&name.as_str()) {
                "<redacted>"
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            (name.as_str(), value)
        })
        .collect()
}

impl<S> Service<Request> for Logging<S>
where
    S: Service<Request, Response = Response<Body>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let facts = RequestFacts::of(&request);
        let span = info_span!(
            "cos_request",
            method = %request.method(),
            host = %facts.host,
            path = %facts.path,
            request_id = field::Empty,
        );

        if self.level == LogLevel::Debug {
            span.in_scope(|| debug!(headers = ?redacted(request.headers()), "request headers"));
        }

        // Take the service that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(
            async move {
                info!(
                    payload = facts.payload.as_str(),
                    length = ?facts.length,
                    pic_operations = facts.pic_operations,
                    "sending request"
                );
                let start = Instant::now();

                let result = inner.call(request).await;
                let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

                match &result {
                    Ok(response) => {
                        let request_id = response.request_id().unwrap_or_default();
                        Span::current().record("request_id", request_id);

                        let status = response.status().as_u16();
                        if response.is_success() {
                            let length = response.content_length();
                            info!(status, elapsed_ms, length = ?length, "response received");
                        } else {
                            warn!(
                                status,
                                elapsed_ms,
                                trace_id = response.trace_id().unwrap_or_default(),
                                "service answered with an error status"
                            );
                        }
                    }
                    Err(err) if facts.payload == Payload::Streaming => {
                        warn!(error = %err, kind = %err.kind(), elapsed_ms, "upload failed");
                    }
                    Err(err) => {
                        warn!(error = %err, kind = %err.kind(), elapsed_ms, "request failed");
                    }
                }

                result
            }
            .instrument(span),
        )
    }
}
