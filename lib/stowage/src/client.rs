//! HTTP transport implementation using hyper-util.

use std::future::Future;
use std::io;
use std::pin::{Pin, pin};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use bytes::Bytes;
use futures_util::TryStreamExt;
use futures_util::future::{self, Either};
use futures_util::stream::Stream;
use http_body::Frame;
use http_body_util::{BodyExt, Empty, Full, StreamBody, combinators::UnsyncBoxBody};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use tokio::sync::oneshot;
use tokio::time::Sleep;
use tower::util::BoxCloneService;
use tower::{Layer, ServiceExt};
use tower_service::Service;

use crate::middleware::{LoggingLayer, RequestSigner, SignLayer};
use crate::{
    Body, BodyStream, Error, Request, Response, Result, Transport,
    config::{ClientConfig, ClientConfigBuilder},
    connector::https_connector,
};

// ============================================================================
// Type-Erased Service for Middleware Composition
// ============================================================================

/// Type-erased service for middleware composition.
///
/// This type allows storing and composing arbitrary Tower layers without
/// exposing complex generic types to users.
pub type BoxedService = BoxCloneService<Request, Response<Body>, Error>;

/// Future type for Tower Service implementation.
pub type ServiceFuture = Pin<Box<dyn Future<Output = Result<Response<Body>>> + Send + 'static>>;

/// Request body type handed to hyper.
type HyperBody = UnsyncBoxBody<Bytes, io::Error>;

/// Thread-safe wrapper for `BoxedService`.
///
/// This wrapper uses a Mutex to make the service Sync, which is required
/// by the `Transport` trait.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedService>>,
}

impl SyncService {
    fn new(service: BoxedService) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request) -> ServiceFuture {
        // Lock, clone the service, and release the lock immediately
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.ready().await?.call(request).await })
    }
}

// ============================================================================
// Raw Transport (internal, used for direct hyper access)
// ============================================================================

/// Raw HTTP transport using hyper-util (internal implementation).
#[derive(Clone)]
struct RawTransport {
    inner: Client<HttpsConnector<HttpConnector>, HyperBody>,
    config: ClientConfig,
}

impl RawTransport {
    fn new(config: ClientConfig) -> Self {
        let connector = https_connector(&config);

        let inner = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(config.pool_idle_timeout)
            .pool_max_idle_per_host(config.pool_idle_per_host)
            .http2_only(config.http2_only)
            .build(connector);

        Self { inner, config }
    }

    /// Build a hyper request from a wire request.
    ///
    /// Streaming bodies come back with a receiver that resolves once hyper is
    /// done with the body.
    fn build_hyper_request(
        &self,
        request: Request,
    ) -> Result<(http::Request<HyperBody>, Option<oneshot::Receiver<()>>)> {
        let (method, url, headers, body) = request.into_parts();

        let (body, body_sent) = match body {
            Body::Empty => (
                Empty::<Bytes>::new()
                    .map_err(|never| match never {})
                    .boxed_unsync(),
                None,
            ),
            Body::Full(bytes) => (
                Full::new(bytes).map_err(|never| match never {}).boxed_unsync(),
                None,
            ),
            Body::Stream(stream, _) => {
                let (watch, body_sent) = UploadWatch::new(stream, self.config.upload_stall_timeout);
                (
                    StreamBody::new(watch.map_ok(Frame::data)).boxed_unsync(),
                    Some(body_sent),
                )
            }
        };

        let mut http_request = http::Request::builder()
            .method(method)
            .uri(url.as_str())
            .body(body)
            .map_err(|e| Error::configuration(e.to_string()))?;
        *http_request.headers_mut() = headers;

        Ok((http_request, body_sent))
    }

    async fn execute(&self, request: Request) -> Result<Response<Body>> {
        let (hyper_request, body_sent) = self.build_hyper_request(request)?;
        let mut pending = pin!(self.inner.request(hyper_request));

        // The response timeout only starts once a streaming body is sent.
        if let Some(body_sent) = body_sent
            && let Either::Left((result, _)) = future::select(pending.as_mut(), body_sent).await
        {
            return Self::into_response(result);
        }

        let result = tokio::time::timeout(self.config.response_timeout, pending)
            .await
            .map_err(|_| Error::Timeout)?;
        Self::into_response(result)
    }

    fn into_response<B>(
        result: std::result::Result<http::Response<B>, hyper_util::client::legacy::Error>,
    ) -> Result<Response<Body>>
    where
        B: http_body::Body<Data = Bytes> + Send + 'static,
        B::Error: std::error::Error + Send + Sync + 'static,
    {
        let (parts, incoming) = result.map_err(Self::map_hyper_error)?.into_parts();
        let len = http_body::Body::size_hint(&incoming).exact();
        let stream = incoming.into_data_stream().map_err(io::Error::other);

        Ok(Response::new(parts.status, parts.headers, Body::stream(stream, len)))
    }

    #[allow(clippy::needless_pass_by_value)]
    fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
        let msg = error_chain(&err);

        if err.is_connect() {
            return Error::connection(msg);
        }

        if has_timed_out(&err) {
            return Error::Timeout;
        }

        if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
            return Error::tls(msg);
        }

        Error::connection(msg)
    }
}

/// Whether an I/O timeout sits in the source chain of `err`.
fn has_timed_out(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut source = Some(err);
    while let Some(cause) = source {
        if cause
            .downcast_ref::<io::Error>()
            .is_some_and(|e| e.kind() == io::ErrorKind::TimedOut)
        {
            return true;
        }
        source = cause.source();
    }
    false
}

/// Render an error with its sources, `outer: inner: root`.
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Streaming request body that reports when hyper is done with it and fails
/// when its source stalls.
struct UploadWatch {
    inner: BodyStream,
    stall_timeout: Duration,
    stall: Option<Pin<Box<Sleep>>>,
    sent: Option<oneshot::Sender<()>>,
}

impl UploadWatch {
    fn new(inner: BodyStream, stall_timeout: Duration) -> (Self, oneshot::Receiver<()>) {
        let (sent, body_sent) = oneshot::channel();
        let watch = Self {
            inner,
            stall_timeout,
            stall: None,
            sent: Some(sent),
        };
        (watch, body_sent)
    }
}

impl Stream for UploadWatch {
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        if let Poll::Ready(item) = this.inner.as_mut().poll_next(cx) {
            this.stall = None;
            if !matches!(item, Some(Ok(_))) {
                this.sent.take();
            }
            return Poll::Ready(item);
        }

        let stall_timeout = this.stall_timeout;
        let stall = this
            .stall
            .get_or_insert_with(|| Box::pin(tokio::time::sleep(stall_timeout)));
        ready!(stall.as_mut().poll(cx));

        this.stall = None;
        this.sent.take();
        tracing::warn!(?stall_timeout, "upload source stalled");
        Poll::Ready(Some(Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("upload source produced no data for {stall_timeout:?}"),
        ))))
    }
}

impl Service<Request> for RawTransport {
    type Response = Response<Body>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

// ============================================================================
// Public Transport
// ============================================================================

/// HTTP transport using hyper-util with connection pooling, TLS, and middleware support.
///
/// # Example
///
/// ```ignore
/// use stowage::HyperTransport;
/// use std::time::Duration;
///
/// // Simple transport without middleware
/// let transport = HyperTransport::new();
///
/// // Transport with middleware
/// let transport = HyperTransport::builder()
///     .response_timeout(Duration::from_secs(30))
///     .with_signer(my_signer)
///     .with_logging()
///     .build();
/// ```
#[derive(Clone)]
pub struct HyperTransport {
    service: SyncService,
    config: ClientConfig,
}

impl std::fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransport")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HyperTransport {
    /// Create a new transport with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    /// Create a new transport with custom configuration (no middleware).
    #[must_use]
    pub fn with_config(config: ClientConfig) -> Self {
        let raw = RawTransport::new(config.clone());
        Self {
            service: SyncService::new(BoxCloneService::new(raw)),
            config,
        }
    }

    /// Create a transport with a pre-configured service (used by builder).
    fn with_service(service: BoxedService, config: ClientConfig) -> Self {
        Self {
            service: SyncService::new(service),
            config,
        }
    }

    /// Create a new transport builder.
    #[must_use]
    pub fn builder() -> HyperTransportBuilder {
        HyperTransportBuilder::default()
    }

    /// Get the transport configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for HyperTransport {
    async fn execute(&self, request: Request) -> Result<Response<Body>> {
        self.service.call(request).await
    }
}

// ============================================================================
// Tower Service Implementation
// ============================================================================

impl Service<Request> for HyperTransport {
    type Response = Response<Body>;
    type Error = Error;
    type Future = ServiceFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // SyncService is always ready (the underlying service is polled when called)
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`HyperTransport`].
///
/// # Example
///
/// ```ignore
/// use stowage::HyperTransport;
/// use stowage::middleware::LoggingLayer;
///
/// let transport = HyperTransport::builder()
///     .layer(LoggingLayer::debug())
///     .build();
/// ```
#[derive(Default)]
pub struct HyperTransportBuilder {
    config: ClientConfigBuilder,
    layers: Vec<Arc<dyn Fn(BoxedService) -> BoxedService + Send + Sync>>,
    use_defaults: bool,
}

impl std::fmt::Debug for HyperTransportBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperTransportBuilder")
            .field("config", &self.config)
            .field("layers_count", &self.layers.len())
            .field("use_defaults", &self.use_defaults)
            .finish()
    }
}

impl HyperTransportBuilder {
    // ========================================================================
    // Core Configuration
    // ========================================================================

    /// Set the time allowed for the response headers once the request body is sent.
    #[must_use]
    pub fn response_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.response_timeout(timeout);
        self
    }

    /// Set the longest pause of a streaming upload source.
    #[must_use]
    pub fn upload_stall_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.upload_stall_timeout(timeout);
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.connect_timeout(timeout);
        self
    }

    /// Set the maximum idle connections per host.
    #[must_use]
    pub fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.config = self.config.pool_idle_per_host(count);
        self
    }

    /// Set the idle connection timeout.
    #[must_use]
    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.pool_idle_timeout(timeout);
        self
    }

    /// Restrict the transport to HTTP/2.
    #[must_use]
    pub fn http2_only(mut self, enabled: bool) -> Self {
        self.config = self.config.http2_only(enabled);
        self
    }

    /// Replace the whole configuration.
    #[must_use]
    pub fn config(mut self, config: &ClientConfig) -> Self {
        self.config = config.clone().into_builder();
        self
    }

    // ========================================================================
    // Generic Middleware API
    // ========================================================================

    /// Add a Tower layer to the transport.
    ///
    /// Layers are applied in order: first added = innermost, last added =
    /// outermost (processes requests first).
    #[must_use]
    pub fn layer<L>(mut self, layer: L) -> Self
    where
        L: Layer<BoxedService> + Send + Sync + 'static,
        L::Service: Service<Request, Response = Response<Body>, Error = Error>
            + Clone
            + Send
            + 'static,
        <L::Service as Service<Request>>::Future: Send,
    {
        self.layers.push(Arc::new(move |service| {
            BoxCloneService::new(layer.layer(service))
        }));
        self
    }

    /// Enable the default middleware (summary logging).
    ///
    /// Defaults are applied before any layers added via `.layer()`.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.use_defaults = true;
        self
    }

    /// Disable all default middleware.
    #[must_use]
    pub fn without_defaults(mut self) -> Self {
        self.use_defaults = false;
        self
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    /// Sign every request with `signer`.
    #[must_use]
    pub fn with_signer(self, signer: impl RequestSigner + 'static) -> Self {
        self.layer(SignLayer::new(signer))
    }

    /// Add request/response logging.
    #[must_use]
    pub fn with_logging(self) -> Self {
        self.layer(LoggingLayer::new())
    }

    /// Add debug-level logging (includes headers and more detail).
    #[must_use]
    pub fn with_debug_logging(self) -> Self {
        self.layer(LoggingLayer::debug())
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Build the transport with all configured middleware.
    #[must_use]
    pub fn build(self) -> HyperTransport {
        let config = self.config.build();

        let mut service: BoxedService = BoxCloneService::new(RawTransport::new(config.clone()));

        if self.use_defaults {
            service = BoxCloneService::new(LoggingLayer::new().layer(service));
        }

        for layer_fn in self.layers {
            service = layer_fn(service);
        }

        HyperTransport::with_service(service, config)
    }
}
