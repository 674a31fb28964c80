//! Request dispatcher.
//!
//! [`Dispatcher`] turns a [`RequestSpec`] into a wire request, submits it
//! through a [`Transport`] and classifies the outcome:
//! - transport failures are returned unchanged,
//! - 2xx responses are decoded into the caller's result type,
//! - other responses go through the [`ErrorDecoder`].
//!
//! Streaming uploads are sized with [`resolve_content_length`] and wrapped in a
//! [`TransferTee`] for progress reporting and CRC64 verification.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{CONTENT_LENGTH, CONTENT_TYPE, USER_AGENT};
use http::{HeaderMap, HeaderName, HeaderValue};

use crate::body::{ContentKind, Decodable};
use crate::entity::Body;
use crate::error::{ErrorDecoder, ServiceErrorDecoder};
use crate::length::{ContentLength, resolve_content_length};
use crate::options::ParamMap;
use crate::progress::ProgressListener;
use crate::request::{Payload, Request, RequestSpec};
use crate::response::Response;
use crate::transfer::{ChecksumCheck, TransferReceipt, TransferTee};
use crate::transport::Transport;
use crate::{Error, Result};

/// Response header carrying the CRC64-ECMA of the stored object.
pub const CRC64_HEADER: &str = "x-cos-hash-crc64ecma";

/// Largest body accepted by a single upload call (5 GiB).
pub const MAX_SINGLE_UPLOAD: u64 = 5 * 1024 * 1024 * 1024;

/// Default `User-Agent` header.
pub const DEFAULT_USER_AGENT: &str = concat!("stowage/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Configuration
// ============================================================================

/// Configuration of the [`Dispatcher`].
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Checksum streaming uploads and verify them against `x-cos-hash-crc64ecma`.
    pub enable_crc: bool,
    /// Chunk size used to read upload sources.
    pub chunk_size: usize,
    /// Largest body accepted by a single upload.
    pub max_single_upload: u64,
    /// `User-Agent` sent when the call sets none.
    pub user_agent: String,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            enable_crc: true,
            chunk_size: 64 * 1024,
            max_single_upload: MAX_SINGLE_UPLOAD,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl DispatchConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> DispatchConfigBuilder {
        DispatchConfigBuilder::default()
    }
}

/// Builder for [`DispatchConfig`].
#[derive(Debug, Clone, Default)]
pub struct DispatchConfigBuilder {
    enable_crc: Option<bool>,
    chunk_size: Option<usize>,
    max_single_upload: Option<u64>,
    user_agent: Option<String>,
}

impl DispatchConfigBuilder {
    /// Enable or disable upload checksums.
    #[must_use]
    pub const fn enable_crc(mut self, enabled: bool) -> Self {
        self.enable_crc = Some(enabled);
        self
    }

    /// Set the upload chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    /// Set the largest body accepted by a single upload.
    #[must_use]
    pub const fn max_single_upload(mut self, size: u64) -> Self {
        self.max_single_upload = Some(size);
        self
    }

    /// Set the default `User-Agent`.
    #[must_use]
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> DispatchConfig {
        let defaults = DispatchConfig::default();
        DispatchConfig {
            enable_crc: self.enable_crc.unwrap_or(defaults.enable_crc),
            chunk_size: self.chunk_size.unwrap_or(defaults.chunk_size).max(1),
            max_single_upload: self
                .max_single_upload
                .unwrap_or(defaults.max_single_upload),
            user_agent: self.user_agent.unwrap_or(defaults.user_agent),
        }
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

struct Prepared {
    request: Request,
    upload: Option<TransferReceipt>,
    disable_auto_close: bool,
    listener: Option<Arc<dyn ProgressListener>>,
}

/// Executes [`RequestSpec`]s through a [`Transport`].
#[derive(Debug, Clone)]
pub struct Dispatcher<T, D = ServiceErrorDecoder> {
    transport: T,
    decoder: D,
    config: DispatchConfig,
}

impl<T: Transport> Dispatcher<T> {
    /// Creates a dispatcher with the default error decoder and configuration.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            decoder: ServiceErrorDecoder,
            config: DispatchConfig::default(),
        }
    }
}

impl<T, D> Dispatcher<T, D>
where
    T: Transport,
    D: ErrorDecoder,
{
    /// Replace the error decoder.
    #[must_use]
    pub fn with_decoder<D2: ErrorDecoder>(self, decoder: D2) -> Dispatcher<T, D2> {
        Dispatcher {
            transport: self.transport,
            decoder,
            config: self.config,
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.config = config;
        self
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Underlying transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute a call and return its successful response.
    ///
    /// The body is buffered, unless the call asked for it to be handed over
    /// unread (`disable_auto_close`), in which case the live stream is returned,
    /// wrapped for progress reporting when a listener is attached.
    ///
    /// # Errors
    ///
    /// - configuration errors before any I/O,
    /// - transport errors unchanged,
    /// - [`Error::Service`] or [`Error::Decode`] for non-2xx responses,
    /// - [`Error::ChecksumMismatch`] if an upload checksum disagrees.
    pub async fn dispatch(&self, spec: RequestSpec) -> Result<Response<Body>> {
        let Prepared {
            request,
            upload,
            disable_auto_close,
            listener,
        } = self.prepare(spec).await?;

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(%method, %url, "dispatching request");

        let response = self.transport.execute(request).await?;
        let status = response.status();
        tracing::debug!(%method, %url, status = status.as_u16(), "response received");

        if !status.is_success() {
            let response = response.collect().await?;
            return Err(self.decode_error(response));
        }

        if let Some(receipt) = &upload {
            self.verify_checksum(receipt, response.headers())?;
        }

        let response = if disable_auto_close {
            wrap_download(response, listener)
        } else {
            response.collect().await?.map_body(Body::from)
        };

        Ok(match upload {
            Some(receipt) if response.transfer().is_none() => response.with_transfer(receipt),
            _ => response,
        })
    }

    /// Execute a call and decode its body into `R`.
    ///
    /// An empty body decodes to `R::default()`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dispatch`], plus [`Error::Decode`] if the body does not
    /// match `R`.
    pub async fn send<R: Decodable>(&self, spec: RequestSpec) -> Result<Response<R>> {
        self.dispatch(spec).await?.collect().await?.decode()
    }

    /// Execute a call and discard its body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dispatch`].
    pub async fn send_discard(&self, spec: RequestSpec) -> Result<Response<()>> {
        Ok(self.dispatch(spec).await?.map_body(drop))
    }

    /// Execute a call and hand its body to the caller unread.
    ///
    /// # Errors
    ///
    /// Same as [`Self::dispatch`].
    pub async fn send_streaming(&self, mut spec: RequestSpec) -> Result<Response<Body>> {
        spec.set_disable_auto_close(true);
        self.dispatch(spec).await
    }

    async fn prepare(&self, mut spec: RequestSpec) -> Result<Prepared> {
        let url = spec.url()?;
        let mut headers = header_map(spec.headers())?;

        if !headers.contains_key(USER_AGENT) {
            let user_agent = HeaderValue::from_str(&self.config.user_agent).map_err(|_| {
                Error::configuration(format!("invalid user agent: {:?}", self.config.user_agent))
            })?;
            headers.insert(USER_AGENT, user_agent);
        }

        let (body, upload) = match spec.take_payload() {
            Payload::Empty => (Body::Empty, None),
            Payload::Buffered {
                bytes,
                content_type,
            } => {
                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type.as_str()));
                }
                headers.insert(CONTENT_LENGTH, HeaderValue::from(bytes.len()));
                (Body::from(bytes), None)
            }
            Payload::Streaming(mut source) => {
                let exact = source.exact_len().await;
                let declared = spec.content_length().or_else(|| {
                    headers
                        .get(CONTENT_LENGTH)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.parse().ok())
                });
                let length =
                    resolve_content_length(exact, declared, spec.listener().is_some())?;
                tracing::debug!(?exact, ?declared, ?length, "resolved upload content length");

                match length {
                    ContentLength::Known(len) if len > self.config.max_single_upload => {
                        return Err(Error::configuration(format!(
                            "body of {len} bytes exceeds the single upload limit of {} bytes",
                            self.config.max_single_upload
                        )));
                    }
                    ContentLength::Known(len) => {
                        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
                    }
                    ContentLength::Unknown => {
                        headers.remove(CONTENT_LENGTH);
                    }
                }

                if !headers.contains_key(CONTENT_TYPE) {
                    headers.insert(
                        CONTENT_TYPE,
                        HeaderValue::from_static(ContentKind::OctetStream.as_str()),
                    );
                }

                let tee = TransferTee::new(source.into_stream(self.config.chunk_size), length)
                    .with_checksum(self.config.enable_crc)
                    .with_listener(spec.listener().cloned());
                let receipt = tee.receipt();
                (Body::stream(tee, length.known()), Some(receipt))
            }
        };

        let listener = spec.listener().cloned();
        Ok(Prepared {
            request: Request::new(spec.method().clone(), url, headers, body),
            upload,
            disable_auto_close: spec.disable_auto_close(),
            listener,
        })
    }

    fn decode_error(&self, response: Response<Bytes>) -> Error {
        let (status, headers, body) = response.into_parts();
        match self.decoder.decode(status.as_u16(), &headers, &body) {
            Ok(err) => {
                tracing::debug!(
                    status = err.status,
                    code = %err.code,
                    request_id = %err.request_id,
                    "service returned an error"
                );
                Error::Service(err)
            }
            Err(err) => {
                tracing::warn!(
                    status = status.as_u16(),
                    error = %err,
                    "cannot decode error response"
                );
                err.with_response_context(status.as_u16(), &body)
            }
        }
    }

    fn verify_checksum(&self, receipt: &TransferReceipt, headers: &HeaderMap) -> Result<()> {
        if !self.config.enable_crc {
            return Ok(());
        }
        let Some(local) = receipt.checksum() else {
            tracing::warn!(
                summary = ?receipt.summary(),
                "upload not complete when the response arrived, CRC64 left unverified"
            );
            receipt.record_check(ChecksumCheck::Pending);
            return Ok(());
        };
        let Some(raw) = headers.get(CRC64_HEADER) else {
            receipt.record_check(ChecksumCheck::NotReported);
            return Ok(());
        };

        match raw.to_str().ok().and_then(|v| v.trim().parse::<u64>().ok()) {
            Some(remote) if remote != local => Err(Error::ChecksumMismatch { local, remote }),
            Some(_) => {
                receipt.record_check(ChecksumCheck::Verified);
                Ok(())
            }
            None => {
                tracing::warn!(
                    value = ?raw,
                    "unparsable {CRC64_HEADER} header, skipping CRC64 check"
                );
                receipt.record_check(ChecksumCheck::NotReported);
                Ok(())
            }
        }
    }
}

fn wrap_download(
    response: Response<Body>,
    listener: Option<Arc<dyn ProgressListener>>,
) -> Response<Body> {
    let Some(listener) = listener else {
        return response;
    };
    let total = ContentLength::from(response.content_length());
    let (status, headers, body) = response.into_parts();
    let tee = TransferTee::new(body.into_stream(), total).with_listener(Some(listener));
    let receipt = tee.receipt();
    Response::new(status, headers, Body::stream(tee, total.known())).with_transfer(receipt)
}

fn header_map(params: &ParamMap) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in params.pairs() {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::configuration(format!("invalid header name: {name:?}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| Error::configuration(format!("invalid value for header {name}")))?;
        headers.append(header_name, header_value);
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use assert2::{check, let_assert};
    use futures_util::TryStreamExt;
    use http::{Method, StatusCode};
    use serde::Deserialize;
    use url::Url;

    use super::*;
    use crate::progress::{ProgressEvent, TransferPhase};
    use crate::transfer::{TransferOutcome, crc64_ecma};
    use crate::{ByteSource, BodyFormat};

    #[derive(Debug)]
    struct Recorded {
        method: Method,
        url: Url,
        headers: HeaderMap,
        body: Bytes,
    }

    type Responder = dyn Fn(&Recorded) -> Result<Response<Body>> + Send + Sync;

    struct MockTransport {
        requests: Mutex<Vec<Recorded>>,
        responder: Box<Responder>,
    }

    impl MockTransport {
        fn new(
            responder: impl Fn(&Recorded) -> Result<Response<Body>> + Send + Sync + 'static,
        ) -> Self {
            Self {
                requests: Mutex::new(Vec::new()),
                responder: Box::new(responder),
            }
        }

        fn replying(
            status: StatusCode,
            headers: &[(&'static str, &str)],
            body: &'static [u8],
        ) -> Self {
            let mut map = HeaderMap::new();
            for (name, value) in headers {
                map.insert(*name, HeaderValue::from_str(value).expect("header value"));
            }
            Self::new(move |_| {
                Ok(Response::new(status, map.clone(), Body::from(Bytes::from_static(body))))
            })
        }

        fn requests(&self) -> std::sync::MutexGuard<'_, Vec<Recorded>> {
            self.requests.lock().expect("lock")
        }
    }

    impl Transport for MockTransport {
        async fn execute(&self, request: Request) -> Result<Response<Body>> {
            let (method, url, headers, body) = request.into_parts();
            let body = body.collect().await?;
            let recorded = Recorded {
                method,
                url,
                headers,
                body,
            };
            let response = (self.responder)(&recorded);
            self.requests().push(recorded);
            response
        }
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct OriginResult {
        #[serde(rename = "OriginRule", default)]
        rules: Vec<OriginRule>,
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct OriginRule {
        #[serde(rename = "RulePriority", default)]
        priority: u32,
    }

    impl Decodable for OriginResult {
        const FORMAT: BodyFormat = BodyFormat::Xml;
    }

    fn base() -> Url {
        Url::parse("https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com")
            .expect("valid URL")
    }

    fn recorder() -> (Arc<Mutex<Vec<ProgressEvent>>>, Arc<dyn ProgressListener>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let listener: Arc<dyn ProgressListener> = Arc::new(move |event: &ProgressEvent| {
            sink.lock().expect("lock").push(*event);
        });
        (events, listener)
    }

    #[tokio::test]
    async fn no_content_decodes_to_default() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::NO_CONTENT, &[], b""));
        let spec = RequestSpec::builder(Method::GET, base(), "/?origin").build();

        let response = dispatcher.send::<OriginResult>(spec).await.expect("success");
        check!(response.status() == StatusCode::NO_CONTENT);
        check!(*response.body() == OriginResult::default());
    }

    #[tokio::test]
    async fn success_body_is_decoded() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::OK,
            &[],
            b"<OriginConfiguration><OriginRule><RulePriority>1</RulePriority></OriginRule></OriginConfiguration>",
        ));
        let spec = RequestSpec::builder(Method::GET, base(), "/?origin").build();

        let response = dispatcher.send::<OriginResult>(spec).await.expect("success");
        check!(response.body().rules == vec![OriginRule { priority: 1 }]);
    }

    #[tokio::test]
    async fn not_found_is_a_service_error() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::NOT_FOUND,
            &[(crate::error::REQUEST_ID_HEADER, "header-id")],
            b"<Error><Code>NoSuchKey</Code><Message>The specified key does not exist.</Message><Resource>/a.jpg</Resource><RequestId>body-id</RequestId><TraceId>trace</TraceId></Error>",
        ));
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg").build();

        let_assert!(Err(Error::Service(err)) = dispatcher.send_discard(spec).await);
        check!(err.status == 404);
        check!(err.code == "NoSuchKey");
        check!(err.message == "The specified key does not exist.");
        check!(err.resource == "/a.jpg");
        check!(err.request_id == "body-id");
        check!(err.trace_id == "trace");
    }

    #[tokio::test]
    async fn malformed_error_body_is_a_decode_error() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::NOT_FOUND,
            &[],
            b"<html><body>not found",
        ));
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg").build();

        let_assert!(Err(err) = dispatcher.send_discard(spec).await);
        check!(err.is_decode());
        check!(!err.is_service());
        check!(err.status() == Some(404));
    }

    #[tokio::test]
    async fn transport_errors_pass_through() {
        let dispatcher = Dispatcher::new(MockTransport::new(|_| Err(Error::connection("refused"))));
        let spec = RequestSpec::builder(Method::GET, base(), "/").build();

        let_assert!(Err(err) = dispatcher.send_discard(spec).await);
        check!(err.is_transport());
        check!(err.to_string() == "connection error: refused");
    }

    #[tokio::test]
    async fn upload_reports_progress_and_verifies_crc() {
        let payload = vec![b'x'; 1000];
        let expected_crc = crc64_ecma(&payload);
        let transport = MockTransport::new(|request| {
            let mut headers = HeaderMap::new();
            let crc = crc64_ecma(&request.body).to_string();
            headers.insert(CRC64_HEADER, HeaderValue::from_str(&crc).expect("crc"));
            Ok(Response::new(StatusCode::OK, headers, Body::Empty))
        });
        let dispatcher = Dispatcher::new(transport)
            .with_config(DispatchConfig::builder().chunk_size(100).build());

        let (events, listener) = recorder();
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream(ByteSource::from_reader_with_len(std::io::Cursor::new(payload.clone()), 1000))
            .listener(listener)
            .build();

        let response = dispatcher.send_discard(spec).await.expect("upload");
        let summary = response.transfer().and_then(TransferReceipt::summary).expect("summary");
        check!(summary.outcome == TransferOutcome::Completed);
        check!(summary.bytes_transferred == 1000);
        check!(summary.checksum == Some(expected_crc));

        let events = events.lock().expect("lock");
        check!(events.first().map(|e| e.phase) == Some(TransferPhase::Started));
        check!(events.last().map(|e| e.phase) == Some(TransferPhase::Completed));
        check!(events.iter().filter(|e| e.phase.is_terminal()).count() == 1);
        check!(events.iter().all(|e| e.total_bytes == Some(1000)));
        check!(
            events
                .windows(2)
                .all(|w| w[0].cumulative_bytes <= w[1].cumulative_bytes)
        );
        check!(events.last().map(|e| e.cumulative_bytes) == Some(1000));

        let requests = dispatcher.transport().requests();
        check!(requests[0].method == Method::PUT);
        check!(
            requests[0].headers.get(CONTENT_LENGTH).map(HeaderValue::as_bytes) == Some(&b"1000"[..])
        );
        check!(requests[0].body.as_ref() == payload.as_slice());
    }

    #[tokio::test]
    async fn crc_mismatch_is_an_integrity_error() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::OK,
            &[(CRC64_HEADER, "12345")],
            b"",
        ));
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream("hello")
            .build();

        let_assert!(
            Err(Error::ChecksumMismatch { local, remote }) = dispatcher.send_discard(spec).await
        );
        check!(local == crc64_ecma(b"hello"));
        check!(remote == 12345);
    }

    struct HoldingTransport {
        held: Mutex<Vec<Body>>,
    }

    impl Transport for HoldingTransport {
        async fn execute(&self, request: Request) -> Result<Response<Body>> {
            let (_, _, _, body) = request.into_parts();
            self.held.lock().expect("lock").push(body);
            let mut headers = HeaderMap::new();
            headers.insert(CRC64_HEADER, HeaderValue::from_static("12345"));
            Ok(Response::new(StatusCode::OK, headers, Body::Empty))
        }
    }

    #[tokio::test]
    async fn unfinished_upload_is_marked_unverified() {
        let dispatcher = Dispatcher::new(HoldingTransport {
            held: Mutex::new(Vec::new()),
        });
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream("hello")
            .build();

        let response = dispatcher.send_discard(spec).await.expect("upload");
        let_assert!(Some(receipt) = response.transfer());
        check!(receipt.summary().is_none());
        check!(receipt.checksum_check() == Some(ChecksumCheck::Pending));

        dispatcher.transport().held.lock().expect("lock").clear();
        check!(receipt.summary().map(|s| s.outcome) == Some(TransferOutcome::Failed));
    }

    #[tokio::test]
    async fn matching_crc_is_marked_verified() {
        let transport = MockTransport::new(|request| {
            let mut headers = HeaderMap::new();
            let crc = crc64_ecma(&request.body).to_string();
            headers.insert(CRC64_HEADER, HeaderValue::from_str(&crc).expect("crc"));
            Ok(Response::new(StatusCode::OK, headers, Body::Empty))
        });
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream("hello")
            .build();

        let response = Dispatcher::new(transport).send_discard(spec).await.expect("upload");
        let receipt = response.transfer().expect("receipt");
        check!(receipt.checksum_check() == Some(ChecksumCheck::Verified));
    }

    #[tokio::test]
    async fn crc_check_can_be_disabled() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::OK,
            &[(CRC64_HEADER, "12345")],
            b"",
        ))
        .with_config(DispatchConfig::builder().enable_crc(false).build());
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream("hello")
            .build();

        check!(dispatcher.send_discard(spec).await.is_ok());
    }

    #[tokio::test]
    async fn progress_without_length_fails_before_sending() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""));
        let (events, listener) = recorder();
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream(ByteSource::from_reader(&b"unsized"[..]))
            .listener(listener)
            .build();

        let_assert!(Err(err) = dispatcher.send_discard(spec).await);
        check!(err.is_configuration());
        check!(dispatcher.transport().requests().is_empty());
        check!(events.lock().expect("lock").is_empty());
    }

    #[tokio::test]
    async fn declared_length_sizes_unsized_readers() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""));
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream(ByteSource::from_reader(&b"sized"[..]))
            .content_length(5)
            .build();

        dispatcher.send_discard(spec).await.expect("upload");
        let requests = dispatcher.transport().requests();
        check!(
            requests[0].headers.get(CONTENT_LENGTH).map(HeaderValue::as_bytes) == Some(&b"5"[..])
        );
        check!(
            requests[0].headers.get(CONTENT_TYPE).map(HeaderValue::as_bytes)
                == Some(&b"application/octet-stream"[..])
        );
    }

    #[tokio::test]
    async fn single_upload_limit() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""))
            .with_config(DispatchConfig::builder().max_single_upload(10).build());
        let spec = RequestSpec::builder(Method::PUT, base(), "/exampleobject")
            .stream(vec![0_u8; 11])
            .build();

        let_assert!(Err(err) = dispatcher.send_discard(spec).await);
        check!(err.is_configuration());
        check!(dispatcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn headers_query_and_user_agent() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""));
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg")
            .query("x-cos-traffic-limit", "1")
            .query("versionId", "v1")
            .header("x-cos-traffic-limit", "819200")
            .build();

        dispatcher.send_discard(spec).await.expect("success");
        let requests = dispatcher.transport().requests();
        let request = &requests[0];
        check!(request.url.query() == Some("versionId=v1"));
        check!(
            request.headers.get("x-cos-traffic-limit").map(HeaderValue::as_bytes)
                == Some(&b"819200"[..])
        );
        check!(
            request.headers.get(USER_AGENT).map(HeaderValue::as_bytes)
                == Some(DEFAULT_USER_AGENT.as_bytes())
        );
    }

    #[tokio::test]
    async fn invalid_header_value_is_a_configuration_error() {
        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""));
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg")
            .header("x-cos-meta-note", "line\nbreak")
            .build();

        let_assert!(Err(err) = dispatcher.send_discard(spec).await);
        check!(err.is_configuration());
        check!(dispatcher.transport().requests().is_empty());
    }

    #[tokio::test]
    async fn json_payload_sets_content_type() {
        #[derive(serde::Serialize)]
        struct Input {
            #[serde(rename = "Object")]
            object: &'static str,
        }

        let dispatcher = Dispatcher::new(MockTransport::replying(StatusCode::OK, &[], b""));
        let spec = RequestSpec::builder(Method::POST, base(), "/doc")
            .json_body(&Input { object: "a.docx" })
            .expect("serialize")
            .build();

        dispatcher.send_discard(spec).await.expect("success");
        let requests = dispatcher.transport().requests();
        check!(
            requests[0].headers.get(CONTENT_TYPE).map(HeaderValue::as_bytes)
                == Some(&b"application/json"[..])
        );
        check!(requests[0].body.as_ref() == br#"{"Object":"a.docx"}"#);
    }

    #[tokio::test]
    async fn streaming_download_reports_progress() {
        let dispatcher = Dispatcher::new(MockTransport::replying(
            StatusCode::OK,
            &[("content-length", "11")],
            b"hello world",
        ));
        let (events, listener) = recorder();
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg")
            .listener(listener)
            .build();

        let response = dispatcher.send_streaming(spec).await.expect("success");
        let receipt = response.transfer().cloned().expect("receipt");
        let chunks: Vec<Bytes> = response
            .into_body()
            .into_stream()
            .try_collect()
            .await
            .expect("body");
        check!(chunks.concat() == b"hello world");

        let events = events.lock().expect("lock");
        check!(events.last().map(|e| e.phase) == Some(TransferPhase::Completed));
        check!(events.iter().all(|e| e.total_bytes == Some(11)));
        check!(receipt.summary().map(|s| s.bytes_transferred) == Some(11));
    }

    #[test]
    fn config_builder_overrides() {
        let config = DispatchConfig::builder()
            .enable_crc(false)
            .chunk_size(0)
            .user_agent("custom/1.0")
            .build();
        check!(!config.enable_crc);
        check!(config.chunk_size == 1);
        check!(config.max_single_upload == MAX_SINGLE_UPLOAD);
        check!(config.user_agent == "custom/1.0");
    }
}
