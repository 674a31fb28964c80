//! Error types for stowage.

use bytes::Bytes;
use derive_more::{Display, Error, From};
use http::{HeaderMap, StatusCode};
use serde::Deserialize;

use crate::body::BodyFormat;

/// Response header carrying the service-assigned request id.
pub const REQUEST_ID_HEADER: &str = "x-cos-request-id";

/// Response header carrying the service trace id.
pub const TRACE_ID_HEADER: &str = "x-cos-trace-id";

// ============================================================================
// Service Error
// ============================================================================

/// A well-formed failure payload returned by the remote service.
///
/// Decoded from the XML `<Error>` document (or its JSON equivalent) the service
/// sends with any non-2xx status.
#[derive(Debug, Clone, Default, PartialEq, Eq, Display, Error, Deserialize)]
#[display("service error {status} {code}: {message} (request id: {request_id})")]
pub struct ServiceError {
    /// HTTP status code of the failed call.
    #[serde(skip)]
    pub status: u16,
    /// Service error code, e.g. `NoSuchKey`.
    #[serde(rename = "Code", alias = "code", default)]
    pub code: String,
    /// Human readable message.
    #[serde(rename = "Message", alias = "message", default)]
    pub message: String,
    /// Resource the error refers to.
    #[serde(rename = "Resource", alias = "resource", default)]
    pub resource: String,
    /// Request id assigned by the service.
    #[serde(
        rename = "RequestId",
        alias = "requestId",
        alias = "request_id",
        default
    )]
    pub request_id: String,
    /// Trace id assigned by the service.
    #[serde(rename = "TraceId", alias = "traceId", alias = "trace_id", default)]
    pub trace_id: String,
    /// The undecoded response body.
    #[serde(skip)]
    #[error(not(source))]
    pub raw_body: Bytes,
}

impl ServiceError {
    /// Build a service error for a response that carried no body at all.
    #[must_use]
    pub fn from_status(status: u16, headers: &HeaderMap) -> Self {
        let code = StatusCode::from_u16(status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("Unknown")
            .replace(' ', "");

        let mut error = Self {
            status,
            code,
            ..Self::default()
        };
        error.fill_from_headers(headers);
        error
    }

    /// Complete missing ids from the response headers.
    pub fn fill_from_headers(&mut self, headers: &HeaderMap) {
        if self.request_id.is_empty() {
            if let Some(id) = header_str(headers, REQUEST_ID_HEADER) {
                self.request_id = id.to_string();
            }
        }
        if self.trace_id.is_empty() {
            if let Some(id) = header_str(headers, TRACE_ID_HEADER) {
                self.trace_id = id.to_string();
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

// ============================================================================
// Error Decoder Trait
// ============================================================================

/// Trait for decoding non-success HTTP responses into a [`ServiceError`].
///
/// Returning `Err` signals that the body matches no known error schema; the
/// dispatcher surfaces it as [`Error::Decode`].
///
/// # Example
///
/// ```ignore
/// use stowage_core::{Error, ErrorDecoder, ServiceError};
///
/// struct PlainTextDecoder;
///
/// impl ErrorDecoder for PlainTextDecoder {
///     fn decode(&self, status: u16, _headers: &http::HeaderMap, body: &bytes::Bytes)
///         -> stowage_core::Result<ServiceError>
///     {
///         Ok(ServiceError {
///             status,
///             code: "Plain".to_string(),
///             message: String::from_utf8_lossy(body).into_owned(),
///             ..ServiceError::default()
///         })
///     }
/// }
/// ```
pub trait ErrorDecoder: Send + Sync + 'static {
    /// Decode an error response.
    fn decode(&self, status: u16, headers: &HeaderMap, body: &Bytes) -> Result<ServiceError>;
}

/// Default error decoder: XML `<Error>` document first, then a JSON object.
///
/// An empty body yields a [`ServiceError`] built from the status line and
/// headers. A decoded document without a `Code` is not a known schema.
#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceErrorDecoder;

impl ErrorDecoder for ServiceErrorDecoder {
    fn decode(&self, status: u16, headers: &HeaderMap, body: &Bytes) -> Result<ServiceError> {
        if crate::body::is_blank(body) {
            return Ok(ServiceError::from_status(status, headers));
        }

        let mut error: ServiceError = crate::body::decode_with(BodyFormat::XmlOrJson, body)?;
        if error.code.is_empty() {
            return Err(Error::decode(
                BodyFormat::XmlOrJson,
                "error document has no `Code`",
            ));
        }

        error.status = status;
        error.raw_body = body.clone();
        error.fill_from_headers(headers);
        Ok(error)
    }
}

// ============================================================================
// Error Type
// ============================================================================

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum ErrorKind {
    /// Invalid call setup, detected before any I/O.
    #[display("configuration")]
    Configuration,
    /// Network failure, timeout or cancellation; no response obtained.
    #[display("transport")]
    Transport,
    /// Well-formed non-success response from the service.
    #[display("service")]
    Service,
    /// Response body that cannot be parsed under any supported schema.
    #[display("decode")]
    Decode,
    /// Local and remote checksums disagree.
    #[display("integrity")]
    Integrity,
}

/// Main error type for stowage operations.
#[derive(Debug, Display, Error, From)]
pub enum Error {
    /// Invalid call setup (missing option, progress without length, ...).
    #[display("configuration error: {_0}")]
    #[from(skip)]
    Configuration(#[error(not(source))] String),

    /// JSON serialization of an option or payload failed.
    #[display("JSON serialization error: {_0}")]
    #[from]
    JsonSerialization(serde_json::Error),

    /// XML serialization of a payload failed.
    #[display("XML serialization error: {_0}")]
    #[from(skip)]
    XmlSerialization(#[error(not(source))] String),

    /// URL parsing error.
    #[display("invalid URL: {_0}")]
    #[from]
    InvalidUrl(url::ParseError),

    /// Network/connection errors.
    #[display("connection error: {_0}")]
    #[from(skip)]
    Connection(#[error(not(source))] String),

    /// TLS/SSL errors.
    #[display("TLS error: {_0}")]
    #[from(skip)]
    Tls(#[error(not(source))] String),

    /// Request timeout.
    #[display("request timeout")]
    #[from(skip)]
    Timeout,

    /// I/O error while moving body bytes.
    #[display("transfer I/O error: {_0}")]
    #[from]
    Io(std::io::Error),

    /// Structured error returned by the service.
    #[display("{_0}")]
    #[from]
    Service(#[error(not(source))] ServiceError),

    /// Body that matches no supported schema.
    #[display("cannot decode {format} body: {message}")]
    #[from(skip)]
    Decode {
        /// Format(s) attempted.
        format: BodyFormat,
        /// HTTP status of the response, `0` when decoding outside a call.
        status: u16,
        /// Decoder message(s).
        message: String,
        /// The offending body.
        #[error(not(source))]
        body: Bytes,
    },

    /// CRC64 computed locally differs from the one reported by the service.
    #[display("CRC64 mismatch: local {local}, remote {remote}")]
    #[from(skip)]
    ChecksumMismatch {
        /// Checksum of the bytes sent.
        local: u64,
        /// Checksum reported by the service.
        remote: u64,
    },
}

/// Result type alias using [`crate::Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a connection error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection(message.into())
    }

    /// Create a TLS error.
    #[must_use]
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls(message.into())
    }

    /// Create a decode error without response context.
    #[must_use]
    pub fn decode(format: BodyFormat, message: impl Into<String>) -> Self {
        Self::Decode {
            format,
            status: 0,
            message: message.into(),
            body: Bytes::new(),
        }
    }

    /// Attach the response status and body to a decode error.
    #[must_use]
    pub fn with_response_context(self, status: u16, body: &Bytes) -> Self {
        match self {
            Self::Decode {
                format, message, ..
            } => Self::Decode {
                format,
                status,
                message,
                body: body.clone(),
            },
            other => other,
        }
    }

    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_)
            | Self::JsonSerialization(_)
            | Self::XmlSerialization(_)
            | Self::InvalidUrl(_) => ErrorKind::Configuration,
            Self::Connection(_) | Self::Tls(_) | Self::Timeout | Self::Io(_) => {
                ErrorKind::Transport
            }
            Self::Service(_) => ErrorKind::Service,
            Self::Decode { .. } => ErrorKind::Decode,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
        }
    }

    /// Returns `true` for configuration errors.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }

    /// Returns `true` for transport errors.
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport)
    }

    /// Returns `true` if this is a timeout error.
    #[must_use]
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout)
    }

    /// Returns `true` for structured service errors.
    #[must_use]
    pub const fn is_service(&self) -> bool {
        matches!(self, Self::Service(_))
    }

    /// Returns `true` for decode errors.
    #[must_use]
    pub const fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// The service error, if any.
    #[must_use]
    pub const fn service_error(&self) -> Option<&ServiceError> {
        match self {
            Self::Service(err) => Some(err),
            _ => None,
        }
    }

    /// Returns the HTTP status code if a response was obtained.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Service(err) => Some(err.status),
            Self::Decode { status, .. } if *status != 0 => Some(*status),
            _ => None,
        }
    }

    /// Returns `true` if the service answered 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.service_error().is_some_and(|err| err.status == 404)
    }

    /// The service request id, if any.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.service_error()
            .map(|err| err.request_id.as_str())
            .filter(|id| !id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, http::HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn error_display() {
        let err = Error::configuration("reader is missing");
        assert_eq!(err.to_string(), "configuration error: reader is missing");

        let err = Error::Timeout;
        assert_eq!(err.to_string(), "request timeout");

        let err = Error::connection("failed to connect");
        assert_eq!(err.to_string(), "connection error: failed to connect");

        let err = Error::decode(BodyFormat::Xml, "unexpected end");
        assert_eq!(err.to_string(), "cannot decode XML body: unexpected end");
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            Error::configuration("x").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(Error::Timeout.kind(), ErrorKind::Transport);
        assert_eq!(
            Error::Service(ServiceError::default()).kind(),
            ErrorKind::Service
        );
        assert_eq!(
            Error::decode(BodyFormat::Json, "x").kind(),
            ErrorKind::Decode
        );
        assert_eq!(
            Error::ChecksumMismatch { local: 1, remote: 2 }.kind(),
            ErrorKind::Integrity
        );
    }

    #[test]
    fn decode_error_with_context() {
        let body = Bytes::from_static(b"oops");
        let err = Error::decode(BodyFormat::Xml, "bad").with_response_context(502, &body);
        assert_eq!(err.status(), Some(502));
        assert!(err.is_decode());
        assert!(!err.is_service());
    }

    #[test]
    fn decoder_reads_xml_error_document() {
        let body = Bytes::from_static(
            br"<?xml version='1.0' encoding='utf-8' ?>
<Error>
    <Code>NoSuchKey</Code>
    <Message>The specified key does not exist.</Message>
    <Resource>examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/a.jpg</Resource>
    <RequestId>NjQ2ZDk5ZTZfMjRhMzBi</RequestId>
    <TraceId>OGVmYzZiMmQzYjA2OWNh</TraceId>
</Error>",
        );

        let err = ServiceErrorDecoder
            .decode(404, &HeaderMap::new(), &body)
            .expect("known schema");

        assert_eq!(err.status, 404);
        assert_eq!(err.code, "NoSuchKey");
        assert_eq!(err.message, "The specified key does not exist.");
        assert_eq!(
            err.resource,
            "examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/a.jpg"
        );
        assert_eq!(err.request_id, "NjQ2ZDk5ZTZfMjRhMzBi");
        assert_eq!(err.trace_id, "OGVmYzZiMmQzYjA2OWNh");
        assert_eq!(err.raw_body, body);
    }

    #[test]
    fn decoder_reads_json_error_document() {
        let body = Bytes::from_static(
            br#"{"code":"InvalidArgument","message":"bad detect-type","requestId":"abc"}"#,
        );

        let err = ServiceErrorDecoder
            .decode(400, &HeaderMap::new(), &body)
            .expect("known schema");

        assert_eq!(err.code, "InvalidArgument");
        assert_eq!(err.message, "bad detect-type");
        assert_eq!(err.request_id, "abc");
    }

    #[test]
    fn decoder_takes_request_id_from_headers() {
        let body = Bytes::from_static(b"<Error><Code>AccessDenied</Code></Error>");
        let headers = headers(&[(REQUEST_ID_HEADER, "req-1"), (TRACE_ID_HEADER, "trace-1")]);

        let err = ServiceErrorDecoder
            .decode(403, &headers, &body)
            .expect("known schema");

        assert_eq!(err.request_id, "req-1");
        assert_eq!(err.trace_id, "trace-1");
    }

    #[test]
    fn decoder_handles_empty_body() {
        let headers = headers(&[(REQUEST_ID_HEADER, "req-2")]);
        let err = ServiceErrorDecoder
            .decode(404, &headers, &Bytes::new())
            .expect("empty body is a service error");

        assert_eq!(err.status, 404);
        assert_eq!(err.code, "NotFound");
        assert_eq!(err.request_id, "req-2");
    }

    #[test]
    fn decoder_rejects_unknown_schemas() {
        let plain = Bytes::from_static(b"upstream connect error or disconnect");
        let err = ServiceErrorDecoder
            .decode(503, &HeaderMap::new(), &plain)
            .expect_err("plain text is not an error document");
        assert!(err.is_decode());

        let codeless = Bytes::from_static(b"<Error><Message>no code</Message></Error>");
        let err = ServiceErrorDecoder
            .decode(500, &HeaderMap::new(), &codeless)
            .expect_err("code is required");
        assert!(err.is_decode());
    }

    #[test]
    fn error_predicates() {
        let not_found = Error::Service(ServiceError {
            status: 404,
            code: "NoSuchKey".to_string(),
            request_id: "r".to_string(),
            ..ServiceError::default()
        });
        assert!(not_found.is_not_found());
        assert_eq!(not_found.status(), Some(404));
        assert_eq!(not_found.request_id(), Some("r"));

        assert!(!Error::Timeout.is_not_found());
        assert!(Error::Timeout.is_timeout());
        assert!(Error::connection("refused").is_transport());
        assert_eq!(Error::Timeout.status(), None);
    }
}
