//! Request description and wire request.
//!
//! A [`RequestSpec`] describes one call: endpoint, method, encoded options and
//! payload. The dispatcher turns it into a wire [`Request`].
//!
//! # Example
//!
//! ```
//! use stowage_core::{Method, RequestSpec};
//!
//! let spec = RequestSpec::builder(
//!     Method::GET,
//!     "https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com".parse().expect("url"),
//!     "/?origin",
//! )
//! .header("x-cos-traffic-limit", "819200")
//! .build();
//!
//! assert_eq!(
//!     spec.url().expect("url").as_str(),
//!     "https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/?origin"
//! );
//! ```

use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, Method};
use serde::Serialize;
use url::Url;

use crate::body::{ContentKind, to_json, to_xml};
use crate::entity::Body;
use crate::length::ByteSource;
use crate::options::{EncodeOptions, ParamMap};
use crate::progress::ProgressListener;
use crate::Result;

// ============================================================================
// Payload
// ============================================================================

/// Body of a call, before it is prepared for the wire.
#[derive(Debug, Default)]
pub enum Payload {
    /// No body.
    #[default]
    Empty,
    /// Serialized document.
    Buffered {
        /// Encoded bytes.
        bytes: Bytes,
        /// Content type of `bytes`.
        content_type: ContentKind,
    },
    /// Raw bytes read from a source while sending.
    Streaming(ByteSource),
}

impl Payload {
    /// Serialize `value` as an XML document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn xml<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Buffered {
            bytes: to_xml(value)?,
            content_type: ContentKind::Xml,
        })
    }

    /// Serialize `value` as a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: Serialize>(value: &T) -> Result<Self> {
        Ok(Self::Buffered {
            bytes: to_json(value)?,
            content_type: ContentKind::Json,
        })
    }

    /// Returns `true` for [`Self::Streaming`].
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming(_))
    }
}

// ============================================================================
// Request spec
// ============================================================================

/// Description of one call.
pub struct RequestSpec {
    base_url: Url,
    uri: String,
    method: Method,
    query: ParamMap,
    headers: ParamMap,
    payload: Payload,
    disable_auto_close: bool,
    content_length: Option<u64>,
    listener: Option<Arc<dyn ProgressListener>>,
}

impl RequestSpec {
    /// Start describing a call to `uri`, relative to `base_url`.
    #[must_use]
    pub fn builder(method: Method, base_url: Url, uri: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(method, base_url, uri)
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Base URL of the endpoint.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Path (and sub-resource) relative to the base URL.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Encoded query parameters.
    #[must_use]
    pub fn query(&self) -> &ParamMap {
        &self.query
    }

    /// Encoded headers.
    #[must_use]
    pub fn headers(&self) -> &ParamMap {
        &self.headers
    }

    /// Payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Whether the response body is handed to the caller unread.
    #[must_use]
    pub const fn disable_auto_close(&self) -> bool {
        self.disable_auto_close
    }

    /// Length declared by the caller.
    #[must_use]
    pub const fn content_length(&self) -> Option<u64> {
        self.content_length
    }

    /// Progress listener.
    #[must_use]
    pub fn listener(&self) -> Option<&Arc<dyn ProgressListener>> {
        self.listener.as_ref()
    }

    /// Query parameters that reach the wire.
    ///
    /// A query parameter that shares its name with a header (ignoring ASCII
    /// case) is dropped: the header wins.
    #[must_use]
    pub fn effective_query(&self) -> ParamMap {
        self.query
            .pairs()
            .filter(|(name, _)| {
                let shadowed = self.headers.contains_key_ignore_case(name);
                if shadowed {
                    tracing::debug!(name, "query parameter shadowed by header of the same name");
                }
                !shadowed
            })
            .collect()
    }

    /// Full URL of the call: base URL, uri, then the effective query.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidUrl`] if the result is not a valid URL.
    pub fn url(&self) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let separator = if self.uri.starts_with('/') { "" } else { "/" };
        let mut url = Url::parse(&format!("{base}{separator}{}", self.uri))?;

        let query = self.effective_query();
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.pairs());
        }
        Ok(url)
    }

    /// Consume into the payload, keeping the rest of the description.
    pub(crate) fn take_payload(&mut self) -> Payload {
        std::mem::take(&mut self.payload)
    }

    pub(crate) fn set_disable_auto_close(&mut self, value: bool) {
        self.disable_auto_close = value;
    }
}

impl std::fmt::Debug for RequestSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestSpec")
            .field("method", &self.method)
            .field("base_url", &self.base_url.as_str())
            .field("uri", &self.uri)
            .field("query", &self.query)
            .field("headers", &self.headers)
            .field("payload", &self.payload)
            .field("disable_auto_close", &self.disable_auto_close)
            .field("content_length", &self.content_length)
            .field("listener", &self.listener.is_some())
            .finish()
    }
}

/// Builder for [`RequestSpec`].
pub struct RequestSpecBuilder {
    spec: RequestSpec,
}

impl RequestSpecBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, base_url: Url, uri: impl Into<String>) -> Self {
        Self {
            spec: RequestSpec {
                base_url,
                uri: uri.into(),
                method,
                query: ParamMap::new(),
                headers: ParamMap::new(),
                payload: Payload::Empty,
                disable_auto_close: false,
                content_length: None,
                listener: None,
            },
        }
    }

    /// Encode an options value into query, headers and body.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field cannot be encoded.
    pub fn options(self, options: &impl EncodeOptions) -> Result<Self> {
        let mut this = self.query_options(options)?.header_options(options)?;
        if let Some(payload) = options.encode_body()? {
            this.spec.payload = payload;
        }
        Ok(this)
    }

    /// Encode only the query parameters of an options value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field cannot be encoded.
    pub fn query_options(mut self, options: &impl EncodeOptions) -> Result<Self> {
        options.encode_query(&mut self.spec.query)?;
        Ok(self)
    }

    /// Encode only the headers of an options value.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a field cannot be encoded.
    pub fn header_options(mut self, options: &impl EncodeOptions) -> Result<Self> {
        options.encode_headers(&mut self.spec.headers)?;
        Ok(self)
    }

    /// Appends a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.query.append(name, value);
        self
    }

    /// Sets a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.spec.headers.insert(name, value);
        self
    }

    /// Sets the payload.
    #[must_use]
    pub fn payload(mut self, payload: Payload) -> Self {
        self.spec.payload = payload;
        self
    }

    /// Set an XML body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn xml_body<T: Serialize>(self, value: &T) -> Result<Self> {
        Ok(self.payload(Payload::xml(value)?))
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json_body<T: Serialize>(self, value: &T) -> Result<Self> {
        Ok(self.payload(Payload::json(value)?))
    }

    /// Stream the body from `source`.
    #[must_use]
    pub fn stream(self, source: impl Into<ByteSource>) -> Self {
        self.payload(Payload::Streaming(source.into()))
    }

    /// Declare the body length, for sources whose size cannot be computed.
    #[must_use]
    pub fn content_length(mut self, len: u64) -> Self {
        self.spec.content_length = Some(len);
        self
    }

    /// Report transfer progress to `listener`.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn ProgressListener>) -> Self {
        self.spec.listener = Some(listener);
        self
    }

    /// Hand the response body to the caller unread.
    #[must_use]
    pub fn disable_auto_close(mut self) -> Self {
        self.spec.disable_auto_close = true;
        self
    }

    /// Builds the [`RequestSpec`].
    #[must_use]
    pub fn build(self) -> RequestSpec {
        self.spec
    }
}

// ============================================================================
// Wire request
// ============================================================================

/// A request ready for the transport.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Body,
}

impl Request {
    /// Creates a new request.
    #[must_use]
    pub fn new(method: Method, url: Url, headers: HeaderMap, body: Body) -> Self {
        Self {
            method,
            url,
            headers,
            body,
        }
    }

    /// HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL.
    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request body.
    #[must_use]
    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Consume into (method, url, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Body) {
        (self.method, self.url, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/")
            .expect("valid URL")
    }

    #[test]
    fn url_joins_base_and_uri() {
        let spec = RequestSpec::builder(Method::GET, base(), "/dir/a%20b.jpg").build();
        assert_eq!(
            spec.url().expect("url").as_str(),
            "https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/dir/a%20b.jpg"
        );

        let spec = RequestSpec::builder(Method::GET, base(), "a.jpg").build();
        assert_eq!(spec.url().expect("url").path(), "/a.jpg");
    }

    #[test]
    fn url_appends_query_after_sub_resource() {
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg?ci-process=IDCardOCR")
            .query("CardSide", "FRONT")
            .build();
        assert_eq!(
            spec.url().expect("url").query(),
            Some("ci-process=IDCardOCR&CardSide=FRONT")
        );
    }

    #[test]
    fn header_wins_over_query_parameter() {
        let spec = RequestSpec::builder(Method::GET, base(), "/a.jpg")
            .query("x-cos-traffic-limit", "1")
            .query("versionId", "v1")
            .header("X-Cos-Traffic-Limit", "819200")
            .build();

        let query = spec.effective_query();
        assert!(!query.contains_key("x-cos-traffic-limit"));
        assert_eq!(query.get("versionId"), Some("v1"));
        assert_eq!(spec.url().expect("url").query(), Some("versionId=v1"));
    }

    #[test]
    fn xml_body_sets_content_kind() {
        #[derive(Serialize)]
        #[serde(rename = "Tagging")]
        struct Tagging {
            #[serde(rename = "Key")]
            key: &'static str,
        }

        let spec = RequestSpec::builder(Method::PUT, base(), "/?tagging")
            .xml_body(&Tagging { key: "env" })
            .expect("serialize")
            .build();

        let Payload::Buffered {
            bytes,
            content_type,
        } = spec.payload()
        else {
            panic!("expected buffered payload");
        };
        assert_eq!(*content_type, ContentKind::Xml);
        assert_eq!(bytes.as_ref(), b"<Tagging><Key>env</Key></Tagging>");
    }

    #[test]
    fn wire_request_parts() {
        let mut headers = HeaderMap::new();
        headers.insert("x-cos-meta-a", http::HeaderValue::from_static("1"));
        let request = Request::new(Method::DELETE, base(), headers, Body::Empty);

        assert_eq!(request.method(), Method::DELETE);
        assert_eq!(request.header("x-cos-meta-a"), Some("1"));
        let (method, url, _, body) = request.into_parts();
        assert_eq!(method, Method::DELETE);
        assert_eq!(url, base());
        assert!(body.is_empty());
    }
}
