//! HTTP response handling.
//!
//! [`Response`] carries status, headers and a body. The body is a wire
//! [`Body`] as returned by the transport, buffered [`Bytes`], or a decoded result.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};

use crate::body::{Decodable, decode_body};
use crate::entity::Body;
use crate::error::{REQUEST_ID_HEADER, TRACE_ID_HEADER};
use crate::transfer::TransferReceipt;

/// HTTP response with status, headers, and body.
#[derive(Debug)]
pub struct Response<B = Body> {
    status: StatusCode,
    headers: HeaderMap,
    body: B,
    transfer: Option<TransferReceipt>,
}

impl<B> Response<B> {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: B) -> Self {
        Self {
            status,
            headers,
            body,
            transfer: None,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Single header value by name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Request id assigned by the service.
    #[must_use]
    pub fn request_id(&self) -> Option<&str> {
        self.header(REQUEST_ID_HEADER)
    }

    /// Trace id assigned by the service.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.header(TRACE_ID_HEADER)
    }

    /// `Content-Length` of the response, if announced.
    #[must_use]
    pub fn content_length(&self) -> Option<u64> {
        self.header(http::header::CONTENT_LENGTH.as_str())
            .and_then(|v| v.parse().ok())
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &B {
        &self.body
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> B {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, B) {
        (self.status, self.headers, self.body)
    }

    /// Summary handle of the streamed request or response body, if any.
    #[must_use]
    pub fn transfer(&self) -> Option<&TransferReceipt> {
        self.transfer.as_ref()
    }

    /// Attach a transfer receipt.
    #[must_use]
    pub fn with_transfer(mut self, receipt: TransferReceipt) -> Self {
        self.transfer = Some(receipt);
        self
    }

    /// Status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Status is 4xx.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Status is 5xx.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status.is_server_error()
    }

    /// Transform the body with a function.
    pub fn map_body<F, B2>(self, f: F) -> Response<B2>
    where
        F: FnOnce(B) -> B2,
    {
        Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body),
            transfer: self.transfer,
        }
    }

    /// Transform the body with a fallible function.
    ///
    /// # Errors
    ///
    /// Returns the error of `f`.
    pub fn try_map_body<F, B2, E>(self, f: F) -> Result<Response<B2>, E>
    where
        F: FnOnce(B) -> Result<B2, E>,
    {
        Ok(Response {
            status: self.status,
            headers: self.headers,
            body: f(self.body)?,
            transfer: self.transfer,
        })
    }
}

impl Response<Body> {
    /// Buffer the entire body.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn collect(self) -> crate::Result<Response<Bytes>> {
        let Self {
            status,
            headers,
            body,
            transfer,
        } = self;
        let body = body.collect().await?;
        Ok(Response {
            status,
            headers,
            body,
            transfer,
        })
    }
}

impl Response<Bytes> {
    /// Decode the body into `T`; an empty body is `T::default()`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Decode`] if the body cannot be decoded.
    pub fn decode<T: Decodable>(self) -> crate::Result<Response<T>> {
        let status = self.status.as_u16();
        self.try_map_body(|bytes| {
            decode_body(&bytes).map_err(|err| err.with_response_context(status, &bytes))
        })
    }

    /// Get the response body as text.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not valid UTF-8.
    pub fn text(self) -> Result<String, std::string::FromUtf8Error> {
        String::from_utf8(self.body.to_vec())
    }
}
