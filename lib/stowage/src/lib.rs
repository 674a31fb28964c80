//! Async client for object storage and media processing.
//!
//! Call sites describe a request as a [`RequestSpec`]: endpoint, method, options
//! encoded into query and headers, and a payload. A [`Dispatcher`] turns it into
//! a wire request, sends it through a [`Transport`], and maps the response to a
//! typed result or an [`Error`]. Uploads and downloads stream through a
//! [`TransferTee`], which reports progress and computes a CRC64.
//!
//! # Example
//!
//! ```ignore
//! use stowage::prelude::*;
//!
//! #[derive(Debug, Options)]
//! #[wire(rename_all = "kebab-case")]
//! struct ThumbnailOptions {
//!     #[wire(query = "ci-process")]
//!     ci_process: String,
//!     #[wire(header = "x-cos-traffic-limit", omit_empty)]
//!     traffic_limit: u64,
//! }
//!
//! let client = CosClient::for_bucket("examplebucket-1250000000", "ap-guangzhou")?;
//! let spec = RequestSpec::builder(Method::GET, client.base_url().bucket_url()?.clone(), "/a.jpg")
//!     .options(&ThumbnailOptions { ci_process: "Thumbnail".into(), traffic_limit: 0 })?
//!     .build();
//! let image = client.dispatcher().dispatch(spec).await?.collect().await?;
//! ```

extern crate self as stowage;

mod base_url;
mod client;
mod config;
mod connector;
mod cos_client;
pub mod middleware;
pub mod prelude;
pub mod services;

// Re-export client types
pub use base_url::BaseUrl;
pub use client::{BoxedService, HyperTransport, HyperTransportBuilder, ServiceFuture};
pub use config::{ClientConfig, ClientConfigBuilder};
pub use connector::https_connector;
pub use cos_client::CosClient;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use stowage_core::{
    Body, BodyFormat, BodyStream, ByteSource, CRC64_HEADER, ChecksumCheck, ContentKind,
    ContentLength, DEFAULT_USER_AGENT, Decodable, DispatchConfig, DispatchConfigBuilder,
    Dispatcher, EncodeOptions, Error, ErrorDecoder, ErrorKind, Json, MAX_SINGLE_UPLOAD, ParamMap,
    Payload, ProgressEvent, ProgressListener, REQUEST_ID_HEADER, ReaderChunks, Request,
    RequestSpec, RequestSpecBuilder, Response, Result, ServiceError, ServiceErrorDecoder,
    TRACE_ID_HEADER, TransferOutcome, TransferPhase, TransferReceipt, TransferSummary,
    TransferTee, Transport, WireValue, crc64_ecma, decode_body, decode_with, encode_object_key,
    from_json, from_xml, resolve_content_length, to_json, to_xml,
};

// Re-export http types for status codes and headers
pub use stowage_core::{HeaderMap, HeaderValue, Method, StatusCode, header};

// Re-export macros
pub use stowage_macro::Options;
