//! Core types and traits for the stowage object-storage client.
//!
//! This crate provides the dispatch and streaming engine used by stowage:
//! - [`EncodeOptions`], [`WireValue`] and [`ParamMap`] - Options encoding
//! - [`to_xml`], [`to_json`], [`decode_body`] and [`Decodable`] - Body serialization
//! - [`resolve_content_length`] and [`ByteSource`] - Upload sizing
//! - [`TransferTee`] and [`ProgressListener`] - Progress and CRC64 while streaming
//! - [`Dispatcher`] and [`Transport`] - Request execution and outcome classification
//! - [`Error`], [`ServiceError`] and [`Result`] - Error handling
//! - [`Method`], [`StatusCode`] and [`header`] - HTTP types (re-exported from `http` crate)

mod body;
mod dispatch;
mod entity;
mod error;
mod length;
mod options;
pub mod prelude;
mod progress;
mod request;
mod response;
mod transfer;
mod transport;

pub use body::{
    BodyFormat, ContentKind, Decodable, decode_body, decode_with, from_json, from_xml, to_json,
    to_xml,
};
pub use dispatch::{
    CRC64_HEADER, DEFAULT_USER_AGENT, DispatchConfig, DispatchConfigBuilder, Dispatcher,
    MAX_SINGLE_UPLOAD,
};
pub use entity::{Body, BodyStream};
pub use error::{
    Error, ErrorDecoder, ErrorKind, REQUEST_ID_HEADER, Result, ServiceError, ServiceErrorDecoder,
    TRACE_ID_HEADER,
};
pub use length::{ByteSource, ContentLength, resolve_content_length};
pub use options::{EncodeOptions, Json, ParamMap, WireValue, encode_object_key};
pub use progress::{ProgressEvent, ProgressListener, TransferPhase};
pub use request::{Payload, Request, RequestSpec, RequestSpecBuilder};
pub use response::Response;
pub use transfer::{
    ChecksumCheck, ReaderChunks, TransferOutcome, TransferReceipt, TransferSummary, TransferTee,
    crc64_ecma,
};
pub use transport::Transport;

// Re-export http crate types for methods, status codes and headers
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
