//! Prelude module for convenient imports.
//!
//! This module re-exports the most commonly used types and functions
//! for easy glob importing:
//!
//! ```ignore
//! use stowage_core::prelude::*;
//! ```

pub use crate::{
    Body, ByteSource, Decodable, Dispatcher, EncodeOptions, Error, Json, Method, Payload,
    ProgressEvent, ProgressListener, RequestSpec, Response, Result, ServiceError, StatusCode,
    Transport, WireValue, to_json, to_xml,
};
