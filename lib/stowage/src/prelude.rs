//! Prelude module for convenient imports.
//!
//! ```ignore
//! use stowage::prelude::*;
//! ```

pub use crate::{
    BaseUrl, Body, ByteSource, CosClient, DispatchConfig, Dispatcher, EncodeOptions, Error,
    HyperTransport, Method, Options, ProgressEvent, ProgressListener, RequestSpec, Response,
    Result, StatusCode, TransferPhase, Transport, header,
};
pub use serde::{Deserialize, Serialize};
