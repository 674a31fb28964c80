//! Transport trait.
//!
//! The dispatcher prepares a wire [`Request`] and hands it to a [`Transport`].
//! `stowage` provides a hyper-based implementation; tests use in-memory ones.

use std::future::Future;
use std::sync::Arc;

use crate::{Body, Request, Response, Result};

/// Executes wire requests.
///
/// Implementations map network failures to transport-class errors
/// ([`crate::Error::Connection`], [`crate::Error::Tls`], [`crate::Error::Timeout`])
/// and return every HTTP response, whatever its status.
pub trait Transport: Send + Sync {
    /// Execute a request and return the response with its body unread.
    ///
    /// # Errors
    ///
    /// Returns an error if no response was obtained.
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response<Body>>> + Send;
}

impl<T: Transport> Transport for Arc<T> {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response<Body>>> + Send {
        (**self).execute(request)
    }
}

impl<T: Transport> Transport for &T {
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response<Body>>> + Send {
        (**self).execute(request)
    }
}
