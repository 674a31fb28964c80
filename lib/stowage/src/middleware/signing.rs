//! Request signing middleware.
//!
//! Credentials and the signature algorithm stay outside this crate: a
//! [`RequestSigner`] receives each fully prepared request (final URL, headers
//! including `Content-Length`) and adds whatever authorization it needs.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use tower::{Layer, Service};

use crate::{Body, Error, Request, Response, Result};

/// Adds authorization to an outgoing request.
pub trait RequestSigner: Send + Sync {
    /// Sign `request` in place.
    ///
    /// # Errors
    ///
    /// Returns an error if the request cannot be signed; it is then not sent.
    fn sign(&self, request: &mut Request) -> Result<()>;
}

impl<F> RequestSigner for F
where
    F: Fn(&mut Request) -> Result<()> + Send + Sync,
{
    fn sign(&self, request: &mut Request) -> Result<()> {
        self(request)
    }
}

/// Layer that signs requests before they are sent.
///
/// # Example
///
/// ```ignore
/// use stowage::middleware::SignLayer;
/// use stowage::{HeaderValue, Request, header};
///
/// let layer = SignLayer::new(|request: &mut Request| -> stowage::Result<()> {
///     request
///         .headers_mut()
///         .insert(header::AUTHORIZATION, HeaderValue::from_static("q-sign-algorithm=sha1&..."));
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct SignLayer {
    signer: Arc<dyn RequestSigner>,
}

impl SignLayer {
    /// Create a new signing layer.
    pub fn new(signer: impl RequestSigner + 'static) -> Self {
        Self {
            signer: Arc::new(signer),
        }
    }
}

impl std::fmt::Debug for SignLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for SignLayer {
    type Service = Sign<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Sign {
            inner,
            signer: Arc::clone(&self.signer),
        }
    }
}

/// Service that signs requests.
#[derive(Clone)]
pub struct Sign<S> {
    inner: S,
    signer: Arc<dyn RequestSigner>,
}

impl<S: std::fmt::Debug> std::fmt::Debug for Sign<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sign")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S> Service<Request> for Sign<S>
where
    S: Service<Request, Response = Response<Body>, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let signed = self.signer.sign(&mut request);

        // Take the service that was polled ready, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        Box::pin(async move {
            signed?;
            inner.call(request).await
        })
    }
}
