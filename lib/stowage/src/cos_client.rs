//! Object-storage client.
//!
//! [`CosClient`] pairs a [`Dispatcher`] with the service endpoints. Call sites
//! live in [`crate::services`] as inherent methods on this type.

use crate::{
    BaseUrl, DispatchConfig, Dispatcher, ErrorDecoder, HyperTransport, Result, ServiceErrorDecoder,
    Transport,
};

/// Client for the object-storage and media-processing APIs.
///
/// Cloning is cheap when the transport is: a [`HyperTransport`] shares its
/// connection pool and middleware between clones.
///
/// # Example
///
/// ```ignore
/// use stowage::{BaseUrl, CosClient, HyperTransport};
///
/// let transport = HyperTransport::builder()
///     .with_signer(my_signer)
///     .with_logging()
///     .build();
///
/// let client = CosClient::new(
///     transport,
///     BaseUrl::for_bucket("examplebucket-1250000000", "ap-guangzhou")?,
/// );
/// let origin = client.get_origin().await?;
/// ```
#[derive(Debug, Clone)]
pub struct CosClient<T = HyperTransport, D = ServiceErrorDecoder> {
    dispatcher: Dispatcher<T, D>,
    base_url: BaseUrl,
}

impl<T: Transport> CosClient<T> {
    /// Create a client over `transport` with the default dispatch configuration.
    #[must_use]
    pub fn new(transport: T, base_url: BaseUrl) -> Self {
        Self {
            dispatcher: Dispatcher::new(transport),
            base_url,
        }
    }
}

impl CosClient {
    /// Create a client with a default [`HyperTransport`].
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket and region do not form valid endpoints.
    pub fn for_bucket(bucket: &str, region: &str) -> Result<Self> {
        Ok(Self::new(
            HyperTransport::new(),
            BaseUrl::for_bucket(bucket, region)?,
        ))
    }
}

impl<T, D> CosClient<T, D>
where
    T: Transport,
    D: ErrorDecoder,
{
    /// Create a client from a configured dispatcher.
    #[must_use]
    pub fn with_dispatcher(dispatcher: Dispatcher<T, D>, base_url: BaseUrl) -> Self {
        Self {
            dispatcher,
            base_url,
        }
    }

    /// Replace the dispatch configuration.
    #[must_use]
    pub fn with_config(mut self, config: DispatchConfig) -> Self {
        self.dispatcher = self.dispatcher.with_config(config);
        self
    }

    /// Endpoints of this client.
    #[must_use]
    pub fn base_url(&self) -> &BaseUrl {
        &self.base_url
    }

    /// Dispatcher executing the calls.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher<T, D> {
        &self.dispatcher
    }

    /// Consume the wrapper and return the dispatcher.
    #[must_use]
    pub fn into_dispatcher(self) -> Dispatcher<T, D> {
        self.dispatcher
    }
}
