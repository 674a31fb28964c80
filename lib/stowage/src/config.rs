//! Transport configuration.

use std::time::Duration;

/// Timeouts and pooling of [`HyperTransport`](crate::HyperTransport).
///
/// No timeout bounds a whole upload. The response timeout starts once the
/// request body has been sent, and a streaming body only fails when its source
/// produces nothing for `upload_stall_timeout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Time allowed for the response headers once the request body is sent.
    pub response_timeout: Duration,
    /// Longest wait for the next chunk of a streaming request body.
    pub upload_stall_timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Idle connections kept per host.
    pub pool_idle_per_host: usize,
    /// How long an idle connection stays pooled.
    pub pool_idle_timeout: Duration,
    /// Speak HTTP/2 only, without HTTP/1.1 fallback.
    pub http2_only: bool,
}

impl ClientConfig {
    /// Default [`response_timeout`](Self::response_timeout).
    pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
    /// Default [`upload_stall_timeout`](Self::upload_stall_timeout).
    pub const DEFAULT_UPLOAD_STALL_TIMEOUT: Duration = Duration::from_secs(60);

    /// Start a builder from the defaults.
    #[must_use]
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder(Self::default())
    }

    /// Start a builder from this configuration.
    #[must_use]
    pub fn into_builder(self) -> ClientConfigBuilder {
        ClientConfigBuilder(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            response_timeout: Self::DEFAULT_RESPONSE_TIMEOUT,
            upload_stall_timeout: Self::DEFAULT_UPLOAD_STALL_TIMEOUT,
            connect_timeout: Duration::from_secs(10),
            pool_idle_per_host: 32,
            pool_idle_timeout: Duration::from_secs(90),
            http2_only: false,
        }
    }
}

/// Builder for [`ClientConfig`].
#[derive(Debug, Clone, Default)]
pub struct ClientConfigBuilder(ClientConfig);

impl ClientConfigBuilder {
    /// Set the time allowed for the response headers.
    #[must_use]
    pub const fn response_timeout(mut self, timeout: Duration) -> Self {
        self.0.response_timeout = timeout;
        self
    }

    /// Set the longest pause of a streaming upload source.
    #[must_use]
    pub const fn upload_stall_timeout(mut self, timeout: Duration) -> Self {
        self.0.upload_stall_timeout = timeout;
        self
    }

    /// Set the TCP connect timeout.
    #[must_use]
    pub const fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.0.connect_timeout = timeout;
        self
    }

    /// Set the idle connections kept per host.
    #[must_use]
    pub const fn pool_idle_per_host(mut self, count: usize) -> Self {
        self.0.pool_idle_per_host = count;
        self
    }

    /// Set how long an idle connection stays pooled.
    #[must_use]
    pub const fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.0.pool_idle_timeout = timeout;
        self
    }

    /// Restrict the transport to HTTP/2.
    #[must_use]
    pub const fn http2_only(mut self, enabled: bool) -> Self {
        self.0.http2_only = enabled;
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> ClientConfig {
        self.0
    }
}
