//! Service endpoints.

use url::Url;

use crate::{Error, Result};

/// Endpoints a client talks to.
///
/// Each call site targets one of them; a call whose endpoint is not configured
/// fails with a configuration error before any I/O.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BaseUrl {
    bucket: Option<Url>,
    ci: Option<Url>,
    service: Option<Url>,
}

impl BaseUrl {
    /// No endpoint configured.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bucket and CI endpoints of `bucket` (`name-appid`) in `region`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the names do not form a valid host.
    ///
    /// # Example
    ///
    /// ```
    /// use stowage::BaseUrl;
    ///
    /// let urls = BaseUrl::for_bucket("examplebucket-1250000000", "ap-guangzhou").unwrap();
    /// assert_eq!(
    ///     urls.bucket_url().unwrap().as_str(),
    ///     "https://examplebucket-1250000000.cos.ap-guangzhou.myqcloud.com/"
    /// );
    /// ```
    pub fn for_bucket(bucket: &str, region: &str) -> Result<Self> {
        Self::new()
            .with_bucket(&format!("https://{bucket}.cos.{region}.myqcloud.com"))?
            .with_ci(&format!("https://{bucket}.ci.{region}.myqcloud.com"))
    }

    /// Set the bucket endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` cannot be parsed.
    pub fn with_bucket(mut self, url: &str) -> Result<Self> {
        self.bucket = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Set the CI (media processing) endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` cannot be parsed.
    pub fn with_ci(mut self, url: &str) -> Result<Self> {
        self.ci = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Set the service (account-level) endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if `url` cannot be parsed.
    pub fn with_service(mut self, url: &str) -> Result<Self> {
        self.service = Some(Url::parse(url)?);
        Ok(self)
    }

    /// Bucket endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if it is not set.
    pub fn bucket_url(&self) -> Result<&Url> {
        required(self.bucket.as_ref(), "bucket")
    }

    /// CI endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if it is not set.
    pub fn ci_url(&self) -> Result<&Url> {
        required(self.ci.as_ref(), "CI")
    }

    /// Service endpoint.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if it is not set.
    pub fn service_url(&self) -> Result<&Url> {
        required(self.service.as_ref(), "service")
    }
}

fn required<'a>(url: Option<&'a Url>, name: &str) -> Result<&'a Url> {
    url.ok_or_else(|| Error::configuration(format!("{name} URL is not configured")))
}
