//! Bucket back-to-origin rules (`?origin`).

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{CosClient, Decodable, ErrorDecoder, Method, RequestSpec, Response, Result, Transport};

/// Back-to-origin configuration of a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "OriginConfiguration")]
pub struct OriginConfiguration {
    /// Rules, evaluated by priority.
    #[serde(rename = "OriginRule", default)]
    pub rules: Vec<OriginRule>,
}

impl Decodable for OriginConfiguration {}

/// One back-to-origin rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginRule {
    /// Lower values are evaluated first.
    pub rule_priority: u32,
    /// `Mirror` or `Proxy`.
    pub origin_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Trigger of the rule.
    pub origin_condition: Option<OriginCondition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Request sent to the origin.
    pub origin_parameter: Option<OriginParameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Origin hosts.
    pub origin_info: Option<OriginInfo>,
}

/// When a rule applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OriginCondition {
    #[serde(rename = "HTTPStatusCode", default, skip_serializing_if = "String::is_empty")]
    /// Status that triggers the rule, usually `404`.
    pub http_status_code: String,
    #[serde(rename = "Prefix", default, skip_serializing_if = "String::is_empty")]
    /// Key prefix the rule is limited to.
    pub prefix: String,
}

/// How the origin is queried.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginParameter {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    /// `HTTP`, `HTTPS` or `FOLLOW`.
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Forward the query string.
    pub follow_query_string: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Header forwarding rules.
    pub http_header: Option<OriginHttpHeader>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Follow redirects returned by the origin.
    pub follow_redirection: Option<bool>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    /// Redirect status used in proxy mode.
    pub http_redirect_code: String,
}

/// Headers forwarded to or added for the origin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginHttpHeader {
    #[serde(default, skip_serializing_if = "HeaderList::is_empty")]
    /// Request headers forwarded to the origin.
    pub follow_http_headers: HeaderList,
    #[serde(default, skip_serializing_if = "HeaderList::is_empty")]
    /// Headers added to origin requests.
    pub new_http_headers: HeaderList,
}

/// `<Header>` entries of a header list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderList {
    #[serde(rename = "Header", default)]
    /// Entries, in wire order.
    pub headers: Vec<OriginHeader>,
}

impl HeaderList {
    /// True if the list has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }
}

/// A header name, with a value when the header is added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginHeader {
    /// Header name.
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    /// Header value, empty for forwarded headers.
    pub value: String,
}

/// Where the origin lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OriginInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Primary host and standbys.
    pub host_info: Option<OriginHostInfo>,
}

/// Origin host and its standbys.
///
/// Standby hosts are numbered elements on the wire: `StandbyHostName_1`,
/// `StandbyHostName_2`, ...
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OriginHostInfo {
    /// Primary origin host.
    pub host_name: String,
    /// Load-balancing weight.
    pub weight: u32,
    /// Standby hosts, in failover order.
    pub standby_host_names: Vec<String>,
}

const STANDBY_PREFIX: &str = "StandbyHostName_";

impl Serialize for OriginHostInfo {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if !self.host_name.is_empty() {
            map.serialize_entry("HostName", &self.host_name)?;
        }
        if self.weight != 0 {
            map.serialize_entry("Weight", &self.weight)?;
        }
        for (i, name) in self.standby_host_names.iter().enumerate() {
            map.serialize_entry(&format!("{STANDBY_PREFIX}{}", i + 1), name)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for OriginHostInfo {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct HostInfoVisitor;

        impl<'de> Visitor<'de> for HostInfoVisitor {
            type Value = OriginHostInfo;

            fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str("a HostInfo element")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut info = OriginHostInfo::default();
                let mut standby: Vec<(u32, String)> = Vec::new();

                while let Some(key) = map.next_key::<String>()? {
                    match key.as_str() {
                        "HostName" => info.host_name = map.next_value()?,
                        "Weight" => {
                            let raw: String = map.next_value()?;
                            info.weight = raw.trim().parse().map_err(serde::de::Error::custom)?;
                        }
                        other => match other
                            .strip_prefix(STANDBY_PREFIX)
                            .and_then(|n| n.parse::<u32>().ok())
                        {
                            Some(index) => standby.push((index, map.next_value()?)),
                            None => {
                                map.next_value::<serde::de::IgnoredAny>()?;
                            }
                        },
                    }
                }

                standby.sort_by_key(|(index, _)| *index);
                info.standby_host_names = standby.into_iter().map(|(_, name)| name).collect();
                Ok(info)
            }
        }

        deserializer.deserialize_map(HostInfoVisitor)
    }
}

impl<T, D> CosClient<T, D>
where
    T: Transport,
    D: ErrorDecoder,
{
    /// Read the back-to-origin rules of the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn get_origin(&self) -> Result<Response<OriginConfiguration>> {
        let url = self.base_url().bucket_url()?.clone();
        let spec = RequestSpec::builder(Method::GET, url, "/?origin").build();
        self.dispatcher().send(spec).await
    }

    /// Replace the back-to-origin rules of the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn put_origin(&self, configuration: &OriginConfiguration) -> Result<Response<()>> {
        let url = self.base_url().bucket_url()?.clone();
        let spec = RequestSpec::builder(Method::PUT, url, "/?origin")
            .xml_body(configuration)?
            .build();
        self.dispatcher().send_discard(spec).await
    }

    /// Remove the back-to-origin rules of the bucket.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn delete_origin(&self) -> Result<Response<()>> {
        let url = self.base_url().bucket_url()?.clone();
        let spec = RequestSpec::builder(Method::DELETE, url, "/?origin").build();
        self.dispatcher().send_discard(spec).await
    }
}
