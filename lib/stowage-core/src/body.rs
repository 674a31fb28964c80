//! Body serialization utilities.
//!
//! Request payloads are XML for most endpoints and JSON for a few processing
//! endpoints. Response bodies are decoded into types implementing [`Decodable`],
//! which names the format(s) to try.

use bytes::Bytes;
use derive_more::Display;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Error, Result};

/// Content type for request bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    /// XML content type (`application/xml`).
    Xml,
    /// JSON content type (`application/json`).
    Json,
    /// Binary content type (`application/octet-stream`).
    OctetStream,
}

impl ContentKind {
    /// Get the MIME type string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Xml => "application/xml",
            Self::Json => "application/json",
            Self::OctetStream => "application/octet-stream",
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoding strategy for a response body.
///
/// The two-format variants are ordered one-of decoders: the first format is
/// attempted, the second only if the first fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum BodyFormat {
    /// XML document.
    #[display("XML")]
    Xml,
    /// JSON document.
    #[display("JSON")]
    Json,
    /// JSON first, XML on failure.
    #[display("JSON or XML")]
    JsonOrXml,
    /// XML first, JSON on failure.
    #[display("XML or JSON")]
    XmlOrJson,
}

/// A result type that can be decoded from a response body.
///
/// `Default` provides the zero value returned for an empty body.
///
/// # Example
///
/// ```
/// use serde::Deserialize;
/// use stowage_core::{BodyFormat, Decodable};
///
/// #[derive(Debug, Default, Deserialize)]
/// struct CompareResult {
///     #[serde(rename = "Code", alias = "code", default)]
///     code: String,
/// }
///
/// impl Decodable for CompareResult {
///     const FORMAT: BodyFormat = BodyFormat::JsonOrXml;
/// }
/// ```
pub trait Decodable: DeserializeOwned + Default {
    /// Format(s) the body is decoded with.
    const FORMAT: BodyFormat = BodyFormat::Xml;
}

/// Serialize a value to XML bytes.
///
/// The root element is the serde name of the type (use `#[serde(rename = "...")]`).
///
/// # Errors
///
/// Returns [`Error::XmlSerialization`] if serialization fails.
///
/// # Example
///
/// ```
/// use serde::Serialize;
/// use stowage_core::to_xml;
///
/// #[derive(Serialize)]
/// #[serde(rename = "Tagging")]
/// struct Tagging {
///     #[serde(rename = "Key")]
///     key: String,
/// }
///
/// let bytes = to_xml(&Tagging { key: "env".to_string() }).expect("serialize");
/// assert_eq!(bytes.as_ref(), b"<Tagging><Key>env</Key></Tagging>");
/// ```
pub fn to_xml<T: Serialize>(value: &T) -> Result<Bytes> {
    quick_xml::se::to_string(value)
        .map(|s| Bytes::from(s.into_bytes()))
        .map_err(|e| Error::XmlSerialization(e.to_string()))
}

/// Serialize a value to JSON bytes.
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<Bytes> {
    serde_json::to_vec(value)
        .map(Bytes::from)
        .map_err(Into::into)
}

/// Deserialize an XML document.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body is not an XML document of the
/// expected shape.
pub fn from_xml<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if first_significant_byte(bytes) != Some(b'<') {
        return Err(Error::decode(BodyFormat::Xml, "body is not an XML document"));
    }
    let text = std::str::from_utf8(bytes)
        .map_err(|e| Error::decode(BodyFormat::Xml, e.to_string()))?;
    quick_xml::de::from_str(text).map_err(|e| Error::decode(BodyFormat::Xml, e.to_string()))
}

/// Deserialize a JSON document with path-aware error messages.
///
/// Uses `serde_path_to_error` so that the message names the failing field
/// (e.g. `Response.PageInfo[2].PageNo`).
///
/// # Errors
///
/// Returns [`Error::Decode`] if deserialization fails.
pub fn from_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    if !matches!(first_significant_byte(bytes), Some(b'{' | b'[')) {
        return Err(Error::decode(
            BodyFormat::Json,
            "body is not a JSON document",
        ));
    }
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|e| {
        let path = e.path().to_string();
        let message = if path == "." {
            e.inner().to_string()
        } else {
            format!("at '{path}': {}", e.inner())
        };
        Error::decode(BodyFormat::Json, message)
    })
}

/// Decode a response body into a [`Decodable`] result.
///
/// An empty (or whitespace-only) body decodes to `T::default()`.
///
/// # Errors
///
/// Returns [`Error::Decode`] if the body matches none of `T::FORMAT`.
pub fn decode_body<T: Decodable>(bytes: &[u8]) -> Result<T> {
    if is_blank(bytes) {
        return Ok(T::default());
    }
    decode_with(T::FORMAT, bytes)
}

/// Decode a non-empty body with an explicit strategy.
///
/// # Errors
///
/// Returns [`Error::Decode`] if every format of the strategy fails; for the
/// two-format strategies the message carries both failures.
pub fn decode_with<T: DeserializeOwned>(format: BodyFormat, bytes: &[u8]) -> Result<T> {
    match format {
        BodyFormat::Xml => from_xml(bytes),
        BodyFormat::Json => from_json(bytes),
        BodyFormat::JsonOrXml => one_of(format, from_json, from_xml, bytes),
        BodyFormat::XmlOrJson => one_of(format, from_xml, from_json, bytes),
    }
}

fn one_of<T>(
    format: BodyFormat,
    first: fn(&[u8]) -> Result<T>,
    second: fn(&[u8]) -> Result<T>,
    bytes: &[u8],
) -> Result<T> {
    let first_err = match first(bytes) {
        Ok(value) => return Ok(value),
        Err(err) => err,
    };
    second(bytes).map_err(|second_err| {
        Error::decode(
            format,
            format!("{}; {}", decode_message(&first_err), decode_message(&second_err)),
        )
    })
}

fn decode_message(err: &Error) -> String {
    match err {
        Error::Decode {
            format, message, ..
        } => format!("{format}: {message}"),
        other => other.to_string(),
    }
}

/// Returns `true` if the body has no significant content.
pub(crate) fn is_blank(bytes: &[u8]) -> bool {
    first_significant_byte(bytes).is_none()
}

fn first_significant_byte(bytes: &[u8]) -> Option<u8> {
    bytes.iter().copied().find(|b| !b.is_ascii_whitespace())
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    #[serde(rename = "Response")]
    struct CompareResult {
        #[serde(rename = "Code", alias = "code", default)]
        code: String,
        #[serde(rename = "ETag", alias = "eTag", default)]
        etag: String,
        #[serde(rename = "Msg", alias = "msg", default)]
        msg: String,
    }

    impl Decodable for CompareResult {
        const FORMAT: BodyFormat = BodyFormat::JsonOrXml;
    }

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct GuetzliResult {
        #[serde(rename = "GuetzliStatus", default)]
        status: String,
    }

    impl Decodable for GuetzliResult {}

    #[test]
    fn content_kind_as_str() {
        assert_eq!(ContentKind::Xml.as_str(), "application/xml");
        assert_eq!(ContentKind::Json.as_str(), "application/json");
        assert_eq!(ContentKind::OctetStream.to_string(), "application/octet-stream");
    }

    #[test]
    fn xml_serialize_uses_type_name_as_root() {
        let value = CompareResult {
            code: "Success".to_string(),
            etag: "\"abc\"".to_string(),
            msg: String::new(),
        };
        let bytes = to_xml(&value).expect("serialize");
        let text = String::from_utf8(bytes.to_vec()).expect("utf8");
        assert!(text.starts_with("<Response>"), "{text}");
        assert!(text.contains("<Code>Success</Code>"), "{text}");
    }

    #[test]
    fn empty_body_is_zero_value() {
        let result: GuetzliResult = decode_body(b"").expect("empty body");
        assert_eq!(result, GuetzliResult::default());

        let result: GuetzliResult = decode_body(b"  \n\t").expect("blank body");
        assert_eq!(result, GuetzliResult::default());
    }

    #[test]
    fn xml_body_decodes() {
        let result: GuetzliResult =
            decode_body(b"<GuetzliStatus><GuetzliStatus>on</GuetzliStatus></GuetzliStatus>")
                .expect("xml");
        assert_eq!(result.status, "on");
    }

    #[test]
    fn dual_format_prefers_json() {
        let result: CompareResult =
            decode_body(br#"{"code":"Success","eTag":"e1","msg":"ok"}"#).expect("json");
        assert_eq!(result.code, "Success");
        assert_eq!(result.etag, "e1");
        assert_eq!(result.msg, "ok");
    }

    #[test]
    fn dual_format_falls_back_to_xml() {
        let result: CompareResult = decode_body(
            b"<Response><Code>Success</Code><ETag>e2</ETag><Msg>done</Msg></Response>",
        )
        .expect("xml fallback");
        assert_eq!(result.code, "Success");
        assert_eq!(result.etag, "e2");
        assert_eq!(result.msg, "done");
    }

    #[test]
    fn dual_format_reports_both_failures() {
        let err = decode_body::<CompareResult>(b"definitely not a document")
            .expect_err("neither format");
        let Error::Decode {
            format, message, ..
        } = err
        else {
            panic!("expected decode error, got {err:?}");
        };
        assert_eq!(format, BodyFormat::JsonOrXml);
        assert!(message.contains("JSON"), "{message}");
        assert!(message.contains("XML"), "{message}");
    }

    #[test]
    fn json_error_names_the_path() {
        #[derive(Debug, Deserialize)]
        struct Page {
            #[allow(dead_code)]
            #[serde(rename = "PageNo")]
            page_no: u32,
        }

        #[derive(Debug, Deserialize)]
        struct Pages {
            #[allow(dead_code)]
            #[serde(rename = "PageInfo")]
            pages: Vec<Page>,
        }

        let err = from_json::<Pages>(br#"{"PageInfo":[{"PageNo":1},{"PageNo":"two"}]}"#)
            .expect_err("type mismatch");
        let msg = err.to_string();
        assert!(msg.contains("PageInfo[1].PageNo"), "{msg}");
    }

    #[test]
    fn xml_rejects_non_xml() {
        let err = from_xml::<GuetzliResult>(br#"{"GuetzliStatus":"on"}"#).expect_err("json");
        assert!(err.is_decode());
    }
}
