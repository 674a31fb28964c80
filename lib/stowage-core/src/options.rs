//! Options encoding.
//!
//! An options value is a plain struct describing one call. Each field is routed
//! to a destination (query string, header or body) by the `#[derive(Options)]`
//! macro, which generates an [`EncodeOptions`] implementation. Per-field value
//! encoding goes through [`WireValue`], so a field type may serialize itself
//! differently (see [`Json`]).

use std::collections::BTreeMap;
use std::collections::btree_map;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::request::Payload;
use crate::{Error, Result};

// ============================================================================
// Parameter map
// ============================================================================

/// Multimap of wire parameter names to values, ordered by name.
///
/// Used for both query parameters and headers before they reach the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParamMap(BTreeMap<String, Vec<String>>);

impl ParamMap {
    /// Create an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, keeping the values already present under `name`.
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.entry(name.into()).or_default().push(value.into());
    }

    /// Set the single value of `name`, replacing previous values.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.insert(name.into(), vec![value.into()]);
    }

    /// First value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All values of `name`.
    #[must_use]
    pub fn get_all(&self, name: &str) -> &[String] {
        self.0.get(name).map_or(&[], Vec::as_slice)
    }

    /// Remove `name` and return its values.
    pub fn remove(&mut self, name: &str) -> Option<Vec<String>> {
        self.0.remove(name)
    }

    /// Returns `true` if `name` is present.
    #[must_use]
    pub fn contains_key(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    /// Returns `true` if `name` is present, ignoring ASCII case.
    #[must_use]
    pub fn contains_key_ignore_case(&self, name: &str) -> bool {
        self.0.keys().any(|key| key.eq_ignore_ascii_case(name))
    }

    /// Iterate over `(name, values)` in name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Vec<String>> {
        self.0.iter()
    }

    /// Iterate over flattened `(name, value)` pairs in name order.
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0
            .iter()
            .flat_map(|(name, values)| values.iter().map(move |v| (name.as_str(), v.as_str())))
    }

    /// Number of distinct names.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map holds no name.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encode as an `application/x-www-form-urlencoded` query string.
    #[must_use]
    pub fn to_query_string(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.pairs())
            .finish()
    }
}

impl Extend<(String, String)> for ParamMap {
    fn extend<I: IntoIterator<Item = (String, String)>>(&mut self, iter: I) {
        for (name, value) in iter {
            self.append(name, value);
        }
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (name, value) in iter {
            map.append(name, value);
        }
        map
    }
}

impl<'a> IntoIterator for &'a ParamMap {
    type Item = (&'a String, &'a Vec<String>);
    type IntoIter = btree_map::Iter<'a, String, Vec<String>>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Field values
// ============================================================================

/// Encoding of one option field into wire parameters.
///
/// Implement this for a field type that needs its own wire representation.
pub trait WireValue {
    /// Write this value under `name`. Writing nothing means "absent".
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if the value cannot be serialized.
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()>;

    /// Returns `true` for the zero value, skipped by `omit_empty` fields.
    fn is_zero(&self) -> bool {
        false
    }
}

impl<T: WireValue + ?Sized> WireValue for &T {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        (**self).encode_value(name, out)
    }

    fn is_zero(&self) -> bool {
        (**self).is_zero()
    }
}

impl WireValue for str {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        out.append(name, self);
        Ok(())
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl WireValue for String {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        self.as_str().encode_value(name, out)
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

impl WireValue for bool {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        out.append(name, if *self { "true" } else { "false" });
        Ok(())
    }

    fn is_zero(&self) -> bool {
        !*self
    }
}

macro_rules! impl_wire_value_for_number {
    ($($ty:ty),* $(,)?) => {
        $(
            impl WireValue for $ty {
                fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
                    out.append(name, self.to_string());
                    Ok(())
                }

                #[allow(clippy::float_cmp)]
                fn is_zero(&self) -> bool {
                    *self == (0 as $ty)
                }
            }
        )*
    };
}

impl_wire_value_for_number!(u8, u16, u32, u64, usize, i8, i16, i32, i64, isize, f32, f64);

/// `None` is absent; `Some(v)` is always transmitted, even when `v` is zero.
impl<T: WireValue> WireValue for Option<T> {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        match self {
            Some(value) => value.encode_value(name, out),
            None => Ok(()),
        }
    }

    fn is_zero(&self) -> bool {
        self.is_none()
    }
}

/// Each element becomes one value under the same name.
impl<T: WireValue> WireValue for Vec<T> {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        self.iter().try_for_each(|value| value.encode_value(name, out))
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }
}

/// A field value transmitted as one JSON document.
///
/// # Example
///
/// ```
/// use serde::Serialize;
/// use stowage_core::{Json, ParamMap, WireValue};
///
/// #[derive(Serialize)]
/// struct Config {
///     #[serde(rename = "CropIdCard")]
///     crop_id_card: bool,
/// }
///
/// let mut out = ParamMap::new();
/// Json(Config { crop_id_card: true })
///     .encode_value("Config", &mut out)
///     .expect("encode");
/// assert_eq!(out.get("Config"), Some(r#"{"CropIdCard":true}"#));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Json<T>(pub T);

impl<T: DeserializeOwned> Json<T> {
    /// Decode a JSON parameter value.
    ///
    /// # Errors
    ///
    /// Returns an error if `value` is not valid JSON for `T`.
    pub fn decode(value: &str) -> Result<Self> {
        serde_json::from_str(value).map(Json).map_err(Error::from)
    }
}

impl<T: Serialize> WireValue for Json<T> {
    fn encode_value(&self, name: &str, out: &mut ParamMap) -> Result<()> {
        let value = serde_json::to_string(&self.0)
            .map_err(|e| Error::configuration(format!("cannot encode `{name}` as JSON: {e}")))?;
        out.append(name, value);
        Ok(())
    }
}

// ============================================================================
// Options
// ============================================================================

/// Encoding of an options value into query parameters, headers and body.
///
/// Usually derived with `#[derive(Options)]`.
///
/// # Example
///
/// ```ignore
/// use stowage::Options;
///
/// #[derive(Options)]
/// #[wire(rename_all = "kebab-case")]
/// struct ImageRecognitionOptions {
///     #[wire(query = "ci-process")]
///     ci_process: String,
///     detect_type: String,
///     #[wire(omit_empty)]
///     biz_type: String,
///     #[wire(header = "x-cos-traffic-limit", omit_empty)]
///     traffic_limit: u64,
/// }
/// ```
pub trait EncodeOptions {
    /// Write the query parameters of this value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a field cannot be encoded.
    fn encode_query(&self, out: &mut ParamMap) -> Result<()> {
        let _ = out;
        Ok(())
    }

    /// Write the headers of this value.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] if a field cannot be encoded.
    fn encode_headers(&self, out: &mut ParamMap) -> Result<()> {
        let _ = out;
        Ok(())
    }

    /// Build the request body carried by this value, if any.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the body cannot be encoded.
    fn encode_body(&self) -> Result<Option<Payload>> {
        Ok(None)
    }
}

impl EncodeOptions for () {}

impl<T: EncodeOptions + ?Sized> EncodeOptions for &T {
    fn encode_query(&self, out: &mut ParamMap) -> Result<()> {
        (**self).encode_query(out)
    }

    fn encode_headers(&self, out: &mut ParamMap) -> Result<()> {
        (**self).encode_headers(out)
    }

    fn encode_body(&self) -> Result<Option<Payload>> {
        (**self).encode_body()
    }
}

impl<T: EncodeOptions> EncodeOptions for Option<T> {
    fn encode_query(&self, out: &mut ParamMap) -> Result<()> {
        self.as_ref().map_or(Ok(()), |value| value.encode_query(out))
    }

    fn encode_headers(&self, out: &mut ParamMap) -> Result<()> {
        self.as_ref().map_or(Ok(()), |value| value.encode_headers(out))
    }

    fn encode_body(&self) -> Result<Option<Payload>> {
        self.as_ref().map_or(Ok(None), EncodeOptions::encode_body)
    }
}

// ============================================================================
// Object keys
// ============================================================================

/// Characters left as-is in an object key path.
const OBJECT_KEY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')')
    .remove(b'/');

/// Percent-encode an object key for use in a request path.
///
/// ```
/// use stowage_core::encode_object_key;
///
/// assert_eq!(encode_object_key("dir/a b+c.jpg"), "dir/a%20b%2Bc.jpg");
/// ```
#[must_use]
pub fn encode_object_key(key: &str) -> String {
    utf8_percent_encode(key, OBJECT_KEY).to_string()
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct OcrConfig {
        #[serde(rename = "CropPortrait")]
        crop_portrait: bool,
        #[serde(rename = "CopyWarn")]
        copy_warn: bool,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PicOperations {
        is_pic_info: u8,
        rules: Vec<PicRule>,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct PicRule {
        fileid: String,
        rule: String,
    }

    fn reencode_header(raw: &str) -> Option<String> {
        let Json(decoded) = Json::<PicOperations>::decode(raw).expect("decode");
        let mut out = ParamMap::new();
        Json(decoded).encode_value("Pic-Operations", &mut out).expect("encode");
        out.get("Pic-Operations").map(str::to_string)
    }

    struct AuditOptions {
        detect_type: String,
        biz_type: String,
        interval: Option<u32>,
        large_image: Option<bool>,
        traffic_limit: u64,
    }

    impl EncodeOptions for AuditOptions {
        fn encode_query(&self, out: &mut ParamMap) -> Result<()> {
            self.detect_type.encode_value("detect-type", out)?;
            if !self.biz_type.is_zero() {
                self.biz_type.encode_value("biz-type", out)?;
            }
            self.interval.encode_value("interval", out)?;
            self.large_image.encode_value("large-image-detect", out)?;
            Ok(())
        }

        fn encode_headers(&self, out: &mut ParamMap) -> Result<()> {
            if !self.traffic_limit.is_zero() {
                self.traffic_limit.encode_value("x-cos-traffic-limit", out)?;
            }
            Ok(())
        }
    }

    #[test]
    fn param_map_multimap_operations() {
        let mut map = ParamMap::new();
        map.append("tag", "a");
        map.append("tag", "b");
        map.insert("prefix", "img/");

        assert_eq!(map.get("tag"), Some("a"));
        assert_eq!(map.get_all("tag"), ["a".to_string(), "b".to_string()]);
        assert_eq!(map.len(), 2);
        assert!(map.contains_key_ignore_case("PREFIX"));
        assert!(!map.contains_key("PREFIX"));

        map.insert("tag", "c");
        assert_eq!(map.get_all("tag"), ["c".to_string()]);

        assert_eq!(map.remove("prefix"), Some(vec!["img/".to_string()]));
        assert_eq!(map.get_all("prefix"), &[] as &[String]);
    }

    #[test]
    fn query_string_is_sorted_and_escaped() {
        let map: ParamMap = [("q", "a b&c"), ("ci-process", "AIPicMatting"), ("q", "2")]
            .into_iter()
            .collect();
        assert_eq!(
            map.to_query_string(),
            "ci-process=AIPicMatting&q=a+b%26c&q=2"
        );
    }

    #[test]
    fn optional_values_are_tri_state() {
        let options = AuditOptions {
            detect_type: "porn".to_string(),
            biz_type: String::new(),
            interval: None,
            large_image: Some(false),
            traffic_limit: 0,
        };

        let mut query = ParamMap::new();
        options.encode_query(&mut query).expect("encode query");
        assert_eq!(query.get("detect-type"), Some("porn"));
        assert!(!query.contains_key("biz-type"));
        assert!(!query.contains_key("interval"));
        assert_eq!(query.get("large-image-detect"), Some("false"));

        let mut headers = ParamMap::new();
        options.encode_headers(&mut headers).expect("encode headers");
        assert!(headers.is_empty());
    }

    #[test]
    fn zero_option_value_is_still_sent() {
        let mut out = ParamMap::new();
        Some(0_u32).encode_value("interval", &mut out).expect("encode");
        assert_eq!(out.get("interval"), Some("0"));
    }

    #[test]
    fn vec_values_repeat_the_name() {
        let mut out = ParamMap::new();
        vec!["a", "b"].encode_value("key", &mut out).expect("encode");
        assert_eq!(out.get_all("key"), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn json_value_round_trips() {
        let config = OcrConfig {
            crop_portrait: true,
            copy_warn: false,
        };
        let mut out = ParamMap::new();
        Json(&config).encode_value("Config", &mut out).expect("encode");

        let raw = out.get("Config").expect("present");
        let Json(decoded) = Json::<OcrConfig>::decode(raw).expect("decode");
        assert_eq!(decoded, config);
    }

    #[test]
    fn pic_operations_header_survives_decode_and_encode() {
        let raw = r#"{"is_pic_info":1,"rules":[{"fileid":"format.png","rule":"imageView2/format/png"}]}"#;
        assert_eq!(reencode_header(raw).as_deref(), Some(raw));
    }

    #[test]
    fn json_failure_is_a_configuration_error() {
        let mut bad = std::collections::HashMap::new();
        bad.insert(vec![1_u8], "non-string keys are not JSON");

        let mut out = ParamMap::new();
        let err = Json(bad).encode_value("Config", &mut out).expect_err("invalid");
        assert!(err.is_configuration());
        assert!(out.is_empty());
    }

    #[test]
    fn option_wrappers_forward() {
        let options: Option<AuditOptions> = None;
        let mut out = ParamMap::new();
        options.encode_query(&mut out).expect("none");
        assert!(out.is_empty());
        assert!(().encode_body().expect("unit").is_none());
    }

    #[test]
    fn object_key_encoding() {
        assert_eq!(encode_object_key("exampleobject"), "exampleobject");
        assert_eq!(encode_object_key("a/b/c (1).txt"), "a/b/c%20(1).txt");
        assert_eq!(encode_object_key("中文.jpg"), "%E4%B8%AD%E6%96%87.jpg");
        assert_eq!(encode_object_key("a?b#c"), "a%3Fb%23c");
    }

    proptest! {
        #[test]
        fn encoding_is_deterministic(
            detect_type in "[a-z,]{0,12}",
            biz_type in "[a-zA-Z0-9]{0,8}",
            interval in proptest::option::of(0_u32..100),
            large_image in proptest::option::of(any::<bool>()),
            traffic_limit in 0_u64..1_000_000,
        ) {
            let options = AuditOptions {
                detect_type,
                biz_type,
                interval,
                large_image,
                traffic_limit,
            };

            let mut first = ParamMap::new();
            let mut second = ParamMap::new();
            options.encode_query(&mut first).expect("encode");
            options.encode_query(&mut second).expect("encode");
            prop_assert_eq!(first.to_query_string(), second.to_query_string());

            let mut first = ParamMap::new();
            let mut second = ParamMap::new();
            options.encode_headers(&mut first).expect("encode");
            options.encode_headers(&mut second).expect("encode");
            prop_assert_eq!(first, second);
        }

        #[test]
        fn json_header_encodes_back_to_its_source(
            is_pic_info in 0_u8..2,
            rules in proptest::collection::vec(("[a-z0-9/._-]{1,16}", "[a-zA-Z0-9/!_]{1,24}"), 0..4),
        ) {
            let operations = PicOperations {
                is_pic_info,
                rules: rules
                    .into_iter()
                    .map(|(fileid, rule)| PicRule { fileid, rule })
                    .collect(),
            };
            let raw = serde_json::to_string(&operations).expect("serialize");
            prop_assert_eq!(reencode_header(&raw), Some(raw));
        }
    }
}
