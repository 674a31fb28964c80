//! Cloud Infinite (media processing) call sites.
//!
//! Image processing, uploads with processing rules, processed downloads, ID-card
//! OCR, document comparison, image auditing and CI bucket listing.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    Body, BodyFormat, ByteSource, CosClient, Decodable, ErrorDecoder, Method, Options,
    ProgressListener, RequestSpec, Response, Result, Transport, encode_object_key,
};

// ============================================================================
// Options
// ============================================================================

/// Processing rules sent in the `Pic-Operations` header.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PicOperations {
    /// `1` to return the original image information.
    #[serde(skip_serializing_if = "is_zero")]
    pub is_pic_info: u8,
    /// One output per rule.
    pub rules: Vec<PicOperationsRule>,
}

/// One processing rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PicOperationsRule {
    /// Destination bucket, the source bucket when empty.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    /// Key of the processed object.
    #[serde(rename = "fileid")]
    pub file_id: String,
    /// Processing parameters, e.g. `imageMogr2/format/png`.
    pub rule: String,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_zero(value: &u8) -> bool {
    *value == 0
}

/// Options of [`CosClient::image_process`].
#[derive(Debug, Clone, Default, Options)]
pub struct ImageProcessOptions {
    /// Processing rules.
    #[wire(header = "Pic-Operations", json)]
    pub pic_operations: PicOperations,
}

/// Options of [`CosClient::put_object_with_processing`].
#[derive(Clone, Default, Options)]
pub struct ObjectPutOptions {
    /// MIME type of the object.
    #[wire(header = "Content-Type", omit_empty)]
    pub content_type: String,
    /// Rules applied to the uploaded image.
    #[wire(header = "Pic-Operations", json)]
    pub pic_operations: Option<PicOperations>,
    /// Bandwidth cap in bit/s.
    #[wire(header = "x-cos-traffic-limit", omit_empty)]
    pub traffic_limit: u64,
    /// Length of the source when it cannot be measured.
    #[wire(skip)]
    pub content_length: Option<u64>,
    /// Receives upload progress.
    #[wire(skip)]
    pub listener: Option<Arc<dyn ProgressListener>>,
}

/// Options of [`CosClient::get_processed_stream`].
#[derive(Clone, Default, Options)]
pub struct ObjectGetOptions {
    /// Overrides the `Content-Type` of the response.
    #[wire(query = "response-content-type", omit_empty)]
    pub response_content_type: String,
    /// Version to read, the latest when `None`.
    #[wire(query = "versionId")]
    pub version_id: Option<String>,
    /// Byte range, e.g. `bytes=0-1023`.
    #[wire(header = "Range", omit_empty)]
    pub range: String,
    /// Bandwidth cap in bit/s.
    #[wire(header = "x-cos-traffic-limit", omit_empty)]
    pub traffic_limit: u64,
    /// Receives download progress.
    #[wire(skip)]
    pub listener: Option<Arc<dyn ProgressListener>>,
}

/// Options of [`CosClient::id_card_ocr`].
#[derive(Debug, Clone, Default, Options)]
pub struct IdCardOcrOptions {
    /// `FRONT` or `BACK`, detected when empty.
    #[wire(query = "CardSide", omit_empty)]
    pub card_side: String,
    /// Extra checks, sent as one JSON query parameter.
    #[wire(query = "Config", json)]
    pub config: Option<IdCardOcrConfig>,
}

/// Optional ID-card checks and crops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
#[allow(clippy::struct_excessive_bools)]
pub struct IdCardOcrConfig {
    /// Return the cropped card.
    #[serde(skip_serializing_if = "is_false")]
    pub crop_id_card: bool,
    /// Return the cropped portrait.
    #[serde(skip_serializing_if = "is_false")]
    pub crop_portrait: bool,
    /// Warn on photocopies.
    #[serde(skip_serializing_if = "is_false")]
    pub copy_warn: bool,
    /// Warn on cut borders.
    #[serde(skip_serializing_if = "is_false")]
    pub border_check_warn: bool,
    /// Warn on screen reshoots.
    #[serde(skip_serializing_if = "is_false")]
    pub reshoot_warn: bool,
    /// Warn on edited images.
    #[serde(skip_serializing_if = "is_false")]
    pub detect_ps_warn: bool,
    /// Warn on temporary cards.
    #[serde(skip_serializing_if = "is_false")]
    pub temp_id_warn: bool,
    /// Warn on expired cards.
    #[serde(skip_serializing_if = "is_false")]
    pub invalid_date_warn: bool,
    /// Return an image quality score.
    #[serde(skip_serializing_if = "is_false")]
    pub quality: bool,
    /// Warn when several cards are present.
    #[serde(skip_serializing_if = "is_false")]
    pub multi_card_detect: bool,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

/// Options of [`CosClient::image_auditing`].
#[derive(Debug, Clone, Options)]
#[wire(rename_all = "kebab-case")]
pub struct ImageAuditingOptions {
    /// Always `sensitive-content-recognition` for this API.
    #[wire(omit_empty)]
    pub ci_process: String,
    /// Scenes to audit, e.g. `porn,ads`.
    #[wire(omit_empty)]
    pub detect_type: String,
    /// Audit this URL instead of the object.
    #[wire(omit_empty)]
    pub detect_url: String,
    /// Frame interval for animated images.
    #[wire(omit_empty)]
    pub interval: u32,
    /// Maximum number of frames audited.
    #[wire(omit_empty)]
    pub max_frames: u32,
    /// Auditing policy.
    #[wire(omit_empty)]
    pub biz_type: String,
    /// `1` to audit images above 32 MB.
    #[wire(omit_empty)]
    pub large_image_detect: u32,
    /// Caller data echoed in the result.
    #[wire(query = "dataid", omit_empty)]
    pub data_id: String,
    /// `1` for asynchronous auditing.
    #[wire(query = "async", omit_empty)]
    pub async_mode: u32,
    /// Callback URL of asynchronous auditing.
    #[wire(omit_empty)]
    pub callback: String,
}

impl Default for ImageAuditingOptions {
    fn default() -> Self {
        Self {
            ci_process: "sensitive-content-recognition".to_string(),
            detect_type: String::new(),
            detect_url: String::new(),
            interval: 0,
            max_frames: 0,
            biz_type: String::new(),
            large_image_detect: 0,
            data_id: String::new(),
            async_mode: 0,
            callback: String::new(),
        }
    }
}

/// Options of [`CosClient::doc_compare`].
#[derive(Debug, Clone, Default, Options)]
#[wire(rename_all = "camelCase")]
pub struct DocCompareOptions {
    /// Source document key.
    #[wire(omit_empty)]
    pub object: String,
    /// Key of the document compared with.
    #[wire(omit_empty)]
    pub compare_path: String,
    /// URL of the document compared with.
    #[wire(omit_empty)]
    pub compare_url: String,
    /// Source document type.
    #[wire(omit_empty)]
    pub src_type: String,
    /// Key of the result.
    #[wire(omit_empty)]
    pub tgt_uri: String,
}

/// Options of [`CosClient::describe_ci_buckets`].
#[derive(Debug, Clone, Default, Options)]
#[wire(rename_all = "camelCase")]
pub struct DescribeCiBucketsOptions {
    /// Bucket name filter.
    #[wire(omit_empty)]
    pub bucket_name: String,
    /// Tag filter.
    #[wire(omit_empty)]
    pub tag_key: String,
    /// Region filter.
    #[wire(omit_empty)]
    pub region: String,
    /// Page number, from 1.
    #[wire(omit_empty)]
    pub page_number: u32,
    /// Page size.
    #[wire(omit_empty)]
    pub page_size: u32,
}

// ============================================================================
// Results
// ============================================================================

/// Result of an image process or an upload with processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "UploadResult", rename_all = "PascalCase", default)]
pub struct ImageProcessResult {
    /// Source image, when `is_pic_info` was set.
    pub original_info: Option<PicOriginalInfo>,
    /// Processed outputs.
    pub process_results: Option<ProcessResults>,
}

impl Decodable for ImageProcessResult {}

/// Source image of a processing call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PicOriginalInfo {
    /// Object key.
    pub key: String,
    /// Object URL.
    pub location: String,
    /// Image properties.
    pub image_info: Option<PicImageInfo>,
    /// Entity tag.
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Image properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PicImageInfo {
    /// Image format, e.g. `png`.
    pub format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Encoding quality.
    pub quality: u32,
    /// Average color.
    pub ave: String,
    /// EXIF orientation.
    pub orientation: u32,
}

/// `<Object>` entries of `ProcessResults`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProcessResults {
    /// Outputs, one per rule.
    #[serde(rename = "Object", default)]
    pub objects: Vec<PicProcessObject>,
}

/// One processed output.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PicProcessObject {
    /// Object key of the output.
    pub key: String,
    /// Full location of the output.
    pub location: String,
    /// Image format.
    pub format: String,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Size in bytes.
    pub size: u64,
    /// Encoding quality.
    pub quality: u32,
    /// Entity tag.
    #[serde(rename = "ETag")]
    pub etag: String,
    /// Blind watermark status.
    pub watermark_status: u32,
    /// QR code detection status.
    pub code_status: u32,
    /// Frames of an animated image.
    pub frame_count: u32,
    /// MD5 of the output.
    pub md5: String,
    /// Bits per channel.
    pub bit_depth: u32,
}

/// Result of ID-card OCR.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "Response", rename_all = "PascalCase", default)]
pub struct IdCardOcrResult {
    /// Fields read from the card.
    pub id_info: Option<IdCardInfo>,
    /// Crops and warnings requested through [`IdCardOcrConfig`].
    pub advanced_info: Option<IdCardAdvancedInfo>,
}

impl Decodable for IdCardOcrResult {}

/// Fields read from an ID card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IdCardInfo {
    /// Holder name.
    pub name: String,
    /// Holder sex.
    pub sex: String,
    /// Ethnicity.
    pub nation: String,
    /// Date of birth.
    pub birth: String,
    /// Registered address.
    pub address: String,
    /// ID number.
    pub id_num: String,
    /// Issuing authority.
    pub authority: String,
    /// Validity period.
    pub valid_date: String,
}

/// Crops, quality and warnings of an ID card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct IdCardAdvancedInfo {
    /// Base64 card crop.
    pub id_card: String,
    /// Base64 portrait crop.
    pub portrait: String,
    /// Image quality score.
    pub quality: String,
    /// Border completeness score.
    pub border_code_value: String,
    /// Warning codes.
    pub warn_infos: Vec<String>,
}

/// Result of image auditing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "RecognitionResult", rename_all = "PascalCase", default)]
pub struct ImageRecognitionResult {
    /// Auditing job id.
    pub job_id: String,
    /// Job state, e.g. `Success`.
    pub state: String,
    /// Audited object key.
    pub object: String,
    /// Audited URL.
    pub url: String,
    /// Text found in the image.
    pub text: String,
    /// Top label.
    pub label: String,
    /// `0` normal, `1` blocked, `2` suspicious.
    pub result: u32,
    /// Confidence of the top label.
    pub score: u32,
    /// Category of the top label.
    pub category: String,
    /// Finer label.
    pub sub_label: String,
    /// Pornography scene verdict.
    pub porn_info: Option<RecognitionInfo>,
    /// Terrorism scene verdict.
    pub terrorism_info: Option<RecognitionInfo>,
    /// Politics scene verdict.
    pub politics_info: Option<RecognitionInfo>,
    /// Advertising scene verdict.
    pub ads_info: Option<RecognitionInfo>,
    /// Minor-protection scene verdict.
    pub teenager_info: Option<RecognitionInfo>,
    /// Whether the image was compressed before auditing.
    pub compression_result: u32,
    /// Caller-supplied id echoed back.
    pub data_id: String,
}

impl Decodable for ImageRecognitionResult {}

/// Verdict of one auditing scene.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RecognitionInfo {
    /// Scene status code, `0` on success.
    pub code: i32,
    /// Scene status message.
    pub msg: String,
    /// `1` when the scene matched.
    pub hit_flag: u32,
    /// Confidence, 0 to 100.
    pub score: u32,
    /// Matched label.
    pub label: String,
    /// Hits in the scene.
    pub count: u32,
    /// Matched category.
    pub category: String,
    /// Finer label.
    pub sub_label: String,
}

/// Result of a document comparison.
///
/// The service answers in JSON (camel-case keys) or XML (`<Response>`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "Response", default)]
pub struct DocCompareResult {
    /// Result code.
    #[serde(rename = "Code", alias = "code")]
    pub code: String,
    /// Entity tag of the report.
    #[serde(rename = "ETag", alias = "eTag")]
    pub etag: String,
    /// Result message.
    #[serde(rename = "Msg", alias = "msg")]
    pub msg: String,
    /// Key of the comparison report.
    #[serde(rename = "ResultPath", alias = "resultPath")]
    pub result_path: String,
}

impl Decodable for DocCompareResult {
    const FORMAT: BodyFormat = BodyFormat::JsonOrXml;
}

/// Page of CI-enabled buckets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename = "Response", rename_all = "PascalCase", default)]
pub struct CiBucketsResult {
    /// Request id.
    pub request_id: String,
    /// Buckets in all pages.
    pub total_count: String,
    /// Current page.
    pub page_number: String,
    /// Entries per page.
    pub page_size: String,
    /// Buckets of this page.
    #[serde(rename = "CIBucketList")]
    pub buckets: Vec<CiBucket>,
}

impl Decodable for CiBucketsResult {}

/// A CI-enabled bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CiBucket {
    /// Bucket id, with the app id suffix.
    pub bucket_id: String,
    /// Bucket name.
    pub bucket_name: String,
    /// Owner app id.
    pub app_id: String,
    /// Creation time.
    pub create_time: String,
    /// Bucket region.
    pub region: String,
    /// CI binding status.
    pub status: String,
}

// ============================================================================
// Call sites
// ============================================================================

fn object_uri(key: &str) -> String {
    format!("/{}", encode_object_key(key))
}

impl<T, D> CosClient<T, D>
where
    T: Transport,
    D: ErrorDecoder,
{
    /// Apply processing rules to a stored image.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn image_process(
        &self,
        key: &str,
        options: &ImageProcessOptions,
    ) -> Result<Response<ImageProcessResult>> {
        let spec = RequestSpec::builder(
            Method::POST,
            self.base_url().bucket_url()?.clone(),
            format!("{}?image_process", object_uri(key)),
        )
        .header_options(options)?
        .build();
        self.dispatcher().send(spec).await
    }

    /// Upload an object and apply processing rules to it.
    ///
    /// The body is streamed from `source`. Progress goes to the listener of
    /// `options`; the CRC64 of the bytes sent is checked against the service's
    /// when enabled in the dispatch configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set, the length of the
    /// source cannot be resolved, or the call fails.
    pub async fn put_object_with_processing(
        &self,
        key: &str,
        source: impl Into<ByteSource>,
        options: &ObjectPutOptions,
    ) -> Result<Response<ImageProcessResult>> {
        let url = self.base_url().bucket_url()?.clone();
        let mut builder = RequestSpec::builder(Method::PUT, url, object_uri(key))
            .header_options(options)?
            .stream(source);
        if let Some(len) = options.content_length {
            builder = builder.content_length(len);
        }
        if let Some(listener) = &options.listener {
            builder = builder.listener(Arc::clone(listener));
        }
        self.dispatcher().send(builder.build()).await
    }

    /// Upload a local file and apply processing rules to it.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened, or as
    /// [`Self::put_object_with_processing`].
    pub async fn put_file_with_processing(
        &self,
        key: &str,
        path: impl AsRef<Path>,
        options: &ObjectPutOptions,
    ) -> Result<Response<ImageProcessResult>> {
        let file = tokio::fs::File::open(path).await?;
        self.put_object_with_processing(key, file, options).await
    }

    /// Download an object processed on the fly by `operation`
    /// (e.g. `imageMogr2/thumbnail/!50p`).
    ///
    /// The body is returned unread; progress goes to the listener of `options`
    /// as it is consumed.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn get_processed_stream(
        &self,
        key: &str,
        operation: &str,
        options: &ObjectGetOptions,
    ) -> Result<Response<Body>> {
        let mut builder = RequestSpec::builder(
            Method::GET,
            self.base_url().bucket_url()?.clone(),
            format!("{}?{}", object_uri(key), encode_object_key(operation)),
        )
        .options(options)?;
        if let Some(listener) = &options.listener {
            builder = builder.listener(Arc::clone(listener));
        }
        self.dispatcher().send_streaming(builder.build()).await
    }

    /// Read an ID card stored as `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn id_card_ocr(
        &self,
        key: &str,
        options: &IdCardOcrOptions,
    ) -> Result<Response<IdCardOcrResult>> {
        let spec = RequestSpec::builder(
            Method::GET,
            self.base_url().bucket_url()?.clone(),
            format!("{}?ci-process=IDCardOCR", object_uri(key)),
        )
        .query_options(options)?
        .build();
        self.dispatcher().send(spec).await
    }

    /// Compare two documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn doc_compare(
        &self,
        options: &DocCompareOptions,
    ) -> Result<Response<DocCompareResult>> {
        let url = self.base_url().bucket_url()?.clone();
        let spec = RequestSpec::builder(Method::GET, url, "/doccompare")
            .query_options(options)?
            .build();
        self.dispatcher().send(spec).await
    }

    /// Audit a stored image (or a remote one through `detect_url`).
    ///
    /// # Errors
    ///
    /// Returns an error if the bucket endpoint is not set or the call fails.
    pub async fn image_auditing(
        &self,
        key: &str,
        options: &ImageAuditingOptions,
    ) -> Result<Response<ImageRecognitionResult>> {
        let url = self.base_url().bucket_url()?.clone();
        let spec = RequestSpec::builder(Method::GET, url, object_uri(key))
            .query_options(options)?
            .build();
        self.dispatcher().send(spec).await
    }

    /// List the buckets with CI enabled.
    ///
    /// # Errors
    ///
    /// Returns an error if the CI endpoint is not set or the call fails.
    pub async fn describe_ci_buckets(
        &self,
        options: &DescribeCiBucketsOptions,
    ) -> Result<Response<CiBucketsResult>> {
        let url = self.base_url().ci_url()?.clone();
        let spec = RequestSpec::builder(Method::GET, url, "/cibuckets")
            .query_options(options)?
            .build();
        self.dispatcher().send(spec).await
    }
}
