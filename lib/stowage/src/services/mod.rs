//! Call sites built on the dispatcher.
//!
//! Each module adds inherent methods to [`CosClient`](crate::CosClient) and
//! defines the option and result types of its calls.

mod bucket_origin;
mod ci;

pub use bucket_origin::{
    HeaderList, OriginCondition, OriginConfiguration, OriginHeader, OriginHostInfo,
    OriginHttpHeader, OriginInfo, OriginParameter, OriginRule,
};
pub use ci::{
    CiBucket, CiBucketsResult, DescribeCiBucketsOptions, DocCompareOptions, DocCompareResult,
    IdCardAdvancedInfo, IdCardInfo, IdCardOcrConfig, IdCardOcrOptions, IdCardOcrResult,
    ImageAuditingOptions, ImageProcessOptions, ImageProcessResult, ImageRecognitionResult,
    ObjectGetOptions, ObjectPutOptions, PicImageInfo, PicOperations, PicOperationsRule,
    PicOriginalInfo, PicProcessObject, ProcessResults, RecognitionInfo,
};
