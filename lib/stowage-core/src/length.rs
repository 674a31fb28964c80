//! Upload sources and content-length resolution.

use std::io::SeekFrom;

use bytes::Bytes;
use futures_util::{StreamExt, stream};
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncSeekExt};

use crate::entity::BodyStream;
use crate::transfer::ReaderChunks;
use crate::{Error, Result};

/// Size of a request or response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentLength {
    /// Exact number of bytes.
    Known(u64),
    /// Size not known in advance.
    Unknown,
}

impl ContentLength {
    /// The size, if known.
    #[must_use]
    pub const fn known(self) -> Option<u64> {
        match self {
            Self::Known(len) => Some(len),
            Self::Unknown => None,
        }
    }
}

impl From<Option<u64>> for ContentLength {
    fn from(value: Option<u64>) -> Self {
        value.map_or(Self::Unknown, Self::Known)
    }
}

/// Resolve the size to announce for an upload.
///
/// In order of preference:
/// 1. the exact size computed from the source,
/// 2. the length declared by the caller,
/// 3. unknown, unless a progress listener needs a total.
///
/// # Errors
///
/// Returns [`Error::Configuration`] if a listener is attached and no size can be
/// determined.
pub fn resolve_content_length(
    exact: Option<u64>,
    declared: Option<u64>,
    wants_progress: bool,
) -> Result<ContentLength> {
    match (exact, declared) {
        (Some(exact), Some(declared)) if exact != declared => {
            tracing::warn!(
                exact,
                declared,
                "declared content length differs from the source size, using the source size"
            );
            Ok(ContentLength::Known(exact))
        }
        (Some(len), _) | (None, Some(len)) => Ok(ContentLength::Known(len)),
        (None, None) if wants_progress => Err(Error::configuration(
            "a progress listener requires a content length: the source size is unknown and none was declared",
        )),
        (None, None) => Ok(ContentLength::Unknown),
    }
}

// ============================================================================
// Byte source
// ============================================================================

enum Source {
    Buffer(Bytes),
    File(File),
    Reader {
        reader: Box<dyn AsyncRead + Send + Unpin>,
        len: Option<u64>,
    },
}

/// Sequential source of upload bytes.
///
/// ```
/// use stowage_core::ByteSource;
///
/// let source = ByteSource::from("hello");
/// # let _ = source;
/// ```
pub struct ByteSource(Source);

impl ByteSource {
    /// In-memory bytes.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self(Source::Buffer(bytes.into()))
    }

    /// An open file, read from its current position.
    #[must_use]
    pub fn from_file(file: File) -> Self {
        Self(Source::File(file))
    }

    /// A reader of unknown size.
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self(Source::Reader {
            reader: Box::new(reader),
            len: None,
        })
    }

    /// A reader the caller asserts yields exactly `len` bytes.
    pub fn from_reader_with_len(reader: impl AsyncRead + Send + Unpin + 'static, len: u64) -> Self {
        Self(Source::Reader {
            reader: Box::new(reader),
            len: Some(len),
        })
    }

    /// Number of bytes left in the source, when it can be computed without
    /// reading it.
    ///
    /// Regular files report their size minus the current position; pipes and
    /// other special files report `None`.
    pub async fn exact_len(&mut self) -> Option<u64> {
        match &mut self.0 {
            Source::Buffer(bytes) => Some(bytes.len() as u64),
            Source::Reader { len, .. } => *len,
            Source::File(file) => {
                let metadata = match file.metadata().await {
                    Ok(metadata) => metadata,
                    Err(err) => {
                        tracing::warn!(error = %err, "cannot read upload file metadata");
                        return None;
                    }
                };
                if !metadata.is_file() {
                    return None;
                }
                match file.seek(SeekFrom::Current(0)).await {
                    Ok(position) => Some(metadata.len().saturating_sub(position)),
                    Err(err) => {
                        tracing::warn!(error = %err, "cannot read upload file position");
                        None
                    }
                }
            }
        }
    }

    /// Turn the source into a stream of chunks of at most `chunk_size` bytes.
    #[must_use]
    pub fn into_stream(self, chunk_size: usize) -> BodyStream {
        match self.0 {
            Source::Buffer(bytes) => {
                let chunk_size = chunk_size.max(1);
                let chunks = (0..bytes.len())
                    .step_by(chunk_size)
                    .map(move |start| {
                        let end = (start + chunk_size).min(bytes.len());
                        Ok(bytes.slice(start..end))
                    })
                    .collect::<Vec<_>>();
                stream::iter(chunks).boxed()
            }
            Source::File(file) => ReaderChunks::new(file, chunk_size).boxed(),
            Source::Reader { reader, .. } => ReaderChunks::new(reader, chunk_size).boxed(),
        }
    }
}

impl std::fmt::Debug for ByteSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0 {
            Source::Buffer(bytes) => f.debug_tuple("Buffer").field(&bytes.len()).finish(),
            Source::File(_) => f.write_str("File"),
            Source::Reader { len, .. } => f.debug_struct("Reader").field("len", len).finish(),
        }
    }
}

impl From<Bytes> for ByteSource {
    fn from(bytes: Bytes) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for ByteSource {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<String> for ByteSource {
    fn from(text: String) -> Self {
        Self::from_bytes(text)
    }
}

impl From<&'static str> for ByteSource {
    fn from(text: &'static str) -> Self {
        Self::from_bytes(text)
    }
}

impl From<&'static [u8]> for ByteSource {
    fn from(bytes: &'static [u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<File> for ByteSource {
    fn from(file: File) -> Self {
        Self::from_file(file)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use assert2::{check, let_assert};
    use futures_util::TryStreamExt;

    use super::*;

    #[test]
    fn exact_size_wins() {
        check!(
            resolve_content_length(Some(1000), None, true).ok() == Some(ContentLength::Known(1000))
        );
        check!(
            resolve_content_length(Some(1000), Some(12), false).ok()
                == Some(ContentLength::Known(1000))
        );
    }

    #[test]
    fn declared_size_is_used_when_source_is_unsized() {
        check!(resolve_content_length(None, Some(42), true).ok() == Some(ContentLength::Known(42)));
    }

    #[test]
    fn progress_needs_a_size() {
        let_assert!(Err(err) = resolve_content_length(None, None, true));
        check!(err.is_configuration());
    }

    #[test]
    fn unsized_without_progress_is_unknown() {
        check!(resolve_content_length(None, None, false).ok() == Some(ContentLength::Unknown));
    }

    #[tokio::test]
    async fn in_memory_sources_are_sized() {
        check!(ByteSource::from("hello").exact_len().await == Some(5));
        check!(ByteSource::from(vec![0_u8; 1000]).exact_len().await == Some(1000));
        check!(ByteSource::from_reader(&b"abc"[..]).exact_len().await == None);
        check!(ByteSource::from_reader_with_len(&b"abc"[..], 3).exact_len().await == Some(3));
    }

    #[tokio::test]
    async fn file_size_is_measured_from_current_position() {
        let mut tmp = tempfile::NamedTempFile::new().expect("temp file");
        tmp.write_all(&[1_u8; 300]).expect("write");
        tmp.flush().expect("flush");

        let mut file = File::open(tmp.path()).await.expect("open");
        file.seek(SeekFrom::Start(100)).await.expect("seek");

        let mut source = ByteSource::from(file);
        check!(source.exact_len().await == Some(200));

        let chunks: Vec<Bytes> = source.into_stream(64).try_collect().await.expect("read");
        check!(chunks.iter().map(Bytes::len).sum::<usize>() == 200);
        check!(chunks.iter().all(|c| c.len() <= 64));
    }

    #[tokio::test]
    async fn buffers_are_split_into_chunks() {
        let chunks: Vec<Bytes> = ByteSource::from(vec![9_u8; 10])
            .into_stream(4)
            .try_collect()
            .await
            .expect("read");
        check!(chunks.iter().map(Bytes::len).collect::<Vec<_>>() == vec![4, 4, 2]);

        let empty: Vec<Bytes> = ByteSource::from("")
            .into_stream(4)
            .try_collect()
            .await
            .expect("read");
        check!(empty.is_empty());
    }
}
