//! Wire bodies exchanged with the transport.

use std::io;
use std::pin::Pin;

use bytes::{Bytes, BytesMut};
use futures_core::Stream;
use futures_util::StreamExt;

/// A streaming body: chunks of bytes arriving over time.
pub type BodyStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

/// Request or response body.
#[derive(Default)]
pub enum Body {
    /// No body.
    #[default]
    Empty,
    /// Fully buffered body.
    Full(Bytes),
    /// Live stream with its size, when known.
    Stream(BodyStream, Option<u64>),
}

impl Body {
    /// Wrap a stream.
    pub fn stream(
        stream: impl Stream<Item = io::Result<Bytes>> + Send + 'static,
        len: Option<u64>,
    ) -> Self {
        Self::Stream(Box::pin(stream), len)
    }

    /// Size of the body, when known.
    #[must_use]
    pub fn len(&self) -> Option<u64> {
        match self {
            Self::Empty => Some(0),
            Self::Full(bytes) => Some(bytes.len() as u64),
            Self::Stream(_, len) => *len,
        }
    }

    /// Returns `true` if the body is known to be empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == Some(0)
    }

    /// Buffer the whole body.
    ///
    /// # Errors
    ///
    /// Returns the first error of the stream.
    pub async fn collect(self) -> io::Result<Bytes> {
        match self {
            Self::Empty => Ok(Bytes::new()),
            Self::Full(bytes) => Ok(bytes),
            Self::Stream(mut stream, len) => {
                let capacity = len.and_then(|l| usize::try_from(l).ok()).unwrap_or(0);
                let mut buf = BytesMut::with_capacity(capacity.min(8 * 1024 * 1024));
                while let Some(chunk) = stream.next().await {
                    buf.extend_from_slice(&chunk?);
                }
                Ok(buf.freeze())
            }
        }
    }

    /// Turn the body into a stream of chunks.
    #[must_use]
    pub fn into_stream(self) -> BodyStream {
        match self {
            Self::Empty => futures_util::stream::empty().boxed(),
            Self::Full(bytes) => futures_util::stream::once(async move { Ok(bytes) }).boxed(),
            Self::Stream(stream, _) => stream,
        }
    }
}

impl std::fmt::Debug for Body {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Full(bytes) => f.debug_tuple("Full").field(&bytes.len()).finish(),
            Self::Stream(_, len) => f.debug_tuple("Stream").field(len).finish(),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        if bytes.is_empty() {
            Self::Empty
        } else {
            Self::Full(bytes)
        }
    }
}

#[cfg(test)]
mod tests {
    use futures_util::stream;

    use super::*;

    #[tokio::test]
    async fn collect_streams() {
        let body = Body::stream(
            stream::iter(vec![
                Ok(Bytes::from_static(b"ab")),
                Ok(Bytes::from_static(b"cd")),
            ]),
            Some(4),
        );
        assert_eq!(body.len(), Some(4));
        assert_eq!(body.collect().await.expect("collect").as_ref(), b"abcd");
    }

    #[tokio::test]
    async fn collect_surfaces_errors() {
        let body = Body::stream(
            stream::iter(vec![
                Ok(Bytes::from_static(b"ab")),
                Err(io::Error::other("boom")),
            ]),
            None,
        );
        assert!(body.collect().await.is_err());
    }

    #[test]
    fn empty_bytes_are_an_empty_body() {
        assert!(Body::from(Bytes::new()).is_empty());
        assert!(matches!(Body::from(Bytes::from_static(b"x")), Body::Full(_)));
    }
}
