//! Streaming transfer wrapper.
//!
//! [`TransferTee`] sits between a body source and its consumer. It forwards
//! every chunk unchanged while it:
//! - feeds a CRC64-ECMA digest of the bytes that crossed it,
//! - reports [`ProgressEvent`]s to an optional listener,
//! - checks the byte count against a known total.
//!
//! The outcome is published through a [`TransferReceipt`] once the stream is
//! terminal, so the dispatcher can verify the checksum the service reports.

use std::io;
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::{Context, Poll, ready};

use bytes::Bytes;
use crc::{CRC_64_XZ, Crc, Digest};
use futures_core::Stream;
use tokio::io::{AsyncRead, ReadBuf};

use crate::length::ContentLength;
use crate::progress::{ProgressEvent, ProgressListener, TransferPhase};

/// CRC-64 as reported in `x-cos-hash-crc64ecma`.
///
/// Reflected ECMA-182 polynomial with all-ones init and xorout, known in the
/// `crc` catalog as CRC-64/XZ.
static CRC64: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// CRC64-ECMA checksum of a byte slice.
///
/// ```
/// assert_eq!(stowage_core::crc64_ecma(b"123456789"), 0x995D_C9BB_DF19_39FA);
/// ```
#[must_use]
pub fn crc64_ecma(bytes: &[u8]) -> u64 {
    CRC64.checksum(bytes)
}

// ============================================================================
// Receipt
// ============================================================================

/// How a transfer ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferOutcome {
    /// The body ended cleanly with the expected size.
    Completed,
    /// The body failed, had the wrong size or was dropped early.
    Failed,
}

/// Final accounting of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSummary {
    /// Bytes that crossed the wrapper.
    pub bytes_transferred: u64,
    /// CRC64-ECMA of those bytes, when checksumming was enabled.
    pub checksum: Option<u64>,
    /// How the transfer ended.
    pub outcome: TransferOutcome,
}

/// What became of the CRC64 comparison for an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumCheck {
    /// The service reported the same checksum.
    Verified,
    /// The upload had not ended when the response arrived, nothing was compared.
    Pending,
    /// The response carried no usable checksum.
    NotReported,
}

/// Handle on the summary of a transfer, filled once the stream is terminal.
#[derive(Debug, Clone, Default)]
pub struct TransferReceipt {
    summary: Arc<OnceLock<TransferSummary>>,
    check: Arc<OnceLock<ChecksumCheck>>,
}

impl TransferReceipt {
    /// The summary, if the transfer is over.
    #[must_use]
    pub fn summary(&self) -> Option<TransferSummary> {
        self.summary.get().copied()
    }

    /// Checksum of a completed transfer.
    #[must_use]
    pub fn checksum(&self) -> Option<u64> {
        self.summary()
            .filter(|summary| summary.outcome == TransferOutcome::Completed)
            .and_then(|summary| summary.checksum)
    }

    /// Result of the comparison with the service checksum.
    ///
    /// `None` when no comparison was attempted, as for downloads or with
    /// checksums disabled.
    #[must_use]
    pub fn checksum_check(&self) -> Option<ChecksumCheck> {
        self.check.get().copied()
    }

    pub(crate) fn record_check(&self, check: ChecksumCheck) {
        let _ = self.check.set(check);
    }

    fn publish(&self, summary: TransferSummary) {
        let _ = self.summary.set(summary);
    }
}

// ============================================================================
// Transfer tee
// ============================================================================

struct StreamState {
    total: ContentLength,
    transferred: u64,
    digest: Option<Digest<'static, u64>>,
    listener: Option<Arc<dyn ProgressListener>>,
    started: bool,
    finished: bool,
}

impl StreamState {
    fn notify(&self, chunk_bytes: u64, phase: TransferPhase) {
        if let Some(listener) = &self.listener {
            listener.on_event(&ProgressEvent {
                chunk_bytes,
                cumulative_bytes: self.transferred,
                total_bytes: self.total.known(),
                phase,
            });
        }
    }
}

/// Stream decorator that counts, checksums and reports the bytes it forwards.
///
/// Emits `Started` on the first non-empty chunk, `Progress` on each later
/// chunk, then exactly one of `Completed` or `Failed`. A stream dropped before
/// its end reports `Failed`, unless its known length was fully delivered.
/// The source is dropped as soon as the transfer is terminal.
pub struct TransferTee<S> {
    inner: Option<S>,
    state: StreamState,
    receipt: TransferReceipt,
}

impl<S> TransferTee<S> {
    /// Wrap `inner`, whose size is `total`.
    pub fn new(inner: S, total: ContentLength) -> Self {
        Self {
            inner: Some(inner),
            state: StreamState {
                total,
                transferred: 0,
                digest: None,
                listener: None,
                started: false,
                finished: false,
            },
            receipt: TransferReceipt::default(),
        }
    }

    /// Compute a CRC64-ECMA digest of the forwarded bytes.
    #[must_use]
    pub fn with_checksum(mut self, enabled: bool) -> Self {
        self.state.digest = enabled.then(|| CRC64.digest());
        self
    }

    /// Report progress to `listener`.
    #[must_use]
    pub fn with_listener(mut self, listener: Option<Arc<dyn ProgressListener>>) -> Self {
        self.state.listener = listener;
        self
    }

    /// Handle on the summary published when the transfer ends.
    #[must_use]
    pub fn receipt(&self) -> TransferReceipt {
        self.receipt.clone()
    }

    /// Bytes forwarded so far.
    #[must_use]
    pub const fn transferred(&self) -> u64 {
        self.state.transferred
    }

    fn finish(&mut self, outcome: TransferOutcome) {
        if self.state.finished {
            return;
        }
        self.state.finished = true;
        self.inner = None;

        let checksum = self.state.digest.take().map(|digest| digest.finalize());
        self.receipt.publish(TransferSummary {
            bytes_transferred: self.state.transferred,
            checksum,
            outcome,
        });

        let phase = match outcome {
            TransferOutcome::Completed => TransferPhase::Completed,
            TransferOutcome::Failed => TransferPhase::Failed,
        };
        self.state.notify(0, phase);
    }
}

impl<S> std::fmt::Debug for TransferTee<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferTee")
            .field("total", &self.state.total)
            .field("transferred", &self.state.transferred)
            .field("checksum", &self.state.digest.is_some())
            .field("finished", &self.state.finished)
            .finish_non_exhaustive()
    }
}

impl<S> Stream for TransferTee<S>
where
    S: Stream<Item = io::Result<Bytes>> + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(inner) = this.inner.as_mut() else {
            return Poll::Ready(None);
        };

        match ready!(Pin::new(inner).poll_next(cx)) {
            Some(Ok(chunk)) => {
                if chunk.is_empty() {
                    return Poll::Ready(Some(Ok(chunk)));
                }

                let len = chunk.len() as u64;
                if let ContentLength::Known(total) = this.state.total
                    && this.state.transferred + len > total
                {
                    this.finish(TransferOutcome::Failed);
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::InvalidData,
                        format!("body is larger than its declared length of {total} bytes"),
                    ))));
                }

                if let Some(digest) = this.state.digest.as_mut() {
                    digest.update(&chunk);
                }
                this.state.transferred += len;

                let phase = if this.state.started {
                    TransferPhase::Progress
                } else {
                    this.state.started = true;
                    TransferPhase::Started
                };
                this.state.notify(len, phase);

                Poll::Ready(Some(Ok(chunk)))
            }
            Some(Err(err)) => {
                this.finish(TransferOutcome::Failed);
                Poll::Ready(Some(Err(err)))
            }
            None => {
                if let ContentLength::Known(total) = this.state.total
                    && this.state.transferred < total
                {
                    let transferred = this.state.transferred;
                    this.finish(TransferOutcome::Failed);
                    return Poll::Ready(Some(Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        format!("body ended after {transferred} of {total} bytes"),
                    ))));
                }
                this.finish(TransferOutcome::Completed);
                Poll::Ready(None)
            }
        }
    }
}

impl<S> Drop for TransferTee<S> {
    fn drop(&mut self) {
        if !self.state.finished {
            // HTTP/1 stops polling a body once its Content-Length has been written.
            if self.state.total == ContentLength::Known(self.state.transferred) {
                self.finish(TransferOutcome::Completed);
                return;
            }
            if self.state.started {
                tracing::warn!(
                    transferred = self.state.transferred,
                    "transfer dropped before completion"
                );
            }
            self.finish(TransferOutcome::Failed);
        }
    }
}

// ============================================================================
// Reader adapter
// ============================================================================

/// Adapts an [`AsyncRead`] into a stream of chunks of at most `chunk_size` bytes.
pub struct ReaderChunks<R> {
    reader: Option<R>,
    buf: Vec<u8>,
}

impl<R> ReaderChunks<R> {
    /// Read `reader` in chunks of at most `chunk_size` bytes.
    pub fn new(reader: R, chunk_size: usize) -> Self {
        Self {
            reader: Some(reader),
            buf: vec![0; chunk_size.max(1)],
        }
    }
}

impl<R> std::fmt::Debug for ReaderChunks<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderChunks")
            .field("chunk_size", &self.buf.len())
            .field("done", &self.reader.is_none())
            .finish()
    }
}

impl<R> Stream for ReaderChunks<R>
where
    R: AsyncRead + Unpin,
{
    type Item = io::Result<Bytes>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let Some(reader) = this.reader.as_mut() else {
            return Poll::Ready(None);
        };

        let mut read_buf = ReadBuf::new(&mut this.buf);
        match ready!(Pin::new(reader).poll_read(cx, &mut read_buf)) {
            Ok(()) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    this.reader = None;
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(Bytes::copy_from_slice(filled))))
                }
            }
            Err(err) => {
                this.reader = None;
                Poll::Ready(Some(Err(err)))
            }
        }
    }
}
