//! Transfer progress notifications.

use derive_more::Display;

/// Phase of a body transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum TransferPhase {
    /// First non-empty chunk crossed the wrapper.
    #[display("started")]
    Started,
    /// A later chunk crossed the wrapper.
    #[display("progress")]
    Progress,
    /// The body ended cleanly.
    #[display("completed")]
    Completed,
    /// The body failed or was abandoned.
    #[display("failed")]
    Failed,
}

impl TransferPhase {
    /// Returns `true` for [`Self::Completed`] and [`Self::Failed`].
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// One progress notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Bytes carried by this chunk, `0` for terminal events.
    pub chunk_bytes: u64,
    /// Bytes transferred so far.
    pub cumulative_bytes: u64,
    /// Total size of the body, when known.
    pub total_bytes: Option<u64>,
    /// Transfer phase.
    pub phase: TransferPhase,
}

/// Receiver of [`ProgressEvent`]s.
///
/// Called synchronously from the task polling the body, so implementations
/// should return quickly.
///
/// Closures implement this trait:
///
/// ```
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU64, Ordering};
///
/// use stowage_core::{ProgressEvent, ProgressListener};
///
/// let seen = Arc::new(AtomicU64::new(0));
/// let listener = {
///     let seen = Arc::clone(&seen);
///     move |event: &ProgressEvent| seen.store(event.cumulative_bytes, Ordering::Relaxed)
/// };
/// let listener: Arc<dyn ProgressListener> = Arc::new(listener);
/// # let _ = listener;
/// ```
pub trait ProgressListener: Send + Sync {
    /// Handle one event.
    fn on_event(&self, event: &ProgressEvent);
}

impl<F> ProgressListener for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_event(&self, event: &ProgressEvent) {
        self(event);
    }
}
