//! Explicit state machines for the four call types.
//!
//! Upload and download calls progress through these states; metadata and
//! delete calls are single request/response and carry no state.

/// States of one upload call.
///
/// `Receiving` ingests chunks; end-of-input moves to `Finalizing` (assembly
/// plus tiered put); the call ends `Acked` or `Failed`. Cancellation or a
/// protocol violation in `Receiving` goes straight to `Failed` without a
/// put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Receiving,
    Finalizing,
    Acked,
    Failed,
}

impl UploadState {
    /// Returns `true` if the transition is part of the call lifecycle.
    pub fn can_transition(self, next: UploadState) -> bool {
        matches!(
            (self, next),
            (UploadState::Receiving, UploadState::Finalizing)
                | (UploadState::Receiving, UploadState::Failed)
                | (UploadState::Finalizing, UploadState::Acked)
                | (UploadState::Finalizing, UploadState::Failed)
        )
    }

    /// Returns `true` for `Acked` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadState::Acked | UploadState::Failed)
    }
}

/// States of one download call.
///
/// `Resolving` opens the source (fails fast on NotFound before any bytes
/// are sent); `Streaming` emits chunk frames until end-of-stream
/// (`Completed`) or a source failure (`Failed`, already-sent bytes stand).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Resolving,
    Streaming,
    Completed,
    Failed,
}

impl DownloadState {
    /// Returns `true` if the transition is part of the call lifecycle.
    pub fn can_transition(self, next: DownloadState) -> bool {
        matches!(
            (self, next),
            (DownloadState::Resolving, DownloadState::Streaming)
                | (DownloadState::Resolving, DownloadState::Failed)
                | (DownloadState::Streaming, DownloadState::Completed)
                | (DownloadState::Streaming, DownloadState::Failed)
        )
    }

    /// Returns `true` for `Completed` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloadState::Completed | DownloadState::Failed)
    }
}
