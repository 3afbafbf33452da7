// Failure taxonomy shared by every pipeline stage.

use std::fmt;

use thiserror::Error;

/// Stable tag describing why an avatar load failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureType {
    /// The caller invoked a stage without a resolved locator.
    InvalidInput,
    MetadataDownloadError,
    MetadataParseError,
    ModelDownloadError,
    /// Any render-stage failure; the underlying kind is collapsed.
    AvatarRenderError,
    /// Fetcher-level transport, status or decode failure.
    DownloadError,
    /// Reading or writing the local cache failed.
    CacheError,
    Cancelled,
}

impl fmt::Display for FailureType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureType::InvalidInput => "InvalidInput",
            FailureType::MetadataDownloadError => "MetadataDownloadError",
            FailureType::MetadataParseError => "MetadataParseError",
            FailureType::ModelDownloadError => "ModelDownloadError",
            FailureType::AvatarRenderError => "AvatarRenderError",
            FailureType::DownloadError => "DownloadError",
            FailureType::CacheError => "CacheError",
            FailureType::Cancelled => "Cancelled",
        };
        f.write_str(name)
    }
}

/// Terminal failure of a stage or pipeline: a kind tag plus a human readable message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct AvatarError {
    pub kind: FailureType,
    pub message: String,
}

impl AvatarError {
    pub fn new(kind: FailureType, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn cancelled() -> Self {
        Self::new(FailureType::Cancelled, "operation was cancelled")
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind == FailureType::Cancelled
    }

    /// Re-tag the error as `kind`, keeping the message.
    ///
    /// Cancellation is never re-tagged.
    pub fn rekind(self, kind: FailureType) -> Self {
        if self.is_cancelled() {
            return self;
        }
        Self { kind, ..self }
    }

    /// Convert an internal `anyhow` error chain into a tagged failure.
    pub fn from_anyhow(kind: FailureType, err: anyhow::Error) -> Self {
        Self::new(kind, format!("{:#}", err))
    }
}

pub type AvatarResult<T> = std::result::Result<T, AvatarError>;
