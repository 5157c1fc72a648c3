use hoist_core::{Classify, RetryClass};
use thiserror::Error;

use crate::http::HttpError;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The control-channel call an error surfaced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Create,
    Presign,
    Complete,
    Abort,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Stage::Create => "create",
            Stage::Presign => "presign-parts",
            Stage::Complete => "complete",
            Stage::Abort => "abort",
        };
        f.write_str(name)
    }
}

/// The one terminal error a multipart upload can raise.
///
/// Configuration variants are raised synchronously before any network call.
/// Protocol variants mean a collaborator response was structurally or
/// semantically invalid and are never retried. Transport variants are
/// retried up to the configured budget.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum Error {
    #[error("part size must be a positive number of bytes")]
    InvalidPartSize,
    #[error("concurrency must be a positive number of workers")]
    InvalidConcurrency,
    #[error("upload source is empty")]
    EmptySource,
    #[error("invalid create response: {reason}")]
    InvalidCreateResponse { reason: String },
    #[error("invalid presign response: {reason}")]
    InvalidPresignResponse { reason: String },
    #[error("presigned part {part_number} has no matching byte range")]
    InvalidParts { part_number: u32 },
    #[error("backend accepted part {part_number} but returned no etag")]
    MissingEtag { part_number: u32 },
    #[error("{stage} request failed: {source}")]
    Transport {
        stage: Stage,
        #[source]
        source: HttpError,
    },
    #[error("uploading part {part_number} failed: {source}")]
    PartUpload {
        part_number: u32,
        #[source]
        source: HttpError,
    },
    #[error("server error {code}: {message}")]
    Server { code: String, message: String },
    #[error("upload cancelled")]
    Cancelled,
    #[error(transparent)]
    Other(#[from] BoxedError),
}

impl Classify for Error {
    fn retry_class(&self) -> RetryClass {
        match self {
            Error::Transport { .. } | Error::PartUpload { .. } => RetryClass::Transient,
            Error::Cancelled => RetryClass::Cancelled,
            _ => RetryClass::Fatal,
        }
    }

    fn cancelled() -> Self {
        Error::Cancelled
    }
}
