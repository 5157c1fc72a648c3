use std::sync::Arc;

use hoist_core::{CancellationToken, RetryPolicy};

use crate::error::Error;

pub const DEFAULT_PART_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_PRESIGN_BATCH_SIZE: usize = 10;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Callback fed the aggregate upload fraction in `[0, 1]`. Advisory only;
/// reads may observe a torn snapshot of per-part counters.
pub type AggregateProgressFn = Arc<dyn Fn(f64) + Send + Sync>;

/// Tuning for one multipart upload. Validated synchronously, before any
/// network call.
#[derive(Clone)]
pub struct MultipartConfig {
    /// Size of every part but the last, in bytes.
    pub part_size: u64,
    /// Upper bound on concurrently in-flight part uploads.
    pub concurrency: usize,
    /// How many part numbers each presign request carries.
    pub batch_size: usize,
    /// Attempt budget for each network call, including the first attempt.
    pub max_attempts: u32,
    pub retry: RetryPolicy,
    /// Fired by the caller to cooperatively abandon the upload.
    pub cancellation: CancellationToken,
    /// Opaque backend encryption parameters, forwarded verbatim on create
    /// and presign calls.
    pub encryption: Option<serde_json::Value>,
    pub on_progress: Option<AggregateProgressFn>,
}

impl Default for MultipartConfig {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_PRESIGN_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry: RetryPolicy::default(),
            cancellation: CancellationToken::new(),
            encryption: None,
            on_progress: None,
        }
    }
}

impl MultipartConfig {
    pub fn validate(&self) -> Result<(), Error> {
        if self.part_size == 0 {
            return Err(Error::InvalidPartSize);
        }
        if self.concurrency == 0 {
            return Err(Error::InvalidConcurrency);
        }
        Ok(())
    }
}
