//! Hoist uploads large payloads to an object-storage backend as a multipart
//! session: the source is split into independently uploadable parts, a
//! bounded pool of workers PUTs each part to a backend-issued presigned URL,
//! and the session is completed with an ordered part manifest or aborted on
//! the first unrecoverable failure.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//!
//! use hoist::{http::TokioClient, MultipartConfig, Uploader, UploadSource};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), hoist::Error> {
//!     let client = Arc::new(TokioClient::new());
//!     let uploader = Uploader::new("https://backend.example/mpu", client, MultipartConfig::default());
//!
//!     let source = UploadSource::new("movie.mkv", "video/x-matroska", vec![0u8; 64 * 1024 * 1024]);
//!     let done = uploader.execute(&source, None).await?;
//!     println!("stored {} in {} parts", done.key, done.total_parts);
//!     Ok(())
//! }
//! ```

mod config;
mod control;
mod error;
pub mod http;
mod part;
mod progress;
mod source;
mod transport;
mod upload;
mod wire;

pub use config::{AggregateProgressFn, MultipartConfig};
pub use control::{ControlChannel, Session};
pub use error::{BoxedError, Error, Stage};
pub use hoist_core::{retry_with_backoff, CancellationToken, Classify, RetryClass, RetryPolicy};
pub use part::{split_into_parts, Part, UploadedPart};
pub use source::UploadSource;
pub use transport::{PartProgressFn, PartTransport};
pub use upload::{CompletedUpload, Uploader};
pub use wire::PresignedPart;
