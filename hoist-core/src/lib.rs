//! The retry primitive underneath `hoist`.
//!
//! This crate knows nothing about uploads or HTTP. It runs an arbitrary
//! fallible async operation up to a bounded number of attempts, sleeping an
//! exponentially growing, jittered delay between attempts, and observing a
//! [`CancellationToken`] both between attempts and during the waits
//! themselves. Callers describe how their error type maps onto retry
//! behavior through the [`Classify`] trait.

mod retry;

pub use retry::{retry_with_backoff, Classify, RetryClass, RetryPolicy};
pub use tokio_util::sync::CancellationToken;
