use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, ETAG},
    Method, Request,
};
use http_body::{Body, Frame, SizeHint};
use http_body_util::BodyExt;
use hoist_core::{retry_with_backoff, CancellationToken, RetryPolicy};

use crate::{
    error::Error,
    http::{boxed, BoxBody, DynHttpClient, HttpError},
    part::UploadedPart,
    wire::{PresignedPart, ServerErrorBody},
};

/// Callback fed cumulative bytes handed to the connection for one part.
/// Monotonic within an attempt and bounded by the part length; a retried
/// attempt restarts from zero.
pub type PartProgressFn = Arc<dyn Fn(u64) + Send + Sync>;

const PROGRESS_CHUNK_SIZE: usize = 64 * 1024;

/// Performs one part PUT to a presigned URL, wrapped by the retry executor.
pub struct PartTransport {
    client: Arc<dyn DynHttpClient>,
}

impl PartTransport {
    pub fn new(client: Arc<dyn DynHttpClient>) -> Self {
        Self { client }
    }

    /// Uploads one part, retrying transient transport failures up to
    /// `max_attempts`. A 2xx response with no ETag header means the backend
    /// took the bytes but returned no verifiable receipt; that fails the
    /// part without further attempts.
    pub async fn upload_part(
        &self,
        presigned: &PresignedPart,
        bytes: Bytes,
        max_attempts: u32,
        retry: RetryPolicy,
        token: &CancellationToken,
        on_progress: Option<PartProgressFn>,
    ) -> Result<UploadedPart, Error> {
        retry_with_backoff(max_attempts, retry, token, || {
            self.put_once(presigned, bytes.clone(), token, on_progress.clone())
        })
        .await
    }

    async fn put_once(
        &self,
        presigned: &PresignedPart,
        bytes: Bytes,
        token: &CancellationToken,
        on_progress: Option<PartProgressFn>,
    ) -> Result<UploadedPart, Error> {
        let part_number = presigned.part_number;
        let transport = |source: HttpError| Error::PartUpload {
            part_number,
            source,
        };

        let mut builder = Request::builder()
            .uri(&presigned.presigned_url)
            .method(Method::PUT)
            .header(CONTENT_LENGTH, bytes.len());
        if let Some(headers) = &presigned.upload_headers {
            for (name, value) in headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }
        let request = builder
            .body(ProgressBody::new(bytes, on_progress))
            .map_err(|e| transport(HttpError::from(e)))?;

        // dropping the request future aborts the in-flight PUT
        let response = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(Error::Cancelled),
            response = self.client.dyn_send_request(boxed(request)) => {
                response.map_err(transport)?
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = collect_lossy(response.into_body()).await;
            if let Ok(err) = serde_json::from_slice::<ServerErrorBody>(body.as_bytes()) {
                if !err.code.is_empty() {
                    return Err(Error::Server {
                        code: err.code,
                        message: err.message,
                    });
                }
            }
            return Err(transport(HttpError::HttpNotSuccess { status, body }));
        }

        match response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
        {
            Some(etag) if !etag.is_empty() => Ok(UploadedPart {
                part_number,
                e_tag: etag.to_string(),
            }),
            _ => Err(Error::MissingEtag { part_number }),
        }
    }
}

async fn collect_lossy(body: BoxBody) -> String {
    match body.collect().await {
        Ok(collected) => String::from_utf8_lossy(&collected.to_bytes()).to_string(),
        Err(_) => String::new(),
    }
}

/// A request body that hands the part out in fixed-size frames and reports
/// the cumulative byte count after each one.
struct ProgressBody {
    remaining: Bytes,
    sent: u64,
    on_progress: Option<PartProgressFn>,
}

impl ProgressBody {
    fn new(bytes: Bytes, on_progress: Option<PartProgressFn>) -> Self {
        Self {
            remaining: bytes,
            sent: 0,
            on_progress,
        }
    }
}

impl Body for ProgressBody {
    type Data = Bytes;
    type Error = HttpError;

    fn poll_frame(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        if this.remaining.is_empty() {
            return Poll::Ready(None);
        }
        let take = PROGRESS_CHUNK_SIZE.min(this.remaining.len());
        let data = this.remaining.split_to(take);
        this.sent += take as u64;
        if let Some(on_progress) = &this.on_progress {
            on_progress(this.sent);
        }
        Poll::Ready(Some(Ok(Frame::data(data))))
    }

    fn is_end_stream(&self) -> bool {
        self.remaining.is_empty()
    }

    fn size_hint(&self) -> SizeHint {
        SizeHint::with_exact(self.remaining.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[tokio::test]
    async fn progress_body_reports_cumulative_monotonic_counts() {
        let reported = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reported);
        let len = PROGRESS_CHUNK_SIZE * 2 + 100;
        let body = ProgressBody::new(
            Bytes::from(vec![7u8; len]),
            Some(Arc::new(move |sent| sink.lock().unwrap().push(sent))),
        );
        assert_eq!(body.size_hint().exact(), Some(len as u64));

        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.len(), len);

        let reported = reported.lock().unwrap();
        assert!(reported.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(*reported.last().unwrap(), len as u64);
    }
}
