use std::{
    future::Future,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
};

use futures_util::{stream::FuturesUnordered, StreamExt};
use hoist_core::{retry_with_backoff, CancellationToken};

use crate::{
    config::MultipartConfig,
    control::{ControlChannel, Session},
    error::Error,
    http::DynHttpClient,
    part::{split_into_parts, Part, UploadedPart},
    progress::Progress,
    source::UploadSource,
    transport::{PartProgressFn, PartTransport},
    wire::PresignedPart,
};

/// The result of a completed multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedUpload {
    pub key: String,
    pub upload_id: String,
    pub total_parts: u32,
}

/// Owns the end-to-end session: validate, create, split, presign in
/// batches, upload with a bounded worker pool, then complete — or abort
/// once, best-effort, before re-raising the first failure.
pub struct Uploader {
    control: ControlChannel,
    transport: PartTransport,
    config: MultipartConfig,
}

impl Uploader {
    pub fn new(
        base_url: impl Into<String>,
        client: Arc<dyn DynHttpClient>,
        config: MultipartConfig,
    ) -> Self {
        Self {
            control: ControlChannel::new(base_url, Arc::clone(&client)),
            transport: PartTransport::new(client),
            config,
        }
    }

    /// Runs one multipart upload to completion.
    ///
    /// Either the backend ends up with the complete object and a
    /// [`CompletedUpload`] is returned, or the first failure is re-raised
    /// after a best-effort abort. Cancellation surfaces as
    /// [`Error::Cancelled`], still preceded by an abort when a session
    /// exists.
    pub async fn execute(
        &self,
        source: &UploadSource,
        metadata: Option<&serde_json::Value>,
    ) -> Result<CompletedUpload, Error> {
        self.config.validate()?;
        if source.is_empty() {
            return Err(Error::EmptySource);
        }
        let token = self.config.cancellation.clone();
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }

        // no session yet, so a create failure propagates without abort
        let session = retry_with_backoff(self.config.max_attempts, self.config.retry, &token, || {
            with_cancel(&token, self.control.create(source, metadata, &self.config))
        })
        .await?;

        match self.run_session(&session, source, &token).await {
            Ok(done) => Ok(done),
            Err(err) => {
                self.control.abort(&session).await;
                Err(err)
            }
        }
    }

    /// Everything after `create` succeeds. Any error returned from here is
    /// re-raised through exactly one abort in [`Uploader::execute`].
    async fn run_session(
        &self,
        session: &Session,
        source: &UploadSource,
        token: &CancellationToken,
    ) -> Result<CompletedUpload, Error> {
        let parts = split_into_parts(source.len(), self.config.part_size);
        let part_numbers: Vec<u32> = parts.iter().map(|p| p.part_number).collect();
        tracing::debug!(
            total_parts = parts.len(),
            part_size = self.config.part_size,
            "split source into parts"
        );

        let presigned =
            retry_with_backoff(self.config.max_attempts, self.config.retry, token, || {
                with_cancel(
                    token,
                    self.control.presign_parts(session, &part_numbers, &self.config),
                )
            })
            .await?;
        let jobs = pair_parts(parts, presigned)?;

        let mut manifest = self.upload_all(source, &jobs, token).await?;
        manifest.sort_by_key(|p| p.part_number);

        let key = retry_with_backoff(self.config.max_attempts, self.config.retry, token, || {
            with_cancel(token, self.control.complete(session, &manifest))
        })
        .await?;

        let total_parts = manifest.len() as u32;
        tracing::info!(key = %key, total_parts, "multipart upload complete");
        Ok(CompletedUpload {
            key,
            upload_id: session.upload_id.clone(),
            total_parts,
        })
    }

    /// Drives the bounded worker pool over every part. Workers claim parts
    /// in ascending order off a shared cursor and settle in any order; the
    /// first failure stops further claims while in-flight parts settle.
    async fn upload_all(
        &self,
        source: &UploadSource,
        jobs: &[(Part, PresignedPart)],
        token: &CancellationToken,
    ) -> Result<Vec<UploadedPart>, Error> {
        let progress = Progress::new(jobs.len(), source.len());
        let cursor = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let worker_count = self.config.concurrency.min(jobs.len());

        let mut workers: FuturesUnordered<_> = (0..worker_count)
            .map(|_| self.worker(source, jobs, token, &progress, &cursor, &failed))
            .collect();

        let mut uploaded = Vec::with_capacity(jobs.len());
        let mut first_error = None;
        while let Some(result) = workers.next().await {
            match result {
                Ok(parts) => uploaded.extend(parts),
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        match first_error {
            None => Ok(uploaded),
            Some(err) => Err(err),
        }
    }

    async fn worker(
        &self,
        source: &UploadSource,
        jobs: &[(Part, PresignedPart)],
        token: &CancellationToken,
        progress: &Arc<Progress>,
        cursor: &AtomicUsize,
        failed: &AtomicBool,
    ) -> Result<Vec<UploadedPart>, Error> {
        let mut done = Vec::new();
        loop {
            if failed.load(Ordering::Relaxed) {
                return Ok(done);
            }
            let index = cursor.fetch_add(1, Ordering::Relaxed);
            let Some((part, presigned)) = jobs.get(index) else {
                return Ok(done);
            };

            let on_part_progress: PartProgressFn = {
                let progress = Arc::clone(progress);
                let aggregate = self.config.on_progress.clone();
                let part_number = part.part_number;
                Arc::new(move |sent| {
                    progress.record(part_number, sent);
                    if let Some(aggregate) = &aggregate {
                        aggregate(progress.fraction());
                    }
                })
            };

            let result = self
                .transport
                .upload_part(
                    presigned,
                    source.slice(part.byte_range()),
                    self.config.max_attempts,
                    self.config.retry,
                    token,
                    Some(on_part_progress),
                )
                .await;
            match result {
                Ok(uploaded) => {
                    progress.record(part.part_number, part.len());
                    if let Some(aggregate) = &self.config.on_progress {
                        aggregate(progress.fraction());
                    }
                    tracing::debug!(part_number = part.part_number, "part uploaded");
                    done.push(uploaded);
                }
                Err(err) => {
                    failed.store(true, Ordering::Relaxed);
                    return Err(err);
                }
            }
        }
    }
}

/// Pairs every presigned URL with its byte range. A presigned part number
/// outside the split is a fatal protocol error, never retried.
fn pair_parts(
    parts: Vec<Part>,
    presigned: Vec<PresignedPart>,
) -> Result<Vec<(Part, PresignedPart)>, Error> {
    let mut slots: Vec<Option<PresignedPart>> = (0..parts.len()).map(|_| None).collect();
    for part in presigned {
        let Some(slot) = part
            .part_number
            .checked_sub(1)
            .and_then(|i| slots.get_mut(i as usize))
        else {
            return Err(Error::InvalidParts {
                part_number: part.part_number,
            });
        };
        *slot = Some(part);
    }
    parts
        .into_iter()
        .zip(slots)
        .map(|(part, slot)| match slot {
            Some(presigned) => Ok((part, presigned)),
            None => Err(Error::InvalidParts {
                part_number: part.part_number,
            }),
        })
        .collect()
}

async fn with_cancel<T>(
    token: &CancellationToken,
    fut: impl Future<Output = Result<T, Error>>,
) -> Result<T, Error> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
