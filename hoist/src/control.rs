use std::{collections::HashSet, sync::Arc, time::Duration};

use bytes::Bytes;
use http::{
    header::{CONTENT_LENGTH, CONTENT_TYPE},
    Method, Request,
};
use http_body_util::{BodyExt, Full};
use serde::Serialize;

use crate::{
    config::MultipartConfig,
    error::{Error, Stage},
    http::{boxed, DynHttpClient, HttpError},
    part::UploadedPart,
    source::UploadSource,
    wire::{
        AbortUploadRequest, CompleteUploadRequest, CompleteUploadResponse, CreateUploadRequest,
        CreateUploadResponse, PresignPartsRequest, PresignPartsResponse, PresignedPart,
        ServerErrorBody, SourceDescriptor,
    },
};

/// A hung abort must not delay reporting the error that triggered it.
const ABORT_TIMEOUT: Duration = Duration::from_secs(10);

/// The backend-tracked multipart session. Created once, immutable
/// thereafter; exactly one of `complete`/`abort` is issued per session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub key: String,
    pub upload_id: String,
}

/// Request/response calls to the four collaborator endpoints. Not
/// concurrent internally; retry and cancellation wrap these calls at the
/// orchestrator.
pub struct ControlChannel {
    base_url: String,
    client: Arc<dyn DynHttpClient>,
}

impl ControlChannel {
    pub fn new(base_url: impl Into<String>, client: Arc<dyn DynHttpClient>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    async fn post_json<B: Serialize>(
        &self,
        stage: Stage,
        path: &str,
        body: &B,
    ) -> Result<Bytes, Error> {
        let transport = |source: HttpError| Error::Transport { stage, source };
        let payload = serde_json::to_vec(body).map_err(|e| Error::Other(e.into()))?;
        let request = Request::builder()
            .uri(format!("{}/{}", self.base_url, path))
            .method(Method::POST)
            .header(CONTENT_TYPE, "application/json")
            .header(CONTENT_LENGTH, payload.len())
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| transport(HttpError::from(e)))?;

        let response = self
            .client
            .dyn_send_request(boxed(request))
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(transport)?
            .to_bytes();

        if !status.is_success() {
            // a structured collaborator error is surfaced as-is, never
            // collapsed into the generic transport error
            if let Ok(err) = serde_json::from_slice::<ServerErrorBody>(&body) {
                if !err.code.is_empty() {
                    return Err(Error::Server {
                        code: err.code,
                        message: err.message,
                    });
                }
            }
            return Err(transport(HttpError::HttpNotSuccess {
                status,
                body: String::from_utf8_lossy(&body).to_string(),
            }));
        }
        Ok(body)
    }

    /// Creates the session. Failure here leaves nothing to abort.
    pub async fn create(
        &self,
        source: &UploadSource,
        metadata: Option<&serde_json::Value>,
        config: &MultipartConfig,
    ) -> Result<Session, Error> {
        let request = CreateUploadRequest {
            source_descriptor: SourceDescriptor {
                name: source.name(),
                size: source.len(),
                content_type: source.content_type(),
            },
            metadata,
            encryption: config.encryption.as_ref(),
        };
        let body = self.post_json(Stage::Create, "create", &request).await?;
        let response: CreateUploadResponse =
            serde_json::from_slice(&body).map_err(|e| Error::InvalidCreateResponse {
                reason: e.to_string(),
            })?;
        if response.key.is_empty() || response.upload_id.is_empty() {
            return Err(Error::InvalidCreateResponse {
                reason: "missing key or uploadId".into(),
            });
        }
        tracing::debug!(key = %response.key, upload_id = %response.upload_id, "created multipart session");
        Ok(Session {
            key: response.key,
            upload_id: response.upload_id,
        })
    }

    /// Presigns every requested part number, in bounded batches. Every
    /// requested number must come back exactly once with a non-empty URL;
    /// anything else is a protocol error, not retried.
    pub async fn presign_parts(
        &self,
        session: &Session,
        part_numbers: &[u32],
        config: &MultipartConfig,
    ) -> Result<Vec<PresignedPart>, Error> {
        let mut presigned = Vec::with_capacity(part_numbers.len());
        for batch in part_numbers.chunks(config.batch_size.max(1)) {
            let request = PresignPartsRequest {
                key: &session.key,
                upload_id: &session.upload_id,
                part_numbers: batch,
                encryption: config.encryption.as_ref(),
            };
            let body = self
                .post_json(Stage::Presign, "presign-parts", &request)
                .await?;
            let response: PresignPartsResponse =
                serde_json::from_slice(&body).map_err(|e| Error::InvalidPresignResponse {
                    reason: e.to_string(),
                })?;

            let mut outstanding: HashSet<u32> = batch.iter().copied().collect();
            for part in &response.parts {
                if part.presigned_url.is_empty() {
                    return Err(Error::InvalidPresignResponse {
                        reason: format!("part {} has an empty url", part.part_number),
                    });
                }
                if !outstanding.remove(&part.part_number) {
                    return Err(Error::InvalidPresignResponse {
                        reason: format!("part {} was not requested or appears twice", part.part_number),
                    });
                }
            }
            if let Some(missing) = outstanding.iter().min() {
                return Err(Error::InvalidPresignResponse {
                    reason: format!("part {missing} is missing from the response"),
                });
            }
            presigned.extend(response.parts);
        }
        tracing::debug!(parts = presigned.len(), "presigned all parts");
        Ok(presigned)
    }

    /// Completes the session. `parts` must already be sorted ascending and
    /// contiguous from 1; rejection here means a numbering invariant broke
    /// upstream.
    pub async fn complete(
        &self,
        session: &Session,
        parts: &[UploadedPart],
    ) -> Result<String, Error> {
        debug_assert!(parts
            .iter()
            .enumerate()
            .all(|(i, p)| p.part_number == i as u32 + 1));
        let request = CompleteUploadRequest {
            key: &session.key,
            upload_id: &session.upload_id,
            parts,
        };
        let body = self.post_json(Stage::Complete, "complete", &request).await?;
        let response: CompleteUploadResponse = serde_json::from_slice(&body).unwrap_or_default();
        Ok(if response.key.is_empty() {
            session.key.clone()
        } else {
            response.key
        })
    }

    /// Best-effort abort: the session is already failing, so any error here
    /// is logged and swallowed; the caller's original error is what
    /// propagates. The backend's own lifecycle rules are the fallback for a
    /// part set we fail to discard.
    pub async fn abort(&self, session: &Session) {
        let request = AbortUploadRequest {
            key: &session.key,
            upload_id: &session.upload_id,
        };
        match tokio::time::timeout(
            ABORT_TIMEOUT,
            self.post_json(Stage::Abort, "abort", &request),
        )
        .await
        {
            Ok(Ok(_)) => tracing::debug!(key = %session.key, "aborted multipart session"),
            Ok(Err(e)) => {
                tracing::warn!(key = %session.key, error = %e, "abort failed, leaving cleanup to the backend")
            }
            Err(_) => {
                tracing::warn!(key = %session.key, "abort timed out, leaving cleanup to the backend")
            }
        }
    }
}
