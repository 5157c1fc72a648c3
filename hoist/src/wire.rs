//! Wire types for the four session control endpoints. All four take and
//! return JSON; response structs default missing fields so validation can
//! reject them with a precise reason instead of a serde parse error.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::part::UploadedPart;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SourceDescriptor<'a> {
    pub name: &'a str,
    pub size: u64,
    pub content_type: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateUploadRequest<'a> {
    pub source_descriptor: SourceDescriptor<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<&'a serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CreateUploadResponse {
    pub upload_id: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PresignPartsRequest<'a> {
    pub key: &'a str,
    pub upload_id: &'a str,
    pub part_numbers: &'a [u32],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encryption: Option<&'a serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct PresignPartsResponse {
    pub parts: Vec<PresignedPart>,
}

/// A backend-issued, time-limited URL authorizing one part PUT, plus any
/// headers the backend requires on that PUT (carried verbatim, never
/// reinterpreted).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PresignedPart {
    pub part_number: u32,
    pub presigned_url: String,
    pub upload_headers: Option<HashMap<String, String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CompleteUploadRequest<'a> {
    pub key: &'a str,
    pub upload_id: &'a str,
    pub parts: &'a [UploadedPart],
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct CompleteUploadResponse {
    pub key: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AbortUploadRequest<'a> {
    pub key: &'a str,
    pub upload_id: &'a str,
}

/// Structured error payload some collaborators attach to non-2xx responses.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ServerErrorBody {
    pub code: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_uses_camel_case_fields() {
        let request = CreateUploadRequest {
            source_descriptor: SourceDescriptor {
                name: "a.bin",
                size: 250,
                content_type: "application/octet-stream",
            },
            metadata: None,
            encryption: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "sourceDescriptor": {
                    "name": "a.bin",
                    "size": 250,
                    "contentType": "application/octet-stream",
                }
            })
        );
    }

    #[test]
    fn manifest_entries_serialize_with_etag_spelling() {
        let part = UploadedPart {
            part_number: 3,
            e_tag: "\"abc\"".into(),
        };
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"partNumber": 3, "eTag": "\"abc\""})
        );
    }

    #[test]
    fn presigned_part_accepts_optional_headers() {
        let part: PresignedPart = serde_json::from_value(serde_json::json!({
            "partNumber": 2,
            "presignedUrl": "https://store.test/part/2",
            "uploadHeaders": {"x-amz-server-side-encryption": "AES256"},
        }))
        .unwrap();
        assert_eq!(part.part_number, 2);
        assert_eq!(
            part.upload_headers.unwrap()["x-amz-server-side-encryption"],
            "AES256"
        );

        let bare: PresignedPart = serde_json::from_value(serde_json::json!({
            "partNumber": 1,
            "presignedUrl": "https://store.test/part/1",
        }))
        .unwrap();
        assert!(bare.upload_headers.is_none());
    }
}
