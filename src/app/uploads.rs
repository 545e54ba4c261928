use anyhow::Result;
use aws_sdk_s3::presigning::PresigningConfig;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;

use crate::infra::storage::ObjectStorage;

#[derive(Debug, Serialize)]
pub struct UploadIntent {
    pub object_key: String,
    pub upload_url: String,
    pub expires_in_seconds: u64,
    pub headers: Vec<UploadHeader>,
}

#[derive(Debug, Serialize)]
pub struct UploadHeader {
    pub name: String,
    pub value: String,
}

pub enum UploadOutcome {
    Created(UploadIntent),
    UnsupportedType,
}

/// Presigned PUT intents for badge icons and safer-dating media. The caller
/// uploads directly to storage and hands the object key back to the API.
#[derive(Clone)]
pub struct UploadService {
    storage: ObjectStorage,
}

impl UploadService {
    pub fn new(storage: ObjectStorage) -> Self {
        Self { storage }
    }

    pub async fn create_upload(
        &self,
        content_type: String,
        expires_in_seconds: u64,
    ) -> Result<UploadOutcome> {
        let ext = match extension_from_content_type(&content_type) {
            Some(ext) => ext,
            None => return Ok(UploadOutcome::UnsupportedType),
        };
        let object_key = format!("uploads/{}.{}", Uuid::new_v4(), ext);

        let presign_config = PresigningConfig::expires_in(Duration::from_secs(expires_in_seconds))?;
        let presigned = self
            .storage
            .client()
            .put_object()
            .bucket(self.storage.bucket())
            .key(&object_key)
            .content_type(content_type)
            .presigned(presign_config)
            .await?;

        let headers = presigned
            .headers()
            .map(|(name, value)| UploadHeader {
                name: name.to_string(),
                value: value.to_string(),
            })
            .collect();

        Ok(UploadOutcome::Created(UploadIntent {
            upload_url: presigned.uri().to_string(),
            object_key,
            expires_in_seconds,
            headers,
        }))
    }
}

fn extension_from_content_type(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/svg+xml" => Some("svg"),
        "video/mp4" => Some("mp4"),
        _ => None,
    }
}
