// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Lesson video storage on Cloudflare R2 (S3-compatible).
//!
//! The API never proxies video bytes. Admins upload straight to the bucket
//! with a presigned PUT URL, and learners stream with a presigned GET URL.

use std::time::Duration;

use aws_sdk_s3::{
    config::{Credentials, Region},
    presigning::PresigningConfig,
    Client,
};

use crate::config::R2Config;
use crate::error::AppError;

/// Lifetime of presigned upload and playback URLs.
pub const SIGNED_URL_TTL: Duration = Duration::from_secs(3600);

/// Prefix of every object this service manages.
pub const VIDEO_PREFIX: &str = "videos/";

const ALLOWED_EXTENSIONS: &[&str] = &["mp4", "webm", "mov", "m4v"];

/// R2 client for lesson videos.
pub struct VideoStorage {
    /// None means storage is not configured (or mocked).
    client: Option<Client>,
    bucket: String,
    #[cfg(debug_assertions)]
    mock: bool,
}

impl VideoStorage {
    /// Build an S3 client pointed at the account's R2 endpoint.
    pub async fn new(config: &R2Config) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(config.endpoint_url())
            .region(Region::new("auto"))
            .credentials_provider(Credentials::new(
                &config.access_key_id,
                &config.secret_access_key,
                None,
                None,
                "r2",
            ))
            .load()
            .await;

        tracing::info!(bucket = %config.bucket, "R2 video storage configured");

        Self {
            client: Some(Client::new(&sdk_config)),
            bucket: config.bucket.clone(),
            #[cfg(debug_assertions)]
            mock: false,
        }
    }

    /// Storage that refuses every operation.
    pub fn disabled() -> Self {
        tracing::warn!("R2_* not set; video upload and playback are disabled");
        Self {
            client: None,
            bucket: String::new(),
            #[cfg(debug_assertions)]
            mock: false,
        }
    }

    /// Create a mock storage that returns fake URLs without network calls.
    /// Only available in debug/test builds.
    #[cfg(debug_assertions)]
    pub fn new_mock() -> Self {
        Self {
            client: None,
            bucket: "mock-bucket".to_string(),
            mock: true,
        }
    }

    #[cfg(debug_assertions)]
    fn is_mock(&self) -> bool {
        self.mock
    }

    #[cfg(not(debug_assertions))]
    fn is_mock(&self) -> bool {
        false
    }

    fn client(&self) -> Result<&Client, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::FailedPrecondition("Video storage is not configured".to_string()))
    }

    /// Presigned PUT URL for uploading `key` with the given content type.
    pub async fn upload_url(&self, key: &str, content_type: &str) -> Result<String, AppError> {
        if self.is_mock() {
            return Ok(format!("https://mock-r2.local/{}?upload", key));
        }

        let presigned = self
            .client()?
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .presigned(presigning_config()?)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign upload: {}", e)))?;

        Ok(presigned.uri().to_string())
    }

    /// Presigned GET URL for streaming `key`.
    pub async fn playback_url(&self, key: &str) -> Result<String, AppError> {
        if self.is_mock() {
            return Ok(format!("https://mock-r2.local/{}", key));
        }

        let presigned = self
            .client()?
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning_config()?)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to presign playback: {}", e)))?;

        Ok(presigned.uri().to_string())
    }

    /// Delete an object. Deleting a missing key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        validate_video_key(key)?;
        if self.is_mock() {
            return Ok(());
        }

        self.client()?
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| AppError::Storage(format!("Failed to delete {}: {}", key, e)))?;

        tracing::info!(key, "Deleted video object");
        Ok(())
    }

    /// Delete each key, logging failures instead of returning them.
    pub async fn delete_best_effort(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                tracing::warn!(key = %key, error = %e, "Failed to delete video (continuing)");
            }
        }
    }
}

fn presigning_config() -> Result<PresigningConfig, AppError> {
    PresigningConfig::expires_in(SIGNED_URL_TTL)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Invalid presigning config: {}", e)))
}

/// Build the object key for a new lesson upload.
///
/// Only video content types and known container extensions are accepted.
pub fn video_key(
    course_id: &str,
    lesson_id: &str,
    file_name: &str,
    content_type: &str,
) -> Result<String, AppError> {
    if !content_type.starts_with("video/") {
        return Err(AppError::InvalidArgument(format!(
            "Unsupported content type: {}",
            content_type
        )));
    }

    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| ALLOWED_EXTENSIONS.contains(&ext.as_str()))
        .ok_or_else(|| {
            AppError::InvalidArgument(format!(
                "File must have one of the extensions: {}",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

    Ok(format!(
        "{}{}/{}/{}.{}",
        VIDEO_PREFIX,
        course_id,
        lesson_id,
        uuid::Uuid::new_v4(),
        extension
    ))
}

/// Reject keys outside the video prefix.
pub fn validate_video_key(key: &str) -> Result<(), AppError> {
    if !key.starts_with(VIDEO_PREFIX) || key.len() == VIDEO_PREFIX.len() || key.contains("..") {
        return Err(AppError::InvalidArgument(format!(
            "Invalid video path: {}",
            key
        )));
    }
    Ok(())
}
