//! Wire types and domain methods for the Fanline Content API client.
//!
//! Request types carry `validator` constraints mirroring the server's
//! limits so obviously malformed requests fail before a round trip.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use fanline_core::error::UploadError;
use fanline_core::models::{LocalFile, MediaKind, Orientation, PostMetadata, UploadGrant};

use crate::traits::{ContentApi, ProgressFn};
use crate::{api_prefix, ApiClient};

/// Transfer chunk size for presigned uploads; progress is observed per chunk.
const UPLOAD_CHUNK_BYTES: usize = 64 * 1024;

/// Per-transfer timeout, overriding the client's 60 s API timeout.
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

/// Request to authorize a main-video upload into temporary storage.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct TempVideoUploadRequest {
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    #[validate(length(
        min = 1,
        max = 255,
        message = "Content type must be between 1 and 255 characters"
    ))]
    pub content_type: String,
    #[validate(range(min = 1, message = "File size must be at least 1 byte"))]
    pub file_size: u64,
}

/// Temp-storage authorization: where the bytes go and the key that later
/// identifies the staged object to the batch trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempVideoUploadAuthorization {
    pub temp_storage_key: String,
    pub upload_grant: UploadGrant,
}

/// Short-lived playback reference for a staged temp video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempVideoPlayback {
    pub playback_url: String,
    pub duration_seconds: f64,
}

/// One entry in an upload-plan request. Orientation is mandatory: the
/// backend picks encode targets from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedUploadEntry {
    pub kind: MediaKind,
    pub content_type: String,
    pub extension: String,
    pub orientation: Orientation,
}

/// Upload-plan request. Entries keep submission order; the backend
/// associates uploaded bytes with entries positionally.
#[derive(Debug, Clone, Serialize, Validate)]
pub struct UploadPlanRequest {
    #[validate(length(min = 1, message = "Plan request must contain at least one entry"))]
    pub entries: Vec<PlannedUploadEntry>,
}

/// One granted upload in a plan response, mirroring the request order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedUploadGrant {
    pub kind: MediaKind,
    #[serde(flatten)]
    pub grant: UploadGrant,
}

/// Upload-plan response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPlanResponse {
    pub grants: Vec<PlannedUploadGrant>,
}

/// Hand-off of a staged main video to server-side batch processing.
/// `start_time`/`end_time` are set only when the sample clip is derived by
/// trimming rather than uploaded separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchProcessRequest {
    pub post_id: Uuid,
    pub temp_storage_key: String,
    pub content_type: String,
    pub main_orientation: Orientation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_orientation: Option<Orientation>,
    pub need_trim: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    post_id: Uuid,
}

#[async_trait]
impl ContentApi for ApiClient {
    async fn create_post(&self, metadata: &PostMetadata) -> Result<Uuid> {
        metadata.validate()?;
        let response: CreatePostResponse = self
            .post_json(&format!("{}/posts", api_prefix()), metadata)
            .await?;
        Ok(response.post_id)
    }

    async fn update_post(&self, post_id: Uuid, metadata: &PostMetadata) -> Result<()> {
        metadata.validate()?;
        self.put_json_empty(&format!("{}/posts/{}", api_prefix(), post_id), metadata)
            .await
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        self.delete(&format!("{}/posts/{}", api_prefix(), post_id))
            .await
    }

    async fn request_temp_video_upload(
        &self,
        request: &TempVideoUploadRequest,
    ) -> Result<TempVideoUploadAuthorization> {
        request.validate()?;
        self.post_json(&format!("{}/videos/temp-uploads", api_prefix()), request)
            .await
    }

    async fn get_temp_video_playback(&self, temp_storage_key: &str) -> Result<TempVideoPlayback> {
        self.get(
            &format!(
                "{}/videos/temp-uploads/{}/playback",
                api_prefix(),
                temp_storage_key
            ),
            &[],
        )
        .await
    }

    async fn plan_image_uploads(
        &self,
        post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>> {
        request.validate()?;
        let response: UploadPlanResponse = self
            .post_json(
                &format!("{}/posts/{}/uploads/images", api_prefix(), post_id),
                request,
            )
            .await?;
        Ok(response.grants.into_iter().map(|g| g.grant).collect())
    }

    async fn plan_video_uploads(
        &self,
        post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>> {
        request.validate()?;
        let response: UploadPlanResponse = self
            .post_json(
                &format!("{}/posts/{}/uploads/videos", api_prefix(), post_id),
                request,
            )
            .await?;
        Ok(response.grants.into_iter().map(|g| g.grant).collect())
    }

    async fn request_ogp_generation(&self, post_id: Uuid) -> Result<()> {
        self.post_json_empty(
            &format!("{}/posts/{}/ogp/generate", api_prefix(), post_id),
            &serde_json::json!({}),
        )
        .await
    }

    async fn trigger_batch_process(&self, request: &BatchProcessRequest) -> Result<()> {
        self.post_json_empty(&format!("{}/videos/batch", api_prefix()), request)
            .await
    }

    async fn upload_bytes(
        &self,
        grant: &UploadGrant,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> std::result::Result<(), UploadError> {
        if grant.is_expired(Utc::now()) {
            return Err(UploadError::GrantRejected(format!(
                "grant for {} expired at {}",
                file.name(),
                grant.expires_at
            )));
        }

        let data = file.read().await?;
        let total = data.len();
        on_progress(0);

        // Chunked body so the transport pulls progress forward as it sends.
        // Progress holds at 99 until the destination acknowledges success.
        let sent = Arc::new(AtomicU64::new(0));
        let stream = {
            let data = data.clone();
            let sent = Arc::clone(&sent);
            let on_progress = Arc::clone(&on_progress);
            futures::stream::iter((0..total).step_by(UPLOAD_CHUNK_BYTES).map(move |offset| {
                let end = (offset + UPLOAD_CHUNK_BYTES).min(data.len());
                let chunk = data.slice(offset..end);
                let done =
                    sent.fetch_add((end - offset) as u64, Ordering::Relaxed) + (end - offset) as u64;
                let pct = ((done * 100 / total.max(1) as u64) as u8).min(99);
                on_progress(pct);
                Ok::<Bytes, std::io::Error>(chunk)
            }))
        };

        let mut request = self
            .client()
            .put(&grant.destination)
            .timeout(UPLOAD_TIMEOUT)
            .header(reqwest::header::CONTENT_LENGTH, total as u64);
        for (name, value) in &grant.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(reqwest::Body::wrap_stream(stream))
            .send()
            .await
            .map_err(|e| UploadError::Network(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::GrantRejected(format!("{}: {}", status, body)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UploadError::Network(format!(
                "destination returned {}: {}",
                status, body
            )));
        }

        on_progress(100);
        Ok(())
    }
}
