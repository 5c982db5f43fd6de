//! Content API abstraction trait
//!
//! The upload pipeline talks to the platform exclusively through
//! [`ContentApi`], so the reqwest client can be swapped for a scripted
//! stub in tests. The trait mirrors the platform's authorization model:
//! posts are created first, upload grants are issued per post, and bytes
//! go straight to the granted destination rather than through the API
//! server.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use uuid::Uuid;

use fanline_core::error::UploadError;
use fanline_core::models::{LocalFile, PostMetadata, UploadGrant};

use crate::api::{
    BatchProcessRequest, TempVideoPlayback, TempVideoUploadAuthorization, TempVideoUploadRequest,
    UploadPlanRequest,
};

/// Byte-transfer progress callback, invoked with 0–100. Shared by the
/// transport stream, so it is reference-counted rather than borrowed.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Create the post record. Media is attached afterwards; on any later
    /// failure the caller compensates with [`ContentApi::delete_post`].
    async fn create_post(&self, metadata: &PostMetadata) -> Result<Uuid>;

    /// Update an existing post's metadata (edit flow).
    async fn update_post(&self, post_id: Uuid, metadata: &PostMetadata) -> Result<()>;

    /// Delete a post record. Used only for rollback; the caller swallows
    /// errors so the original failure is not masked.
    async fn delete_post(&self, post_id: Uuid) -> Result<()>;

    /// Authorize a main-video upload into temporary storage.
    async fn request_temp_video_upload(
        &self,
        request: &TempVideoUploadRequest,
    ) -> Result<TempVideoUploadAuthorization>;

    /// Short-lived playback reference for a staged temp object, for the
    /// preview/trim UI.
    async fn get_temp_video_playback(&self, temp_storage_key: &str) -> Result<TempVideoPlayback>;

    /// Request upload grants for image-kind media (thumbnail, OGP,
    /// gallery). Grants come back in request order.
    async fn plan_image_uploads(
        &self,
        post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>>;

    /// Request upload grants for video-kind media (sample clip only; the
    /// main video goes through temp storage + the batch trigger).
    async fn plan_video_uploads(
        &self,
        post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>>;

    /// Ask the platform to generate an OGP image server-side when the
    /// creator supplied none.
    async fn request_ogp_generation(&self, post_id: Uuid) -> Result<()>;

    /// Hand the staged main video (plus orientation and optional trim
    /// metadata) to server-side batch processing.
    async fn trigger_batch_process(&self, request: &BatchProcessRequest) -> Result<()>;

    /// Transfer one file's bytes to its granted destination, sending
    /// exactly the grant's required headers and reporting monotonic
    /// progress from 0 to 100.
    async fn upload_bytes(
        &self,
        grant: &UploadGrant,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> std::result::Result<(), UploadError>;
}
