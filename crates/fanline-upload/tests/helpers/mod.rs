//! Shared test doubles: a scripted Content API and descriptor builders.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use uuid::Uuid;

use fanline_api_client::{
    BatchProcessRequest, ContentApi, ProgressFn, TempVideoPlayback, TempVideoUploadAuthorization,
    TempVideoUploadRequest, UploadPlanRequest,
};
use fanline_core::error::UploadError;
use fanline_core::models::{
    LocalFile, MediaFileDescriptor, MediaKind, Orientation, PostMetadata, UploadGrant,
};
use fanline_upload::{OrientationClassifier, VideoDimensions, VideoProbe};

/// Scripted Content API: records every call in order and fails the steps
/// it is told to fail.
pub struct StubContentApi {
    pub post_id: Uuid,
    pub calls: Mutex<Vec<String>>,
    pub image_plan_requests: Mutex<Vec<UploadPlanRequest>>,
    pub video_plan_requests: Mutex<Vec<UploadPlanRequest>>,
    pub batch_requests: Mutex<Vec<BatchProcessRequest>>,
    pub deleted_posts: Mutex<Vec<Uuid>>,
    pub playback_duration_seconds: Mutex<f64>,
    pub fail_create_post: AtomicBool,
    pub fail_update_post: AtomicBool,
    pub fail_plan_images: AtomicBool,
    pub fail_plan_videos: AtomicBool,
    pub fail_batch_trigger: AtomicBool,
    pub fail_delete_post: AtomicBool,
    /// Return one grant fewer than requested from the image plan.
    pub short_image_plan: AtomicBool,
    /// Issue grants that are already expired.
    pub issue_expired_grants: AtomicBool,
    /// File name whose byte transfer fails mid-flight.
    pub fail_upload_of: Mutex<Option<String>>,
    /// Delay inside upload_bytes, for cancellation and in-flight tests.
    pub upload_delay: Mutex<Option<Duration>>,
}

impl StubContentApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            post_id: Uuid::new_v4(),
            calls: Mutex::new(Vec::new()),
            image_plan_requests: Mutex::new(Vec::new()),
            video_plan_requests: Mutex::new(Vec::new()),
            batch_requests: Mutex::new(Vec::new()),
            deleted_posts: Mutex::new(Vec::new()),
            playback_duration_seconds: Mutex::new(120.0),
            fail_create_post: AtomicBool::new(false),
            fail_update_post: AtomicBool::new(false),
            fail_plan_images: AtomicBool::new(false),
            fail_plan_videos: AtomicBool::new(false),
            fail_batch_trigger: AtomicBool::new(false),
            fail_delete_post: AtomicBool::new(false),
            short_image_plan: AtomicBool::new(false),
            issue_expired_grants: AtomicBool::new(false),
            fail_upload_of: Mutex::new(None),
            upload_delay: Mutex::new(None),
        })
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    pub fn call_names(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count_calls(&self, name: &str) -> usize {
        let prefix = format!("{}:", name);
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.as_str() == name || c.starts_with(&prefix))
            .count()
    }

    pub fn grant(&self) -> UploadGrant {
        let expires_at = if self.issue_expired_grants.load(Ordering::SeqCst) {
            Utc::now() - ChronoDuration::seconds(60)
        } else {
            Utc::now() + ChronoDuration::minutes(10)
        };
        UploadGrant {
            destination: "https://storage.test/granted".to_string(),
            headers: vec![("content-type".to_string(), "application/octet-stream".to_string())],
            expires_at,
        }
    }
}

#[async_trait]
impl ContentApi for StubContentApi {
    async fn create_post(&self, _metadata: &PostMetadata) -> Result<Uuid> {
        self.record("create_post");
        if self.fail_create_post.load(Ordering::SeqCst) {
            return Err(anyhow!("post quota exceeded"));
        }
        Ok(self.post_id)
    }

    async fn update_post(&self, post_id: Uuid, _metadata: &PostMetadata) -> Result<()> {
        self.record(format!("update_post:{}", post_id));
        if self.fail_update_post.load(Ordering::SeqCst) {
            return Err(anyhow!("post not editable"));
        }
        Ok(())
    }

    async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        self.record(format!("delete_post:{}", post_id));
        self.deleted_posts.lock().unwrap().push(post_id);
        if self.fail_delete_post.load(Ordering::SeqCst) {
            return Err(anyhow!("delete rejected"));
        }
        Ok(())
    }

    async fn request_temp_video_upload(
        &self,
        request: &TempVideoUploadRequest,
    ) -> Result<TempVideoUploadAuthorization> {
        self.record(format!("request_temp_video_upload:{}", request.filename));
        Ok(TempVideoUploadAuthorization {
            temp_storage_key: format!("tmp/{}", request.filename),
            upload_grant: self.grant(),
        })
    }

    async fn get_temp_video_playback(&self, temp_storage_key: &str) -> Result<TempVideoPlayback> {
        self.record(format!("get_temp_video_playback:{}", temp_storage_key));
        Ok(TempVideoPlayback {
            playback_url: format!("https://play.test/{}", temp_storage_key),
            duration_seconds: *self.playback_duration_seconds.lock().unwrap(),
        })
    }

    async fn plan_image_uploads(
        &self,
        _post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>> {
        self.record("plan_image_uploads");
        if self.fail_plan_images.load(Ordering::SeqCst) {
            return Err(anyhow!("invalid content type"));
        }
        self.image_plan_requests.lock().unwrap().push(request.clone());
        let mut count = request.entries.len();
        if self.short_image_plan.load(Ordering::SeqCst) {
            count = count.saturating_sub(1);
        }
        Ok((0..count).map(|_| self.grant()).collect())
    }

    async fn plan_video_uploads(
        &self,
        _post_id: Uuid,
        request: &UploadPlanRequest,
    ) -> Result<Vec<UploadGrant>> {
        self.record("plan_video_uploads");
        if self.fail_plan_videos.load(Ordering::SeqCst) {
            return Err(anyhow!("video quota exceeded"));
        }
        self.video_plan_requests.lock().unwrap().push(request.clone());
        Ok(request.entries.iter().map(|_| self.grant()).collect())
    }

    async fn request_ogp_generation(&self, post_id: Uuid) -> Result<()> {
        self.record(format!("request_ogp_generation:{}", post_id));
        Ok(())
    }

    async fn trigger_batch_process(&self, request: &BatchProcessRequest) -> Result<()> {
        self.record("trigger_batch_process");
        if self.fail_batch_trigger.load(Ordering::SeqCst) {
            return Err(anyhow!("transcode queue unavailable"));
        }
        self.batch_requests.lock().unwrap().push(request.clone());
        Ok(())
    }

    async fn upload_bytes(
        &self,
        grant: &UploadGrant,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> std::result::Result<(), UploadError> {
        self.record(format!("upload_bytes:{}", file.name()));
        if grant.is_expired(Utc::now()) {
            return Err(UploadError::GrantRejected(format!(
                "grant expired at {}",
                grant.expires_at
            )));
        }
        let delay = *self.upload_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        on_progress(0);
        let failing = self.fail_upload_of.lock().unwrap().clone();
        if failing.as_deref() == Some(file.name()) {
            on_progress(40);
            return Err(UploadError::Network("connection reset mid-transfer".to_string()));
        }
        on_progress(50);
        on_progress(100);
        Ok(())
    }
}

/// Probe that always reports fixed 1920x1080 landscape geometry.
pub struct LandscapeProbe;

#[async_trait]
impl VideoProbe for LandscapeProbe {
    async fn probe(&self, _file: &LocalFile) -> Result<VideoDimensions> {
        Ok(VideoDimensions {
            width: 1920,
            height: 1080,
            duration_seconds: 120.0,
        })
    }
}

pub fn landscape_classifier() -> Arc<OrientationClassifier> {
    Arc::new(OrientationClassifier::new(
        Arc::new(LandscapeProbe),
        Duration::from_secs(4),
    ))
}

/// Image descriptor with a preset orientation, so tests exercise the
/// pipeline without needing decodable image bytes.
pub fn image_descriptor(kind: MediaKind, name: &str) -> MediaFileDescriptor {
    let file = LocalFile::from_bytes(name, "image/png", vec![0u8; 64]);
    let mut descriptor = MediaFileDescriptor::new(kind, file);
    descriptor.orientation = Some(Orientation::Square);
    descriptor
}

pub fn sample_descriptor(name: &str) -> MediaFileDescriptor {
    let file = LocalFile::from_bytes(name, "video/mp4", vec![0u8; 256]);
    let mut descriptor = MediaFileDescriptor::new(MediaKind::SampleVideo, file);
    descriptor.orientation = Some(Orientation::Landscape);
    descriptor
}

pub fn metadata(title: &str) -> PostMetadata {
    PostMetadata {
        title: title.to_string(),
        body: "hello".to_string(),
        tags: vec!["test".to_string()],
    }
}
