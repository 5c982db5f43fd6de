//! Main-video staging into temporary storage.
//!
//! The main video is pushed to temp storage while the creator is still
//! editing, before the post record exists. The staged object is identified
//! by a temp storage key that the batch trigger later consumes; the
//! playback URL returned here feeds the preview/trim UI and is decoupled
//! from the permanent CDN path used after publish.

use std::sync::Arc;

use fanline_api_client::{ContentApi, ProgressFn, TempVideoUploadRequest};
use fanline_core::error::{SubmitError, TrimError, UploadError};
use fanline_core::models::{LocalFile, TempVideoSession};
use fanline_core::UploadConfig;

pub struct TempVideoUploadCoordinator {
    api: Arc<dyn ContentApi>,
    max_video_size_bytes: u64,
    max_sample_duration_secs: f64,
}

impl TempVideoUploadCoordinator {
    pub fn new(api: Arc<dyn ContentApi>, config: &UploadConfig) -> Self {
        Self {
            api,
            max_video_size_bytes: config.max_video_size_bytes,
            max_sample_duration_secs: config.max_sample_duration_secs,
        }
    }

    /// Stage the main video: authorize, stream the bytes with monotonic
    /// progress, then fetch the playback reference. The platform size limit
    /// is checked before any transfer starts.
    pub async fn upload_main_video(
        &self,
        file: &LocalFile,
        on_progress: ProgressFn,
    ) -> Result<TempVideoSession, SubmitError> {
        if file.size() > self.max_video_size_bytes {
            return Err(SubmitError::Upload(UploadError::FileTooLarge {
                size: file.size(),
                max: self.max_video_size_bytes,
            }));
        }

        let request = TempVideoUploadRequest {
            filename: file.name().to_string(),
            content_type: file.content_type().to_string(),
            file_size: file.size(),
        };
        let authorization = self
            .api
            .request_temp_video_upload(&request)
            .await
            .map_err(SubmitError::Planning)?;

        tracing::info!(
            file = %file.name(),
            size = file.size(),
            temp_storage_key = %authorization.temp_storage_key,
            "Uploading main video to temp storage"
        );
        self.api
            .upload_bytes(&authorization.upload_grant, file, on_progress)
            .await?;

        let playback = self
            .api
            .get_temp_video_playback(&authorization.temp_storage_key)
            .await
            .map_err(SubmitError::Planning)?;

        Ok(TempVideoSession {
            temp_storage_key: authorization.temp_storage_key,
            playback_url: playback.playback_url,
            duration_seconds: playback.duration_seconds,
            trim_range: None,
        })
    }

    /// Select the range of the main video to derive the sample clip from.
    /// Metadata only: the range travels with the batch trigger, nothing is
    /// re-uploaded or cut client-side.
    pub fn select_trim_range(
        &self,
        session: &mut TempVideoSession,
        start_seconds: f64,
        end_seconds: f64,
    ) -> Result<(), TrimError> {
        session.select_trim_range(start_seconds, end_seconds, self.max_sample_duration_secs)
    }

    /// Drop a staged session (creator removed the main video before
    /// submitting). The temp object is not deleted here; temp storage
    /// expires server-side.
    pub fn discard(&self, session: TempVideoSession) {
        tracing::debug!(
            temp_storage_key = %session.temp_storage_key,
            "Discarding temp video session"
        );
    }
}
