//! Post submission saga.
//!
//! The top-level state machine for publishing or editing a post:
//!
//! ```text
//! idle -> creating_post -> planning_uploads -> uploading -> batch_triggering -> done
//!                     \______________________________________________/
//!                                        |
//!                                  rolling_back -> failed
//! ```
//!
//! Once the post record exists, any failure rolls it back with a
//! best-effort delete so the platform never keeps an orphaned post with no
//! media. The delete's own failure is logged, never surfaced: the original
//! error is what the creator needs to see. The saga never retries on its
//! own: a blind retry risks duplicate billing-relevant post records, so
//! retry means the creator re-submits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use fanline_api_client::{BatchProcessRequest, ContentApi};
use fanline_core::error::SubmitError;
use fanline_core::models::{
    LocalFile, MediaFileDescriptor, MediaKind, Orientation, PostMetadata, SubmissionMode,
    SubmissionPhase, TempVideoSession,
};

use crate::orientation::OrientationClassifier;
use crate::planner::PresignedUploadPlanner;
use crate::progress::ProgressSink;
use crate::uploader::SequentialUploader;

/// Percentage consumed once the post record exists.
const CREATE_DONE_PERCENT: f32 = 5.0;
/// Percentage consumed once upload grants are issued.
const PLAN_DONE_PERCENT: f32 = 10.0;
/// Budget for the upload phase; uploads end at 95.
const UPLOAD_SPAN_PERCENT: f32 = 85.0;

/// A staged main video attached to the submission. The local handle stays
/// valid client-side, so the saga can classify its geometry itself.
#[derive(Debug, Clone)]
pub struct MainVideoAttachment {
    pub file: LocalFile,
    pub session: TempVideoSession,
}

/// Everything one submission needs. The saga exclusively owns the
/// descriptor list for the duration of the attempt; descriptors are never
/// shared across concurrent submissions.
#[derive(Debug)]
pub struct SubmissionRequest {
    pub mode: SubmissionMode,
    pub metadata: PostMetadata,
    /// Planned files in submission order: sample, thumbnail, OGP, gallery.
    /// Never contains a main-video entry — that goes through temp storage.
    /// When the sample clip is derived by trimming, no sample descriptor is
    /// present and the trim range travels with the batch trigger instead.
    pub files: Vec<MediaFileDescriptor>,
    pub main_video: Option<MainVideoAttachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionOutcome {
    pub post_id: Uuid,
}

pub struct PostSubmissionSaga {
    api: Arc<dyn ContentApi>,
    classifier: Arc<OrientationClassifier>,
    planner: PresignedUploadPlanner,
    uploader: SequentialUploader,
    in_flight: AtomicBool,
    cancel: Mutex<CancellationToken>,
}

/// Clears the in-flight flag on every exit path out of `submit`.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PostSubmissionSaga {
    pub fn new(api: Arc<dyn ContentApi>, classifier: Arc<OrientationClassifier>) -> Self {
        Self {
            planner: PresignedUploadPlanner::new(Arc::clone(&api)),
            uploader: SequentialUploader::new(Arc::clone(&api)),
            api,
            classifier,
            in_flight: AtomicBool::new(false),
            cancel: Mutex::new(CancellationToken::new()),
        }
    }

    /// Abort the in-flight submission, if any. Outstanding requests are
    /// dropped at the next suspension point; a submission past post
    /// creation rolls back like any other failure.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Run one submission to a terminal phase, streaming snapshots through
    /// `sink`. Exactly one submission may be in flight per saga; a second
    /// call while one is running fails fast without touching the API.
    pub async fn submit(
        &self,
        mut request: SubmissionRequest,
        sink: &ProgressSink,
    ) -> Result<SubmissionOutcome, SubmitError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SubmitError::AlreadyInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let cancel = {
            let token = CancellationToken::new();
            *self.cancel.lock().unwrap() = token.clone();
            token
        };

        self.run(&mut request, sink, &cancel).await
    }

    async fn run(
        &self,
        request: &mut SubmissionRequest,
        sink: &ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<SubmissionOutcome, SubmitError> {
        // Orientation must be resolved before any upload grant is requested.
        // Classification never fails; undecodable media degrades to square.
        for descriptor in request.files.iter_mut() {
            if descriptor.orientation.is_none() {
                descriptor.orientation = Some(self.classifier.classify(&descriptor.file).await);
            }
        }
        let main_orientation = match &request.main_video {
            Some(main) => Some(self.classifier.classify(&main.file).await),
            None => None,
        };

        if cancel.is_cancelled() {
            sink.update(SubmissionPhase::Failed, 0.0, "Submission cancelled");
            return Err(SubmitError::Cancelled);
        }

        sink.update(SubmissionPhase::CreatingPost, 0.0, "Creating post");
        tracing::info!(
            update = request.mode.is_update(),
            planned_files = request.files.len(),
            has_main_video = request.main_video.is_some(),
            "Starting post submission"
        );

        let (post_id, created) = match request.mode {
            SubmissionMode::Create => {
                let post_id = self
                    .api
                    .create_post(&request.metadata)
                    .await
                    .map_err(SubmitError::PostCreate)
                    .inspect_err(|_| {
                        // Nothing to compensate: the record was never created.
                        sink.update(SubmissionPhase::Failed, 0.0, "Post creation failed");
                    })?;
                (post_id, true)
            }
            SubmissionMode::Update { post_id } => {
                self.api
                    .update_post(post_id, &request.metadata)
                    .await
                    .map_err(SubmitError::PostCreate)
                    .inspect_err(|_| {
                        sink.update(SubmissionPhase::Failed, 0.0, "Post update failed");
                    })?;
                (post_id, false)
            }
        };
        sink.update(
            SubmissionPhase::CreatingPost,
            CREATE_DONE_PERCENT,
            "Post record ready",
        );

        match self
            .run_after_create(request, sink, cancel, post_id, main_orientation)
            .await
        {
            Ok(()) => {
                sink.update(SubmissionPhase::Done, 100.0, "Post published");
                tracing::info!(post_id = %post_id, "Post submission completed");
                Ok(SubmissionOutcome { post_id })
            }
            Err(err) => {
                // Update mode edits an existing record; there is nothing
                // to compensate by deleting it.
                if created {
                    sink.update(SubmissionPhase::RollingBack, 0.0, "Rolling back post");
                    self.rollback(post_id).await;
                }
                sink.update(SubmissionPhase::Failed, 0.0, err.user_message());
                Err(err)
            }
        }
    }

    async fn run_after_create(
        &self,
        request: &mut SubmissionRequest,
        sink: &ProgressSink,
        cancel: &CancellationToken,
        post_id: Uuid,
        main_orientation: Option<Orientation>,
    ) -> Result<(), SubmitError> {
        if cancel.is_cancelled() {
            return Err(SubmitError::Cancelled);
        }

        sink.update(
            SubmissionPhase::PlanningUploads,
            CREATE_DONE_PERCENT,
            "Requesting upload grants",
        );
        self.planner.plan_uploads(post_id, &mut request.files).await?;
        sink.update(
            SubmissionPhase::PlanningUploads,
            PLAN_DONE_PERCENT,
            "Upload grants received",
        );

        sink.update(
            SubmissionPhase::Uploading,
            PLAN_DONE_PERCENT,
            "Uploading media",
        );
        self.uploader
            .upload_all(
                &mut request.files,
                sink,
                PLAN_DONE_PERCENT,
                UPLOAD_SPAN_PERCENT,
                cancel,
            )
            .await?;
        sink.update(
            SubmissionPhase::Uploading,
            PLAN_DONE_PERCENT + UPLOAD_SPAN_PERCENT,
            "Media uploaded",
        );

        // Image-only posts (and edits without a new main file) finish here.
        if let Some(main) = &request.main_video {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled);
            }
            sink.update(
                SubmissionPhase::BatchTriggering,
                PLAN_DONE_PERCENT + UPLOAD_SPAN_PERCENT,
                "Starting video processing",
            );

            let trim = main.session.trim_range;
            // An uploaded sample carries its own geometry; a trim-derived
            // sample inherits the main video's on the server.
            let sample_orientation = request
                .files
                .iter()
                .find(|d| d.kind == MediaKind::SampleVideo)
                .and_then(|d| d.orientation);

            let batch = BatchProcessRequest {
                post_id,
                temp_storage_key: main.session.temp_storage_key.clone(),
                content_type: main.file.content_type().to_string(),
                main_orientation: main_orientation.unwrap_or(Orientation::Square),
                sample_orientation,
                need_trim: trim.is_some(),
                start_time: trim.map(|t| t.start_seconds),
                end_time: trim.map(|t| t.end_seconds),
            };
            self.api
                .trigger_batch_process(&batch)
                .await
                .map_err(SubmitError::BatchTrigger)?;
            tracing::info!(
                post_id = %post_id,
                temp_storage_key = %batch.temp_storage_key,
                need_trim = batch.need_trim,
                "Batch processing triggered"
            );
        }

        Ok(())
    }

    /// Best-effort compensation: delete the just-created post record. The
    /// delete's own failure must not mask the error that got us here, so it
    /// is logged and swallowed.
    async fn rollback(&self, post_id: Uuid) {
        tracing::warn!(post_id = %post_id, "Submission failed after post creation, deleting post record");
        if let Err(e) = self.api.delete_post(post_id).await {
            tracing::error!(post_id = %post_id, error = %e, "Rollback delete failed");
        }
    }
}
