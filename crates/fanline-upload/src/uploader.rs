//! Sequential media upload with aggregate progress.
//!
//! Files transfer one at a time in a fixed kind order rather than in
//! parallel: thumbnail and OGP may derive from a just-generated client-side
//! image whose blob source must still be valid when its turn comes, and a
//! single in-flight transfer keeps the aggregate math simple. The first
//! failure stops the run; remaining files are left pending.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use fanline_api_client::{ContentApi, ProgressFn};
use fanline_core::error::{SubmitError, UploadError};
use fanline_core::models::{MediaFileDescriptor, SubmissionPhase, UploadStatus};

use crate::progress::ProgressSink;

/// Overall percentage for a file at `pct`% given `done` fully uploaded
/// files out of `total`, with `base` consumed by prior phases and `span`
/// budgeted to the upload phase. Non-decreasing across file boundaries:
/// file `i` at 100% equals file `i + 1` at 0%.
pub fn aggregate_percent(base: f32, span: f32, done: usize, total: usize, pct: u8) -> f32 {
    let total = total.max(1) as f32;
    base + (done as f32 / total) * span + (pct as f32 / 100.0 / total) * span
}

pub struct SequentialUploader {
    api: Arc<dyn ContentApi>,
}

impl SequentialUploader {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self { api }
    }

    /// Upload every planned file to its granted destination, one at a time.
    /// Grants are re-checked for expiry immediately before each transfer so
    /// an expired grant surfaces as a grant rejection, not a transport
    /// error mid-flight.
    pub async fn upload_all(
        &self,
        descriptors: &mut [MediaFileDescriptor],
        sink: &ProgressSink,
        base_percent: f32,
        span_percent: f32,
        cancel: &CancellationToken,
    ) -> Result<(), SubmitError> {
        let mut order: Vec<usize> = (0..descriptors.len()).collect();
        // Stable sort: gallery images keep their submission order.
        order.sort_by_key(|&i| descriptors[i].kind.upload_order());
        let total = order.len();

        for (done, &index) in order.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(SubmitError::Cancelled);
            }

            let descriptor = &mut descriptors[index];
            let grant = descriptor.grant.clone().ok_or_else(|| {
                SubmitError::InvalidInput(format!(
                    "No upload grant for {} file {}",
                    descriptor.kind.as_str(),
                    descriptor.file.name()
                ))
            })?;

            if grant.is_expired(Utc::now()) {
                descriptor.status = UploadStatus::Failed;
                return Err(SubmitError::Upload(UploadError::GrantRejected(format!(
                    "grant for {} expired at {} before the transfer started",
                    descriptor.file.name(),
                    grant.expires_at
                ))));
            }

            descriptor.status = UploadStatus::Uploading;
            tracing::info!(
                kind = descriptor.kind.as_str(),
                file = %descriptor.file.name(),
                position = done + 1,
                total,
                "Uploading media file"
            );

            let file_pct = Arc::new(AtomicU8::new(0));
            let on_progress: ProgressFn = {
                let sink = sink.clone();
                let file_pct = Arc::clone(&file_pct);
                let message = format!("Uploading {}", descriptor.file.name());
                Arc::new(move |pct: u8| {
                    file_pct.store(pct, Ordering::Relaxed);
                    let overall = aggregate_percent(base_percent, span_percent, done, total, pct);
                    sink.update(SubmissionPhase::Uploading, overall, message.clone());
                })
            };

            // Dropping the transfer future aborts the outstanding request.
            let result = {
                let transfer = self.api.upload_bytes(&grant, &descriptor.file, on_progress);
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    result = transfer => Some(result),
                }
            };
            let result = match result {
                Some(result) => result,
                None => {
                    descriptor.status = UploadStatus::Failed;
                    return Err(SubmitError::Cancelled);
                }
            };

            descriptor.progress_percent = file_pct.load(Ordering::Relaxed);
            match result {
                Ok(()) => {
                    descriptor.progress_percent = 100;
                    descriptor.status = UploadStatus::Done;
                    descriptor.uploaded_at = Some(Utc::now());
                }
                Err(e) => {
                    descriptor.status = UploadStatus::Failed;
                    tracing::warn!(
                        kind = descriptor.kind.as_str(),
                        file = %descriptor.file.name(),
                        error = %e,
                        "Media upload failed, aborting remaining transfers"
                    );
                    return Err(SubmitError::Upload(e));
                }
            }
        }

        Ok(())
    }
}
