//! Presigned upload planning.
//!
//! Builds the authorization requests for everything a post needs beyond
//! the main video (which is staged through temp storage and handed to the
//! batch trigger instead). The backend exposes distinct endpoints for
//! image-kind and video-kind media and associates grants with request
//! entries positionally, so entry order is preserved end to end.

use std::sync::Arc;

use anyhow::anyhow;
use uuid::Uuid;

use fanline_api_client::{ContentApi, PlannedUploadEntry, UploadPlanRequest};
use fanline_core::error::SubmitError;
use fanline_core::models::{MediaFileDescriptor, MediaKind, Orientation};

pub struct PresignedUploadPlanner {
    api: Arc<dyn ContentApi>,
}

impl PresignedUploadPlanner {
    pub fn new(api: Arc<dyn ContentApi>) -> Self {
        Self { api }
    }

    /// Request upload grants for the given descriptors and write them back
    /// in place. Orientation must already be resolved on every descriptor;
    /// the API picks encode targets from it. A rejected request aborts the
    /// submission — there is no internal retry.
    pub async fn plan_uploads(
        &self,
        post_id: Uuid,
        descriptors: &mut [MediaFileDescriptor],
    ) -> Result<(), SubmitError> {
        for descriptor in descriptors.iter() {
            if descriptor.kind == MediaKind::MainVideo {
                return Err(SubmitError::InvalidInput(
                    "Main video is staged via temp upload and must not be planned".to_string(),
                ));
            }
            if descriptor.orientation.is_none() {
                return Err(SubmitError::InvalidInput(format!(
                    "Orientation unresolved for {} file {}",
                    descriptor.kind.as_str(),
                    descriptor.file.name()
                )));
            }
        }

        let image_indices: Vec<usize> = (0..descriptors.len())
            .filter(|&i| !descriptors[i].kind.is_video())
            .collect();
        let video_indices: Vec<usize> = (0..descriptors.len())
            .filter(|&i| descriptors[i].kind == MediaKind::SampleVideo)
            .collect();

        // Kinds with no descriptor get no request at all, not an empty one.
        if !image_indices.is_empty() {
            let request = UploadPlanRequest {
                entries: image_indices
                    .iter()
                    .map(|&i| entry_for(&descriptors[i]))
                    .collect(),
            };
            let grants = self
                .api
                .plan_image_uploads(post_id, &request)
                .await
                .map_err(SubmitError::Planning)?;
            if grants.len() != image_indices.len() {
                return Err(SubmitError::Planning(anyhow!(
                    "Image plan returned {} grants for {} entries",
                    grants.len(),
                    image_indices.len()
                )));
            }
            for (&i, grant) in image_indices.iter().zip(grants) {
                descriptors[i].grant = Some(grant);
            }
        }

        if !video_indices.is_empty() {
            let request = UploadPlanRequest {
                entries: video_indices
                    .iter()
                    .map(|&i| entry_for(&descriptors[i]))
                    .collect(),
            };
            let grants = self
                .api
                .plan_video_uploads(post_id, &request)
                .await
                .map_err(SubmitError::Planning)?;
            if grants.len() != video_indices.len() {
                return Err(SubmitError::Planning(anyhow!(
                    "Video plan returned {} grants for {} entries",
                    grants.len(),
                    video_indices.len()
                )));
            }
            for (&i, grant) in video_indices.iter().zip(grants) {
                descriptors[i].grant = Some(grant);
            }
        }

        // No OGP image planned: ask the platform to generate one. This
        // branch is evaluated on every submission, not just some paths.
        if !descriptors.iter().any(|d| d.kind == MediaKind::Ogp) {
            self.api
                .request_ogp_generation(post_id)
                .await
                .map_err(SubmitError::Planning)?;
            tracing::debug!(post_id = %post_id, "No OGP image planned, requested server-side generation");
        }

        Ok(())
    }
}

fn entry_for(descriptor: &MediaFileDescriptor) -> PlannedUploadEntry {
    PlannedUploadEntry {
        kind: descriptor.kind,
        content_type: descriptor.content_type.clone(),
        extension: descriptor.extension.clone(),
        // Checked resolved by plan_uploads before any request is built
        orientation: descriptor.orientation.unwrap_or(Orientation::Square),
    }
}
