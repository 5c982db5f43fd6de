use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Whether the submission creates a new post or edits an existing one.
/// Both modes share the same saga; update mode skips re-uploading media the
/// caller did not pass and never deletes the existing post on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    Create,
    Update { post_id: Uuid },
}

impl SubmissionMode {
    pub fn is_update(&self) -> bool {
        matches!(self, SubmissionMode::Update { .. })
    }

    pub fn existing_post_id(&self) -> Option<Uuid> {
        match self {
            SubmissionMode::Create => None,
            SubmissionMode::Update { post_id } => Some(*post_id),
        }
    }
}

/// Submission saga state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionPhase {
    Idle,
    CreatingPost,
    PlanningUploads,
    Uploading,
    BatchTriggering,
    Done,
    RollingBack,
    Failed,
}

impl SubmissionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionPhase::Idle => "idle",
            SubmissionPhase::CreatingPost => "creating_post",
            SubmissionPhase::PlanningUploads => "planning_uploads",
            SubmissionPhase::Uploading => "uploading",
            SubmissionPhase::BatchTriggering => "batch_triggering",
            SubmissionPhase::Done => "done",
            SubmissionPhase::RollingBack => "rolling_back",
            SubmissionPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SubmissionPhase::Done | SubmissionPhase::Failed)
    }

    /// Whether the UI may start a new submission while this phase is
    /// current. Exactly one submission may be in flight at a time.
    pub fn accepts_new_submission(&self) -> bool {
        matches!(
            self,
            SubmissionPhase::Idle | SubmissionPhase::Done | SubmissionPhase::Failed
        )
    }
}

/// One progress snapshot streamed to the surrounding UI.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionUpdate {
    pub phase: SubmissionPhase,
    /// 0–100, non-decreasing across the whole saga; exactly 100 only in
    /// the done phase.
    pub overall_progress: f32,
    pub message: String,
}

impl Default for SubmissionUpdate {
    fn default() -> Self {
        Self {
            phase: SubmissionPhase::Idle,
            overall_progress: 0.0,
            message: String::new(),
        }
    }
}

/// Post metadata sent to the create-post call. Form-level validation is the
/// UI's concern; only shape constraints live here.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PostMetadata {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
