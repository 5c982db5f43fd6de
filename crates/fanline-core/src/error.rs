//! Error types module
//!
//! All submission failures are unified under the [`SubmitError`] enum, one
//! variant per saga step, so the caller can tell which phase failed without
//! string matching. Byte-transfer failures have their own [`UploadError`]
//! taxonomy because the retryability of an upload depends on whether the
//! grant was rejected (requires re-planning) or the transport failed.

/// Errors raised while transferring bytes to a granted upload destination.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The destination refused the grant (expired, revoked, or header
    /// mismatch). Not retryable without requesting a fresh grant.
    #[error("Upload grant rejected: {0}")]
    GrantRejected(String),

    #[error("Network failure during upload: {0}")]
    Network(String),

    #[error("File too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Whether retrying the same transfer with the same grant can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Network(_) | UploadError::Io(_))
    }
}

/// Errors raised when selecting a trim range for the sample clip.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TrimError {
    #[error("Invalid trim range: start={start}s, end={end}s")]
    InvalidRange { start: f64, end: f64 },

    #[error("Trim end {end}s exceeds source duration {duration}s")]
    OutOfBounds { end: f64, duration: f64 },

    #[error("Trim span {span}s exceeds maximum sample duration {max}s")]
    TooLong { span: f64, max: f64 },
}

/// Top-level submission error, classified by the saga step that failed.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("Post creation failed: {0}")]
    PostCreate(#[source] anyhow::Error),

    #[error("Upload planning failed: {0}")]
    Planning(#[source] anyhow::Error),

    #[error("Media upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Batch processing trigger failed: {0}")]
    BatchTrigger(#[source] anyhow::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid trim selection: {0}")]
    Trim(#[from] TrimError),

    #[error("Submission cancelled")]
    Cancelled,

    #[error("Another submission is already in progress")]
    AlreadyInFlight,
}

impl SubmitError {
    /// Machine-readable error code for telemetry and UI dispatch.
    pub fn error_code(&self) -> &'static str {
        match self {
            SubmitError::PostCreate(_) => "POST_CREATE_FAILED",
            SubmitError::Planning(_) => "UPLOAD_PLANNING_FAILED",
            SubmitError::Upload(_) => "MEDIA_UPLOAD_FAILED",
            SubmitError::BatchTrigger(_) => "BATCH_TRIGGER_FAILED",
            SubmitError::InvalidInput(_) => "INVALID_INPUT",
            SubmitError::Trim(_) => "INVALID_TRIM_RANGE",
            SubmitError::Cancelled => "SUBMISSION_CANCELLED",
            SubmitError::AlreadyInFlight => "SUBMISSION_IN_FLIGHT",
        }
    }

    /// Whether a user-initiated re-submission can succeed. The saga never
    /// retries on its own; a blind retry risks duplicate post records.
    pub fn is_recoverable(&self) -> bool {
        match self {
            SubmitError::PostCreate(_)
            | SubmitError::Planning(_)
            | SubmitError::Upload(_)
            | SubmitError::BatchTrigger(_)
            | SubmitError::Cancelled
            | SubmitError::AlreadyInFlight => true,
            SubmitError::InvalidInput(_) | SubmitError::Trim(_) => false,
        }
    }

    /// Client-facing message (may differ from the internal error message).
    pub fn user_message(&self) -> String {
        match self {
            SubmitError::PostCreate(_) => "The post could not be created. Please try again.".to_string(),
            SubmitError::Planning(_) => {
                "The platform rejected the upload request. Please try again.".to_string()
            }
            SubmitError::Upload(UploadError::FileTooLarge { size, max }) => format!(
                "The file is too large to upload: {} bytes (limit {} bytes).",
                size, max
            ),
            SubmitError::Upload(e) if e.is_retryable() => {
                "A file upload failed. Check your connection and re-submit.".to_string()
            }
            SubmitError::Upload(_) => {
                "An upload authorization expired. Please re-submit the post.".to_string()
            }
            SubmitError::BatchTrigger(_) => {
                "Video processing could not be started. Please re-submit the post.".to_string()
            }
            SubmitError::InvalidInput(msg) => msg.clone(),
            SubmitError::Trim(e) => e.to_string(),
            SubmitError::Cancelled => "The submission was cancelled.".to_string(),
            SubmitError::AlreadyInFlight => {
                "A submission is already in progress. Wait for it to finish.".to_string()
            }
        }
    }
}
